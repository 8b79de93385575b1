//! Rig prefix registry
//!
//! Bidirectional mapping between a rig's short session prefix (`gt`) and its
//! full rig name (`gastown`). Components receive a registry by reference; the
//! process-wide default slot exists only for the outermost composition point
//! (binaries) and for scoped overrides in tests.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, RwLock};
use thiserror::Error;

/// Town-level namespace for agents that are not rig-scoped.
pub const TOWN_PREFIX: &str = "hq";

/// Registry mutation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Prefix already bound to a different rig
    #[error("prefix '{prefix}' is already bound to rig '{existing_rig}'")]
    PrefixTaken { prefix: String, existing_rig: String },

    /// Rig already bound to a different prefix
    #[error("rig '{rig}' is already bound to prefix '{existing_prefix}'")]
    RigTaken { rig: String, existing_prefix: String },

    /// Prefix or rig name is empty or not lowercase
    #[error("invalid {field} '{value}': must be non-empty lowercase")]
    Invalid { field: &'static str, value: String },

    /// The town namespace cannot be bound to a rig
    #[error("prefix 'hq' is reserved for town-level agents")]
    Reserved,
}

/// A single rig binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rig {
    pub name: String,
    pub prefix: String,
}

/// Prefix ↔ rig lookup table.
#[derive(Debug, Clone, Default)]
pub struct PrefixRegistry {
    by_prefix: BTreeMap<String, String>,
    by_rig: BTreeMap<String, String>,
}

impl PrefixRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from `(prefix, rig)` pairs, failing on the first conflict.
    pub fn from_entries<I, P, R>(entries: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = (P, R)>,
        P: AsRef<str>,
        R: AsRef<str>,
    {
        let mut registry = Self::new();
        for (prefix, rig) in entries {
            registry.register(prefix.as_ref(), rig.as_ref())?;
        }
        Ok(registry)
    }

    /// Bind `prefix` to `rig`.
    ///
    /// Re-registering the identical pair is a no-op. Binding either side to a
    /// different counterpart fails.
    pub fn register(&mut self, prefix: &str, rig: &str) -> Result<(), RegistryError> {
        validate("prefix", prefix)?;
        validate("rig", rig)?;
        if prefix == TOWN_PREFIX {
            return Err(RegistryError::Reserved);
        }

        if let Some(existing_rig) = self.by_prefix.get(prefix) {
            if existing_rig == rig {
                return Ok(());
            }
            return Err(RegistryError::PrefixTaken {
                prefix: prefix.to_string(),
                existing_rig: existing_rig.clone(),
            });
        }
        if let Some(existing_prefix) = self.by_rig.get(rig) {
            return Err(RegistryError::RigTaken {
                rig: rig.to_string(),
                existing_prefix: existing_prefix.clone(),
            });
        }

        self.by_prefix.insert(prefix.to_string(), rig.to_string());
        self.by_rig.insert(rig.to_string(), prefix.to_string());
        Ok(())
    }

    /// Rig name bound to `prefix`, if any.
    pub fn rig_for(&self, prefix: &str) -> Option<&str> {
        self.by_prefix.get(prefix).map(String::as_str)
    }

    /// Prefix bound to `rig`, if any.
    pub fn prefix_for(&self, rig: &str) -> Option<&str> {
        self.by_rig.get(rig).map(String::as_str)
    }

    /// All bindings, sorted by rig name.
    pub fn rigs(&self) -> impl Iterator<Item = Rig> + '_ {
        self.by_rig.iter().map(|(name, prefix)| Rig {
            name: name.clone(),
            prefix: prefix.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.by_prefix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_prefix.is_empty()
    }
}

fn validate(field: &'static str, value: &str) -> Result<(), RegistryError> {
    let ok = !value.is_empty()
        && !value.contains(['/', ' '])
        && !value.chars().any(|c| c.is_ascii_uppercase());
    if ok {
        Ok(())
    } else {
        Err(RegistryError::Invalid {
            field,
            value: value.to_string(),
        })
    }
}

// ── Process-wide default slot ────────────────────────────────────────────────

static DEFAULT_REGISTRY: OnceLock<RwLock<Arc<PrefixRegistry>>> = OnceLock::new();

fn default_slot() -> &'static RwLock<Arc<PrefixRegistry>> {
    DEFAULT_REGISTRY.get_or_init(|| RwLock::new(Arc::new(PrefixRegistry::new())))
}

/// Current process-wide default registry (empty until set).
pub fn default_registry() -> Arc<PrefixRegistry> {
    match default_slot().read() {
        Ok(guard) => Arc::clone(&guard),
        Err(poisoned) => Arc::clone(&poisoned.into_inner()),
    }
}

/// Replace the process-wide default registry, returning the previous one.
pub fn set_default_registry(registry: Arc<PrefixRegistry>) -> Arc<PrefixRegistry> {
    let mut guard = match default_slot().write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    std::mem::replace(&mut *guard, registry)
}

/// Scoped default-registry override; restores the previous registry on drop.
#[must_use = "the override is reverted as soon as the guard is dropped"]
pub struct RegistryOverride {
    previous: Option<Arc<PrefixRegistry>>,
}

impl RegistryOverride {
    pub fn install(registry: Arc<PrefixRegistry>) -> Self {
        Self {
            previous: Some(set_default_registry(registry)),
        }
    }
}

impl Drop for RegistryOverride {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            set_default_registry(previous);
        }
    }
}
