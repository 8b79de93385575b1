//! Polecat roster discovery
//!
//! A polecat exists for every directory `<town_root>/<rig>/polecats/<name>/`
//! under a registered rig. Hidden directories are ignored.

use crate::identity::POLECATS;
use crate::registry::PrefixRegistry;
use std::path::Path;
use tracing::warn;

/// A polecat known to the town.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Polecat {
    pub rig: String,
    pub name: String,
}

impl Polecat {
    /// Target path `<rig>/polecats/<name>`.
    pub fn target(&self) -> String {
        format!("{}/{POLECATS}/{}", self.rig, self.name)
    }
}

/// Discover polecats for every registered rig, sorted by rig then name.
pub fn discover_polecats(town_root: &Path, registry: &PrefixRegistry) -> Vec<Polecat> {
    let mut polecats = Vec::new();
    for rig in registry.rigs() {
        let dir = town_root.join(&rig.name).join(POLECATS);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                warn!("Cannot read {}: {e}", dir.display());
                continue;
            }
        };
        for entry in entries.flatten() {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_dir && !name.starts_with('.') {
                polecats.push(Polecat {
                    rig: rig.name.clone(),
                    name,
                });
            }
        }
    }
    polecats.sort();
    polecats
}
