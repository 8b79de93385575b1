//! Agent identity canonicalization
//!
//! Converts hierarchical target paths (`gastown/polecats/alpha`) into the
//! session names agents run under (`gt-alpha`), validates opaque issue-id
//! tokens, and recognizes legacy session names that predate per-rig prefixes.
//!
//! | Target path               | Session name        |
//! |---------------------------|---------------------|
//! | `mayor`                   | `mayor`             |
//! | `deacon/dogs/alpha`       | `hq-dog-alpha`      |
//! | `<rig>/polecats/<name>`   | `<prefix>-<name>`   |
//! | `<rig>/crew/<name>`       | `<prefix>-crew-<name>` |
//! | `<rig>/<role>`            | `<prefix>-<role>`   |
//! | `<unregistered>/a/b`      | `hq-<unregistered>-a-b` |
//!
//! Every function takes the registry explicitly; nothing here reads the
//! process-wide default.

use crate::registry::{PrefixRegistry, TOWN_PREFIX};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Town-level supervisory agent owning the `dogs` category.
const DEACON: &str = "deacon";

/// Worker category; elided from session names.
pub const POLECATS: &str = "polecats";

/// Human-attached interactive category; kept in session names.
const CREW: &str = "crew";

/// Plural category → singular session-name segment, for `deacon/` paths.
const DEACON_CATEGORIES: &[(&str, &str)] = &[("dogs", "dog")];

/// Historical town-wide prefixes that legacy session names start with.
const LEGACY_TOWN_PREFIXES: &[&str] = &[TOWN_PREFIX, "gt"];

/// Target path resolution errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("empty target path")]
    Empty,

    #[error("malformed target '{target}': {reason}")]
    Malformed { target: String, reason: &'static str },

    /// A category was named without the leaf that selects an agent in it
    #[error("target '{target}' names category '{category}' but no agent in it")]
    MissingLeaf { target: String, category: String },

    /// Category has no known canonicalization rule
    #[error("target '{target}' uses unknown category '{category}'")]
    UnknownCategory { target: String, category: String },
}

/// A live session name that predates per-rig prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacySession {
    pub old_name: String,
    pub new_name: String,
    pub rig: String,
    /// Crew sessions are human-attached and must be renamed by hand.
    pub is_crew: bool,
}

/// Return `true` if `token` looks like an issue identifier (`<prefix>-<rest>`).
///
/// The head (before the first hyphen) must be 2-6 lowercase ASCII letters, or
/// any prefix bound in `registry` (registered prefixes may be longer). Both
/// halves must be non-empty.
pub fn looks_like_issue_id(token: &str, registry: &PrefixRegistry) -> bool {
    let Some((head, rest)) = token.split_once('-') else {
        return false;
    };
    if head.is_empty() || rest.is_empty() {
        return false;
    }

    let generic = (2..=6).contains(&head.len()) && head.chars().all(|c| c.is_ascii_lowercase());
    generic || registry.rig_for(head).is_some()
}

/// Resolve a target path to its canonical session name.
pub fn target_to_session_name(
    target: &str,
    registry: &PrefixRegistry,
) -> Result<String, IdentityError> {
    if target.is_empty() {
        return Err(IdentityError::Empty);
    }
    let segments: Vec<&str> = target.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(IdentityError::Malformed {
            target: target.to_string(),
            reason: "empty path segment",
        });
    }

    match segments.as_slice() {
        [single] => Ok((*single).to_string()),
        [DEACON, rest @ ..] => deacon_session_name(target, rest),
        [rig, rest @ ..] => match registry.prefix_for(rig) {
            Some(prefix) => rig_session_name(target, prefix, rest),
            None => Ok(format!("{TOWN_PREFIX}-{}", segments.join("-"))),
        },
        [] => Err(IdentityError::Empty),
    }
}

fn deacon_session_name(target: &str, rest: &[&str]) -> Result<String, IdentityError> {
    let (category, leaf) = rest.split_first().ok_or(IdentityError::Empty)?;
    let singular = DEACON_CATEGORIES
        .iter()
        .find_map(|(plural, singular)| (plural == category).then_some(*singular))
        .ok_or_else(|| IdentityError::UnknownCategory {
            target: target.to_string(),
            category: (*category).to_string(),
        })?;

    if leaf.is_empty() {
        return Err(IdentityError::MissingLeaf {
            target: target.to_string(),
            category: (*category).to_string(),
        });
    }
    Ok(format!("{TOWN_PREFIX}-{singular}-{}", leaf.join("-")))
}

fn rig_session_name(target: &str, prefix: &str, rest: &[&str]) -> Result<String, IdentityError> {
    match rest {
        [category] if *category == POLECATS || *category == CREW => {
            Err(IdentityError::MissingLeaf {
                target: target.to_string(),
                category: (*category).to_string(),
            })
        }
        [role] => Ok(format!("{prefix}-{role}")),
        [POLECATS, leaf @ ..] => Ok(format!("{prefix}-{}", leaf.join("-"))),
        [CREW, leaf @ ..] => Ok(format!("{prefix}-{CREW}-{}", leaf.join("-"))),
        [category, ..] => Err(IdentityError::UnknownCategory {
            target: target.to_string(),
            category: (*category).to_string(),
        }),
        [] => Err(IdentityError::Empty),
    }
}

/// Identifier of the agent status record for a polecat:
/// `<prefix>-<rig>-polecat-<name>`, with `hq` for unregistered rigs.
pub fn polecat_bead_id(rig: &str, name: &str, registry: &PrefixRegistry) -> String {
    let prefix = registry.prefix_for(rig).unwrap_or(TOWN_PREFIX);
    format!("{prefix}-{rig}-polecat-{name}")
}

fn session_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z]{2,7}-[a-zA-Z0-9_-]+$").expect("session name pattern is valid")
    })
}

/// Return `true` if `name` matches the canonical session-name grammar.
pub fn is_canonical_session_name(name: &str) -> bool {
    session_name_pattern().is_match(name)
}

/// Detect a legacy session name of the form `<town>-<rigFullName>-<rest>`.
///
/// `<town>` is `hq` or the historical `gt`; `<rigFullName>` must be a rig bound
/// in `registry`. Returns the canonical `<prefix>-<rest>` replacement, or
/// `None` when the name is unrelated or already canonical. The longest
/// matching rig name wins.
pub fn detect_legacy_session(session: &str, registry: &PrefixRegistry) -> Option<LegacySession> {
    let mut best: Option<LegacySession> = None;

    for town in LEGACY_TOWN_PREFIXES {
        let Some(after_town) = session
            .strip_prefix(town)
            .and_then(|s| s.strip_prefix('-'))
        else {
            continue;
        };

        for rig in registry.rigs() {
            if rig.name == TOWN_PREFIX {
                continue;
            }
            let Some(rest) = after_town
                .strip_prefix(rig.name.as_str())
                .and_then(|s| s.strip_prefix('-'))
            else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            if best.as_ref().is_some_and(|b| b.rig.len() >= rig.name.len()) {
                continue;
            }

            let new_name = format!("{}-{rest}", rig.prefix);
            if new_name == session || !is_canonical_session_name(&new_name) {
                continue;
            }
            best = Some(LegacySession {
                old_name: session.to_string(),
                new_name,
                is_crew: rest.starts_with("crew-"),
                rig: rig.name,
            });
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warrant_registry() -> PrefixRegistry {
        PrefixRegistry::from_entries([("gt", "gastown"), ("bd", "beads")]).unwrap()
    }

    fn name_check_registry() -> PrefixRegistry {
        PrefixRegistry::from_entries([
            ("gt", "gastown"),
            ("nif", "niflheim"),
            ("wa", "whatsapp_automation"),
        ])
        .unwrap()
    }

    #[test]
    fn test_looks_like_issue_id() {
        let reg =
            PrefixRegistry::from_entries([("nx", "nexus"), ("rpk", "nrpk"), ("longpfx", "longprefix")])
                .unwrap();

        let cases = [
            ("gt-abc123", true),
            ("bd-xyz789", true),
            ("hq-mayor", true),
            ("nx-def456", true),
            ("rpk-ghi012", true),
            ("longpfx-jkl345", true),
            ("nv-short", true),
            ("ab-min", true),
            ("abcdef-max6", true),
            ("notvalid", false),
            ("no-hyphen-after", true),
            ("A-uppercase", false),
            ("1-number", false),
            ("", false),
            ("-noprefix", false),
            ("a-tooshort", false),
            ("abcdefg-toolong", false),
            ("ab-", false),
        ];

        for (input, want) in cases {
            assert_eq!(looks_like_issue_id(input, &reg), want, "input {input:?}");
        }
    }

    #[test]
    fn test_long_prefix_needs_registration() {
        let empty = PrefixRegistry::new();
        assert!(!looks_like_issue_id("longpfx-jkl345", &empty));
    }

    #[test]
    fn test_target_to_session_name() {
        let reg = warrant_registry();
        let cases = [
            ("gastown/polecats/alpha", "gt-alpha"),
            ("beads/polecats/charlie", "bd-charlie"),
            ("deacon/dogs/alpha", "hq-dog-alpha"),
            ("gastown/crew/bob", "gt-crew-bob"),
            ("gastown/witness", "gt-witness"),
            ("gastown/refinery", "gt-refinery"),
            ("beads/witness", "bd-witness"),
            ("beads/refinery", "bd-refinery"),
            ("unknownrig/something/else", "hq-unknownrig-something-else"),
            ("unknownrig/witness", "hq-unknownrig-witness"),
            ("mayor", "mayor"),
            ("deacon", "deacon"),
        ];

        for (target, want) in cases {
            assert_eq!(
                target_to_session_name(target, &reg).as_deref(),
                Ok(want),
                "target {target:?}"
            );
        }
    }

    #[test]
    fn test_target_missing_leaf_is_error() {
        let reg = warrant_registry();
        for target in ["deacon/dogs", "gastown/polecats", "gastown/crew"] {
            assert!(
                matches!(
                    target_to_session_name(target, &reg),
                    Err(IdentityError::MissingLeaf { .. })
                ),
                "target {target:?}"
            );
        }
    }

    #[test]
    fn test_target_unknown_category_is_error() {
        let reg = warrant_registry();
        assert_eq!(
            target_to_session_name("deacon/cats/tom", &reg),
            Err(IdentityError::UnknownCategory {
                target: "deacon/cats/tom".to_string(),
                category: "cats".to_string(),
            })
        );
        assert!(matches!(
            target_to_session_name("gastown/dogs/rex", &reg),
            Err(IdentityError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn test_target_malformed() {
        let reg = warrant_registry();
        assert_eq!(target_to_session_name("", &reg), Err(IdentityError::Empty));
        for target in ["gastown//alpha", "gastown/polecats/", "/gastown"] {
            assert!(
                matches!(
                    target_to_session_name(target, &reg),
                    Err(IdentityError::Malformed { .. })
                ),
                "target {target:?}"
            );
        }
    }

    #[test]
    fn test_polecat_bead_id() {
        let reg = warrant_registry();
        assert_eq!(polecat_bead_id("gastown", "alpha", &reg), "gt-gastown-polecat-alpha");
        assert_eq!(polecat_bead_id("myr", "mycat", &reg), "hq-myr-polecat-mycat");
    }

    #[test]
    fn test_canonical_session_grammar() {
        assert!(is_canonical_session_name("gt-witness"));
        assert!(is_canonical_session_name("nif-crew-wolf"));
        assert!(is_canonical_session_name("hq-dog-alpha_2"));
        assert!(!is_canonical_session_name("g-witness"));
        assert!(!is_canonical_session_name("GT-witness"));
        assert!(!is_canonical_session_name("gt-has space"));
        assert!(!is_canonical_session_name("vim"));
    }

    #[test]
    fn test_detect_legacy_session() {
        let reg = name_check_registry();

        let legacy = detect_legacy_session("gt-niflheim-witness", &reg).unwrap();
        assert_eq!(legacy.new_name, "nif-witness");
        assert_eq!(legacy.rig, "niflheim");
        assert!(!legacy.is_crew);

        let legacy = detect_legacy_session("hq-niflheim-refinery", &reg).unwrap();
        assert_eq!(legacy.new_name, "nif-refinery");

        let legacy = detect_legacy_session("gt-whatsapp_automation-witness", &reg).unwrap();
        assert_eq!(legacy.new_name, "wa-witness");

        let crew = detect_legacy_session("gt-niflheim-crew-wolf", &reg).unwrap();
        assert_eq!(crew.new_name, "nif-crew-wolf");
        assert!(crew.is_crew);
    }

    #[test]
    fn test_detect_legacy_ignores_canonical_and_foreign() {
        let reg = name_check_registry();
        for name in [
            "hq-mayor",
            "hq-deacon",
            "gt-witness",
            "nif-refinery",
            "wa-crew-batista",
            "my-personal-session",
            "vim",
            "gt-niflheim",
            "gt-niflheim-",
        ] {
            assert_eq!(detect_legacy_session(name, &reg), None, "session {name:?}");
        }
    }

    #[test]
    fn test_detect_legacy_prefers_longest_rig() {
        let reg = PrefixRegistry::from_entries([("ni", "nif"), ("nf", "nif-legacy")]).unwrap();
        let legacy = detect_legacy_session("gt-nif-legacy-witness", &reg).unwrap();
        assert_eq!(legacy.rig, "nif-legacy");
        assert_eq!(legacy.new_name, "nf-witness");
    }
}
