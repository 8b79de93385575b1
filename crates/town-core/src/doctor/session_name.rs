//! Legacy session-name detection and repair

use super::{Check, CheckCategory, CheckContext, CheckResult, DoctorError};
use crate::identity::detect_legacy_session;
use crate::mux::Multiplexer;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Detail marker for crew sessions that `fix` will not touch.
pub const MANUAL_RENAME_NOTE: &str = "manual rename required";

/// A legacy session and its canonical replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRename {
    pub old_name: String,
    pub new_name: String,
    /// Crew sessions may have a user attached and are never renamed automatically
    pub is_crew: bool,
}

/// Finds live sessions still using the `<town>-<rig>-<rest>` naming and
/// renames them to `<prefix>-<rest>`.
pub struct MalformedSessionNameCheck {
    mux: Arc<dyn Multiplexer>,
    candidates: Vec<SessionRename>,
}

impl MalformedSessionNameCheck {
    pub fn new(mux: Arc<dyn Multiplexer>) -> Self {
        Self {
            mux,
            candidates: Vec::new(),
        }
    }

    /// Candidates found by the last `run`.
    pub fn candidates(&self) -> &[SessionRename] {
        &self.candidates
    }

    fn rename_one(&self, candidate: &SessionRename) -> Result<(), String> {
        let SessionRename {
            old_name, new_name, ..
        } = candidate;

        let source_live = self
            .mux
            .has_session(old_name)
            .map_err(|e| format!("{old_name}: {e}"))?;
        if !source_live {
            debug!("Skipping {old_name}: session no longer exists");
            return Ok(());
        }

        let target_live = self
            .mux
            .has_session(new_name)
            .map_err(|e| format!("{new_name}: {e}"))?;
        if target_live {
            info!("Skipping {old_name}: {new_name} already exists");
            return Ok(());
        }

        self.mux
            .rename_session(old_name, new_name)
            .map_err(|e| format!("{old_name} -> {new_name}: {e}"))?;
        info!("Renamed session {old_name} -> {new_name}");
        Ok(())
    }
}

impl Check for MalformedSessionNameCheck {
    fn name(&self) -> &'static str {
        "session-name-format"
    }

    fn description(&self) -> &'static str {
        "Detect sessions with outdated naming format"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Cleanup
    }

    fn can_fix(&self) -> bool {
        true
    }

    fn run(&mut self, ctx: &CheckContext) -> CheckResult {
        self.candidates.clear();

        let sessions = match self.mux.list_sessions() {
            Ok(sessions) => sessions,
            Err(e) => {
                return CheckResult::error("Could not list sessions", vec![e.to_string()]);
            }
        };

        self.candidates = sessions
            .iter()
            .filter_map(|session| detect_legacy_session(session, &ctx.registry))
            .map(|legacy| SessionRename {
                old_name: legacy.old_name,
                new_name: legacy.new_name,
                is_crew: legacy.is_crew,
            })
            .collect();

        if self.candidates.is_empty() {
            let mut result = CheckResult::ok("All sessions use canonical names");
            if ctx.verbose {
                result.details.push(format!("{} session(s) checked", sessions.len()));
            }
            return result;
        }

        let details = self
            .candidates
            .iter()
            .map(|c| {
                if c.is_crew {
                    format!(
                        "{} should be {} (crew session, {MANUAL_RENAME_NOTE})",
                        c.old_name, c.new_name
                    )
                } else {
                    format!("{} should be {}", c.old_name, c.new_name)
                }
            })
            .collect();

        CheckResult::warning(
            format!(
                "{} session(s) use the legacy naming format",
                self.candidates.len()
            ),
            details,
        )
    }

    /// Rename the non-crew candidates from the last `run`.
    ///
    /// Each rename re-checks that the old session is still live and the new
    /// name is still free; otherwise the candidate is skipped. Failures are
    /// collected and reported after every candidate was attempted.
    fn fix(&mut self, _ctx: &CheckContext) -> Result<(), DoctorError> {
        let candidates = std::mem::take(&mut self.candidates);
        let mut failures = Vec::new();

        for candidate in &candidates {
            if candidate.is_crew {
                debug!("Skipping crew session {}", candidate.old_name);
                continue;
            }
            if let Err(failure) = self.rename_one(candidate) {
                warn!("Session rename failed: {failure}");
                failures.push(failure);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DoctorError::RenameFailed { failures })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doctor::{CheckStatus, Doctor};
    use crate::mux::{InMemoryMultiplexer, MuxCall};
    use crate::registry::PrefixRegistry;
    use std::path::PathBuf;

    fn ctx() -> CheckContext {
        CheckContext {
            town_root: PathBuf::from("/tmp/town"),
            registry: Arc::new(
                PrefixRegistry::from_entries([
                    ("gt", "gastown"),
                    ("nif", "niflheim"),
                    ("wa", "whatsapp_automation"),
                ])
                .unwrap(),
            ),
            verbose: false,
        }
    }

    fn check_with(sessions: &[&str]) -> (Arc<InMemoryMultiplexer>, MalformedSessionNameCheck) {
        let mux = Arc::new(InMemoryMultiplexer::with_sessions(sessions.iter().copied()));
        let check = MalformedSessionNameCheck::new(mux.clone());
        (mux, check)
    }

    fn rename(old: &str, new: &str, is_crew: bool) -> SessionRename {
        SessionRename {
            old_name: old.to_string(),
            new_name: new.to_string(),
            is_crew,
        }
    }

    #[test]
    fn test_metadata() {
        let (_, check) = check_with(&[]);
        assert_eq!(check.name(), "session-name-format");
        assert_eq!(
            check.description(),
            "Detect sessions with outdated naming format"
        );
        assert!(check.can_fix());
        assert_eq!(check.category(), CheckCategory::Cleanup);
    }

    #[test]
    fn test_run_no_sessions() {
        let (_, mut check) = check_with(&[]);
        assert_eq!(check.run(&ctx()).status, CheckStatus::Ok);
    }

    #[test]
    fn test_run_canonical_sessions_pass() {
        let (_, mut check) = check_with(&[
            "hq-mayor",
            "hq-deacon",
            "gt-witness",
            "nif-refinery",
            "wa-crew-batista",
        ]);
        let result = check.run(&ctx());
        assert_eq!(result.status, CheckStatus::Ok, "{:?}", result.details);
    }

    #[test]
    fn test_run_unrelated_sessions_pass() {
        let (_, mut check) = check_with(&["my-personal-session", "vim", "jupyter"]);
        assert_eq!(check.run(&ctx()).status, CheckStatus::Ok);
    }

    #[test]
    fn test_run_detects_legacy_names() {
        let (_, mut check) = check_with(&[
            "hq-mayor",
            "gt-niflheim-witness",
            "gt-niflheim-refinery",
            "nif-refinery",
        ]);
        let result = check.run(&ctx());

        assert_eq!(result.status, CheckStatus::Warning);
        assert_eq!(result.details.len(), 2, "{:?}", result.details);
        for want in [
            "gt-niflheim-witness",
            "nif-witness",
            "gt-niflheim-refinery",
            "nif-refinery",
        ] {
            assert!(
                result.details.iter().any(|d| d.contains(want)),
                "missing {want} in {:?}",
                result.details
            );
        }
    }

    #[test]
    fn test_run_long_rig_name() {
        let (_, mut check) = check_with(&["gt-whatsapp_automation-witness"]);
        let result = check.run(&ctx());
        assert_eq!(result.status, CheckStatus::Warning);
        assert_eq!(result.details.len(), 1);
        assert!(result.details[0].contains("gt-whatsapp_automation-witness"));
        assert!(result.details[0].contains("wa-witness"));
    }

    #[test]
    fn test_run_crew_needs_manual_rename() {
        let (_, mut check) = check_with(&["gt-niflheim-crew-wolf"]);
        let result = check.run(&ctx());
        assert_eq!(result.status, CheckStatus::Warning);
        assert!(result.details[0].contains("gt-niflheim-crew-wolf"));
        assert!(result.details[0].contains("manual"));
        assert_eq!(check.candidates(), &[rename("gt-niflheim-crew-wolf", "nif-crew-wolf", true)]);
    }

    #[test]
    fn test_run_list_failure_is_error() {
        let (mux, mut check) = check_with(&["gt-niflheim-witness"]);
        mux.set_unavailable(Some("permission denied"));
        let result = check.run(&ctx());
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.message, "Could not list sessions");
        assert!(result.details[0].contains("permission denied"));
        assert!(check.candidates().is_empty());
    }

    #[test]
    fn test_fix_renames() {
        let (mux, mut check) = check_with(&["gt-niflheim-witness"]);
        check.candidates = vec![rename("gt-niflheim-witness", "nif-witness", false)];

        check.fix(&ctx()).unwrap();
        assert_eq!(
            mux.renames(),
            vec![("gt-niflheim-witness".to_string(), "nif-witness".to_string())]
        );
        assert_eq!(mux.session_names(), vec!["nif-witness"]);
    }

    #[test]
    fn test_fix_skips_crew() {
        let (mux, mut check) = check_with(&["gt-niflheim-crew-wolf"]);
        check.candidates = vec![rename("gt-niflheim-crew-wolf", "nif-crew-wolf", true)];

        check.fix(&ctx()).unwrap();
        assert!(mux.renames().is_empty());
        assert!(mux.calls().is_empty());
    }

    #[test]
    fn test_fix_skips_collision() {
        let (mux, mut check) = check_with(&["gt-niflheim-witness", "nif-witness"]);
        check.candidates = vec![rename("gt-niflheim-witness", "nif-witness", false)];

        check.fix(&ctx()).unwrap();
        assert!(mux.renames().is_empty());
    }

    #[test]
    fn test_fix_skips_vanished_source() {
        let (mux, mut check) = check_with(&["gt-niflheim-witness"]);
        check.run(&ctx());
        // Removed between scan and fix.
        mux.remove_session("gt-niflheim-witness");

        check.fix(&ctx()).unwrap();
        assert!(mux.renames().is_empty());
        assert!(!mux.calls().contains(&MuxCall::Rename {
            from: "gt-niflheim-witness".to_string(),
            to: "nif-witness".to_string(),
        }));
    }

    #[test]
    fn test_fix_reports_failures_after_trying_all() {
        let (mux, mut check) = check_with(&[]);
        check.candidates = vec![
            rename("gt-niflheim-witness", "nif-witness", false),
            rename("gt-niflheim-refinery", "nif-refinery", false),
        ];
        mux.set_unavailable(Some("error connecting to /tmp/tmux"));

        let err = check.fix(&ctx()).unwrap_err();
        let DoctorError::RenameFailed { failures } = err else {
            panic!("expected RenameFailed");
        };
        assert_eq!(failures.len(), 2);
        assert_eq!(
            mux.calls(),
            vec![
                MuxCall::HasSession("gt-niflheim-witness".to_string()),
                MuxCall::HasSession("gt-niflheim-refinery".to_string()),
            ]
        );
    }

    #[test]
    fn test_doctor_fix_then_rerun_is_clean() {
        let mux = Arc::new(InMemoryMultiplexer::with_sessions([
            "gt-niflheim-witness",
            "gt-niflheim-crew-wolf",
            "hq-mayor",
        ]));
        let mut doctor =
            Doctor::new().with_check(Box::new(MalformedSessionNameCheck::new(mux.clone())));

        let report = doctor.run(&ctx(), true);
        let outcome = &report.outcomes[0];
        assert!(outcome.fix_attempted);
        // Crew session is still reported after the fix.
        assert_eq!(outcome.result.status, CheckStatus::Warning);
        assert_eq!(outcome.result.details.len(), 1);
        assert!(outcome.result.details[0].contains("crew"));
        assert!(mux.session_names().contains(&"nif-witness".to_string()));
    }
}
