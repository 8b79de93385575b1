//! Heartbeat loop
//!
//! Every interval the loop checks each polecat on the roster. A cycle runs to
//! completion before the next tick is taken (missed ticks are delayed, never
//! bunched), so cycles never overlap. Within a cycle, checks run on the
//! blocking pool, bounded by a semaphore and each capped by a timeout; a
//! timed-out or panicked check is inconclusive. A timed-out check keeps its
//! semaphore slot until its blocking work ends, and the cycle waits for that
//! work before returning.

use crate::health::{Health, HealthMonitor, HealthReport};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use town_core::registry::PrefixRegistry;
use town_core::roster::{Polecat, discover_polecats};
use town_core::warrant::{FileOutcome, WarrantStore};
use tracing::{debug, error, info, warn};

/// Source of the agents to check each cycle.
pub trait Roster: Send + Sync {
    fn polecats(&self) -> Vec<Polecat>;
}

/// Roster read from the town directory tree on every call.
pub struct TownRoster {
    town_root: PathBuf,
    registry: Arc<PrefixRegistry>,
}

impl TownRoster {
    pub fn new(town_root: impl Into<PathBuf>, registry: Arc<PrefixRegistry>) -> Self {
        Self {
            town_root: town_root.into(),
            registry,
        }
    }
}

impl Roster for TownRoster {
    fn polecats(&self) -> Vec<Polecat> {
        discover_polecats(&self.town_root, &self.registry)
    }
}

impl Roster for Vec<Polecat> {
    fn polecats(&self) -> Vec<Polecat> {
        self.clone()
    }
}

/// Heartbeat tuning.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    pub interval: Duration,
    pub check_timeout: Duration,
    pub max_concurrent_checks: usize,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(180),
            check_timeout: Duration::from_secs(30),
            max_concurrent_checks: 4,
        }
    }
}

/// Files a warrant for each detected crash.
#[derive(Debug, Clone)]
pub struct CrashWarrants {
    pub store: WarrantStore,
    /// Recorded as the warrant's filer
    pub filed_by: String,
}

/// Per-classification counts for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub healthy: usize,
    pub pending_start: usize,
    pub crashed: usize,
    pub dormant: usize,
    pub untracked: usize,
    pub inconclusive: usize,
    pub warrants_filed: usize,
}

impl CycleSummary {
    pub fn record(&mut self, health: &Health) {
        match health {
            Health::Healthy => self.healthy += 1,
            Health::PendingStart => self.pending_start += 1,
            Health::Crashed => self.crashed += 1,
            Health::Dormant => self.dormant += 1,
            Health::Untracked => self.untracked += 1,
            Health::Inconclusive(_) => self.inconclusive += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.healthy
            + self.pending_start
            + self.crashed
            + self.dormant
            + self.untracked
            + self.inconclusive
    }
}

impl std::fmt::Display for CycleSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "checked={}, healthy={}, pending_start={}, crashed={}, dormant={}, untracked={}, inconclusive={}, warrants_filed={}",
            self.total(),
            self.healthy,
            self.pending_start,
            self.crashed,
            self.dormant,
            self.untracked,
            self.inconclusive,
            self.warrants_filed
        )
    }
}

/// Periodic fleet health check.
pub struct Heartbeat {
    monitor: Arc<HealthMonitor>,
    roster: Arc<dyn Roster>,
    config: HeartbeatConfig,
    warrants: Option<CrashWarrants>,
}

impl Heartbeat {
    pub fn new(monitor: Arc<HealthMonitor>, roster: Arc<dyn Roster>, config: HeartbeatConfig) -> Self {
        Self {
            monitor,
            roster,
            config,
            warrants: None,
        }
    }

    /// File a warrant for every crash detected from now on.
    pub fn with_crash_warrants(mut self, warrants: CrashWarrants) -> Self {
        self.warrants = Some(warrants);
        self
    }

    /// Run cycles until `cancel` fires. The first cycle starts immediately.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            "Starting heartbeat (interval: {:?}, check timeout: {:?})",
            self.config.interval, self.config.check_timeout
        );
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cancel.cancelled() => break,
            }
            tokio::select! {
                _ = self.run_cycle() => {}
                _ = cancel.cancelled() => {
                    info!("Heartbeat cancelled mid-cycle");
                    break;
                }
            }
        }
        info!("Heartbeat stopped");
    }

    /// Check every agent once and act on crashes.
    pub async fn run_cycle(&self) -> CycleSummary {
        let reports = self.check_all().await;
        let mut summary = CycleSummary::default();

        for report in &reports {
            summary.record(&report.health);
            if report.is_crash() && self.file_crash_warrant(report).await {
                summary.warrants_filed += 1;
            }
        }

        if summary.crashed > 0 || summary.inconclusive > 0 {
            warn!("Heartbeat cycle complete: {summary}");
        } else {
            info!("Heartbeat cycle complete: {summary}");
        }
        summary
    }

    /// Check every agent on the roster, in roster order.
    pub async fn check_all(&self) -> Vec<HealthReport> {
        let polecats = self.roster.polecats();
        debug!("Checking {} polecat(s)", polecats.len());

        let permits = u32::try_from(self.config.max_concurrent_checks.max(1)).unwrap_or(u32::MAX);
        let semaphore = Arc::new(Semaphore::new(permits as usize));
        let timeout = self.config.check_timeout;

        let tasks: Vec<(String, JoinHandle<HealthReport>)> = polecats
            .into_iter()
            .map(|polecat| {
                let target = polecat.target();
                let monitor = Arc::clone(&self.monitor);
                let semaphore = Arc::clone(&semaphore);
                let task = tokio::spawn(async move {
                    let target = polecat.target();
                    let permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(e) => return HealthReport::inconclusive(&target, "", e.to_string()),
                    };
                    // The permit lives as long as the blocking work, not the
                    // wait on it, so an abandoned check still holds its slot.
                    let check = tokio::task::spawn_blocking(move || {
                        let _permit = permit;
                        monitor.check_polecat(&polecat.rig, &polecat.name)
                    });
                    match tokio::time::timeout(timeout, check).await {
                        Ok(Ok(report)) => report,
                        Ok(Err(e)) => {
                            error!("Health check for {target} failed: {e}");
                            HealthReport::inconclusive(&target, "", format!("check failed: {e}"))
                        }
                        Err(_) => {
                            warn!("Health check for {target} timed out after {timeout:?}");
                            HealthReport::inconclusive(
                                &target,
                                "",
                                format!("timed out after {timeout:?}"),
                            )
                        }
                    }
                });
                (target, task)
            })
            .collect();

        let mut reports = Vec::with_capacity(tasks.len());
        for (target, task) in tasks {
            match task.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!("Health check task for {target} panicked: {e}");
                    reports.push(HealthReport::inconclusive(&target, "", e.to_string()));
                }
            }
        }

        // Wait for abandoned checks so their work never overlaps the next cycle.
        // External commands carry their own deadline, so this wait is bounded.
        if semaphore.available_permits() < permits as usize {
            debug!("Waiting for timed-out checks to finish");
        }
        if let Err(e) = semaphore.acquire_many(permits).await {
            warn!("Could not wait for timed-out checks: {e}");
        }
        reports
    }

    async fn file_crash_warrant(&self, report: &HealthReport) -> bool {
        let Some(warrants) = self.warrants.clone() else {
            return false;
        };
        let target = report.target.clone();
        let reason = format!(
            "session {} gone while agent_state={}",
            report.session,
            report.state.as_deref().unwrap_or("unknown")
        );

        let result = tokio::task::spawn_blocking(move || {
            warrants.store.file(&target, &reason, &warrants.filed_by)
        })
        .await;

        match result {
            Ok(Ok(FileOutcome::Filed(warrant))) => {
                info!("Filed warrant {} for crashed {}", warrant.id, report.target);
                true
            }
            Ok(Ok(FileOutcome::AlreadyPending(warrant))) => {
                debug!("Warrant {} already pending for {}", warrant.id, report.target);
                false
            }
            Ok(Err(e)) => {
                error!("Failed to file warrant for {}: {e}", report.target);
                false
            }
            Err(e) => {
                error!("Warrant filing task for {} panicked: {e}", report.target);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use town_core::beads::{AgentRecord, AgentState, BeadError, BeadStore, InMemoryBeadStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use town_core::mux::InMemoryMultiplexer;

    fn polecat(rig: &str, name: &str) -> Polecat {
        Polecat {
            rig: rig.to_string(),
            name: name.to_string(),
        }
    }

    fn registry() -> Arc<PrefixRegistry> {
        Arc::new(PrefixRegistry::from_entries([("gt", "gastown")]).unwrap())
    }

    fn fast_config() -> HeartbeatConfig {
        HeartbeatConfig {
            interval: Duration::from_millis(20),
            check_timeout: Duration::from_secs(5),
            max_concurrent_checks: 2,
        }
    }

    fn fleet() -> (Arc<InMemoryMultiplexer>, Arc<InMemoryBeadStore>, Heartbeat) {
        let mux = Arc::new(InMemoryMultiplexer::new());
        let beads = Arc::new(InMemoryBeadStore::new());
        let monitor = Arc::new(HealthMonitor::new(registry(), mux.clone(), beads.clone()));
        let roster: Arc<dyn Roster> = Arc::new(vec![
            polecat("gastown", "alpha"),
            polecat("gastown", "bravo"),
            polecat("gastown", "charlie"),
            polecat("gastown", "delta"),
        ]);
        (mux, beads, Heartbeat::new(monitor, roster, fast_config()))
    }

    #[tokio::test]
    async fn test_cycle_summary_counts() {
        let (mux, beads, heartbeat) = fleet();
        mux.add_session("gt-alpha", None);
        beads.set_state("gt-gastown-polecat-bravo", AgentState::Spawning, None);
        beads.set_state("gt-gastown-polecat-charlie", AgentState::Working, None);

        let summary = heartbeat.run_cycle().await;
        assert_eq!(
            summary,
            CycleSummary {
                healthy: 1,
                pending_start: 1,
                crashed: 1,
                dormant: 0,
                untracked: 1,
                inconclusive: 0,
                warrants_filed: 0,
            }
        );
        assert_eq!(summary.total(), 4);
    }

    #[tokio::test]
    async fn test_reports_keep_roster_order() {
        let (_, _, heartbeat) = fleet();
        let targets: Vec<String> = heartbeat
            .check_all()
            .await
            .into_iter()
            .map(|r| r.target)
            .collect();
        assert_eq!(
            targets,
            vec![
                "gastown/polecats/alpha",
                "gastown/polecats/bravo",
                "gastown/polecats/charlie",
                "gastown/polecats/delta",
            ]
        );
    }

    #[tokio::test]
    async fn test_crash_files_warrant_once() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = WarrantStore::new(temp.path());
        let (_, beads, heartbeat) = fleet();
        let heartbeat = heartbeat.with_crash_warrants(CrashWarrants {
            store: store.clone(),
            filed_by: "hq-deacon".to_string(),
        });
        beads.set_state("gt-gastown-polecat-charlie", AgentState::Working, None);

        assert_eq!(heartbeat.run_cycle().await.warrants_filed, 1);
        // Still pending: repeated detection does not refile.
        assert_eq!(heartbeat.run_cycle().await.warrants_filed, 0);

        let warrant = store.load("gastown/polecats/charlie").unwrap().unwrap();
        assert_eq!(warrant.filed_by, "hq-deacon");
        assert!(warrant.reason.contains("gt-charlie"));
        assert_eq!(store.list().unwrap().len(), 1);
    }

    struct SlowStore {
        delay: Duration,
    }

    impl BeadStore for SlowStore {
        fn agent_record(&self, _bead_id: &str) -> Result<Option<AgentRecord>, BeadError> {
            std::thread::sleep(self.delay);
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_timeout_is_inconclusive() {
        let mux = Arc::new(InMemoryMultiplexer::new());
        let beads = Arc::new(SlowStore {
            delay: Duration::from_millis(500),
        });
        let monitor = Arc::new(HealthMonitor::new(registry(), mux, beads));
        let heartbeat = Heartbeat::new(
            monitor,
            Arc::new(vec![polecat("gastown", "alpha")]),
            HeartbeatConfig {
                check_timeout: Duration::from_millis(50),
                ..fast_config()
            },
        );

        let summary = heartbeat.run_cycle().await;
        assert_eq!(summary.inconclusive, 1);
        assert_eq!(summary.crashed, 0);
    }

    /// Bead store that tracks how many lookups run at once.
    struct CountingStore {
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl BeadStore for CountingStore {
        fn agent_record(&self, _bead_id: &str) -> Result<Option<AgentRecord>, BeadError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_timed_out_checks_keep_concurrency_bound() {
        let mux = Arc::new(InMemoryMultiplexer::new());
        let beads = Arc::new(CountingStore {
            delay: Duration::from_millis(100),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let monitor = Arc::new(HealthMonitor::new(registry(), mux, beads.clone()));
        let heartbeat = Heartbeat::new(
            monitor,
            Arc::new(vec![
                polecat("gastown", "alpha"),
                polecat("gastown", "bravo"),
                polecat("gastown", "charlie"),
                polecat("gastown", "delta"),
            ]),
            HeartbeatConfig {
                interval: Duration::from_millis(20),
                check_timeout: Duration::from_millis(20),
                max_concurrent_checks: 1,
            },
        );

        let summary = heartbeat.run_cycle().await;
        assert_eq!(summary.inconclusive, 4);
        assert_eq!(beads.peak.load(Ordering::SeqCst), 1);
        // The cycle does not return while abandoned work is still running.
        assert_eq!(beads.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let (_, beads, heartbeat) = fleet();
        let cancel = CancellationToken::new();
        let heartbeat = Arc::new(heartbeat);

        let task = {
            let heartbeat = Arc::clone(&heartbeat);
            let cancel = cancel.clone();
            tokio::spawn(async move { heartbeat.run(cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(70)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("heartbeat did not stop")
            .unwrap();

        // Several cycles ran, each looking up the four absent polecats.
        assert!(beads.lookups().len() >= 4);
    }

    #[test]
    fn test_town_roster_reads_directories() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("gastown/polecats/toast")).unwrap();
        let roster = TownRoster::new(temp.path(), registry());
        assert_eq!(roster.polecats(), vec![polecat("gastown", "toast")]);
    }
}
