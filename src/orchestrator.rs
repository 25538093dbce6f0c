//! Workflow orchestration.
//!
//! One workflow run fans every configured checker out as its own task,
//! bounds how many run at once with a FIFO admission gate, retries failed
//! attempts with linear backoff and gathers all outcomes before compiling
//! the aggregate report. A single checker's failure never fails the run.

use crate::analysis::compile_report;
use crate::checkers::Checker;
use crate::config::OrchestratorConfig;
use crate::enrichment::{EnrichmentClient, ThoughtEntry, ThoughtStats};
use crate::error::OrchestratorError;
use crate::executor::{DetailedStats, ManagedChecker};
use crate::models::{
    AggregateReport, CheckerOutcome, ExecutionLogEntry, ExecutionStats, FailureRecord,
    SessionStatus, WorkflowSession,
};
use crate::registry::CheckerRegistry;
use chrono::Utc;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, error, info, warn};

/// Runs checker workflows and keeps their sessions.
pub struct Orchestrator {
    config: Arc<OrchestratorConfig>,
    registry: Arc<CheckerRegistry>,
    enrichment: Option<Arc<EnrichmentClient>>,
    sessions: RwLock<HashMap<String, WorkflowSession>>,
    history: Mutex<VecDeque<WorkflowSession>>,
}

/// Everything one spawned checker task needs.
struct CheckerTask {
    checker: Arc<ManagedChecker>,
    project: Arc<Value>,
    session_id: String,
    enrichment: Option<Arc<EnrichmentClient>>,
    gate: Arc<Semaphore>,
    config: Arc<OrchestratorConfig>,
}

impl CheckerTask {
    /// Attempt until success or the retry budget is spent; the last outcome
    /// is returned either way. The gate permit is held per attempt and
    /// released during backoff.
    async fn run(self) -> CheckerOutcome {
        let attempts = self.config.retry_count.max(1);
        let mut attempt = 1;

        loop {
            let outcome = {
                let _permit = match self.gate.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return CheckerOutcome::Errored(
                            FailureRecord::new(self.checker.name(), "admission gate closed")
                                .in_session(&self.session_id),
                        )
                    }
                };
                self.checker
                    .run(&self.project, &self.session_id, self.enrichment.as_deref())
                    .await
            };

            if !outcome.is_failed() || attempt >= attempts {
                return outcome;
            }

            let delay = self.config.backoff(attempt);
            warn!(
                "Checker {} attempt {}/{} failed, retrying in {:?}",
                self.checker.name(),
                attempt,
                attempts,
                delay
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}

/// A gathered task outcome.
struct Settled {
    name: String,
    outcome: CheckerOutcome,
    timed_out: bool,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        registry: Arc<CheckerRegistry>,
        enrichment: Option<Arc<EnrichmentClient>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            enrichment,
            sessions: RwLock::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<CheckerRegistry> {
        &self.registry
    }

    pub fn register_agent(&self, checker: Arc<dyn Checker>) -> Arc<ManagedChecker> {
        self.registry.register(checker)
    }

    /// Run every configured checker against `project` and return the report.
    ///
    /// Only an invalid `project_id` is an error; checker failures, panics and
    /// timeouts are recorded in the report.
    pub async fn execute_workflow(
        &self,
        project_id: &str,
        project: &Value,
    ) -> Result<AggregateReport, OrchestratorError> {
        self.run_workflow(project_id, project)
            .await
            .map(|(report, _)| report)
    }

    /// Like [`execute_workflow`](Self::execute_workflow), returning the
    /// completed session (id, results, report) instead.
    ///
    /// The session is returned even when `history_limit` keeps it out of the
    /// history.
    pub async fn execute_session(
        &self,
        project_id: &str,
        project: &Value,
    ) -> Result<WorkflowSession, OrchestratorError> {
        self.run_workflow(project_id, project)
            .await
            .map(|(_, session)| session)
    }

    async fn run_workflow(
        &self,
        project_id: &str,
        project: &Value,
    ) -> Result<(AggregateReport, WorkflowSession), OrchestratorError> {
        validate_project_id(project_id)?;
        let session = self.start_session(project_id);
        let session_id = session.session_id.clone();
        info!("Starting workflow {} for project {}", session_id, project_id);

        let checkers = self.resolve_checkers();
        debug!("Resolved {} checkers", checkers.len());

        let gate = Arc::new(Semaphore::new(self.config.max_concurrent_checkers.max(1)));
        let project = Arc::new(project.clone());
        let deadline = Instant::now().checked_add(self.config.timeout());
        if deadline.is_none() {
            warn!(
                "Timeout of {}s is out of range, running without a deadline",
                self.config.timeout_seconds
            );
        }

        let tasks: Vec<(Arc<ManagedChecker>, JoinHandle<CheckerOutcome>)> = checkers
            .into_iter()
            .map(|checker| {
                let task = CheckerTask {
                    checker: Arc::clone(&checker),
                    project: Arc::clone(&project),
                    session_id: session_id.clone(),
                    enrichment: self.enrichment.clone(),
                    gate: Arc::clone(&gate),
                    config: Arc::clone(&self.config),
                };
                (checker, tokio::spawn(task.run()))
            })
            .collect();

        let settled = join_all(
            tasks
                .into_iter()
                .map(|(checker, handle)| self.settle(checker, handle, deadline, &session_id)),
        )
        .await;

        let timed_out = settled.iter().any(|s| s.timed_out);
        let results: BTreeMap<String, CheckerOutcome> =
            settled.into_iter().map(|s| (s.name, s.outcome)).collect();

        let report = compile_report(&results);
        info!(
            "Workflow {} completed: {} ({} passed, {} failed, {} warnings)",
            session_id,
            report.overall_status,
            report.summary.passed,
            report.summary.failed,
            report.summary.warnings
        );

        let session = self.finish_session(session, results, report.clone(), timed_out);
        Ok((report, session))
    }

    /// Configured names that are registered, in order, without duplicates.
    fn resolve_checkers(&self) -> Vec<Arc<ManagedChecker>> {
        let mut seen = HashSet::new();
        self.config
            .checkers
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .filter_map(|name| {
                let checker = self.registry.get(name);
                if checker.is_none() {
                    debug!("Checker {} is not registered, skipping", name);
                }
                checker
            })
            .collect()
    }

    /// Wait for one task until the workflow deadline, if there is one.
    async fn settle(
        &self,
        checker: Arc<ManagedChecker>,
        mut handle: JoinHandle<CheckerOutcome>,
        deadline: Option<Instant>,
        session_id: &str,
    ) -> Settled {
        let name = checker.name().to_string();

        let joined = match deadline {
            Some(deadline) => timeout_at(deadline, &mut handle).await.ok(),
            None => Some((&mut handle).await),
        };

        let (outcome, timed_out) = match joined {
            Some(Ok(outcome)) => (outcome, false),
            Some(Err(e)) => {
                let message = join_error_message(e);
                error!("Checker {} task failed: {}", name, message);
                checker.record_abort(session_id, &message);
                (failure(&name, message, session_id), false)
            }
            None => {
                handle.abort();
                let message = format!(
                    "workflow timed out after {}s",
                    self.config.timeout_seconds
                );
                warn!("Checker {} aborted: {}", name, message);
                checker.record_abort(session_id, &message);
                (failure(&name, message, session_id), true)
            }
        };

        Settled {
            name,
            outcome,
            timed_out,
        }
    }

    fn start_session(&self, project_id: &str) -> WorkflowSession {
        let base = format!("{}_{}", project_id, Utc::now().format("%Y%m%d%H%M%S"));

        let mut sessions = self.sessions.write();
        let session_id = unique_session_id(&base, |id| sessions.contains_key(id));
        let session = WorkflowSession {
            session_id: session_id.clone(),
            project_id: project_id.to_string(),
            started_at: Utc::now(),
            status: SessionStatus::Running,
            results: BTreeMap::new(),
            completed_at: None,
            final_report: None,
            timed_out: false,
        };
        sessions.insert(session_id, session.clone());

        session
    }

    fn finish_session(
        &self,
        mut session: WorkflowSession,
        results: BTreeMap<String, CheckerOutcome>,
        report: AggregateReport,
        timed_out: bool,
    ) -> WorkflowSession {
        session.status = SessionStatus::Completed;
        session.completed_at = Some(Utc::now());
        session.results = results;
        session.final_report = Some(report);
        session.timed_out = timed_out;

        self.sessions
            .write()
            .insert(session.session_id.clone(), session.clone());

        let mut history = self.history.lock();
        history.push_back(session.clone());
        while history.len() > self.config.history_limit {
            history.pop_front();
        }

        session
    }

    pub fn get_session(&self, session_id: &str) -> Option<WorkflowSession> {
        self.sessions.read().get(session_id).cloned()
    }

    /// All sessions, oldest first.
    pub fn get_all_sessions(&self) -> Vec<WorkflowSession> {
        let mut sessions: Vec<WorkflowSession> = self.sessions.read().values().cloned().collect();
        sessions.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        sessions
    }

    /// The most recent `limit` completed sessions, oldest first.
    pub fn get_workflow_history(&self, limit: usize) -> Vec<WorkflowSession> {
        let history = self.history.lock();
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }

    pub fn get_agent_stats(&self) -> BTreeMap<String, ExecutionStats> {
        self.registry
            .all()
            .iter()
            .map(|c| (c.name().to_string(), c.stats()))
            .collect()
    }

    pub fn get_detailed_agent_stats(&self, name: &str) -> Option<DetailedStats> {
        self.registry
            .get(name)
            .map(|c| c.detailed_stats(self.enrichment.as_deref()))
    }

    /// Execution log entries across checkers, ordered by time.
    pub fn execution_logs(
        &self,
        session_id: Option<&str>,
        agent: Option<&str>,
    ) -> Vec<ExecutionLogEntry> {
        let mut entries: Vec<ExecutionLogEntry> = self
            .registry
            .all()
            .iter()
            .filter(|c| agent.map_or(true, |a| c.name() == a))
            .flat_map(|c| c.execution_log(session_id))
            .collect();
        entries.sort_by_key(|e| e.timestamp);
        entries
    }

    /// Enrichment thought log; empty when enrichment is off.
    pub fn thought_logs(
        &self,
        session_id: Option<&str>,
        agent: Option<&str>,
        limit: usize,
    ) -> Vec<ThoughtEntry> {
        self.enrichment
            .as_ref()
            .map(|e| e.thought_logs(session_id, agent, limit))
            .unwrap_or_default()
    }

    pub fn thought_stats(&self) -> BTreeMap<String, ThoughtStats> {
        self.enrichment
            .as_ref()
            .map(|e| e.thought_stats())
            .unwrap_or_default()
    }

    pub fn clear_thought_logs(&self) {
        if let Some(enrichment) = &self.enrichment {
            enrichment.clear_thought_logs();
        }
    }
}

fn validate_project_id(project_id: &str) -> Result<(), OrchestratorError> {
    if project_id.is_empty() || project_id.chars().any(char::is_whitespace) {
        return Err(OrchestratorError::InvalidProjectId(project_id.to_string()));
    }
    Ok(())
}

/// `base`, or `base_<n>` with the smallest `n >= 2` that is not taken.
fn unique_session_id(base: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut candidate = base.to_string();
    let mut n = 1;
    while taken(&candidate) {
        n += 1;
        candidate = format!("{}_{}", base, n);
    }
    candidate
}

fn failure(name: &str, message: String, session_id: &str) -> CheckerOutcome {
    CheckerOutcome::Errored(FailureRecord::new(name, message).in_session(session_id))
}

fn join_error_message(e: JoinError) -> String {
    if !e.is_panic() {
        return "checker task was cancelled".to_string();
    }

    let payload = e.into_panic();
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("checker panicked: {}", detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkers::{CheckerDescriptor, Findings, WallChecker, WALL};
    use crate::config::EnrichmentConfig;
    use crate::error::CheckerError;
    use crate::models::{AnalysisResult, AnalysisStatus, CheckerStatus, OverallStatus};
    use async_trait::async_trait;
    use serde_json::{json, Map};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Fails its first `failures` calls, then passes.
    struct FlakyChecker {
        descriptor: CheckerDescriptor,
        failures: usize,
        calls: AtomicUsize,
    }

    impl FlakyChecker {
        fn new(name: &str, failures: usize) -> Self {
            Self {
                descriptor: CheckerDescriptor::new(name, "test", Vec::new()),
                failures,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Checker for FlakyChecker {
        fn descriptor(&self) -> &CheckerDescriptor {
            &self.descriptor
        }

        async fn analyze(&self, _project: &Value) -> Result<AnalysisResult, CheckerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(CheckerError::Analysis(format!("attempt {} failed", call)));
            }
            Ok(Findings::new().into_result(Map::new()))
        }
    }

    /// Sleeps while tracking how many instances are inside `analyze`.
    struct SlowChecker {
        descriptor: CheckerDescriptor,
        delay: Duration,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Checker for SlowChecker {
        fn descriptor(&self) -> &CheckerDescriptor {
            &self.descriptor
        }

        async fn analyze(&self, _project: &Value) -> Result<AnalysisResult, CheckerError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Findings::new().into_result(Map::new()))
        }
    }

    struct PanickingChecker {
        descriptor: CheckerDescriptor,
    }

    #[async_trait]
    impl Checker for PanickingChecker {
        fn descriptor(&self) -> &CheckerDescriptor {
            &self.descriptor
        }

        async fn analyze(&self, _project: &Value) -> Result<AnalysisResult, CheckerError> {
            panic!("drawing parser exploded");
        }
    }

    fn config(checkers: &[&str]) -> OrchestratorConfig {
        OrchestratorConfig {
            retry_backoff_ms: 1,
            checkers: checkers.iter().map(|c| c.to_string()).collect(),
            ..OrchestratorConfig::default()
        }
    }

    fn orchestrator(config: OrchestratorConfig, checkers: Vec<Arc<dyn Checker>>) -> Orchestrator {
        let registry = Arc::new(CheckerRegistry::new());
        for checker in checkers {
            registry.register(checker);
        }
        Orchestrator::new(config, registry, None)
    }

    #[tokio::test]
    async fn test_always_failing_checker_is_recorded_not_raised() {
        let flaky = Arc::new(FlakyChecker::new("broken_agent", usize::MAX));
        let orchestrator = orchestrator(config(&["broken_agent"]), vec![flaky.clone()]);

        let report = orchestrator.execute_workflow("p1", &json!({})).await.unwrap();

        assert_eq!(report.agents["broken_agent"].status, AnalysisStatus::Failed);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.overall_status, OverallStatus::Fail);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);

        let stats = &orchestrator.get_agent_stats()["broken_agent"];
        assert_eq!(stats.run_count, 3);
        assert_eq!(stats.error_count, 3);
    }

    #[tokio::test]
    async fn test_retry_recovers_flaky_checker() {
        let flaky = Arc::new(FlakyChecker::new("flaky_agent", 2));
        let orchestrator = orchestrator(config(&["flaky_agent"]), vec![flaky.clone()]);

        let report = orchestrator.execute_workflow("p1", &json!({})).await.unwrap();

        assert_eq!(report.overall_status, OverallStatus::Pass);
        assert_eq!(report.summary.passed, 1);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_single_attempt_when_retries_is_one() {
        let flaky = Arc::new(FlakyChecker::new("flaky_agent", 1));
        let config = OrchestratorConfig {
            retry_count: 1,
            ..config(&["flaky_agent"])
        };
        let orchestrator = orchestrator(config, vec![flaky.clone()]);

        let report = orchestrator.execute_workflow("p1", &json!({})).await.unwrap();
        assert_eq!(report.summary.failed, 1);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_admission_gate_bounds_running_checkers() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let names: Vec<String> = (0..5).map(|i| format!("slow_{}", i)).collect();

        let registry = Arc::new(CheckerRegistry::new());
        for name in &names {
            registry.register(Arc::new(SlowChecker {
                descriptor: CheckerDescriptor::new(name, "test", Vec::new()),
                delay: Duration::from_millis(60),
                in_flight: Arc::clone(&in_flight),
                peak: Arc::clone(&peak),
            }));
        }

        let config = OrchestratorConfig {
            max_concurrent_checkers: 2,
            checkers: names.clone(),
            ..OrchestratorConfig::default()
        };
        let orchestrator = Orchestrator::new(config, Arc::clone(&registry), None);

        let done = Arc::new(AtomicBool::new(false));
        let sampler = tokio::spawn({
            let registry = Arc::clone(&registry);
            let done = Arc::clone(&done);
            async move {
                let mut sampled_peak = 0;
                while !done.load(Ordering::SeqCst) {
                    let running = registry
                        .all()
                        .iter()
                        .filter(|c| c.status() == CheckerStatus::Running)
                        .count();
                    sampled_peak = sampled_peak.max(running);
                    sleep(Duration::from_millis(5)).await;
                }
                sampled_peak
            }
        });

        let report = orchestrator.execute_workflow("p1", &json!({})).await.unwrap();
        done.store(true, Ordering::SeqCst);
        let sampled_peak = sampler.await.unwrap();

        assert_eq!(report.summary.passed, 5);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert!(sampled_peak <= 2, "sampled {} running checkers", sampled_peak);
    }

    #[tokio::test]
    async fn test_panicking_checker_becomes_failure() {
        let orchestrator = orchestrator(
            config(&["panicky_agent", WALL]),
            vec![
                Arc::new(PanickingChecker {
                    descriptor: CheckerDescriptor::new("panicky_agent", "test", Vec::new()),
                }),
                Arc::new(WallChecker::new()),
            ],
        );

        let report = orchestrator.execute_workflow("p1", &json!({})).await.unwrap();

        let panicky = &report.agents["panicky_agent"];
        assert_eq!(panicky.status, AnalysisStatus::Failed);
        assert!(panicky.errors[0].contains("drawing parser exploded"));
        assert_eq!(report.agents[WALL].status, AnalysisStatus::Completed);
        assert_eq!(
            orchestrator.get_agent_stats()["panicky_agent"].status,
            CheckerStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_timeout_aborts_stragglers() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let config = OrchestratorConfig {
            timeout_seconds: 1,
            ..config(&["stuck_agent", WALL])
        };
        let orchestrator = orchestrator(
            config,
            vec![
                Arc::new(SlowChecker {
                    descriptor: CheckerDescriptor::new("stuck_agent", "test", Vec::new()),
                    delay: Duration::from_secs(30),
                    in_flight,
                    peak,
                }),
                Arc::new(WallChecker::new()),
            ],
        );

        let report = orchestrator.execute_workflow("p1", &json!({})).await.unwrap();

        assert_eq!(report.agents["stuck_agent"].status, AnalysisStatus::Failed);
        assert!(report.agents["stuck_agent"].errors[0].contains("timed out"));
        assert_eq!(report.agents[WALL].compliance, Some(true));

        let session = orchestrator.get_all_sessions().pop().unwrap();
        assert!(session.timed_out);
        assert_eq!(session.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_out_of_range_timeout_runs_without_deadline() {
        let config = OrchestratorConfig {
            timeout_seconds: u64::MAX,
            ..config(&[WALL])
        };
        let orchestrator = orchestrator(config, vec![Arc::new(WallChecker::new())]);

        let report = orchestrator.execute_workflow("p1", &json!({})).await.unwrap();
        assert_eq!(report.overall_status, OverallStatus::Pass);

        let session = orchestrator.get_all_sessions().pop().unwrap();
        assert!(!session.timed_out);
    }

    #[tokio::test]
    async fn test_execute_session_without_history() {
        let config = OrchestratorConfig {
            history_limit: 0,
            ..config(&[WALL])
        };
        let orchestrator = orchestrator(config, vec![Arc::new(WallChecker::new())]);

        let session = orchestrator.execute_session("p1", &json!({})).await.unwrap();

        assert!(orchestrator.get_workflow_history(10).is_empty());
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.final_report.as_ref().unwrap().summary.passed, 1);
        assert_eq!(orchestrator.get_session(&session.session_id), Some(session));
    }

    #[tokio::test]
    async fn test_unregistered_names_are_skipped() {
        let orchestrator = orchestrator(
            config(&[WALL, "ghost_agent", WALL]),
            vec![Arc::new(WallChecker::new())],
        );

        let report = orchestrator.execute_workflow("p1", &json!({})).await.unwrap();
        assert_eq!(report.summary.total, 1);
        assert!(report.agents.contains_key(WALL));
    }

    #[tokio::test]
    async fn test_invalid_project_id_is_fatal() {
        let orchestrator = orchestrator(config(&[]), Vec::new());

        for bad in ["", "house a", "tab\tid"] {
            let err = orchestrator.execute_workflow(bad, &json!({})).await.unwrap_err();
            assert_eq!(err, OrchestratorError::InvalidProjectId(bad.to_string()));
        }
        assert!(orchestrator.get_all_sessions().is_empty());
    }

    #[tokio::test]
    async fn test_sessions_and_bounded_history() {
        let config = OrchestratorConfig {
            history_limit: 2,
            ..config(&[WALL])
        };
        let orchestrator = orchestrator(config, vec![Arc::new(WallChecker::new())]);

        for _ in 0..3 {
            orchestrator.execute_workflow("p1", &json!({})).await.unwrap();
        }

        let sessions = orchestrator.get_all_sessions();
        assert_eq!(sessions.len(), 3);
        let ids: HashSet<&str> = sessions.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids.len(), 3);

        let history = orchestrator.get_workflow_history(10);
        assert_eq!(history.len(), 2);
        assert_eq!(orchestrator.get_workflow_history(1).len(), 1);

        let latest = &history[1];
        assert_eq!(latest.status, SessionStatus::Completed);
        assert!(latest.completed_at.is_some());
        assert!(latest.final_report.is_some());
        assert!(latest.session_id.starts_with("p1_"));
        let fetched = orchestrator.get_session(&latest.session_id).unwrap();
        assert_eq!(fetched.results.len(), 1);
    }

    #[test]
    fn test_unique_session_id_suffixes_collisions() {
        let taken: HashSet<&str> = ["p1_20260101000000", "p1_20260101000000_2"].into();
        assert_eq!(
            unique_session_id("p1_20260101000000", |id| taken.contains(id)),
            "p1_20260101000000_3"
        );
        assert_eq!(unique_session_id("p2_20260101000000", |id| taken.contains(id)), "p2_20260101000000");
    }

    #[tokio::test]
    async fn test_full_workflow_with_offline_enrichment() {
        let enrichment = EnrichmentClient::new(EnrichmentConfig {
            api_key: Some(String::new()),
            ..EnrichmentConfig::default()
        })
        .unwrap();
        let orchestrator = Orchestrator::new(
            OrchestratorConfig::default(),
            Arc::new(CheckerRegistry::with_defaults()),
            Some(Arc::new(enrichment)),
        );

        let project = json!({
            "id": "erf-1234",
            "walls": [{"id": "w1", "thickness_mm": 230, "material": "brick", "r_value": 2.0, "area_sqm": 20}],
            "rooms": [{"id": "r1", "type": "bedroom", "area_sqm": 12}]
        });
        let report = orchestrator.execute_workflow("erf-1234", &project).await.unwrap();

        assert_eq!(report.summary.total, 7);
        assert_eq!(
            report.summary.passed + report.summary.failed + report.summary.warnings,
            7
        );
        // No documents or drawings were submitted.
        assert_eq!(report.agents["council_agent"].compliance, Some(false));
        assert_eq!(report.overall_status, OverallStatus::Fail);

        let session = orchestrator.get_all_sessions().pop().unwrap();
        assert_eq!(
            orchestrator.thought_logs(Some(&session.session_id), None, 100).len(),
            7
        );
        assert!(!orchestrator
            .execution_logs(Some(&session.session_id), Some(WALL))
            .is_empty());
        assert_eq!(orchestrator.thought_stats()[WALL].fallback, 1);

        let detailed = orchestrator.get_detailed_agent_stats(WALL).unwrap();
        assert_eq!(detailed.total_ai_calls, 1);

        orchestrator.clear_thought_logs();
        assert!(orchestrator.thought_logs(None, None, 100).is_empty());
    }
}
