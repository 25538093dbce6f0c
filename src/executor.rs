//! Execution wrapper around a checker.
//!
//! A [`ManagedChecker`] owns the per-checker statistics and execution log,
//! converts checker errors into failure records and runs the best-effort
//! enrichment step. Locks are only held for bookkeeping, never across an
//! await point.

use crate::checkers::Checker;
use crate::enrichment::{ChatMessage, EnrichmentClient, ThoughtEntry};
use crate::models::{
    AnalysisResult, CheckerOutcome, CheckerStatus, EnrichedResult, Enrichment, ExecutionLogEntry,
    ExecutionStats, FailureRecord, LastRun,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{error, info};

/// Execution log entries kept per checker.
pub const EXECUTION_LOG_LIMIT: usize = 5000;

const RECENT_THOUGHTS: usize = 10;
const RECENT_LOG_ENTRIES: usize = 50;

/// System prompt sent with every enrichment request.
pub const SYSTEM_PROMPT: &str = r#"You are an expert architectural compliance analyst for South African building regulations.
You specialize in SANS 10400 (National Building Regulations) and Johannesburg Municipal By-laws.
Your role is to analyze compliance results and provide expert recommendations.

When analyzing:
1. Consider SANS 10400-B (Walls), SANS 10400-A (Dimensions), SANS 10400-K (Openings),
   SANS 10400-XA (Energy), and municipal regulations
2. Provide risk assessments based on severity
3. Recommend specific actions to address failures
4. Consider both structural and regulatory compliance

Always respond in JSON format."#;

#[derive(Debug, Default)]
struct RunState {
    status: CheckerStatus,
    run_count: u64,
    success_count: u64,
    error_count: u64,
    last_run: Option<LastRun>,
    /// Start time of each run in flight, keyed by session.
    in_flight: HashMap<String, DateTime<Utc>>,
}

impl RunState {
    /// Close the run for `session_id`; the status only leaves `Running` once
    /// no other session is mid-run.
    fn close(&mut self, session_id: &str, terminal: CheckerStatus) {
        self.in_flight.remove(session_id);
        self.status = if self.in_flight.is_empty() {
            terminal
        } else {
            CheckerStatus::Running
        };
    }
}

/// Stats plus recent enrichment and log activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedStats {
    #[serde(flatten)]
    pub stats: ExecutionStats,
    pub total_ai_calls: usize,
    pub recent_thoughts: Vec<ThoughtEntry>,
    pub execution_log: Vec<ExecutionLogEntry>,
}

/// A registered checker together with its runtime bookkeeping.
pub struct ManagedChecker {
    checker: Arc<dyn Checker>,
    state: Mutex<RunState>,
    log: Mutex<VecDeque<ExecutionLogEntry>>,
}

impl ManagedChecker {
    pub fn new(checker: Arc<dyn Checker>) -> Self {
        Self {
            checker,
            state: Mutex::new(RunState::default()),
            log: Mutex::new(VecDeque::new()),
        }
    }

    pub fn name(&self) -> &str {
        self.checker.name()
    }

    pub fn checker(&self) -> &Arc<dyn Checker> {
        &self.checker
    }

    pub fn status(&self) -> CheckerStatus {
        self.state.lock().status
    }

    /// Run the checker once. Errors become a failure record; never panics
    /// unless the checker itself does.
    pub async fn run(
        &self,
        project: &Value,
        session_id: &str,
        enrichment: Option<&EnrichmentClient>,
    ) -> CheckerOutcome {
        let start = Utc::now();
        {
            let mut state = self.state.lock();
            state.status = CheckerStatus::Running;
            state.run_count += 1;
            state.in_flight.insert(session_id.to_string(), start);
        }

        self.log(
            session_id,
            "session_start",
            json!(format!("Starting analysis session: {}", session_id)),
        );
        self.log(
            session_id,
            "run_started",
            json!(format!(
                "Starting analysis for project {}",
                project_label(project)
            )),
        );

        match self.checker.analyze(project).await {
            Ok(result) => {
                let enrichment = self.enrich(project, &result, session_id, enrichment).await;

                let end = Utc::now();
                {
                    let mut state = self.state.lock();
                    state.close(session_id, CheckerStatus::Completed);
                    state.success_count += 1;
                    state.last_run = Some(LastRun {
                        start,
                        end,
                        success: true,
                        result: Some(result.clone()),
                        error: None,
                        session_id: Some(session_id.to_string()),
                    });
                }

                let elapsed = (end - start).num_milliseconds() as f64 / 1000.0;
                self.log(
                    session_id,
                    "run_completed",
                    json!(format!("Analysis completed successfully in {:.2}s", elapsed)),
                );

                CheckerOutcome::Analyzed(Box::new(EnrichedResult {
                    result,
                    enrichment,
                    session_id: Some(session_id.to_string()),
                }))
            }
            Err(e) => {
                let message = e.to_string();
                self.record_failure(session_id, start, &message);
                self.log(
                    session_id,
                    "run_failed",
                    json!(format!("Analysis failed: {}", message)),
                );
                error!("Checker {} failed: {}", self.name(), message);

                CheckerOutcome::Errored(FailureRecord::new(self.name(), message).in_session(session_id))
            }
        }
    }

    /// Record a run that never returned (aborted or panicked).
    ///
    /// Only counts as an error when this session has a run in flight; an
    /// abort during retry backoff just gets logged, and runs of other
    /// sessions are left alone.
    pub fn record_abort(&self, session_id: &str, reason: &str) {
        {
            let mut state = self.state.lock();
            if let Some(start) = state.in_flight.get(session_id).copied() {
                fail_run(&mut state, session_id, start, reason);
            }
        }
        self.log(session_id, "run_aborted", json!(reason));
    }

    fn record_failure(&self, session_id: &str, start: DateTime<Utc>, message: &str) {
        fail_run(&mut self.state.lock(), session_id, start, message);
    }

    async fn enrich(
        &self,
        project: &Value,
        result: &AnalysisResult,
        session_id: &str,
        client: Option<&EnrichmentClient>,
    ) -> Enrichment {
        let Some(client) = client else {
            return Enrichment::disabled();
        };

        let prompt = match enhancement_prompt(project, result) {
            Ok(prompt) => prompt,
            Err(e) => {
                self.log(session_id, "ai_enhancement_failed", json!(e.to_string()));
                return Enrichment::failed(e.to_string());
            }
        };

        let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt.as_str())];
        let completion = client
            .complete(&messages, Some(session_id), Some(self.name()))
            .await;

        self.log(
            session_id,
            "ai_thinking",
            json!({
                "prompt_length": prompt.len(),
                "response_length": completion.content.len(),
            }),
        );

        let analysis = serde_json::from_str::<Value>(&completion.content).unwrap_or_else(|_| {
            json!({
                "ai_summary": completion.content,
                "ai_recommendations": [],
            })
        });

        Enrichment {
            ai_enabled: true,
            ai_enhanced: true,
            ai_model: Some(completion.model),
            ai_analysis: Some(analysis),
            ai_thinking: Some(completion.thinking),
            using_fallback: completion.fallback,
            ai_error: None,
        }
    }

    fn log(&self, session_id: &str, event: &str, details: Value) {
        info!("[{}] {}: {}", self.name(), event, details);

        let mut log = self.log.lock();
        log.push_back(ExecutionLogEntry {
            timestamp: Utc::now(),
            agent: self.name().to_string(),
            session_id: Some(session_id.to_string()),
            event: event.to_string(),
            details,
        });
        while log.len() > EXECUTION_LOG_LIMIT {
            log.pop_front();
        }
    }

    /// Log entries, optionally restricted to one session.
    pub fn execution_log(&self, session_id: Option<&str>) -> Vec<ExecutionLogEntry> {
        self.log
            .lock()
            .iter()
            .filter(|e| session_id.map_or(true, |s| e.session_id.as_deref() == Some(s)))
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> ExecutionStats {
        let execution_log_count = self.log.lock().len();
        let state = self.state.lock();
        let descriptor = self.checker.descriptor();

        ExecutionStats {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            status: state.status,
            run_count: state.run_count,
            success_count: state.success_count,
            error_count: state.error_count,
            last_run: state.last_run.clone(),
            execution_log_count,
        }
    }

    pub fn detailed_stats(&self, client: Option<&EnrichmentClient>) -> DetailedStats {
        let (total_ai_calls, recent_thoughts) = match client {
            Some(client) => (
                client.call_count(self.name()),
                client.thought_logs(None, Some(self.name()), RECENT_THOUGHTS),
            ),
            None => (0, Vec::new()),
        };

        let log = self.log.lock();
        let skip = log.len().saturating_sub(RECENT_LOG_ENTRIES);
        let execution_log = log.iter().skip(skip).cloned().collect();
        drop(log);

        DetailedStats {
            stats: self.stats(),
            total_ai_calls,
            recent_thoughts,
            execution_log,
        }
    }
}

fn fail_run(state: &mut RunState, session_id: &str, start: DateTime<Utc>, message: &str) {
    state.close(session_id, CheckerStatus::Failed);
    state.error_count += 1;
    state.last_run = Some(LastRun {
        start,
        end: Utc::now(),
        success: false,
        result: None,
        error: Some(message.to_string()),
        session_id: Some(session_id.to_string()),
    });
}

fn project_label(project: &Value) -> String {
    match project.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "unknown".to_string(),
    }
}

/// Prompt embedding the project data and the checker's result.
pub fn enhancement_prompt(
    project: &Value,
    result: &AnalysisResult,
) -> Result<String, serde_json::Error> {
    let project = serde_json::to_string_pretty(project)?;
    let result = serde_json::to_string_pretty(result)?;

    Ok(format!(
        r#"Analyze the following architectural compliance results and provide detailed insights:

Project Data:
{project}

Current Analysis Results:
{result}

Please provide:
1. A detailed summary of findings
2. Any additional compliance issues that may have been missed
3. Recommended actions for addressing any failures
4. Risk assessment for each issue found

Format your response as JSON with the following structure:
{{
    "ai_summary": "Detailed summary of findings",
    "additional_findings": ["Any additional issues found"],
    "risk_assessment": {{"issue": "risk_level"}},
    "recommendations": ["Recommended actions"],
    "compliance_status": "PASS/FAIL/WARNING"
}}
"#
    ))
}
