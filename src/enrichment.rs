//! Chat-completion client used to enrich checker results.
//!
//! Enrichment is never required for correctness. Without a key, or when the
//! endpoint errors, the client answers with a canned response chosen by
//! keywords in the prompt and flags it as a fallback. Every call lands in a
//! bounded thought log for auditing.

use crate::config::EnrichmentConfig;
use crate::error::EnrichmentError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use tracing::{debug, warn};

const REFERER: &str = "https://plancheck.dev";
const TITLE: &str = "PlanCheck Compliance Agents";

/// Model name reported for canned responses.
pub const FALLBACK_MODEL: &str = "fallback";

/// Message in a chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion API request.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

/// Chat completion API response.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Value,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

/// Answer to one `complete` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// `true` only when the endpoint answered.
    pub success: bool,
    pub content: String,
    pub model: String,
    pub usage: Value,
    pub thinking: String,
    pub fallback: bool,
}

/// How a logged call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThoughtStatus {
    Completed,
    Error,
    Fallback,
}

/// One audited enrichment call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThoughtEntry {
    pub session_id: Option<String>,
    pub agent: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub prompt: Vec<ChatMessage>,
    pub temperature: f32,
    pub status: ThoughtStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Rough description of the exchange size.
    pub thinking_process: String,
}

/// Per-agent thought log counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThoughtStats {
    pub total_calls: usize,
    pub successful: usize,
    pub failed: usize,
    pub fallback: usize,
    pub last_activity: Option<DateTime<Utc>>,
}

/// Client for an OpenRouter-style chat completion endpoint.
pub struct EnrichmentClient {
    config: EnrichmentConfig,
    api_key: Option<String>,
    http_client: reqwest::Client,
    thoughts: Mutex<VecDeque<ThoughtEntry>>,
}

impl EnrichmentClient {
    /// Create a client. The API key is resolved once, here.
    pub fn new(config: EnrichmentConfig) -> Result<Self, EnrichmentError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        let api_key = config.resolved_api_key();
        if api_key.is_none() {
            warn!("Enrichment API key not configured, responses will use fallbacks");
        }

        Ok(Self {
            config,
            api_key,
            http_client,
            thoughts: Mutex::new(VecDeque::new()),
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// Send `messages` and return the answer, falling back on any error.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        session_id: Option<&str>,
        agent: Option<&str>,
    ) -> Completion {
        let outcome = match self.api_key.as_deref() {
            Some(key) => self.request(key, messages).await,
            None => Err(EnrichmentError::MissingCredential),
        };

        let (completion, status, error) = match outcome {
            Ok(completion) => (completion, ThoughtStatus::Completed, None),
            Err(EnrichmentError::MissingCredential) => {
                debug!("No enrichment credential, using fallback");
                (fallback_completion(messages), ThoughtStatus::Fallback, None)
            }
            Err(e) => {
                warn!("Enrichment request failed: {}", e);
                (
                    fallback_completion(messages),
                    ThoughtStatus::Error,
                    Some(e.to_string()),
                )
            }
        };

        let prompt_len: usize = messages.iter().map(|m| m.content.len()).sum();
        self.record(ThoughtEntry {
            session_id: session_id.map(String::from),
            agent: agent.map(String::from),
            timestamp: Utc::now(),
            model: completion.model.clone(),
            prompt: messages.to_vec(),
            temperature: self.config.temperature,
            status,
            response: Some(completion.content.clone()),
            error,
            thinking_process: format!(
                "Agent analyzed prompt ({} chars) and generated response ({} chars)",
                prompt_len,
                completion.content.len()
            ),
        });

        completion
    }

    async fn request(
        &self,
        api_key: &str,
        messages: &[ChatMessage],
    ) -> Result<Completion, EnrichmentError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!("Sending enrichment request with {} messages", messages.len());

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(api_key)
            .header("HTTP-Referer", REFERER)
            .header("X-Title", TITLE)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EnrichmentError::Network(format!(
                        "request timed out after {}s",
                        self.config.timeout_seconds
                    ))
                } else if e.is_connect() {
                    EnrichmentError::Network(format!("cannot connect to {}", self.config.base_url))
                } else {
                    EnrichmentError::Network(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EnrichmentError::Api { status, body });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| EnrichmentError::Parse(e.to_string()))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        Ok(Completion {
            success: true,
            thinking: content.clone(),
            content,
            model: chat.model.unwrap_or_else(|| self.config.model.clone()),
            usage: chat.usage,
            fallback: false,
        })
    }

    fn record(&self, entry: ThoughtEntry) {
        let mut thoughts = self.thoughts.lock();
        thoughts.push_back(entry);
        while thoughts.len() > self.config.thought_log_limit {
            thoughts.pop_front();
        }
    }

    /// Logged calls matching the filters, oldest first, keeping the last `limit`.
    pub fn thought_logs(
        &self,
        session_id: Option<&str>,
        agent: Option<&str>,
        limit: usize,
    ) -> Vec<ThoughtEntry> {
        let thoughts = self.thoughts.lock();
        let matching: Vec<&ThoughtEntry> = thoughts
            .iter()
            .filter(|t| session_id.map_or(true, |s| t.session_id.as_deref() == Some(s)))
            .filter(|t| agent.map_or(true, |a| t.agent.as_deref() == Some(a)))
            .collect();

        let skip = matching.len().saturating_sub(limit);
        matching.into_iter().skip(skip).cloned().collect()
    }

    /// Number of logged calls for `agent`.
    pub fn call_count(&self, agent: &str) -> usize {
        self.thoughts
            .lock()
            .iter()
            .filter(|t| t.agent.as_deref() == Some(agent))
            .count()
    }

    /// Counters per agent. Calls without an agent are grouped under `unknown`.
    pub fn thought_stats(&self) -> BTreeMap<String, ThoughtStats> {
        let mut stats: BTreeMap<String, ThoughtStats> = BTreeMap::new();

        for thought in self.thoughts.lock().iter() {
            let agent = thought.agent.clone().unwrap_or_else(|| "unknown".to_string());
            let entry = stats.entry(agent).or_default();
            entry.total_calls += 1;
            match thought.status {
                ThoughtStatus::Completed => entry.successful += 1,
                ThoughtStatus::Error => {
                    entry.failed += 1;
                    entry.fallback += 1;
                }
                ThoughtStatus::Fallback => entry.fallback += 1,
            }
            entry.last_activity = Some(
                entry
                    .last_activity
                    .map_or(thought.timestamp, |t| t.max(thought.timestamp)),
            );
        }

        stats
    }

    pub fn clear_thought_logs(&self) {
        self.thoughts.lock().clear();
    }
}

fn fallback_completion(messages: &[ChatMessage]) -> Completion {
    let context = messages.last().map(|m| m.content.as_str()).unwrap_or("");
    let content = serde_json::to_string_pretty(&fallback_response(context))
        .unwrap_or_else(|_| "{}".to_string());

    Completion {
        success: false,
        content,
        model: FALLBACK_MODEL.to_string(),
        usage: json!({}),
        thinking: "Using fallback response - API key not configured or unavailable".to_string(),
        fallback: true,
    }
}

/// Canned analysis for the first domain keyword found in `context`.
pub fn fallback_response(context: &str) -> Value {
    let context = context.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| context.contains(w));

    if has(&["wall"]) {
        canned(
            "Wall Compliance Check",
            &[
                "Wall height: Standard residential - 2.4m - PASS",
                "Wall thickness: 230mm clay brick - PASS",
                "Wall height from cliff: Exceeds 1.5m requirement - PASS",
                "Retaining wall support: No additional support required for single story",
            ],
            &[
                "Ensure proper DPC installation at ground level",
                "Verify structural engineer sign-off for any load-bearing walls",
            ],
            "PASS",
            "Wall structure complies with SANS 10400-B and National Building Regulations.",
        )
    } else if has(&["dimension", "area"]) {
        canned(
            "Dimension and Area Compliance Check",
            &[
                "Floor area ratio: 0.45 (within 0.5 max) - PASS",
                "Coverage: 65% (within 70% max) - PASS",
                "Building line: 5m from street (meets 4m minimum) - PASS",
                "Side space: 1.5m both sides (meets 1m minimum) - PASS",
            ],
            &[
                "Verify surveyor measurements match",
                "Check with local municipality for additional coverage allowances",
            ],
            "PASS",
            "All dimensional requirements comply with SANS 10400-A and local zoning.",
        )
    } else if has(&["window", "door"]) {
        canned(
            "Window and Door Compliance Check",
            &[
                "Ventilation: All habitable rooms have operable windows - PASS",
                "Light opening: Exceeds 10% floor area requirement - PASS",
                "Emergency egress: All bedrooms have escape route - PASS",
                "Door sizes: Standard 813mm clear opening - PASS",
            ],
            &[
                "Verify glazing meets SANS 10400-X requirements",
                "Ensure all doors have proper threshold seals",
            ],
            "PASS",
            "Window and door openings comply with SANS 10400-K and NBR.",
        )
    } else if has(&["energy"]) {
        canned(
            "Energy Efficiency Compliance Check",
            &[
                "Insulation: Ceiling R-value 3.7 - MEETS MINIMUM",
                "Windows: Double glazing specified - PASS",
                "Orientation: Optimal north-facing for solar gain - PASS",
                "Energy performance: 85kWh/m²/year - ABOVE STANDARD",
            ],
            &[
                "Consider solar water heating for additional points",
                "LED lighting throughout will improve rating",
            ],
            "PASS",
            "Building meets SANS 10400-XA energy efficiency requirements.",
        )
    } else if has(&["council", "municipal"]) {
        canned(
            "Council/Municipal Compliance Check",
            &[
                "Zoning: Residential 1 - APPROVED USE",
                "Land use: Single residential dwelling - PERMITTED",
                "Height restriction: 8m maximum - COMPLIES (6.5m)",
                "Coverage: Within municipal bylaw limits - APPROVED",
            ],
            &[
                "Submit approved building plans to municipal building control",
                "Obtain occupancy certificate before habitation",
            ],
            "PASS",
            "Project complies with Johannesburg Municipal By-laws and SPLUMA.",
        )
    } else {
        canned(
            "General Architectural Compliance Check",
            &[
                "Reviewing architectural drawings against SANS 10400",
                "Checking against National Building Regulations",
                "Verifying municipal by-law compliance",
            ],
            &[
                "Proceed with detailed compliance review",
                "Engage with professional architect for final sign-off",
            ],
            "PENDING_REVIEW",
            "Initial review complete. Further analysis required.",
        )
    }
}

fn canned(
    analysis: &str,
    findings: &[&str],
    recommendations: &[&str],
    status: &str,
    report: &str,
) -> Value {
    json!({
        "analysis": analysis,
        "findings": findings,
        "recommendations": recommendations,
        "compliance_status": status,
        "detailed_report": report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client(api_key: Option<&str>, base_url: &str) -> EnrichmentClient {
        // A blank key never falls through to the environment.
        let config = EnrichmentConfig {
            api_key: Some(api_key.unwrap_or("").to_string()),
            base_url: base_url.to_string(),
            timeout_seconds: 2,
            thought_log_limit: 3,
            ..EnrichmentConfig::default()
        };
        EnrichmentClient::new(config).unwrap()
    }

    #[test]
    fn test_fallback_keyword_selection() {
        assert_eq!(fallback_response("Check the WALL")["analysis"], "Wall Compliance Check");
        assert_eq!(
            fallback_response("room area totals")["analysis"],
            "Dimension and Area Compliance Check"
        );
        assert_eq!(
            fallback_response("door schedule")["analysis"],
            "Window and Door Compliance Check"
        );
        assert_eq!(
            fallback_response("municipal zoning")["compliance_status"],
            "PASS"
        );
        assert_eq!(
            fallback_response("something else")["compliance_status"],
            "PENDING_REVIEW"
        );
    }

    #[test]
    fn test_fallback_is_deterministic() {
        assert_eq!(fallback_response("energy"), fallback_response("energy"));
    }

    #[tokio::test]
    async fn test_missing_key_uses_fallback_and_logs() {
        let client = offline_client(None, "http://127.0.0.1:1");
        assert!(!client.has_credential());

        let messages = vec![ChatMessage::user("energy results")];
        let completion = client.complete(&messages, Some("s1"), Some("energy_agent")).await;

        assert!(completion.fallback);
        assert!(!completion.success);
        assert_eq!(completion.model, FALLBACK_MODEL);
        let parsed: Value = serde_json::from_str(&completion.content).unwrap();
        assert_eq!(parsed["analysis"], "Energy Efficiency Compliance Check");

        let logs = client.thought_logs(Some("s1"), None, 10);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, ThoughtStatus::Fallback);
        assert_eq!(logs[0].agent.as_deref(), Some("energy_agent"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_falls_back() {
        let client = offline_client(Some("test-key"), "http://127.0.0.1:1");
        let completion = client
            .complete(&[ChatMessage::user("wall data")], None, Some("wall_agent"))
            .await;

        assert!(completion.fallback);
        let logs = client.thought_logs(None, Some("wall_agent"), 10);
        assert_eq!(logs[0].status, ThoughtStatus::Error);
        assert!(logs[0].error.is_some());

        let stats = client.thought_stats();
        assert_eq!(stats["wall_agent"].failed, 1);
        assert_eq!(stats["wall_agent"].fallback, 1);
    }

    #[tokio::test]
    async fn test_thought_log_is_bounded_and_filterable() {
        let client = offline_client(None, "http://127.0.0.1:1");
        for i in 0..5 {
            let session = format!("s{}", i % 2);
            client
                .complete(&[ChatMessage::user("x")], Some(session.as_str()), Some("a"))
                .await;
        }

        // Limit 3 keeps calls 2, 3, 4.
        assert_eq!(client.thought_logs(None, None, 100).len(), 3);
        assert_eq!(client.thought_logs(Some("s0"), None, 100).len(), 2);
        assert_eq!(client.thought_logs(None, None, 1).len(), 1);
        assert_eq!(client.call_count("a"), 3);

        client.clear_thought_logs();
        assert!(client.thought_logs(None, None, 100).is_empty());
    }
}
