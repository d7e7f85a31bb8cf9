// Decision Filter — consult the external judge per cluster and record a
// verdict. Judge failure of any kind rejects the cluster for this run;
// rejection is the fail-safe default, and the cluster stays eligible for
// re-judgment next run because verdicts are never persisted.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use demandscout_common::types::{ClusterSummary, Verdict};

use crate::traits::{DemandJudge, JudgeDecision};

/// Marker prefix distinguishing judge-failure rejections from genuine ones in
/// run reports.
pub const JUDGE_FAILURE_MARKER: &str = "judge unavailable";

/// Produce this run's verdict for one cluster. Never fails: a judge error
/// becomes a rejection carrying the failure marker.
pub async fn decide(judge: &dyn DemandJudge, summary: &ClusterSummary) -> Verdict {
    match judge.judge(summary).await {
        Ok(decision) => {
            info!(
                cluster_id = %summary.cluster_id,
                accepted = decision.accept,
                confidence = decision.confidence,
                "Judge verdict"
            );
            Verdict {
                cluster_id: summary.cluster_id.clone(),
                accepted: decision.accept,
                reason: decision.reason,
                confidence: decision.confidence.clamp(0.0, 1.0),
                decided_at: Utc::now(),
            }
        }
        Err(e) => {
            warn!(cluster_id = %summary.cluster_id, error = %e, "Judge call failed, rejecting for this run");
            Verdict {
                cluster_id: summary.cluster_id.clone(),
                accepted: false,
                reason: format!("{JUDGE_FAILURE_MARKER}: {e}"),
                confidence: 0.0,
                decided_at: Utc::now(),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// HeuristicJudge — no-network fallback
// ---------------------------------------------------------------------------

/// Accepts clusters whose signal strength clears fixed bars. Used when no
/// LLM judge is configured.
pub struct HeuristicJudge {
    pub min_mentions: u32,
    pub min_avg_confidence: f64,
}

impl Default for HeuristicJudge {
    fn default() -> Self {
        Self {
            min_mentions: 2,
            min_avg_confidence: 0.6,
        }
    }
}

#[async_trait]
impl DemandJudge for HeuristicJudge {
    async fn judge(&self, summary: &ClusterSummary) -> Result<JudgeDecision> {
        let accept = summary.mentions >= self.min_mentions
            || summary.avg_confidence >= self.min_avg_confidence;
        let reason = if accept {
            format!(
                "heuristic accept: mentions={} avg_confidence={:.2}",
                summary.mentions, summary.avg_confidence
            )
        } else {
            format!(
                "heuristic reject: mentions={} below {} and avg_confidence={:.2} below {:.2}",
                summary.mentions, self.min_mentions, summary.avg_confidence, self.min_avg_confidence
            )
        };
        Ok(JudgeDecision {
            accept,
            reason,
            confidence: summary.avg_confidence,
        })
    }
}

// ---------------------------------------------------------------------------
// OpenAiJudge — chat-completions triage reviewer
// ---------------------------------------------------------------------------

const SYSTEM_PROMPT: &str = r#"You are a strict product requirement triage reviewer.

Goal:
- Keep ONLY items that are clearly user requirements for a product/software capability.

Accept ONLY when:
- It expresses a concrete need/problem and implies a software/tool/app/workflow solution.
- It is actionable enough for a product team to build against.

Reject when:
- Self-promotion, launch announcement, or "I built X".
- Hiring/cofounder/job-seeking.
- Generic discussion, opinion, storytelling, motivation, or reflection.
- Feedback/roast requests without a real user requirement.
- Too vague to infer a buildable requirement.

Return JSON only."#;

/// What the LLM returns for one cluster.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct JudgeResponse {
    pub accept: bool,
    pub reason: String,
    /// 0..1
    pub confidence: f64,
}

#[derive(Debug, Serialize)]
struct JudgeItem<'a> {
    cluster_id: &'a str,
    summary_demand: &'a str,
    keywords: &'a [String],
    mention_count: u32,
    subreddits: &'a [String],
}

pub struct OpenAiJudge {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAiJudge {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Strict-schema response format built from `JudgeResponse`.
    fn response_format() -> serde_json::Value {
        let mut schema = serde_json::to_value(schema_for!(JudgeResponse)).unwrap_or_default();
        if let serde_json::Value::Object(map) = &mut schema {
            map.remove("$schema");
            map.remove("title");
            map.insert("additionalProperties".to_string(), json!(false));
            if let Some(props) = map.get("properties").and_then(|p| p.as_object()) {
                let required: Vec<_> = props.keys().cloned().collect();
                map.insert("required".to_string(), json!(required));
            }
        }
        json!({
            "type": "json_schema",
            "json_schema": {
                "name": "judge_verdict",
                "strict": true,
                "schema": schema,
            }
        })
    }
}

#[async_trait]
impl DemandJudge for OpenAiJudge {
    async fn judge(&self, summary: &ClusterSummary) -> Result<JudgeDecision> {
        let item = JudgeItem {
            cluster_id: &summary.cluster_id,
            summary_demand: &summary.representative_text,
            keywords: &summary.keywords,
            mention_count: summary.mentions,
            subreddits: &summary.subreddits,
        };
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "response_format": Self::response_format(),
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": serde_json::to_string(&item)? },
            ],
        });

        debug!(cluster_id = %summary.cluster_id, model = %self.model, "Judge request");

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Judge API error ({status}): {error_text}"));
        }

        let payload: serde_json::Value = response.json().await?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("Judge returned no content"))?;

        let parsed: JudgeResponse = parse_first_json(content)?;
        Ok(JudgeDecision {
            accept: parsed.accept,
            reason: parsed.reason,
            confidence: normalize_confidence(parsed.confidence),
        })
    }
}

/// Parse the whole string as JSON, falling back to the first `{...}` span.
/// Small local models wrap JSON in prose often enough to warrant this.
fn parse_first_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Judge returned empty content"));
    }
    if let Ok(parsed) = serde_json::from_str(trimmed) {
        return Ok(parsed);
    }
    let start = trimmed.find('{').ok_or_else(|| {
        let head: String = trimmed.chars().take(200).collect();
        anyhow!("No JSON object in judge output: {head}")
    })?;
    let end = trimmed
        .rfind('}')
        .ok_or_else(|| anyhow!("Unterminated JSON object in judge output"))?;
    Ok(serde_json::from_str(&trimmed[start..=end])?)
}

/// Some models report confidence on a 0..10 scale; fold it back into 0..1.
fn normalize_confidence(raw: f64) -> f64 {
    if raw > 1.0 {
        (raw / 10.0).min(1.0)
    } else {
        raw.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedJudge;
    use demandscout_common::types::Evidence;

    fn summary(mentions: u32, avg_confidence: f64) -> ClusterSummary {
        ClusterSummary {
            cluster_id: "free-invoice-tool-abc123def456".to_string(),
            representative_text: "looking for a free tool to track invoices".to_string(),
            mentions,
            avg_confidence,
            avg_urgency: 0.0,
            keywords: vec!["invoices".to_string(), "tool".to_string()],
            subreddits: vec!["SaaS".to_string()],
            evidence: Evidence {
                title: "looking for a free tool".to_string(),
                url: "https://reddit.com/r/SaaS/1".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn judge_error_rejects_with_marker() {
        let judge = ScriptedJudge::failing("connection timed out");
        let verdict = decide(&judge, &summary(3, 0.9)).await;
        assert!(!verdict.accepted);
        assert!(verdict.reason.contains(JUDGE_FAILURE_MARKER));
        assert!(verdict.reason.contains("connection timed out"));
    }

    #[tokio::test]
    async fn accepting_judge_produces_accepted_verdict() {
        let judge = ScriptedJudge::accepting("clear requirement");
        let verdict = decide(&judge, &summary(3, 0.9)).await;
        assert!(verdict.accepted);
        assert_eq!(verdict.reason, "clear requirement");
    }

    #[tokio::test]
    async fn verdict_confidence_is_clamped() {
        let judge = ScriptedJudge::accepting_with_confidence("sure", 7.5);
        let verdict = decide(&judge, &summary(1, 0.5)).await;
        assert_eq!(verdict.confidence, 1.0);
    }

    #[tokio::test]
    async fn heuristic_judge_accepts_on_mentions() {
        let judge = HeuristicJudge::default();
        let decision = judge.judge(&summary(3, 0.2)).await.unwrap();
        assert!(decision.accept);
    }

    #[tokio::test]
    async fn heuristic_judge_rejects_weak_singletons() {
        let judge = HeuristicJudge::default();
        let decision = judge.judge(&summary(1, 0.3)).await.unwrap();
        assert!(!decision.accept);
        assert!(decision.reason.contains("reject"));
    }

    #[test]
    fn response_format_is_strict_schema() {
        let format = OpenAiJudge::response_format();
        assert_eq!(format["type"], "json_schema");
        let schema = &format["json_schema"]["schema"];
        assert_eq!(schema["additionalProperties"], serde_json::json!(false));
        let required: Vec<_> = schema["required"].as_array().unwrap().iter().collect();
        assert_eq!(required.len(), 3);
    }

    #[test]
    fn parse_first_json_handles_wrapped_output() {
        let wrapped = "Here you go:\n{\"accept\": true, \"reason\": \"ok\", \"confidence\": 0.8}";
        let parsed: JudgeResponse = parse_first_json(wrapped).unwrap();
        assert!(parsed.accept);
    }

    #[test]
    fn normalize_confidence_folds_ten_scale() {
        assert!((normalize_confidence(8.0) - 0.8).abs() < 1e-9);
        assert_eq!(normalize_confidence(0.4), 0.4);
        assert_eq!(normalize_confidence(-1.0), 0.0);
    }
}
