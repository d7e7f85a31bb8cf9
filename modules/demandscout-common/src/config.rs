use std::env;

use tracing::warn;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // LLM judge
    pub openai_api_key: String,
    pub judge_model: String,
    pub judge_base_url: String,

    // Tracking site
    pub site_url: String,

    // Clustering
    pub similarity_threshold: f64,
    pub min_confidence: f64,

    // Durable state and reports
    pub state_file: String,
    pub output_dir: String,
}

impl Config {
    /// Load configuration from environment variables.
    /// The judge key is optional; without it the heuristic judge is used.
    pub fn from_env() -> Self {
        Self {
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            judge_model: env::var("JUDGE_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            judge_base_url: env::var("JUDGE_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            site_url: env::var("SITE_URL")
                .unwrap_or_else(|_| "https://jacksuyu-demandsolution-codex.hf.space".to_string()),
            similarity_threshold: parsed_env("SIMILARITY_THRESHOLD", 0.72),
            min_confidence: parsed_env("MIN_CONFIDENCE", 0.4),
            state_file: env::var("STATE_FILE")
                .unwrap_or_else(|_| "data/posting_state.json".to_string()),
            output_dir: env::var("OUTPUT_DIR").unwrap_or_else(|_| "data/runs".to_string()),
        }
    }
}

/// Optional tuning knobs never abort startup: a malformed value falls back to
/// the default with a warning.
fn parsed_env(key: &str, default: f64) -> f64 {
    let Ok(raw) = env::var(key) else {
        return default;
    };
    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(key, value = %raw, "Ignoring non-numeric value, using default");
            default
        }
    }
}
