use crate::llm::client::{LLMClient, LLMError, SuggestedCommand};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

// Rate limiting: 10 requests per minute
const RATE_LIMIT_REQUESTS: usize = 10;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

const SYSTEM_PROMPT: &str = "You are a build engineer. Given a repository layout and the commands \
that have already failed, propose one shell command that builds the project and runs its tests.

CRITICAL INSTRUCTIONS:
- Respond with ONLY the command itself
- Do NOT include explanations, reasoning, or commentary
- Do NOT use markdown code blocks or backticks
- Do NOT use multiple lines
- Never repeat a command that already failed
- Use tool flags (mvn -f, gradle -p, npm --prefix) instead of cd for sub-projects
- Example good response: mvn -f backend/pom.xml test";

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
    metadata: Metadata,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct Metadata {
    user_id: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

pub struct AnthropicClient {
    api_key: String,
    model: String,
    http_client: Client,
    // Rate limiting: track request timestamps
    request_times: Mutex<Vec<Instant>>,
}

impl AnthropicClient {
    pub fn new(api_key: String) -> Self {
        Self::with_model(api_key, DEFAULT_MODEL.to_string())
    }

    pub fn with_model(api_key: String, model: String) -> Self {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "Falling back to default HTTP client");
                Client::new()
            });

        Self {
            api_key,
            model,
            http_client,
            request_times: Mutex::new(Vec::new()),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check and enforce rate limiting
    /// Returns Ok(()) if request is allowed, Err with wait time if rate limited
    fn check_rate_limit(&self) -> Result<(), LLMError> {
        let now = Instant::now();
        let mut times = self.request_times.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        // Remove requests older than the rate limit window
        times.retain(|&time| now.duration_since(time) < RATE_LIMIT_WINDOW);

        if times.len() >= RATE_LIMIT_REQUESTS {
            let oldest = times[0];
            let wait_time = RATE_LIMIT_WINDOW.saturating_sub(now.duration_since(oldest));
            // rounded up so waiting the reported seconds always frees a slot
            let wait_secs = wait_time.as_secs() + u64::from(wait_time.subsec_nanos() > 0);
            return Err(LLMError::RateLimitExceeded(wait_secs));
        }

        times.push(now);
        Ok(())
    }

    async fn call_api(&self, prompt: &str, session_id: &str) -> Result<String, LLMError> {
        let request_body = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: 256,
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            metadata: Metadata {
                user_id: session_id.to_string(),
            },
        };

        let mut attempt = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            attempt += 1;

            let response = self
                .http_client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await
                .map_err(|err| if err.is_timeout() { LLMError::Timeout } else { LLMError::NetworkError(err) })?;

            let status = response.status();

            if status.is_success() {
                let api_response: AnthropicResponse = response.json().await?;

                return api_response
                    .content
                    .into_iter()
                    .map(|block| block.text)
                    .find(|text| !text.trim().is_empty())
                    .ok_or_else(|| LLMError::InvalidResponse("No content in response".to_string()));
            } else if status.as_u16() == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);

                if attempt >= MAX_RETRIES {
                    return Err(LLMError::RateLimitExceeded(retry_after));
                }

                // Exponential backoff with retry-after
                let wait_ms = retry_after.saturating_mul(1000).max(backoff_ms);
                warn!(wait_ms, attempt, max_retries = MAX_RETRIES, "Rate limited by API, retrying");

                tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                backoff_ms *= 2;
                continue;
            } else {
                let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
                return Err(LLMError::ApiError(format!(
                    "API returned status {}: {}",
                    status, error_text
                )));
            }
        }
    }

    /// Reduce a model response to a single command line
    fn clean_response(response: &str) -> String {
        let mut cleaned = response.trim();

        // Strip markdown code blocks (```bash ... ``` or ``` ... ```)
        if cleaned.starts_with("```") {
            if let Some(first_newline) = cleaned.find('\n') {
                cleaned = &cleaned[first_newline + 1..];
            }
            if let Some(last_backticks) = cleaned.rfind("```") {
                cleaned = &cleaned[..last_backticks];
            }
            cleaned = cleaned.trim();
        }

        // First non-empty line only
        cleaned = cleaned.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or("");

        // Shell prompt marker
        if let Some(rest) = cleaned.strip_prefix("$ ") {
            cleaned = rest.trim_start();
        }

        // Inline code span
        if cleaned.len() > 1 && cleaned.starts_with('`') && cleaned.ends_with('`') {
            cleaned = cleaned.trim_matches('`').trim();
        }

        cleaned.to_string()
    }
}

#[async_trait]
impl LLMClient for AnthropicClient {
    async fn suggest_command(
        &self,
        prompt: &str,
        target_dir: &Path,
        session_id: &str,
    ) -> Result<SuggestedCommand, LLMError> {
        // Check rate limiting before making API call
        self.check_rate_limit()?;

        debug!(target_dir = %target_dir.display(), session_id, model = %self.model, "Requesting build command suggestion");
        let response = self.call_api(prompt, session_id).await?;
        let command = Self::clean_response(&response);

        if command.is_empty() {
            return Err(LLMError::InvalidResponse("Response contained no command".to_string()));
        }

        Ok(SuggestedCommand {
            command,
            explanation: None,
        })
    }
}
