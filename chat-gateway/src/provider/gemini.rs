//! Google Gemini gateway.
//!
//! Calls `models/{model}:generateContent` with the full transcript. The API
//! key travels in the `x-goog-api-key` header so it never shows up in URLs
//! (and therefore never in transport error messages).

use super::{GatewayError, ModelGateway, ModelReply, TokenUsage};
use crate::session::Turn;
use async_trait::async_trait;
use chat_common::config::GeminiConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const PROVIDER: &str = "gemini";

/// Gemini gateway bound to a single model and credential.
pub struct GeminiGateway {
    api_key: Option<String>,
    model: String,
    base_url: String,
    temperature: Option<f64>,
    max_output_tokens: Option<i64>,
    system_prompt: Option<String>,
    client: Client,
}

// ══════════════════════════════════════════════════════════════════════════════
// API REQUEST/RESPONSE TYPES
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<i64>,
    candidates_token_count: Option<i64>,
    total_token_count: Option<i64>,
}

impl GeminiGateway {
    /// Create a gateway from configuration. A missing key yields an
    /// unconfigured gateway whose `send` fails with `NotConfigured`.
    pub fn new(config: &GeminiConfig) -> Self {
        Self {
            api_key: config.api_key().map(String::from),
            model: config
                .model
                .strip_prefix("models/")
                .unwrap_or(&config.model)
                .to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            system_prompt: config.system_prompt.clone(),
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_request(&self, history: &[Turn], message: &str) -> GenerateContentRequest {
        let contents = history
            .iter()
            .map(|turn| Content {
                role: Some(turn.role().as_str().to_string()),
                parts: vec![Part {
                    text: turn.text().to_string(),
                }],
            })
            .chain(std::iter::once(Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: message.to_string(),
                }],
            }))
            .collect();

        let system_instruction = self.system_prompt.as_ref().map(|sys| Content {
            role: None,
            parts: vec![Part { text: sys.clone() }],
        });

        let generation_config = (self.temperature.is_some() || self.max_output_tokens.is_some())
            .then(|| GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            });

        GenerateContentRequest {
            contents,
            system_instruction,
            generation_config,
        }
    }

    fn error(&self, message: impl Into<String>, status_code: Option<u16>) -> GatewayError {
        GatewayError::Upstream {
            provider: PROVIDER.into(),
            model: self.model.clone(),
            message: message.into(),
            status_code,
        }
    }
}

#[async_trait]
impl ModelGateway for GeminiGateway {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn send(&self, history: &[Turn], message: &str) -> Result<ModelReply, GatewayError> {
        let start = Instant::now();

        let api_key = self.api_key.as_ref().ok_or(GatewayError::NotConfigured)?;

        let body = self.build_request(history, message);

        tracing::debug!(
            model = %self.model,
            history_turns = history.len(),
            "Calling Gemini generateContent"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.error(format!("Request failed: {}", e), None))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiErrorEnvelope>(&error_text)
                .map(|env| env.error.message)
                .unwrap_or(error_text);
            return Err(self.error(
                format!("API error ({}): {}", status.as_u16(), detail),
                Some(status.as_u16()),
            ));
        }

        let result: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| self.error(format!("Failed to parse response: {}", e), None))?;

        if let Some(err) = result.error {
            return Err(self.error(format!("API error: {}", err.message), None));
        }

        let Some(candidate) = result.candidates.and_then(|c| c.into_iter().next()) else {
            let reason = result
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .map(|r| format!("Prompt blocked: {r}"))
                .unwrap_or_else(|| "No response from Gemini".into());
            return Err(self.error(reason, None));
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect::<String>())
            .unwrap_or_default();

        // A candidate without text (e.g. stopped for safety) is not a reply.
        if text.is_empty() {
            return Err(self.error(
                format!(
                    "Empty response from Gemini (finish reason: {})",
                    candidate.finish_reason.as_deref().unwrap_or("unknown")
                ),
                None,
            ));
        }

        let usage = result.usage_metadata.map_or(TokenUsage::default(), |u| TokenUsage {
            input_tokens: u.prompt_token_count.unwrap_or(0),
            output_tokens: u.candidates_token_count.unwrap_or(0),
            total_tokens: u.total_token_count.unwrap_or(0),
        });

        Ok(ModelReply {
            text,
            usage,
            finish_reason: candidate.finish_reason,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(key: Option<&str>) -> GeminiConfig {
        GeminiConfig {
            api_key: key.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn gateway_without_key_is_unconfigured() {
        let gateway = GeminiGateway::new(&config(None));
        assert!(!gateway.is_configured());
    }

    #[test]
    fn blank_key_is_unconfigured() {
        let gateway = GeminiGateway::new(&config(Some("  ")));
        assert!(!gateway.is_configured());
    }

    #[test]
    fn gateway_with_key_is_configured() {
        let gateway = GeminiGateway::new(&config(Some("test-api-key")));
        assert!(gateway.is_configured());
        assert_eq!(gateway.name(), "gemini");
        assert_eq!(gateway.model(), "gemini-2.0-flash");
    }

    #[test]
    fn endpoint_normalizes_model_and_base_url() {
        let gateway = GeminiGateway::new(&GeminiConfig {
            model: "models/gemini-1.5-pro".into(),
            base_url: "http://localhost:8080/v1beta/".into(),
            ..Default::default()
        });
        assert_eq!(
            gateway.endpoint(),
            "http://localhost:8080/v1beta/models/gemini-1.5-pro:generateContent"
        );
    }

    #[test]
    fn request_replays_history_then_message() {
        let gateway = GeminiGateway::new(&config(Some("k")));
        let history = vec![Turn::user("Hi"), Turn::model("Hello! How can I help?")];

        let body = serde_json::to_value(gateway.build_request(&history, "Tell me a joke")).unwrap();

        assert_eq!(
            body,
            json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "Hi"}]},
                    {"role": "model", "parts": [{"text": "Hello! How can I help?"}]},
                    {"role": "user", "parts": [{"text": "Tell me a joke"}]}
                ]
            })
        );
    }

    #[test]
    fn request_includes_optional_settings() {
        let gateway = GeminiGateway::new(&GeminiConfig {
            api_key: Some("k".into()),
            temperature: Some(0.2),
            max_output_tokens: Some(256),
            system_prompt: Some("Be brief.".into()),
            ..Default::default()
        });

        let body = serde_json::to_value(gateway.build_request(&[], "Hi")).unwrap();

        assert_eq!(body["systemInstruction"], json!({"parts": [{"text": "Be brief."}]}));
        assert_eq!(body["generationConfig"]["temperature"], json!(0.2));
        assert_eq!(body["generationConfig"]["maxOutputTokens"], json!(256));
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn send_without_key_fails_before_any_request() {
        let gateway = GeminiGateway::new(&GeminiConfig {
            base_url: "http://127.0.0.1:1".into(),
            ..Default::default()
        });

        let err = gateway.send(&[], "hello").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotConfigured));
    }
}
