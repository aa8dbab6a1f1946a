use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub api_url: String,
    /// Prefer the provider's environment variable; this is only a fallback.
    pub api_key: Option<String>,
    pub model: String,
    pub enabled: bool,
    pub provider: ApiProvider,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            enabled: true,
            provider: ApiProvider::OpenAI,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub enum ApiProvider {
    #[default]
    OpenAI,
    OpenRouter,
    Google,
    Custom,
}

// Keys come from the environment so the .env watcher can rotate them.
pub fn get_api_key_from_env(provider: &ApiProvider) -> Option<String> {
    let var = match provider {
        ApiProvider::OpenAI => "OPENAI_API_KEY",
        ApiProvider::OpenRouter => "OPENROUTER_API_KEY",
        ApiProvider::Google => "GOOGLE_API_KEY", // Gemini's OpenAI-compatible endpoint
        ApiProvider::Custom => "CUSTOM_API_KEY",
    };
    env::var(var).ok().filter(|key| !key.trim().is_empty())
}

pub fn get_default_model_for_provider(provider: &ApiProvider) -> String {
    match provider {
        ApiProvider::OpenAI => "gpt-4o-mini".to_string(),
        ApiProvider::OpenRouter => "google/gemma-2-9b-it".to_string(),
        ApiProvider::Google => "gemini-1.5-flash".to_string(),
        ApiProvider::Custom => "gpt-4o-mini".to_string(),
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM is not configured (missing API key or disabled)")]
    Disabled,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("received HTML instead of JSON; the API URL is probably wrong")]
    Html,
    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no response from LLM")]
    Empty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
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

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Choice {
    pub message: ChatMessage,
}

/// OpenAI-compatible chat client shared by every command that talks to an LLM.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    config: ApiConfig,
}

impl LlmClient {
    pub fn new(http: reqwest::Client, config: ApiConfig) -> Self {
        Self { http, config }
    }

    fn api_key(&self) -> Option<String> {
        get_api_key_from_env(&self.config.provider).or_else(|| self.config.api_key.clone())
    }

    pub fn is_available(&self) -> bool {
        self.config.enabled && self.api_key().is_some()
    }

    pub fn model(&self) -> String {
        if self.config.model.trim().is_empty() {
            get_default_model_for_provider(&self.config.provider)
        } else {
            self.config.model.clone()
        }
    }

    pub async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String, LlmError> {
        if !self.config.enabled {
            return Err(LlmError::Disabled);
        }
        let key = self.api_key().ok_or(LlmError::Disabled)?;
        let request = ChatCompletionRequest {
            model: self.model(),
            messages,
            temperature: Some(temperature),
            max_tokens,
        };
        call_llm_api(
            &self.http,
            &self.config.api_url,
            &key,
            &request,
            &self.config.provider,
        )
        .await
    }
}

pub async fn call_llm_api(
    http: &reqwest::Client,
    api_url: &str,
    api_key: &str,
    request: &ChatCompletionRequest,
    provider: &ApiProvider,
) -> Result<String, LlmError> {
    let (final_url, additional_headers) = build_request_params(api_url, provider);
    log::info!(
        "LLM request: url={}, model={}, provider={:?}",
        final_url,
        request.model,
        provider
    );

    let mut builder = http
        .post(&final_url)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json");
    for (key, value) in additional_headers {
        builder = builder.header(key, value);
    }

    let response = builder.json(request).send().await?;
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        log::error!("LLM request failed: status={}, body={}", status, body);
        return Err(LlmError::Status { status, body });
    }

    let response_text = response.text().await?;
    parse_completion(&response_text)
}

/// Pull the first choice's content out of a completion body, tolerating
/// providers that add or omit fields around `choices[0].message.content`.
pub fn parse_completion(response_text: &str) -> Result<String, LlmError> {
    if response_text.starts_with("<!DOCTYPE html") || response_text.contains("<html") {
        log::error!("LLM endpoint returned HTML");
        return Err(LlmError::Html);
    }

    let json_value: serde_json::Value = serde_json::from_str(response_text)?;
    if let Ok(completion) = serde_json::from_value::<ChatCompletionResponse>(json_value.clone()) {
        return completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or(LlmError::Empty);
    }

    log::warn!("Non-standard completion body, falling back to a loose read");
    json_value["choices"][0]["message"]["content"]
        .as_str()
        .map(|content| content.trim().to_string())
        .ok_or(LlmError::Empty)
}

fn build_request_params(api_url: &str, provider: &ApiProvider) -> (String, Vec<(&'static str, String)>) {
    let with_path = |url: &str| {
        if url.ends_with("/v1") || url.ends_with("/openai") {
            format!("{}/chat/completions", url)
        } else {
            url.to_string()
        }
    };
    match provider {
        ApiProvider::OpenAI | ApiProvider::Google | ApiProvider::Custom => {
            (with_path(api_url), vec![])
        }
        ApiProvider::OpenRouter => {
            let final_url = if api_url == "https://api.openai.com/v1/chat/completions" {
                "https://openrouter.ai/api/v1/chat/completions".to_string()
            } else {
                with_path(api_url)
            };
            let headers = vec![("X-Title", "AoS Community Bots".to_string())];
            (final_url, headers)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.provider, ApiProvider::OpenAI);
    }

    #[test]
    fn test_build_request_params_openai() {
        let (url, headers) = build_request_params("https://api.openai.com/v1", &ApiProvider::OpenAI);
        assert_eq!(url, "https://api.openai.com/v1/chat/completions");
        assert!(headers.is_empty());
    }

    #[test]
    fn test_build_request_params_openrouter() {
        let (url, headers) = build_request_params(
            "https://api.openai.com/v1/chat/completions",
            &ApiProvider::OpenRouter,
        );
        assert_eq!(url, "https://openrouter.ai/api/v1/chat/completions");
        assert!(!headers.is_empty());
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{"choices":[{"index":0,"finish_reason":"stop","message":{"role":"assistant","content":" Soup. \n"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Soup.");

        let loose = r#"{"choices":[{"message":{"content":"hi"}}]}"#;
        assert_eq!(parse_completion(loose).unwrap(), "hi");

        assert!(matches!(parse_completion("<html></html>"), Err(LlmError::Html)));
        assert!(matches!(parse_completion(r#"{"choices":[]}"#), Err(LlmError::Empty)));
        assert!(matches!(parse_completion("nope"), Err(LlmError::Json(_))));
    }

    #[test]
    fn test_disabled_client_is_unavailable() {
        let config = ApiConfig {
            enabled: false,
            ..ApiConfig::default()
        };
        let client = LlmClient::new(reqwest::Client::new(), config);
        assert!(!client.is_available());
    }
}
