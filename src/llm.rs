//! Chat-completion client
//!
//! Speaks the OpenAI-compatible `/chat/completions` protocol (Groq by default).
//! One system message, one user message, no streaming, no tools.

use crate::config::LlmSettings;
use crate::error::{OceanError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

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

/// Provider-independent completion request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![ChatMessage::system(&self.system), ChatMessage::user(&self.user)]
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Returns the raw content of the first choice.
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}

pub struct LlmClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl LlmClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model,
        }
    }

    pub fn from_settings(settings: &LlmSettings) -> Self {
        Self::new(
            settings.api_key.clone(),
            settings.base_url.clone(),
            settings.model.clone(),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, request: &ChatRequest) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": request.messages(),
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        })
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(OceanError::Llm(
                "No API key configured (set LLM_API_KEY or GROQ_API_KEY)".to_string(),
            ));
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| OceanError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(OceanError::Llm(format!("LLM API error ({}): {}", status, error_text)));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OceanError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        extract_content(&response_json)
    }
}

fn extract_content(response_json: &serde_json::Value) -> Result<String> {
    response_json["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| OceanError::Llm("No content in LLM response".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ChatRequest {
        ChatRequest {
            system: "You are a SQL expert.".to_string(),
            user: "User question: max depth?".to_string(),
            temperature: 0.0,
            max_tokens: 1024,
        }
    }

    #[test]
    fn test_request_body_shape() {
        let client = LlmClient::new("k".into(), "http://localhost".into(), "llama-3.3-70b-versatile".into());
        let body = client.request_body(&request());

        assert_eq!(body["model"], "llama-3.3-70b-versatile");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "User question: max depth?");
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["temperature"], 0.0);
    }

    #[test]
    fn test_extract_content() {
        let payload = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "SELECT 1;"}}]
        });
        assert_eq!(extract_content(&payload).unwrap(), "SELECT 1;");
        assert!(matches!(
            extract_content(&serde_json::json!({"choices": []})),
            Err(OceanError::Llm(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_fast() {
        let client = LlmClient::new(String::new(), "http://localhost:1".into(), "m".into());
        let err = client.complete(&request()).await.unwrap_err();
        assert!(matches!(err, OceanError::Llm(_)));
    }
}
