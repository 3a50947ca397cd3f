// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LLM provider boundary.
//!
//! The loop talks to a [`LlmClient`] trait object: one call per tick
//! with the context snapshot and the fixed tool set. The HTTP
//! implementation posts to an Anthropic-style messages endpoint; tests
//! script a fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;

/// A tool the model may call, with its JSON-schema parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct LlmRequest {
    pub model: String,
    pub system: String,
    pub user_message: String,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: u32,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RequestedToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub text: String,
    pub tool_calls: Vec<RequestedToolCall>,
    pub stop_reason: Option<String>,
    pub usage: LlmUsage,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, EngineError>;
}

/// HTTP client for an Anthropic-style `/v1/messages` endpoint.
pub struct HttpLlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpLlmClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Standard endpoint with the key from `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Result<Self, EngineError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| EngineError::Validation("ANTHROPIC_API_KEY is not set".to_string()))?;
        Ok(Self::new("https://api.anthropic.com", api_key))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, EngineError> {
        let body = serde_json::json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "system": request.system,
            "messages": [{ "role": "user", "content": request.user_message }],
            "tools": request.tools,
        });

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Llm(format!("request failed: {}", e)))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| EngineError::Llm(format!("invalid response body: {}", e)))?;
        if !status.is_success() {
            return Err(EngineError::Llm(format!(
                "provider returned {}: {}",
                status,
                payload["error"]["message"].as_str().unwrap_or("unknown")
            )));
        }

        let mut result = LlmResponse {
            stop_reason: payload["stop_reason"].as_str().map(str::to_string),
            usage: serde_json::from_value(payload["usage"].clone()).unwrap_or_default(),
            ..Default::default()
        };
        for block in payload["content"].as_array().into_iter().flatten() {
            match block["type"].as_str() {
                Some("text") => {
                    if let Some(text) = block["text"].as_str() {
                        result.text.push_str(text);
                    }
                }
                Some("tool_use") => {
                    result.tool_calls.push(RequestedToolCall {
                        id: block["id"].as_str().unwrap_or_default().to_string(),
                        name: block["name"].as_str().unwrap_or_default().to_string(),
                        input: block["input"].clone(),
                    });
                }
                _ => {}
            }
        }
        Ok(result)
    }
}
