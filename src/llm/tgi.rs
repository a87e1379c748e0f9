// SPDX-License-Identifier: MIT

//! Streaming client for a text-generation-inference endpoint
//!
//! Speaks the `/generate_stream` SSE protocol: each `data:` frame carries a
//! `token.text` increment, and error frames carry an `error` field.

use super::error::ModelError;
use super::{GenerativeModel, ModelInfo};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;

pub struct TgiModel {
    client: Client,
    base_url: String,
    token: Option<String>,
    model_name: String,
    quantization: Option<String>,
    max_new_tokens: u32,
}

impl TgiModel {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        model_name: impl Into<String>,
        quantization: Option<String>,
        max_new_tokens: u32,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            token,
            model_name: model_name.into(),
            quantization,
            max_new_tokens,
        }
    }

    /// Parse one SSE frame. Returns the token text, if the frame carries one.
    fn parse_frame(line: &str) -> Result<Option<String>, ModelError> {
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(None);
        };
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            return Ok(None);
        }

        let frame: Value = serde_json::from_str(data)
            .map_err(|e| ModelError::invalid("tgi", format!("bad SSE frame: {}", e)))?;

        if let Some(err) = frame.get("error").and_then(|e| e.as_str()) {
            return Err(ModelError::api("tgi", err.to_string()));
        }

        // Special tokens (BOS/EOS markers) are not answer text.
        if frame["token"]["special"].as_bool() == Some(true) {
            return Ok(None);
        }
        Ok(frame["token"]["text"].as_str().map(|s| s.to_string()))
    }
}

#[async_trait]
impl GenerativeModel for TgiModel {
    fn info(&self) -> ModelInfo {
        ModelInfo {
            model_name: self.model_name.clone(),
            quantization: self.quantization.clone(),
        }
    }

    async fn stream(
        &self,
        prompt: &str,
        chunks: Option<mpsc::Sender<String>>,
    ) -> Result<String, ModelError> {
        let url = format!("{}/generate_stream", self.base_url.trim_end_matches('/'));
        let body = json!({
            "inputs": prompt,
            "parameters": {
                "max_new_tokens": self.max_new_tokens,
                "temperature": 0.2,
                "top_p": 0.9,
                "repetition_penalty": 1.1,
            }
        });

        let mut req = self.client.post(&url).json(&body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ModelError::api("tgi", format!("{}: {}", status, text)));
        }

        let mut byte_stream = resp.bytes_stream();
        let mut buf = String::new();
        let mut answer = String::new();

        while let Some(chunk) = byte_stream.next().await {
            let chunk = chunk?;
            buf.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buf.find('\n') {
                let line: String = buf.drain(..=pos).collect();
                if let Some(text) = Self::parse_frame(line.trim())? {
                    answer.push_str(&text);
                    if let Some(tx) = &chunks {
                        // The receiver going away just means nobody is
                        // watching the increments anymore.
                        let _ = tx.send(text).await;
                    }
                }
            }
        }

        log::debug!(
            "tgi generation complete: {} chars from {}",
            answer.len(),
            self.model_name
        );
        Ok(answer)
    }
}
