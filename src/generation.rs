//! Response generation against a hosted chat-completion model.
//!
//! The generation model is an external collaborator behind the
//! [`ChatModel`] trait: `generate(system, history, user) -> text`.
//! The shipped implementation talks to an OpenAI-compatible
//! `/v1/chat/completions` endpoint. The API key is read per request so
//! a missing credential surfaces as a request-time error, not a failed
//! process start.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::models::{ConversationTurn, Role};

/// Interface to the hosted chat model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
        user_message: &str,
    ) -> Result<String>;
}

/// Chat-completion client for OpenAI-compatible APIs.
pub struct OpenAiChat {
    model: String,
    temperature: f64,
    max_tokens: u32,
    api_base: String,
    max_retries: u32,
    timeout_secs: u64,
}

impl OpenAiChat {
    pub fn new(config: &GenerationConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        }
    }

    fn build_messages(
        system_prompt: &str,
        history: &[ConversationTurn],
        user_message: &str,
    ) -> Vec<serde_json::Value> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(serde_json::json!({"role": "system", "content": system_prompt}));
        for turn in history {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(serde_json::json!({"role": role, "content": turn.content}));
        }
        messages.push(serde_json::json!({"role": "user", "content": user_message}));
        messages
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
        user_message: &str,
    ) -> Result<String> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": Self::build_messages(system_prompt, history, user_message),
        });

        let url = format!("{}/chat/completions", self.api_base);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post(&url)
                .header("Authorization", format!("Bearer {}", api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_completion(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err =
                            Some(anyhow::anyhow!("Chat API error {}: {}", status, body_text));
                        continue;
                    }

                    bail!("Chat API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Generation failed after retries")))
    }
}

fn parse_completion(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid chat completion response: missing content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_messages_preserves_history_order() {
        let history = vec![
            ConversationTurn {
                role: Role::User,
                content: "What yatras run in May?".to_string(),
            },
            ConversationTurn {
                role: Role::Assistant,
                content: "Kedarnath and Badrinath.".to_string(),
            },
        ];
        let messages = OpenAiChat::build_messages("persona", &history, "And pricing?");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["role"], "user");
        assert_eq!(messages[3]["content"], "And pricing?");
    }

    #[test]
    fn parse_completion_extracts_content() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Namaste!"}}]
        });
        assert_eq!(parse_completion(&json).unwrap(), "Namaste!");
    }

    #[test]
    fn parse_completion_rejects_empty_choices() {
        let json = serde_json::json!({"choices": []});
        assert!(parse_completion(&json).is_err());
    }
}
