//! Answer generation with a hosted chat model
//!
//! All retrieved passages are placed in a single system message ("stuff"
//! strategy). Nothing is truncated: if the passages overflow the model's
//! context window the provider rejects the request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::ServiceError;
use crate::provider::OpenAiClient;

const SYSTEM_TEMPLATE: &str = "Use the following pieces of context to answer the user's question. \n\
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\
----------------\n";

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, query: &str, passages: &[String]) -> Result<String, ServiceError>;
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// System and user messages for a query and its context passages
pub fn stuff_prompt(query: &str, passages: &[String]) -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            role: "system",
            content: format!("{}{}", SYSTEM_TEMPLATE, passages.join("\n\n")),
        },
        ChatMessage {
            role: "user",
            content: query.to_string(),
        },
    ]
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub struct OpenAiChat {
    client: OpenAiClient,
    model: String,
    temperature: f32,
}

impl OpenAiChat {
    pub fn new(client: OpenAiClient, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
        }
    }
}

fn first_answer(response: ChatResponse) -> Result<String, ServiceError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| ServiceError::InvalidResponse {
            service: "language model",
            reason: "no answer in response".to_string(),
        })
}

#[async_trait]
impl AnswerGenerator for OpenAiChat {
    async fn generate(&self, query: &str, passages: &[String]) -> Result<String, ServiceError> {
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: stuff_prompt(query, passages),
        };
        let response: ChatResponse = self
            .client
            .post_json("language model", "/chat/completions", &request)
            .await?;
        first_answer(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stuff_prompt_concatenates_passages() {
        let passages = vec![
            "Arctic terns fly 70,000 km a year.".to_string(),
            "Bar-tailed godwits fly non-stop across the Pacific.".to_string(),
        ];
        let messages = stuff_prompt("What is the longest migration?", &passages);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.starts_with("Use the following pieces of context"));
        assert!(messages[0].content.ends_with(
            "Arctic terns fly 70,000 km a year.\n\nBar-tailed godwits fly non-stop across the Pacific."
        ));
        assert_eq!(
            messages[1],
            ChatMessage {
                role: "user",
                content: "What is the longest migration?".to_string()
            }
        );
    }

    #[test]
    fn test_parse_answer() {
        let response: ChatResponse = serde_json::from_value(serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "  Magnetic fields and stars.\n"},
                "finish_reason": "stop"
            }]
        }))
        .unwrap();
        assert_eq!(first_answer(response).unwrap(), "Magnetic fields and stars.");
    }

    #[test]
    fn test_missing_answer_is_error() {
        for body in [
            serde_json::json!({"choices": []}),
            serde_json::json!({}),
            serde_json::json!({"choices": [{"message": {"content": null}}]}),
            serde_json::json!({"choices": [{"message": {"content": "   "}}]}),
        ] {
            let response: ChatResponse = serde_json::from_value(body).unwrap();
            assert!(matches!(
                first_answer(response),
                Err(ServiceError::InvalidResponse { .. })
            ));
        }
    }
}
