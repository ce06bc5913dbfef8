//! Chat-completion request envelope.
//!
//! The proxy is a transparent relay, so the request type only names the one
//! field it inspects (`stream`); everything else round-trips untouched
//! through the flattened map.

use serde::{Deserialize, Serialize};

/// Inbound chat-completion request (OpenAI-compatible, passed through).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatCompletionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

impl ChatCompletionRequest {
    /// Whether the caller asked for a streamed response.
    pub fn is_streaming(&self) -> bool {
        self.stream.unwrap_or(false)
    }

    /// Whether the request body was an empty JSON object (`{}`).
    pub fn is_empty(&self) -> bool {
        self.stream.is_none() && self.rest.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_fields_round_trip() {
        let input = r#"{
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}],
            "temperature": 0.3,
            "stream": true
        }"#;

        let request: ChatCompletionRequest = serde_json::from_str(input).unwrap();
        assert!(request.is_streaming());

        let output = serde_json::to_value(&request).unwrap();
        assert_eq!(output["model"], "gpt-4o");
        assert_eq!(output["temperature"], 0.3);
        assert_eq!(output["messages"][0]["content"], "hi");
        assert_eq!(output["stream"], true);
    }

    #[test]
    fn stream_defaults_to_false() {
        let request: ChatCompletionRequest =
            serde_json::from_str(r#"{"model": "gpt-4o", "messages": []}"#).unwrap();
        assert!(!request.is_streaming());

        let output = serde_json::to_string(&request).unwrap();
        assert!(!output.contains("stream"));
    }

    #[test]
    fn empty_object_is_detected() {
        let empty: ChatCompletionRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());

        let stream_only: ChatCompletionRequest =
            serde_json::from_str(r#"{"stream": true}"#).unwrap();
        assert!(!stream_only.is_empty());

        let with_model: ChatCompletionRequest =
            serde_json::from_str(r#"{"model": "gpt-4o"}"#).unwrap();
        assert!(!with_model.is_empty());
    }

    #[test]
    fn non_object_bodies_rejected() {
        assert!(serde_json::from_str::<ChatCompletionRequest>("null").is_err());
        assert!(serde_json::from_str::<ChatCompletionRequest>("[1,2]").is_err());
        assert!(serde_json::from_str::<ChatCompletionRequest>("\"hi\"").is_err());
    }
}
