//! Question answering for okbot's `/ask` command.
//!
//! Talks to an OpenAI-compatible chat-completions endpoint. Every question
//! is a fresh single-message conversation.

use okbot_core::Error;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client.
#[derive(Clone)]
pub struct AskClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AskClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .user_agent("okbot/0.1")
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Point the client at another OpenAI-compatible server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask a single question and return the model's answer.
    pub async fn ask(&self, question: &str) -> Result<String, Error> {
        let url = format!("{}/chat/completions", self.base_url);
        info!("Asking {} ({} chars)", self.model, question.len());
        debug!("Requesting: {url}");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body(&self.model, question))
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!("Chat API returned {status}: {body}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;
        let answer = parse_answer(&body)?;

        debug!("Answer is {} chars", answer.len());
        Ok(answer)
    }
}

fn request_body<'a>(model: &'a str, question: &'a str) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: [ChatMessage {
            role: "user",
            content: question,
        }],
    }
}

fn parse_answer(body: &[u8]) -> Result<String, Error> {
    let response: ChatResponse =
        serde_json::from_slice(body).map_err(|e| Error::Parse(e.to_string()))?;

    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.unwrap_or_default())
        .ok_or_else(|| Error::Parse("response has no choices".to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn test_request_shape() {
        let body = serde_json::to_value(request_body("gpt-4o", "why is the sky blue?")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "gpt-4o",
                "messages": [{ "role": "user", "content": "why is the sky blue?" }]
            })
        );
    }

    #[test]
    fn test_parse_answer() {
        let body = br#"{
            "id": "chatcmpl-1",
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": "Rayleigh scattering." } },
                { "index": 1, "message": { "role": "assistant", "content": "ignored" } }
            ]
        }"#;
        assert_eq!(parse_answer(body).unwrap(), "Rayleigh scattering.");
    }

    #[test]
    fn test_parse_rejects_bad_bodies() {
        assert!(matches!(
            parse_answer(br#"{"choices": []}"#),
            Err(Error::Parse(_))
        ));
        assert!(matches!(parse_answer(b"<html>"), Err(Error::Parse(_))));
    }

    /// A client that talks to the local test server directly.
    fn local_client(api_key: &str, base: String) -> AskClient {
        AskClient {
            client: Client::builder().no_proxy().build().unwrap(),
            ..AskClient::new(api_key)
        }
        .with_base_url(base)
    }

    /// Serve one canned HTTP response and hand back the raw request.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text[..split]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= split + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&request).to_string()
        });

        (base, handle)
    }

    #[tokio::test]
    async fn test_ask_round_trip() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"42"}}]}"#,
        )
        .await;

        let client = local_client("sk-test", format!("{base}/"));
        assert_eq!(client.ask("meaning of life?").await.unwrap(), "42");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /chat/completions"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer sk-test"));
        assert!(request.contains(r#""content":"meaning of life?""#));
    }

    #[tokio::test]
    async fn test_ask_maps_http_errors() {
        let (base, _server) = serve_once("401 Unauthorized", r#"{"error":"bad key"}"#).await;

        let err = local_client("sk-wrong", base)
            .ask("hello")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api(ref msg) if msg.contains("401")));
    }

    #[tokio::test]
    async fn test_ask_unreachable_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = local_client("sk-test", base)
            .ask("hello")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[test]
    fn test_builder_defaults() {
        let client = AskClient::new("k");
        assert_eq!(client.model(), DEFAULT_MODEL);
        assert_eq!(client.with_model("gpt-4o-mini").model(), "gpt-4o-mini");
    }
}
