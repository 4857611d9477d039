use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatBackend, ChatTurn, Role, UpstreamError};
use crate::config::ChatConfig;

/// Client for the Gemini `generateContent` REST endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: Role,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl ChatBackend for GeminiClient {
    async fn send(&self, history: &[ChatTurn], message: &str) -> Result<String, UpstreamError> {
        let api_key = self.api_key.as_deref().ok_or(UpstreamError::NotConfigured)?;

        let mut contents: Vec<Content<'_>> = history
            .iter()
            .map(|turn| Content {
                role: turn.role,
                parts: [Part { text: &turn.text }],
            })
            .collect();
        contents.push(Content {
            role: Role::User,
            parts: [Part { text: message }],
        });

        debug!(model = %self.model, turns = contents.len(), "Sending to language service");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&GenerateRequest { contents })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(UpstreamError::EmptyReply);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Path,
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};

    async fn spawn_mock(router: Router) -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::Server::from_tcp(listener)
                .unwrap()
                .serve(router.into_make_service())
                .await
                .unwrap();
        });
        format!("http://{addr}")
    }

    fn client(base_url: String, api_key: Option<&str>) -> GeminiClient {
        GeminiClient::new(&ChatConfig {
            api_key: api_key.map(String::from),
            model: "gemini-1.5-flash".into(),
            base_url,
        })
    }

    async fn echo(
        Path(call): Path<String>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some("test-key") {
            return (StatusCode::FORBIDDEN, Json(json!({"error": "bad key"})));
        }
        let turns = body["contents"].as_array().map(|c| c.len()).unwrap_or(0);
        let last = body["contents"][turns - 1]["parts"][0]["text"]
            .as_str()
            .unwrap_or("")
            .to_string();
        let role = body["contents"][turns - 1]["role"].as_str().unwrap_or("").to_string();
        let reply = format!("{call}|{turns}|{role}|{last}");
        (
            StatusCode::OK,
            Json(json!({"candidates": [{"content": {"parts": [{"text": reply}]}}]})),
        )
    }

    #[tokio::test]
    async fn test_single_turn_request_shape() {
        let base = spawn_mock(Router::new().route("/models/:call", post(echo))).await;
        let reply = client(base, Some("test-key")).send(&[], "hello").await.unwrap();
        assert_eq!(reply, "gemini-1.5-flash:generateContent|1|user|hello");
    }

    #[tokio::test]
    async fn test_history_is_sent_before_message() {
        let base = spawn_mock(Router::new().route("/models/:call", post(echo))).await;
        let history = [ChatTurn::user("setup"), ChatTurn::model("ok")];
        let reply = client(base, Some("test-key"))
            .send(&history, "question")
            .await
            .unwrap();
        assert!(reply.ends_with("|3|user|question"));
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let base = spawn_mock(Router::new().route("/models/:call", post(echo))).await;
        let err = client(base, Some("wrong-key")).send(&[], "hi").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_empty_candidates() {
        let router = Router::new().route(
            "/models/:call",
            post(|| async { Json(json!({"candidates": []})) }),
        );
        let base = spawn_mock(router).await;
        let err = client(base, Some("test-key")).send(&[], "hi").await.unwrap_err();
        assert!(matches!(err, UpstreamError::EmptyReply));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let err = client("http://127.0.0.1:9".into(), None)
            .send(&[], "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::NotConfigured));
    }
}
