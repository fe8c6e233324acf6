use anyhow::{Context, Result, bail};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

use ketovital_core::chat::{ChatMessage, ChatReply, ChatRequest};
use ketovital_core::error::LedgerError;
use ketovital_core::sync::{PushRequest, PushResponse, SyncTransport};

const CHAT_PATH: &str = "/api/chat/food";

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(format!("ketovital-cli/{}", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(5)))
        .build()
        .context("Failed to build HTTP client")
}

/// Carries sync batches over HTTPS.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }
}

impl SyncTransport for HttpTransport {
    async fn push(&self, request: PushRequest) -> ketovital_core::Result<PushResponse> {
        let response = self
            .client
            .post(&request.url)
            .bearer_auth(&request.bearer)
            .header(CONTENT_TYPE, "application/json")
            .body(request.body)
            .send()
            .await
            .map_err(|e| LedgerError::transport(format!("Failed to reach sync endpoint: {e}")))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| LedgerError::Transport {
            status: Some(status),
            message: format!("Failed to read sync response: {e}"),
        })?;
        Ok(PushResponse { status, body })
    }
}

/// Client for the food-chat assistant.
pub struct ChatClient {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl ChatClient {
    pub fn new(endpoint: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            url: format!("{}{CHAT_PATH}", endpoint.trim_end_matches('/')),
            token,
        })
    }

    pub async fn send(&self, history: &[ChatMessage]) -> Result<ChatReply> {
        let mut request = self.client.post(&self.url).json(&ChatRequest {
            history: history.to_vec(),
        });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request
            .send()
            .await
            .context("Failed to reach the chat assistant")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("Chat assistant returned {status}");
        }
        resp.json()
            .await
            .context("Failed to parse chat assistant response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::State,
        http::{HeaderMap, StatusCode, header::AUTHORIZATION},
        routing::post,
    };
    use ketovital_core::models::{Category, EntryKind, Macros, MealPayload, NewComponent};
    use ketovital_core::service::{MealItem, VitalService};
    use ketovital_core::sync::{SyncConfig, SyncEngine, SyncOutcome};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<(Option<String>, Value)>>>;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn record(seen: &Seen, headers: &HeaderMap, body: Value) {
        let auth = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        seen.lock().unwrap().push((auth, body));
    }

    async fn accept(
        State(seen): State<Seen>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        record(&seen, &headers, body);
        Json(json!({ "status": "synced", "file_id": "abc" }))
    }

    async fn reject(
        State(seen): State<Seen>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, &'static str) {
        record(&seen, &headers, body);
        (StatusCode::INTERNAL_SERVER_ERROR, "drive unavailable")
    }

    async fn remote(accepting: bool) -> (String, Seen) {
        let seen: Seen = Arc::default();
        let route = if accepting { post(accept) } else { post(reject) };
        let router = Router::new()
            .route("/api/sync", route)
            .with_state(seen.clone());
        (serve(router).await, seen)
    }

    fn service_with_meal() -> (VitalService, String) {
        let svc = VitalService::new_in_memory().unwrap();
        let shake = svc
            .add_component(&NewComponent::new(
                "Shake",
                Category::ProteinBase,
                Macros::new(25.0, 2.0, 2.0, 120.0),
            ))
            .unwrap();
        let meal = svc.log_meal(&[MealItem::new(&shake.id, 1.0)], None).unwrap();
        (svc, meal.id)
    }

    fn engine(base: &str) -> SyncEngine<HttpTransport> {
        SyncEngine::new(
            HttpTransport::new(Duration::from_secs(5)).unwrap(),
            SyncConfig::new(Some(base.to_string())),
        )
    }

    #[tokio::test]
    async fn test_push_marks_meal_synced() {
        let (base, seen) = remote(true).await;
        let (svc, meal_id) = service_with_meal();

        let outcome = svc.sync(&engine(&base), Some("tok-1")).await.unwrap();
        let SyncOutcome::Pushed(report) = outcome else {
            panic!("expected a push, got {outcome:?}");
        };
        assert_eq!(report.ids_for(EntryKind::Meal), &[meal_id.clone()]);
        assert_eq!(report.acknowledgement["file_id"], "abc");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.as_deref(), Some("Bearer tok-1"));
        assert_eq!(seen[0].1["meals"][0]["id"], meal_id.as_str());
        assert_eq!(seen[0].1["meals"][0]["computedTotals"]["protein"], 25.0);

        let stored = svc
            .db()
            .get_entry::<MealPayload>(&meal_id)
            .unwrap()
            .unwrap();
        assert!(stored.synced);
    }

    #[tokio::test]
    async fn test_server_error_keeps_meal_unsynced() {
        let (base, seen) = remote(false).await;
        let (svc, _) = service_with_meal();

        let err = svc.sync(&engine(&base), Some("tok-1")).await.unwrap_err();
        match err {
            LedgerError::Transport { status, message } => {
                assert_eq!(status, Some(500));
                assert!(message.contains("drive unavailable"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(svc.db().count_unsynced(EntryKind::Meal).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let (svc, _) = service_with_meal();

        let err = svc
            .sync(&engine(&format!("http://{addr}")), Some("tok-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Transport { status: None, .. }));
        assert_eq!(svc.db().count_unsynced(EntryKind::Meal).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_retryable_and_keeps_meal_unsynced() {
        async fn stall(
            State(seen): State<Seen>,
            headers: HeaderMap,
            body: Json<Value>,
        ) -> Json<Value> {
            tokio::time::sleep(Duration::from_secs(3)).await;
            accept(State(seen), headers, body).await
        }

        let seen: Seen = Arc::default();
        let router = Router::new()
            .route("/api/sync", post(stall))
            .with_state(seen.clone());
        let base = serve(router).await;
        let (svc, meal_id) = service_with_meal();
        let engine = SyncEngine::new(
            HttpTransport::new(Duration::from_millis(300)).unwrap(),
            SyncConfig::new(Some(base)),
        );

        let err = svc.sync(&engine, Some("tok-1")).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, LedgerError::Transport { status: None, .. }));
        assert_eq!(svc.db().count_unsynced(EntryKind::Meal).unwrap(), 1);
        let stored = svc
            .db()
            .get_entry::<MealPayload>(&meal_id)
            .unwrap()
            .unwrap();
        assert!(!stored.synced);
    }

    #[tokio::test]
    async fn test_chat_client_round_trip() {
        async fn chat(Json(body): Json<Value>) -> Json<Value> {
            let turns = body["history"].as_array().map_or(0, Vec::len);
            Json(json!({
                "content": format!("seen {turns} turns"),
                "logging_data": {
                    "components": [{
                        "name": "Omelette",
                        "portion": "3 eggs",
                        "macros": { "protein": 18, "netCarbs": 2, "fat": 15, "calories": 220 }
                    }],
                    "totals": { "protein": 18, "netCarbs": 2, "fat": 15, "calories": 220 }
                }
            }))
        }

        let base = serve(Router::new().route("/api/chat/food", post(chat))).await;
        let client = ChatClient::new(&base, None, Duration::from_secs(5)).unwrap();
        let reply = client
            .send(&[
                ChatMessage::user("omelette"),
                ChatMessage::assistant("How many eggs?"),
                ChatMessage::user("three, log it"),
            ])
            .await
            .unwrap();

        assert_eq!(reply.content, "seen 3 turns");
        let log = reply.logging_data.unwrap();
        assert_eq!(log.components[0].name, "Omelette");
        assert_eq!(log.components[0].macros.calories, 220.0);
    }

    #[tokio::test]
    async fn test_chat_client_error_status() {
        async fn broken() -> StatusCode {
            StatusCode::BAD_GATEWAY
        }

        let base = serve(Router::new().route("/api/chat/food", post(broken))).await;
        let client = ChatClient::new(&base, Some("t".to_string()), Duration::from_secs(5)).unwrap();
        let err = client.send(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(err.to_string().contains("502"));
    }
}
