use axum::extract::{Multipart, Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use futures::Stream;
use log::info;
use serde_json::Value;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use uuid::Uuid;

use crate::agent::ChatAgent;
use crate::error::AgentError;
use crate::models::api::{
    ConversationDetail, CreateConversationRequest, CreateMessageRequest, RagSearchRequest,
    RagSearchResponse, UploadResponse,
};
use crate::models::chat::Conversation;
use crate::rag::RetrievalClient;

const DEFAULT_CONVERSATION_TITLE: &str = "New Chat";

#[derive(Clone)]
struct AppState {
    agent: ChatAgent,
    uploads_dir: PathBuf,
}

pub fn router(agent: ChatAgent, uploads_dir: PathBuf) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = AppState {
        agent,
        uploads_dir: uploads_dir.clone(),
    };

    Router::new()
        .route("/api/upload", post(upload_image))
        .route(
            "/api/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route(
            "/api/conversations/{id}",
            get(get_conversation).delete(delete_conversation),
        )
        .route("/api/conversations/{id}/messages", post(post_message))
        .route("/api/rag/search", post(rag_search))
        .route("/api/documents", get(list_documents))
        .route("/api/chunks", get(list_chunks))
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .layer(cors)
        .with_state(state)
}

async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AgentError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AgentError::Validation(e.to_string()))?
    {
        if field.name() != Some("image") {
            continue;
        }

        let ext = field
            .file_name()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();
        let data = field
            .bytes()
            .await
            .map_err(|e| AgentError::Validation(e.to_string()))?;

        let name = format!("{}-{}{}", Utc::now().timestamp_millis(), Uuid::new_v4().simple(), ext);
        tokio::fs::write(state.uploads_dir.join(&name), &data).await?;
        info!("Stored upload {} ({} bytes)", name, data.len());

        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                url: format!("/uploads/{}", name),
            }),
        ));
    }

    Err(AgentError::Validation("No file uploaded".to_string()))
}

async fn list_conversations(
    State(state): State<AppState>,
) -> Result<Json<Vec<Conversation>>, AgentError> {
    Ok(Json(state.agent.store().get_conversations().await?))
}

async fn create_conversation(
    State(state): State<AppState>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, AgentError> {
    let title = req
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CONVERSATION_TITLE.to_string());
    let conversation = state.agent.store().create_conversation(&title).await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

async fn get_conversation(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<i64>,
) -> Result<Json<ConversationDetail>, AgentError> {
    let conversation = state
        .agent
        .store()
        .get_conversation(id)
        .await?
        .ok_or(AgentError::NotFound)?;
    let messages = state.agent.store().get_messages(id).await?;
    Ok(Json(ConversationDetail {
        conversation,
        messages,
    }))
}

async fn delete_conversation(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<i64>,
) -> Result<StatusCode, AgentError> {
    state.agent.store().delete_conversation(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Appends a user message and answers with the live completion stream.
/// Pre-flight failures come back as plain error responses; once the
/// event stream is open, failures arrive as in-band `error` frames.
async fn post_message(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<i64>,
    Json(req): Json<CreateMessageRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AgentError> {
    let rx = state.agent.begin_chat(id, req.content, req.image_url).await?;

    let stream = ReceiverStream::new(rx).map(|frame| {
        let data = serde_json::to_string(&frame).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().data(data))
    });
    Ok(Sse::new(stream))
}

fn retrieval_client(state: &AppState) -> Result<Arc<RetrievalClient>, AgentError> {
    state
        .agent
        .retrieval()
        .ok_or_else(|| AgentError::Config("Retrieval is not configured".to_string()))
}

async fn rag_search(
    State(state): State<AppState>,
    Json(req): Json<RagSearchRequest>,
) -> Result<Json<RagSearchResponse>, AgentError> {
    let query = req.query.unwrap_or_default();
    if query.trim().is_empty() {
        return Err(AgentError::Validation("Query is required".to_string()));
    }

    let retrieval = retrieval_client(&state)?;
    let limit = req.limit.unwrap_or(retrieval.default_limit);
    let results = retrieval.search(&query, limit).await?;
    Ok(Json(RagSearchResponse { results, query }))
}

async fn list_documents(State(state): State<AppState>) -> Result<Json<Vec<Value>>, AgentError> {
    Ok(Json(retrieval_client(&state)?.documents().await?))
}

async fn list_chunks(State(state): State<AppState>) -> Result<Json<Vec<Value>>, AgentError> {
    Ok(Json(retrieval_client(&state)?.chunks().await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::prompt::PromptConfig;
    use crate::store::MemoryMessageStore;
    use axum::body::Body;
    use axum::http::header::CONTENT_TYPE;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app() -> (Router, PathBuf) {
        let uploads_dir = std::env::temp_dir().join(format!("uploads-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&uploads_dir).unwrap();
        let agent = ChatAgent::from_parts(
            Arc::new(MemoryMessageStore::new()),
            None,
            None,
            Arc::new(PromptConfig::default()),
        );
        (router(agent, uploads_dir.clone()), uploads_dir)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn conversations_start_empty_and_list_after_create() {
        let (app, _dir) = test_app();

        let response = app
            .clone()
            .oneshot(Request::get("/api/conversations").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!([]));

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/conversations", r#"{"title":"Demo"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["title"], "Demo");

        let response = app
            .clone()
            .oneshot(Request::get("/api/conversations").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let listed = body_json(response).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_title_defaults_to_new_chat() {
        let (app, _dir) = test_app();
        let response = app
            .oneshot(json_request("POST", "/api/conversations", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["title"], "New Chat");
    }

    #[tokio::test]
    async fn conversation_detail_embeds_messages_or_404s() {
        let (app, _dir) = test_app();

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/conversations", r#"{"title":"Demo"}"#))
            .await
            .unwrap();
        let id = body_json(response).await["id"].as_i64().unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/api/conversations/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let detail = body_json(response).await;
        assert_eq!(detail["title"], "Demo");
        assert_eq!(detail["messages"], serde_json::json!([]));

        let response = app
            .oneshot(Request::get("/api/conversations/999").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (app, _dir) = test_app();

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/conversations", r#"{"title":"Demo"}"#))
            .await
            .unwrap();
        let id = body_json(response).await["id"].as_i64().unwrap();

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(
                    Request::delete(format!("/api/conversations/{}", id))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
        }
    }

    #[tokio::test]
    async fn posting_a_message_without_credentials_is_a_json_500() {
        let (app, _dir) = test_app();

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/conversations", r#"{"title":"Demo"}"#))
            .await
            .unwrap();
        let id = body_json(response).await["id"].as_i64().unwrap();

        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/api/conversations/{}/messages", id),
                r#"{"content":"Hi"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["message"].as_str().unwrap().contains("PROVIDER_API_KEY"));
    }

    #[tokio::test]
    async fn upload_without_a_file_is_rejected_and_writes_nothing() {
        let (app, dir) = test_app();

        let response = app
            .oneshot(
                Request::post("/api/upload")
                    .header(CONTENT_TYPE, "multipart/form-data; boundary=xyz")
                    .body(Body::from("--xyz--\r\n"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["message"], "No file uploaded");
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn upload_stores_the_file_and_returns_its_url() {
        let (app, dir) = test_app();

        let body = "--xyz\r\n\
                    Content-Disposition: form-data; name=\"image\"; filename=\"cat.png\"\r\n\
                    Content-Type: image/png\r\n\r\n\
                    fake-png-bytes\r\n\
                    --xyz--\r\n";
        let response = app
            .oneshot(
                Request::post("/api/upload")
                    .header(CONTENT_TYPE, "multipart/form-data; boundary=xyz")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let url = body_json(response).await["url"].as_str().unwrap().to_string();
        assert!(url.starts_with("/uploads/"));
        assert!(url.ends_with(".png"));

        let name = url.trim_start_matches("/uploads/");
        let stored = std::fs::read(dir.join(name)).unwrap();
        assert_eq!(stored, b"fake-png-bytes");

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn rag_search_requires_a_query() {
        let (app, _dir) = test_app();
        let response = app
            .oneshot(json_request("POST", "/api/rag/search", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["message"], "Query is required");
    }
}
