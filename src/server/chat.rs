use std::sync::Arc;

use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::{Json, extract::State};

use crate::error::GatewayError;
use crate::providers::openai::ChatCompletionRequest;
use crate::server::{AppState, auth, fanout, streaming};

/// Chat Completions 入口：校验入站令牌后按 `stream` 分流。
/// 流式路径单次上游调用；非流式按 n 并发扇出。
pub async fn chat_completions(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<Response, GatewayError> {
    auth::verify_bearer(&headers, &app_state.config.auth.api_key)?;

    tracing::debug!(
        model = %request.model,
        stream = request.stream,
        n = request.n,
        "dispatching chat completion"
    );

    if request.stream {
        let response = streaming::stream_chat(app_state, request).await?;
        Ok(response.into_response())
    } else {
        let response = fanout::aggregate_chat(app_state, request).await?;
        Ok(response.into_response())
    }
}
