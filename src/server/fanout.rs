use std::sync::Arc;

use axum::Json;
use chrono::Utc;
use futures_util::future::try_join_all;
use tokio::sync::Semaphore;

use crate::error::GatewayError;
use crate::providers::openai::{
    self, AssistantMessage, ChatCompletionRequest, ChatCompletionResponse, Choice, Usage,
};
use crate::providers::popai::{self, extract};
use crate::server::AppState;
use crate::tokenizer;

/// 非流式实现：上游一次调用只产一条补全，n>1 通过受限并发扇出模拟。
/// choices 按发起顺序编号，与完成顺序无关；任一调用失败则整体失败。
pub async fn aggregate_chat(
    app_state: Arc<AppState>,
    request: ChatCompletionRequest,
) -> Result<Json<ChatCompletionResponse>, GatewayError> {
    let payload = popai::translate(&request, &app_state.config.upstream);
    let family = tokenizer::model_family(&request.model);
    let prompt_tokens = app_state
        .tokenizer
        .count_tokens(&tokenizer::prompt_text(&request.messages), family)
        as u32;

    let limiter = Arc::new(Semaphore::new(app_state.config.bridge.max_concurrent_calls));
    let calls = (0..request.completions()).map(|_| {
        let upstream = app_state.upstream.clone();
        let payload = payload.clone();
        let limiter = limiter.clone();
        async move {
            let _permit = limiter
                .acquire_owned()
                .await
                .map_err(|e| GatewayError::Config(e.to_string()))?;
            upstream.send(&payload).await
        }
    });

    // try_join_all 保序且首错即停；失败时丢弃已完成的部分结果
    let bodies = try_join_all(calls).await?;

    let choices: Vec<Choice> = bodies
        .iter()
        .enumerate()
        .map(|(index, body)| Choice {
            index: index as u32,
            message: AssistantMessage::assistant(extract::completion_text(body)),
            finish_reason: "stop".to_string(),
        })
        .collect();

    let completion_tokens: u32 = choices
        .iter()
        .map(|choice| {
            app_state
                .tokenizer
                .count_tokens(&choice.message.content, family) as u32
        })
        .sum();

    // 聚合完成后的固定间隔，平滑对上游的重复整批调用
    tokio::time::sleep(app_state.config.bridge.aggregate_pause()).await;

    Ok(Json(ChatCompletionResponse {
        id: openai::completion_id(),
        object: "chat.completion".to_string(),
        created: Utc::now().timestamp(),
        model: request.model.clone(),
        choices,
        usage: Usage::new(prompt_tokens, completion_tokens),
    }))
}
