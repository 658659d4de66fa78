use std::convert::Infallible;
use std::sync::Arc;

use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Response, Sse};
use futures_util::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::config::BridgeConfig;
use crate::error::GatewayError;
use crate::providers::openai::{self, ChatCompletionRequest, StreamChunk};
use crate::providers::popai::{self, PopAiClient, SendMessageRequest, extract};
use crate::server::AppState;

/// 流式聊天实现：
/// - 将多轮对话折叠为上游单条消息后建立流式连接
/// - 上游以行分隔的伪 SSE 返回增量内容，首条回显片段不下发
/// - 逐行转换为 OpenAI 风格 chunk，读尽后补发 stop 哨兵与 [DONE]
pub async fn stream_chat(
    app_state: Arc<AppState>,
    request: ChatCompletionRequest,
) -> Result<Response, GatewayError> {
    let payload = popai::translate(&request, &app_state.config.upstream);
    let id = openai::completion_id();
    let model = request.model.clone();
    let bridge = app_state.config.bridge.clone();
    let upstream = app_state.upstream.clone();

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Event>();
    tokio::spawn(async move {
        run_stream(upstream, bridge, payload, id, model, tx).await;
    });

    let out_stream =
        tokio_stream::StreamExt::map(UnboundedReceiverStream::new(rx), Ok::<_, Infallible>);
    Ok(Sse::new(out_stream)
        .keep_alive(KeepAlive::default())
        .into_response())
}

enum StreamOutcome {
    /// Upstream reached end-of-input on a successful attempt.
    Finished,
    /// The client stopped consuming; no further attempts.
    Cancelled,
}

enum LineOutcome {
    Sent,
    Skipped,
    Cancelled,
}

async fn run_stream(
    upstream: Arc<PopAiClient>,
    bridge: BridgeConfig,
    payload: SendMessageRequest,
    id: String,
    model: String,
    tx: UnboundedSender<Event>,
) {
    // 首条内容为上游对输入的回显；跳过状态跨重试保留
    let mut echo_skipped = false;

    for attempt in 1..=bridge.max_stream_attempts {
        let response = match upstream.open_stream(&payload).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(attempt, "upstream connect failed: {}", e);
                continue;
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(attempt, %status, "upstream returned non-success status, retrying");
            continue;
        }

        match forward_stream(response, &bridge, &id, &model, &mut echo_skipped, &tx).await {
            Ok(StreamOutcome::Finished) => {
                let done = StreamChunk::done(&id, &model);
                if let Ok(json) = serde_json::to_string(&done) {
                    let _ = tx.send(Event::default().data(json));
                }
                let _ = tx.send(Event::default().data("[DONE]"));
                return;
            }
            Ok(StreamOutcome::Cancelled) => return,
            Err(e) => {
                tracing::warn!(attempt, "upstream stream failed mid-read: {}", e);
            }
        }
    }

    // 重试耗尽：保持静默截断（不发错误块、不发 [DONE]），客户端以流提前
    // 结束感知失败
    tracing::warn!(
        attempts = bridge.max_stream_attempts,
        "upstream stream attempts exhausted; closing stream early"
    );
}

/// Drain one successful upstream response. Lines are split on `\n` from a
/// byte buffer so multi-byte characters survive chunk boundaries.
async fn forward_stream(
    response: reqwest::Response,
    bridge: &BridgeConfig,
    id: &str,
    model: &str,
    echo_skipped: &mut bool,
    tx: &UnboundedSender<Event>,
) -> Result<StreamOutcome, reqwest::Error> {
    let mut body = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(piece) = body.next().await {
        let piece = piece?;
        buffer.extend_from_slice(&piece);

        while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let LineOutcome::Cancelled =
                emit_line(line.trim_end(), bridge, id, model, echo_skipped, tx).await
            {
                return Ok(StreamOutcome::Cancelled);
            }
        }
    }

    // A final line without a trailing newline still counts.
    if !buffer.is_empty() {
        let line = String::from_utf8_lossy(&buffer);
        if let LineOutcome::Cancelled =
            emit_line(line.trim_end(), bridge, id, model, echo_skipped, tx).await
        {
            return Ok(StreamOutcome::Cancelled);
        }
    }

    Ok(StreamOutcome::Finished)
}

async fn emit_line(
    line: &str,
    bridge: &BridgeConfig,
    id: &str,
    model: &str,
    echo_skipped: &mut bool,
    tx: &UnboundedSender<Event>,
) -> LineOutcome {
    let Some(event) = extract::parse_stream_line(line) else {
        return LineOutcome::Skipped;
    };

    if !*echo_skipped {
        *echo_skipped = true;
        return LineOutcome::Skipped;
    }

    let chunk = StreamChunk::content(id, model, event.content);
    let Ok(json) = serde_json::to_string(&chunk) else {
        return LineOutcome::Skipped;
    };
    if tx.send(Event::default().data(json)).is_err() {
        // 客户端断开：停止读取，随 response 释放上游连接
        return LineOutcome::Cancelled;
    }

    tokio::time::sleep(bridge.chunk_interval()).await;
    LineOutcome::Sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::test_support;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn stream_request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "GPT-4".into(),
            messages: vec![openai::Message {
                role: "user".into(),
                content: "hi".into(),
            }],
            n: 1,
            stream: true,
        }
    }

    async fn collect_sse(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn forwards_fragments_in_order_and_drops_the_echo() {
        let server = MockServer::start().await;
        let upstream_body = concat!(
            "data: [{\"content\":\"f0\"}]\n",
            "data: [{\"content\":\"f1\"}]\n",
            "data: [{\"content\":\"f2\"}]\n",
        );
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/send"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(upstream_body, "text/event-stream"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let state = test_support::state(server.uri());
        let response = stream_chat(state, stream_request()).await.unwrap();
        let body = collect_sse(response).await;

        assert!(!body.contains("\"content\":\"f0\""));
        let f1 = body.find("\"content\":\"f1\"").unwrap();
        let f2 = body.find("\"content\":\"f2\"").unwrap();
        assert!(f1 < f2);
        assert_eq!(body.matches("\"finish_reason\":\"null\"").count(), 2);
        assert_eq!(body.matches("\"finish_reason\":\"stop\"").count(), 1);
        assert!(body.trim_end().ends_with("data: [DONE]"));
    }

    #[tokio::test]
    async fn malformed_and_non_data_lines_are_dropped_silently() {
        let server = MockServer::start().await;
        let upstream_body = concat!(
            "event: ping\n",
            "data: [{\"content\":\"echo\"}]\n",
            "not json at all\n",
            "data: [{\"content\":\"kept\"}]\n",
            "data: []\n",
        );
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/send"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(upstream_body, "text/event-stream"),
            )
            .mount(&server)
            .await;

        let state = test_support::state(server.uri());
        let response = stream_chat(state, stream_request()).await.unwrap();
        let body = collect_sse(response).await;

        assert!(body.contains("\"content\":\"kept\""));
        assert!(!body.contains("echo"));
        assert!(!body.contains("ping"));
        assert_eq!(body.matches("\"finish_reason\":\"stop\"").count(), 1);
    }

    #[tokio::test]
    async fn all_chunks_share_one_completion_id() {
        let server = MockServer::start().await;
        let upstream_body = concat!(
            "data: [{\"content\":\"f0\"}]\n",
            "data: [{\"content\":\"f1\"}]\n",
            "data: [{\"content\":\"f2\"}]\n",
        );
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/send"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(upstream_body, "text/event-stream"),
            )
            .mount(&server)
            .await;

        let state = test_support::state(server.uri());
        let response = stream_chat(state, stream_request()).await.unwrap();
        let body = collect_sse(response).await;

        let ids: Vec<String> = body
            .lines()
            .filter_map(|line| line.strip_prefix("data: "))
            .filter(|data| *data != "[DONE]")
            .map(|data| {
                serde_json::from_str::<serde_json::Value>(data).unwrap()["id"]
                    .as_str()
                    .unwrap()
                    .to_string()
            })
            .collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| *id == ids[0] && id.starts_with("chatcmpl-")));
    }

    #[tokio::test]
    async fn retry_exhaustion_ends_the_stream_with_no_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/send"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let state = test_support::state(server.uri());
        let response = stream_chat(state, stream_request()).await.unwrap();
        let body = collect_sse(response).await;

        assert!(!body.contains("data:"));
        assert!(!body.contains("[DONE]"));
    }

    #[tokio::test]
    async fn recovers_on_a_later_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/send"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/send"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "data: [{\"content\":\"f0\"}]\ndata: [{\"content\":\"f1\"}]\n",
                "text/event-stream",
            ))
            .mount(&server)
            .await;

        let state = test_support::state(server.uri());
        let response = stream_chat(state, stream_request()).await.unwrap();
        let body = collect_sse(response).await;

        assert!(body.contains("\"content\":\"f1\""));
        assert!(body.trim_end().ends_with("data: [DONE]"));
    }
}
