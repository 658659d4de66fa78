use serde::Serialize;

use crate::config::UpstreamConfig;
use crate::providers::openai::{ChatCompletionRequest, Message};

/// PopAI has no native multi-turn structure; this preamble teaches it to
/// read the flattened `role:content` transcript that follows.
pub const ROLE_PREAMBLE: &str = "This dialogue record is crucial for your understanding and execution of tasks. In our interactions, you are the 'assistant', and I am the 'user'. The format is as follows: when 'user:' appears, it signifies my questions or statements; correspondingly, you do not need to start your replies with 'assistant:', just respond directly. This format will facilitate a more efficient dialogue between us.";

/// Wire payload for `POST /api/v1/chat/send`. One fresh value per inbound
/// request; retry attempts reuse the same value.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub is_get_json: bool,
    pub version: String,
    pub language: String,
    pub channel_id: String,
    pub message: String,
    pub model: String,
    pub message_ids: Vec<String>,
    pub improve_id: Option<String>,
    pub rich_message_id: Option<String>,
    pub is_new_chat: Option<bool>,
    pub action: Option<String>,
    pub is_generate_ppt: Option<bool>,
    pub is_slides_chat: bool,
    pub image_urls: Vec<String>,
    pub role_enum: Option<String>,
    pub ppt_coordinates: String,
    pub translate_language: Option<String>,
    pub doc_prompt_template_id: Option<String>,
}

/// `role:content` pairs joined by commas, preserving turn order.
pub fn flatten_messages(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}:{}", m.role, m.content))
        .collect::<Vec<_>>()
        .join(",")
}

/// Collapse an OpenAI-style request into the upstream's single-message
/// contract. Total: every input, including an empty history, yields a valid
/// payload. The model name is copied verbatim.
pub fn translate(request: &ChatCompletionRequest, upstream: &UpstreamConfig) -> SendMessageRequest {
    SendMessageRequest {
        is_get_json: true,
        version: upstream.client_version.clone(),
        language: "zh-CN".to_string(),
        channel_id: upstream.channel_id.clone(),
        message: format!("{}{}", ROLE_PREAMBLE, flatten_messages(&request.messages)),
        model: request.model.clone(),
        message_ids: Vec::new(),
        improve_id: None,
        rich_message_id: None,
        is_new_chat: None,
        action: None,
        is_generate_ppt: None,
        is_slides_chat: false,
        image_urls: Vec::new(),
        role_enum: None,
        ppt_coordinates: String::new(),
        translate_language: None,
        doc_prompt_template_id: None,
    }
}
