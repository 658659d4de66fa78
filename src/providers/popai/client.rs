use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, ORIGIN, REFERER};

use crate::config::{BridgeConfig, UpstreamConfig};
use crate::error::GatewayError;
use crate::http_client;

use super::request::SendMessageRequest;

/// HTTP client for the PopAI chat endpoint. Credentials and session
/// metadata are injected at construction and read-only afterwards.
pub struct PopAiClient {
    stream_client: reqwest::Client,
    call_client: reqwest::Client,
    send_url: String,
    headers: HeaderMap,
}

impl PopAiClient {
    pub fn new(upstream: &UpstreamConfig, bridge: &BridgeConfig) -> Result<Self, GatewayError> {
        let stream_client =
            http_client::streaming_client(bridge.connect_timeout(), bridge.read_timeout())?;
        let call_client = http_client::oneshot_client(bridge.request_timeout())?;
        let send_url = format!(
            "{}/api/v1/chat/send",
            upstream.base_url.trim_end_matches('/')
        );
        let headers = build_headers(upstream)?;

        Ok(Self {
            stream_client,
            call_client,
            send_url,
            headers,
        })
    }

    /// Open a streaming call and hand back the raw response; the caller
    /// checks the status and consumes the body line by line.
    pub async fn open_stream(
        &self,
        payload: &SendMessageRequest,
    ) -> Result<reqwest::Response, reqwest::Error> {
        self.stream_client
            .post(&self.send_url)
            .headers(self.headers.clone())
            .json(payload)
            .send()
            .await
    }

    /// One non-streaming call; non-success statuses become errors.
    pub async fn send(&self, payload: &SendMessageRequest) -> Result<String, GatewayError> {
        let response = self
            .call_client
            .post(&self.send_url)
            .headers(self.headers.clone())
            .json(payload)
            .send()
            .await?;
        Ok(response.error_for_status()?.text().await?)
    }
}

// 浏览器指纹头是上游风控的一部分，缺失会被拒绝；凭据类头从配置读入。
fn build_headers(upstream: &UpstreamConfig) -> Result<HeaderMap, GatewayError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
    headers.insert(
        "accept-language",
        HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8,zh-TW;q=0.7,zh-HK;q=0.6"),
    );
    headers.insert("app-name", HeaderValue::from_static("popai-web"));
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&upstream.authorization)
            .map_err(|_| GatewayError::Config("invalid upstream authorization value".into()))?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        "device-info",
        HeaderValue::from_static("{web_id:k-s8Xp4S9LEmrHghBhT2m,baidu_id:18f1ff567e243687188711}"),
    );
    headers.insert(
        "gtoken",
        HeaderValue::from_str(&upstream.gtoken)
            .map_err(|_| GatewayError::Config("invalid upstream gtoken value".into()))?,
    );
    headers.insert("language", HeaderValue::from_static("en"));
    headers.insert(ORIGIN, HeaderValue::from_static("https://www.popai.pro"));
    headers.insert("priority", HeaderValue::from_static("u=1, i"));
    headers.insert(REFERER, HeaderValue::from_static("https://www.popai.pro/"));
    headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?0"));
    headers.insert("sec-ch-ua-platform", HeaderValue::from_static("Windows"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("cors"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("same-site"));
    Ok(headers)
}
