pub mod chat;
pub(crate) mod auth;
pub(crate) mod fanout;
pub(crate) mod streaming;

use std::sync::Arc;

use axum::Router;
use axum::routing::post;

use crate::config::Settings;
use crate::error::Result as AppResult;
use crate::providers::popai::PopAiClient;
use crate::tokenizer::{EstimatingTokenizer, Tokenizer};

#[derive(Clone)]
pub struct AppState {
    pub config: Settings,
    pub upstream: Arc<PopAiClient>,
    pub tokenizer: Arc<dyn Tokenizer + Send + Sync>,
}

pub fn create_app(config: Settings) -> AppResult<Router> {
    let upstream = Arc::new(PopAiClient::new(&config.upstream, &config.bridge)?);
    let app_state = AppState {
        config,
        upstream,
        tokenizer: Arc::new(EstimatingTokenizer),
    };

    let app = routes().with_state(Arc::new(app_state));

    // CORS：放开来源，便于浏览器端 SDK 直连网关
    use axum::http::{Method, header};
    use tower_http::cors::{AllowOrigin, CorsLayer};
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true);

    Ok(app.layer(cors))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/v1/chat/completions", post(chat::chat_completions))
}
