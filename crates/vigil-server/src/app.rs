use crate::config::ServerConfig;
use crate::state::AppState;
use crate::{api, logging};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use vigil_notify::channels::email::{EmailChannel, SmtpEmailSender};
use vigil_notify::channels::webhook::WebhookChannel;
use vigil_notify::channels::websocket::{SessionHub, WebsocketChannel};
use vigil_notify::NotificationDispatcher;
use vigil_storage::UserDirectory;

pub fn build_http_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/health", get(api::health))
        .route("/v1/metrics", post(api::ingest_metrics))
        .route("/v1/ws/{user_id}", get(api::ws::connect))
        .layer(middleware::from_fn(logging::request_logging))
        .layer(cors)
        .with_state(state)
}

/// Registers the websocket and webhook channels, and email when `[smtp]` is
/// configured.
pub fn build_dispatcher(
    config: &ServerConfig,
    users: Arc<dyn UserDirectory>,
    hub: Arc<SessionHub>,
) -> anyhow::Result<NotificationDispatcher> {
    let mut dispatcher = NotificationDispatcher::new();

    dispatcher.register(Box::new(WebsocketChannel::new(hub)));
    dispatcher.register(Box::new(WebhookChannel::new(Duration::from_secs(
        config.webhook.timeout_secs,
    ))?));

    match &config.smtp {
        Some(smtp) => {
            let sender = SmtpEmailSender::new(
                &smtp.host,
                smtp.port,
                smtp.username.as_deref(),
                smtp.password.as_deref(),
                &smtp.from,
            )?;
            dispatcher.register(Box::new(EmailChannel::new(users, Arc::new(sender))));
        }
        None => tracing::info!("No [smtp] section, email notifications disabled"),
    }

    Ok(dispatcher)
}
