use crate::config::Secrets;
use crate::dispatcher::{Dispatcher, Interaction};
use crate::error::WebhookError;
use crate::slack::{EventEnvelope, InnerEvent, InteractionForm, InteractionPayload, verify_signature};
use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

const MAX_BODY_BYTES: usize = 1024 * 1024;
const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
const SIGNATURE_HEADER: &str = "x-slack-signature";

#[derive(Clone)]
pub struct AppState {
    dispatcher: Arc<Dispatcher>,
    secrets: Arc<Secrets>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, secrets: Secrets) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            secrets: Arc::new(secrets),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let slack_routes = Router::new()
        .route("/slack/events", post(slack_events))
        .route("/interactions", post(interactions))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            verify_slack_request,
        ));

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .merge(slack_routes)
        .with_state(state)
}

async fn verify_slack_request(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, WebhookError> {
    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|error| WebhookError::BadPayload(error.to_string()))?;

    let timestamp = header_str(&parts.headers, TIMESTAMP_HEADER)?;
    let signature = header_str(&parts.headers, SIGNATURE_HEADER)?;
    if let Err(error) = verify_signature(
        &state.secrets.signing_secret,
        timestamp,
        &bytes,
        signature,
        Utc::now().timestamp(),
    ) {
        warn!("rejected slack request to {}: {error}", parts.uri.path());
        return Err(error);
    }

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, WebhookError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or(WebhookError::MissingSignature)
}

async fn slack_events(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, WebhookError> {
    let envelope: EventEnvelope = serde_json::from_slice(&body)
        .map_err(|error| WebhookError::BadPayload(error.to_string()))?;
    check_token(&state, envelope.token())?;

    match envelope {
        EventEnvelope::UrlVerification { challenge, .. } => {
            Ok(Json(serde_json::json!({ "challenge": challenge })).into_response())
        }
        EventEnvelope::EventCallback {
            event: InnerEvent::AppMention(mention),
            ..
        } => {
            let dispatcher = state.dispatcher.clone();
            tokio::spawn(async move {
                dispatcher.handle_mention(&mention).await;
            });
            Ok(StatusCode::OK.into_response())
        }
        _ => {
            debug!("ignoring unhandled slack event");
            Ok(StatusCode::OK.into_response())
        }
    }
}

async fn interactions(
    State(state): State<AppState>,
    Form(form): Form<InteractionForm>,
) -> Result<StatusCode, WebhookError> {
    let payload: InteractionPayload = serde_json::from_str(&form.payload)
        .map_err(|error| WebhookError::BadPayload(error.to_string()))?;
    check_token(&state, payload.token.as_deref())?;

    let Some(channel) = payload.channel else {
        debug!("ignoring interaction without a channel");
        return Ok(StatusCode::OK);
    };
    let Some(action) = payload.actions.into_iter().next() else {
        debug!("ignoring interaction without actions");
        return Ok(StatusCode::OK);
    };

    let interaction = Interaction {
        channel: channel.id,
        user: payload.user.id,
        action_id: action.action_id,
        value: action.selected_option.map(|option| option.value),
    };
    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        dispatcher.handle_interaction(interaction).await;
    });
    Ok(StatusCode::OK)
}

/// Payload tokens are optional on newer apps; when present they must match.
fn check_token(state: &AppState, token: Option<&str>) -> Result<(), WebhookError> {
    match token {
        Some(token) if token != state.secrets.verification_token => {
            warn!("rejected slack payload with mismatched verification token");
            Err(WebhookError::BadToken)
        }
        _ => Ok(()),
    }
}
