//! Webhook ingress — POST /feishu/events.
//!
//! The platform retries deliveries that take too long or fail, so this
//! handler does the minimum and answers fast: challenge echo, token verify,
//! dedup, enqueue. Model-bound work happens in background tasks.
//!
//! Response contract: `{"challenge": …}` for URL verification, 403 for a
//! token mismatch, `{"code": 0}` for everything else — including malformed
//! bodies, which are logged and swallowed so the platform stops retrying.

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use tolan_feishu::event::{is_member_join, parse_event, url_challenge, verify_token, EVENT_TYPE_MESSAGE};

use crate::app::AppState;
use crate::dispatch::InboundEvent;

pub async fn events_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let Ok(envelope) = serde_json::from_slice::<Value>(&body) else {
        debug!("unparseable webhook body, dropping");
        return ok();
    };

    // 1. URL verification probes are echoed before anything else runs.
    if let Some(challenge) = url_challenge(&envelope) {
        debug!("url_verification challenge received");
        return (StatusCode::OK, Json(json!({"challenge": challenge})));
    }

    // 2. Token verification.
    let expected = &state.engine.config().feishu_verification_token;
    if !verify_token(&envelope, expected) {
        warn!("webhook token verification failed");
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": "invalid token"})),
        );
    }

    // 3–4. Normalize and deduplicate.
    let (event_type, event_id, payload) = parse_event(&envelope);
    if state.engine.seen_event(&event_id) {
        return ok();
    }
    debug!(event_type, event_id, "event accepted");

    // 5. Route. Dispatch is fire-and-forget; failures are logged downstream.
    if event_type == EVENT_TYPE_MESSAGE || is_member_join(&event_type) {
        let event = InboundEvent {
            event_type,
            event_id: event_id.clone(),
            payload,
        };
        if state.events_tx.send(event).is_err() {
            warn!(event_id, "dispatcher gone, event dropped");
        }
    }
    ok()
}

fn ok() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({"code": 0})))
}
