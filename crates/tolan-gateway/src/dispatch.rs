//! Background dispatch: intake enqueues, this loop consumes and spawns one
//! bounded task per event. Failures stay inside the event task — nothing
//! propagates back to the webhook path.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;

use tolan_engine::Engine;

/// Upper bound on one event's processing, comfortably above the slowest
/// pipeline (image generation at 120s plus delivery).
const EVENT_TASK_TIMEOUT: Duration = Duration::from_secs(300);

pub struct InboundEvent {
    pub event_type: String,
    pub event_id: String,
    pub payload: Value,
}

pub fn spawn_dispatcher(
    engine: Arc<Engine>,
    mut events_rx: mpsc::UnboundedReceiver<InboundEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                let outcome = tokio::time::timeout(
                    EVENT_TASK_TIMEOUT,
                    engine.handle_event(&event.event_type, &event.event_id, event.payload),
                )
                .await;
                if outcome.is_err() {
                    error!(event_id = %event.event_id, "event task timed out");
                }
            });
        }
    })
}
