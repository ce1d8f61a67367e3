//! The "let me think" companion task.
//!
//! A timer races a cancellation signal: if the main model call has not
//! completed within the delay and thinking is enabled, a short placeholder
//! message goes out. `finish()` cancels the race and then joins the task, so
//! an in-flight placeholder send always completes before the caller sends
//! the real reply — the placeholder can never arrive after the answer.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use tolan_core::constants::MSG_THINKING;
use tolan_feishu::ChatClient;

pub(crate) struct ThinkingGuard {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ThinkingGuard {
    pub(crate) fn start(
        chat: Arc<dyn ChatClient>,
        chat_id: String,
        delay: Duration,
        enabled: bool,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if enabled {
                        debug!(chat_id, "model call slow, sending thinking message");
                        chat.send_text(&chat_id, MSG_THINKING).await;
                    }
                }
            }
        });
        Self { cancel, handle }
    }

    /// Cancel the timer and wait for the companion to settle. Must be called
    /// before the main reply is delivered.
    pub(crate) async fn finish(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}
