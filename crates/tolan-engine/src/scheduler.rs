//! Periodic summaries: weekly on Monday 09:00 local, monthly on the 1st at
//! 09:00 local. A minute-resolution ticker checks the wall clock and fires
//! each occurrence at most once; per-chat failures never stop the sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate, Timelike, Weekday};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::engine::Engine;

pub fn spawn_periodic_summaries(engine: Arc<Engine>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_weekly: Option<NaiveDate> = None;
        let mut last_monthly: Option<NaiveDate> = None;

        loop {
            ticker.tick().await;
            let now = chrono::Local::now();
            let today = now.date_naive();

            if due_weekly(now.weekday(), now.hour(), last_weekly, today) {
                last_weekly = Some(today);
                engine.run_periodic_summary("weekly").await;
            }
            if due_monthly(now.day(), now.hour(), last_monthly, today) {
                last_monthly = Some(today);
                engine.run_periodic_summary("monthly").await;
            }
        }
    })
}

fn due_weekly(weekday: Weekday, hour: u32, last: Option<NaiveDate>, today: NaiveDate) -> bool {
    weekday == Weekday::Mon && hour == 9 && last != Some(today)
}

fn due_monthly(day: u32, hour: u32, last: Option<NaiveDate>, today: NaiveDate) -> bool {
    day == 1 && hour == 9 && last != Some(today)
}

impl Engine {
    /// Push one summary to every chat known to the settings table.
    pub(crate) async fn run_periodic_summary(&self, period: &str) {
        let Some(store) = &self.store else {
            info!(period, "periodic summary skipped: persistence disabled");
            return;
        };
        let chat_ids = match store.list_chat_ids() {
            Ok(ids) => ids,
            Err(e) => {
                error!(period, error = %e, "cannot list chats for periodic summary");
                return;
            }
        };
        info!(period, chats = chat_ids.len(), "periodic summary sweep");
        for chat_id in chat_ids {
            // summarize_chat handles its own failures; one bad chat must not
            // block the rest of the sweep.
            self.summarize_chat(&chat_id, period).await;
        }
    }
}
