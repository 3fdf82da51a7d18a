//! Multi-source reminder pipeline.
//!
//! One run walks `FETCH_ALL -> NOTIFY_ALL -> FOLD` strictly in order and
//! sequentially. Failures are kept per source: a source whose query or comment
//! fails is recorded and the run moves on to the next one, so unaffected
//! sources are still notified.

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::message;
use crate::model::{NotificationResult, ShoppingItem, SourceRecord};
use crate::notion::{NotionError, NotionService};
use crate::throttle::CallPacer;

/// Fetch result of a single source.
#[derive(Debug)]
pub struct SourceFetch<'a> {
    pub source: &'a SourceRecord,
    pub result: Result<Vec<ShoppingItem>, NotionError>,
}

impl SourceFetch<'_> {
    /// Items to notify about; a failed fetch counts as no items.
    pub fn items(&self) -> &[ShoppingItem] {
        self.result.as_deref().unwrap_or(&[])
    }
}

/// How a source fared in the notify phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyStatus {
    Skipped,
    Sent,
    Failed(String),
}

/// Counters folded into the final result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunTally {
    pub total_items: usize,
    pub successes: usize,
    pub failures: usize,
    pub errors: Vec<String>,
}

impl RunTally {
    fn record(&mut self, source: &SourceRecord, status: &NotifyStatus) {
        match status {
            NotifyStatus::Skipped => {}
            NotifyStatus::Sent => self.successes += 1,
            NotifyStatus::Failed(err) => {
                self.failures += 1;
                self.errors.push(format!("{}: {}", source.display_name, err));
            }
        }
    }
}

/// Collapse a run's counters into the single result reported to the caller.
///
/// The zero-items check comes first: nothing to report wins over any
/// success/failure accounting.
pub fn fold_outcome(tally: &RunTally) -> NotificationResult {
    if tally.total_items == 0 {
        return NotificationResult::succeeded(message::NOTHING_TO_SEND);
    }
    let detail = tally.errors.join("; ");
    match (tally.successes, tally.failures) {
        (s, 0) => NotificationResult::succeeded(message::all_notified(s, tally.total_items)),
        (0, _) => NotificationResult::with_error(false, message::ALL_FAILED, detail),
        (s, f) => NotificationResult::with_error(true, message::partially_notified(s, f), detail),
    }
}

pub struct ReminderPipeline<'a> {
    notion: &'a dyn NotionService,
    pacer: &'a dyn CallPacer,
}

impl<'a> ReminderPipeline<'a> {
    pub fn new(notion: &'a dyn NotionService, pacer: &'a dyn CallPacer) -> Self {
        Self { notion, pacer }
    }

    /// Run the whole pipeline once over the active `sources`, in the given order.
    pub async fn run(&self, sources: &[SourceRecord]) -> NotificationResult {
        let run_id = Uuid::new_v4();
        let span = info_span!("reminder_run", %run_id, sources = sources.len());
        async {
            let fetched = self.fetch_all(sources).await;
            let tally = self.notify_all(&fetched).await;
            let result = fold_outcome(&tally);
            info!(
                success = result.success,
                total_items = tally.total_items,
                successes = tally.successes,
                failures = tally.failures,
                "run finished"
            );
            result
        }
        .instrument(span)
        .await
    }

    pub async fn fetch_all<'s>(&self, sources: &'s [SourceRecord]) -> Vec<SourceFetch<'s>> {
        let mut fetched = Vec::with_capacity(sources.len());
        for source in sources.iter().filter(|s| !s.is_active) {
            debug!(source = %source.display_name, "inactive source; not fetched");
        }
        for (idx, source) in sources.iter().filter(|s| s.is_active).enumerate() {
            if idx > 0 {
                self.pacer.wait_until_allowed().await;
            }
            let result = self.notion.query_unchecked_items(source).await;
            match &result {
                Ok(items) => info!(
                    source = %source.display_name,
                    count = items.len(),
                    "fetched unchecked items"
                ),
                Err(err) => warn!(
                    source = %source.display_name,
                    error = %err,
                    "fetch failed; treating source as empty"
                ),
            }
            fetched.push(SourceFetch { source, result });
        }
        fetched
    }

    pub async fn notify_all(&self, fetched: &[SourceFetch<'_>]) -> RunTally {
        let mut tally = RunTally::default();
        for entry in fetched {
            let items = entry.items();
            tally.total_items += items.len();
            let status = self.notify_one(entry.source, items, tally.successes > 0).await;
            tally.record(entry.source, &status);
        }
        tally
    }

    async fn notify_one(
        &self,
        source: &SourceRecord,
        items: &[ShoppingItem],
        pace_first: bool,
    ) -> NotifyStatus {
        if items.is_empty() {
            info!(source = %source.display_name, "no unchecked items; skipping comment");
            return NotifyStatus::Skipped;
        }
        if pace_first {
            self.pacer.wait_until_allowed().await;
        }
        let text = message::format_comment_message(&source.display_name, items);
        match self.notion.create_comment(&source.page_id, &text).await {
            Ok(()) => {
                info!(source = %source.display_name, count = items.len(), "reminder posted");
                NotifyStatus::Sent
            }
            Err(err) => {
                warn!(source = %source.display_name, error = %err, "failed to post reminder");
                NotifyStatus::Failed(err.to_string())
            }
        }
    }
}
