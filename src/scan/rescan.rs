//! Debounced re-scanning after document mutations.

use crate::scan::document::{Document, MutationRecord, NodeId};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Quiet period before a burst of mutations triggers a re-scan.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(500);

/// Emitted once a burst of mutations under `root` has settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RescanTick {
    pub root: NodeId,
}

/// Whether a mutation can have introduced new prices: it added a text node,
/// or an element with some text in it.
pub fn should_rescan(doc: &Document, record: &MutationRecord) -> bool {
    record.added.iter().any(|&node| {
        doc.text(node).is_some() || !doc.text_content(node).trim().is_empty()
    })
}

/// Owns the single debounce timer for one root.
///
/// Every [`trigger`](Self::trigger) aborts the pending timer and starts a new
/// one; a [`RescanTick`] is sent only when a timer runs to completion.
/// Dropping the scheduler cancels any pending timer.
#[derive(Debug)]
pub struct RescanScheduler {
    root: NodeId,
    quiet: Duration,
    ticks: mpsc::UnboundedSender<RescanTick>,
    pending: Option<JoinHandle<()>>,
}

impl RescanScheduler {
    pub fn new(root: NodeId, quiet: Duration) -> (Self, mpsc::UnboundedReceiver<RescanTick>) {
        let (ticks, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            root,
            quiet,
            ticks,
            pending: None,
        };
        (scheduler, rx)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    /// Restart the timer if `record` qualifies. Returns whether it did.
    pub fn observe(&mut self, doc: &Document, record: &MutationRecord) -> bool {
        if !should_rescan(doc, record) {
            return false;
        }
        self.trigger();
        true
    }

    /// Restart the timer. Must be called within a tokio runtime.
    pub fn trigger(&mut self) {
        self.cancel();
        let ticks = self.ticks.clone();
        let deadline = Instant::now() + self.quiet;
        let tick = RescanTick { root: self.root };
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if ticks.send(tick).is_err() {
                log::debug!("rescan tick dropped; no listener");
            }
        }));
    }

    /// Abort the pending timer, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Whether a timer is armed and has not fired yet.
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RescanScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    async fn settle() {
        // Let spawned timers observe the advanced clock.
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_should_rescan_filters_mutations() {
        let mut doc = Document::new();
        let root = doc.root();

        let text = doc.create_text("$5");
        let added_text = doc.append_child(root, text);
        assert!(should_rescan(&doc, &added_text));

        let empty = doc.create_element("div");
        let added_empty = doc.append_child(root, empty);
        assert!(!should_rescan(&doc, &added_empty));

        let blank = doc.create_element("div");
        let ws = doc.create_text("   ");
        doc.append_child(blank, ws);
        let added_blank = doc.append_child(root, blank);
        assert!(!should_rescan(&doc, &added_blank));

        let filled = doc.create_element("div");
        doc.append_element_with_text(filled, "b", "€3");
        let added_filled = doc.append_child(root, filled);
        assert!(should_rescan(&doc, &added_filled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_tick_after_quiet_period() {
        let root = Document::new().root();
        let (mut scheduler, mut ticks) = RescanScheduler::new(root, DEFAULT_QUIET_PERIOD);

        scheduler.trigger();
        advance(Duration::from_millis(499)).await;
        settle().await;
        assert!(ticks.try_recv().is_err());

        advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(ticks.try_recv(), Ok(RescanTick { root }));
        assert!(!scheduler.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_debounced() {
        let root = Document::new().root();
        let (mut scheduler, mut ticks) = RescanScheduler::new(root, DEFAULT_QUIET_PERIOD);

        for _ in 0..5 {
            scheduler.trigger();
            advance(Duration::from_millis(300)).await;
            settle().await;
        }
        assert!(ticks.try_recv().is_err());
        assert!(scheduler.is_pending());

        advance(Duration::from_millis(200)).await;
        settle().await;
        assert!(ticks.try_recv().is_ok());
        assert!(ticks.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_observe_ignores_empty_mutation() {
        let mut doc = Document::new();
        let root = doc.root();
        let (mut scheduler, mut ticks) = RescanScheduler::new(root, DEFAULT_QUIET_PERIOD);

        let empty = doc.create_element("div");
        let record = doc.append_child(root, empty);
        assert!(!scheduler.observe(&doc, &record));

        advance(Duration::from_secs(1)).await;
        settle().await;
        assert!(ticks.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_timer() {
        let root = Document::new().root();
        let (mut scheduler, mut ticks) = RescanScheduler::new(root, DEFAULT_QUIET_PERIOD);
        scheduler.trigger();
        drop(scheduler);

        advance(Duration::from_secs(1)).await;
        settle().await;
        assert!(ticks.try_recv().is_err());
    }
}
