use crate::event::Message;
use std::collections::HashSet;

/// Decides which feed messages the relay acts on.
///
/// Remembers every message identifier it has been shown, for the lifetime
/// of the filter. There is no eviction.
#[derive(Debug, Clone, Default)]
pub struct DedupFilter {
    seen: HashSet<String>,
    include_test: bool,
    include_repeat: bool,
}

impl DedupFilter {
    /// A filter that rejects test alerts and replays.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept messages flagged as test alerts.
    pub fn include_test_alerts(mut self, include: bool) -> Self {
        self.include_test = include;
        self
    }

    /// Accept messages flagged `repeat` / `forceRepeat`.
    pub fn include_repeat_alerts(mut self, include: bool) -> Self {
        self.include_repeat = include;
        self
    }

    /// Whether `message` should be handled.
    ///
    /// The identifier is recorded on first sight, before the test and repeat
    /// checks, so a message rejected once is rejected on every resubmission.
    /// Messages without an identifier are never recorded and never count as
    /// duplicates.
    ///
    /// # Examples
    ///
    /// ```
    /// use alertfold::{DedupFilter, Message};
    ///
    /// let mut filter = DedupFilter::new();
    /// let message = Message::with_id("abc");
    /// assert!(filter.should_handle(&message));
    /// assert!(!filter.should_handle(&message));
    /// ```
    pub fn should_handle(&mut self, message: &Message) -> bool {
        if let Some(id) = &message.id
            && !self.seen.insert(id.clone())
        {
            return false;
        }

        if message.is_test && !self.include_test {
            return false;
        }

        if (message.repeat || message.force_repeat) && !self.include_repeat {
            return false;
        }

        true
    }

    /// Whether `id` has been seen.
    pub fn has_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Number of identifiers remembered.
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}
