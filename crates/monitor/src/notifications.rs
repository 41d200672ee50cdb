use std::collections::VecDeque;

use crate::evaluator::Alert;

/// Maximum number of alerts retained.
pub const MAX_NOTIFICATIONS: usize = 10;

/// Newest-first alert history, bounded at [`MAX_NOTIFICATIONS`].
#[derive(Debug, Clone, Default)]
pub struct NotificationLog {
    entries: VecDeque<Alert>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(MAX_NOTIFICATIONS),
        }
    }

    /// Prepend a batch, keeping the batch's own order, then drop whatever
    /// falls past the cap.  Repeats are kept.
    pub fn push(&mut self, alerts: Vec<Alert>) {
        for alert in alerts.into_iter().rev() {
            self.entries.push_front(alert);
        }
        self.entries.truncate(MAX_NOTIFICATIONS);
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_vec(&self) -> Vec<Alert> {
        self.entries.iter().cloned().collect()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::Metric;
    use crate::thresholds::Side;

    fn alert(message: &str) -> Alert {
        Alert {
            metric: Metric::Temperature,
            level: Side::High,
            message: message.to_string(),
            time: "12:00:00".to_string(),
        }
    }

    fn messages(log: &NotificationLog) -> Vec<String> {
        log.iter().map(|a| a.message.clone()).collect()
    }

    #[test]
    fn starts_empty() {
        let log = NotificationLog::new();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
    }

    #[test]
    fn batch_keeps_its_order_in_front() {
        let mut log = NotificationLog::new();
        log.push(vec![alert("old")]);
        log.push(vec![alert("a"), alert("b")]);
        assert_eq!(messages(&log), vec!["a", "b", "old"]);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let mut log = NotificationLog::new();
        log.push(vec![alert("x")]);
        log.push(vec![]);
        assert_eq!(messages(&log), vec!["x"]);
    }

    #[test]
    fn never_exceeds_cap_and_evicts_oldest() {
        let mut log = NotificationLog::new();
        for i in 0..25 {
            log.push(vec![alert(&format!("n{i}"))]);
            assert!(log.len() <= MAX_NOTIFICATIONS);
        }
        let got = messages(&log);
        assert_eq!(got.len(), MAX_NOTIFICATIONS);
        assert_eq!(got.first().unwrap(), "n24");
        assert_eq!(got.last().unwrap(), "n15");
    }

    #[test]
    fn oversized_batch_keeps_its_first_entries() {
        let mut log = NotificationLog::new();
        log.push(vec![alert("old")]);
        let batch: Vec<_> = (0..12).map(|i| alert(&format!("b{i}"))).collect();
        log.push(batch);
        let got = messages(&log);
        assert_eq!(got.len(), MAX_NOTIFICATIONS);
        assert_eq!(got[0], "b0");
        assert_eq!(got[9], "b9");
    }

    #[test]
    fn duplicates_are_not_collapsed() {
        let mut log = NotificationLog::new();
        log.push(vec![alert("same")]);
        log.push(vec![alert("same")]);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn clear_empties_the_log() {
        let mut log = NotificationLog::new();
        log.push(vec![alert("x"), alert("y")]);
        log.clear();
        assert!(log.is_empty());
    }
}
