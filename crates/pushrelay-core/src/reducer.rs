//! Event reducer: picks the single record of a push that gets displayed.
//!
//! "Most recent" is purely positional. Records carry no timestamp, so the
//! last element of the event wins. No state is kept between events, which
//! means there is no deduplication and no reordering across pushes.

use crate::models::{NotificationRecord, SubscriptionEvent};

/// Select the record to display for one subscription event.
///
/// Returns `None` for an empty event. Record content is not validated; an
/// empty message is returned like any other.
pub fn reduce(event: &SubscriptionEvent) -> Option<NotificationRecord> {
    event.records().last().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(messages: &[&str]) -> SubscriptionEvent {
        messages.iter().copied().map(NotificationRecord::new).collect()
    }

    #[test]
    fn empty_event_yields_nothing() {
        assert_eq!(reduce(&SubscriptionEvent::default()), None);
    }

    #[test]
    fn single_record_is_selected() {
        let selected = reduce(&event(&["Order shipped"]));
        assert_eq!(selected, Some(NotificationRecord::new("Order shipped")));
    }

    #[test]
    fn last_record_wins() {
        assert_eq!(
            reduce(&event(&["a", "b"])),
            Some(NotificationRecord::new("b"))
        );
    }

    #[test]
    fn earlier_content_is_irrelevant() {
        let selected = reduce(&event(&["", "zzz", "newest", "aaa"]));
        assert_eq!(selected.map(|r| r.message), Some("aaa".to_string()));
    }

    #[test]
    fn empty_message_is_still_selected() {
        assert_eq!(reduce(&event(&["x", ""])), Some(NotificationRecord::new("")));
    }

    #[test]
    fn duplicates_are_not_collapsed() {
        let first = reduce(&event(&["same"]));
        let second = reduce(&event(&["same"]));
        assert_eq!(first, second);
        assert!(first.is_some());
    }
}
