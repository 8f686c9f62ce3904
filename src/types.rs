//! Order record model shared by the front desk and the kitchen.

use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier assigned to an order by the front desk.
pub type OrderId = u32;
/// Wall-clock instant in milliseconds since the Unix epoch; 0 means unset.
pub type Timestamp = i64;

/// Maximum description length in bytes on the wire.
pub const MAX_DESCRIPTION: usize = 100;
/// Reserved description that tells the kitchen to stop.
pub const SENTINEL: &str = "sair";

/// Current wall-clock time as a [`Timestamp`].
pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or(0)
}

/// Unit exchanged between the two stages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderRecord {
    pub id: OrderId,
    /// Always at most [`MAX_DESCRIPTION`] bytes and free of NUL bytes.
    pub description: String,
    pub submitted_at: Timestamp,
    pub ready_at: Timestamp,
}

impl OrderRecord {
    /// Build a fresh order stamped with the current time.
    pub fn submit(id: OrderId, description: &str) -> Self {
        Self {
            id,
            description: bound_description(description).to_string(),
            submitted_at: now_millis(),
            ready_at: 0,
        }
    }

    /// The stop command sent to the kitchen.
    pub fn sentinel() -> Self {
        Self {
            id: 0,
            description: SENTINEL.to_string(),
            submitted_at: 0,
            ready_at: 0,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.description == SENTINEL
    }

    pub fn is_ready(&self) -> bool {
        self.ready_at != 0
    }

    /// Stamp completion; never earlier than submission even if the clock stepped back.
    pub fn mark_ready(&mut self) {
        self.ready_at = now_millis().max(self.submitted_at);
    }

    /// Preparation time in milliseconds, if the order has been completed.
    pub fn prep_millis(&self) -> Option<i64> {
        if self.is_ready() {
            Some(self.ready_at - self.submitted_at)
        } else {
            None
        }
    }
}

/// Clip text to the wire bound, stopping at any NUL and on a char boundary.
pub fn bound_description(text: &str) -> &str {
    let text = match text.find('\0') {
        Some(nul) => &text[..nul],
        None => text,
    };
    if text.len() <= MAX_DESCRIPTION {
        return text;
    }
    let mut end = MAX_DESCRIPTION;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_stamps_time_and_leaves_ready_unset() {
        let order = OrderRecord::submit(1, "pizza");
        assert_eq!(order.id, 1);
        assert_eq!(order.description, "pizza");
        assert!(order.submitted_at > 0);
        assert!(!order.is_ready());
        assert_eq!(order.prep_millis(), None);
    }

    #[test]
    fn ready_is_never_before_submission() {
        let mut order = OrderRecord::submit(3, "soup");
        // Pretend the order was submitted in the future relative to the clock.
        order.submitted_at = now_millis() + 60_000;
        order.mark_ready();
        assert!(order.ready_at >= order.submitted_at);
        assert_eq!(order.prep_millis(), Some(0));
    }

    #[test]
    fn sentinel_is_recognised_case_sensitively() {
        assert!(OrderRecord::sentinel().is_sentinel());
        assert!(!OrderRecord::submit(1, "SAIR").is_sentinel());
        assert!(!OrderRecord::submit(1, "sair ").is_sentinel());
    }

    #[test]
    fn long_descriptions_are_clipped_on_char_boundary() {
        let long = "é".repeat(80);
        let clipped = bound_description(&long);
        assert!(clipped.len() <= MAX_DESCRIPTION);
        assert_eq!(clipped.len() % 2, 0);
        assert_eq!(bound_description("abc\0def"), "abc");
    }
}
