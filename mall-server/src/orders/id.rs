//! Order id generation

use chrono::{DateTime, Utc};
use rand::Rng;

/// `YYYYMMDDhhmmss` + 9-digit zero-padded user id + 4 random digits.
///
/// The random suffix separates two orders of the same user within one second.
pub fn generate_order_id(now: DateTime<Utc>, user_id: i64) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
    format_order_id(now, user_id, suffix)
}

fn format_order_id(now: DateTime<Utc>, user_id: i64, suffix: u16) -> String {
    format!("{}{user_id:09}{suffix:04}", now.format("%Y%m%d%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_layout() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 8, 5, 1).unwrap();
        assert_eq!(format_order_id(now, 42, 7), "202403090805010000000420007");
    }

    #[test]
    fn test_generated_ids_are_fixed_width() {
        let now = Utc::now();
        let id = generate_order_id(now, 1);
        assert_eq!(id.len(), 14 + 9 + 4);
        assert!(id.bytes().all(|b| b.is_ascii_digit()));
    }
}
