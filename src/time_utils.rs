// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Martian sol count and its display format.

use chrono::{DateTime, TimeZone, Utc};

/// Earth days to Martian sols.
pub const SOLS_PER_EARTH_DAY: f64 = 0.9747;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Reference date from which sols are counted (2000-01-01T00:00:00Z).
pub fn sol_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Convert an Earth timestamp to a sol count.
///
/// `floor(days_since_epoch × 0.9747)`, clamped to zero before the epoch.
pub fn earth_date_to_sol(date: DateTime<Utc>) -> u64 {
    let elapsed = date.signed_duration_since(sol_epoch());
    let days = elapsed.num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY;
    let sols = (days * SOLS_PER_EARTH_DAY).floor();
    if sols <= 0.0 {
        0
    } else {
        sols as u64
    }
}

/// Render a sol count for display, e.g. `Sol 9,481`.
pub fn format_sol_date(sol: u64) -> String {
    let digits = sol.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("Sol {grouped}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_epoch_is_sol_zero() {
        assert_eq!(earth_date_to_sol(sol_epoch()), 0);
        assert_eq!(earth_date_to_sol(sol_epoch() - Duration::days(30)), 0);
    }

    #[test]
    fn test_known_dates() {
        // 1000 days → 974.7 sols
        assert_eq!(earth_date_to_sol(sol_epoch() + Duration::days(1000)), 974);

        // 2025-01-01 is 9132 days after the epoch → 8900.9604
        let date = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(earth_date_to_sol(date), 8900);
    }

    #[test]
    fn test_monotonic() {
        let mut prev = 0;
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        for hours in 0..24 * 60 {
            let sol = earth_date_to_sol(start + Duration::hours(hours));
            assert!(sol >= prev, "sol went backwards at +{hours}h");
            prev = sol;
        }
    }

    #[test]
    fn test_format_sol_date() {
        assert_eq!(format_sol_date(0), "Sol 0");
        assert_eq!(format_sol_date(974), "Sol 974");
        assert_eq!(format_sol_date(8900), "Sol 8,900");
        assert_eq!(format_sol_date(1_234_567), "Sol 1,234,567");
    }
}
