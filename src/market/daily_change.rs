//! # Daily Change
//!
//! Percentage change of the current price against the previous trading
//! day's reference price.
//!
//! ```text
//! ref    = (open + close) / 2 / 10^digits      (penultimate daily candle)
//! change = round((current - ref) / ref * 100, 2)
//! ```
//!
//! A ticker always prints a number, so every anomaly yields `0.0`:
//!
//! - fewer than two candles
//! - the most recent candle is not from today
//! - `ref <= 0`
//!
//! "Today" is the calendar date in the exchange's timezone, which is also the
//! zone the candle timestamps are aligned to. It is never the machine's
//! local zone.

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;

use super::types::Candle;

/// Compute the daily change in percent, rounded to 2 decimals.
///
/// `candles` are oldest first, in absolute price points.
pub fn daily_change(
    candles: &[Candle],
    digits: u32,
    current_price: f64,
    now: DateTime<Utc>,
    exchange_tz: Tz,
) -> f64 {
    let [.., previous, latest] = candles else {
        return 0.0;
    };

    if !is_same_exchange_day(latest.ctm, now, exchange_tz) {
        return 0.0;
    }

    let reference = reference_price(previous, digits);
    if !(reference > 0.0) {
        return 0.0;
    }

    round2((current_price - reference) / reference * 100.0)
}

/// Midpoint of a candle's open and close, in price units.
pub fn reference_price(candle: &Candle, digits: u32) -> f64 {
    (candle.open + candle.close) / 2.0 / 10f64.powi(digits as i32)
}

fn is_same_exchange_day(ctm: i64, now: DateTime<Utc>, exchange_tz: Tz) -> bool {
    let Some(candle_time) = Utc.timestamp_millis_opt(ctm).single() else {
        return false;
    };
    candle_time.with_timezone(&exchange_tz).date_naive() == now.with_timezone(&exchange_tz).date_naive()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Warsaw;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn candle(time: &str, open: f64, close: f64) -> Candle {
        Candle {
            ctm: at(time).timestamp_millis(),
            open,
            close,
        }
    }

    #[test]
    fn test_basic_change() {
        let now = at("2024-03-05T14:00:00Z");
        let candles = [
            candle("2024-03-03T23:00:00Z", 9900.0, 10100.0), // ref 100.00
            candle("2024-03-04T23:00:00Z", 10100.0, 10200.0),
        ];
        assert_eq!(daily_change(&candles, 2, 101.23, now, Warsaw), 1.23);
        assert_eq!(daily_change(&candles, 2, 99.5, now, Warsaw), -0.5);
    }

    #[test]
    fn test_fewer_than_two_candles() {
        let now = at("2024-03-05T14:00:00Z");
        assert_eq!(daily_change(&[], 2, 100.0, now, Warsaw), 0.0);
        let one = [candle("2024-03-04T23:00:00Z", 10000.0, 10000.0)];
        assert_eq!(daily_change(&one, 2, 120.0, now, Warsaw), 0.0);
    }

    #[test]
    fn test_latest_candle_not_today() {
        let now = at("2024-03-05T14:00:00Z");
        let candles = [
            candle("2024-03-02T23:00:00Z", 10000.0, 10000.0),
            candle("2024-03-03T23:00:00Z", 10000.0, 10000.0), // Monday 4th in Warsaw
        ];
        assert_eq!(daily_change(&candles, 2, 150.0, now, Warsaw), 0.0);
    }

    #[test]
    fn test_today_uses_exchange_zone() {
        // 23:00 UTC on the 4th is already the 5th in Warsaw.
        let now = at("2024-03-05T08:00:00Z");
        let candles = [
            candle("2024-03-03T23:00:00Z", 20000.0, 20000.0),
            candle("2024-03-04T23:00:00Z", 20000.0, 20000.0),
        ];
        assert_eq!(daily_change(&candles, 2, 202.0, now, Warsaw), 1.0);
        assert_eq!(daily_change(&candles, 2, 202.0, now, chrono_tz::UTC), 0.0);
    }

    #[test]
    fn test_non_positive_reference() {
        let now = at("2024-03-05T14:00:00Z");
        let zero = [
            candle("2024-03-03T23:00:00Z", 0.0, 0.0),
            candle("2024-03-04T23:00:00Z", 10000.0, 10000.0),
        ];
        assert_eq!(daily_change(&zero, 2, 100.0, now, Warsaw), 0.0);
        let negative = [
            candle("2024-03-03T23:00:00Z", -10.0, -20.0),
            candle("2024-03-04T23:00:00Z", 10000.0, 10000.0),
        ];
        assert_eq!(daily_change(&negative, 2, 100.0, now, Warsaw), 0.0);
    }

    #[test]
    fn test_uses_only_last_two_candles() {
        let now = at("2024-03-05T14:00:00Z");
        let candles = [
            candle("2024-02-29T23:00:00Z", 1.0, 1.0),
            candle("2024-03-01T23:00:00Z", 1.0, 1.0),
            candle("2024-03-03T23:00:00Z", 4000.0, 6000.0), // ref 5.000
            candle("2024-03-04T23:00:00Z", 5000.0, 5000.0),
        ];
        assert_eq!(daily_change(&candles, 3, 5.5, now, Warsaw), 10.0);
    }

    #[test]
    fn test_deterministic() {
        let now = at("2024-03-05T14:00:00Z");
        let candles = [
            candle("2024-03-03T23:00:00Z", 123456.0, 123999.0),
            candle("2024-03-04T23:00:00Z", 124000.0, 124100.0),
        ];
        let first = daily_change(&candles, 4, 12.5, now, Warsaw);
        for _ in 0..10 {
            assert_eq!(daily_change(&candles, 4, 12.5, now, Warsaw), first);
        }
    }

    #[test]
    fn test_reference_price() {
        let c = Candle {
            ctm: 0,
            open: 11000.0,
            close: 13000.0,
        };
        assert_eq!(reference_price(&c, 2), 120.0);
        assert_eq!(reference_price(&c, 0), 12000.0);
    }
}
