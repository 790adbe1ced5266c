//! Resampling intervals and calendar-aware bucket arithmetic.

use crate::error::{Result, TemporaError};
use crate::series::{datetime_to_micros, micros_to_datetime, Timestamp};
use chrono::{Datelike, Months, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const MICROS_PER_SECOND: i64 = 1_000_000;
pub const MICROS_PER_MINUTE: i64 = 60 * MICROS_PER_SECOND;
pub const MICROS_PER_HOUR: i64 = 60 * MICROS_PER_MINUTE;
pub const MICROS_PER_DAY: i64 = 24 * MICROS_PER_HOUR;

/// Spacing of a regular grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    /// Fixed step in microseconds.
    Fixed(i64),
    Monthly,
    Quarterly,
    Yearly,
}

impl Interval {
    pub fn seconds(secs: i64) -> Self {
        Interval::Fixed(secs.saturating_mul(MICROS_PER_SECOND))
    }

    pub fn days(days: i64) -> Self {
        Interval::Fixed(days.saturating_mul(MICROS_PER_DAY))
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Interval::Fixed(step) if *step <= 0 => Err(TemporaError::invalid_parameter(
                "interval",
                step,
                "fixed interval must be positive",
            )),
            _ => Ok(()),
        }
    }

    /// Start of the bucket containing `t`, used as the grid anchor.
    pub fn bucket_start(&self, t: Timestamp) -> Timestamp {
        match self {
            Interval::Fixed(_) => t,
            Interval::Monthly => datetime_to_micros(start_of_month(micros_to_datetime(t))),
            Interval::Quarterly => datetime_to_micros(start_of_quarter(micros_to_datetime(t))),
            Interval::Yearly => datetime_to_micros(start_of_year(micros_to_datetime(t))),
        }
    }

    /// Number of whole steps from `anchor` to `t`. Negative when `t < anchor`.
    pub fn steps_between(&self, anchor: Timestamp, t: Timestamp) -> Result<i64> {
        Ok(match self {
            Interval::Fixed(step) => t
                .checked_sub(anchor)
                .ok_or_else(|| overflow(anchor, t))?
                .div_euclid(*step),
            Interval::Monthly => month_index(t) - month_index(anchor),
            Interval::Quarterly => (month_index(t) / 3) - (month_index(anchor) / 3),
            Interval::Yearly => {
                micros_to_datetime(t).year() as i64 - micros_to_datetime(anchor).year() as i64
            }
        })
    }

    /// Timestamp `steps` grid points after `anchor`.
    pub fn advance(&self, anchor: Timestamp, steps: i64) -> Result<Timestamp> {
        let months = match self {
            Interval::Fixed(step) => {
                return steps
                    .checked_mul(*step)
                    .and_then(|offset| anchor.checked_add(offset))
                    .ok_or_else(|| overflow(anchor, steps));
            }
            Interval::Monthly => Some(steps),
            Interval::Quarterly => steps.checked_mul(3),
            Interval::Yearly => steps.checked_mul(12),
        };
        let months = months
            .and_then(|m| u32::try_from(m.unsigned_abs()).ok().map(|abs| (m, abs)))
            .ok_or_else(|| overflow(anchor, steps))?;

        let base = micros_to_datetime(anchor);
        let shifted = match months {
            (m, abs) if m >= 0 => base.checked_add_months(Months::new(abs)),
            (_, abs) => base.checked_sub_months(Months::new(abs)),
        };
        shifted
            .map(datetime_to_micros)
            .ok_or_else(|| overflow(anchor, steps))
    }
}

fn overflow(anchor: Timestamp, operand: i64) -> TemporaError {
    TemporaError::InvalidInput(format!(
        "timestamp arithmetic overflows at {} with operand {}",
        anchor, operand
    ))
}

impl FromStr for Interval {
    type Err = TemporaError;

    /// Accepts `monthly`, `quarterly`, `yearly`, or a number with a unit
    /// suffix (`us`, `ms`, `s`, `m`, `h`, `d`), e.g. `15m` or `1d`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "monthly" | "month" | "1mo" => return Ok(Interval::Monthly),
            "quarterly" | "quarter" | "1q" => return Ok(Interval::Quarterly),
            "yearly" | "year" | "annual" | "1y" => return Ok(Interval::Yearly),
            _ => {}
        }

        let split = lower
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(lower.len());
        let (num, unit) = lower.split_at(split);
        let n: i64 = num
            .parse()
            .map_err(|_| TemporaError::invalid_parameter("interval", s, "unrecognized interval"))?;
        let scale = match unit {
            "us" => 1,
            "ms" => 1_000,
            "s" | "" => MICROS_PER_SECOND,
            "m" | "min" => MICROS_PER_MINUTE,
            "h" => MICROS_PER_HOUR,
            "d" => MICROS_PER_DAY,
            _ => {
                return Err(TemporaError::invalid_parameter(
                    "interval",
                    s,
                    "unknown unit suffix",
                ))
            }
        };
        let step = n.checked_mul(scale).ok_or_else(|| {
            TemporaError::invalid_parameter("interval", s, "interval exceeds the timestamp range")
        })?;
        let interval = Interval::Fixed(step);
        interval.validate()?;
        Ok(interval)
    }
}

fn month_index(t: Timestamp) -> i64 {
    let dt = micros_to_datetime(t);
    dt.year() as i64 * 12 + (dt.month0() as i64)
}

/// Get the start of month for a given datetime (first day at midnight).
fn start_of_month(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_day(1)
        .and_then(|d| d.with_hour(0))
        .and_then(|d| d.with_minute(0))
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

/// Get the start of quarter for a given datetime.
fn start_of_quarter(dt: NaiveDateTime) -> NaiveDateTime {
    let month = start_of_month(dt);
    let quarter_month = (dt.month0() / 3) * 3 + 1;
    month.with_month(quarter_month).unwrap_or(month)
}

/// Get the start of year for a given datetime.
fn start_of_year(dt: NaiveDateTime) -> NaiveDateTime {
    let month = start_of_month(dt);
    month.with_month(1).unwrap_or(month)
}

#[cfg(test)]
mod tests {
    use super::*;

    const JAN_1_2023: i64 = 1_672_531_200 * MICROS_PER_SECOND;
    const MAR_1_2023: i64 = 1_677_628_800 * MICROS_PER_SECOND;
    const JUL_1_2023: i64 = 1_688_169_600 * MICROS_PER_SECOND;

    #[test]
    fn test_fixed_steps() {
        let i = Interval::Fixed(100);
        assert_eq!(i.steps_between(0, 250).unwrap(), 2);
        assert_eq!(i.advance(0, 3).unwrap(), 300);
        assert_eq!(i.bucket_start(42), 42);
    }

    #[test]
    fn test_monthly_steps() {
        let i = Interval::Monthly;
        assert_eq!(i.steps_between(JAN_1_2023, MAR_1_2023).unwrap(), 2);
        assert_eq!(i.advance(JAN_1_2023, 2).unwrap(), MAR_1_2023);
        // Mid-month timestamps fall into the month's bucket
        assert_eq!(i.bucket_start(JAN_1_2023 + 5 * MICROS_PER_DAY), JAN_1_2023);
    }

    #[test]
    fn test_quarterly_steps() {
        let i = Interval::Quarterly;
        assert_eq!(i.steps_between(JAN_1_2023, JUL_1_2023).unwrap(), 2);
        assert_eq!(i.bucket_start(MAR_1_2023), JAN_1_2023);
        let q2 = micros_to_datetime(i.advance(JAN_1_2023, 1).unwrap());
        assert_eq!(q2.month(), 4);
    }

    #[test]
    fn test_yearly_steps() {
        let i = Interval::Yearly;
        assert_eq!(i.bucket_start(JUL_1_2023), JAN_1_2023);
        assert_eq!(micros_to_datetime(i.advance(JAN_1_2023, 3).unwrap()).year(), 2026);
    }

    #[test]
    fn test_interval_from_str() {
        assert_eq!("15m".parse::<Interval>().unwrap(), Interval::Fixed(15 * MICROS_PER_MINUTE));
        assert_eq!("1d".parse::<Interval>().unwrap(), Interval::days(1));
        assert_eq!("Monthly".parse::<Interval>().unwrap(), Interval::Monthly);
        assert!("0s".parse::<Interval>().is_err());
        assert!("abc".parse::<Interval>().is_err());
    }

    #[test]
    fn test_oversized_interval_string_rejected() {
        assert!(matches!(
            "99999999999999999d".parse::<Interval>(),
            Err(TemporaError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_step_arithmetic_overflow_is_an_error() {
        let i = Interval::Fixed(1);
        assert!(matches!(
            i.steps_between(-5_000_000_000_000_000_000, 5_000_000_000_000_000_000),
            Err(TemporaError::InvalidInput(_))
        ));
        assert!(i.advance(i64::MAX - 1, 2).is_err());
        assert!(Interval::Fixed(MICROS_PER_DAY).advance(0, i64::MAX).is_err());
        assert!(Interval::Yearly.advance(JAN_1_2023, i64::MAX / 2).is_err());
        assert!(Interval::Monthly.advance(JAN_1_2023, 10_000_000).is_err());
    }
}
