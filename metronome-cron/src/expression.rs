//! Cron expression parsing and evaluation.

use crate::error::{CronError, CronResult};
use chrono::{DateTime, Duration, Timelike, Utc};
use cron::Schedule;
use std::str::FromStr;

/// Parsed cron expression.
#[derive(Debug, Clone)]
pub struct CronExpression {
    schedule: Schedule,
    expression: String,
}

impl CronExpression {
    /// Parse a cron expression.
    ///
    /// Accepts the classic 5-field format (minute precision) as well as the
    /// 6/7-field format with a leading seconds field:
    /// - Second (0-59, 6/7-field only)
    /// - Minute (0-59)
    /// - Hour (0-23)
    /// - Day of month (1-31)
    /// - Month (1-12)
    /// - Day of week (SUN-SAT)
    /// - Year (7-field only)
    ///
    /// Numeric days of week follow the format: 5-field expressions use the
    /// crontab numbering (0-7, 0 and 7 are Sunday), 6/7-field expressions use
    /// the `cron` crate numbering (1-7, 1 is Sunday).
    ///
    /// # Examples
    ///
    /// ```
    /// use metronome_cron::CronExpression;
    ///
    /// // Every minute
    /// let expr = CronExpression::parse("* * * * *").unwrap();
    ///
    /// // Every day at midnight
    /// let expr = CronExpression::parse("0 0 * * *").unwrap();
    ///
    /// // Thirty seconds past every minute
    /// let expr = CronExpression::parse("30 * * * * *").unwrap();
    /// ```
    pub fn parse(expression: &str) -> CronResult<Self> {
        let trimmed = expression.trim();
        let normalized = match trimmed.split_whitespace().count() {
            1 if trimmed.starts_with('@') => trimmed.to_string(),
            5 => {
                let mut fields: Vec<&str> = trimmed.split_whitespace().collect();
                let day_of_week = crontab_day_of_week(fields[4]).map_err(|e| {
                    CronError::InvalidExpression(format!("{}: {}", expression, e))
                })?;
                fields[4] = day_of_week.as_str();
                format!("0 {}", fields.join(" "))
            }
            6 | 7 => trimmed.to_string(),
            fields => {
                return Err(CronError::InvalidExpression(format!(
                    "{}: expected 5, 6 or 7 fields, found {}",
                    expression, fields
                )));
            }
        };

        let schedule = Schedule::from_str(&normalized)
            .map_err(|e| CronError::InvalidExpression(format!("{}: {}", expression, e)))?;

        Ok(Self {
            schedule,
            expression: trimmed.to_string(),
        })
    }

    /// Get the next execution time after the given time.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// Get the expression string as it was given.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Earliest execution time inside the calendar minute containing `time`.
    pub fn first_in_minute(&self, time: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let minute = time.with_nanosecond(0)?.with_second(0)?;
        let first = self.next_after(minute - Duration::seconds(1))?;
        (first < minute + Duration::minutes(1)).then_some(first)
    }

    /// Check whether the expression is due during the minute containing `time`.
    pub fn is_due(&self, time: DateTime<Utc>) -> bool {
        self.first_in_minute(time).is_some()
    }
}

const DAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Rewrite a crontab day-of-week field (0-7, 0 and 7 are Sunday) into day
/// names. Named entries and `*`/`?` pass through unchanged.
fn crontab_day_of_week(field: &str) -> Result<String, String> {
    let mut parts = Vec::new();

    for part in field.split(',') {
        if part == "*" || part == "?" || part.chars().any(|c| c.is_ascii_alphabetic()) {
            parts.push(part.to_string());
            continue;
        }

        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step = step
                    .parse::<usize>()
                    .ok()
                    .filter(|step| *step > 0)
                    .ok_or_else(|| format!("invalid day of week step '{}'", part))?;
                (range, Some(step))
            }
            None => (part, None),
        };

        let day = |raw: &str| {
            raw.parse::<usize>()
                .ok()
                .filter(|day| *day <= 7)
                .ok_or_else(|| format!("invalid day of week '{}'", raw))
        };
        let (first, last) = match range.split_once('-') {
            _ if range == "*" => (0, 6),
            Some((first, last)) => (day(first)?, day(last)?),
            None if step.is_some() => (day(range)?, 6),
            None => {
                let single = day(range)?;
                (single, single)
            }
        };
        if first > last {
            return Err(format!("invalid day of week range '{}'", part));
        }

        let mut days: Vec<usize> = (first..=last)
            .step_by(step.unwrap_or(1))
            .map(|day| day % 7)
            .collect();
        days.sort_unstable();
        days.dedup();
        parts.push(
            days.into_iter()
                .map(|day| DAY_NAMES[day])
                .collect::<Vec<_>>()
                .join(","),
        );
    }

    Ok(parts.join(","))
}

impl FromStr for CronExpression {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Common cron expression presets.
pub struct CronPresets;

impl CronPresets {
    /// Every second
    pub const EVERY_SECOND: &'static str = "* * * * * *";

    /// Every minute
    pub const EVERY_MINUTE: &'static str = "* * * * *";

    /// Every 5 minutes
    pub const EVERY_5_MINUTES: &'static str = "*/5 * * * *";

    /// Every 15 minutes
    pub const EVERY_15_MINUTES: &'static str = "*/15 * * * *";

    /// Every hour
    pub const EVERY_HOUR: &'static str = "0 * * * *";

    /// Every day at midnight
    pub const DAILY: &'static str = "0 0 * * *";

    /// Every week on Sunday at midnight
    pub const WEEKLY: &'static str = "0 0 * * SUN";

    /// Every month on the 1st at midnight
    pub const MONTHLY: &'static str = "0 0 1 * *";

    /// Every year on January 1st at midnight
    pub const YEARLY: &'static str = "0 0 1 1 *";
}
