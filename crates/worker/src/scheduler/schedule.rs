//! Cron-like schedule expressions

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// One field of a schedule: any value, or an explicit set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CronField {
    Any,
    Values(BTreeSet<u32>),
}

impl CronField {
    fn single(value: u32) -> Self {
        CronField::Values(BTreeSet::from([value]))
    }

    fn matches(&self, value: u32) -> bool {
        match self {
            CronField::Any => true,
            CronField::Values(values) => values.contains(&value),
        }
    }

    /// Parse `*`, `n`, `a-b`, `*/step`, `a-b/step` and comma lists of those.
    fn parse(field: &str, name: &str, min: u32, max: u32) -> Result<Self> {
        if field == "*" {
            return Ok(CronField::Any);
        }

        let mut values = BTreeSet::new();
        for part in field.split(',') {
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => {
                    let step: u32 = step
                        .parse()
                        .with_context(|| format!("invalid step '{}' in {} field", step, name))?;
                    if step == 0 {
                        bail!("step must be positive in {} field", name);
                    }
                    (range, step)
                }
                None => (part, 1),
            };

            let (start, end) = if range == "*" {
                (min, max)
            } else if let Some((a, b)) = range.split_once('-') {
                (parse_value(a, name)?, parse_value(b, name)?)
            } else {
                let value = parse_value(range, name)?;
                // `n/step` runs from n to the end of the range
                if part.contains('/') {
                    (value, max)
                } else {
                    (value, value)
                }
            };

            if start < min || end > max || start > end {
                bail!(
                    "{} field '{}' is outside {}-{}",
                    name,
                    part,
                    min,
                    max
                );
            }
            values.extend((start..=end).step_by(step as usize));
        }

        Ok(CronField::Values(values))
    }
}

fn parse_value(value: &str, name: &str) -> Result<u32> {
    value
        .parse()
        .with_context(|| format!("invalid value '{}' in {} field", value, name))
}

impl fmt::Display for CronField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CronField::Any => write!(f, "*"),
            CronField::Values(values) => {
                let parts: Vec<String> = values.iter().map(u32::to_string).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

/// Five-field cron-like schedule: minute, hour, day of month, month and day
/// of week (0-6, where 0 is Sunday). Times are matched in UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub minute: CronField,
    pub hour: CronField,
    pub day: CronField,
    pub month: CronField,
    pub day_of_week: CronField,
}

impl Schedule {
    /// Create a schedule that runs every minute
    pub fn every_minute() -> Self {
        Self {
            minute: CronField::Any,
            hour: CronField::Any,
            day: CronField::Any,
            month: CronField::Any,
            day_of_week: CronField::Any,
        }
    }

    /// Create a schedule that runs hourly at a specific minute
    pub fn hourly(minute: u32) -> Self {
        Self {
            minute: CronField::single(minute),
            ..Self::every_minute()
        }
    }

    /// Create a schedule that runs daily at a specific time
    pub fn daily(hour: u32, minute: u32) -> Self {
        Self {
            minute: CronField::single(minute),
            hour: CronField::single(hour),
            ..Self::every_minute()
        }
    }

    /// Check if the schedule matches the minute containing `time`
    pub fn matches(&self, time: &DateTime<Utc>) -> bool {
        self.minute.matches(time.minute())
            && self.hour.matches(time.hour())
            && self.day.matches(time.day())
            && self.month.matches(time.month())
            && self.day_of_week.matches(time.weekday().num_days_from_sunday())
    }

    /// Parse a cron expression: "minute hour day month day_of_week"
    pub fn parse(expr: &str) -> Result<Self> {
        let parts: Vec<&str> = expr.split_whitespace().collect();
        if parts.len() != 5 {
            bail!(
                "Invalid cron expression '{}', expected 5 fields, got {}",
                expr,
                parts.len()
            );
        }

        Ok(Self {
            minute: CronField::parse(parts[0], "minute", 0, 59)?,
            hour: CronField::parse(parts[1], "hour", 0, 23)?,
            day: CronField::parse(parts[2], "day", 1, 31)?,
            month: CronField::parse(parts[3], "month", 1, 12)?,
            day_of_week: CronField::parse(parts[4], "day_of_week", 0, 6)?,
        })
    }
}

impl FromStr for Schedule {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.minute, self.hour, self.day, self.month, self.day_of_week
        )
    }
}
