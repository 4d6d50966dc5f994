//! Daily schedule times: `HH:MM` parsing, cron-expression derivation, and
//! next-run computation in a job's own timezone.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::CoreError;

/// A wall-clock time-of-day at which a job fires once per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTime {
    pub hour: u8,
    pub minute: u8,
}

impl ScheduleTime {
    /// Derive the 6-field cron expression (`sec min hour * * *`) used by the
    /// scheduler for this time-of-day.
    #[must_use]
    pub fn cron_expression(self) -> String {
        format!("0 {} {} * * *", self.minute, self.hour)
    }

    /// Render back to the canonical `HH:MM` form.
    #[must_use]
    pub fn to_hhmm(self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }

    /// Compute the next fire instant strictly after `now`.
    ///
    /// The time-of-day is interpreted in `tz`: if today's occurrence in that
    /// timezone has already passed (or falls exactly on `now`), the next run
    /// is tomorrow. Local times made ambiguous or nonexistent by a DST
    /// transition resolve to the earliest valid instant, advancing a day when
    /// the wall-clock time does not exist at all.
    #[must_use]
    pub fn next_run_from(self, now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
        let time = NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .unwrap_or_default();
        let mut date = now.with_timezone(&tz).date_naive();

        // At most two extra iterations: today has passed, or the local time
        // falls into a spring-forward gap.
        for _ in 0..3 {
            if let Some(candidate) = tz
                .from_local_datetime(&date.and_time(time))
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
            {
                if candidate > now {
                    return candidate;
                }
            }
            date += Duration::days(1);
        }

        // Unreachable for any real timezone; fall back to a plain UTC add.
        now + Duration::days(1)
    }
}

impl FromStr for ScheduleTime {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidScheduleTime(s.to_string());

        let (hh, mm) = s.trim().split_once(':').ok_or_else(invalid)?;
        if hh.len() != 2 || mm.len() != 2 {
            return Err(invalid());
        }
        let hour: u8 = hh.parse().map_err(|_| invalid())?;
        let minute: u8 = mm.parse().map_err(|_| invalid())?;
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }
        Ok(Self { hour, minute })
    }
}

impl std::fmt::Display for ScheduleTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hhmm())
    }
}

/// Parse an IANA timezone name.
///
/// # Errors
///
/// Returns [`CoreError::UnknownTimezone`] if the name is not in the tz database.
pub fn parse_timezone(name: &str) -> Result<Tz, CoreError> {
    name.parse::<Tz>()
        .map_err(|_| CoreError::UnknownTimezone(name.to_string()))
}
