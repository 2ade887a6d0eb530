//! Local calendar day boundaries

use chrono::{DateTime, Duration, LocalResult, NaiveDate, TimeZone};
use chrono_tz::Tz;

use crate::types::EpochSeconds;

/// Half-open ranges covering the local day containing a reference instant and the day after it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start_of_today: EpochSeconds,
    pub end_of_today: EpochSeconds,
    pub start_of_tomorrow: EpochSeconds,
    pub end_of_tomorrow: EpochSeconds,
}

impl DayWindow {
    /// Compute the window for `reference` in `tz`.
    ///
    /// Returns `None` only when the instant or the dates around it fall outside
    /// the representable calendar range.
    pub fn containing(reference: EpochSeconds, tz: Tz) -> Option<Self> {
        let today = DateTime::from_timestamp(reference, 0)?.with_timezone(&tz).date_naive();
        let tomorrow = today.succ_opt()?;
        let day_after = tomorrow.succ_opt()?;

        let start_of_today = local_midnight(today, tz)?;
        let start_of_tomorrow = local_midnight(tomorrow, tz)?;
        let end_of_tomorrow = local_midnight(day_after, tz)?;

        Some(Self {
            start_of_today,
            end_of_today: start_of_tomorrow,
            start_of_tomorrow,
            end_of_tomorrow,
        })
    }

    pub fn is_today(&self, time: EpochSeconds) -> bool {
        self.start_of_today <= time && time < self.end_of_today
    }

    pub fn is_tomorrow(&self, time: EpochSeconds) -> bool {
        self.start_of_tomorrow <= time && time < self.end_of_tomorrow
    }
}

/// First instant of `date` in `tz`.
///
/// An ambiguous midnight resolves to the earlier instant. A midnight skipped
/// by a DST transition resolves to the first valid local time after it.
pub fn local_midnight(date: NaiveDate, tz: Tz) -> Option<EpochSeconds> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => Some(dt.timestamp()),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.timestamp()),
        LocalResult::None => (1..=96)
            .map(|quarter| midnight + Duration::minutes(15 * quarter))
            .find_map(|local| tz.from_local_datetime(&local).earliest())
            .map(|dt| dt.timestamp()),
    }
}
