//! Price statistics for day-ahead electricity prices
//!
//! Splits a rolling window of hourly price samples into the local calendar day
//! containing a reference instant ("today") and the day after it ("tomorrow"),
//! applies tax and a caller-supplied margin to every sample, and derives the
//! average, cheapest, most expensive and currently effective price of each day.
//!
//! All arithmetic is decimal. Adjusted prices and averages are rounded to
//! [`PRICE_DECIMALS`] fractional digits, midpoints away from zero.

pub mod engine;
pub mod margin;
pub mod types;
pub mod window;

pub use engine::{adjust, compute_statistics};
pub use margin::parse_margin;
pub use types::{AdjustedPrice, DayBucket, EpochSeconds, PriceReport, PriceSample};
pub use window::DayWindow;

/// Re-exported so callers name time zones with the same type the engine takes
pub use chrono_tz::Tz;

/// Fractional digits kept on adjusted prices and averages
pub const PRICE_DECIMALS: u32 = 3;

/// Tomorrow's prices are reported only once more than this many samples exist
pub const TOMORROW_COMPLETENESS_THRESHOLD: usize = 12;

/// Offset from today's reference instant to tomorrow's
pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;
