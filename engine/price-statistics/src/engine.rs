//! Statistics over today's and tomorrow's prices

use chrono_tz::Tz;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::warn;

use crate::types::{AdjustedPrice, DayBucket, EpochSeconds, PriceReport, PriceSample};
use crate::window::DayWindow;
use crate::{PRICE_DECIMALS, SECONDS_PER_DAY, TOMORROW_COMPLETENESS_THRESHOLD};

/// Build the price report for the local day containing `reference` and the day after.
///
/// Samples are bucketed by predicate, so their order only matters for tie
/// breaking and for the order of each bucket's `prices` list. Samples outside
/// both days are ignored. Tomorrow is withheld until it holds more than
/// [`TOMORROW_COMPLETENESS_THRESHOLD`] samples.
pub fn compute_statistics(
    samples: &[PriceSample],
    reference: EpochSeconds,
    margin: Decimal,
    tz: Tz,
) -> PriceReport {
    let Some(window) = DayWindow::containing(reference, tz) else {
        warn!(reference, "reference instant outside the calendar range, reporting no prices");
        return PriceReport {
            now: reference,
            today: summarize(Vec::new(), reference),
            tomorrow: DayBucket::withheld(),
        };
    };

    let today = adjust_all(samples.iter().filter(|s| window.is_today(s.time)), margin);
    let tomorrow = adjust_all(samples.iter().filter(|s| window.is_tomorrow(s.time)), margin);

    let tomorrow = if tomorrow.len() > TOMORROW_COMPLETENESS_THRESHOLD {
        summarize(tomorrow, reference.saturating_add(SECONDS_PER_DAY))
    } else {
        DayBucket::withheld()
    };

    PriceReport { now: reference, today: summarize(today, reference), tomorrow }
}

/// Apply tax and margin: `base * (1 + tax) + margin`, rounded to three decimals.
///
/// Returns `None` if the arithmetic overflows.
pub fn adjust(sample: &PriceSample, margin: Decimal) -> Option<AdjustedPrice> {
    let taxed = sample.base_price.checked_mul(Decimal::ONE.checked_add(sample.tax_rate)?)?;
    let price = round_price(taxed.checked_add(margin)?);
    Some(AdjustedPrice { time: sample.time, price })
}

fn adjust_all<'a>(
    samples: impl Iterator<Item = &'a PriceSample>,
    margin: Decimal,
) -> Vec<AdjustedPrice> {
    samples
        .filter_map(|sample| {
            let adjusted = adjust(sample, margin);
            if adjusted.is_none() {
                warn!(time = sample.time, "price adjustment overflowed, sample dropped");
            }
            adjusted
        })
        .collect()
}

fn round_price(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(PRICE_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

fn summarize(prices: Vec<AdjustedPrice>, reference: EpochSeconds) -> DayBucket {
    DayBucket {
        average: average(&prices),
        cheapest: first_extreme(&prices, |candidate, best| candidate < best),
        most_expensive: first_extreme(&prices, |candidate, best| candidate > best),
        current: current(&prices, reference),
        samples: Some(prices),
    }
}

/// Mean price rounded to three decimals, `None` for an empty set
fn average(prices: &[AdjustedPrice]) -> Option<Decimal> {
    let count = Decimal::from(prices.len());
    if count.is_zero() {
        return None;
    }
    let total = prices.iter().try_fold(Decimal::ZERO, |acc, p| acc.checked_add(p.price));
    match total.and_then(|total| total.checked_div(count)) {
        Some(mean) => Some(round_price(mean)),
        None => {
            warn!(samples = prices.len(), "price average overflowed");
            None
        }
    }
}

/// Sample that wins `beats` against every other; the earliest one wins ties
fn first_extreme(
    prices: &[AdjustedPrice],
    beats: impl Fn(Decimal, Decimal) -> bool,
) -> Option<AdjustedPrice> {
    prices.iter().copied().reduce(|best, p| if beats(p.price, best.price) { p } else { best })
}

/// Latest sample strictly before `reference`; the earliest listed wins equal times
fn current(prices: &[AdjustedPrice], reference: EpochSeconds) -> Option<AdjustedPrice> {
    prices.iter().filter(|p| p.time < reference).copied().reduce(|best, p| {
        if p.time > best.time {
            p
        } else {
            best
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    const HOUR: i64 = 3600;
    const TZ: Tz = chrono_tz::Europe::Helsinki;

    fn start_of_today() -> EpochSeconds {
        // 2024-06-15 00:00 local
        Utc.with_ymd_and_hms(2024, 6, 14, 21, 0, 0).unwrap().timestamp()
    }

    fn sample(time: EpochSeconds, base: Decimal, tax: Decimal) -> PriceSample {
        PriceSample::new(time, base, tax)
    }

    fn hourly(start: EpochSeconds, count: i64, base: Decimal) -> Vec<PriceSample> {
        (0..count).map(|h| sample(start + h * HOUR, base + Decimal::from(h), dec!(0.24))).collect()
    }

    fn prices(bucket: &DayBucket) -> Vec<Decimal> {
        bucket.samples.as_ref().unwrap().iter().map(|p| p.price).collect()
    }

    #[test]
    fn test_two_sample_day() {
        let t0 = start_of_today();
        let samples = vec![sample(t0, dec!(10), dec!(0.24)), sample(t0 + HOUR, dec!(12), dec!(0.24))];

        let report = compute_statistics(&samples, t0 + 2 * HOUR, dec!(0), TZ);

        assert_eq!(report.now, t0 + 2 * HOUR);
        assert_eq!(report.today.average, Some(dec!(13.64)));
        assert_eq!(report.today.cheapest.unwrap().price, dec!(12.4));
        assert_eq!(report.today.most_expensive.unwrap().price, dec!(14.88));
        assert_eq!(report.today.current, Some(AdjustedPrice { time: t0 + HOUR, price: dec!(14.88) }));
        assert_eq!(prices(&report.today), vec![dec!(12.4), dec!(14.88)]);
    }

    #[test]
    fn test_tomorrow_withheld_at_twelve_samples() {
        let t0 = start_of_today();
        let mut samples = hourly(t0, 2, dec!(10));
        samples.extend(hourly(t0 + 24 * HOUR, 12, dec!(5)));

        let report = compute_statistics(&samples, t0 + 2 * HOUR, dec!(0), TZ);

        assert_eq!(report.tomorrow, DayBucket::withheld());
        assert!(report.tomorrow.is_withheld());
        assert!(report.tomorrow.average.is_none());
        assert!(report.tomorrow.cheapest.is_none());
        assert!(report.tomorrow.most_expensive.is_none());
        assert!(report.tomorrow.current.is_none());
    }

    #[test]
    fn test_tomorrow_reported_at_thirteen_samples() {
        let t0 = start_of_today();
        let tomorrow = t0 + 24 * HOUR;
        let mut samples = hourly(t0, 2, dec!(10));
        samples.extend(hourly(tomorrow, 13, dec!(5)));

        let report = compute_statistics(&samples, t0 + 2 * HOUR, dec!(0), TZ);

        assert_eq!(report.tomorrow.len(), 13);
        assert_eq!(report.tomorrow.cheapest.unwrap().price, dec!(6.2));
        assert_eq!(report.tomorrow.most_expensive.unwrap().price, dec!(21.08));
        // (5..=17) * 1.24, mean 11 * 1.24
        assert_eq!(report.tomorrow.average, Some(dec!(13.64)));
        // same time of day as the reference, one day later, strictly before
        assert_eq!(report.tomorrow.current.unwrap().time, tomorrow + HOUR);
    }

    #[test]
    fn test_guard_ignores_values() {
        let t0 = start_of_today();
        let samples: Vec<_> =
            (0..13).map(|h| sample(t0 + 24 * HOUR + h * HOUR, dec!(0), dec!(0))).collect();

        let report = compute_statistics(&samples, t0, dec!(0), TZ);

        assert_eq!(report.tomorrow.average, Some(dec!(0)));
        assert!(!report.tomorrow.is_withheld());
    }

    #[test]
    fn test_empty_input() {
        let report = compute_statistics(&[], start_of_today(), dec!(1), TZ);

        assert_eq!(report.now, start_of_today());
        assert!(report.today.average.is_none());
        assert!(report.today.cheapest.is_none());
        assert!(report.today.most_expensive.is_none());
        assert!(report.today.current.is_none());
        assert_eq!(report.today.samples, Some(Vec::new()));
        assert!(report.tomorrow.is_withheld());
    }

    #[test]
    fn test_samples_outside_both_days_are_dropped() {
        let t0 = start_of_today();
        let samples = vec![
            sample(t0 - 1, dec!(100), dec!(0)),
            sample(t0, dec!(1), dec!(0)),
            sample(t0 + 48 * HOUR, dec!(100), dec!(0)),
        ];

        let report = compute_statistics(&samples, t0 + HOUR, dec!(0), TZ);

        assert_eq!(prices(&report.today), vec![dec!(1)]);
        assert!(report.tomorrow.is_withheld());
    }

    #[test]
    fn test_input_order_does_not_change_membership() {
        let t0 = start_of_today();
        let ascending = hourly(t0, 24, dec!(3));
        let mut descending = ascending.clone();
        descending.reverse();

        let a = compute_statistics(&ascending, t0 + 5 * HOUR + 30, dec!(0), TZ);
        let d = compute_statistics(&descending, t0 + 5 * HOUR + 30, dec!(0), TZ);

        assert_eq!(a.today.average, d.today.average);
        assert_eq!(a.today.cheapest, d.today.cheapest);
        assert_eq!(a.today.most_expensive, d.today.most_expensive);
        assert_eq!(a.today.current, d.today.current);
        assert_eq!(a.today.current.unwrap().time, t0 + 5 * HOUR);

        let mut reversed = prices(&d.today);
        reversed.reverse();
        assert_eq!(prices(&a.today), reversed);
    }

    #[test]
    fn test_ties_keep_first_in_input_order() {
        let t0 = start_of_today();
        let samples = vec![
            sample(t0 + 3 * HOUR, dec!(5), dec!(0)),
            sample(t0 + HOUR, dec!(5), dec!(0)),
            sample(t0 + 2 * HOUR, dec!(9), dec!(0)),
            sample(t0, dec!(9), dec!(0)),
        ];

        let report = compute_statistics(&samples, t0 + 4 * HOUR, dec!(0), TZ);

        assert_eq!(report.today.cheapest.unwrap().time, t0 + 3 * HOUR);
        assert_eq!(report.today.most_expensive.unwrap().time, t0 + 2 * HOUR);
    }

    #[test]
    fn test_current_is_strictly_before_reference() {
        let t0 = start_of_today();
        let samples = hourly(t0, 4, dec!(1));

        let on_boundary = compute_statistics(&samples, t0 + 2 * HOUR, dec!(0), TZ);
        assert_eq!(on_boundary.today.current.unwrap().time, t0 + HOUR);

        let at_start = compute_statistics(&samples, t0, dec!(0), TZ);
        assert!(at_start.today.current.is_none());
    }

    #[test]
    fn test_margin_is_linear() {
        let t0 = start_of_today();
        let mut samples = hourly(t0, 24, dec!(7.3));
        samples.extend(hourly(t0 + 24 * HOUR, 24, dec!(2.1)));
        let margin = dec!(0.45);

        let base = compute_statistics(&samples, t0 + 12 * HOUR, dec!(0), TZ);
        let with_margin = compute_statistics(&samples, t0 + 12 * HOUR, margin, TZ);

        for (plain, shifted) in [(&base.today, &with_margin.today), (&base.tomorrow, &with_margin.tomorrow)] {
            let expected: Vec<_> = prices(plain).into_iter().map(|p| p + margin).collect();
            assert_eq!(prices(shifted), expected);
        }
    }

    #[test]
    fn test_idempotent() {
        let t0 = start_of_today();
        let mut samples = hourly(t0, 24, dec!(4.567));
        samples.extend(hourly(t0 + 24 * HOUR, 20, dec!(1.234)));

        let first = compute_statistics(&samples, t0 + 7 * HOUR, dec!(0.2), TZ);
        let second = compute_statistics(&samples, t0 + 7 * HOUR, dec!(0.2), TZ);

        assert_eq!(first, second);
    }

    #[test]
    fn test_average_between_extremes() {
        let t0 = start_of_today();
        let samples: Vec<_> = [dec!(3.333), dec!(0.001), dec!(7.777), dec!(2.5), dec!(-1.25)]
            .into_iter()
            .enumerate()
            .map(|(i, base)| sample(t0 + i as i64 * HOUR, base, dec!(0.1)))
            .collect();

        let report = compute_statistics(&samples, t0 + 6 * HOUR, dec!(0), TZ);
        let average = report.today.average.unwrap();

        assert!(report.today.cheapest.unwrap().price <= average);
        assert!(average <= report.today.most_expensive.unwrap().price);
    }

    #[test]
    fn test_rounding_is_half_away_from_zero() {
        let up = adjust(&sample(0, dec!(1.0005), dec!(0)), dec!(0)).unwrap();
        let down = adjust(&sample(0, dec!(-1.0005), dec!(0)), dec!(0)).unwrap();

        assert_eq!(up.price, dec!(1.001));
        assert_eq!(down.price, dec!(-1.001));
    }

    #[test]
    fn test_overflowing_sample_is_dropped() {
        let t0 = start_of_today();
        let samples = vec![sample(t0, Decimal::MAX, dec!(1)), sample(t0 + HOUR, dec!(2), dec!(0))];

        let report = compute_statistics(&samples, t0 + 2 * HOUR, dec!(0), TZ);

        assert_eq!(prices(&report.today), vec![dec!(2)]);
    }

    #[test]
    fn test_report_serialization_shape() {
        let t0 = start_of_today();
        let samples = vec![sample(t0, dec!(10), dec!(0.24))];

        let report = compute_statistics(&samples, t0 + HOUR, dec!(0), TZ);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["now"], t0 + HOUR);
        assert_eq!(json["today"]["avg"], 12.4);
        assert_eq!(json["today"]["cheapest"]["price"], 12.4);
        assert_eq!(json["today"]["mostExpensive"]["time"], t0);
        assert_eq!(json["today"]["now"]["price"], 12.4);
        assert_eq!(json["today"]["prices"].as_array().unwrap().len(), 1);
        assert!(json["tomorrow"]["avg"].is_null());
        assert!(json["tomorrow"]["prices"].is_null());
    }
}
