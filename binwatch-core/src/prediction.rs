//! Overflow prediction: linear extrapolation of each bin's fill rate since its
//! last collection, bucketed into priority tiers.

use std::fmt;
use std::time::Duration as StdDuration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::model::Bin;

/// Longest list of predictions handed to the dashboard.
pub const MAX_PREDICTIONS: usize = 8;
/// Bins below 60 % are only listed when they overflow within this many hours.
pub const WATCH_WINDOW_HOURS: f64 = 72.0;
/// Number of predictions plotted on the overflow timeline.
pub const TIMELINE_POINTS: usize = 5;

const TIMELINE_LABEL_CHARS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq)]
/// Tunable heuristics used when a bin carries too little history.
pub struct PredictionConfig {
    /// Hours assumed since the last collection when a bin was never collected.
    pub default_lookback_hours: u32,
    /// Fill rate in percent per hour used when no time has elapsed.
    pub default_fill_rate: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            default_lookback_hours: 7 * 24,
            default_fill_rate: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Collection urgency, ordered from most to least urgent.
pub enum Priority {
    /// Overflowing within 12 hours or at least 90 % full.
    Critical,
    /// Overflowing within 24 hours or at least 75 % full.
    High,
    /// Overflowing within 48 hours or at least 60 % full.
    Medium,
    /// Everything else.
    Low,
}

impl Priority {
    /// Sort rank: 0 for critical up to 3 for low.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }

    /// Tier for a bin, first matching rule wins.
    #[must_use]
    pub fn classify(fill_level: u8, hours_to_full: f64) -> Self {
        if fill_level >= 90 || hours_to_full < 12.0 {
            Priority::Critical
        } else if fill_level >= 75 || hours_to_full < 24.0 {
            Priority::High
        } else if fill_level >= 60 || hours_to_full < 48.0 {
            Priority::Medium
        } else {
            Priority::Low
        }
    }

    /// Lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A bin enriched with its projected overflow.
pub struct OverflowPrediction {
    /// The bin the prediction is about.
    pub bin: Bin,
    /// Whole hours since the last collection (or the configured lookback).
    pub hours_since_collection: i64,
    /// Percent per hour.
    pub fill_rate: f64,
    /// Hours until 100 %; infinite when the bin is not filling.
    pub hours_to_full: f64,
    /// Projected overflow moment, absent when the bin is not filling.
    pub estimated_overflow: Option<DateTime<Utc>>,
    /// Urgency tier.
    pub priority: Priority,
}

/// Project a single bin.
#[must_use]
pub fn predict_bin(bin: &Bin, now: DateTime<Utc>, config: &PredictionConfig) -> OverflowPrediction {
    let hours_since_collection = bin.last_collection.map_or_else(
        || i64::from(config.default_lookback_hours),
        |collected| (now - collected).num_hours(),
    );

    let fill_level = f64::from(bin.fill_level);

    #[expect(
        clippy::cast_precision_loss,
        reason = "hour counts stay far below 2^52"
    )]
    let fill_rate = if hours_since_collection > 0 {
        fill_level / hours_since_collection as f64
    } else {
        config.default_fill_rate
    };

    let hours_to_full = if fill_rate > 0.0 {
        (100.0 - fill_level) / fill_rate
    } else {
        f64::INFINITY
    };

    let estimated_overflow = if fill_rate > 0.0 {
        StdDuration::try_from_secs_f64(hours_to_full * 3600.0)
            .ok()
            .and_then(|ahead| TimeDelta::from_std(ahead).ok())
            .and_then(|ahead| now.checked_add_signed(ahead))
    } else {
        None
    };

    OverflowPrediction {
        bin: bin.clone(),
        hours_since_collection,
        fill_rate,
        hours_to_full,
        estimated_overflow,
        priority: Priority::classify(bin.fill_level, hours_to_full),
    }
}

/// Bins that need attention soon, most urgent first, at most [`MAX_PREDICTIONS`].
///
/// A bin is listed when it is filling and either overflows within
/// [`WATCH_WINDOW_HOURS`] or is already at 60 % or more.
#[must_use]
pub fn predict_overflows(
    bins: &[Bin],
    now: DateTime<Utc>,
    config: &PredictionConfig,
) -> Vec<OverflowPrediction> {
    let mut predictions: Vec<OverflowPrediction> = bins
        .iter()
        .map(|bin| predict_bin(bin, now, config))
        .filter(|prediction| {
            prediction.hours_to_full.is_finite()
                && (prediction.hours_to_full < WATCH_WINDOW_HOURS || prediction.bin.fill_level >= 60)
        })
        .collect();

    predictions.sort_by(|left, right| {
        left.priority
            .cmp(&right.priority)
            .then_with(|| left.hours_to_full.total_cmp(&right.hours_to_full))
    });
    predictions.truncate(MAX_PREDICTIONS);
    predictions
}

#[derive(Debug, Clone, PartialEq)]
/// One point of the overflow timeline chart.
pub struct TimelinePoint {
    /// Location, shortened for the axis.
    pub label: String,
    /// Current fill level.
    pub current: u8,
    /// Level the projection reaches, always 100.
    pub predicted: u8,
    /// Rounded hours until full.
    pub hours: f64,
}

/// Timeline of the most urgent predictions.
#[must_use]
pub fn overflow_timeline(predictions: &[OverflowPrediction]) -> Vec<TimelinePoint> {
    predictions
        .iter()
        .take(TIMELINE_POINTS)
        .map(|prediction| TimelinePoint {
            label: short_label(&prediction.bin.location),
            current: prediction.bin.fill_level,
            predicted: 100,
            hours: prediction.hours_to_full.round(),
        })
        .collect()
}

fn short_label(location: &str) -> String {
    let mut label: String = location.chars().take(TIMELINE_LABEL_CHARS).collect();
    if location.chars().count() > TIMELINE_LABEL_CHARS {
        label.push_str("...");
    }
    label
}

/// Human-readable time until full: `45m`, `7h`, or `2d 5h`.
#[must_use]
pub fn format_time_remaining(hours: f64) -> String {
    if hours < 1.0 {
        return format!("{:.0}m", (hours * 60.0).round());
    }
    if hours < 24.0 {
        return format!("{:.0}h", hours.round());
    }

    let mut days = (hours / 24.0).floor();
    let mut rest = (hours - days * 24.0).round();
    if rest >= 24.0 {
        days += 1.0;
        rest = 0.0;
    }
    format!("{days:.0}d {rest:.0}h")
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::model::{BinId, BinStatus, Coordinate};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn bin(id: &str, fill_level: u8, collected_hours_ago: Option<i64>) -> Bin {
        Bin {
            id: BinId(id.to_owned()),
            location: format!("Street {id}"),
            coordinate: Coordinate {
                latitude: 13.08,
                longitude: 80.27,
            },
            fill_level,
            status: BinStatus::Operational,
            capacity: 100,
            last_updated: now(),
            last_collection: collected_hours_ago.map(|hours| now() - Duration::hours(hours)),
            created_at: now() - Duration::days(30),
        }
    }

    fn close(left: f64, right: f64, tolerance: f64) -> bool {
        (left - right).abs() < tolerance
    }

    #[test]
    fn nearly_full_bin_is_critical_and_first() {
        let config = PredictionConfig::default();
        let bins = vec![bin("medium", 65, Some(100)), bin("urgent", 95, Some(10))];

        let predictions = predict_overflows(&bins, now(), &config);
        let first = predictions.first().expect("at least one prediction");

        assert_eq!(first.bin.id, BinId("urgent".to_owned()));
        assert!(close(first.fill_rate, 9.5, 1e-9));
        assert!(close(first.hours_to_full, 5.0 / 9.5, 1e-9));
        assert_eq!(first.priority, Priority::Critical);
        assert!(
            predictions
                .iter()
                .skip(1)
                .all(|prediction| prediction.priority != Priority::Critical)
        );
    }

    #[test]
    fn never_collected_bin_uses_default_lookback_and_is_filtered() {
        let config = PredictionConfig::default();
        let never = bin("never", 30, None);

        let prediction = predict_bin(&never, now(), &config);
        assert_eq!(prediction.hours_since_collection, 168);
        assert!(close(prediction.fill_rate, 30.0 / 168.0, 1e-9));
        assert!(close(prediction.hours_to_full, 392.0, 1e-6));

        assert!(predict_overflows(&[never], now(), &config).is_empty());
    }

    #[test]
    fn filter_keeps_high_fill_even_when_far_from_full() {
        let config = PredictionConfig::default();
        // 40 % over 80 h → 0.5 %/h → 120 h; 65 % over 185 h → ~0.35 %/h → ~100 h.
        let slow_low = bin("slow-low", 40, Some(80));
        let slow_high = bin("slow-high", 65, Some(185));

        let slow_low_prediction = predict_bin(&slow_low, now(), &config);
        let slow_high_prediction = predict_bin(&slow_high, now(), &config);
        assert!(slow_low_prediction.hours_to_full > WATCH_WINDOW_HOURS);
        assert!(slow_high_prediction.hours_to_full > WATCH_WINDOW_HOURS);

        let predictions = predict_overflows(&[slow_low, slow_high], now(), &config);
        let ids: Vec<&str> = predictions
            .iter()
            .map(|prediction| prediction.bin.id.0.as_str())
            .collect();
        assert_eq!(ids, ["slow-high"]);
    }

    #[test]
    fn empty_bin_never_overflows() {
        let prediction = predict_bin(&bin("empty", 0, Some(5)), now(), &PredictionConfig::default());
        assert!(prediction.hours_to_full.is_infinite());
        assert!(prediction.estimated_overflow.is_none());
    }

    #[test]
    fn just_collected_bin_uses_default_rate() {
        let config = PredictionConfig {
            default_lookback_hours: 168,
            default_fill_rate: 2.0,
        };
        let prediction = predict_bin(&bin("fresh", 10, Some(0)), now(), &config);

        assert!(close(prediction.fill_rate, 2.0, 1e-9));
        assert!(close(prediction.hours_to_full, 45.0, 1e-9));
        assert_eq!(
            prediction.estimated_overflow,
            Some(now() + Duration::hours(45))
        );
        assert_eq!(prediction.priority, Priority::Medium);
    }

    #[test]
    fn higher_fill_never_ranks_lower() {
        let config = PredictionConfig::default();
        for hours in [1_i64, 6, 20, 48, 100, 300] {
            let mut previous_rank = u8::MAX;
            for fill_level in (0_u8..=100).step_by(5) {
                let rank = predict_bin(&bin("b", fill_level, Some(hours)), now(), &config)
                    .priority
                    .rank();
                assert!(rank <= previous_rank, "fill {fill_level} after {hours}h");
                previous_rank = rank;
            }
        }
    }

    #[test]
    fn output_is_sorted_and_truncated() {
        let config = PredictionConfig::default();
        let bins: Vec<Bin> = (0_u8..30)
            .map(|index| {
                bin(
                    &format!("bin-{index}"),
                    40 + index * 2,
                    Some(i64::from(index) * 3 + 1),
                )
            })
            .collect();

        let predictions = predict_overflows(&bins, now(), &config);
        assert_eq!(predictions.len(), MAX_PREDICTIONS);

        for pair in predictions.windows(2) {
            let [earlier, later] = pair else {
                continue;
            };
            assert!(earlier.priority <= later.priority);
            if earlier.priority == later.priority {
                assert!(earlier.hours_to_full <= later.hours_to_full);
            }
        }
    }

    #[test]
    fn timeline_shortens_long_locations() {
        let mut long = bin("long", 92, Some(10));
        long.location = "Anna Salai near Gemini Flyover".to_owned();
        let predictions = predict_overflows(&[long], now(), &PredictionConfig::default());

        let timeline = overflow_timeline(&predictions);
        let point = timeline.first().expect("one point");
        assert_eq!(point.label, "Anna Salai near...");
        assert_eq!(point.current, 92);
        assert_eq!(point.predicted, 100);
        assert!(close(point.hours, 1.0, 1e-9));
    }

    #[test]
    fn formats_time_remaining() {
        assert_eq!(format_time_remaining(0.53), "32m");
        assert_eq!(format_time_remaining(7.4), "7h");
        assert_eq!(format_time_remaining(53.0), "2d 5h");
        assert_eq!(format_time_remaining(47.8), "2d 0h");
    }
}
