//! Aggregates over a bin snapshot: fill histogram, collection order, and headline numbers.

use crate::model::{Bin, BinStatus};

/// Bins at or above this level are candidates for the collection route.
pub const ROUTE_FILL_THRESHOLD: u8 = 70;
/// Maximum number of stops on the collection route.
pub const ROUTE_STOPS: usize = 5;
/// Level from which a bin counts as full in the headline numbers.
pub const FULL_THRESHOLD: u8 = 80;
/// Level from which a bin needs immediate attention.
pub const URGENT_THRESHOLD: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Quarter of the fill scale a bin falls into.
pub enum FillBucket {
    /// 0 to 24 %.
    Quarter1,
    /// 25 to 49 %.
    Quarter2,
    /// 50 to 74 %.
    Quarter3,
    /// 75 % and above.
    Quarter4,
}

impl FillBucket {
    /// Bucket holding the given level.
    #[must_use]
    pub fn of(fill_level: u8) -> Self {
        match fill_level {
            0..25 => FillBucket::Quarter1,
            25..50 => FillBucket::Quarter2,
            50..75 => FillBucket::Quarter3,
            _ => FillBucket::Quarter4,
        }
    }

    /// Axis label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            FillBucket::Quarter1 => "0-25%",
            FillBucket::Quarter2 => "25-50%",
            FillBucket::Quarter3 => "50-75%",
            FillBucket::Quarter4 => "75-100%",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Number of bins per fill quarter.
pub struct FillHistogram {
    /// Bins below 25 %.
    pub quarter1: usize,
    /// Bins from 25 % to below 50 %.
    pub quarter2: usize,
    /// Bins from 50 % to below 75 %.
    pub quarter3: usize,
    /// Bins at 75 % or more.
    pub quarter4: usize,
}

impl FillHistogram {
    /// Count the bins of a snapshot.
    #[must_use]
    pub fn from_bins(bins: &[Bin]) -> Self {
        let mut histogram = Self::default();
        for bin in bins {
            match FillBucket::of(bin.fill_level) {
                FillBucket::Quarter1 => histogram.quarter1 += 1,
                FillBucket::Quarter2 => histogram.quarter2 += 1,
                FillBucket::Quarter3 => histogram.quarter3 += 1,
                FillBucket::Quarter4 => histogram.quarter4 += 1,
            }
        }
        histogram
    }

    /// Buckets in ascending order with their counts.
    #[must_use]
    pub fn entries(&self) -> [(FillBucket, usize); 4] {
        [
            (FillBucket::Quarter1, self.quarter1),
            (FillBucket::Quarter2, self.quarter2),
            (FillBucket::Quarter3, self.quarter3),
            (FillBucket::Quarter4, self.quarter4),
        ]
    }

    /// Sum over all buckets.
    #[must_use]
    pub fn total(&self) -> usize {
        self.quarter1 + self.quarter2 + self.quarter3 + self.quarter4
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Stop on the suggested collection route.
pub struct RouteStop {
    /// Bin to empty.
    pub bin: Bin,
    /// Position on the route, starting at 0.
    pub rank: u8,
    /// Display score, 100 for the first stop and 10 less for each following one.
    pub score: u8,
}

/// Fullest bins above [`ROUTE_FILL_THRESHOLD`], fullest first, at most [`ROUTE_STOPS`].
#[must_use]
pub fn route_priorities(bins: &[Bin]) -> Vec<RouteStop> {
    let mut candidates: Vec<&Bin> = bins
        .iter()
        .filter(|bin| bin.fill_level >= ROUTE_FILL_THRESHOLD)
        .collect();
    candidates.sort_by(|left, right| right.fill_level.cmp(&left.fill_level));

    candidates
        .into_iter()
        .take(ROUTE_STOPS)
        .zip(0_u8..)
        .map(|(bin, rank)| RouteStop {
            bin: bin.clone(),
            rank,
            score: 100 - 10 * rank,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Headline numbers shown above the bin list.
pub struct DashboardStats {
    /// Number of bins in the snapshot.
    pub total: usize,
    /// Mean fill level, rounded; 0 when there are no bins.
    pub average_fill: u8,
    /// Bins at [`FULL_THRESHOLD`] or more.
    pub full: usize,
    /// Bins at [`URGENT_THRESHOLD`] or more, or tagged full.
    pub urgent: usize,
    /// Bins whose status tag disagrees with their fill level.
    pub divergent: usize,
}

impl DashboardStats {
    /// Compute the numbers for a snapshot.
    #[must_use]
    pub fn from_bins(bins: &[Bin]) -> Self {
        let total = bins.len();
        let sum: usize = bins.iter().map(|bin| usize::from(bin.fill_level)).sum();
        let average_fill = if total == 0 {
            0
        } else {
            u8::try_from((2 * sum + total) / (2 * total)).unwrap_or(100)
        };

        Self {
            total,
            average_fill,
            full: bins
                .iter()
                .filter(|bin| bin.fill_level >= FULL_THRESHOLD)
                .count(),
            urgent: bins
                .iter()
                .filter(|bin| bin.fill_level >= URGENT_THRESHOLD || bin.status == BinStatus::Full)
                .count(),
            divergent: bins.iter().filter(|bin| bin.status_diverges()).count(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
/// Coloring band for list entries and map markers.
pub enum FillSeverity {
    /// Below 50 %.
    Normal,
    /// 50 to 79 %.
    Moderate,
    /// 80 to 89 %.
    Warning,
    /// 90 % and above.
    Critical,
}

impl FillSeverity {
    /// Band for a raw fill level.
    #[must_use]
    pub fn from_level(fill_level: u8) -> Self {
        match fill_level {
            0..50 => FillSeverity::Normal,
            50..FULL_THRESHOLD => FillSeverity::Moderate,
            FULL_THRESHOLD..URGENT_THRESHOLD => FillSeverity::Warning,
            _ => FillSeverity::Critical,
        }
    }

    /// Band for a bin; a bin tagged full is always critical.
    #[must_use]
    pub fn of(bin: &Bin) -> Self {
        if bin.status == BinStatus::Full {
            FillSeverity::Critical
        } else {
            Self::from_level(bin.fill_level)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::model::{BinId, Coordinate};

    fn bin(id: &str, fill_level: u8) -> Bin {
        let stamp = Utc
            .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp");
        Bin {
            id: BinId(id.to_owned()),
            location: format!("Ward {id}"),
            coordinate: Coordinate {
                latitude: 13.0,
                longitude: 80.2,
            },
            fill_level,
            status: BinStatus::Operational,
            capacity: 240,
            last_updated: stamp,
            last_collection: None,
            created_at: stamp,
        }
    }

    #[test]
    fn histogram_partitions_every_level() {
        let bins: Vec<Bin> = (0_u8..=100).map(|level| bin(&level.to_string(), level)).collect();
        let histogram = FillHistogram::from_bins(&bins);

        assert_eq!(histogram.total(), bins.len());
        assert_eq!(histogram.quarter1, 25);
        assert_eq!(histogram.quarter2, 25);
        assert_eq!(histogram.quarter3, 25);
        assert_eq!(histogram.quarter4, 26);
    }

    #[test]
    fn histogram_bucket_edges() {
        assert_eq!(FillBucket::of(24), FillBucket::Quarter1);
        assert_eq!(FillBucket::of(25), FillBucket::Quarter2);
        assert_eq!(FillBucket::of(74), FillBucket::Quarter3);
        assert_eq!(FillBucket::of(75), FillBucket::Quarter4);
        assert_eq!(FillBucket::of(100), FillBucket::Quarter4);
    }

    #[test]
    fn route_takes_fullest_bins_above_threshold() {
        let bins: Vec<Bin> = [95_u8, 80, 71, 60, 90]
            .iter()
            .enumerate()
            .map(|(index, level)| bin(&index.to_string(), *level))
            .collect();

        let route = route_priorities(&bins);
        let levels: Vec<u8> = route.iter().map(|stop| stop.bin.fill_level).collect();
        let scores: Vec<u8> = route.iter().map(|stop| stop.score).collect();

        assert_eq!(levels, [95, 90, 80, 71]);
        assert_eq!(scores, [100, 90, 80, 70]);
    }

    #[test]
    fn route_is_capped() {
        let bins: Vec<Bin> = (0_u8..10).map(|index| bin(&index.to_string(), 70 + index)).collect();
        let route = route_priorities(&bins);

        assert_eq!(route.len(), ROUTE_STOPS);
        assert_eq!(route.last().map(|stop| stop.score), Some(60));
    }

    #[test]
    fn stats_count_full_urgent_and_divergent_bins() {
        let mut flagged = bin("flagged", 40);
        flagged.status = BinStatus::Full;
        let bins = vec![bin("a", 95), bin("b", 85), bin("c", 10), flagged];

        let stats = DashboardStats::from_bins(&bins);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.average_fill, 58);
        assert_eq!(stats.full, 2);
        assert_eq!(stats.urgent, 2);
        assert_eq!(stats.divergent, 2);
    }

    #[test]
    fn stats_of_empty_snapshot() {
        assert_eq!(DashboardStats::from_bins(&[]), DashboardStats::default());
    }

    #[test]
    fn severity_bands() {
        assert_eq!(FillSeverity::from_level(49), FillSeverity::Normal);
        assert_eq!(FillSeverity::from_level(50), FillSeverity::Moderate);
        assert_eq!(FillSeverity::from_level(80), FillSeverity::Warning);
        assert_eq!(FillSeverity::from_level(90), FillSeverity::Critical);

        let mut tagged = bin("tagged", 5);
        tagged.status = BinStatus::Full;
        assert_eq!(FillSeverity::of(&tagged), FillSeverity::Critical);
    }
}
