//! Domain data structures for bins, their registry rows, mutations, and routes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
/// Opaque identifier assigned to a bin by the registry.
pub struct BinId(pub String);

impl fmt::Display for BinId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
/// Status tag stored next to the fill level.
///
/// The tag is set independently of the fill level; the two may disagree.
pub enum BinStatus {
    /// Bin is in service.
    Operational,
    /// Bin has been flagged as full.
    Full,
    /// Any other tag written by the backend, kept verbatim.
    Other(String),
}

impl BinStatus {
    /// Wire representation of the tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            BinStatus::Operational => "operational",
            BinStatus::Full => "full",
            BinStatus::Other(raw) => raw.as_str(),
        }
    }
}

impl fmt::Display for BinStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.as_str())
    }
}

impl From<String> for BinStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "operational" => BinStatus::Operational,
            "full" => BinStatus::Full,
            _ => BinStatus::Other(raw),
        }
    }
}

impl From<BinStatus> for String {
    fn from(status: BinStatus) -> Self {
        match status {
            BinStatus::Other(raw) => raw,
            known => known.as_str().to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Geographic position in decimal degrees.
pub struct Coordinate {
    /// Latitude, -90 to 90.
    pub latitude: f64,
    /// Longitude, -180 to 180.
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq)]
/// Validated bin as held in the dashboard snapshot.
pub struct Bin {
    /// Registry identifier.
    pub id: BinId,
    /// Human-readable location label.
    pub location: String,
    /// Where the bin stands.
    pub coordinate: Coordinate,
    /// Fill level in percent, always within 0..=100.
    pub fill_level: u8,
    /// Status tag as stored in the registry.
    pub status: BinStatus,
    /// Capacity in liters.
    pub capacity: u32,
    /// Last modification of the row.
    pub last_updated: DateTime<Utc>,
    /// Last time the bin was emptied, if ever.
    pub last_collection: Option<DateTime<Utc>>,
    /// When the bin was registered.
    pub created_at: DateTime<Utc>,
}

impl Bin {
    /// Whether the status tag and the fill level tell different stories.
    ///
    /// A bin tagged `full` below 90 % or a bin at 90 % or more that is not tagged `full`.
    #[must_use]
    pub fn status_diverges(&self) -> bool {
        let tagged_full = self.status == BinStatus::Full;
        tagged_full != (self.fill_level >= 90)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Row of the `bins` table exactly as the registry returns it.
///
/// Columns are kept loose so that malformed rows can be reported instead of
/// failing the whole read.
pub struct BinRecord {
    /// Registry identifier.
    pub id: BinId,
    /// Location label.
    #[serde(default)]
    pub location: String,
    /// Latitude column.
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Longitude column.
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Fill level column.
    #[serde(default)]
    pub fill_level: Option<f64>,
    /// Status column.
    #[serde(default)]
    pub status: Option<BinStatus>,
    /// Capacity column.
    #[serde(default)]
    pub capacity: Option<i64>,
    /// Last modification timestamp.
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    /// Last collection timestamp.
    #[serde(default)]
    pub last_collection: Option<DateTime<Utc>>,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
/// Payload for registering a new bin.
pub struct NewBin {
    /// Location label.
    pub location: String,
    /// Latitude of the bin.
    pub latitude: f64,
    /// Longitude of the bin.
    pub longitude: f64,
    /// Capacity in liters.
    pub capacity: u32,
    /// Starting fill level, always 0 for new bins.
    pub fill_level: u8,
    /// Starting status, always operational for new bins.
    pub status: BinStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
/// Partial update of a bin; only fields that are set are sent.
pub struct BinPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    /// New location label.
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// New latitude.
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// New longitude.
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// New fill level.
    pub fill_level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// New status tag.
    pub status: Option<BinStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// New capacity.
    pub capacity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// New last collection timestamp.
    pub last_collection: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Modification timestamp to record.
    pub last_updated: Option<DateTime<Utc>>,
}

impl BinPatch {
    /// Patch recording that the bin was emptied at `now`.
    #[must_use]
    pub fn collected(now: DateTime<Utc>) -> Self {
        Self {
            fill_level: Some(0),
            status: Some(BinStatus::Operational),
            last_collection: Some(now),
            last_updated: Some(now),
            ..Self::default()
        }
    }

    /// Same patch, stamped as modified at `now` unless it already carries a stamp.
    #[must_use]
    pub fn touched(mut self, now: DateTime<Utc>) -> Self {
        self.last_updated.get_or_insert(now);
        self
    }

    /// Check if the patch would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Kind of change reported by the change feed.
pub enum ChangeKind {
    /// A bin was added.
    Insert,
    /// A bin was modified.
    Update,
    /// A bin was removed.
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Notification that the `bins` collection changed.
///
/// Consumers re-read the whole collection; the id is informational.
pub struct ChangeEvent {
    /// What happened.
    pub kind: ChangeKind,
    /// Affected bin, when known.
    pub id: Option<BinId>,
}

#[derive(Debug, Clone, PartialEq)]
/// Path between two coordinates as computed by a routing service.
pub struct Route {
    /// Ordered path geometry.
    pub path: Vec<Coordinate>,
    /// Total distance in meters.
    pub distance_meters: f64,
    /// Total travel time in seconds.
    pub duration_seconds: f64,
}

impl Route {
    /// Distance in kilometers.
    #[must_use]
    pub fn distance_km(&self) -> f64 {
        self.distance_meters / 1000.0
    }

    /// Travel time in whole minutes, rounded.
    #[must_use]
    pub fn duration_minutes(&self) -> f64 {
        (self.duration_seconds / 60.0).round()
    }

    /// One-line description suitable for a notification.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Route found: {:.2} km, ~{} minutes",
            self.distance_km(),
            self.duration_minutes()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_unknown_tags() {
        let status = BinStatus::from("maintenance".to_owned());
        assert_eq!(status, BinStatus::Other("maintenance".to_owned()));
        assert_eq!(String::from(status), "maintenance");
        assert_eq!(BinStatus::from("full".to_owned()), BinStatus::Full);
    }

    #[test]
    fn collected_patch_sends_reset_fields_and_stamp() {
        let now = DateTime::parse_from_rfc3339("2024-05-01T08:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc);
        let json = serde_json::to_value(BinPatch::collected(now)).expect("patch serializes");

        assert_eq!(
            json,
            serde_json::json!({
                "fill_level": 0,
                "status": "operational",
                "last_collection": "2024-05-01T08:00:00Z",
                "last_updated": "2024-05-01T08:00:00Z",
            })
        );
        assert!(BinPatch::default().is_empty());
        assert!(!BinPatch::default().touched(now).is_empty());
    }

    #[test]
    fn record_parses_registry_row() {
        let row = serde_json::json!({
            "id": "5d1f",
            "location": "Marina Beach",
            "latitude": 13.05,
            "longitude": 80.28,
            "fill_level": 42,
            "status": "operational",
            "capacity": 240,
            "last_updated": "2024-05-01T08:00:00.123456+00:00",
            "last_collection": null,
            "created_at": "2024-04-01T08:00:00+00:00",
        });
        let record: BinRecord = serde_json::from_value(row).expect("row deserializes");

        assert_eq!(record.id, BinId("5d1f".to_owned()));
        assert_eq!(record.fill_level, Some(42.0));
        assert_eq!(record.status, Some(BinStatus::Operational));
        assert!(record.last_collection.is_none());
    }

    #[test]
    fn record_tolerates_null_and_missing_columns() {
        let row = serde_json::json!({
            "id": "9a2e",
            "location": "Besant Nagar",
            "status": null,
            "last_updated": null,
        });
        let record: BinRecord = serde_json::from_value(row).expect("row deserializes");

        assert!(record.status.is_none());
        assert!(record.last_updated.is_none());
        assert!(record.created_at.is_none());
        assert!(record.latitude.is_none());
    }

    #[test]
    fn route_summary_formats_km_and_minutes() {
        let route = Route {
            path: Vec::new(),
            distance_meters: 4_321.0,
            duration_seconds: 610.0,
        };
        assert_eq!(route.summary(), "Route found: 4.32 km, ~10 minutes");
    }
}
