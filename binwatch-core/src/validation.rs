//! Checks applied to registry rows and form input before they enter the dashboard.

use crate::model::{Bin, BinId, BinRecord, BinStatus, Coordinate, NewBin};

/// Capacity suggested for new bins when the form is left untouched.
pub const DEFAULT_CAPACITY_LITERS: u32 = 100;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
/// Reasons a bin row or form input is refused.
pub enum ValidationError {
    /// Location label is blank.
    #[error("Location must not be empty")]
    EmptyLocation,
    /// A required column is null or absent.
    #[error("Missing {0}")]
    MissingField(&'static str),
    /// A text field could not be read as a number.
    #[error("Invalid {field}: {value:?}")]
    InvalidNumber {
        /// Field name.
        field: &'static str,
        /// Offending input.
        value: String,
    },
    /// Latitude is not finite or outside -90..=90.
    #[error("Latitude out of range: {0}")]
    LatitudeOutOfRange(f64),
    /// Longitude is not finite or outside -180..=180.
    #[error("Longitude out of range: {0}")]
    LongitudeOutOfRange(f64),
    /// Fill level is not a whole percentage within 0..=100.
    #[error("Fill level out of range: {0}")]
    FillLevelOutOfRange(f64),
    /// Capacity is zero, negative, or too large.
    #[error("Capacity must be a positive number of liters, got {0}")]
    InvalidCapacity(i64),
}

impl Coordinate {
    /// Build a coordinate, rejecting non-finite or out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::LatitudeOutOfRange`] or
    /// [`ValidationError::LongitudeOutOfRange`].
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(ValidationError::LatitudeOutOfRange(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(ValidationError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

impl TryFrom<BinRecord> for Bin {
    type Error = ValidationError;

    fn try_from(record: BinRecord) -> Result<Self, Self::Error> {
        let latitude = record
            .latitude
            .ok_or(ValidationError::MissingField("latitude"))?;
        let longitude = record
            .longitude
            .ok_or(ValidationError::MissingField("longitude"))?;
        let coordinate = Coordinate::new(latitude, longitude)?;

        let raw_fill = record
            .fill_level
            .ok_or(ValidationError::MissingField("fill_level"))?;
        let fill_level = fill_percent(raw_fill)?;

        let raw_capacity = record
            .capacity
            .ok_or(ValidationError::MissingField("capacity"))?;
        let capacity = u32::try_from(raw_capacity)
            .ok()
            .filter(|liters| *liters > 0)
            .ok_or(ValidationError::InvalidCapacity(raw_capacity))?;

        let status = record
            .status
            .ok_or(ValidationError::MissingField("status"))?;
        let last_updated = record
            .last_updated
            .ok_or(ValidationError::MissingField("last_updated"))?;
        let created_at = record
            .created_at
            .ok_or(ValidationError::MissingField("created_at"))?;

        Ok(Bin {
            id: record.id,
            location: record.location,
            coordinate,
            fill_level,
            status,
            capacity,
            last_updated,
            last_collection: record.last_collection,
            created_at,
        })
    }
}

fn fill_percent(raw: f64) -> Result<u8, ValidationError> {
    if !raw.is_finite() || raw.fract().abs() > 0.0 || !(0.0..=100.0).contains(&raw) {
        return Err(ValidationError::FillLevelOutOfRange(raw));
    }
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "checked to be a whole number within 0..=100"
    )]
    let percent = raw as u8;
    Ok(percent)
}

#[derive(Debug, Clone, PartialEq)]
/// Registry row that failed validation, kept so the dashboard can point at it.
pub struct RejectedRecord {
    /// Identifier of the offending row.
    pub id: BinId,
    /// Why it was refused.
    pub reason: ValidationError,
}

/// Split registry rows into valid bins and rejected rows, preserving order.
#[must_use]
pub fn validate_records(records: Vec<BinRecord>) -> (Vec<Bin>, Vec<RejectedRecord>) {
    let mut bins = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();

    for record in records {
        let id = record.id.clone();
        match Bin::try_from(record) {
            Ok(bin) => bins.push(bin),
            Err(reason) => {
                tracing::warn!(bin_id = %id, %reason, "rejecting malformed bin row");
                rejected.push(RejectedRecord { id, reason });
            }
        }
    }

    (bins, rejected)
}

impl NewBin {
    /// Parse the add-bin form fields.
    ///
    /// A blank capacity falls back to [`DEFAULT_CAPACITY_LITERS`].
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] describing the first field that does not parse.
    pub fn parse(
        location: &str,
        latitude: &str,
        longitude: &str,
        capacity: &str,
    ) -> Result<Self, ValidationError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(ValidationError::EmptyLocation);
        }

        let latitude = parse_number::<f64>("latitude", latitude)?;
        let longitude = parse_number::<f64>("longitude", longitude)?;
        let coordinate = Coordinate::new(latitude, longitude)?;

        let capacity = if capacity.trim().is_empty() {
            DEFAULT_CAPACITY_LITERS
        } else {
            let liters = parse_number::<i64>("capacity", capacity)?;
            u32::try_from(liters)
                .ok()
                .filter(|value| *value > 0)
                .ok_or(ValidationError::InvalidCapacity(liters))?
        };

        Ok(Self {
            location: location.to_owned(),
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            capacity,
            fill_level: 0,
            status: BinStatus::Operational,
        })
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, ValidationError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_err| ValidationError::InvalidNumber {
            field,
            value: raw.to_owned(),
        })
}
