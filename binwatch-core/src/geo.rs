//! Map framing for a set of bin coordinates.

use crate::model::Coordinate;

/// Where the map is centered when there is nothing to show (Chennai).
pub const DEFAULT_CENTER: Coordinate = Coordinate {
    latitude: 13.0827,
    longitude: 80.2707,
};

const DEFAULT_SPAN_DEGREES: f64 = 0.1;
const MIN_SPAN_DEGREES: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
/// Axis-aligned latitude/longitude window.
pub struct BoundingBox {
    /// Southern edge.
    pub min_latitude: f64,
    /// Northern edge.
    pub max_latitude: f64,
    /// Western edge.
    pub min_longitude: f64,
    /// Eastern edge.
    pub max_longitude: f64,
}

impl BoundingBox {
    /// Window of `span` degrees around a center.
    #[must_use]
    pub fn around(center: Coordinate, span: f64) -> Self {
        let half = span / 2.0;
        Self {
            min_latitude: center.latitude - half,
            max_latitude: center.latitude + half,
            min_longitude: center.longitude - half,
            max_longitude: center.longitude + half,
        }
    }

    /// Smallest window containing all points, widened by `padding` (a fraction of
    /// each side's extent). Falls back to [`DEFAULT_CENTER`] for an empty set.
    #[must_use]
    pub fn fit<I>(points: I, padding: f64) -> Self
    where
        I: IntoIterator<Item = Coordinate>,
    {
        let mut points = points.into_iter();
        let Some(first) = points.next() else {
            return Self::around(DEFAULT_CENTER, DEFAULT_SPAN_DEGREES);
        };

        let mut bounds = Self {
            min_latitude: first.latitude,
            max_latitude: first.latitude,
            min_longitude: first.longitude,
            max_longitude: first.longitude,
        };
        for point in points {
            bounds.min_latitude = bounds.min_latitude.min(point.latitude);
            bounds.max_latitude = bounds.max_latitude.max(point.latitude);
            bounds.min_longitude = bounds.min_longitude.min(point.longitude);
            bounds.max_longitude = bounds.max_longitude.max(point.longitude);
        }

        let latitude_pad =
            ((bounds.max_latitude - bounds.min_latitude) * padding).max(MIN_SPAN_DEGREES / 2.0);
        let longitude_pad =
            ((bounds.max_longitude - bounds.min_longitude) * padding).max(MIN_SPAN_DEGREES / 2.0);

        Self {
            min_latitude: bounds.min_latitude - latitude_pad,
            max_latitude: bounds.max_latitude + latitude_pad,
            min_longitude: bounds.min_longitude - longitude_pad,
            max_longitude: bounds.max_longitude + longitude_pad,
        }
    }

    /// Whether a point lies inside the window, edges included.
    #[must_use]
    pub fn contains(&self, point: Coordinate) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&point.latitude)
            && (self.min_longitude..=self.max_longitude).contains(&point.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate {
            latitude,
            longitude,
        }
    }

    #[test]
    fn empty_set_frames_default_center() {
        let bounds = BoundingBox::fit(Vec::new(), 0.1);
        assert!(bounds.contains(DEFAULT_CENTER));
        assert!(bounds.max_latitude - bounds.min_latitude > 0.0);
    }

    #[test]
    fn fit_contains_all_points_with_padding() {
        let points = vec![point(13.0, 80.2), point(13.1, 80.3), point(12.95, 80.25)];
        let bounds = BoundingBox::fit(points.clone(), 0.1);

        assert!(points.iter().all(|coordinate| bounds.contains(*coordinate)));
        assert!(bounds.min_latitude < 12.95);
        assert!(bounds.max_longitude > 80.3);
    }

    #[test]
    fn single_point_gets_minimum_span() {
        let bounds = BoundingBox::fit([point(13.0, 80.2)], 0.1);
        assert!(bounds.max_latitude - bounds.min_latitude >= MIN_SPAN_DEGREES - 1e-12);
        assert!(bounds.contains(point(13.0, 80.2)));
    }
}
