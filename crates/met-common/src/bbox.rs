//! Grid cell bounding boxes around a station.

use serde::{Deserialize, Serialize};

/// The single grid cell that contains a point, in degrees.
///
/// Longitudes keep the sign convention of the input point; the NOMADS filter
/// accepts both -180..180 and 0..360.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellBox {
    pub left_lon: f64,
    pub right_lon: f64,
    pub bottom_lat: f64,
    pub top_lat: f64,
    pub delta: f64,
}

impl CellBox {
    /// Floor the point to the grid spacing and extend by one cell.
    pub fn around(lat: f64, lon: f64, delta: f64) -> Self {
        let left_lon = (lon / delta).floor() * delta;
        let bottom_lat = (lat / delta).floor() * delta;
        Self {
            left_lon,
            right_lon: left_lon + delta,
            bottom_lat,
            top_lat: bottom_lat + delta,
            delta,
        }
    }

    /// Fractional position `(u, v)` of a point inside the cell.
    ///
    /// `u` runs along latitude from the bottom edge, `v` along longitude from
    /// the left edge; both are in `[0, 1)` for points the cell was built from.
    pub fn fractions(&self, lat: f64, lon: f64) -> (f64, f64) {
        let u = (lat - self.bottom_lat) / self.delta;
        let v = (lon - self.left_lon) / self.delta;
        (u, v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_around_positive_point() {
        let cell = CellBox::around(19.824, 155.478, 0.25);
        assert_eq!(cell.bottom_lat, 19.75);
        assert_eq!(cell.top_lat, 20.0);
        assert_eq!(cell.left_lon, 155.25);
        assert_eq!(cell.right_lon, 155.5);
        let (u, v) = cell.fractions(19.824, 155.478);
        assert!((0.0..1.0).contains(&u) && (0.0..1.0).contains(&v));
    }

    #[test]
    fn test_cell_around_negative_longitude() {
        // SMA, Maunakea
        let cell = CellBox::around(19.824, -155.478, 0.25);
        assert_eq!(cell.left_lon, -155.5);
        assert_eq!(cell.right_lon, -155.25);
        let (u, v) = cell.fractions(19.824, -155.478);
        assert!((u - 0.296).abs() < 1e-9);
        assert!((v - 0.088).abs() < 1e-9);
    }

    #[test]
    fn test_point_on_grid_line() {
        let cell = CellBox::around(-30.0, 70.5, 0.25);
        assert_eq!(cell.bottom_lat, -30.0);
        assert_eq!(cell.fractions(-30.0, 70.5), (0.0, 0.0));
    }
}
