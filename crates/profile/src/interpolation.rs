//! Bilinear interpolation inside a single grid cell.
//!
//! Corner arrays are indexed `a[i][j]` with `i` the latitude index
//! (0 = bottom) and `j` the longitude index (0 = left). `u` is the fractional
//! latitude offset from the bottom edge, `v` the longitude offset from the
//! left edge.

/// Values at the four corners of a grid cell.
pub type Corners = [[f64; 2]; 2];

pub fn grid_interp(a: &Corners, u: f64, v: f64) -> f64 {
    a[0][0] * (1.0 - u) * (1.0 - v)
        + a[1][0] * u * (1.0 - v)
        + a[0][1] * (1.0 - u) * v
        + a[1][1] * u * v
}

/// Per-corner magnitude of a vector field given its two components.
pub fn combine(a: &Corners, b: &Corners) -> Corners {
    let mut c = [[0.0; 2]; 2];
    for i in 0..2 {
        for j in 0..2 {
            c[i][j] = a[i][j].hypot(b[i][j]);
        }
    }
    c
}

/// Interpolated magnitude of a vector field.
pub fn grid_interp_vector(a: &Corners, b: &Corners, u: f64, v: f64) -> f64 {
    grid_interp(&combine(a, b), u, v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::assert_approx_eq;

    #[test]
    fn test_grid_interp() {
        let t = [[1.0, 2.0], [3.0, 4.0]];
        assert_approx_eq!(grid_interp(&t, 0.1, 0.1), 1.3, 1e-12);

        let t = [[0.0, 1.0], [0.0, 1.0]];
        assert_approx_eq!(grid_interp(&t, 0.1, 0.1), 0.1, 1e-12);
        assert_approx_eq!(grid_interp(&t, 0.1, 0.2), 0.2, 1e-12);
        assert_approx_eq!(grid_interp(&t, 0.2, 0.1), 0.1, 1e-12);
        assert_approx_eq!(
            grid_interp(&t, 0.1, 0.1) * 2.0,
            grid_interp(&t, 0.2, 0.2),
            1e-12
        );
    }

    #[test]
    fn test_symmetric_grid() {
        let t = [[0.0, 1.0], [1.0, 1.0]];
        assert_approx_eq!(grid_interp(&t, 0.1, 0.3), grid_interp(&t, 0.3, 0.1), 1e-12);
        // Edges are lines
        assert_approx_eq!(
            grid_interp(&t, 0.1, 0.0) * 2.0,
            grid_interp(&t, 0.2, 0.0),
            1e-12
        );
    }

    #[test]
    fn test_flat_grid() {
        let t = [[0.0, 1.0], [1.0, 2.0]];
        assert_approx_eq!(grid_interp(&t, 0.1, 0.3), grid_interp(&t, 0.3, 0.1), 1e-12);
        assert_approx_eq!(
            grid_interp(&t, 0.1, 0.1) * 2.0,
            grid_interp(&t, 0.2, 0.2),
            1e-12
        );
        assert_approx_eq!(
            grid_interp(&t, 0.1, 0.0) * 2.0,
            grid_interp(&t, 0.2, 0.0),
            1e-12
        );
    }

    #[test]
    fn test_corners_are_exact() {
        let t = [[1.0, 2.0], [3.0, 4.0]];
        assert_eq!(grid_interp(&t, 0.0, 0.0), 1.0);
        assert_eq!(grid_interp(&t, 1.0, 0.0), 3.0);
        assert_eq!(grid_interp(&t, 0.0, 1.0), 2.0);
        assert_eq!(grid_interp(&t, 1.0, 1.0), 4.0);
    }

    #[test]
    fn test_grid_interp_vector() {
        let a = [[1.0, 2.0], [3.0, 4.0]];
        let b = [[1.0, 2.0], [3.0, 4.0]];
        assert_approx_eq!(grid_interp_vector(&a, &b, 0.1, 0.1), 1.8384776, 1e-7);

        let c = [
            [2f64.sqrt(), 8f64.sqrt()],
            [18f64.sqrt(), 32f64.sqrt()],
        ];
        assert_approx_eq!(grid_interp(&c, 0.1, 0.1), 1.8384776, 1e-7);
        assert_approx_eq!(
            grid_interp_vector(&a, &b, 0.1, 0.1),
            grid_interp(&c, 0.1, 0.1),
            1e-12
        );

        let a = [[0.0, 1.0], [0.0, 1.0]];
        assert_approx_eq!(
            grid_interp_vector(&a, &a, 0.1, 0.1),
            0.1 * 2f64.sqrt(),
            1e-12
        );
    }
}
