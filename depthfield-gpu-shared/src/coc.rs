//! Circle-of-confusion model.
//!
//! Mirrors `dof_coc_pack.wgsl` exactly; the CPU version is what tests and
//! tools use to reason about which distances end up in which field.

/// Smallest ramp width used as a divisor, so inverted thresholds degrade
/// to a hard step instead of producing NaN.
pub const MIN_RAMP: f32 = 1e-5;

/// Focus thresholds (view-space distances) plus the blur radius cap in pixels.
///
/// Expected ordering is `near_blurry < near_sharp <= far_sharp < far_blurry`.
/// It is not validated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthOfFieldParams {
    pub near_blurry: f32,
    pub near_sharp: f32,
    pub far_sharp: f32,
    pub far_blurry: f32,
    pub max_coc_radius: f32,
}

impl Default for DepthOfFieldParams {
    fn default() -> Self {
        Self {
            near_blurry: 40.0,
            near_sharp: 110.0,
            far_sharp: 200.0,
            far_blurry: 280.0,
            max_coc_radius: 15.0,
        }
    }
}

/// Convert a `[0, 1]` depth-buffer value from a right-handed perspective
/// projection back to view-space distance.
pub fn linearize_depth(z: f32, z_near: f32, z_far: f32) -> f32 {
    z_near * z_far / (z_far - z * (z_far - z_near))
}

/// Signed CoC in `[-1, 1]`: negative in the near field, positive in the far
/// field, zero inside `[near_sharp, far_sharp]`.
pub fn circle_of_confusion(distance: f32, params: &DepthOfFieldParams) -> f32 {
    if distance < params.near_sharp {
        let ramp = (params.near_sharp - params.near_blurry).max(MIN_RAMP);
        -((params.near_sharp - distance) / ramp).clamp(0.0, 1.0)
    } else if distance > params.far_sharp {
        let ramp = (params.far_blurry - params.far_sharp).max(MIN_RAMP);
        ((distance - params.far_sharp) / ramp).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_sharp_range_is_zero() {
        let params = DepthOfFieldParams::default();
        for d in [110.0, 111.5, 150.0, 199.9, 200.0] {
            assert_eq!(circle_of_confusion(d, &params), 0.0, "distance {d}");
        }
    }

    #[test]
    fn test_saturates_beyond_blurry_thresholds() {
        let params = DepthOfFieldParams::default();
        for d in [0.5, 20.0, 40.0] {
            assert_eq!(circle_of_confusion(d, &params), -1.0, "near distance {d}");
        }
        for d in [280.0, 300.0, 500.0] {
            assert_eq!(circle_of_confusion(d, &params), 1.0, "far distance {d}");
        }
    }

    #[test]
    fn test_ramps_are_linear() {
        let params = DepthOfFieldParams::default();
        assert!((circle_of_confusion(75.0, &params) + 0.5).abs() < EPSILON);
        assert!((circle_of_confusion(240.0, &params) - 0.5).abs() < EPSILON);
        let a = circle_of_confusion(90.0, &params);
        let b = circle_of_confusion(60.0, &params);
        assert!(a < 0.0 && b < a);
    }

    #[test]
    fn test_linearize_depth_endpoints() {
        assert!((linearize_depth(0.0, 1.0, 500.0) - 1.0).abs() < EPSILON);
        assert!((linearize_depth(1.0, 1.0, 500.0) - 500.0).abs() < 1e-2);
    }

    #[test]
    fn test_linearize_matches_projection() {
        // z_ndc of perspective_rh for a point at view distance d.
        let (n, f) = (1.0_f32, 500.0_f32);
        for d in [1.0_f32, 40.0, 150.0, 499.0] {
            let z = f / (n - f) * -d + n * f / (n - f);
            let z_ndc = z / d;
            assert!((linearize_depth(z_ndc, n, f) - d).abs() / d < 1e-3, "distance {d}");
        }
    }

    #[test]
    fn test_inverted_thresholds_stay_finite() {
        let params = DepthOfFieldParams {
            near_blurry: 120.0,
            near_sharp: 110.0,
            far_sharp: 200.0,
            far_blurry: 200.0,
            max_coc_radius: 15.0,
        };
        for d in [0.0, 100.0, 150.0, 200.0, 201.0, 1000.0] {
            let coc = circle_of_confusion(d, &params);
            assert!(coc.is_finite() && (-1.0..=1.0).contains(&coc), "distance {d}");
        }
    }
}
