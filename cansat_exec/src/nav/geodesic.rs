//! # Ellipsoidal inverse geodesic solver
//!
//! Vincenty's inverse formula on the WGS84 ellipsoid. For nearly antipodal
//! points, where the iteration fails to converge, a spherical great circle
//! solution is used instead.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use eqpt_if::eqpt::gps::GeoFix;
use log::debug;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// WGS84 semi-major axis
pub const WGS84_A_M: f64 = 6_378_137.0;

/// WGS84 flattening
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// Mean earth radius for the spherical fallback
const MEAN_RADIUS_M: f64 = 6_371_008.8;

const MAX_ITERATIONS: usize = 200;
const CONVERGENCE_RAD: f64 = 1e-12;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Solution of the inverse problem between two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geodesic {
    /// Length of the geodesic
    pub distance_m: f64,

    /// Forward azimuth at the first point, radians clockwise from north in (-pi, pi]
    pub azimuth_rad: f64,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Solve the inverse geodesic problem from `from` to `to`.
pub fn inverse(from: GeoFix, to: GeoFix) -> Geodesic {
    match vincenty(from, to) {
        Some(g) => g,
        None => {
            debug!("Vincenty did not converge for {:?} -> {:?}, using great circle", from, to);
            great_circle(from, to)
        }
    }
}

fn vincenty(from: GeoFix, to: GeoFix) -> Option<Geodesic> {
    let a = WGS84_A_M;
    let f = WGS84_F;
    let b = (1.0 - f) * a;

    let l = (to.longitude - from.longitude).to_radians();
    let u1 = ((1.0 - f) * from.latitude.to_radians().tan()).atan();
    let u2 = ((1.0 - f) * to.latitude.to_radians().tan()).atan();

    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    let mut converged = false;

    let mut sin_sigma = 0.0;
    let mut cos_sigma = 0.0;
    let mut sigma = 0.0;
    let mut cos_sq_alpha = 0.0;
    let mut cos_2sigma_m = 0.0;
    let mut sin_lambda = 0.0;
    let mut cos_lambda = 0.0;

    for _ in 0..MAX_ITERATIONS {
        let sc = lambda.sin_cos();
        sin_lambda = sc.0;
        cos_lambda = sc.1;

        sin_sigma = ((cos_u2 * sin_lambda).powi(2)
            + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2))
        .sqrt();

        // Coincident points
        if sin_sigma == 0.0 {
            return Some(Geodesic {
                distance_m: 0.0,
                azimuth_rad: 0.0,
            });
        }

        cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        sigma = sin_sigma.atan2(cos_sigma);

        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;

        // Equatorial lines have cos^2(alpha) = 0
        cos_2sigma_m = if cos_sq_alpha != 0.0 {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        }
        else {
            0.0
        };

        let c = f / 16.0 * cos_sq_alpha * (4.0 + f * (4.0 - 3.0 * cos_sq_alpha));

        let lambda_prev = lambda;
        lambda = l
            + (1.0 - c)
                * f
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))));

        if lambda.abs() > std::f64::consts::PI {
            return None;
        }

        if (lambda - lambda_prev).abs() < CONVERGENCE_RAD {
            converged = true;
            break;
        }
    }

    if !converged {
        return None;
    }

    let u_sq = cos_sq_alpha * (a * a - b * b) / (b * b);
    let big_a = 1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
    let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));

    let delta_sigma = big_b
        * sin_sigma
        * (cos_2sigma_m
            + big_b / 4.0
                * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))
                    - big_b / 6.0
                        * cos_2sigma_m
                        * (-3.0 + 4.0 * sin_sigma.powi(2))
                        * (-3.0 + 4.0 * cos_2sigma_m.powi(2))));

    let azimuth_rad = (cos_u2 * sin_lambda).atan2(cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda);

    Some(Geodesic {
        distance_m: b * big_a * (sigma - delta_sigma),
        azimuth_rad,
    })
}

fn great_circle(from: GeoFix, to: GeoFix) -> Geodesic {
    let phi1 = from.latitude.to_radians();
    let phi2 = to.latitude.to_radians();
    let d_phi = phi2 - phi1;
    let d_lambda = (to.longitude - from.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let distance_m = 2.0 * MEAN_RADIUS_M * h.sqrt().min(1.0).asin();

    let y = d_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();

    Geodesic {
        distance_m,
        azimuth_rad: y.atan2(x),
    }
}
