//! Constant-velocity Kalman filter over the `(cx, cy, a, h)` measurement
//! space.
//!
//! The state is 8-dimensional: the four measured components plus their
//! velocities. Process and measurement noise scale with the currently
//! estimated height, so large objects tolerate proportionally larger motion.

use nalgebra::{Cholesky, Matrix2, Matrix4, SMatrix, SVector, Vector2, Vector4};

use crate::bbox::Measurement;
use crate::{Error, Result};

/// State mean `(cx, cy, a, h, vcx, vcy, va, vh)`.
pub type StateMean = SVector<f64, 8>;
/// State covariance, symmetric positive semi-definite.
pub type StateCovariance = SMatrix<f64, 8, 8>;

/// Upper 95% quantiles of the chi-square distribution, indexed by
/// `degrees_of_freedom - 1`. Used to gate Mahalanobis distances: index 3 for
/// the full 4-dimensional measurement, index 1 for position-only gating.
pub const CHI2_INV_95: [f64; 9] = [
    3.8415, 5.9915, 7.8147, 9.4877, 11.070, 12.592, 14.067, 15.507, 16.919,
];

/// Stateless Kalman filter operator shared by all tracks.
///
/// The filter owns only the fixed model matrices; per-track `(mean,
/// covariance)` pairs are passed in and out of every operation.
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_mat: SMatrix<f64, 8, 8>,
    update_mat: SMatrix<f64, 4, 8>,
    std_weight_position: f64,
    std_weight_velocity: f64,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    pub fn new() -> Self {
        // Constant-velocity model over one time step: x' = x + vx, etc.
        let mut motion_mat = SMatrix::<f64, 8, 8>::identity();
        for i in 0..4 {
            motion_mat[(i, 4 + i)] = 1.0;
        }

        // Measurement matrix selecting the first four state components.
        let mut update_mat = SMatrix::<f64, 4, 8>::zeros();
        for i in 0..4 {
            update_mat[(i, i)] = 1.0;
        }

        Self {
            motion_mat,
            update_mat,
            std_weight_position: 1.0 / 20.0,
            std_weight_velocity: 1.0 / 10.0,
        }
    }

    /// Create a track state from an unassociated measurement.
    ///
    /// Velocities start at zero with generous uncertainty; position
    /// uncertainty scales with the measured height.
    pub fn initiate(&self, measurement: &Measurement) -> (StateMean, StateCovariance) {
        let mut mean = StateMean::zeros();
        mean[0] = measurement.center_x;
        mean[1] = measurement.center_y;
        mean[2] = measurement.aspect_ratio;
        mean[3] = measurement.height;

        let wp = self.std_weight_position;
        let wv = self.std_weight_velocity;
        let h = measurement.height;
        let std = [
            2.0 * wp * h,
            2.0 * wp * h,
            1e-1,
            2.0 * wp * h,
            2.0 * wv * h,
            2.0 * wv * h,
            5e-1,
            10.0 * wv * h,
        ];
        let covariance =
            StateCovariance::from_diagonal(&StateMean::from_iterator(std.iter().map(|s| s * s)));

        (mean, covariance)
    }

    /// Advance the state distribution by one time step, in place.
    pub fn predict(&self, mean: &mut StateMean, covariance: &mut StateCovariance) {
        let wp = self.std_weight_position;
        let wv = self.std_weight_velocity;
        let h = mean[3];
        let std = [
            wp * h,
            wp * h,
            1e-1,
            wp * h,
            wv * h,
            wv * h,
            5e-1,
            wv * h,
        ];
        let motion_cov =
            StateCovariance::from_diagonal(&StateMean::from_iterator(std.iter().map(|s| s * s)));

        *mean = self.motion_mat * *mean;
        *covariance = self.motion_mat * *covariance * self.motion_mat.transpose() + motion_cov;
    }

    /// Project the state distribution into measurement space.
    pub fn project(
        &self,
        mean: &StateMean,
        covariance: &StateCovariance,
    ) -> (Vector4<f64>, Matrix4<f64>) {
        let wp = self.std_weight_position;
        let h = mean[3];
        let std = [wp * h, wp * h, 5e-1, wp * h];
        let innovation_cov =
            Matrix4::from_diagonal(&Vector4::from_iterator(std.iter().map(|s| s * s)));

        let projected_mean = self.update_mat * mean;
        let projected_cov =
            self.update_mat * covariance * self.update_mat.transpose() + innovation_cov;

        (projected_mean, projected_cov)
    }

    /// Correct the state distribution with an associated measurement, in
    /// place.
    ///
    /// The projected covariance is positive definite by construction, so a
    /// failed factorisation signals a broken state upstream and surfaces as
    /// [`Error::NotPositiveDefinite`].
    pub fn update(
        &self,
        measurement: &Measurement,
        mean: &mut StateMean,
        covariance: &mut StateCovariance,
    ) -> Result<()> {
        let (projected_mean, projected_cov) = self.project(mean, covariance);

        let s_inv = Cholesky::new(projected_cov)
            .ok_or(Error::NotPositiveDefinite)?
            .inverse();
        let kalman_gain = *covariance * self.update_mat.transpose() * s_inv;
        let innovation = measurement.as_vector() - projected_mean;

        *mean += kalman_gain * innovation;
        let correction = kalman_gain * self.update_mat * *covariance;
        *covariance -= correction;

        Ok(())
    }

    /// Squared Mahalanobis distance between the state distribution and a
    /// measurement.
    ///
    /// With `only_position` the comparison is restricted to the `(cx, cy)`
    /// components; gate the result against `CHI2_INV_95[1]` instead of
    /// `CHI2_INV_95[3]` in that mode.
    pub fn gating_distance(
        &self,
        mean: &StateMean,
        covariance: &StateCovariance,
        measurement: &Measurement,
        only_position: bool,
    ) -> Result<f64> {
        let (projected_mean, projected_cov) = self.project(mean, covariance);

        if only_position {
            let d = Vector2::new(
                measurement.center_x - projected_mean[0],
                measurement.center_y - projected_mean[1],
            );
            let cov = Matrix2::new(
                projected_cov[(0, 0)],
                projected_cov[(0, 1)],
                projected_cov[(1, 0)],
                projected_cov[(1, 1)],
            );
            let chol = Cholesky::new(cov).ok_or(Error::NotPositiveDefinite)?;
            let z = chol
                .l()
                .solve_lower_triangular(&d)
                .ok_or(Error::NotPositiveDefinite)?;
            Ok(z.norm_squared())
        } else {
            let d = measurement.as_vector() - projected_mean;
            let chol = Cholesky::new(projected_cov).ok_or(Error::NotPositiveDefinite)?;
            let z = chol
                .l()
                .solve_lower_triangular(&d)
                .ok_or(Error::NotPositiveDefinite)?;
            Ok(z.norm_squared())
        }
    }
}
