#![cfg_attr(not(feature = "std"), no_std)]
//! An implementation of Madgwick's AHRS orientation estimation filter in pure Rust.
//!
//! The filter fuses angular-rate (gyroscope) and reference-direction
//! (accelerometer, optionally magnetometer) measurements into a unit-quaternion
//! attitude estimate, applying one gradient-descent corrective step per sample.
//!
//! The main entry point for this crate is [`Madgwick`]; look there to get started.
//!
//! This crate optionally supports `no_std`; either the `libm` or the `micromath`
//! crate feature is required in `no_std` environments.

#[cfg(feature = "f32")]
/// Typedef for the floating-point data type used for most operations.
///
/// By default, all floating-point calculations are performed using `f64`. Enable the `f32` crate
/// feature to change this type to `f32`.
pub type Float = f32;
#[cfg(not(feature = "f32"))]
/// Typedef for the floating-point data type used for most operations.
///
/// By default, all floating-point calculations are performed using `f64`. Enable the `f32` crate
/// feature to change this type to `f32`.
pub type Float = f64;

#[cfg(feature = "std")]
type Math<T> = T;
#[cfg(all(not(feature = "std"), feature = "libm"))]
type Math<T> = libm::Libm<T>;
#[cfg(all(not(feature = "std"), not(feature = "libm"), feature = "micromath"))]
type Math<T> = T;
#[cfg(all(not(feature = "std"), not(feature = "libm"), feature = "micromath"))]
use micromath::F32Ext as _;

#[cfg(feature = "f32")]
use core::f32::consts as fc;
#[cfg(not(feature = "f32"))]
use core::f64::consts as fc;
use core::ops::{Add, Mul, Sub};

const RAD_TO_DEG: Float = 180.0 / fc::PI;

#[inline(always)]
fn square(t: Float) -> Float {
    t * t
}

#[cfg(not(feature = "fast-math"))]
/// Reciprocal square root used for all vector, gradient and quaternion normalization.
///
/// The default build computes a precise `1/sqrt(x)`. Enable the `fast-math` crate feature for the
/// approximate bit-pattern variant. Undefined for `x <= 0`; the filter never reaches that case
/// because zero-magnitude inputs are checked for beforehand.
fn inv_sqrt(x: Float) -> Float {
    1.0 / Math::<Float>::sqrt(x)
}

#[cfg(all(feature = "fast-math", feature = "f32"))]
/// Approximate reciprocal square root: bit-pattern initial estimate refined by one
/// Newton-Raphson iteration.
///
/// Relative error stays below roughly 0.2% for positive finite `x`. Undefined for `x <= 0`; the
/// filter never reaches that case because zero-magnitude inputs are checked for beforehand.
fn inv_sqrt(x: Float) -> Float {
    let y = Float::from_bits(0x5f37_59df - (x.to_bits() >> 1));
    y * (1.5 - 0.5 * x * y * y)
}

#[cfg(all(feature = "fast-math", not(feature = "f32")))]
/// Approximate reciprocal square root: bit-pattern initial estimate refined by one
/// Newton-Raphson iteration.
///
/// Relative error stays below roughly 0.2% for positive finite `x`. Undefined for `x <= 0`; the
/// filter never reaches that case because zero-magnitude inputs are checked for beforehand.
fn inv_sqrt(x: Float) -> Float {
    let y = Float::from_bits(0x5fe6_eb50_c7b5_37a9 - (x.to_bits() >> 1));
    y * (1.5 - 0.5 * x * y * y)
}

/// A quaternion, scalar part first.
///
/// The filter state quaternion represents the rotation from the sensor (body) frame to the earth
/// (reference) frame and has unit norm after every update step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Quaternion(pub Float, pub Float, pub Float, pub Float);

impl Mul for Quaternion {
    type Output = Quaternion;

    fn mul(self, rhs: Self) -> Self::Output {
        let w = self.0 * rhs.0 - self.1 * rhs.1 - self.2 * rhs.2 - self.3 * rhs.3;
        let x = self.0 * rhs.1 + self.1 * rhs.0 + self.2 * rhs.3 - self.3 * rhs.2;
        let y = self.0 * rhs.2 - self.1 * rhs.3 + self.2 * rhs.0 + self.3 * rhs.1;
        let z = self.0 * rhs.3 + self.1 * rhs.2 - self.2 * rhs.1 + self.3 * rhs.0;
        Self(w, x, y, z)
    }
}

impl Mul<Float> for Quaternion {
    type Output = Quaternion;

    fn mul(self, rhs: Float) -> Self::Output {
        Self(self.0 * rhs, self.1 * rhs, self.2 * rhs, self.3 * rhs)
    }
}

impl Add for Quaternion {
    type Output = Quaternion;

    fn add(self, rhs: Self) -> Self::Output {
        Self(
            self.0 + rhs.0,
            self.1 + rhs.1,
            self.2 + rhs.2,
            self.3 + rhs.3,
        )
    }
}

impl Sub for Quaternion {
    type Output = Quaternion;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(
            self.0 - rhs.0,
            self.1 - rhs.1,
            self.2 - rhs.2,
            self.3 - rhs.3,
        )
    }
}

impl From<[Float; 4]> for Quaternion {
    fn from(value: [Float; 4]) -> Self {
        Self(value[0], value[1], value[2], value[3])
    }
}

impl Quaternion {
    /// Returns the norm of the quaternion.
    pub fn norm(&self) -> Float {
        Math::<Float>::sqrt(square(self.0) + square(self.1) + square(self.2) + square(self.3))
    }

    /// Scales the quaternion to unit norm. A (near-)zero quaternion is left untouched.
    pub fn normalize(&mut self) {
        let n_sq = square(self.0) + square(self.1) + square(self.2) + square(self.3);
        if n_sq < Float::EPSILON {
            return;
        }
        let recip = inv_sqrt(n_sq);
        self.0 *= recip;
        self.1 *= recip;
        self.2 *= recip;
        self.3 *= recip;
    }
}

/// Struct containing the tuning parameters used by the [`Madgwick`] class.
///
/// The constructor sets all parameters to the default values.
#[derive(Clone, Copy)]
pub struct Params {
    /// Algorithm gain β weighting the gradient-descent corrective step against raw gyroscope
    /// integration.
    ///
    /// Larger values trust the reference vectors more and converge faster at the cost of noise;
    /// smaller values trust the gyroscope more, giving a smoother but drift-prone estimate. A
    /// gain of zero disables the corrective step entirely, reducing the filter to pure
    /// integration.
    ///
    /// Default value: 0.1
    pub gain: Float,
}

impl Default for Params {
    fn default() -> Self {
        Self { gain: 0.1 }
    }
}

/// Struct containing the filter state of the [`Madgwick`] class.
///
/// The relevant part of the state can be accessed via functions of the filter class, e.g.
/// [`Madgwick::quaternion()`], [`Madgwick::set_quaternion()`] and the Euler-angle accessors. To
/// reset the state to the initial values, use [`Madgwick::reset_state()`].
///
/// Direct access to the full state is typically not needed but can be useful in some cases, e.g.
/// for re-seeding the estimate from an external source. For this purpose, the state can be
/// accessed by [`Madgwick::state()`] and set by [`Madgwick::state_mut()`].
#[derive(Clone, Copy, Default)]
pub struct State {
    /// Orientation quaternion rotating the sensor frame into the earth frame.
    ///
    /// Unit norm within floating-point tolerance after every update call; the caller is
    /// responsible for keeping it that way when writing through [`Madgwick::state_mut()`].
    pub quat: Quaternion,
}

/// Struct containing coefficients used by the [`Madgwick`] class.
///
/// Coefficients are values that depend on the configured sampling rate but do not change during
/// update steps. They are calculated in [`Madgwick::new()`] and
/// [`Madgwick::set_sample_frequency()`].
#[derive(Clone, Copy, Default)]
pub struct Coefficients {
    /// Sampling frequency of the sensor data (in Hz).
    pub sample_freq: Float,

    /// Sampling time of the sensor data (in seconds), the integration step.
    pub sample_ts: Float,
}

/// A gradient-descent AHRS orientation filter.
///
/// This struct implements the orientation estimation filter described in the following
/// publication:
/// > S. O. H. Madgwick. "An efficient orientation filter for inertial and inertial/magnetic
/// > sensor arrays." Technical report, University of Bristol, 2010.
/// > [Report available at x-io](https://x-io.co.uk/res/doc/madgwick_internal_report.pdf).
///
/// The filter integrates the angular rate to propagate a quaternion attitude estimate and nudges
/// the result back toward consistency with the measured gravity direction (and, in the 9-axis
/// variant, the measured magnetic field) by a single gradient-descent step per sample, which
/// counteracts gyroscope drift. Both update variants tolerate degenerate reference measurements:
/// an all-zero accelerometer or magnetometer sample simply skips the corresponding correction for
/// that step.
///
/// To use this implementation,
/// 1. create an instance and provide the sampling frequency and, optionally, parameters
/// 2. for every sample, call [`update()`](Self::update()) or [`update_imu()`](Self::update_imu())
///    to feed the algorithm with IMU data
/// 3. access the estimate with [`quaternion()`](Self::quaternion()), [`roll()`](Self::roll()),
///    [`pitch()`](Self::pitch()) and [`yaw()`](Self::yaw()).
pub struct Madgwick {
    params: Params,
    state: State,
    coeffs: Coefficients,
}

impl Madgwick {
    /// Creates a new filter instance.
    ///
    /// In the most common case (using the default parameters), create the filter like this:
    /// ```rust
    /// # use madgwick_rs::Madgwick;
    /// let filter = Madgwick::new(512.0, None); // 512 Hz sampling frequency
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `sample_freq` is not positive.
    pub fn new(sample_freq: Float, params: Option<Params>) -> Self {
        let mut ret = Self {
            params: params.unwrap_or_default(),
            state: Default::default(),
            coeffs: Default::default(),
        };
        ret.coeffs.sample_freq = sample_freq;
        ret.setup();
        ret
    }

    /// Performs a 6-axis fusion step from gyroscope and accelerometer data.
    ///
    /// `gyr` is the angular rate in rad/s. `acc` is the measured gravity direction in any
    /// consistent unit; it is normalized internally. An all-zero `acc` sample (free fall, sensor
    /// fault) skips the corrective step, and the orientation advances on gyroscope integration
    /// alone for that call.
    pub fn update_imu(&mut self, gyr: [Float; 3], acc: [Float; 3]) {
        let [gx, gy, gz] = gyr;
        let q = self.state.quat;

        // rate of change of quaternion from gyroscope
        let mut q_dot = (q * Quaternion(0.0, gx, gy, gz)) * 0.5;

        // compute feedback only for a usable accelerometer measurement
        if acc != [0.0; 3] {
            let [mut ax, mut ay, mut az] = acc;
            let recip_norm = inv_sqrt(ax * ax + ay * ay + az * az);
            ax *= recip_norm;
            ay *= recip_norm;
            az *= recip_norm;

            // auxiliary variables to avoid repeated arithmetic
            let Quaternion(q0, q1, q2, q3) = q;
            let two_q0 = 2.0 * q0;
            let two_q1 = 2.0 * q1;
            let two_q2 = 2.0 * q2;
            let two_q3 = 2.0 * q3;
            let four_q0 = 4.0 * q0;
            let four_q1 = 4.0 * q1;
            let four_q2 = 4.0 * q2;
            let eight_q1 = 8.0 * q1;
            let eight_q2 = 8.0 * q2;
            let q0q0 = q0 * q0;
            let q1q1 = q1 * q1;
            let q2q2 = q2 * q2;
            let q3q3 = q3 * q3;

            // gradient descent corrective step
            let s0 = four_q0 * q2q2 + two_q2 * ax + four_q0 * q1q1 - two_q1 * ay;
            let s1 = four_q1 * q3q3 - two_q3 * ax + 4.0 * q0q0 * q1 - two_q0 * ay - four_q1
                + eight_q1 * q1q1
                + eight_q1 * q2q2
                + four_q1 * az;
            let s2 = 4.0 * q0q0 * q2 + two_q0 * ax + four_q2 * q3q3 - two_q3 * ay - four_q2
                + eight_q2 * q1q1
                + eight_q2 * q2q2
                + four_q2 * az;
            let s3 = 4.0 * q1q1 * q3 - two_q1 * ax + 4.0 * q2q2 * q3 - two_q2 * ay;

            let mut grad = Quaternion(s0, s1, s2, s3);
            if grad != Quaternion::default() {
                grad.normalize();
                q_dot = q_dot - grad * self.params.gain;
            }
        }

        // integrate rate of change to yield quaternion
        self.state.quat = q + q_dot * self.coeffs.sample_ts;
        self.state.quat.normalize();
    }

    /// Performs a 9-axis fusion step from gyroscope, accelerometer and magnetometer data.
    ///
    /// `gyr` is the angular rate in rad/s. `acc` and `mag` are the measured gravity and magnetic
    /// field directions in any consistent unit; both are normalized internally. The measured
    /// field is rotated into the earth frame through the current estimate and collapsed to its
    /// horizontal norm and vertical component, so that only the part of the field orthogonal to
    /// gravity constrains heading and magnetic dip cannot corrupt the inclination estimate.
    ///
    /// An all-zero `mag` sample falls back to [`update_imu()`](Self::update_imu()) for that call;
    /// if the accelerometer sample is all-zero as well, the orientation advances on gyroscope
    /// integration alone.
    pub fn update(&mut self, gyr: [Float; 3], acc: [Float; 3], mag: [Float; 3]) {
        // degrade to the 6-axis update when the magnetometer is unavailable
        if mag == [0.0; 3] {
            self.update_imu(gyr, acc);
            return;
        }

        let [gx, gy, gz] = gyr;
        let q = self.state.quat;

        // rate of change of quaternion from gyroscope
        let mut q_dot = (q * Quaternion(0.0, gx, gy, gz)) * 0.5;

        // compute feedback only for a usable accelerometer measurement
        if acc != [0.0; 3] {
            let [mut ax, mut ay, mut az] = acc;
            let recip_norm = inv_sqrt(ax * ax + ay * ay + az * az);
            ax *= recip_norm;
            ay *= recip_norm;
            az *= recip_norm;

            let [mut mx, mut my, mut mz] = mag;
            let recip_norm = inv_sqrt(mx * mx + my * my + mz * mz);
            mx *= recip_norm;
            my *= recip_norm;
            mz *= recip_norm;

            // auxiliary variables to avoid repeated arithmetic
            let Quaternion(q0, q1, q2, q3) = q;
            let two_q0 = 2.0 * q0;
            let two_q1 = 2.0 * q1;
            let two_q2 = 2.0 * q2;
            let two_q3 = 2.0 * q3;
            let two_q0q2 = 2.0 * q0 * q2;
            let two_q2q3 = 2.0 * q2 * q3;
            let q0q0 = q0 * q0;
            let q0q1 = q0 * q1;
            let q0q2 = q0 * q2;
            let q0q3 = q0 * q3;
            let q1q1 = q1 * q1;
            let q1q2 = q1 * q2;
            let q1q3 = q1 * q3;
            let q2q2 = q2 * q2;
            let q2q3 = q2 * q3;
            let q3q3 = q3 * q3;

            // reference direction of the earth's magnetic field
            let two_q0mx = two_q0 * mx;
            let two_q0my = two_q0 * my;
            let two_q0mz = two_q0 * mz;
            let two_q1mx = two_q1 * mx;
            let hx = mx * q0q0 - two_q0my * q3 + two_q0mz * q2 + mx * q1q1 + two_q1 * my * q2
                + two_q1 * mz * q3
                - mx * q2q2
                - mx * q3q3;
            let hy = two_q0mx * q3 + my * q0q0 - two_q0mz * q1 + two_q1mx * q2 - my * q1q1
                + my * q2q2
                + two_q2 * mz * q3
                - my * q3q3;
            let two_bx = Math::<Float>::sqrt(hx * hx + hy * hy);
            let two_bz = -two_q0mx * q2 + two_q0my * q1 + mz * q0q0 + two_q1mx * q3 - mz * q1q1
                + two_q2 * my * q3
                - mz * q2q2
                + mz * q3q3;
            let four_bx = 2.0 * two_bx;
            let four_bz = 2.0 * two_bz;

            // gradient descent corrective step
            let s0 = -two_q2 * (2.0 * q1q3 - two_q0q2 - ax)
                + two_q1 * (2.0 * q0q1 + two_q2q3 - ay)
                - two_bz * q2 * (two_bx * (0.5 - q2q2 - q3q3) + two_bz * (q1q3 - q0q2) - mx)
                + (-two_bx * q3 + two_bz * q1)
                    * (two_bx * (q1q2 - q0q3) + two_bz * (q0q1 + q2q3) - my)
                + two_bx * q2 * (two_bx * (q0q2 + q1q3) + two_bz * (0.5 - q1q1 - q2q2) - mz);
            let s1 = two_q3 * (2.0 * q1q3 - two_q0q2 - ax)
                + two_q0 * (2.0 * q0q1 + two_q2q3 - ay)
                - 4.0 * q1 * (1.0 - 2.0 * q1q1 - 2.0 * q2q2 - az)
                + two_bz * q3 * (two_bx * (0.5 - q2q2 - q3q3) + two_bz * (q1q3 - q0q2) - mx)
                + (two_bx * q2 + two_bz * q0)
                    * (two_bx * (q1q2 - q0q3) + two_bz * (q0q1 + q2q3) - my)
                + (two_bx * q3 - four_bz * q1)
                    * (two_bx * (q0q2 + q1q3) + two_bz * (0.5 - q1q1 - q2q2) - mz);
            let s2 = -two_q0 * (2.0 * q1q3 - two_q0q2 - ax)
                + two_q3 * (2.0 * q0q1 + two_q2q3 - ay)
                - 4.0 * q2 * (1.0 - 2.0 * q1q1 - 2.0 * q2q2 - az)
                + (-four_bx * q2 - two_bz * q0)
                    * (two_bx * (0.5 - q2q2 - q3q3) + two_bz * (q1q3 - q0q2) - mx)
                + (two_bx * q1 + two_bz * q3)
                    * (two_bx * (q1q2 - q0q3) + two_bz * (q0q1 + q2q3) - my)
                + (two_bx * q0 - four_bz * q2)
                    * (two_bx * (q0q2 + q1q3) + two_bz * (0.5 - q1q1 - q2q2) - mz);
            let s3 = two_q1 * (2.0 * q1q3 - two_q0q2 - ax)
                + two_q2 * (2.0 * q0q1 + two_q2q3 - ay)
                + (-four_bx * q3 + two_bz * q1)
                    * (two_bx * (0.5 - q2q2 - q3q3) + two_bz * (q1q3 - q0q2) - mx)
                + (-two_bx * q0 + two_bz * q2)
                    * (two_bx * (q1q2 - q0q3) + two_bz * (q0q1 + q2q3) - my)
                + two_bx * q1 * (two_bx * (q0q2 + q1q3) + two_bz * (0.5 - q1q1 - q2q2) - mz);

            let mut grad = Quaternion(s0, s1, s2, s3);
            if grad != Quaternion::default() {
                grad.normalize();
                q_dot = q_dot - grad * self.params.gain;
            }
        }

        // integrate rate of change to yield quaternion
        self.state.quat = q + q_dot * self.coeffs.sample_ts;
        self.state.quat.normalize();
    }

    /// Returns the roll angle (rotation about the forward axis) in degrees, range ±180°.
    pub fn roll(&self) -> Float {
        let Quaternion(q0, q1, q2, q3) = self.state.quat;
        Math::<Float>::atan2(q0 * q1 + q2 * q3, 0.5 - q1 * q1 - q2 * q2) * RAD_TO_DEG
    }

    /// Returns the pitch angle (rotation about the lateral axis) in degrees, range ±90°.
    ///
    /// The Euler decomposition is singular at ±90° pitch (gimbal lock); accuracy of all three
    /// angles degrades in that neighbourhood.
    pub fn pitch(&self) -> Float {
        let Quaternion(q0, q1, q2, q3) = self.state.quat;
        Math::<Float>::asin(-2.0 * (q1 * q3 - q0 * q2)) * RAD_TO_DEG
    }

    /// Returns the yaw angle (rotation about the vertical axis) in degrees, range ±180°.
    pub fn yaw(&self) -> Float {
        let Quaternion(q0, q1, q2, q3) = self.state.quat;
        Math::<Float>::atan2(q1 * q2 + q0 * q3, 0.5 - q2 * q2 - q3 * q3) * RAD_TO_DEG
    }

    /// Returns the current orientation quaternion.
    pub fn quaternion(&self) -> Quaternion {
        self.state.quat
    }

    /// Overwrites the orientation quaternion, e.g. to re-seed the estimate from an external
    /// source. The caller must supply a unit quaternion.
    pub fn set_quaternion(&mut self, quat: Quaternion) {
        self.state.quat = quat;
    }

    /// Returns the algorithm gain β.
    pub fn gain(&self) -> Float {
        self.params.gain
    }

    /// Sets the algorithm gain β.
    ///
    /// For more details, see [`Params::gain`].
    pub fn set_gain(&mut self, gain: Float) {
        self.params.gain = gain;
    }

    /// Sets the sampling frequency in Hz and recomputes the integration step.
    ///
    /// The orientation state is left untouched, so the rate may be changed mid-stream.
    ///
    /// # Panics
    ///
    /// Panics if `sample_freq` is not positive.
    pub fn set_sample_frequency(&mut self, sample_freq: Float) {
        assert!(sample_freq > 0.0);
        self.coeffs.sample_freq = sample_freq;
        self.coeffs.sample_ts = 1.0 / sample_freq;
    }

    /// Returns the current parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Returns the coefficients used by the algorithm.
    pub fn coeffs(&self) -> &Coefficients {
        &self.coeffs
    }

    /// Returns the current state.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Gets the current state for modification.
    ///
    /// This method allows to set a completely arbitrary filter state and is intended for advanced
    /// usage such as external reset; the unit-norm invariant is the caller's responsibility.
    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    /// Resets the state to the identity orientation.
    ///
    /// Resetting the state is equivalent to creating a new instance of this struct.
    pub fn reset_state(&mut self) {
        self.state.quat = [1.0, 0.0, 0.0, 0.0].into();
    }

    fn setup(&mut self) {
        assert!(self.coeffs.sample_freq > 0.0);
        self.coeffs.sample_ts = 1.0 / self.coeffs.sample_freq;
        self.reset_state();
    }
}

impl Default for Madgwick {
    /// Creates a filter with a 512 Hz sampling frequency and the default [`Params`].
    fn default() -> Self {
        Self::new(512.0, None)
    }
}

#[cfg(test)]
mod tests {
    use crate::{inv_sqrt, Float, Madgwick, Params, Quaternion};

    fn rot_x(angle: Float) -> Quaternion {
        let half = angle / 2.0;
        Quaternion(half.cos(), half.sin(), 0.0, 0.0)
    }

    fn rot_y(angle: Float) -> Quaternion {
        let half = angle / 2.0;
        Quaternion(half.cos(), 0.0, half.sin(), 0.0)
    }

    fn rot_z(angle: Float) -> Quaternion {
        let half = angle / 2.0;
        Quaternion(half.cos(), 0.0, 0.0, half.sin())
    }

    fn assert_quat_eq(a: Quaternion, b: Quaternion) {
        assert!((a.0 - b.0).abs() < 1e-12);
        assert!((a.1 - b.1).abs() < 1e-12);
        assert!((a.2 - b.2).abs() < 1e-12);
        assert!((a.3 - b.3).abs() < 1e-12);
    }

    #[test]
    fn unit_norm_invariant() {
        let mut filter = Madgwick::new(256.0, None);
        for i in 0..1000 {
            let t = i as Float * 0.01;
            let gyr = [0.4 * t.sin(), 0.2 * t.cos(), -0.3];
            let acc = if i % 7 == 0 {
                [0.0; 3]
            } else {
                [0.02 * t.sin(), 0.01, 0.98]
            };
            let mag = if i % 11 == 0 { [0.0; 3] } else { [0.3, 0.05, -0.4] };
            filter.update(gyr, acc, mag);
            assert!((filter.quaternion().norm() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn level_attitude_is_a_fixed_point() {
        let mut filter = Madgwick::new(512.0, None);
        for _ in 0..50 {
            filter.update_imu([0.0; 3], [0.0, 0.0, 1.0]);
        }
        assert!(filter.roll().abs() < 1e-6);
        assert!(filter.pitch().abs() < 1e-6);
        assert!(filter.yaw().abs() < 1e-6);
    }

    #[test]
    fn gravity_correction_pulls_back_to_level() {
        let mut filter = Madgwick::new(512.0, None);
        filter.set_quaternion(rot_x((20.0 as Float).to_radians()));
        for _ in 0..5000 {
            filter.update_imu([0.0; 3], [0.0, 0.0, 1.0]);
        }
        assert!(filter.roll().abs() < 1.0);
        assert!(filter.pitch().abs() < 1.0);
    }

    #[test]
    fn zero_gain_reduces_to_gyro_integration() {
        let mut filter = Madgwick::new(100.0, Some(Params { gain: 0.0 }));
        for _ in 0..200 {
            filter.update([0.0, 0.0, 0.5], [0.1, -0.2, 0.9], [0.4, 0.1, -0.3]);
        }
        // 0.5 rad/s over 200 samples at 100 Hz: 1 rad about the vertical axis
        let expected = (1.0 as Float).to_degrees();
        assert!((filter.yaw() - expected).abs() < 0.01);
        assert!(filter.roll().abs() < 1e-6);
        assert!(filter.pitch().abs() < 1e-6);
        assert!((filter.quaternion().norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_accel_skips_the_corrective_step() {
        let mut corrected = Madgwick::new(128.0, None);
        let mut both_zero = Madgwick::new(128.0, None);
        let mut reference = Madgwick::new(128.0, Some(Params { gain: 0.0 }));
        let gyr = [0.1, -0.2, 0.3];
        for _ in 0..10 {
            corrected.update_imu(gyr, [0.0; 3]);
            both_zero.update(gyr, [0.0; 3], [0.0; 3]);
            reference.update_imu(gyr, [0.0, 0.0, 1.0]);
        }
        assert_quat_eq(corrected.quaternion(), reference.quaternion());
        assert_quat_eq(both_zero.quaternion(), reference.quaternion());
    }

    #[test]
    fn missing_mag_falls_back_to_imu_update() {
        let mut nine = Madgwick::new(512.0, None);
        let mut six = Madgwick::new(512.0, None);
        for i in 0..100 {
            let t = i as Float * 0.02;
            let gyr = [0.1 * t.sin(), 0.05, -0.2];
            let acc = [0.05, -0.02, 0.99];
            nine.update(gyr, acc, [0.0; 3]);
            six.update_imu(gyr, acc);
        }
        assert_quat_eq(nine.quaternion(), six.quaternion());
    }

    #[test]
    fn euler_angles_round_trip() {
        let mut filter = Madgwick::new(512.0, None);

        filter.set_quaternion(rot_x((30.0 as Float).to_radians()));
        assert!((filter.roll() - 30.0).abs() < 1e-4);
        assert!(filter.pitch().abs() < 1e-4);
        assert!(filter.yaw().abs() < 1e-4);

        filter.set_quaternion(rot_y((40.0 as Float).to_radians()));
        assert!((filter.pitch() - 40.0).abs() < 1e-4);
        assert!(filter.roll().abs() < 1e-4);
        assert!(filter.yaw().abs() < 1e-4);

        filter.set_quaternion(rot_z((45.0 as Float).to_radians()));
        assert!((filter.yaw() - 45.0).abs() < 1e-4);
        assert!(filter.roll().abs() < 1e-4);
        assert!(filter.pitch().abs() < 1e-4);
    }

    #[test]
    fn pitch_accuracy_near_gimbal_lock() {
        // The Euler decomposition loses a degree of freedom at pitch = ±90°; the accessors are
        // only expected to stay accurate up to the immediate neighbourhood of the singularity.
        let mut filter = Madgwick::new(512.0, None);
        filter.set_quaternion(rot_y((89.0 as Float).to_radians()));
        assert!((filter.pitch() - 89.0).abs() < 0.1);
    }

    #[test]
    fn heading_converges_with_magnetometer() {
        let mut filter = Madgwick::new(512.0, None);
        filter.set_quaternion(rot_z((30.0 as Float).to_radians()));
        // level body, field pointing north with a 45° downward dip
        let acc = [0.0, 0.0, 1.0];
        let mag = [0.5, 0.0, -0.5];
        for _ in 0..10_000 {
            filter.update([0.0; 3], acc, mag);
        }
        assert!(filter.yaw().abs() < 1.0);
        assert!(filter.roll().abs() < 1.0);
        assert!(filter.pitch().abs() < 1.0);
    }

    #[test]
    fn inv_sqrt_matches_reference() {
        for i in 1..=100 {
            let x = i as Float * 0.25;
            let reference = 1.0 / x.sqrt();
            assert!(((inv_sqrt(x) - reference) / reference).abs() < 2e-3);
        }
    }

    #[test]
    fn runtime_tuning_accessors() {
        let mut filter = Madgwick::default();
        assert!((filter.gain() - 0.1).abs() < 1e-12);
        assert!((filter.coeffs().sample_freq - 512.0).abs() < 1e-12);

        filter.set_gain(0.5);
        assert!((filter.params().gain - 0.5).abs() < 1e-12);

        filter.set_sample_frequency(100.0);
        assert!((filter.coeffs().sample_ts - 0.01).abs() < 1e-12);

        filter.state_mut().quat = Quaternion(0.0, 1.0, 0.0, 0.0);
        assert!((filter.roll().abs() - 180.0).abs() < 1e-4);

        filter.reset_state();
        assert_quat_eq(filter.quaternion(), Quaternion(1.0, 0.0, 0.0, 0.0));
    }
}
