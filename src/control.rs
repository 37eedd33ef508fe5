//! Tolerance and step-size control configuration
//!
//! Everything here is immutable for the duration of an integration run and
//! is validated once, when the driver is initialized.

use crate::tableau::EMBEDDED_ORDER;

/// Tolerance specification for error control
///
/// The per-component error scale is `atol[n] + rtol[n] * max(|y[n]|, |y8[n]|)`.
#[derive(Debug, Clone)]
pub struct Tolerances<const N: usize> {
    /// Absolute tolerance per component
    pub atol: [f64; N],
    /// Relative tolerance per component
    pub rtol: [f64; N],
}

impl<const N: usize> Tolerances<N> {
    /// Create tolerances with uniform values
    pub fn new(atol: f64, rtol: f64) -> Self {
        Self {
            atol: [atol; N],
            rtol: [rtol; N],
        }
    }

    /// Create tolerances with per-component values
    pub fn with_components(atol: [f64; N], rtol: [f64; N]) -> Self {
        Self { atol, rtol }
    }
}

/// How the per-component normalized errors reduce to one scalar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorNorm {
    /// Infinity norm: the largest normalized component error
    #[default]
    Max,
    /// Root-mean-square over the components
    Rms,
}

/// Step-size controller using an I-controller
///
/// `h_new = h * clamp(safety * E^(-1/(p+1)), min_factor, max_factor)`
/// with p = 7, the order of the embedded solution.
#[derive(Debug, Clone)]
pub struct StepController {
    /// Safety factor (0.8-0.9 typical)
    pub safety: f64,
    /// Maximum growth factor per step
    pub max_factor: f64,
    /// Minimum reduction factor per step
    pub min_factor: f64,
}

impl Default for StepController {
    fn default() -> Self {
        Self {
            safety: 0.9,
            max_factor: 5.0,
            min_factor: 0.2,
        }
    }
}

impl StepController {
    /// Compute the step-size adjustment factor for a normalized error.
    ///
    /// With `safety < 1` and `min_factor < 1`, the factor is strictly below
    /// 1 whenever `error > 1`, so every rejection shrinks the step.
    pub fn compute_factor(&self, error: f64) -> f64 {
        if error == 0.0 {
            return self.max_factor;
        }

        let exponent = 1.0 / f64::from(EMBEDDED_ORDER + 1);
        let factor = self.safety * error.powf(-exponent);
        factor.clamp(self.min_factor, self.max_factor)
    }
}

/// Full run configuration: tolerances, norm, controller, and step bounds.
#[derive(Debug, Clone)]
pub struct Control<const N: usize> {
    /// Error tolerances
    pub tol: Tolerances<N>,
    /// Error norm used to reduce component errors to one scalar
    pub norm: ErrorNorm,
    /// Step-size controller parameters
    pub controller: StepController,
    /// Minimum step-size magnitude; falling to it after a rejection is fatal
    pub h_min: f64,
    /// Maximum step-size magnitude
    pub h_max: f64,
    /// Rejected attempts allowed per step before the run fails
    pub max_rejections: u32,
    /// Committed-step budget per `integrate` call
    pub max_steps: u64,
}

impl<const N: usize> Control<N> {
    /// Configuration with the given tolerances and default control settings.
    pub fn new(tol: Tolerances<N>) -> Self {
        Self {
            tol,
            norm: ErrorNorm::default(),
            controller: StepController::default(),
            h_min: 1e-14,
            h_max: f64::INFINITY,
            max_rejections: 20,
            max_steps: 10_000_000,
        }
    }

    /// Set minimum and maximum step-size magnitudes.
    pub fn with_step_limits(mut self, h_min: f64, h_max: f64) -> Self {
        self.h_min = h_min;
        self.h_max = h_max;
        self
    }

    /// Set the error norm.
    pub fn with_norm(mut self, norm: ErrorNorm) -> Self {
        self.norm = norm;
        self
    }
}
