//! Adaptive Runge-Kutta-Fehlberg 7(8) driver
//!
//! A 13-stage embedded RK7(8) pair with dual-order solution construction,
//! scaled error estimation and adaptive step-size control. The driver is a
//! small state machine: each call attempts a step, accepts or rejects it
//! against the error estimate, and either commits the eighth-order solution
//! or retries from the same state with a strictly smaller step.
//!
//! Reference: NASA TR R-287, Erwin Fehlberg, 1968

use crate::control::{Control, ErrorNorm};
use crate::tableau::{Tableau, TableauVariant, STAGES};

/// System of ordinary differential equations: dy/dt = f(t, y)
///
/// The derivative function is the only externally supplied operation and is
/// assumed to dominate the cost of a step; it is called exactly 13 times per
/// attempted step, never more. It may fail with a domain error (for example
/// when the state leaves the region where the physics is defined); such a
/// failure is fatal to the run and leaves the driver at its last committed
/// state.
pub trait OdeSystem<const N: usize> {
    /// Evaluate the right-hand side of the ODE system.
    ///
    /// # Arguments
    /// * `t` - Current time
    /// * `y` - Current state vector
    /// * `dydt` - Output: derivative dy/dt
    fn rhs(&self, t: f64, y: &[f64; N], dydt: &mut [f64; N]) -> Result<(), RhsError>;
}

/// Domain error raised by a derivative function.
#[derive(Debug, Clone)]
pub struct RhsError {
    message: String,
}

impl RhsError {
    /// Create a derivative-function error with a description of the failure.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RhsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RhsError {}

/// Driver status after the most recent transition.
///
/// `Done` and `Failed` are terminal; a finished driver is restarted by
/// initializing a fresh one. The conceptual pre-initialization "idle" state
/// has no runtime representation: [`Rkf78::initialize`] constructs the
/// driver directly in `Stepping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Initialized and ready to attempt the next step
    Stepping,
    /// The most recent attempt was accepted and committed
    Accepted,
    /// The most recent attempt was rejected; the retry uses a smaller step
    Rejected,
    /// The integration interval has been covered
    Done,
    /// A fatal error occurred; `(t, y)` hold the last committed state
    Failed,
}

/// One committed integration step.
#[derive(Debug, Clone)]
pub struct StepResult<const N: usize> {
    /// Time after the step
    pub t: f64,
    /// State after the step (eighth-order solution)
    pub y: [f64; N],
    /// Step size actually taken (signed)
    pub h: f64,
    /// Driver status after the commit (`Accepted`, or `Done` at the endpoint)
    pub status: Status,
}

/// Integration statistics for diagnostics
#[derive(Debug, Clone, Default)]
pub struct Stats {
    /// Total number of derivative-function evaluations
    pub fn_evals: u64,
    /// Number of accepted (committed) steps
    pub accepted_steps: u64,
    /// Number of rejected attempts
    pub rejected_steps: u64,
}

/// Errors that can occur during initialization or integration
#[derive(Debug, Clone)]
pub enum IntegrationError {
    /// The derivative function failed or produced a non-finite component
    DerivativeFailure {
        /// Stage time at which the evaluation failed
        t: f64,
        /// Description of the failure
        message: String,
    },
    /// The step size fell to the minimum after the allowed rejection retries
    StepSizeUnderflow {
        /// Last committed time
        t: f64,
        /// Step size that was too small
        h: f64,
    },
    /// Invalid tolerance configuration, rejected before any stepping
    ToleranceMisconfiguration {
        /// Description of the invalid configuration
        message: String,
    },
    /// Invalid non-tolerance input, rejected before any stepping
    InvalidInput {
        /// Description of the invalid input
        message: String,
    },
    /// The per-call step budget was exhausted
    MaxStepsExceeded,
}

impl std::fmt::Display for IntegrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrationError::DerivativeFailure { t, message } => {
                write!(f, "Derivative evaluation failed at t = {}: {}", t, message)
            }
            IntegrationError::StepSizeUnderflow { t, h } => {
                write!(f, "Step size {} underflowed at t = {}", h, t)
            }
            IntegrationError::ToleranceMisconfiguration { message } => {
                write!(f, "Tolerance misconfiguration: {}", message)
            }
            IntegrationError::InvalidInput { message } => {
                write!(f, "Invalid input: {}", message)
            }
            IntegrationError::MaxStepsExceeded => {
                write!(f, "Maximum number of integration steps exceeded")
            }
        }
    }
}

impl std::error::Error for IntegrationError {}

/// Adaptive Runge-Kutta-Fehlberg 7(8) driver
///
/// Owns the run state `(t, y, h)`, which is mutated only when a step
/// commits; rejected attempts and fatal errors leave it untouched. The
/// tableau constants are shared immutable data, so independent drivers may
/// run concurrently without synchronization.
///
/// # Type Parameters
/// * `N` - Dimension of the state vector
///
/// # Example
/// ```
/// use fehlberg78::{Control, OdeSystem, RhsError, Rkf78, TableauVariant, Tolerances};
///
/// struct ExpDecay;
///
/// impl OdeSystem<1> for ExpDecay {
///     fn rhs(&self, _t: f64, y: &[f64; 1], dydt: &mut [f64; 1]) -> Result<(), RhsError> {
///         dydt[0] = -y[0];
///         Ok(())
///     }
/// }
///
/// let control = Control::new(Tolerances::new(1e-12, 1e-12));
/// let mut driver =
///     Rkf78::initialize(0.0, &[1.0], 0.1, control, TableauVariant::Standard).unwrap();
///
/// for step in driver.integrate(&ExpDecay, 1.0) {
///     let step = step.unwrap();
///     println!("t = {:.6}  y = {:.12}", step.t, step.y[0]);
/// }
/// assert!((driver.y()[0] - (-1.0f64).exp()).abs() < 1e-10);
/// ```
#[derive(Debug, Clone)]
pub struct Rkf78<const N: usize> {
    control: Control<N>,
    tableau: &'static Tableau,
    /// Stage derivatives, pre-allocated workspace; contents are ephemeral
    /// per attempted step
    k: [[f64; N]; STAGES],
    t: f64,
    y: [f64; N],
    h: f64,
    status: Status,
    /// Rejections for the step currently being attempted
    rejections: u32,
    stats: Stats,
}

impl<const N: usize> Rkf78<N> {
    /// Set up a run at `(t0, y0)` with initial step size `h0`.
    ///
    /// `h0`'s sign selects the integration direction; its magnitude is
    /// clamped into the configured `[h_min, h_max]` range. Fails with
    /// [`IntegrationError::ToleranceMisconfiguration`] if any tolerance
    /// component is negative or non-finite, or both tolerances are zero for
    /// a component, and with [`IntegrationError::InvalidInput`] for
    /// non-finite initial data or a zero `h0`. No stepping happens until
    /// [`step_once`](Self::step_once) or [`integrate`](Self::integrate).
    pub fn initialize(
        t0: f64,
        y0: &[f64; N],
        h0: f64,
        control: Control<N>,
        variant: TableauVariant,
    ) -> Result<Self, IntegrationError> {
        for n in 0..N {
            let (a, r) = (control.tol.atol[n], control.tol.rtol[n]);
            if !a.is_finite() || !r.is_finite() || a < 0.0 || r < 0.0 {
                return Err(IntegrationError::ToleranceMisconfiguration {
                    message: format!(
                        "atol[{n}] = {a} and rtol[{n}] = {r} must be finite and non-negative"
                    ),
                });
            }
            if a == 0.0 && r == 0.0 {
                return Err(IntegrationError::ToleranceMisconfiguration {
                    message: format!("atol[{n}] and rtol[{n}] are both zero"),
                });
            }
        }
        if !(control.h_min.is_finite() && control.h_min > 0.0) || control.h_max <= control.h_min {
            return Err(IntegrationError::InvalidInput {
                message: "step limits must satisfy 0 < h_min < h_max".to_string(),
            });
        }
        let ctl = &control.controller;
        if !(ctl.safety > 0.0 && ctl.safety <= 1.0)
            || !(ctl.min_factor > 0.0 && ctl.min_factor < 1.0)
            || ctl.max_factor < 1.0
        {
            return Err(IntegrationError::InvalidInput {
                message: "controller factors must satisfy 0 < safety <= 1, \
                          0 < min_factor < 1 <= max_factor"
                    .to_string(),
            });
        }
        if !t0.is_finite() {
            return Err(IntegrationError::InvalidInput {
                message: "t0 must be finite".to_string(),
            });
        }
        for (n, &v) in y0.iter().enumerate() {
            if !v.is_finite() {
                return Err(IntegrationError::InvalidInput {
                    message: format!("y0[{}] is not finite", n),
                });
            }
        }
        if !h0.is_finite() || h0 == 0.0 {
            return Err(IntegrationError::InvalidInput {
                message: "h0 must be finite and non-zero".to_string(),
            });
        }

        let h = h0.signum() * h0.abs().clamp(control.h_min, control.h_max);
        Ok(Self {
            control,
            tableau: variant.tableau(),
            k: [[0.0; N]; STAGES],
            t: t0,
            y: *y0,
            h,
            status: Status::Stepping,
            rejections: 0,
            stats: Stats::default(),
        })
    }

    /// Current time (last committed)
    pub fn t(&self) -> f64 {
        self.t
    }

    /// Current state vector (last committed)
    pub fn y(&self) -> &[f64; N] {
        &self.y
    }

    /// Step size proposed for the next attempt (signed)
    pub fn h(&self) -> f64 {
        self.h
    }

    /// Current driver status
    pub fn status(&self) -> Status {
        self.status
    }

    /// Integration statistics so far
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Advance exactly one committed step.
    ///
    /// Attempts are retried with a shrinking step while the error estimate
    /// exceeds 1, bounded by the configured rejection budget; exhausting it,
    /// or pinning the step at `h_min`, fails the run with
    /// [`IntegrationError::StepSizeUnderflow`]. On any failure `(t, y)`
    /// keep their last committed values for diagnostics.
    pub fn step_once<S: OdeSystem<N>>(
        &mut self,
        sys: &S,
    ) -> Result<StepResult<N>, IntegrationError> {
        match self.status {
            Status::Done | Status::Failed => Err(IntegrationError::InvalidInput {
                message: "driver has already finished; initialize a new run".to_string(),
            }),
            _ => self.advance(sys, None),
        }
    }

    /// Integrate towards `t_end`, yielding one [`StepResult`] per committed
    /// step.
    ///
    /// The sequence is lazy and finite: the last step is clamped to land on
    /// `t_end`, an already-covered interval (including `t_end == t`) yields
    /// nothing and moves the driver straight to `Done`, and the iterator is
    /// fused after a terminal state. Dropping it between steps is safe; the
    /// driver stays at its last committed state and a later `integrate`
    /// call resumes from there. A run that has reached `Done` or `Failed`
    /// is restarted only by initializing a new driver.
    ///
    /// A non-finite `t_end` fails the run with
    /// [`IntegrationError::InvalidInput`] on the first iteration, before
    /// any stepping.
    pub fn integrate<'a, S: OdeSystem<N>>(&'a mut self, sys: &'a S, t_end: f64) -> Steps<'a, S, N> {
        // Align the step direction with the target.
        if t_end.is_finite() && t_end != self.t && (t_end - self.t).signum() != self.h.signum() {
            self.h = -self.h;
        }
        Steps {
            driver: self,
            sys,
            t_end,
            steps_taken: 0,
        }
    }

    /// Attempt one step and commit it if accepted; retry on rejection.
    fn advance<S: OdeSystem<N>>(
        &mut self,
        sys: &S,
        t_end: Option<f64>,
    ) -> Result<StepResult<N>, IntegrationError> {
        self.status = Status::Stepping;
        loop {
            let dir = self.h.signum();
            let mut h = self.h;
            // Don't overshoot the endpoint
            if let Some(te) = t_end {
                if (self.t + h - te) * dir > 0.0 {
                    h = te - self.t;
                }
            }

            let y = self.y;
            let (y8, y7) = match self.attempt_step(sys, self.t, &y, h) {
                Ok(pair) => pair,
                Err(e) => {
                    self.status = Status::Failed;
                    return Err(e);
                }
            };

            let error = self.estimate_error(&y, &y8, &y7);
            let factor = self.control.controller.compute_factor(error);
            let h_next = (h.abs() * factor).clamp(self.control.h_min, self.control.h_max);

            if error <= 1.0 {
                self.t += h;
                self.y = y8;
                self.h = h_next * dir;
                self.rejections = 0;
                self.stats.accepted_steps += 1;
                self.status = match t_end {
                    Some(te) if (te - self.t) * dir <= self.control.h_min => Status::Done,
                    _ => Status::Accepted,
                };
                return Ok(StepResult {
                    t: self.t,
                    y: self.y,
                    h,
                    status: self.status,
                });
            }

            // Rejection: (t, y) are untouched and the retry step is
            // strictly smaller unless it has hit h_min, which is fatal.
            self.stats.rejected_steps += 1;
            self.rejections += 1;
            self.status = Status::Rejected;
            if self.rejections > self.control.max_rejections || h_next <= self.control.h_min {
                self.status = Status::Failed;
                return Err(IntegrationError::StepSizeUnderflow {
                    t: self.t,
                    h: h_next,
                });
            }
            self.h = h_next * dir;
        }
    }

    /// Compute all 13 stages in index order and form both embedded
    /// solutions. Depends only on the arguments and the tableau, using
    /// `self.k` as scratch space.
    #[allow(clippy::needless_range_loop)]
    fn attempt_step<S: OdeSystem<N>>(
        &mut self,
        sys: &S,
        t: f64,
        y: &[f64; N],
        h: f64,
    ) -> Result<([f64; N], [f64; N]), IntegrationError> {
        // Strict lower triangularity of `a` guarantees each stage depends
        // only on already-computed ones; one forward pass suffices.
        for i in 0..STAGES {
            self.evaluate_stage(sys, i, t, y, h)?;
        }

        let mut y8 = [0.0; N];
        let mut y7 = [0.0; N];
        for n in 0..N {
            let mut sum8 = 0.0;
            for i in 0..STAGES {
                sum8 += self.tableau.b8[i] * self.k[i][n];
            }
            y8[n] = y[n] + h * sum8;
        }
        match &self.tableau.b7 {
            // Standard transcription: separately tabulated weights.
            Some(b7) => {
                for n in 0..N {
                    let mut sum7 = 0.0;
                    for i in 0..STAGES {
                        sum7 += b7[i] * self.k[i][n];
                    }
                    y7[n] = y[n] + h * sum7;
                }
            }
            // Abbreviated transcription: reconstruct from the committed
            // solution and the truncation-error combination.
            None => {
                for n in 0..N {
                    let mut te = 0.0;
                    for i in 0..STAGES {
                        te += self.tableau.te[i] * self.k[i][n];
                    }
                    y7[n] = y8[n] - h * te;
                }
            }
        }
        Ok((y8, y7))
    }

    /// Evaluate stage `i`, writing `k[i]`. Exactly one derivative call.
    #[allow(clippy::needless_range_loop)]
    fn evaluate_stage<S: OdeSystem<N>>(
        &mut self,
        sys: &S,
        i: usize,
        t: f64,
        y: &[f64; N],
        h: f64,
    ) -> Result<(), IntegrationError> {
        let mut y_stage = *y;
        if i > 0 {
            // y_stage = y + h * sum_{j<i} a[i][j] * k[j]
            for n in 0..N {
                let mut sum = 0.0;
                for j in 0..i {
                    sum += self.tableau.a[i][j] * self.k[j][n];
                }
                y_stage[n] = y[n] + h * sum;
            }
        }

        let t_stage = t + self.tableau.c[i] * h;
        sys.rhs(t_stage, &y_stage, &mut self.k[i]).map_err(|e| {
            IntegrationError::DerivativeFailure {
                t: t_stage,
                message: e.to_string(),
            }
        })?;
        self.stats.fn_evals += 1;

        if !self.k[i].iter().all(|v| v.is_finite()) {
            return Err(IntegrationError::DerivativeFailure {
                t: t_stage,
                message: "derivative produced a non-finite component".to_string(),
            });
        }
        Ok(())
    }

    /// Reduce the two embedded solutions to one scaled error scalar.
    ///
    /// Per component: `e = |y8 - y7|`, `scale = atol + rtol * max(|y|, |y8|)`,
    /// `r = e / scale` (zero error stays zero even against a zero scale).
    /// A non-finite solution component maps to an infinite error, which the
    /// controller turns into a maximal shrink.
    fn estimate_error(&self, y: &[f64; N], y8: &[f64; N], y7: &[f64; N]) -> f64 {
        if N == 0 {
            return 0.0;
        }

        let mut max_err: f64 = 0.0;
        let mut sum_sq = 0.0;
        for n in 0..N {
            if !y8[n].is_finite() || !y7[n].is_finite() {
                return f64::INFINITY;
            }
            let e = (y8[n] - y7[n]).abs();
            let scale =
                self.control.tol.atol[n] + self.control.tol.rtol[n] * y[n].abs().max(y8[n].abs());
            let r = if e == 0.0 { 0.0 } else { e / scale };
            max_err = max_err.max(r);
            sum_sq += r * r;
        }

        match self.control.norm {
            ErrorNorm::Max => max_err,
            ErrorNorm::Rms => (sum_sq / N as f64).sqrt(),
        }
    }
}

/// Lazy sequence of committed steps produced by [`Rkf78::integrate`].
///
/// Yields `Ok(StepResult)` per committed step, a single `Err` on a fatal
/// condition, then `None` forever. Cancellation is a matter of dropping the
/// iterator; it only ever stops between committed steps, so the driver is
/// always left in a consistent, resumable condition.
pub struct Steps<'a, S, const N: usize> {
    driver: &'a mut Rkf78<N>,
    sys: &'a S,
    t_end: f64,
    steps_taken: u64,
}

impl<S: OdeSystem<N>, const N: usize> Iterator for Steps<'_, S, N> {
    type Item = Result<StepResult<N>, IntegrationError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.driver.status {
            Status::Done | Status::Failed => return None,
            _ => {}
        }

        // NaN would defeat every endpoint comparison below.
        if !self.t_end.is_finite() {
            self.driver.status = Status::Failed;
            return Some(Err(IntegrationError::InvalidInput {
                message: "t_end must be finite".to_string(),
            }));
        }

        if (self.t_end - self.driver.t).abs() <= self.driver.control.h_min {
            self.driver.status = Status::Done;
            return None;
        }

        if self.steps_taken >= self.driver.control.max_steps {
            self.driver.status = Status::Failed;
            return Some(Err(IntegrationError::MaxStepsExceeded));
        }
        self.steps_taken += 1;

        Some(self.driver.advance(self.sys, Some(self.t_end)))
    }
}

impl<S: OdeSystem<N>, const N: usize> std::iter::FusedIterator for Steps<'_, S, N> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{StepController, Tolerances};
    use approx::assert_relative_eq;

    /// y' = -y, exact solution y = exp(-t)
    struct ExpDecay;

    impl OdeSystem<1> for ExpDecay {
        fn rhs(&self, _t: f64, y: &[f64; 1], dydt: &mut [f64; 1]) -> Result<(), RhsError> {
            dydt[0] = -y[0];
            Ok(())
        }
    }

    /// Harmonic oscillator y'' + ω²y = 0, state [y, y']
    struct HarmonicOscillator {
        omega: f64,
    }

    impl OdeSystem<2> for HarmonicOscillator {
        fn rhs(&self, _t: f64, y: &[f64; 2], dydt: &mut [f64; 2]) -> Result<(), RhsError> {
            dydt[0] = y[1];
            dydt[1] = -self.omega * self.omega * y[0];
            Ok(())
        }
    }

    fn driver_1d(t0: f64, y0: f64, h0: f64) -> Rkf78<1> {
        let control = Control::new(Tolerances::new(1e-12, 1e-12));
        Rkf78::initialize(t0, &[y0], h0, control, TableauVariant::Standard).unwrap()
    }

    #[test]
    fn test_single_step_eighth_order_accuracy() {
        let mut driver = driver_1d(0.0, 1.0, 0.1);
        let step = driver.step_once(&ExpDecay).unwrap();

        assert_eq!(step.status, Status::Accepted);
        assert_eq!(step.h, 0.1, "first attempt should be accepted as-is");
        assert!(
            (step.y[0] - (-0.1f64).exp()).abs() < 1e-9,
            "y = {:.15}, expected exp(-0.1)",
            step.y[0]
        );
        assert_eq!(driver.stats().rejected_steps, 0);
        assert_eq!(driver.stats().fn_evals, STAGES as u64);
    }

    #[test]
    fn test_step_splitting_consistency() {
        // One step of size h vs two of h/2 over the same interval.
        let mut driver = driver_1d(0.0, 1.0, 0.1);
        let (y_full, _) = driver.attempt_step(&ExpDecay, 0.0, &[1.0], 0.1).unwrap();
        let (y_half, _) = driver.attempt_step(&ExpDecay, 0.0, &[1.0], 0.05).unwrap();
        let (y_two, _) = driver.attempt_step(&ExpDecay, 0.05, &y_half, 0.05).unwrap();

        assert!(
            (y_two[0] - y_full[0]).abs() < 1e-12,
            "split-step mismatch: {:.3e}",
            (y_two[0] - y_full[0]).abs()
        );
    }

    #[test]
    fn test_error_monotone_in_h() {
        let control = Control::new(Tolerances::new(1e-10, 1e-10));
        let mut driver =
            Rkf78::initialize(0.0, &[1.0], 0.1, control, TableauVariant::Standard).unwrap();

        let mut prev = f64::INFINITY;
        for &h in &[0.8, 0.4, 0.2, 0.1] {
            let (y8, y7) = driver.attempt_step(&ExpDecay, 0.0, &[1.0], h).unwrap();
            let e = driver.estimate_error(&[1.0], &y8, &y7);
            assert!(
                e <= prev,
                "error must not increase as h decreases: E({}) = {:.3e} > {:.3e}",
                h,
                e,
                prev
            );
            prev = e;
        }
    }

    #[test]
    fn test_rejection_shrinks_step_then_accepts() {
        // h0 = 10 is absurdly large; the first attempts must be rejected
        // and the committed step must be strictly smaller.
        let mut driver = driver_1d(0.0, 1.0, 10.0);
        let step = driver.step_once(&ExpDecay).unwrap();

        assert!(driver.stats().rejected_steps >= 1);
        assert!(step.h < 10.0);
        assert_eq!(step.status, Status::Accepted);
        assert!((step.y[0] - (-step.t).exp()).abs() < 1e-9);
        assert_eq!(
            driver.stats().fn_evals,
            STAGES as u64 * (driver.stats().accepted_steps + driver.stats().rejected_steps)
        );
    }

    #[test]
    fn test_rejection_budget_exhaustion_preserves_state() {
        let mut control = Control::new(Tolerances::new(1e-12, 1e-12));
        control.max_rejections = 2;
        let mut driver =
            Rkf78::initialize(0.0, &[1.0], 10.0, control, TableauVariant::Standard).unwrap();

        let result = driver.step_once(&ExpDecay);
        assert!(
            matches!(result, Err(IntegrationError::StepSizeUnderflow { .. })),
            "expected StepSizeUnderflow, got {:?}",
            result
        );
        assert_eq!(driver.status(), Status::Failed);
        // Bit-identical: no commit ever happened.
        assert_eq!(driver.t(), 0.0);
        assert_eq!(driver.y()[0], 1.0);
        assert_eq!(driver.stats().rejected_steps, 3);
        assert_eq!(driver.stats().accepted_steps, 0);
    }

    #[test]
    fn test_underflow_when_pinned_at_h_min() {
        let mut control = Control::new(Tolerances::new(1e-12, 1e-12));
        control.h_min = 1.0; // every rejection lands on h_min immediately
        let mut driver =
            Rkf78::initialize(0.0, &[1.0], 10.0, control, TableauVariant::Standard).unwrap();

        let result = driver.step_once(&ExpDecay);
        assert!(matches!(
            result,
            Err(IntegrationError::StepSizeUnderflow { .. })
        ));
        assert_eq!(driver.status(), Status::Failed);
    }

    #[test]
    fn test_integrate_zero_length_is_empty_and_done() {
        let mut driver = driver_1d(5.0, 42.0, 0.1);
        let steps: Vec<_> = driver.integrate(&ExpDecay, 5.0).collect();

        assert!(steps.is_empty());
        assert_eq!(driver.status(), Status::Done);
        assert_eq!(driver.t(), 5.0);
        assert_eq!(driver.y()[0], 42.0);
        assert_eq!(driver.stats().fn_evals, 0);
    }

    #[test]
    fn test_integrate_reaches_endpoint() {
        let mut driver = driver_1d(0.0, 1.0, 0.1);
        let mut count = 0u64;
        let mut t_prev = 0.0;
        for step in driver.integrate(&ExpDecay, 1.0) {
            let step = step.unwrap();
            assert!(step.t > t_prev, "time must advance monotonically");
            t_prev = step.t;
            count += 1;
        }
        assert_eq!(driver.status(), Status::Done);
        assert_eq!(count, driver.stats().accepted_steps);
        assert!((driver.t() - 1.0).abs() < 1e-9);
        assert!(
            (driver.y()[0] - (-1.0f64).exp()).abs() < 1e-10,
            "y(1) = {:.15}",
            driver.y()[0]
        );
    }

    #[test]
    fn test_tableau_variants_agree() {
        let run = |variant: TableauVariant| {
            let control = Control::new(Tolerances::new(1e-12, 1e-12));
            let mut driver = Rkf78::initialize(0.0, &[1.0], 0.1, control, variant).unwrap();
            for step in driver.integrate(&ExpDecay, 1.0) {
                step.unwrap();
            }
            driver.y()[0]
        };

        let y_std = run(TableauVariant::Standard);
        let y_abb = run(TableauVariant::Abbreviated);
        assert!(
            (y_std - y_abb).abs() < 1e-10,
            "variants diverged: {:.3e}",
            (y_std - y_abb).abs()
        );
    }

    #[test]
    fn test_abbreviated_reconstruction_matches_tabulated_weights() {
        // The stages are shared; the seventh-order solution comes from
        // tabulated weights on one path and from the truncation-error
        // reconstruction on the other. The committed solution is the same
        // computation either way; the error paths must agree to roundoff.
        let mk = |variant| {
            let control = Control::new(Tolerances::new(1e-12, 1e-12));
            Rkf78::initialize(0.0, &[1.0], 0.1, control, variant).unwrap()
        };
        let mut std_drv = mk(TableauVariant::Standard);
        let mut abb_drv = mk(TableauVariant::Abbreviated);

        let (y8_s, y7_s) = std_drv.attempt_step(&ExpDecay, 0.0, &[1.0], 0.1).unwrap();
        let (y8_a, y7_a) = abb_drv.attempt_step(&ExpDecay, 0.0, &[1.0], 0.1).unwrap();

        assert_eq!(y8_s[0], y8_a[0], "eighth-order path is shared");
        assert!(
            (y7_s[0] - y7_a[0]).abs() < 1e-13,
            "seventh-order constructions differ beyond roundoff: {:.3e}",
            (y7_s[0] - y7_a[0]).abs()
        );
    }

    #[test]
    fn test_non_finite_t_end_rejected() {
        let mut driver = driver_1d(0.0, 1.0, 0.1);
        {
            let mut steps = driver.integrate(&ExpDecay, f64::NAN);
            assert!(matches!(
                steps.next(),
                Some(Err(IntegrationError::InvalidInput { .. }))
            ));
            assert!(steps.next().is_none(), "iterator must be fused after the error");
        }
        assert_eq!(driver.status(), Status::Failed);
        assert_eq!(driver.t(), 0.0);
        assert_eq!(driver.y()[0], 1.0);
        assert_eq!(driver.stats().fn_evals, 0, "no stepping may happen");

        let mut driver = driver_1d(0.0, 1.0, 0.1);
        let first = driver.integrate(&ExpDecay, f64::INFINITY).next();
        assert!(matches!(
            first,
            Some(Err(IntegrationError::InvalidInput { .. }))
        ));
    }

    #[test]
    fn test_harmonic_oscillator_period() {
        let sys = HarmonicOscillator { omega: 1.0 };
        let tf = 2.0 * std::f64::consts::PI;
        let control = Control::new(Tolerances::new(1e-12, 1e-12));
        let mut driver =
            Rkf78::initialize(0.0, &[1.0, 0.0], 0.1, control, TableauVariant::Standard).unwrap();

        for step in driver.integrate(&sys, tf) {
            step.unwrap();
        }

        // Should return to initial conditions after one period
        assert_eq!(driver.status(), Status::Done);
        assert!((driver.t() - tf).abs() < 1e-9);
        assert!(
            (driver.y()[0] - 1.0).abs() < 1e-10,
            "y(2π) = {}, expected 1.0",
            driver.y()[0]
        );
        assert!(
            driver.y()[1].abs() < 1e-10,
            "y'(2π) = {}, expected 0.0",
            driver.y()[1]
        );
    }

    #[test]
    fn test_backward_integration() {
        // Integrate the oscillator backward from 2π to 0.
        let sys = HarmonicOscillator { omega: 1.0 };
        let tf = 2.0 * std::f64::consts::PI;
        let control = Control::new(Tolerances::new(1e-12, 1e-12));
        let mut driver =
            Rkf78::initialize(tf, &[1.0, 0.0], -0.1, control, TableauVariant::Standard).unwrap();

        for step in driver.integrate(&sys, 0.0) {
            let step = step.unwrap();
            assert!(step.h < 0.0, "backward steps must be negative");
        }

        assert!(driver.t().abs() < 1e-9);
        assert!((driver.y()[0] - 1.0).abs() < 1e-10);
        assert!(driver.y()[1].abs() < 1e-10);
    }

    #[test]
    fn test_tolerance_misconfiguration_rejected() {
        let check = |atol: f64, rtol: f64| {
            let control = Control::new(Tolerances::<1>::new(atol, rtol));
            Rkf78::initialize(0.0, &[1.0], 0.1, control, TableauVariant::Standard)
        };

        for bad in [
            check(0.0, 0.0),
            check(-1e-12, 1e-12),
            check(1e-12, -1e-12),
            check(f64::NAN, 1e-12),
            check(f64::INFINITY, 1e-12),
        ] {
            assert!(matches!(
                bad,
                Err(IntegrationError::ToleranceMisconfiguration { .. })
            ));
        }

        // Only one of the pair needs to be positive.
        assert!(check(0.0, 1e-12).is_ok());
        assert!(check(1e-12, 0.0).is_ok());
    }

    #[test]
    fn test_invalid_input_rejected() {
        let control = || Control::new(Tolerances::<1>::new(1e-12, 1e-12));
        let std = TableauVariant::Standard;

        assert!(matches!(
            Rkf78::initialize(0.0, &[1.0], 0.0, control(), std),
            Err(IntegrationError::InvalidInput { .. })
        ));
        assert!(matches!(
            Rkf78::initialize(0.0, &[f64::NAN], 0.1, control(), std),
            Err(IntegrationError::InvalidInput { .. })
        ));
        assert!(matches!(
            Rkf78::initialize(f64::INFINITY, &[1.0], 0.1, control(), std),
            Err(IntegrationError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_derivative_failure_on_first_step() {
        struct AlwaysFails;
        impl OdeSystem<1> for AlwaysFails {
            fn rhs(&self, _t: f64, _y: &[f64; 1], _dydt: &mut [f64; 1]) -> Result<(), RhsError> {
                Err(RhsError::new("state outside valid domain"))
            }
        }

        let mut driver = driver_1d(0.0, 1.0, 0.1);
        let result = driver.step_once(&AlwaysFails);

        assert!(matches!(
            result,
            Err(IntegrationError::DerivativeFailure { .. })
        ));
        assert_eq!(driver.status(), Status::Failed);
        assert_eq!(driver.t(), 0.0);
        assert_eq!(driver.y()[0], 1.0);
    }

    #[test]
    fn test_derivative_failure_preserves_committed_state() {
        // Domain boundary at y = 0.5; exp decay crosses it at t = ln 2.
        struct Bounded;
        impl OdeSystem<1> for Bounded {
            fn rhs(&self, _t: f64, y: &[f64; 1], dydt: &mut [f64; 1]) -> Result<(), RhsError> {
                if y[0] < 0.5 {
                    return Err(RhsError::new("y fell below 0.5"));
                }
                dydt[0] = -y[0];
                Ok(())
            }
        }

        let mut driver = driver_1d(0.0, 1.0, 0.1);
        let mut saw_failure = false;
        for step in driver.integrate(&Bounded, 2.0) {
            if let Err(e) = step {
                assert!(matches!(e, IntegrationError::DerivativeFailure { .. }));
                saw_failure = true;
            }
        }

        assert!(saw_failure);
        assert_eq!(driver.status(), Status::Failed);
        // Last committed state is consistent and inside the domain.
        assert!(driver.y()[0] >= 0.5);
        assert!(driver.t() < 2.0);
        assert!((driver.y()[0] - (-driver.t()).exp()).abs() < 1e-9);
    }

    #[test]
    fn test_nonfinite_derivative_is_failure() {
        struct NanRhs;
        impl OdeSystem<1> for NanRhs {
            fn rhs(&self, _t: f64, _y: &[f64; 1], dydt: &mut [f64; 1]) -> Result<(), RhsError> {
                dydt[0] = f64::NAN;
                Ok(())
            }
        }

        let mut driver = driver_1d(0.0, 1.0, 0.1);
        let result = driver.step_once(&NanRhs);
        assert!(matches!(
            result,
            Err(IntegrationError::DerivativeFailure { .. })
        ));
        assert_eq!(driver.status(), Status::Failed);
    }

    #[test]
    fn test_empty_state_vector_accepts_trivially() {
        struct Nothing;
        impl OdeSystem<0> for Nothing {
            fn rhs(&self, _t: f64, _y: &[f64; 0], _dydt: &mut [f64; 0]) -> Result<(), RhsError> {
                Ok(())
            }
        }

        let control = Control::new(Tolerances::<0>::new(1e-12, 1e-12));
        let mut driver =
            Rkf78::initialize(0.0, &[], 0.1, control, TableauVariant::Standard).unwrap();

        let mut count = 0;
        for step in driver.integrate(&Nothing, 1.0) {
            step.unwrap();
            count += 1;
        }
        assert!(count >= 1);
        assert_eq!(driver.status(), Status::Done);
        assert_eq!(driver.stats().rejected_steps, 0);
        assert!((driver.t() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_max_steps_exceeded() {
        let mut control = Control::new(Tolerances::new(1e-12, 1e-12));
        control.max_steps = 3;
        control.h_max = 0.01;
        let mut driver =
            Rkf78::initialize(0.0, &[1.0], 0.01, control, TableauVariant::Standard).unwrap();

        let last = driver.integrate(&ExpDecay, 1.0).last().unwrap();
        assert!(matches!(last, Err(IntegrationError::MaxStepsExceeded)));
        assert_eq!(driver.status(), Status::Failed);
    }

    #[test]
    fn test_resume_after_cancellation() {
        let mut driver = driver_1d(0.0, 1.0, 0.1);

        // Take a few steps, then drop the iterator mid-run.
        let taken: Vec<_> = driver.integrate(&ExpDecay, 10.0).take(3).collect();
        assert_eq!(taken.len(), 3);
        let t_mid = driver.t();
        assert!(t_mid > 0.0 && t_mid < 10.0);
        assert_eq!(driver.status(), Status::Accepted);

        // A later integrate call resumes from the committed state.
        for step in driver.integrate(&ExpDecay, 10.0) {
            step.unwrap();
        }
        assert_eq!(driver.status(), Status::Done);
        assert!(
            (driver.y()[0] - (-10.0f64).exp()).abs() < 1e-9,
            "y(10) = {:.15}",
            driver.y()[0]
        );
    }

    #[test]
    fn test_rms_norm_below_max_norm() {
        let make = |norm: ErrorNorm| {
            let control = Control::new(Tolerances::<2>::new(1e-6, 0.0)).with_norm(norm);
            Rkf78::initialize(0.0, &[0.0, 0.0], 0.1, control, TableauVariant::Standard).unwrap()
        };

        // One component at exactly the tolerance, the other clean.
        let y = [0.0, 0.0];
        let y8 = [1e-6, 0.0];
        let y7 = [0.0, 0.0];

        let e_max = make(ErrorNorm::Max).estimate_error(&y, &y8, &y7);
        let e_rms = make(ErrorNorm::Rms).estimate_error(&y, &y8, &y7);

        assert_relative_eq!(e_max, 1.0, epsilon = 1e-12);
        assert_relative_eq!(e_rms, 0.5f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_h_max_respected() {
        let mut control = Control::new(Tolerances::new(1e-12, 1e-12));
        control.h_max = 0.05;
        let mut driver =
            Rkf78::initialize(0.0, &[1.0], 0.1, control, TableauVariant::Standard).unwrap();

        for step in driver.integrate(&ExpDecay, 1.0) {
            let step = step.unwrap();
            assert!(step.h.abs() <= 0.05 + 1e-15, "h = {} exceeds h_max", step.h);
        }
        assert_eq!(driver.status(), Status::Done);
    }

    #[test]
    fn test_step_once_after_done_is_rejected() {
        let mut driver = driver_1d(0.0, 1.0, 0.1);
        for step in driver.integrate(&ExpDecay, 0.5) {
            step.unwrap();
        }
        assert_eq!(driver.status(), Status::Done);

        let result = driver.step_once(&ExpDecay);
        assert!(matches!(result, Err(IntegrationError::InvalidInput { .. })));
        // Terminal state is sticky.
        assert_eq!(driver.status(), Status::Done);

        let more: Vec<_> = driver.integrate(&ExpDecay, 1.0).collect();
        assert!(more.is_empty());
    }

    #[test]
    fn test_custom_controller_validated() {
        let mut control = Control::new(Tolerances::<1>::new(1e-12, 1e-12));
        control.controller = StepController {
            safety: 0.9,
            max_factor: 5.0,
            min_factor: 1.5, // would break monotonic shrink on rejection
        };
        let result = Rkf78::initialize(0.0, &[1.0], 0.1, control, TableauVariant::Standard);
        assert!(matches!(result, Err(IntegrationError::InvalidInput { .. })));
    }
}
