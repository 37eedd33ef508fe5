//! # fehlberg78: Adaptive Runge-Kutta-Fehlberg 7(8) Integration Core
//!
//! A high-precision single-step ODE integration core built on the 13-stage
//! embedded RK7(8) pair of NASA TR R-287.
//!
//! ## Features
//!
//! - 13-stage embedded RK7(8) pair providing 8th-order accuracy
//! - Adaptive step-size control with 7th-order error estimation
//! - Two Butcher-tableau transcriptions selectable by configuration
//! - Fallible derivative functions with clean failure semantics: the
//!   driver never loses its last committed state
//! - Lazy step-by-step iteration with cancellation and resumption
//! - Minimal dependencies (no external linear algebra required)
//! - Designed for integration into larger simulation frameworks
//!
//! ## Basic Usage
//!
//! ```rust
//! use fehlberg78::{Control, OdeSystem, RhsError, Rkf78, TableauVariant, Tolerances};
//!
//! // Define your ODE system
//! struct HarmonicOscillator { omega: f64 }
//!
//! impl OdeSystem<2> for HarmonicOscillator {
//!     fn rhs(&self, _t: f64, y: &[f64; 2], dydt: &mut [f64; 2]) -> Result<(), RhsError> {
//!         dydt[0] = y[1];
//!         dydt[1] = -self.omega * self.omega * y[0];
//!         Ok(())
//!     }
//! }
//!
//! // Set up and run the integrator
//! let sys = HarmonicOscillator { omega: 1.0 };
//! let control = Control::new(Tolerances::new(1e-12, 1e-12));
//! let mut driver = Rkf78::initialize(
//!     0.0,          // t0
//!     &[1.0, 0.0],  // y0
//!     0.1,          // h0; the sign selects the integration direction
//!     control,
//!     TableauVariant::Standard,
//! ).unwrap();
//!
//! for step in driver.integrate(&sys, 10.0) {
//!     let step = step.unwrap();
//!     // each item is one committed step: (step.t, step.y, step.h)
//! }
//! let (tf, yf) = (driver.t(), *driver.y());
//! ```
//!
//! The step sequence is lazy: consuming it one item at a time observes
//! every committed step, dropping it mid-run cancels cleanly at the last
//! committed state, and a later [`Rkf78::integrate`] call resumes from
//! there. [`Rkf78::step_once`] advances a single committed step when no
//! endpoint is wanted.
//!
//! ## Tolerance Selection
//!
//! The per-component error scale is `atol + rtol * max(|y|, |y_new|)`; a
//! step is accepted when the combined normalized error is at most 1.
//!
//! - **Relative tolerance**: typically `1e-12` to `1e-14` for this order
//! - **Absolute tolerance**: set per component to the magnitude below
//!   which that component's absolute error no longer matters
//! - At `tol = 1e-12`, energy drift on a harmonic oscillator should stay
//!   below `1e-10` over one period
//!
//! Either tolerance may be zero for a component, but not both.
//!
//! ## References
//!
//! 1. Fehlberg, E. (1968). "Classical Fifth-, Sixth-, Seventh-, and
//!    Eighth-Order Runge-Kutta Formulas with Stepsize Control".
//!    NASA TR R-287.
//!
//! 2. Hairer, E., Nørsett, S.P., & Wanner, G. (1993). "Solving
//!    Ordinary Differential Equations I: Nonstiff Problems".
//!    Springer.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod control;
pub mod solver;
pub mod tableau;

pub use control::{Control, ErrorNorm, StepController, Tolerances};
pub use solver::{
    IntegrationError, OdeSystem, RhsError, Rkf78, Stats, Status, StepResult, Steps,
};
pub use tableau::{Tableau, TableauVariant, EMBEDDED_ORDER, ORDER, STAGES};
