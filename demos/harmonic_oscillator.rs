//! Basic usage — harmonic oscillator.
//!
//! Integrates y'' + ω²y = 0 for one period and compares with the exact solution.
//!
//! Run with:
//!   cargo run --example harmonic_oscillator

use fehlberg78::{Control, OdeSystem, RhsError, Rkf78, TableauVariant, Tolerances};

/// Simple harmonic oscillator: y'' + ω²y = 0
///
/// State vector: [y, y']
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

fn main() {
    let omega = 2.0;
    let sys = HarmonicOscillator { omega };

    // Integrate for one full period: T = 2π/ω
    let period = 2.0 * std::f64::consts::PI / omega;
    let y0 = [1.0, 0.0]; // y(0) = 1, y'(0) = 0

    let control = Control::new(Tolerances::new(1e-12, 1e-12));
    let mut driver = Rkf78::initialize(0.0, &y0, 0.01, control, TableauVariant::Standard)
        .expect("valid configuration");

    for step in driver.integrate(&sys, period) {
        let step = step.expect("integration step");
        println!("  t = {:8.5}  y = {:+.12}  h = {:.3e}", step.t, step.y[0], step.h);
    }

    let (tf, yf) = (driver.t(), *driver.y());

    // Exact solution: y(t) = cos(ωt), y'(t) = -ω sin(ωt)
    let y_exact = (omega * tf).cos();
    let v_exact = -omega * (omega * tf).sin();

    println!();
    println!("Harmonic Oscillator (ω = {omega})");
    println!("  Period:      {period:.6} s");
    println!("  Final time:  {tf:.6} s");
    println!();
    println!("  y(T)  = {:.15}   (exact: {:.15})", yf[0], y_exact);
    println!("  y'(T) = {:.15}   (exact: {:.15})", yf[1], v_exact);
    println!();
    println!("  Position error: {:.2e}", (yf[0] - y_exact).abs());
    println!("  Velocity error: {:.2e}", (yf[1] - v_exact).abs());
    println!();
    println!("  Accepted steps: {}", driver.stats().accepted_steps);
    println!("  Rejected steps: {}", driver.stats().rejected_steps);
    println!("  Function evals: {}", driver.stats().fn_evals);
}
