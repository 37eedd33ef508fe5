//! Compares the two Butcher-tableau transcriptions on the same problem.
//!
//! Both variants carry the NASA TR R-287 Table X coefficients; their
//! trajectories should agree to well below the requested tolerance.
//!
//! Run with:
//!   cargo run --example tableau_variants

use fehlberg78::{Control, OdeSystem, RhsError, Rkf78, TableauVariant, Tolerances};

/// Exponential decay y' = -y with exact solution exp(-t)
struct ExpDecay;

impl OdeSystem<1> for ExpDecay {
    fn rhs(&self, _t: f64, y: &[f64; 1], dydt: &mut [f64; 1]) -> Result<(), RhsError> {
        dydt[0] = -y[0];
        Ok(())
    }
}

fn run(variant: TableauVariant) -> (f64, u64) {
    let control = Control::new(Tolerances::new(1e-12, 1e-12));
    let mut driver =
        Rkf78::initialize(0.0, &[1.0], 0.1, control, variant).expect("valid configuration");

    for step in driver.integrate(&ExpDecay, 5.0) {
        step.expect("integration step");
    }
    (driver.y()[0], driver.stats().accepted_steps)
}

fn main() {
    let exact = (-5.0f64).exp();
    let (y_std, n_std) = run(TableauVariant::Standard);
    let (y_abb, n_abb) = run(TableauVariant::Abbreviated);

    println!("Exponential decay, y' = -y, integrated to t = 5");
    println!();
    println!("  Standard:     y = {y_std:.15}  ({n_std} steps)");
    println!("  Abbreviated:  y = {y_abb:.15}  ({n_abb} steps)");
    println!("  Exact:        y = {exact:.15}");
    println!();
    println!("  Variant difference: {:.2e}", (y_std - y_abb).abs());
    println!("  Error vs exact:     {:.2e}", (y_std - exact).abs());
}
