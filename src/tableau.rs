//! Runge-Kutta-Fehlberg 7(8) Butcher tableaus
//!
//! Coefficients for the 13-stage embedded RK7(8) pair from:
//! Fehlberg, E. (1968). "Classical Fifth-, Sixth-, Seventh-, and
//! Eighth-Order Runge-Kutta Formulas with Stepsize Control"
//! NASA TR R-287, Table X, pages 64-65.
//!
//! Two constant instances are provided, following the two transcriptions
//! shipped with NASA's ER7 numerical utilities: the standard form
//! tabulates the seventh-order weights directly, while the abbreviated
//! form carries only the eighth-order weights plus the four-term
//! truncation-error combination, from which the seventh-order solution is
//! reconstructed. The two are algebraically equal but sum in a different
//! order, so their trajectories agree to roundoff rather than bitwise.
//! Select one with [`TableauVariant`]; the integrator only ever reads the
//! arrays, so a single instance is safely shared across all integrator
//! instances and threads.

/// Number of stages in the RKF78 method
pub const STAGES: usize = 13;

/// Order of the higher-order solution (committed on step acceptance)
pub const ORDER: u8 = 8;

/// Order of the embedded solution (used for error estimation)
pub const EMBEDDED_ORDER: u8 = 7;

/// Butcher tableau for an embedded RK7(8) pair.
///
/// `a` is strictly lower triangular (`a[i][j] == 0` for `j >= i`), so each
/// stage depends only on earlier stages and a single forward pass computes
/// all 13. Invariants satisfied by both provided instances:
///
/// - every row `i` of `a` sums to `c[i]` (within floating roundoff),
/// - `b8` (and `b7`, where tabulated) sums to exactly 1,
/// - `te` sums to 0 and equals `b8 - b7` componentwise.
#[derive(Debug)]
pub struct Tableau {
    /// Stage-coupling matrix (β values in NASA TR R-287)
    pub a: [[f64; STAGES]; STAGES],
    /// Seventh-order solution weights, where the transcription tabulates
    /// them; `None` means the seventh-order solution is reconstructed
    /// from `b8` and `te` instead
    pub b7: Option<[f64; STAGES]>,
    /// Eighth-order solution weights (committed solution)
    pub b8: [f64; STAGES],
    /// Truncation-error weights: `y8 - y7 = h * Σ te[i]*k[i]`
    pub te: [f64; STAGES],
    /// Stage time offsets: stage `i` is evaluated at `t + c[i]*h`
    pub c: [f64; STAGES],
}

/// Selects which tableau transcription an integrator run uses.
///
/// The choice is made once per run; the two instances carry the same
/// algebraic content but construct the seventh-order solution through
/// different summations, so results agree to well within 1e-10 without
/// being bit-identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableauVariant {
    /// The standard Fehlberg 7(8) transcription ([`STANDARD`])
    #[default]
    Standard,
    /// The abbreviated transcription ([`ABBREVIATED`])
    Abbreviated,
}

impl TableauVariant {
    /// The coefficient tables for this variant.
    pub fn tableau(self) -> &'static Tableau {
        match self {
            TableauVariant::Standard => &STANDARD,
            TableauVariant::Abbreviated => &ABBREVIATED,
        }
    }
}

/// Standard RKF7(8) tableau, NASA TR R-287 Table X.
///
/// Note: the ER7 transcription of the seventh-order weights is shifted one
/// column to the right from stage 5 onward, which breaks the quadrature
/// condition Σ b·c = 1/2 and would make the error estimate O(h²). The `b7`
/// here is Table X as published: `b8` minus the truncation-error combination
/// (41/840)·(k0 + k10 − k11 − k12).
pub const STANDARD: Tableau = Tableau {
    a: [
        // Row 0: k_0 = f(t, y), no prior stages
        [0.0; STAGES],
        // Row 1: sum = 2/27
        [
            2.0 / 27.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ],
        // Row 2: sum = 1/9
        [
            1.0 / 36.0, 1.0 / 12.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ],
        // Row 3: sum = 1/6
        [
            1.0 / 24.0, 0.0, 1.0 / 8.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ],
        // Row 4: sum = 5/12
        [
            5.0 / 12.0, 0.0, -25.0 / 16.0, 25.0 / 16.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ],
        // Row 5: sum = 1/2
        [
            1.0 / 20.0, 0.0, 0.0, 1.0 / 4.0, 1.0 / 5.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ],
        // Row 6: sum = 5/6
        [
            -25.0 / 108.0, 0.0, 0.0, 125.0 / 108.0, -65.0 / 27.0, 125.0 / 54.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ],
        // Row 7: sum = 1/6
        [
            31.0 / 300.0, 0.0, 0.0, 0.0, 61.0 / 225.0, -2.0 / 9.0, 13.0 / 900.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ],
        // Row 8: sum = 2/3
        [
            2.0, 0.0, 0.0, -53.0 / 6.0, 704.0 / 45.0, -107.0 / 9.0, 67.0 / 90.0, 3.0,
            0.0, 0.0, 0.0, 0.0, 0.0,
        ],
        // Row 9: sum = 1/3
        [
            -91.0 / 108.0, 0.0, 0.0, 23.0 / 108.0, -976.0 / 135.0, 311.0 / 54.0,
            -19.0 / 60.0, 17.0 / 6.0, -1.0 / 12.0,
            0.0, 0.0, 0.0, 0.0,
        ],
        // Row 10: sum = 1
        [
            2383.0 / 4100.0, 0.0, 0.0, -341.0 / 164.0, 4496.0 / 1025.0, -301.0 / 82.0,
            2133.0 / 4100.0, 45.0 / 82.0, 45.0 / 164.0, 18.0 / 41.0,
            0.0, 0.0, 0.0,
        ],
        // Row 11: sum = 0 (first error-estimation stage)
        [
            3.0 / 205.0, 0.0, 0.0, 0.0, 0.0, -6.0 / 41.0, -3.0 / 205.0, -3.0 / 41.0,
            3.0 / 41.0, 6.0 / 41.0, 0.0,
            0.0, 0.0,
        ],
        // Row 12: sum = 1 (second error-estimation stage)
        [
            -1777.0 / 4100.0, 0.0, 0.0, -341.0 / 164.0, 4496.0 / 1025.0, -289.0 / 82.0,
            2193.0 / 4100.0, 51.0 / 82.0, 33.0 / 164.0, 12.0 / 41.0, 0.0, 1.0,
            0.0,
        ],
    ],
    b7: Some([
        41.0 / 840.0,
        0.0,
        0.0,
        0.0,
        0.0,
        34.0 / 105.0,
        9.0 / 35.0,
        9.0 / 35.0,
        9.0 / 280.0,
        9.0 / 280.0,
        41.0 / 840.0,
        0.0,
        0.0,
    ]),
    b8: [
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        34.0 / 105.0,
        9.0 / 35.0,
        9.0 / 35.0,
        9.0 / 280.0,
        9.0 / 280.0,
        0.0,
        41.0 / 840.0,
        41.0 / 840.0,
    ],
    te: [
        -41.0 / 840.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        -41.0 / 840.0,
        41.0 / 840.0,
        41.0 / 840.0,
    ],
    c: [
        0.0,
        2.0 / 27.0,
        1.0 / 9.0,
        1.0 / 6.0,
        5.0 / 12.0,
        1.0 / 2.0,
        5.0 / 6.0,
        1.0 / 6.0,
        2.0 / 3.0,
        1.0 / 3.0,
        1.0,
        0.0,
        1.0,
    ],
};

/// Abbreviated RKF7(8) tableau.
///
/// Tabulates no seventh-order weights; the seventh-order solution is
/// reconstructed from the committed solution and the four-term
/// truncation-error combination, `y7 = y8 - h * Σ te[i]*k[i]`, which is how
/// the historical abbreviated scheme was run. Expanding that combination
/// reproduces the Table X seventh-order row carried by [`STANDARD`].
///
/// The ER7 abbreviated transcription transposes columns 9 and 10 in rows 11
/// and 12 of `a` and in `b8`. Exact rational arithmetic shows that
/// transposition breaks Σ b·c = 1/2 (the transposed columns carry distinct
/// node times, 1/3 and 1), so those entries live in their standard columns
/// here and the two instances agree algebraically.
pub const ABBREVIATED: Tableau = Tableau {
    a: [
        // Row 0: unused
        [0.0; STAGES],
        // Row 1: 1 element, sum = 2/27
        [
            2.0 / 27.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ],
        // Row 2: 2 elements, sum = 1/9
        [
            1.0 / 36.0, 1.0 / 12.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ],
        // Row 3: 3 elements, sum = 1/6
        [
            1.0 / 24.0, 0.0, 1.0 / 8.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ],
        // Row 4: 4 elements, sum = 5/12
        [
            5.0 / 12.0, 0.0, -25.0 / 16.0, 25.0 / 16.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ],
        // Row 5: 5 elements, sum = 1/2
        [
            1.0 / 20.0, 0.0, 0.0, 1.0 / 4.0, 1.0 / 5.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ],
        // Row 6: 6 elements, sum = 5/6
        [
            -25.0 / 108.0, 0.0, 0.0, 125.0 / 108.0, -65.0 / 27.0, 125.0 / 54.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ],
        // Row 7: 7 elements, sum = 1/6
        [
            31.0 / 300.0, 0.0, 0.0, 0.0, 61.0 / 225.0, -2.0 / 9.0, 13.0 / 900.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ],
        // Row 8: 8 elements, sum = 2/3
        [
            2.0, 0.0, 0.0, -53.0 / 6.0, 704.0 / 45.0, -107.0 / 9.0, 67.0 / 90.0, 3.0,
            0.0, 0.0, 0.0, 0.0, 0.0,
        ],
        // Row 9: 9 elements, sum = 1/3
        [
            -91.0 / 108.0, 0.0, 0.0, 23.0 / 108.0, -976.0 / 135.0, 311.0 / 54.0,
            -19.0 / 60.0, 17.0 / 6.0, -1.0 / 12.0,
            0.0, 0.0, 0.0, 0.0,
        ],
        // Row 10: 10 elements, sum = 1
        [
            2383.0 / 4100.0, 0.0, 0.0, -341.0 / 164.0, 4496.0 / 1025.0, -301.0 / 82.0,
            2133.0 / 4100.0, 45.0 / 82.0, 45.0 / 164.0, 18.0 / 41.0,
            0.0, 0.0, 0.0,
        ],
        // Row 11: 11 elements, sum = 0
        [
            3.0 / 205.0, 0.0, 0.0, 0.0, 0.0, -6.0 / 41.0, -3.0 / 205.0, -3.0 / 41.0,
            3.0 / 41.0, 6.0 / 41.0, 0.0,
            0.0, 0.0,
        ],
        // Row 12: 12 elements, sum = 1
        [
            -1777.0 / 4100.0, 0.0, 0.0, -341.0 / 164.0, 4496.0 / 1025.0, -289.0 / 82.0,
            2193.0 / 4100.0, 51.0 / 82.0, 33.0 / 164.0, 12.0 / 41.0, 0.0, 1.0,
            0.0,
        ],
    ],
    b7: None,
    b8: [
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        34.0 / 105.0,
        9.0 / 35.0,
        9.0 / 35.0,
        9.0 / 280.0,
        9.0 / 280.0,
        0.0,
        41.0 / 840.0,
        41.0 / 840.0,
    ],
    te: [
        -41.0 / 840.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        -41.0 / 840.0,
        41.0 / 840.0,
        41.0 / 840.0,
    ],
    c: [
        0.0,
        2.0 / 27.0,
        1.0 / 9.0,
        1.0 / 6.0,
        5.0 / 12.0,
        1.0 / 2.0,
        5.0 / 6.0,
        1.0 / 6.0,
        2.0 / 3.0,
        1.0 / 3.0,
        1.0,
        0.0,
        1.0,
    ],
};
