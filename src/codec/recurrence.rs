//! Two-channel tensor recurrence: the lossless, predictive half of the codec.
//!
//! Each scalar is split into a two-channel state (a, b). A nonlinear coupled
//! map predicts the next state from the current one, and only the prediction
//! residuals are handed to the quantizer. For locally correlated sequences
//! the residuals are small, which is what makes quantization cheap.
//!
//! This stage is exactly invertible: `decode_sequence(encode_sequence(x))`
//! reproduces `x` to floating-point precision. All loss happens downstream.

use serde::{Deserialize, Serialize};

use crate::codec::constants::{BETA, EPSILON, GAMMA, ZETA};

/// One prediction residual: the difference between an actual two-channel
/// state and the recurrence's prediction of it. Index 0 of a sequence has no
/// prior state, so its residual is the raw state itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Residual {
    pub a: f64,
    pub b: f64,
}

/// The recurrence predictor.
///
/// Stateless by construction: the encode/decode walks keep their running
/// state in locals, so a single predictor can serve concurrent callers and
/// nothing leaks between calls.
#[derive(Debug, Clone, Copy)]
pub struct RecurrencePredictor {
    gamma: f64,
    beta: f64,
    epsilon: f64,
    zeta: f64,
}

impl Default for RecurrencePredictor {
    fn default() -> Self {
        Self::with_constants(GAMMA, BETA, EPSILON, ZETA)
    }
}

impl RecurrencePredictor {
    /// Build a predictor with explicit coupling constants.
    ///
    /// Used when decoding payloads that carry their own constants, so old
    /// data stays readable if the defaults ever change.
    pub fn with_constants(gamma: f64, beta: f64, epsilon: f64, zeta: f64) -> Self {
        Self {
            gamma,
            beta,
            epsilon,
            zeta,
        }
    }

    /// Radial growth coupling constant in use.
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Cross-channel coupling constant in use.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Quadratic damping constant in use.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Quartic correction constant in use.
    pub fn zeta(&self) -> f64 {
        self.zeta
    }

    /// Split a scalar into its two-channel state.
    ///
    /// Golden-ratio split, normalized so that `a² + b² = x²` holds exactly.
    /// Both channels carry the sign of `x`; zero maps to `(0, 0)` with the
    /// positive-sign default.
    pub fn tensorize(&self, x: f64) -> (f64, f64) {
        if x == 0.0 {
            return (0.0, 0.0);
        }
        let norm = (1.0 + self.gamma * self.gamma).sqrt();
        (x / norm, x * self.gamma / norm)
    }

    /// Recover a scalar from its two-channel state.
    ///
    /// Magnitude is `√(a² + b²)`; the sign comes from whichever channel has
    /// the larger magnitude.
    pub fn detensorize(&self, a: f64, b: f64) -> f64 {
        let magnitude = a.hypot(b);
        if magnitude == 0.0 {
            return 0.0;
        }
        let sign = if a.abs() >= b.abs() {
            a.signum()
        } else {
            b.signum()
        };
        magnitude * sign
    }

    /// Predict the next state from the current one.
    ///
    /// ```text
    /// r² = a² + b²
    /// a' = γa + βb − ε·r²·a + ζ·r⁴·a
    /// b' = βa + γb − ε·r²·b + ζ·r⁴·b
    /// ```
    pub fn predict_next(&self, a: f64, b: f64) -> (f64, f64) {
        let r_squared = a * a + b * b;
        let r_fourth = r_squared * r_squared;

        let a_next = self.gamma * a + self.beta * b - self.epsilon * r_squared * a
            + self.zeta * r_fourth * a;
        let b_next = self.beta * a + self.gamma * b - self.epsilon * r_squared * b
            + self.zeta * r_fourth * b;

        (a_next, b_next)
    }

    /// Encode a scalar sequence into prediction residuals.
    ///
    /// The first element's residual is its raw state; every later residual is
    /// `actual − predicted(previous actual)`. Lossless: no quantization
    /// happens here.
    pub fn encode_sequence(&self, sequence: &[f64]) -> Vec<Residual> {
        let mut residuals = Vec::with_capacity(sequence.len());
        let mut prev_state: Option<(f64, f64)> = None;

        for &scalar in sequence {
            let (a_actual, b_actual) = self.tensorize(scalar);

            let residual = match prev_state {
                None => Residual {
                    a: a_actual,
                    b: b_actual,
                },
                Some((a_prev, b_prev)) => {
                    let (a_pred, b_pred) = self.predict_next(a_prev, b_prev);
                    Residual {
                        a: a_actual - a_pred,
                        b: b_actual - b_pred,
                    }
                }
            };

            residuals.push(residual);
            prev_state = Some((a_actual, b_actual));
        }

        residuals
    }

    /// Decode residuals back into the scalar sequence.
    ///
    /// Inverse walk of [`encode_sequence`](Self::encode_sequence): each actual
    /// state is prediction + residual, carried forward as the next
    /// prediction's input.
    pub fn decode_sequence(&self, residuals: &[Residual]) -> Vec<f64> {
        let mut scalars = Vec::with_capacity(residuals.len());
        let mut prev_state: Option<(f64, f64)> = None;

        for residual in residuals {
            let (a_actual, b_actual) = match prev_state {
                None => (residual.a, residual.b),
                Some((a_prev, b_prev)) => {
                    let (a_pred, b_pred) = self.predict_next(a_prev, b_prev);
                    (a_pred + residual.a, b_pred + residual.b)
                }
            };

            scalars.push(self.detensorize(a_actual, b_actual));
            prev_state = Some((a_actual, b_actual));
        }

        scalars
    }

    /// Check that a state's magnitude matches an expected scalar within 1%.
    ///
    /// Correctness probe; the pipeline never calls this itself.
    pub fn validate_projection(&self, a: f64, b: f64, expected: f64) -> bool {
        let actual_magnitude = a.hypot(b);
        let error = (actual_magnitude - expected.abs()).abs() / (expected.abs() + 1e-9);
        error < 0.01
    }
}
