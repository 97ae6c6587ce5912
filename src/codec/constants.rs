//! Fixed constants of the geometric compression scheme.
//!
//! The recurrence constants are baked into every compressed payload's
//! metadata, so a decoder never depends on these values matching its own
//! build. Changing them changes the wire format for *new* payloads only.

/// Golden ratio, the radial growth coupling of the recurrence.
pub const PHI: f64 = 1.618033988749895;

/// Radial growth coupling coefficient.
pub const GAMMA: f64 = PHI;

/// Cross-channel coupling coefficient.
pub const BETA: f64 = 1.0;

/// Geometric fidelity constant; the damping terms derive from it.
pub const V_T: f64 = 0.117851130197758;

/// Quadratic damping coefficient.
pub const EPSILON: f64 = V_T * 0.5;

/// Quartic correction coefficient.
pub const ZETA: f64 = V_T * 0.1;

/// Default number of quantization levels per residual channel.
pub const QUANTIZATION_LEVELS: u32 = 256;
