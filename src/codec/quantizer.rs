//! Residual quantization and token encoding: the lossy stage.
//!
//! Both channels of every residual are mapped onto `levels` discrete steps
//! spanning the global min/max of the encode call, then each (level_a,
//! level_b) pair is combined into one integer and written as a radix-20
//! token. The per-channel absolute error is bounded by half a step:
//! `(max − min) / (levels − 1) / 2`.

use serde::{Deserialize, Serialize};

use crate::base20;
use crate::codec::constants::QUANTIZATION_LEVELS;
use crate::codec::recurrence::Residual;
use crate::codec::CodecError;

/// Separator between residual tokens in the encoded string.
const TOKEN_DELIMITER: char = ',';

/// Quantization range and element count for one encoded residual stream.
/// Everything a decoder needs besides the token string itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResidualMetadata {
    pub min_val: f64,
    pub max_val: f64,
    pub count: usize,
}

/// Fixed-width linear quantizer over a per-call min/max range.
#[derive(Debug, Clone, Copy)]
pub struct QuantizedResidualCodec {
    levels: u32,
}

impl Default for QuantizedResidualCodec {
    fn default() -> Self {
        Self::new(QUANTIZATION_LEVELS)
    }
}

impl QuantizedResidualCodec {
    /// Create a codec with the given number of quantization levels.
    ///
    /// `levels` below 2 is clamped to 2: a single level cannot represent a
    /// non-degenerate range.
    pub fn new(levels: u32) -> Self {
        Self {
            levels: levels.max(2),
        }
    }

    /// Number of quantization levels per channel.
    pub fn levels(&self) -> u32 {
        self.levels
    }

    /// The guaranteed per-channel absolute error bound for a range.
    pub fn max_quantization_error(&self, min_val: f64, max_val: f64) -> f64 {
        (max_val - min_val) / (self.levels - 1) as f64 / 2.0
    }

    /// Map a value onto a discrete level in `[0, levels − 1]`.
    ///
    /// Rounds to the nearest level and clamps; a degenerate range
    /// (`min == max`) always yields level 0.
    pub fn quantize(&self, value: f64, min_val: f64, max_val: f64) -> u32 {
        if max_val == min_val {
            return 0;
        }

        let normalized = (value - min_val) / (max_val - min_val);
        let level = (normalized * (self.levels - 1) as f64).round();

        if level <= 0.0 {
            0
        } else if level >= (self.levels - 1) as f64 {
            self.levels - 1
        } else {
            level as u32
        }
    }

    /// Map a discrete level back to the continuous range.
    ///
    /// A degenerate range dequantizes to `min_val`.
    pub fn dequantize(&self, level: u32, min_val: f64, max_val: f64) -> f64 {
        if max_val == min_val {
            return min_val;
        }

        let normalized = level as f64 / (self.levels - 1) as f64;
        min_val + normalized * (max_val - min_val)
    }

    /// Global min/max over every channel of every residual.
    ///
    /// Rejects empty slices (no range exists) and non-finite components.
    pub fn residual_range(&self, residuals: &[Residual]) -> Result<(f64, f64), CodecError> {
        if residuals.is_empty() {
            return Err(CodecError::EmptySequence);
        }

        let mut min_val = f64::INFINITY;
        let mut max_val = f64::NEG_INFINITY;
        for residual in residuals {
            if !residual.a.is_finite() || !residual.b.is_finite() {
                return Err(CodecError::NonFinite);
            }
            min_val = min_val.min(residual.a).min(residual.b);
            max_val = max_val.max(residual.a).max(residual.b);
        }

        Ok((min_val, max_val))
    }

    /// Write (level_a, level_b) pairs as a delimited radix-20 token string.
    ///
    /// Each pair combines as `level_a · levels + level_b`.
    pub fn encode_levels(&self, pairs: &[(u32, u32)]) -> String {
        let levels = self.levels as u64;
        let mut encoded = String::new();
        for (i, &(level_a, level_b)) in pairs.iter().enumerate() {
            if i > 0 {
                encoded.push(TOKEN_DELIMITER);
            }
            encoded.push_str(&base20::encode(level_a as u64 * levels + level_b as u64));
        }
        encoded
    }

    /// Read a token string back into (level_a, level_b) pairs.
    pub fn decode_levels(&self, encoded: &str) -> Result<Vec<(u32, u32)>, CodecError> {
        let levels = self.levels as u64;
        let mut pairs = Vec::new();

        for token in encoded.split(TOKEN_DELIMITER) {
            let combined = base20::decode(token).map_err(|source| CodecError::InvalidToken {
                token: token.to_string(),
                source,
            })?;

            let level_b = combined % levels;
            let level_a = combined / levels;
            if level_a >= levels {
                return Err(CodecError::LevelOutOfRange(combined));
            }

            pairs.push((level_a as u32, level_b as u32));
        }

        Ok(pairs)
    }

    /// Encode residuals as a delimited radix-20 token string.
    ///
    /// The quantization range is the min/max over *all* channels of *all*
    /// residuals in this call, which makes the output self-contained but not
    /// mergeable with streams encoded in other calls.
    pub fn encode_residuals(
        &self,
        residuals: &[Residual],
    ) -> Result<(String, ResidualMetadata), CodecError> {
        let (min_val, max_val) = self.residual_range(residuals)?;

        let pairs: Vec<(u32, u32)> = residuals
            .iter()
            .map(|residual| {
                (
                    self.quantize(residual.a, min_val, max_val),
                    self.quantize(residual.b, min_val, max_val),
                )
            })
            .collect();

        let metadata = ResidualMetadata {
            min_val,
            max_val,
            count: residuals.len(),
        };

        Ok((self.encode_levels(&pairs), metadata))
    }

    /// Decode a token string back into residuals.
    pub fn decode_residuals(
        &self,
        encoded: &str,
        metadata: &ResidualMetadata,
    ) -> Result<Vec<Residual>, CodecError> {
        let pairs = self.decode_levels(encoded)?;

        if pairs.len() != metadata.count {
            return Err(CodecError::CountMismatch {
                expected: metadata.count,
                actual: pairs.len(),
            });
        }

        Ok(pairs
            .into_iter()
            .map(|(level_a, level_b)| Residual {
                a: self.dequantize(level_a, metadata.min_val, metadata.max_val),
                b: self.dequantize(level_b, metadata.min_val, metadata.max_val),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_endpoints() {
        let codec = QuantizedResidualCodec::default();
        assert_eq!(codec.quantize(-1.0, -1.0, 1.0), 0);
        assert_eq!(codec.quantize(1.0, -1.0, 1.0), 255);
    }

    #[test]
    fn test_quantize_monotonic() {
        let codec = QuantizedResidualCodec::default();
        let mut prev = 0;
        for i in 0..=1000 {
            let v = -1.0 + 2.0 * i as f64 / 1000.0;
            let level = codec.quantize(v, -1.0, 1.0);
            assert!(level >= prev, "level decreased at v={v}");
            prev = level;
        }
    }

    #[test]
    fn test_quantize_clamps_out_of_range() {
        let codec = QuantizedResidualCodec::default();
        assert_eq!(codec.quantize(-5.0, -1.0, 1.0), 0);
        assert_eq!(codec.quantize(5.0, -1.0, 1.0), 255);
    }

    #[test]
    fn test_degenerate_range() {
        let codec = QuantizedResidualCodec::default();
        assert_eq!(codec.quantize(3.0, 3.0, 3.0), 0);
        assert_eq!(codec.dequantize(0, 3.0, 3.0), 3.0);
    }

    #[test]
    fn test_quantization_error_bound() {
        let codec = QuantizedResidualCodec::default();
        let (min_val, max_val) = (-2.0, 7.0);
        let bound = codec.max_quantization_error(min_val, max_val);

        for i in 0..=5000 {
            let v = min_val + (max_val - min_val) * i as f64 / 5000.0;
            let level = codec.quantize(v, min_val, max_val);
            let back = codec.dequantize(level, min_val, max_val);
            assert!(
                (v - back).abs() <= bound + 1e-12,
                "v={v}, back={back}, bound={bound}"
            );
        }
    }

    #[test]
    fn test_residual_roundtrip_within_bound() {
        let codec = QuantizedResidualCodec::default();
        let residuals: Vec<Residual> = (0..64)
            .map(|i| Residual {
                a: (i as f64 * 0.37).sin(),
                b: (i as f64 * 0.61).cos() * 0.5,
            })
            .collect();

        let (encoded, metadata) = codec.encode_residuals(&residuals).unwrap();
        let decoded = codec.decode_residuals(&encoded, &metadata).unwrap();

        let bound = codec.max_quantization_error(metadata.min_val, metadata.max_val);
        assert_eq!(decoded.len(), residuals.len());
        for (orig, dec) in residuals.iter().zip(&decoded) {
            assert!((orig.a - dec.a).abs() <= bound + 1e-12);
            assert!((orig.b - dec.b).abs() <= bound + 1e-12);
        }
    }

    #[test]
    fn test_empty_residuals_rejected() {
        let codec = QuantizedResidualCodec::default();
        assert!(matches!(
            codec.encode_residuals(&[]),
            Err(CodecError::EmptySequence)
        ));
    }

    #[test]
    fn test_non_finite_rejected() {
        let codec = QuantizedResidualCodec::default();
        let residuals = [Residual {
            a: f64::NAN,
            b: 0.0,
        }];
        assert!(matches!(
            codec.encode_residuals(&residuals),
            Err(CodecError::NonFinite)
        ));
    }

    #[test]
    fn test_corrupt_token_rejected() {
        let codec = QuantizedResidualCodec::default();
        let metadata = ResidualMetadata {
            min_val: 0.0,
            max_val: 1.0,
            count: 1,
        };
        assert!(matches!(
            codec.decode_residuals("z!", &metadata),
            Err(CodecError::InvalidToken { .. })
        ));
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let codec = QuantizedResidualCodec::default();
        let residuals = [
            Residual { a: 0.1, b: 0.2 },
            Residual { a: 0.3, b: 0.4 },
        ];
        let (encoded, mut metadata) = codec.encode_residuals(&residuals).unwrap();
        metadata.count = 3;
        assert!(matches!(
            codec.decode_residuals(&encoded, &metadata),
            Err(CodecError::CountMismatch { .. })
        ));
    }
}
