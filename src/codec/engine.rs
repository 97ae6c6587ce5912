//! Compression engine: orchestrates the predictor and quantizer.
//!
//! Flat numeric arrays go through the full pipeline: the sequence is
//! normalized into the recurrence's stable regime (peak magnitude 1), then
//! quantized in a closed loop: each residual is taken against the
//! prediction from the previously *reconstructed* state, so encoder and
//! decoder walk identical trajectories and quantization error never
//! compounds across steps. The per-element error is bounded by
//! `scale · (max − min) / (levels − 1)`.
//!
//! Nested JSON trees are walked recursively: all-numeric array leaves are
//! replaced by marker objects, everything else passes through untouched.
//! Non-numeric data is never coerced onto the numeric path.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::codec::quantizer::{QuantizedResidualCodec, ResidualMetadata};
use crate::codec::recurrence::RecurrencePredictor;
use crate::codec::CodecError;
use crate::config::CodecConfig;

/// Marker field identifying a compressed array leaf inside a JSON tree.
const COMPRESSED_MARKER: &str = "compressed";

/// Field holding the compressed block inside a marker object.
const COMPRESSED_DATA: &str = "data";

/// Everything a decoder needs to invert one compressed array, including the
/// recurrence constants used at encode time. Payloads are self-describing so
/// old data stays readable if the defaults ever change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockMetadata {
    pub min_val: f64,
    pub max_val: f64,
    pub count: usize,
    pub original_length: usize,
    pub quantization_levels: u32,
    /// Peak magnitude the sequence was normalized by before encoding.
    pub scale: f64,
    pub gamma: f64,
    pub beta: f64,
    pub epsilon: f64,
    pub zeta: f64,
}

/// One compressed numeric array: token string plus decode metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressedBlock {
    pub encoded: String,
    pub metadata: BlockMetadata,
}

/// Result of an explicit round-trip validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub max_absolute_error: f64,
    pub max_relative_error: f64,
    pub mean_relative_error: f64,
    pub tolerance: f64,
}

/// The compression engine.
pub struct CompressionEngine {
    predictor: RecurrencePredictor,
    quantizer: QuantizedResidualCodec,
}

impl Default for CompressionEngine {
    fn default() -> Self {
        Self::new(CodecConfig::default())
    }
}

impl CompressionEngine {
    pub fn new(config: CodecConfig) -> Self {
        Self {
            predictor: RecurrencePredictor::default(),
            quantizer: QuantizedResidualCodec::new(config.quantization_levels),
        }
    }

    /// Compress a flat numeric array.
    ///
    /// The quantization range is recomputed from this call's residuals, so
    /// blocks from separate calls are self-contained but not mergeable.
    pub fn compress_data(&self, data: &[f64]) -> Result<CompressedBlock, CodecError> {
        // Normalize to peak magnitude 1; the recurrence is only well-behaved
        // for states with r ≲ 1, where its damping terms stay small.
        let peak = data.iter().fold(0.0f64, |acc, x| acc.max(x.abs()));
        let scale = if peak == 0.0 || !peak.is_finite() {
            1.0
        } else {
            peak
        };
        let scaled: Vec<f64> = data.iter().map(|x| x / scale).collect();

        // Exact residuals fix the quantization range. The closed-loop
        // residuals below drift from these by at most the feedback of one
        // step's quantization error; padding by two steps keeps them in
        // range, so no clamping occurs and the error bound holds.
        let exact_residuals = self.predictor.encode_sequence(&scaled);
        let (raw_min, raw_max) = self.quantizer.residual_range(&exact_residuals)?;
        let pad = (raw_max - raw_min) * 2.0 / (self.quantizer.levels() - 1) as f64;
        let min_val = raw_min - pad;
        let max_val = raw_max + pad;

        // Closed-loop quantization: predict from the reconstructed previous
        // state, exactly as the decoder will.
        let mut pairs = Vec::with_capacity(scaled.len());
        let mut reconstructed: Option<(f64, f64)> = None;
        for &x in &scaled {
            let (a_actual, b_actual) = self.predictor.tensorize(x);
            let (a_pred, b_pred) = match reconstructed {
                None => (0.0, 0.0),
                Some((a_prev, b_prev)) => self.predictor.predict_next(a_prev, b_prev),
            };

            let level_a = self.quantizer.quantize(a_actual - a_pred, min_val, max_val);
            let level_b = self.quantizer.quantize(b_actual - b_pred, min_val, max_val);
            pairs.push((level_a, level_b));

            reconstructed = Some((
                a_pred + self.quantizer.dequantize(level_a, min_val, max_val),
                b_pred + self.quantizer.dequantize(level_b, min_val, max_val),
            ));
        }

        Ok(CompressedBlock {
            encoded: self.quantizer.encode_levels(&pairs),
            metadata: BlockMetadata {
                min_val,
                max_val,
                count: pairs.len(),
                original_length: data.len(),
                quantization_levels: self.quantizer.levels(),
                scale,
                gamma: self.predictor.gamma(),
                beta: self.predictor.beta(),
                epsilon: self.predictor.epsilon(),
                zeta: self.predictor.zeta(),
            },
        })
    }

    /// Decompress a block produced by [`compress_data`](Self::compress_data).
    ///
    /// Decoding honors the block's own level count and recurrence constants,
    /// not the engine's.
    pub fn decompress_data(&self, block: &CompressedBlock) -> Result<Vec<f64>, CodecError> {
        let meta = &block.metadata;
        if meta.count != meta.original_length {
            return Err(CodecError::MalformedBlock(format!(
                "count {} does not match original length {}",
                meta.count, meta.original_length
            )));
        }

        let quantizer = QuantizedResidualCodec::new(meta.quantization_levels);
        let residual_meta = ResidualMetadata {
            min_val: meta.min_val,
            max_val: meta.max_val,
            count: meta.count,
        };
        let residuals = quantizer.decode_residuals(&block.encoded, &residual_meta)?;

        let predictor =
            RecurrencePredictor::with_constants(meta.gamma, meta.beta, meta.epsilon, meta.zeta);
        let scale = if meta.scale.is_finite() && meta.scale != 0.0 {
            meta.scale
        } else {
            1.0
        };
        Ok(predictor
            .decode_sequence(&residuals)
            .into_iter()
            .map(|x| x * scale)
            .collect())
    }

    /// Recursively compress all-numeric array leaves in a JSON tree.
    ///
    /// A non-empty array whose elements are all numbers becomes
    /// `{"compressed": true, "data": {...}}`. Other arrays recurse
    /// elementwise; objects recurse per entry; scalars, strings, booleans,
    /// and null pass through unchanged. Empty arrays pass through: they have
    /// no quantization range.
    pub fn compress_json(&self, value: &Value) -> Result<Value, CodecError> {
        match value {
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, child) in map {
                    out.insert(key.clone(), self.compress_json(child)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) if is_numeric_array(items) => {
                let data: Vec<f64> = items.iter().filter_map(Value::as_f64).collect();
                let block = self.compress_data(&data)?;
                let block_value = serde_json::to_value(&block)
                    .map_err(|e| CodecError::MalformedBlock(e.to_string()))?;

                let mut marker = Map::with_capacity(2);
                marker.insert(COMPRESSED_MARKER.to_string(), Value::Bool(true));
                marker.insert(COMPRESSED_DATA.to_string(), block_value);
                Ok(Value::Object(marker))
            }
            Value::Array(items) => {
                let out: Result<Vec<Value>, CodecError> =
                    items.iter().map(|item| self.compress_json(item)).collect();
                Ok(Value::Array(out?))
            }
            other => Ok(other.clone()),
        }
    }

    /// Invert [`compress_json`](Self::compress_json), detecting marker
    /// objects and restoring their numeric arrays.
    pub fn decompress_json(&self, value: &Value) -> Result<Value, CodecError> {
        match value {
            Value::Object(map) => {
                if let Some(block_value) = compressed_block_of(map) {
                    let block: CompressedBlock = serde_json::from_value(block_value.clone())
                        .map_err(|e| CodecError::MalformedBlock(e.to_string()))?;
                    let data = self.decompress_data(&block)?;

                    let mut items = Vec::with_capacity(data.len());
                    for v in data {
                        let number =
                            Number::from_f64(v).ok_or(CodecError::NonRepresentable(v))?;
                        items.push(Value::Number(number));
                    }
                    return Ok(Value::Array(items));
                }

                let mut out = Map::with_capacity(map.len());
                for (key, child) in map {
                    out.insert(key.clone(), self.decompress_json(child)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => {
                let out: Result<Vec<Value>, CodecError> =
                    items.iter().map(|item| self.decompress_json(item)).collect();
                Ok(Value::Array(out?))
            }
            other => Ok(other.clone()),
        }
    }

    /// Compare an original array against its decompressed form.
    ///
    /// Explicit correctness gate for callers; the pipeline never invokes it
    /// on its own. A length mismatch reports as invalid rather than erroring.
    pub fn validate_compression(
        &self,
        original: &[f64],
        decompressed: &[f64],
        tolerance: f64,
    ) -> ValidationReport {
        if original.len() != decompressed.len() {
            return ValidationReport {
                is_valid: false,
                max_absolute_error: f64::INFINITY,
                max_relative_error: f64::INFINITY,
                mean_relative_error: f64::INFINITY,
                tolerance,
            };
        }

        let mut max_abs: f64 = 0.0;
        let mut max_rel: f64 = 0.0;
        let mut rel_sum: f64 = 0.0;
        for (orig, dec) in original.iter().zip(decompressed) {
            let abs_error = (orig - dec).abs();
            let rel_error = abs_error / (orig.abs() + 1e-9);
            max_abs = max_abs.max(abs_error);
            max_rel = max_rel.max(rel_error);
            rel_sum += rel_error;
        }
        let mean_rel = if original.is_empty() {
            0.0
        } else {
            rel_sum / original.len() as f64
        };

        ValidationReport {
            is_valid: max_rel < tolerance,
            max_absolute_error: max_abs,
            max_relative_error: max_rel,
            mean_relative_error: mean_rel,
            tolerance,
        }
    }

    /// Serialized-size ratio of original to compressed form.
    pub fn compression_ratio(original: &Value, compressed: &Value) -> f64 {
        let original_size = original.to_string().len();
        let compressed_size = compressed.to_string().len();
        if compressed_size == 0 {
            return 0.0;
        }
        original_size as f64 / compressed_size as f64
    }
}

/// Whether an array is a compressible numeric leaf.
fn is_numeric_array(items: &[Value]) -> bool {
    !items.is_empty() && items.iter().all(Value::is_number)
}

/// The `data` field of a marker object, if `map` is one.
fn compressed_block_of(map: &Map<String, Value>) -> Option<&Value> {
    match map.get(COMPRESSED_MARKER) {
        Some(Value::Bool(true)) => map.get(COMPRESSED_DATA),
        _ => None,
    }
}
