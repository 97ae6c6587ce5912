//! Integration tests for the compression codec.

use serde_json::json;

use tgc_cache::codec::engine::CompressionEngine;
use tgc_cache::codec::quantizer::QuantizedResidualCodec;
use tgc_cache::codec::recurrence::RecurrencePredictor;
use tgc_cache::config::CodecConfig;

#[test]
fn test_scenario_compress_one_to_five() {
    let engine = CompressionEngine::default();
    let data = [1.0, 2.0, 3.0, 4.0, 5.0];

    let block = engine.compress_data(&data).unwrap();
    let decoded = engine.decompress_data(&block).unwrap();

    for (orig, dec) in data.iter().zip(&decoded) {
        assert!(
            (orig - dec).abs() / orig.abs() < 0.01,
            "{orig} decoded as {dec}"
        );
    }
}

#[test]
fn test_error_bound_holds_across_shapes() {
    let engine = CompressionEngine::default();
    let sequences: Vec<Vec<f64>> = vec![
        vec![50.0, 51.5, 49.75, 52.0, 53.25],
        vec![-5.0, 3.0, -2.0, 8.0, -9.0, 1.0],
        vec![7.0; 20],
        vec![1.0e6, 1.001e6, 0.999e6, 1.002e6],
        vec![1e-9, 2e-9, 3e-9],
        (0..200).map(|i| (i as f64 * 0.37).sin() * 100.0 + 1000.0).collect(),
        (0..64).map(|i| i as f64 * 3.7 - 120.0).collect(),
    ];

    for data in sequences {
        let block = engine.compress_data(&data).unwrap();
        let decoded = engine.decompress_data(&block).unwrap();
        assert_eq!(decoded.len(), data.len());

        let meta = &block.metadata;
        let bound = meta.scale * (meta.max_val - meta.min_val)
            / (meta.quantization_levels - 1) as f64
            + 1e-9;
        for (i, (orig, dec)) in data.iter().zip(&decoded).enumerate() {
            assert!(
                (orig - dec).abs() <= bound,
                "element {i}: {orig} decoded as {dec}, bound {bound}"
            );
        }
    }
}

#[test]
fn test_validation_report_gates_quality() {
    let engine = CompressionEngine::default();
    let data: Vec<f64> = (0..50).map(|i| 100.0 + (i as f64 * 0.5).cos() * 3.0).collect();

    let block = engine.compress_data(&data).unwrap();
    let decoded = engine.decompress_data(&block).unwrap();

    let report = engine.validate_compression(&data, &decoded, 0.01);
    assert!(report.is_valid, "{report:?}");
    assert!(report.max_relative_error >= report.mean_relative_error);
}

#[test]
fn test_nested_document_roundtrip() {
    let engine = CompressionEngine::default();
    let tree = json!({
        "symbol": "ACME",
        "indicators": {
            "rsi": [55.2, 58.1, 61.7, 59.3],
            "regime": "bullish"
        },
        "rows": [
            {"close": [101.0, 102.5], "note": "split-adjusted"},
            {"close": [99.5, 98.25], "note": null}
        ],
        "lookback_days": 30
    });

    let compressed = engine.compress_json(&tree).unwrap();
    let restored = engine.decompress_json(&compressed).unwrap();

    // Non-numeric content must survive byte-for-byte.
    assert_eq!(restored["symbol"], tree["symbol"]);
    assert_eq!(restored["indicators"]["regime"], "bullish");
    assert_eq!(restored["rows"][0]["note"], "split-adjusted");
    assert_eq!(restored["rows"][1]["note"], json!(null));
    assert_eq!(restored["lookback_days"], 30);

    // Numeric leaves come back within tolerance.
    let orig: Vec<f64> = tree["indicators"]["rsi"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_f64().unwrap())
        .collect();
    let back: Vec<f64> = restored["indicators"]["rsi"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_f64().unwrap())
        .collect();
    assert!(engine.validate_compression(&orig, &back, 0.01).is_valid);
}

#[test]
fn test_compression_shrinks_long_series() {
    let engine = CompressionEngine::default();
    let series: Vec<f64> = (0..500).map(|i| 1000.0 + (i as f64 * 0.1).sin()).collect();
    let tree = json!({ "series": series });

    let compressed = engine.compress_json(&tree).unwrap();
    let ratio = CompressionEngine::compression_ratio(&tree, &compressed);
    assert!(ratio > 1.0, "ratio={ratio}");
}

#[test]
fn test_decoder_honors_block_constants_and_levels() {
    // Encode with a coarser codec, decode with a default-config engine: the
    // block's own metadata must drive the decode.
    let coarse = CompressionEngine::new(CodecConfig {
        quantization_levels: 64,
    });
    let data = [10.0, 11.0, 12.0, 13.0];
    let block = coarse.compress_data(&data).unwrap();
    assert_eq!(block.metadata.quantization_levels, 64);

    let default_engine = CompressionEngine::default();
    let decoded = default_engine.decompress_data(&block).unwrap();

    let meta = &block.metadata;
    let bound =
        meta.scale * (meta.max_val - meta.min_val) / (meta.quantization_levels - 1) as f64 + 1e-9;
    for (orig, dec) in data.iter().zip(&decoded) {
        assert!((orig - dec).abs() <= bound, "{orig} vs {dec}");
    }
}

#[test]
fn test_predictor_and_quantizer_compose_losslessly_before_quantization() {
    let predictor = RecurrencePredictor::default();
    let codec = QuantizedResidualCodec::default();

    let data = [3.0, 1.0, 4.0, 1.5, 9.0, 2.0, 6.0];
    let residuals = predictor.encode_sequence(&data);

    // The predictor stage alone is exact.
    let decoded = predictor.decode_sequence(&residuals);
    for (orig, dec) in data.iter().zip(&decoded) {
        assert!((orig - dec).abs() < 1e-9);
    }

    // The quantizer stage alone respects its own bound.
    let (encoded, metadata) = codec.encode_residuals(&residuals).unwrap();
    let recovered = codec.decode_residuals(&encoded, &metadata).unwrap();
    let bound = codec.max_quantization_error(metadata.min_val, metadata.max_val) + 1e-12;
    for (orig, rec) in residuals.iter().zip(&recovered) {
        assert!((orig.a - rec.a).abs() <= bound);
        assert!((orig.b - rec.b).abs() <= bound);
    }
}
