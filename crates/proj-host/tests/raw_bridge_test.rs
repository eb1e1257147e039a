//! Integration tests for the raw pointer-passing bridge.

mod common;

use common::{host, module, RAW_MODULE};
use proj_host::bridge::RawBridge;
use proj_host::wasm::StrategyExports;
use proj_host::{BridgeError, HostConfig, LoadedModule, MarshalingBridge, UNKNOWN_ERROR};

fn raw_bridge(module: &LoadedModule) -> RawBridge {
    match &module.exports().functions {
        StrategyExports::Raw(raw) => RawBridge::new(raw.clone()),
        StrategyExports::Typed(_) => panic!("expected raw exports"),
    }
}

#[test]
fn test_encode_decode_round_trip() {
    let mut module = module(RAW_MODULE, HostConfig::default());
    let mut bridge = raw_bridge(&module);
    let mut scope = bridge.begin_scope();

    for text in ["EPSG:4326", "Réseau géodésique ✓", ""] {
        let alloc = bridge.encode(&mut module, &mut scope, text).expect("encode failed");
        assert_eq!(alloc.len as usize, text.len());
        assert!(scope.owns(&alloc));
        assert_eq!(bridge.decode(&module, &alloc).expect("decode failed"), text);
    }

    assert_eq!(scope.len(), 3);
    bridge.release_scope(&mut module, scope);
    assert_eq!(module.call_i32("free_count").unwrap(), 3);
}

#[test]
fn test_transform_success() {
    let mut module = module(RAW_MODULE, HostConfig::default());
    let mut bridge = raw_bridge(&module);

    let out = bridge
        .transform2(&mut module, "EPSG:4326", "EPSG:3857", 2.5, 3.0)
        .expect("transform failed");
    assert_eq!(out, [5.0, 4.0]);
    assert!(out.iter().all(|v| v.is_finite()));
}

#[test]
fn test_scratch_released_after_each_call() {
    let mut module = module(RAW_MODULE, HostConfig::default());
    let mut bridge = raw_bridge(&module);

    bridge
        .transform2(&mut module, "EPSG:4326", "EPSG:3857", 1.0, 1.0)
        .unwrap();
    assert_eq!(module.call_i32("free_count").unwrap(), 3);

    // Failed calls release their scratch too.
    bridge
        .transform2(&mut module, "EPSG:4326", "", 1.0, 1.0)
        .unwrap_err();
    assert_eq!(module.call_i32("free_count").unwrap(), 6);
}

#[test]
fn test_error_message_from_last_error_slot() {
    let mut module = module(RAW_MODULE, HostConfig::default());
    let mut bridge = raw_bridge(&module);

    let err = bridge
        .transform2(&mut module, "EPSG:4326", "", 1.0, 1.0)
        .unwrap_err();
    match err {
        BridgeError::Transform(msg) => assert_eq!(msg, "bad crs"),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_empty_error_slot_uses_sentinel() {
    let mut module = module(RAW_MODULE, HostConfig::default());
    let mut bridge = raw_bridge(&module);

    assert_eq!(bridge.decode_error(&mut module), UNKNOWN_ERROR);

    let err = bridge
        .transform2(&mut module, "", "EPSG:3857", 1.0, 1.0)
        .unwrap_err();
    assert_eq!(err.to_string(), UNKNOWN_ERROR);
}

#[test]
fn test_non_finite_result_rejected() {
    let mut module = module(RAW_MODULE, HostConfig::default());
    let mut bridge = raw_bridge(&module);

    let err = bridge
        .transform2(&mut module, "EPSG:4326", "EPSG:3857", f64::NAN, 0.0)
        .unwrap_err();
    assert!(matches!(err, BridgeError::NonFiniteResult(_)));
}

#[test]
fn test_transform3() {
    let mut module = module(RAW_MODULE, HostConfig::default());
    assert!(module.exports().has_transform3());
    let mut bridge = raw_bridge(&module);

    let out = bridge
        .transform3(&mut module, "EPSG:4979", "EPSG:4978", [1.0, 2.0, 3.0])
        .expect("transform3 failed");
    assert_eq!(out, [2.0, 3.0, 2.0]);
}

#[test]
fn test_host_runs_raw_transform() {
    let mut host = host(RAW_MODULE, HostConfig::default());
    assert!(host.is_ready());
    assert!(host.supports_transform3());

    let out = host.run_transform("EPSG:4326", "EPSG:3857", 10.0, -4.0).unwrap();
    assert_eq!(out.input, vec![10.0, -4.0]);
    assert_eq!(out.output, vec![20.0, -3.0]);

    let json = serde_json::to_string(&out).unwrap();
    assert_eq!(json, r#"{"input":[10.0,-4.0],"output":[20.0,-3.0]}"#);

    let out = host
        .run_transform3("EPSG:4979", "EPSG:4978", 1.0, 2.0, 3.0)
        .unwrap();
    assert_eq!(out.input, vec![1.0, 2.0, 3.0]);
    assert_eq!(out.output, vec![2.0, 3.0, 2.0]);
}

#[test]
fn test_fuel_budget_is_per_transform() {
    // Enough for one call, far too little for all of them together.
    let config = HostConfig::default().fuel_limit(5_000);
    let mut host = host(RAW_MODULE, config);

    for i in 0..500 {
        let out = host
            .run_transform("EPSG:4326", "EPSG:3857", 1.0, 1.0)
            .unwrap_or_else(|f| panic!("call {} failed: {}", i, f));
        assert_eq!(out.output, vec![2.0, 2.0]);
    }
}
