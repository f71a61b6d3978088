mod common;

use common::{assert_exit_code, run};

#[test]
fn proto_writes_blaze_service_proto_into_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().to_str().unwrap();

    let r = run(&["proto", "blazerpc_demo:app", "--output-dir", out_dir]);
    assert_exit_code(&r, 0);

    let written = dir.path().join("blaze_service.proto");
    assert!(written.exists(), "expected {} to be written", written.display());

    let text = std::fs::read_to_string(&written).unwrap();
    assert!(text.contains("package blazerpc;"));
    assert!(text.contains("service InferenceService {"));
    assert!(text.contains("rpc PredictEcho(EchoRequest) returns (EchoResponse);"));
}

#[test]
fn proto_creates_missing_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("nested").join("protos");

    let r = run(&["proto", "blazerpc_demo:app", "--output-dir", nested.to_str().unwrap()]);
    assert_exit_code(&r, 0);
    assert!(nested.join("blaze_service.proto").exists());
}

#[test]
fn proto_rejects_an_unknown_app_ref() {
    let dir = tempfile::tempdir().unwrap();
    let r = run(&["proto", "nonexistent:app", "--output-dir", dir.path().to_str().unwrap()]);
    assert_exit_code(&r, 1);
}
