//! End-to-end coverage: spins up the demo app on an ephemeral port and
//! drives it with a bare `tonic::transport::Channel` plus hand-built
//! raw-bytes requests, bypassing any generated client stub. Mirrors
//! `grpcurl-cli/tests/common/server.rs` + `tests/server_unary.rs`, adapted
//! to an in-process server since `blazerpc-core` is a library, not a binary.

use std::net::TcpListener;
use std::time::Duration;

use bytes::Bytes;
use http::uri::PathAndQuery;
use tonic::client::Grpc;
use tonic::transport::{Channel, Endpoint};

use blazerpc_core::codec::RawCodec;

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

async fn connect(port: u16) -> Channel {
    let endpoint = Endpoint::from_shared(format!("http://127.0.0.1:{port}")).unwrap();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        match endpoint.connect().await {
            Ok(channel) => return channel,
            Err(_) if tokio::time::Instant::now() < deadline => {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            Err(e) => panic!("failed to connect to test server: {e}"),
        }
    }
}

async fn start_demo_server() -> u16 {
    let port = free_port();
    tokio::spawn(async move {
        let _ = blazerpc_demo::app().serve("127.0.0.1", port).await;
    });
    port
}

async fn call_unary(channel: Channel, path: &str, body: &str) -> serde_json::Value {
    let mut client = Grpc::new(channel);
    client.ready().await.unwrap();
    let path: PathAndQuery = path.parse().unwrap();
    let request = tonic::Request::new(Bytes::from(body.to_string()));
    let response = client.unary(request, path, RawCodec).await.unwrap();
    serde_json::from_slice(response.get_ref()).unwrap()
}

#[tokio::test]
async fn echo_model_prefixes_its_input() {
    let port = start_demo_server().await;
    let channel = connect(port).await;
    let json = call_unary(channel, "/blazerpc.InferenceService/PredictEcho", r#"{"text":"hello"}"#).await;
    assert_eq!(json["result"], "Echo: hello");
}

#[tokio::test]
async fn add_model_sums_its_operands() {
    let port = start_demo_server().await;
    let channel = connect(port).await;
    let json = call_unary(channel, "/blazerpc.InferenceService/PredictAdd", r#"{"a":2.5,"b":3.5}"#).await;
    assert_eq!(json["result"], 6.0);
}

#[tokio::test]
async fn sentiment_model_scores_every_item() {
    let port = start_demo_server().await;
    let channel = connect(port).await;
    let json = call_unary(
        channel,
        "/blazerpc.InferenceService/PredictSentiment",
        r#"{"text":["good","bad"]}"#,
    )
    .await;
    assert_eq!(json["result"], serde_json::json!([0.9, 0.9]));
}

#[tokio::test]
async fn double_model_round_trips_a_tensor() {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;

    let port = start_demo_server().await;
    let channel = connect(port).await;

    let data: Vec<u8> = [1.0f32, 2.0, 3.0, 4.0].iter().flat_map(|v| v.to_le_bytes()).collect();
    let body = serde_json::json!({
        "data": { "shape": [4], "dtype": "float", "data": BASE64.encode(&data) }
    });
    let json = call_unary(channel, "/blazerpc.InferenceService/PredictDouble", &body.to_string()).await;

    assert_eq!(json["result"]["shape"], serde_json::json!([4]));
    let decoded = BASE64.decode(json["result"]["data"].as_str().unwrap()).unwrap();
    let cells: Vec<f32> = decoded.chunks_exact(4).map(|c| f32::from_le_bytes(c.try_into().unwrap())).collect();
    assert_eq!(cells, vec![2.0, 4.0, 6.0, 8.0]);
}

#[tokio::test]
async fn tokens_model_streams_three_ordered_chunks() {
    let port = start_demo_server().await;
    let channel = connect(port).await;

    let mut client = Grpc::new(channel);
    client.ready().await.unwrap();
    let path: PathAndQuery = "/blazerpc.InferenceService/PredictTokens".parse().unwrap();
    let request = tonic::Request::new(Bytes::from(r#"{"prompt":"hi"}"#.to_string()));
    let response = client.server_streaming(request, path, RawCodec).await.unwrap();

    let mut stream = response.into_inner();
    let mut chunks = Vec::new();
    while let Some(bytes) = stream.message().await.unwrap() {
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        chunks.push(json["result"].as_str().unwrap().to_string());
    }
    assert_eq!(chunks, vec!["hello", " ", "world"]);
}

#[tokio::test]
async fn unknown_path_reports_unimplemented() {
    let port = start_demo_server().await;
    let channel = connect(port).await;

    let mut client = Grpc::new(channel);
    client.ready().await.unwrap();
    let path: PathAndQuery = "/blazerpc.InferenceService/PredictNope".parse().unwrap();
    let request = tonic::Request::new(Bytes::from(r#"{}"#.to_string()));
    let err = client.unary(request, path, RawCodec).await.unwrap_err();
    assert_eq!(err.code(), tonic::Code::Unimplemented);
}
