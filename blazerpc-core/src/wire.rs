//! The wire codec (component C): a JSON request/response envelope with a
//! tensor sub-encoding, decoded/encoded against a model's declared
//! `SemanticType`s. This is intentionally independent of protobuf — the
//! gRPC-transport bypass itself lives in `codec.rs`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value as Json;

use crate::error::{BlazeError, Result};
use crate::types::{ScalarKind, SemanticType, TensorDtype};
use crate::value::{Args, TensorEnvelope, Value};

/// Decode a JSON request envelope into a handler argument map.
///
/// Missing keys mean the parameter is absent (the handler enforces its own
/// defaults or fails); unknown keys are ignored.
pub fn decode_request(bytes: &[u8], inputs: &[(String, SemanticType)]) -> Result<Args> {
    let json: Json = serde_json::from_slice(bytes)
        .map_err(|e| BlazeError::Serialization(format!("malformed request JSON: {e}")))?;
    let object = json
        .as_object()
        .ok_or_else(|| BlazeError::Serialization("request envelope must be a JSON object".into()))?;

    let mut args = Args::new();
    for (name, ty) in inputs {
        if let Some(raw) = object.get(name) {
            let value = decode_value(raw, ty)
                .map_err(|e| BlazeError::Serialization(format!("field '{name}': {e}")))?;
            args.insert(name.clone(), value);
        }
    }
    Ok(args)
}

/// Encode a handler's result into a `{"result": ...}` response envelope.
pub fn encode_response(result: &Value, output: &SemanticType) -> Result<Vec<u8>> {
    check_recognizable(result, output)?;
    let envelope = serde_json::json!({ "result": encode_value(result) });
    serde_json::to_vec(&envelope)
        .map_err(|e| BlazeError::Serialization(format!("failed to encode response: {e}")))
}

/// Reject a tensor-typed output whose actual value isn't a tensor — the
/// only shape the spec requires catching at encode time, since every other
/// `Value` variant is self-describing.
fn check_recognizable(value: &Value, ty: &SemanticType) -> Result<()> {
    if let SemanticType::Tensor { .. } = ty {
        if !matches!(value, Value::Tensor(_)) {
            return Err(BlazeError::Serialization(
                "output is declared as a tensor but the handler did not return one".into(),
            ));
        }
    }
    Ok(())
}

fn decode_value(json: &Json, ty: &SemanticType) -> std::result::Result<Value, String> {
    match ty {
        SemanticType::Scalar(kind) => decode_scalar(json, *kind),
        SemanticType::List(inner) => {
            let array = json.as_array().ok_or("expected a JSON array")?;
            let items = array
                .iter()
                .map(|item| decode_value(item, inner))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(Value::List(items))
        }
        SemanticType::Tensor { dtype, .. } => decode_tensor(json, *dtype),
        SemanticType::Opaque => decode_opaque(json),
        SemanticType::Unknown => decode_passthrough(json),
    }
}

fn decode_scalar(json: &Json, kind: ScalarKind) -> std::result::Result<Value, String> {
    match kind {
        ScalarKind::Int64 => json
            .as_i64()
            .map(Value::Int64)
            .ok_or("expected an integer".into()),
        ScalarKind::Float => json
            .as_f64()
            .map(|f| Value::Float(f as f32))
            .ok_or("expected a number".into()),
        ScalarKind::Double => json
            .as_f64()
            .map(Value::Double)
            .ok_or("expected a number".into()),
        ScalarKind::Bool => json.as_bool().map(Value::Bool).ok_or("expected a boolean".into()),
        ScalarKind::String => json
            .as_str()
            .map(|s| Value::Str(s.to_string()))
            .ok_or("expected a string".into()),
        ScalarKind::Bytes => {
            let s = json.as_str().ok_or("expected a base64 string")?;
            let bytes = BASE64.decode(s).map_err(|e| format!("invalid base64: {e}"))?;
            Ok(Value::Bytes(bytes))
        }
    }
}

fn decode_tensor(json: &Json, expected: TensorDtype) -> std::result::Result<Value, String> {
    let object = json.as_object().ok_or("expected a tensor object")?;

    let shape: Vec<i64> = object
        .get("shape")
        .and_then(Json::as_array)
        .ok_or("tensor missing 'shape'")?
        .iter()
        .map(|v| v.as_i64().ok_or("tensor shape entries must be integers"))
        .collect::<std::result::Result<_, _>>()?;

    let dtype_tag = object
        .get("dtype")
        .and_then(Json::as_str)
        .ok_or("tensor missing 'dtype'")?;
    let dtype = TensorDtype::from_tag(dtype_tag).ok_or_else(|| format!("unknown dtype '{dtype_tag}'"))?;
    if dtype != expected {
        return Err(format!(
            "tensor dtype mismatch: expected '{}', got '{}'",
            expected.tag(),
            dtype_tag
        ));
    }

    let data_b64 = object.get("data").and_then(Json::as_str).ok_or("tensor missing 'data'")?;
    let data = BASE64
        .decode(data_b64)
        .map_err(|e| format!("invalid base64 tensor data: {e}"))?;

    validate_tensor_len(&shape, dtype, &data)?;
    Ok(Value::Tensor(TensorEnvelope::new(shape, dtype, data)))
}

/// `len(data)` must equal `∏shape · sizeof(dtype)` for fixed-width dtypes.
/// `bytes`/`string` cells are variable-length and length-prefixed, so their
/// total length can't be checked this way.
fn validate_tensor_len(shape: &[i64], dtype: TensorDtype, data: &[u8]) -> std::result::Result<(), String> {
    if let Some(cell_size) = dtype.fixed_cell_size() {
        let elements: i64 = shape.iter().product();
        let expected = elements as usize * cell_size;
        if data.len() != expected {
            return Err(format!(
                "tensor data length {} does not match shape*dtype size {}",
                data.len(),
                expected
            ));
        }
    }
    Ok(())
}

fn decode_opaque(json: &Json) -> std::result::Result<Value, String> {
    let s = json.as_str().ok_or("expected a base64 string for an opaque field")?;
    let bytes = BASE64.decode(s).map_err(|e| format!("invalid base64: {e}"))?;
    Ok(Value::Opaque(bytes))
}

/// `Unknown` parameters never occur in practice (inputs without a
/// recognized annotation map to `Opaque`), but decode conservatively rather
/// than panic if one ever does.
fn decode_passthrough(json: &Json) -> std::result::Result<Value, String> {
    if json.is_null() {
        Ok(Value::Null)
    } else {
        decode_opaque(json)
    }
}

/// Encode a `Value` to its JSON wire representation. Every variant is
/// self-describing, so (unlike decoding) no `SemanticType` is needed here.
fn encode_value(value: &Value) -> Json {
    match value {
        Value::Int64(n) => serde_json::json!(n),
        Value::Float(f) => serde_json::json!(f),
        Value::Double(d) => serde_json::json!(d),
        Value::Bool(b) => serde_json::json!(b),
        Value::Str(s) => serde_json::json!(s),
        Value::Bytes(b) => serde_json::json!(BASE64.encode(b)),
        Value::List(items) => Json::Array(items.iter().map(encode_value).collect()),
        Value::Tensor(t) => serde_json::json!({
            "shape": t.shape,
            "dtype": t.dtype.tag(),
            "data": BASE64.encode(&t.data),
        }),
        Value::Opaque(b) => serde_json::json!(BASE64.encode(b)),
        Value::Null => Json::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32le(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn decode_then_encode_round_trips_scalars() {
        let inputs = vec![
            ("a".to_string(), SemanticType::Scalar(ScalarKind::Double)),
            ("b".to_string(), SemanticType::Scalar(ScalarKind::Double)),
        ];
        let args = decode_request(br#"{"a":2.5,"b":3.5}"#, &inputs).unwrap();
        assert_eq!(args.get("a"), Some(&Value::Double(2.5)));
        assert_eq!(args.get("b"), Some(&Value::Double(3.5)));
    }

    #[test]
    fn unknown_keys_are_ignored_and_missing_keys_are_absent() {
        let inputs = vec![("text".to_string(), SemanticType::Scalar(ScalarKind::String))];
        let args = decode_request(br#"{"text":"hi","extra":123}"#, &inputs).unwrap();
        assert_eq!(args.len(), 1);
        assert_eq!(args.get("text"), Some(&Value::Str("hi".into())));

        let args = decode_request(br#"{}"#, &inputs).unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let err = decode_request(b"not json", &[]).unwrap_err();
        assert!(matches!(err, BlazeError::Serialization(_)));
    }

    #[test]
    fn encode_response_wraps_result_key() {
        let bytes = encode_response(&Value::Str("hi".into()), &SemanticType::Scalar(ScalarKind::String)).unwrap();
        let json: Json = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["result"], "hi");
    }

    #[test]
    fn tensor_round_trips_bit_exactly() {
        let dtype_ty = SemanticType::tensor(
            TensorDtype::Float32,
            [crate::types::TensorDim::Fixed(4)],
            crate::types::TensorDirection::Input,
        );
        let data = f32le(&[1.0, 2.0, 3.0, 4.0]);
        let encoded = serde_json::json!({
            "shape": [4],
            "dtype": "float",
            "data": BASE64.encode(&data),
        });
        let bytes = serde_json::to_vec(&serde_json::json!({ "data": encoded })).unwrap();
        let object: serde_json::Map<String, Json> = serde_json::from_slice(&bytes).unwrap();
        let value = decode_value(object.get("data").unwrap(), &dtype_ty).unwrap();
        match &value {
            Value::Tensor(t) => {
                assert_eq!(t.shape, vec![4]);
                assert_eq!(t.data, data);
            }
            _ => panic!("expected tensor"),
        }

        let re_encoded = encode_value(&value);
        assert_eq!(re_encoded["shape"], serde_json::json!([4]));
        assert_eq!(re_encoded["dtype"], "float");
    }

    #[test]
    fn tensor_length_mismatch_is_rejected() {
        let err = decode_tensor(
            &serde_json::json!({"shape":[4],"dtype":"float","data": BASE64.encode([0u8;4])}),
            TensorDtype::Float32,
        )
        .unwrap_err();
        assert!(err.contains("length"));
    }

    #[test]
    fn tensor_typed_output_must_be_a_tensor_value() {
        let output = SemanticType::tensor(
            TensorDtype::Float32,
            [crate::types::TensorDim::Fixed(4)],
            crate::types::TensorDirection::Output,
        );
        let err = encode_response(&Value::Str("not a tensor".into()), &output).unwrap_err();
        assert!(matches!(err, BlazeError::Serialization(_)));
    }

    #[test]
    fn bytes_scalars_round_trip_through_base64() {
        let inputs = vec![("blob".to_string(), SemanticType::Scalar(ScalarKind::Bytes))];
        let raw = b"hello bytes";
        let json = serde_json::json!({ "blob": BASE64.encode(raw) });
        let args = decode_request(&serde_json::to_vec(&json).unwrap(), &inputs).unwrap();
        assert_eq!(args.get("blob"), Some(&Value::Bytes(raw.to_vec())));
    }
}
