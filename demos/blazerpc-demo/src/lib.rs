//! Reference models for blazerpc, mirroring the original framework's
//! `examples/simple`, `examples/streaming`, `examples/batching`, and
//! `examples/multi_model` apps folded into a single demo application.

use std::sync::Arc;

use blazerpc_core::{
    App, Args, BlazeError, HandlerKind, Result, ScalarKind, SemanticType, Signature, TensorDim,
    TensorDirection, TensorDtype, TensorEnvelope, Value,
};

/// Build the demo application: register every reference model and return the
/// ready-to-serve `App`. Resolved by `blazerpc-cli`'s static app-ref table as
/// `blazerpc_demo:app`.
pub fn app() -> App {
    let mut app = App::new("blazerpc-demo");

    app.register(
        "echo",
        "1",
        HandlerKind::UnarySync(Arc::new(echo)),
        false,
        Signature::new()
            .param("text", SemanticType::Scalar(ScalarKind::String))
            .output(SemanticType::Scalar(ScalarKind::String)),
    )
    .expect("echo has a valid signature");

    app.register(
        "add",
        "1",
        HandlerKind::UnarySync(Arc::new(add)),
        false,
        Signature::new()
            .param("a", SemanticType::Scalar(ScalarKind::Double))
            .param("b", SemanticType::Scalar(ScalarKind::Double))
            .output(SemanticType::Scalar(ScalarKind::Double)),
    )
    .expect("add has a valid signature");

    app.register(
        "sentiment",
        "1",
        HandlerKind::UnarySync(Arc::new(sentiment)),
        false,
        Signature::new()
            .param("text", SemanticType::list(SemanticType::Scalar(ScalarKind::String)))
            .output(SemanticType::list(SemanticType::Scalar(ScalarKind::Double))),
    )
    .expect("sentiment has a valid signature");

    app.register(
        "double",
        "1",
        HandlerKind::UnarySync(Arc::new(double)),
        false,
        Signature::new()
            .param(
                "data",
                SemanticType::tensor(TensorDtype::Float32, [TensorDim::Fixed(4)], TensorDirection::Input),
            )
            .output(SemanticType::tensor(
                TensorDtype::Float32,
                [TensorDim::Fixed(4)],
                TensorDirection::Output,
            )),
    )
    .expect("double has a valid signature");

    app.register(
        "tokens",
        "1",
        HandlerKind::StreamSync(Arc::new(tokens)),
        true,
        Signature::new()
            .param("prompt", SemanticType::Scalar(ScalarKind::String))
            .output(SemanticType::Scalar(ScalarKind::String)),
    )
    .expect("tokens has a valid signature");

    app
}

fn required<'a>(args: &'a Args, name: &str) -> Result<&'a Value> {
    args.get(name)
        .ok_or_else(|| BlazeError::Serialization(format!("missing required field '{name}'")))
}

fn echo(args: Args) -> Result<Value> {
    let text = match required(&args, "text")? {
        Value::Str(s) => s.clone(),
        _ => return Err(BlazeError::Serialization("'text' must be a string".into())),
    };
    Ok(Value::Str(format!("Echo: {text}")))
}

fn add(args: Args) -> Result<Value> {
    let a = match required(&args, "a")? {
        Value::Double(d) => *d,
        _ => return Err(BlazeError::Serialization("'a' must be a double".into())),
    };
    let b = match required(&args, "b")? {
        Value::Double(d) => *d,
        _ => return Err(BlazeError::Serialization("'b' must be a double".into())),
    };
    Ok(Value::Double(a + b))
}

/// Returns a constant 0.9 score per input string, mirroring the original's
/// stubbed sentiment model.
fn sentiment(args: Args) -> Result<Value> {
    let items = match required(&args, "text")? {
        Value::List(items) => items,
        _ => return Err(BlazeError::Serialization("'text' must be a list".into())),
    };
    let scores = items.iter().map(|_| Value::Double(0.9)).collect();
    Ok(Value::List(scores))
}

fn double(args: Args) -> Result<Value> {
    let tensor = match required(&args, "data")? {
        Value::Tensor(t) => t,
        _ => return Err(BlazeError::Serialization("'data' must be a tensor".into())),
    };
    let doubled: Vec<u8> = tensor
        .data
        .chunks_exact(4)
        .flat_map(|cell| {
            let value = f32::from_le_bytes(cell.try_into().unwrap());
            (value * 2.0).to_le_bytes()
        })
        .collect();
    Ok(Value::Tensor(TensorEnvelope::new(tensor.shape.clone(), tensor.dtype, doubled)))
}

/// Yields the prompt back as three fixed chunks, mirroring the original's
/// toy token generator (`examples/streaming/app.py`'s `tokens` model).
fn tokens(args: Args) -> Result<Box<dyn Iterator<Item = Result<Value>> + Send>> {
    let _prompt = match required(&args, "prompt")? {
        Value::Str(s) => s.clone(),
        _ => return Err(BlazeError::Serialization("'prompt' must be a string".into())),
    };
    let chunks = ["hello", " ", "world"]
        .into_iter()
        .map(|chunk| Ok(Value::Str(chunk.to_string())));
    Ok(Box::new(chunks))
}
