//! The IDL generator (component F): a pure function from a registry
//! snapshot to a textual `.proto` document, plus a runtime-built
//! `FileDescriptorSet` feeding the reflection service. Grounded on
//! `original_source/src/blazerpc/codegen/proto.py`'s field-numbering and
//! type-mapping rules.

use prost::Message;
use prost_types::field_descriptor_proto::{Label, Type as FieldType};
use prost_types::{
    DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
    MethodDescriptorProto, ServiceDescriptorProto,
};

use crate::registry::{pascal_case, ModelDescriptor, ModelRegistry};
use crate::types::{ScalarKind, SemanticType};

const PACKAGE: &str = "blazerpc";

/// Render the full `.proto` text for a registry snapshot.
pub fn generate_proto(registry: &ModelRegistry) -> String {
    let mut out = String::new();
    out.push_str("syntax = \"proto3\";\n\npackage blazerpc;\n\n");
    out.push_str(TENSOR_PROTO_MESSAGE);

    let models = registry.list();
    for model in models {
        out.push_str(&request_message(model));
        out.push_str(&response_message(model));
    }
    out.push_str(&service_block(models));
    out
}

const TENSOR_PROTO_MESSAGE: &str = "message TensorProto {\n  repeated int64 shape = 1;\n  string dtype = 2;\n  bytes data = 3;\n}\n\n";

fn request_message(model: &ModelDescriptor) -> String {
    let name = pascal_case(&model.name);
    let mut out = format!("message {name}Request {{\n");
    for (idx, (param_name, ty)) in model.inputs.iter().enumerate() {
        let (proto_type, repeated) = proto_field_type(ty);
        let prefix = if repeated { "repeated " } else { "" };
        out.push_str(&format!("  {prefix}{proto_type} {param_name} = {};\n", idx + 1));
    }
    out.push_str("}\n\n");
    out
}

fn response_message(model: &ModelDescriptor) -> String {
    let name = pascal_case(&model.name);
    let mut out = format!("message {name}Response {{\n");
    if !matches!(model.output, SemanticType::Unknown) {
        let (proto_type, repeated) = proto_field_type(&model.output);
        let prefix = if repeated { "repeated " } else { "" };
        out.push_str(&format!("  {prefix}{proto_type} result = 1;\n"));
    }
    out.push_str("}\n\n");
    out
}

fn service_block(models: &[ModelDescriptor]) -> String {
    let mut out = String::from("service InferenceService {\n");
    for model in models {
        let name = pascal_case(&model.name);
        if model.streaming {
            out.push_str(&format!("  rpc Predict{name}({name}Request) returns (stream {name}Response);\n"));
        } else {
            out.push_str(&format!("  rpc Predict{name}({name}Request) returns ({name}Response);\n"));
        }
    }
    out.push_str("}\n");
    out
}

/// Map a `SemanticType` to `(proto_type, is_repeated)`. Narrower than the
/// wire codec's mapping: list-of-list and mapping types fall back to
/// `bytes` rather than flattening (SPEC_FULL.md §4.F / §9).
fn proto_field_type(ty: &SemanticType) -> (&'static str, bool) {
    match ty {
        SemanticType::Scalar(kind) => (scalar_proto_type(*kind), false),
        SemanticType::Tensor { .. } => ("TensorProto", false),
        SemanticType::List(inner) => match inner.as_ref() {
            SemanticType::List(_) => ("bytes", false),
            other => (proto_field_type(other).0, true),
        },
        SemanticType::Opaque | SemanticType::Unknown => ("bytes", false),
    }
}

fn scalar_proto_type(kind: ScalarKind) -> &'static str {
    match kind {
        ScalarKind::Int64 => "int64",
        ScalarKind::Float => "float",
        ScalarKind::Double => "double",
        ScalarKind::Bool => "bool",
        ScalarKind::String => "string",
        ScalarKind::Bytes => "bytes",
    }
}

/// Build the serialized `FileDescriptorSet` the reflection service
/// advertises, mirroring the same field numbering and type mapping as
/// `generate_proto` but as descriptor protos instead of text.
pub fn encoded_file_descriptor_set(registry: &ModelRegistry) -> Vec<u8> {
    let models = registry.list();
    let mut message_type = vec![tensor_proto_descriptor()];
    for model in models {
        message_type.push(request_descriptor(model));
        message_type.push(response_descriptor(model));
    }

    let method = models
        .iter()
        .map(|model| {
            let name = pascal_case(&model.name);
            MethodDescriptorProto {
                name: Some(format!("Predict{name}")),
                input_type: Some(format!(".{PACKAGE}.{name}Request")),
                output_type: Some(format!(".{PACKAGE}.{name}Response")),
                server_streaming: Some(model.streaming),
                client_streaming: Some(false),
                options: None,
            }
        })
        .collect();

    let service = ServiceDescriptorProto {
        name: Some("InferenceService".to_string()),
        method,
        options: None,
    };

    let file = FileDescriptorProto {
        name: Some("blazerpc.proto".to_string()),
        package: Some(PACKAGE.to_string()),
        syntax: Some("proto3".to_string()),
        message_type,
        service: vec![service],
        ..Default::default()
    };

    FileDescriptorSet { file: vec![file] }.encode_to_vec()
}

fn tensor_proto_descriptor() -> DescriptorProto {
    DescriptorProto {
        name: Some("TensorProto".to_string()),
        field: vec![
            field(1, "shape", FieldType::Int64, Label::Repeated, None),
            field(2, "dtype", FieldType::String, Label::Optional, None),
            field(3, "data", FieldType::Bytes, Label::Optional, None),
        ],
        ..Default::default()
    }
}

fn request_descriptor(model: &ModelDescriptor) -> DescriptorProto {
    let name = pascal_case(&model.name);
    let fields = model
        .inputs
        .iter()
        .enumerate()
        .map(|(idx, (param_name, ty))| descriptor_field(idx as i32 + 1, param_name, ty))
        .collect();
    DescriptorProto {
        name: Some(format!("{name}Request")),
        field: fields,
        ..Default::default()
    }
}

fn response_descriptor(model: &ModelDescriptor) -> DescriptorProto {
    let name = pascal_case(&model.name);
    let fields = if matches!(model.output, SemanticType::Unknown) {
        vec![]
    } else {
        vec![descriptor_field(1, "result", &model.output)]
    };
    DescriptorProto {
        name: Some(format!("{name}Response")),
        field: fields,
        ..Default::default()
    }
}

fn descriptor_field(number: i32, name: &str, ty: &SemanticType) -> FieldDescriptorProto {
    match ty {
        SemanticType::Scalar(kind) => field(number, name, scalar_field_type(*kind), Label::Optional, None),
        SemanticType::Tensor { .. } => field(number, name, FieldType::Message, Label::Optional, Some(format!(".{PACKAGE}.TensorProto"))),
        SemanticType::List(inner) => match inner.as_ref() {
            SemanticType::List(_) => field(number, name, FieldType::Bytes, Label::Optional, None),
            SemanticType::Tensor { .. } => field(number, name, FieldType::Message, Label::Repeated, Some(format!(".{PACKAGE}.TensorProto"))),
            SemanticType::Scalar(kind) => field(number, name, scalar_field_type(*kind), Label::Repeated, None),
            SemanticType::Opaque | SemanticType::Unknown => field(number, name, FieldType::Bytes, Label::Repeated, None),
        },
        SemanticType::Opaque | SemanticType::Unknown => field(number, name, FieldType::Bytes, Label::Optional, None),
    }
}

fn scalar_field_type(kind: ScalarKind) -> FieldType {
    match kind {
        ScalarKind::Int64 => FieldType::Int64,
        ScalarKind::Float => FieldType::Float,
        ScalarKind::Double => FieldType::Double,
        ScalarKind::Bool => FieldType::Bool,
        ScalarKind::String => FieldType::String,
        ScalarKind::Bytes => FieldType::Bytes,
    }
}

fn field(number: i32, name: &str, ty: FieldType, label: Label, type_name: Option<String>) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(label as i32),
        r#type: Some(ty as i32),
        type_name,
        ..Default::default()
    }
}
