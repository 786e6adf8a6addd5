//! Encoding tools
//!
//! Binary-to-text encodings, built as reversible tools.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use flow_engine::reversible::PORT_IN;
use flow_engine::{FlowError, PortType, Result, Reversible, ReversibleTool, ToolDef, ToolInputs, Value};

use crate::text::TextEncoding;

/// Base64 encoder and decoder
///
/// Encoding takes bytes to padded standard base64; decoding also accepts the
/// URL-safe alphabet and missing padding.
pub struct Base64Codec;

impl Base64Codec {
    pub fn definition() -> ToolDef {
        ToolDef::new("Base64", "Base64 encoder/decoder", Arc::new(ReversibleTool(Base64Codec)))
            .in_group("Encoding")
    }
}

inventory::submit!(flow_engine::DefinitionFn(Base64Codec::definition));

fn wrong_type(expected: &str) -> FlowError {
    FlowError::InvalidInputType {
        port: PORT_IN.to_string(),
        expected: expected.to_string(),
    }
}

#[async_trait]
impl Reversible for Base64Codec {
    fn labels(&self) -> [&'static str; 2] {
        ["Encode", "Decode"]
    }

    fn descriptions(&self) -> [&'static str; 2] {
        ["Plaintext", "Encoded"]
    }

    fn plain_type(&self) -> PortType {
        PortType::Bytes
    }

    async fn forward(&self, input: &Value, _inputs: &ToolInputs) -> Result<Value> {
        let bytes = input.as_bytes().ok_or_else(|| wrong_type("bytes"))?;
        Ok(Value::String(general_purpose::STANDARD.encode(bytes)))
    }

    async fn backward(&self, input: &Value, _inputs: &ToolInputs) -> Result<Value> {
        let encoded = input.as_str().ok_or_else(|| wrong_type("string"))?;
        Ok(Value::Bytes(TextEncoding::Base64.encode(encoded)?))
    }
}
