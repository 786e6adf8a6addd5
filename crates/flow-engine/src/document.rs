//! Serialized graph documents
//!
//! A document is versioned JSON. It can be written as a single line
//! ([`DocumentFormat::Compact`]), tab-indented ([`DocumentFormat::Friendly`])
//! or as URL-safe base64 of the compact form ([`DocumentFormat::Base64`]).
//! Decoding accepts any of the three and validates the JSON against the
//! embedded schema before building the typed [`Document`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use base64::{engine::general_purpose, Engine as _};
use jsonschema::Validator;
use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};
use crate::tool::Point;

/// Current document version
pub const DOCUMENT_VERSION: u32 = 1;

/// Embedded document schema
const SCHEMA_JSON: &str = include_str!("../schema/document.schema.json");

static VALIDATOR: OnceLock<std::result::Result<Validator, String>> = OnceLock::new();

/// A serialized graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub version: u32,
    pub tools: Vec<SerializedTool>,
    /// Opaque canvas viewport owned by the UI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_auto_layout: Option<bool>,
    /// `[toolName, portName]` pairs
    #[serde(default)]
    pub watches: Vec<(String, String)>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            tools: Vec::new(),
            viewport: None,
            lock_auto_layout: None,
            watches: Vec::new(),
        }
    }
}

/// A serialized tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedTool {
    /// Definition name
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Point>,
    /// Values of unconnected inputs
    #[serde(default)]
    pub inputs: BTreeMap<String, serde_json::Value>,
    /// Connected inputs as `[sourceToolName, sourceOutputName]`
    #[serde(default)]
    pub connections: BTreeMap<String, (String, String)>,
}

/// Text encoding of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    #[default]
    Compact,
    Friendly,
    Base64,
}

impl DocumentFormat {
    pub fn name(&self) -> &'static str {
        match self {
            DocumentFormat::Compact => "compact",
            DocumentFormat::Friendly => "friendly",
            DocumentFormat::Base64 => "base64",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DocumentFormat {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "compact" => Ok(DocumentFormat::Compact),
            "friendly" => Ok(DocumentFormat::Friendly),
            "base64" => Ok(DocumentFormat::Base64),
            other => Err(FlowError::Encoding(format!("Unknown format: {}", other))),
        }
    }
}

impl Document {
    /// Encode the document as text
    pub fn encode(&self, format: DocumentFormat) -> Result<String> {
        match format {
            DocumentFormat::Compact => Ok(serde_json::to_string(self)?),
            DocumentFormat::Friendly => {
                let mut buf = Vec::new();
                let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
                let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
                self.serialize(&mut ser)?;
                String::from_utf8(buf).map_err(|e| FlowError::Encoding(e.to_string()))
            }
            DocumentFormat::Base64 => {
                let compact = serde_json::to_string(self)?;
                Ok(general_purpose::URL_SAFE_NO_PAD.encode(compact))
            }
        }
    }

    /// Decode and validate a document in any format
    ///
    /// Text that does not start with `{` is treated as base64.
    pub fn decode(data: &str) -> Result<Document> {
        let data = data.trim();
        let json = if data.starts_with('{') {
            data.to_string()
        } else {
            decode_base64(data)?
        };
        let value: serde_json::Value = serde_json::from_str(&json)?;
        validate(&value)?;
        Ok(serde_json::from_value(value)?)
    }
}

fn decode_base64(data: &str) -> Result<String> {
    let normalized: String = data
        .trim_end_matches('=')
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            c => c,
        })
        .collect();
    let bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(normalized)
        .map_err(|e| FlowError::Encoding(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| FlowError::Encoding(e.to_string()))
}

/// Validate raw document JSON against the embedded schema
pub fn validate(value: &serde_json::Value) -> Result<()> {
    let validator = VALIDATOR.get_or_init(|| {
        let schema: serde_json::Value = serde_json::from_str(SCHEMA_JSON)
            .map_err(|e| format!("Failed to parse schema JSON: {}", e))?;
        Validator::new(&schema).map_err(|e| format!("Failed to compile schema: {}", e))
    });
    let validator = validator.as_ref().map_err(|e| FlowError::Schema(e.clone()))?;

    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|e| {
            let path = e.instance_path.to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{}: {}", path, e)
            }
        })
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(FlowError::Schema(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        let mut inputs = BTreeMap::new();
        inputs.insert("a".to_string(), serde_json::json!(5));
        inputs.insert(
            "buf".to_string(),
            serde_json::json!({"type": "Buffer", "data": [1, 2]}),
        );
        let mut connections = BTreeMap::new();
        connections.insert("b".to_string(), ("Other".to_string(), "out".to_string()));
        Document {
            tools: vec![SerializedTool {
                type_name: "Add".to_string(),
                name: "Add".to_string(),
                loc: Some(Point::new(20.0, 30.0)),
                inputs,
                connections,
            }],
            watches: vec![("Add".to_string(), "out".to_string())],
            ..Document::default()
        }
    }

    #[test]
    fn test_every_format_decodes() {
        let doc = sample();
        for format in [
            DocumentFormat::Compact,
            DocumentFormat::Friendly,
            DocumentFormat::Base64,
        ] {
            let text = doc.encode(format).unwrap();
            assert_eq!(Document::decode(&text).unwrap(), doc, "format {}", format);
        }
    }

    #[test]
    fn test_compact_and_friendly_shapes() {
        let doc = sample();
        let compact = doc.encode(DocumentFormat::Compact).unwrap();
        assert!(!compact.contains('\n'));
        assert!(compact.starts_with(r#"{"version":1,"tools":[{"type":"Add""#));
        assert!(!compact.contains("lockAutoLayout"));

        let friendly = doc.encode(DocumentFormat::Friendly).unwrap();
        assert!(friendly.contains("\n\t\"tools\""));
    }

    #[test]
    fn test_base64_accepts_padding_and_standard_alphabet() {
        let compact = sample().encode(DocumentFormat::Compact).unwrap();
        let padded = general_purpose::STANDARD.encode(&compact);
        assert_eq!(Document::decode(&padded).unwrap(), sample());
    }

    #[test]
    fn test_schema_rejects_bad_documents() {
        let err = Document::decode(r#"{"version": 2, "tools": []}"#).unwrap_err();
        assert!(matches!(err, FlowError::Schema(_)));

        let err = Document::decode(r#"{"version": 1, "tools": [{"name": "x"}]}"#).unwrap_err();
        assert!(matches!(err, FlowError::Schema(_)));

        let err = Document::decode(
            r#"{"version": 1, "tools": [{"type": "Add", "name": "x", "inputs": {"a": null}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, FlowError::Schema(_)));

        let err = Document::decode("%%%").unwrap_err();
        assert!(matches!(err, FlowError::Encoding(_)));
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let doc = Document::decode(r#"{"version": 1, "tools": [{"type": "Add", "name": "x"}]}"#)
            .unwrap();
        assert!(doc.watches.is_empty());
        assert_eq!(doc.tools[0].loc, None);
        assert!(doc.tools[0].inputs.is_empty());
    }

    #[test]
    fn test_format_names_parse() {
        assert_eq!("base64".parse::<DocumentFormat>().unwrap(), DocumentFormat::Base64);
        assert!("yaml".parse::<DocumentFormat>().is_err());
    }
}
