//! Encode and Decode Tools
//!
//! Convert between strings and bytes using a selectable text encoding.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use flow_engine::{FlowError, Result, ToolBehavior, ToolDef, ToolInputs, ToolOutputs, ToolPorts};

/// Text encodings understood by [`EncodeTool`] and [`DecodeTool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Ascii,
    Latin1,
    Utf16Le,
    Hex,
    Base64,
}

impl TextEncoding {
    pub const ALL: [TextEncoding; 6] = [
        TextEncoding::Utf8,
        TextEncoding::Ascii,
        TextEncoding::Latin1,
        TextEncoding::Utf16Le,
        TextEncoding::Hex,
        TextEncoding::Base64,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf8",
            TextEncoding::Ascii => "ascii",
            TextEncoding::Latin1 => "latin1",
            TextEncoding::Utf16Le => "utf16le",
            TextEncoding::Hex => "hex",
            TextEncoding::Base64 => "base64",
        }
    }

    /// Look up an encoding by name; `ucs2` is an alias of `utf16le`
    pub fn from_name(name: &str) -> Option<TextEncoding> {
        match name {
            "ucs2" => Some(TextEncoding::Utf16Le),
            _ => Self::ALL.into_iter().find(|e| e.name() == name),
        }
    }

    fn names() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Self::ALL.iter().map(|e| e.name()).collect();
        names.push("ucs2");
        names
    }

    /// Encode a string into bytes
    ///
    /// `ascii` and `latin1` keep the low byte of each character.
    pub fn encode(&self, s: &str) -> Result<Vec<u8>> {
        match self {
            TextEncoding::Utf8 => Ok(s.as_bytes().to_vec()),
            TextEncoding::Ascii | TextEncoding::Latin1 => {
                Ok(s.chars().map(|c| (c as u32 & 0xff) as u8).collect())
            }
            TextEncoding::Utf16Le => Ok(s.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            TextEncoding::Hex => decode_hex(s.trim()),
            TextEncoding::Base64 => {
                let cleaned: String = s
                    .chars()
                    .filter(|c| !c.is_whitespace() && *c != '=')
                    .map(|c| match c {
                        '-' => '+',
                        '_' => '/',
                        c => c,
                    })
                    .collect();
                general_purpose::STANDARD_NO_PAD
                    .decode(cleaned)
                    .map_err(|e| FlowError::failed(format!("Invalid base64: {}", e)))
            }
        }
    }

    /// Decode bytes into a string
    ///
    /// Invalid UTF-8 and UTF-16 are replaced; `ascii` clears the high bit of
    /// each byte. A trailing odd byte is dropped for `utf16le`.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            TextEncoding::Ascii => bytes.iter().map(|b| (b & 0x7f) as char).collect(),
            TextEncoding::Latin1 => bytes.iter().map(|b| *b as char).collect(),
            TextEncoding::Utf16Le => {
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16_lossy(&units)
            }
            TextEncoding::Hex => bytes.iter().fold(String::new(), |mut s, b| {
                let _ = write!(s, "{:02x}", b);
                s
            }),
            TextEncoding::Base64 => general_purpose::STANDARD.encode(bytes),
        }
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>> {
    if s.len() % 2 != 0 {
        return Err(FlowError::failed("Hex string has an odd number of digits"));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            s.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| FlowError::failed(format!("Invalid hex digits at offset {}", i)))
        })
        .collect()
}

fn selected(inputs: &ToolInputs, port: &str) -> Result<TextEncoding> {
    let name = inputs.string(port)?;
    TextEncoding::from_name(name)
        .ok_or_else(|| FlowError::failed(format!("Unknown encoding: {}", name)))
}

/// String to bytes
pub struct EncodeTool;

impl EncodeTool {
    pub const PORT_IN: &'static str = "in";
    /// Port ID for the encoding selector
    pub const PORT_FMT: &'static str = "fmt";
    pub const PORT_OUT: &'static str = "out";

    pub fn definition() -> ToolDef {
        ToolDef::new("Encode", "String encode", Arc::new(EncodeTool)).in_group("Text")
    }
}

inventory::submit!(flow_engine::DefinitionFn(EncodeTool::definition));

#[async_trait]
impl ToolBehavior for EncodeTool {
    fn declare(&self, ports: &mut ToolPorts) {
        ports.string_input(Self::PORT_IN, "Input", "");
        ports.enum_input(Self::PORT_FMT, "Encoding", "utf8", &TextEncoding::names());
        ports.bytes_output(Self::PORT_OUT, "Output");
    }

    async fn run(&self, inputs: &ToolInputs) -> Result<ToolOutputs> {
        let encoding = selected(inputs, Self::PORT_FMT)?;
        let bytes = encoding.encode(inputs.string(Self::PORT_IN)?)?;
        Ok(ToolOutputs::new().with(Self::PORT_OUT, bytes))
    }
}

/// Bytes to string
pub struct DecodeTool;

impl DecodeTool {
    pub const PORT_IN: &'static str = "in";
    pub const PORT_FMT: &'static str = "fmt";
    pub const PORT_OUT: &'static str = "out";

    pub fn definition() -> ToolDef {
        ToolDef::new("Decode", "String decode", Arc::new(DecodeTool)).in_group("Text")
    }
}

inventory::submit!(flow_engine::DefinitionFn(DecodeTool::definition));

#[async_trait]
impl ToolBehavior for DecodeTool {
    fn declare(&self, ports: &mut ToolPorts) {
        ports.bytes_input(Self::PORT_IN, "Input");
        ports.enum_input(Self::PORT_FMT, "Encoding", "utf8", &TextEncoding::names());
        ports.string_output(Self::PORT_OUT, "Output");
    }

    async fn run(&self, inputs: &ToolInputs) -> Result<ToolOutputs> {
        let encoding = selected(inputs, Self::PORT_FMT)?;
        let text = encoding.decode(inputs.bytes(Self::PORT_IN)?);
        Ok(ToolOutputs::new().with(Self::PORT_OUT, text))
    }
}
