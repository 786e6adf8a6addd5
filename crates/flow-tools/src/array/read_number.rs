//! Read Number Tool
//!
//! Reads an integer of a chosen width, signedness and byte order from a
//! byte buffer.

use std::sync::Arc;

use async_trait::async_trait;
use flow_engine::{FlowError, Result, ToolBehavior, ToolDef, ToolInputs, ToolOutputs, ToolPorts};

const SIZES: [&str; 10] = [
    "int8", "uint8", "beint16", "leint16", "beuint16", "leuint16", "beint32", "leint32",
    "beuint32", "leuint32",
];

pub struct ReadNumberTool;

impl ReadNumberTool {
    pub const PORT_BUF: &'static str = "buf";
    /// Port ID for the byte offset
    pub const PORT_OFF: &'static str = "off";
    pub const PORT_SIZE: &'static str = "size";
    pub const PORT_OUT: &'static str = "out";

    pub fn definition() -> ToolDef {
        ToolDef::new("Read Number", "Read Number", Arc::new(ReadNumberTool)).in_group("Array")
    }

    fn read(buf: &[u8], off: usize, size: &str) -> Result<f64> {
        let width = match size {
            "int8" | "uint8" => 1,
            "beint16" | "leint16" | "beuint16" | "leuint16" => 2,
            _ => 4,
        };
        let bytes = off
            .checked_add(width)
            .and_then(|end| buf.get(off..end))
            .ok_or_else(|| {
                FlowError::failed(format!(
                    "Cannot read {} bytes at offset {} from a {}-byte buffer",
                    width,
                    off,
                    buf.len()
                ))
            })?;

        let n = match size {
            "int8" => bytes[0] as i8 as f64,
            "uint8" => bytes[0] as f64,
            "beint16" => i16::from_be_bytes([bytes[0], bytes[1]]) as f64,
            "leint16" => i16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            "beuint16" => u16::from_be_bytes([bytes[0], bytes[1]]) as f64,
            "leuint16" => u16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            "beint32" => i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            "leint32" => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            "beuint32" => u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            "leuint32" => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            other => return Err(FlowError::failed(format!("Unknown size: {}", other))),
        };
        Ok(n)
    }
}

inventory::submit!(flow_engine::DefinitionFn(ReadNumberTool::definition));

#[async_trait]
impl ToolBehavior for ReadNumberTool {
    fn declare(&self, ports: &mut ToolPorts) {
        ports.bytes_input(Self::PORT_BUF, "Buffer");
        ports.number_input(Self::PORT_OFF, "Offset", 0.0, Some(0.0), None);
        ports.enum_input(Self::PORT_SIZE, "Size", "leuint32", &SIZES);
        ports.number_output(Self::PORT_OUT, "Output");
    }

    async fn run(&self, inputs: &ToolInputs) -> Result<ToolOutputs> {
        let off = inputs.number(Self::PORT_OFF)?;
        if off.fract() != 0.0 {
            return Err(FlowError::failed(format!("Offset {} is not an integer", off)));
        }
        let n = Self::read(inputs.bytes(Self::PORT_BUF)?, off as usize, inputs.string(Self::PORT_SIZE)?)?;
        Ok(ToolOutputs::new().with(Self::PORT_OUT, n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_engine::{ToolState, Value};

    #[test]
    fn test_read_sizes() {
        let buf = [0xff, 0x01, 0x02, 0x03, 0x04];
        assert_eq!(ReadNumberTool::read(&buf, 0, "int8").unwrap(), -1.0);
        assert_eq!(ReadNumberTool::read(&buf, 0, "uint8").unwrap(), 255.0);
        assert_eq!(ReadNumberTool::read(&buf, 1, "beuint16").unwrap(), 0x0102 as f64);
        assert_eq!(ReadNumberTool::read(&buf, 1, "leuint16").unwrap(), 0x0201 as f64);
        assert_eq!(ReadNumberTool::read(&buf, 0, "beint16").unwrap(), -255.0);
        assert_eq!(ReadNumberTool::read(&buf, 1, "leuint32").unwrap(), 0x04030201 as f64);
        assert_eq!(ReadNumberTool::read(&buf, 1, "beint32").unwrap(), 0x01020304 as f64);
        assert!(ReadNumberTool::read(&buf, 2, "leuint32").is_err());
    }

    #[tokio::test]
    async fn test_read_number_tool() {
        let mut tool = ReadNumberTool::definition().gen("Read Number");
        tool.set_input_value(&tool.input_ref(ReadNumberTool::PORT_BUF), Value::Bytes(vec![1, 0, 0, 0]))
            .unwrap();
        tool.run().await;
        assert_eq!(tool.state(), ToolState::Good);
        assert_eq!(
            tool.ports().output(ReadNumberTool::PORT_OUT).unwrap().value(),
            &Value::Number(1.0)
        );

        tool.set_input_value(&tool.input_ref(ReadNumberTool::PORT_OFF), Value::Number(1.0))
            .unwrap();
        tool.run().await;
        assert_eq!(tool.state(), ToolState::Failed);
    }
}
