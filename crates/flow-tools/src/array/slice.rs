//! Slice Tool
//!
//! Slices bytes or an array. The `type` selector follows the kind of the
//! output connected to `inp`, and the end of the range is given either as
//! an index (`end`) or as a length (`len`).

use std::sync::Arc;

use async_trait::async_trait;
use flow_engine::{
    Result, Tool, ToolBehavior, ToolDef, ToolInputs, ToolOutputs, ToolPorts, Value, ValueKind,
};

use crate::selected_type;

const TYPES: [&str; 4] = ["bytes", "string[]", "number[]", "boolean[]"];
const END_TYPES: [&str; 2] = ["Index", "Length"];

pub struct SliceTool;

impl SliceTool {
    /// Port ID for the type selector
    pub const PORT_TYPE: &'static str = "type";
    pub const PORT_INP: &'static str = "inp";
    /// Port ID for the end type selector
    pub const PORT_ETYP: &'static str = "etyp";
    pub const PORT_START: &'static str = "start";
    pub const PORT_END: &'static str = "end";
    pub const PORT_LEN: &'static str = "len";
    pub const PORT_OUT: &'static str = "out";

    pub fn definition() -> ToolDef {
        ToolDef::new("Slice", "Slice", Arc::new(SliceTool)).in_group("Array")
    }

    /// Array type matching a connected output's kind
    fn deduce_type(kind: ValueKind) -> &'static str {
        match kind {
            ValueKind::Boolean | ValueKind::BooleanArray => "boolean[]",
            ValueKind::Number | ValueKind::NumberArray => "number[]",
            ValueKind::String | ValueKind::StringArray => "string[]",
            ValueKind::Bytes => "bytes",
        }
    }

    fn show_end(ports: &mut ToolPorts, by_length: bool) {
        let end = if by_length { Self::PORT_LEN } else { Self::PORT_END };
        ports.set_active_inputs(&[
            Self::PORT_TYPE,
            Self::PORT_INP,
            Self::PORT_ETYP,
            Self::PORT_START,
            end,
        ]);
    }

    /// Resolve the half-open range to take from a sequence of `len` items
    ///
    /// Negative positions count from the end.
    fn range(len: usize, start: f64, end: f64, by_length: bool) -> (usize, usize) {
        let len_f = len as f64;
        let start = if start < 0.0 { start + len_f } else { start }.max(0.0);
        let end = if by_length {
            start + end.max(0.0)
        } else if end < 0.0 {
            end + len_f
        } else {
            end
        };
        if start >= len_f || start >= end {
            return (0, 0);
        }
        (start as usize, end.min(len_f) as usize)
    }

    fn slice(value: &Value, start: f64, end: f64, by_length: bool) -> Option<Value> {
        let (from, to) = Self::range(value.len()?, start, end, by_length);
        Some(match value {
            Value::Bytes(b) => Value::Bytes(b[from..to].to_vec()),
            Value::StringArray(a) => Value::StringArray(a[from..to].to_vec()),
            Value::NumberArray(a) => Value::NumberArray(a[from..to].to_vec()),
            Value::BooleanArray(a) => Value::BooleanArray(a[from..to].to_vec()),
            _ => return None,
        })
    }
}

inventory::submit!(flow_engine::DefinitionFn(SliceTool::definition));

#[async_trait]
impl ToolBehavior for SliceTool {
    fn declare(&self, ports: &mut ToolPorts) {
        ports.enum_input(Self::PORT_TYPE, "Input/output type", "bytes", &TYPES);
        ports.bytes_input(Self::PORT_INP, "Input");
        ports.enum_input(Self::PORT_ETYP, "End Type", "Index", &END_TYPES);
        ports.number_input(Self::PORT_START, "Start Index", 0.0, None, None);
        ports.number_input(Self::PORT_END, "End Index", 0.0, None, None);
        ports.number_input(Self::PORT_LEN, "Length", 0.0, Some(0.0), None);
        ports.bytes_output(Self::PORT_OUT, "Output");
        Self::show_end(ports, false);
    }

    fn on_input_set(&self, tool: &mut Tool, input: &str, _old: &Value) {
        let value = tool
            .ports()
            .input(input)
            .and_then(|i| i.value().as_str())
            .map(str::to_string);
        match (input, value) {
            (Self::PORT_TYPE, Some(name)) => {
                if let Some(ty) = selected_type(&name) {
                    let ports = tool.ports_mut();
                    ports.retype_input(Self::PORT_INP, ty.clone());
                    ports.retype_output(Self::PORT_OUT, ty);
                    tool.request_propagation(Self::PORT_INP);
                }
            }
            (Self::PORT_ETYP, Some(name)) => {
                Self::show_end(tool.ports_mut(), name == "Length");
            }
            _ => {}
        }
    }

    fn on_source_kind(&self, tool: &mut Tool, input: &str, kind: ValueKind) {
        if input != Self::PORT_INP {
            return;
        }
        let deduced = Self::deduce_type(kind);
        let current = tool
            .ports()
            .input(Self::PORT_TYPE)
            .and_then(|i| i.value().as_str())
            .map(str::to_string);
        if current.as_deref() == Some(deduced) {
            return;
        }
        log::debug!("SliceTool {}: following connected {} as {}", tool.name(), kind, deduced);
        if let Err(e) = tool.set_input_value(&tool.input_ref(Self::PORT_TYPE), Value::from(deduced)) {
            log::warn!("SliceTool {}: cannot switch type: {}", tool.name(), e);
        }
    }

    fn deserialize_order(&self) -> &[&'static str] {
        &[Self::PORT_TYPE, Self::PORT_ETYP]
    }

    async fn run(&self, inputs: &ToolInputs) -> Result<ToolOutputs> {
        let by_length = inputs.string(Self::PORT_ETYP)? == "Length";
        let end_port = if by_length { Self::PORT_LEN } else { Self::PORT_END };
        let value = inputs.require(Self::PORT_INP)?;
        let start = inputs.number(Self::PORT_START)?;
        let end = inputs.number(end_port)?;

        let sliced = Self::slice(value, start, end, by_length).ok_or_else(|| {
            flow_engine::FlowError::InvalidInputType {
                port: Self::PORT_INP.to_string(),
                expected: "bytes or array".to_string(),
            }
        })?;
        Ok(ToolOutputs::new().with(Self::PORT_OUT, sliced))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_engine::{PortType, ToolState};

    #[test]
    fn test_range() {
        assert_eq!(SliceTool::range(5, 1.0, 3.0, false), (1, 3));
        assert_eq!(SliceTool::range(5, -2.0, 5.0, false), (3, 5));
        assert_eq!(SliceTool::range(5, 1.0, -1.0, false), (1, 4));
        assert_eq!(SliceTool::range(5, 3.0, 1.0, false), (0, 0));
        assert_eq!(SliceTool::range(5, 7.0, 9.0, false), (0, 0));
        assert_eq!(SliceTool::range(5, 2.0, 2.0, true), (2, 4));
        assert_eq!(SliceTool::range(5, 3.0, 10.0, true), (3, 5));
        assert_eq!(SliceTool::range(5, 0.0, 99.0, false), (0, 5));
    }

    #[tokio::test]
    async fn test_slice_bytes_by_length() {
        let mut tool = SliceTool::definition().gen("Slice");
        tool.set_input_value(&tool.input_ref(SliceTool::PORT_ETYP), Value::from("Length"))
            .unwrap();
        let names: Vec<&str> = tool.ports().inputs().map(|i| i.name()).collect();
        assert_eq!(names, vec!["type", "inp", "etyp", "start", "len"]);

        tool.set_input_value(&tool.input_ref(SliceTool::PORT_INP), Value::Bytes(vec![1, 2, 3, 4]))
            .unwrap();
        tool.set_input_value(&tool.input_ref(SliceTool::PORT_START), Value::Number(1.0))
            .unwrap();
        tool.set_input_value(&tool.input_ref(SliceTool::PORT_LEN), Value::Number(2.0))
            .unwrap();
        tool.run().await;

        assert_eq!(tool.state(), ToolState::Good);
        assert_eq!(
            tool.ports().output(SliceTool::PORT_OUT).unwrap().value(),
            &Value::Bytes(vec![2, 3])
        );
    }

    #[tokio::test]
    async fn test_type_selector_retypes() {
        let mut tool = SliceTool::definition().gen("Slice");
        tool.set_input_value(&tool.input_ref(SliceTool::PORT_TYPE), Value::from("string[]"))
            .unwrap();
        assert_eq!(
            tool.ports().input(SliceTool::PORT_INP).unwrap().port().ty(),
            &PortType::StringArray
        );

        let words = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        tool.set_input_value(&tool.input_ref(SliceTool::PORT_INP), Value::StringArray(words))
            .unwrap();
        tool.set_input_value(&tool.input_ref(SliceTool::PORT_END), Value::Number(-1.0))
            .unwrap();
        tool.run().await;
        assert_eq!(
            tool.ports().output(SliceTool::PORT_OUT).unwrap().value(),
            &Value::StringArray(vec!["a".to_string(), "b".to_string()])
        );
    }
}
