//! Index Tool
//!
//! Reads one entry of a string array. The index is bounded by the array
//! length and the output is labelled with the index it reads.

use std::sync::Arc;

use async_trait::async_trait;
use flow_engine::{
    FlowError, PortType, Result, Tool, ToolBehavior, ToolDef, ToolInputs, ToolOutputs, ToolPorts,
    Value,
};

pub struct IndexTool;

impl IndexTool {
    pub const PORT_IN: &'static str = "in";
    pub const PORT_IDX: &'static str = "idx";
    pub const PORT_OUT: &'static str = "out";

    pub fn definition() -> ToolDef {
        ToolDef::new("Index", "Index into an array", Arc::new(IndexTool)).in_group("Text")
    }

    fn describe_entry(tool: &mut Tool) {
        let idx = tool
            .ports()
            .input(Self::PORT_IDX)
            .and_then(|i| i.value().as_number())
            .unwrap_or(0.0);
        tool.ports_mut()
            .describe_output(Self::PORT_OUT, &format!("Entry {}", idx));
    }
}

inventory::submit!(flow_engine::DefinitionFn(IndexTool::definition));

#[async_trait]
impl ToolBehavior for IndexTool {
    fn declare(&self, ports: &mut ToolPorts) {
        ports.string_array_input(Self::PORT_IN, "Input");
        ports.number_input(Self::PORT_IDX, "Index", 0.0, Some(0.0), Some(0.0));
        ports.string_output(Self::PORT_OUT, "Entry 0");
    }

    fn on_input_set(&self, tool: &mut Tool, input: &str, _old: &Value) {
        match input {
            Self::PORT_IN => {
                let len = tool
                    .ports()
                    .input(Self::PORT_IN)
                    .and_then(|i| i.value().len())
                    .unwrap_or(0);
                let max = len.saturating_sub(1) as f64;
                let ty = PortType::Number {
                    min: Some(0.0),
                    max: Some(max),
                };
                // Out-of-range indices reset to 0
                tool.ports_mut().retype_input(Self::PORT_IDX, ty);
                Self::describe_entry(tool);
            }
            Self::PORT_IDX => Self::describe_entry(tool),
            _ => {}
        }
    }

    fn deserialize_order(&self) -> &[&'static str] {
        &[Self::PORT_IN]
    }

    async fn run(&self, inputs: &ToolInputs) -> Result<ToolOutputs> {
        let entries = inputs.string_array(Self::PORT_IN)?;
        let idx = inputs.number(Self::PORT_IDX)?;
        let entry = (idx >= 0.0 && idx.fract() == 0.0)
            .then(|| entries.get(idx as usize))
            .flatten()
            .ok_or_else(|| {
                FlowError::failed(format!("Index {} out of range for {} entries", idx, entries.len()))
            })?;
        Ok(ToolOutputs::new().with(Self::PORT_OUT, entry.clone()))
    }
}
