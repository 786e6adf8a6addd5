//! Split Tool

use std::sync::Arc;

use async_trait::async_trait;
use flow_engine::{Result, ToolBehavior, ToolDef, ToolInputs, ToolOutputs, ToolPorts};

/// Splits `in` on every occurrence of `on`
///
/// An empty separator splits into characters.
pub struct SplitTool;

impl SplitTool {
    pub const PORT_IN: &'static str = "in";
    pub const PORT_ON: &'static str = "on";
    pub const PORT_OUT: &'static str = "out";

    pub fn definition() -> ToolDef {
        ToolDef::new("Split", "Split text", Arc::new(SplitTool)).in_group("Text")
    }

    fn split(s: &str, on: &str) -> Vec<String> {
        if on.is_empty() {
            s.chars().map(String::from).collect()
        } else {
            s.split(on).map(str::to_string).collect()
        }
    }
}

inventory::submit!(flow_engine::DefinitionFn(SplitTool::definition));

#[async_trait]
impl ToolBehavior for SplitTool {
    fn declare(&self, ports: &mut ToolPorts) {
        ports.string_input(Self::PORT_IN, "Input", "");
        ports.string_input(Self::PORT_ON, "Split", "");
        ports.string_array_output(Self::PORT_OUT, "Parts");
    }

    async fn run(&self, inputs: &ToolInputs) -> Result<ToolOutputs> {
        let parts = Self::split(inputs.string(Self::PORT_IN)?, inputs.string(Self::PORT_ON)?);
        Ok(ToolOutputs::new().with(Self::PORT_OUT, parts))
    }
}
