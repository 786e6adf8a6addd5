//! Passthrough Tool
//!
//! Forwards its input unchanged. The `type` selector retypes both sides.

use std::sync::Arc;

use async_trait::async_trait;
use flow_engine::{Result, Tool, ToolBehavior, ToolDef, ToolInputs, ToolOutputs, ToolPorts, Value};

use crate::selected_type;

const TYPES: [&str; 3] = ["string", "number", "boolean"];

pub struct PassthroughTool;

impl PassthroughTool {
    pub const PORT_INP: &'static str = "inp";
    /// Port ID for the type selector
    pub const PORT_TYPE: &'static str = "type";
    pub const PORT_OUT: &'static str = "out";

    pub fn definition() -> ToolDef {
        ToolDef::new("Passthrough", "Pass a value through unchanged", Arc::new(PassthroughTool))
            .in_group("Passthrough")
    }
}

inventory::submit!(flow_engine::DefinitionFn(PassthroughTool::definition));

#[async_trait]
impl ToolBehavior for PassthroughTool {
    fn declare(&self, ports: &mut ToolPorts) {
        ports.number_input(Self::PORT_INP, "Input", 0.0, None, None);
        ports.enum_input(Self::PORT_TYPE, "Input/output type", "number", &TYPES);
        ports.number_output(Self::PORT_OUT, "Output");
    }

    fn on_input_set(&self, tool: &mut Tool, input: &str, _old: &Value) {
        if input != Self::PORT_TYPE {
            return;
        }
        let selected = tool
            .ports()
            .input(Self::PORT_TYPE)
            .and_then(|i| i.value().as_str())
            .and_then(selected_type);
        if let Some(ty) = selected {
            let ports = tool.ports_mut();
            ports.retype_input(Self::PORT_INP, ty.clone());
            ports.retype_output(Self::PORT_OUT, ty);
            tool.request_propagation(Self::PORT_INP);
        }
    }

    fn deserialize_order(&self) -> &[&'static str] {
        &[Self::PORT_TYPE]
    }

    async fn run(&self, inputs: &ToolInputs) -> Result<ToolOutputs> {
        let value = inputs.require(Self::PORT_INP)?.clone();
        Ok(ToolOutputs::new().with(Self::PORT_OUT, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_engine::{PortType, ToolState};

    #[tokio::test]
    async fn test_type_selector_retypes_ports() {
        let mut tool = PassthroughTool::definition().gen("Passthrough");
        tool.set_input_value(&tool.input_ref(PassthroughTool::PORT_INP), Value::Number(42.0))
            .unwrap();
        tool.set_input_value(&tool.input_ref(PassthroughTool::PORT_TYPE), Value::from("string"))
            .unwrap();

        let inp = tool.ports().input(PassthroughTool::PORT_INP).unwrap();
        assert_eq!(inp.port().ty(), &PortType::String);
        assert_eq!(inp.value(), &Value::from("42"));
        assert_eq!(
            tool.ports().output(PassthroughTool::PORT_OUT).unwrap().port().ty(),
            &PortType::String
        );

        tool.run().await;
        assert_eq!(tool.state(), ToolState::Good);
        assert_eq!(
            tool.ports().output(PassthroughTool::PORT_OUT).unwrap().value(),
            &Value::from("42")
        );
    }

    #[test]
    fn test_unknown_type_rejected() {
        let mut tool = PassthroughTool::definition().gen("Passthrough");
        let ty = tool.input_ref(PassthroughTool::PORT_TYPE);
        assert!(tool.set_input_value(&ty, Value::from("bytes")).is_err());
    }
}
