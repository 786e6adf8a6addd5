//! Assert Equal Tool
//!
//! Compares two values of a selectable type.

use std::sync::Arc;

use async_trait::async_trait;
use flow_engine::{Result, Tool, ToolBehavior, ToolDef, ToolInputs, ToolOutputs, ToolPorts, Value, ValueKind};

use crate::selected_type;

pub struct AssertEqualTool;

impl AssertEqualTool {
    pub const PORT_IN1: &'static str = "in1";
    pub const PORT_IN2: &'static str = "in2";
    pub const PORT_TYPE: &'static str = "type";
    pub const PORT_EQ: &'static str = "eq";

    pub fn definition() -> ToolDef {
        ToolDef::new("Assert equal", "Assert equal", Arc::new(AssertEqualTool)).in_group("Assert")
    }
}

inventory::submit!(flow_engine::DefinitionFn(AssertEqualTool::definition));

#[async_trait]
impl ToolBehavior for AssertEqualTool {
    fn declare(&self, ports: &mut ToolPorts) {
        let types: Vec<&str> = ValueKind::ALL.iter().map(|k| k.name()).collect();
        ports.number_input(Self::PORT_IN1, "Input #1", 0.0, None, None);
        ports.number_input(Self::PORT_IN2, "Input #2", 0.0, None, None);
        ports.enum_input(Self::PORT_TYPE, "Input/output type", "number", &types);
        ports.boolean_output(Self::PORT_EQ, "Equal?", None);
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
            for port in [Self::PORT_IN1, Self::PORT_IN2] {
                tool.ports_mut().retype_input(port, ty.clone());
                tool.request_propagation(port);
            }
        }
    }

    fn deserialize_order(&self) -> &[&'static str] {
        &[Self::PORT_TYPE]
    }

    async fn run(&self, inputs: &ToolInputs) -> Result<ToolOutputs> {
        let eq = inputs.require(Self::PORT_IN1)? == inputs.require(Self::PORT_IN2)?;
        log::debug!("AssertEqualTool {}: equal = {}", inputs.tool(), eq);
        Ok(ToolOutputs::new().with(Self::PORT_EQ, eq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_engine::PortType;

    async fn compare(ty: &str, a: Value, b: Value) -> bool {
        let mut tool = AssertEqualTool::definition().gen("Assert equal");
        tool.set_input_value(&tool.input_ref(AssertEqualTool::PORT_TYPE), Value::from(ty))
            .unwrap();
        tool.set_input_value(&tool.input_ref(AssertEqualTool::PORT_IN1), a).unwrap();
        tool.set_input_value(&tool.input_ref(AssertEqualTool::PORT_IN2), b).unwrap();
        tool.run().await;
        tool.ports()
            .output(AssertEqualTool::PORT_EQ)
            .and_then(|o| o.value().as_bool())
            .unwrap()
    }

    #[tokio::test]
    async fn test_compares_selected_type() {
        assert!(compare("number", Value::Number(3.0), Value::Number(3.0)).await);
        assert!(!compare("string", Value::from("a"), Value::from("b")).await);
        assert!(compare("bytes", Value::Bytes(vec![1, 2]), Value::Bytes(vec![1, 2])).await);
        assert!(
            !compare(
                "number[]",
                Value::NumberArray(vec![1.0, 2.0]),
                Value::NumberArray(vec![1.0])
            )
            .await
        );
    }

    #[test]
    fn test_type_converts_existing_values() {
        let mut tool = AssertEqualTool::definition().gen("Assert equal");
        tool.set_input_value(&tool.input_ref(AssertEqualTool::PORT_IN1), Value::Number(5.0))
            .unwrap();
        tool.set_input_value(&tool.input_ref(AssertEqualTool::PORT_TYPE), Value::from("string[]"))
            .unwrap();

        let in1 = tool.ports().input(AssertEqualTool::PORT_IN1).unwrap();
        assert_eq!(in1.port().ty(), &PortType::StringArray);
        assert_eq!(in1.value(), &Value::StringArray(vec!["5".to_string()]));
    }
}
