//! Form Test Tool
//!
//! One input of every form control, echoed to matching outputs. Fails when
//! the string input is `break`.

use std::sync::Arc;

use async_trait::async_trait;
use flow_engine::{FlowError, Result, ToolBehavior, ToolDef, ToolInputs, ToolOutputs, ToolPorts};

const OPTIONS: [&str; 3] = ["foo", "bar", "baz"];

pub struct FormTestTool;

impl FormTestTool {
    pub const PORT_STRING: &'static str = "string";
    pub const PORT_TEXT: &'static str = "text";
    pub const PORT_NUMBER: &'static str = "number";
    pub const PORT_BOOLEAN: &'static str = "boolean";
    pub const PORT_ENUM: &'static str = "enum";

    pub fn definition() -> ToolDef {
        ToolDef::new("Form test", "Form test tool", Arc::new(FormTestTool)).in_group("Test")
    }
}

inventory::submit!(flow_engine::DefinitionFn(FormTestTool::definition));

#[async_trait]
impl ToolBehavior for FormTestTool {
    fn declare(&self, ports: &mut ToolPorts) {
        ports.string_input(Self::PORT_STRING, "String input", "string");
        ports.string_input(Self::PORT_TEXT, "Text input", "text");
        ports.number_input(Self::PORT_NUMBER, "Number input", 10.0, Some(5.0), Some(15.0));
        ports.boolean_input(Self::PORT_BOOLEAN, "Bool input", true, None);
        ports.enum_input(Self::PORT_ENUM, "Enum input", "bar", &OPTIONS);

        ports.string_output(Self::PORT_STRING, "String output");
        ports.string_output(Self::PORT_TEXT, "Text output");
        ports.number_output(Self::PORT_NUMBER, "Number output");
        ports.boolean_output(Self::PORT_BOOLEAN, "Bool output", None);
        ports.enum_output(Self::PORT_ENUM, "Enum output", "bar", &OPTIONS);
    }

    async fn run(&self, inputs: &ToolInputs) -> Result<ToolOutputs> {
        let string = inputs.string(Self::PORT_STRING)?;
        if string == "break" {
            return Err(FlowError::failed("Intentional failure"));
        }
        Ok(ToolOutputs::new()
            .with(Self::PORT_STRING, string)
            .with(Self::PORT_TEXT, inputs.string(Self::PORT_TEXT)?)
            .with(Self::PORT_NUMBER, inputs.number(Self::PORT_NUMBER)?)
            .with(Self::PORT_BOOLEAN, inputs.boolean(Self::PORT_BOOLEAN)?)
            .with(Self::PORT_ENUM, inputs.string(Self::PORT_ENUM)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_engine::{PortType, ToolState, Value};

    #[test]
    fn test_number_input_is_bounded() {
        let mut tool = FormTestTool::definition().gen("Form test");
        let number = tool.input_ref(FormTestTool::PORT_NUMBER);
        assert!(tool.set_input_value(&number, Value::Number(20.0)).is_err());
        assert!(tool.set_input_value(&number, Value::Number(15.0)).is_ok());

        let enum_input = tool.ports().input(FormTestTool::PORT_ENUM).unwrap();
        assert_eq!(enum_input.port().ty(), &PortType::enumeration(&OPTIONS));
    }

    #[tokio::test]
    async fn test_echoes_inputs() {
        let mut tool = FormTestTool::definition().gen("Form test");
        tool.set_input_value(&tool.input_ref(FormTestTool::PORT_ENUM), Value::from("baz"))
            .unwrap();
        tool.run().await;

        assert_eq!(tool.state(), ToolState::Good);
        let ports = tool.ports();
        assert_eq!(ports.output(FormTestTool::PORT_ENUM).unwrap().value(), &Value::from("baz"));
        assert_eq!(ports.output(FormTestTool::PORT_NUMBER).unwrap().value(), &Value::Number(10.0));
    }

    #[tokio::test]
    async fn test_break_fails() {
        let mut tool = FormTestTool::definition().gen("Form test");
        tool.set_input_value(&tool.input_ref(FormTestTool::PORT_STRING), Value::from("break"))
            .unwrap();
        tool.run().await;

        assert_eq!(tool.state(), ToolState::Failed);
        assert_eq!(tool.error(), Some("Intentional failure"));
    }
}
