//! Crypto tools
//!
//! Classical ciphers, built as reversible tools.

use std::sync::Arc;

use async_trait::async_trait;
use flow_engine::reversible::PORT_IN;
use flow_engine::{
    FlowError, Result, Reversible, ReversibleTool, ToolDef, ToolInputs, ToolPorts, Value,
};

/// Caesar cipher over the Latin alphabet
///
/// Letters keep their case; everything else passes through.
pub struct CaesarShift;

impl CaesarShift {
    /// Port ID for the shift amount
    pub const PORT_KEY: &'static str = "key";

    pub fn definition() -> ToolDef {
        ToolDef::new("Caesar shift", "Caesar shift", Arc::new(ReversibleTool(CaesarShift)))
            .in_group("Crypto")
    }

    fn shift(text: &str, key: u8) -> String {
        text.chars()
            .map(|c| {
                let base = match c {
                    'a'..='z' => b'a',
                    'A'..='Z' => b'A',
                    _ => return c,
                };
                (((c as u8 - base + key) % 26) + base) as char
            })
            .collect()
    }

    fn key(inputs: &ToolInputs) -> Result<u8> {
        let key = inputs.number(Self::PORT_KEY)?;
        if key.fract() != 0.0 || !(0.0..=25.0).contains(&key) {
            return Err(FlowError::failed(format!("Shift amount must be 0 to 25, got {}", key)));
        }
        Ok(key as u8)
    }

    fn text(input: &Value) -> Result<&str> {
        input.as_str().ok_or_else(|| FlowError::InvalidInputType {
            port: PORT_IN.to_string(),
            expected: "string".to_string(),
        })
    }
}

inventory::submit!(flow_engine::DefinitionFn(CaesarShift::definition));

#[async_trait]
impl Reversible for CaesarShift {
    fn labels(&self) -> [&'static str; 2] {
        ["Shift", "Unshift"]
    }

    fn declare_extra(&self, ports: &mut ToolPorts) {
        ports.number_input(Self::PORT_KEY, "Shift amount", 0.0, Some(0.0), Some(25.0));
    }

    async fn forward(&self, input: &Value, inputs: &ToolInputs) -> Result<Value> {
        let key = Self::key(inputs)?;
        Ok(Value::String(Self::shift(Self::text(input)?, key)))
    }

    async fn backward(&self, input: &Value, inputs: &ToolInputs) -> Result<Value> {
        let key = Self::key(inputs)?;
        Ok(Value::String(Self::shift(Self::text(input)?, (26 - key) % 26)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_engine::reversible::{PORT_DIR, PORT_OUT};
    use flow_engine::ToolState;

    #[test]
    fn test_shift() {
        assert_eq!(CaesarShift::shift("Hello, World!", 3), "Khoor, Zruog!");
        assert_eq!(CaesarShift::shift("xyz", 3), "abc");
        assert_eq!(CaesarShift::shift("abc", 0), "abc");
    }

    #[tokio::test]
    async fn test_shift_and_unshift() {
        let mut tool = CaesarShift::definition().gen("Caesar shift");
        let names: Vec<&str> = tool.ports().inputs().map(|i| i.name()).collect();
        assert_eq!(names, vec!["in", "dir", "key"]);

        tool.set_input_value(&tool.input_ref(PORT_IN), Value::from("attack at dawn"))
            .unwrap();
        tool.set_input_value(&tool.input_ref(CaesarShift::PORT_KEY), Value::Number(13.0))
            .unwrap();
        tool.run().await;
        assert_eq!(tool.state(), ToolState::Good);
        assert_eq!(
            tool.ports().output(PORT_OUT).unwrap().value(),
            &Value::from("nggnpx ng qnja")
        );

        tool.set_input_value(&tool.input_ref(PORT_DIR), Value::Boolean(false))
            .unwrap();
        tool.set_input_value(&tool.input_ref(PORT_IN), Value::from("Khoor"))
            .unwrap();
        tool.set_input_value(&tool.input_ref(CaesarShift::PORT_KEY), Value::Number(3.0))
            .unwrap();
        tool.run().await;
        assert_eq!(tool.ports().output(PORT_OUT).unwrap().value(), &Value::from("Hello"));
        assert_eq!(tool.ports().input(PORT_IN).unwrap().port().description(), "Ciphertext");
    }

    #[test]
    fn test_key_is_bounded() {
        let mut tool = CaesarShift::definition().gen("Caesar shift");
        let key = tool.input_ref(CaesarShift::PORT_KEY);
        assert!(tool.set_input_value(&key, Value::Number(26.0)).is_err());
    }
}
