//! Flow Tools
//!
//! Built-in tool implementations for the flow engine. Every tool submits its
//! definition with `inventory`, so linking this crate is enough for
//! [`flow_engine::ToolRegistry::with_builtins`] to find it.
//!
//! # Groups
//!
//! - **Test**: Tools for exercising the engine and editor
//! - **Passthrough**: Forward a value unchanged
//! - **Assert**: Compare values
//! - **Text**: String encoding, splitting and indexing
//! - **Array**: Slicing and binary reads
//! - **Crypto**: Classical ciphers
//! - **Encoding**: Binary-to-text encodings
//! - **Math**: Expression evaluation

pub mod array;
pub mod assert;
pub mod crypto;
pub mod encoding;
pub mod math;
pub mod passthrough;
pub mod test;
pub mod text;

use flow_engine::{GroupInfo, ToolRegistry};

// Re-export all tools for convenience
pub use array::*;
pub use assert::AssertEqualTool;
pub use crypto::CaesarShift;
pub use encoding::Base64Codec;
pub use math::*;
pub use passthrough::PassthroughTool;
pub use test::*;
pub use text::*;

inventory::submit!(GroupInfo { name: "Test", icon: "fas fa-vial", order: 0 });
inventory::submit!(GroupInfo { name: "Passthrough", icon: "fas fa-arrow-right", order: 1 });
inventory::submit!(GroupInfo { name: "Assert", icon: "fas fa-equals", order: 2 });
inventory::submit!(GroupInfo { name: "Text", icon: "fas fa-envelope-open-text", order: 3 });
inventory::submit!(GroupInfo { name: "Array", icon: "far fa-list-alt", order: 4 });
inventory::submit!(GroupInfo { name: "Crypto", icon: "fas fa-lock", order: 5 });
inventory::submit!(GroupInfo { name: "Encoding", icon: "fas fa-code", order: 6 });
inventory::submit!(GroupInfo { name: "Math", icon: "fas fa-calculator", order: 7 });

/// Registry holding every built-in tool
pub fn registry() -> ToolRegistry {
    ToolRegistry::with_builtins()
}

/// Port type named by a `type` selector value
pub(crate) fn selected_type(name: &str) -> Option<flow_engine::PortType> {
    flow_engine::ValueKind::from_name(name).map(flow_engine::PortType::of_kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_collects_all_builtins() {
        let registry = registry();
        assert_eq!(registry.len(), 15, "Expected 15 built-in tools");

        for name in [
            "Add",
            "Form test",
            "Sleep",
            "Lipsum",
            "Passthrough",
            "Assert equal",
            "Encode",
            "Decode",
            "Split",
            "Index",
            "Slice",
            "Read Number",
            "Caesar shift",
            "Base64",
            "Calc",
        ] {
            assert!(registry.has(name), "missing {}", name);
        }
    }

    #[test]
    fn test_groups_follow_palette_order() {
        let registry = registry();
        let groups: Vec<(&str, Option<&str>)> =
            registry.groups().iter().map(|g| (g.name, g.icon)).collect();
        assert_eq!(groups[0], ("Test", Some("fas fa-vial")));
        assert_eq!(groups.last(), Some(&("Math", Some("fas fa-calculator"))));
        assert_eq!(groups.len(), 8);
    }
}
