//! Tool definitions and the registry used to instantiate them
//!
//! A [`ToolDef`] names a tool kind and carries the shared behavior every
//! instance runs. Definitions are grouped for palette display and looked up
//! by name when a document is loaded.
//!
//! # Usage
//!
//! ```ignore
//! use flow_engine::{ToolDef, ToolRegistry};
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(ToolDef::new("Add", "Add two numbers", Arc::new(AddTool)).in_group("Test"));
//!
//! let tool = registry.get("Add").unwrap().gen("Add #2");
//! ```
//!
//! Tool libraries submit definitions at link time:
//!
//! ```ignore
//! inventory::submit!(flow_engine::DefinitionFn(SliceTool::definition));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::tool::{Tool, ToolBehavior};

/// Group used for definitions registered without one
pub const DEFAULT_GROUP: &str = "Other";

/// Factory metadata for one tool kind
#[derive(Clone)]
pub struct ToolDef {
    /// Unique name, used as `type` in documents
    pub name: String,
    pub description: String,
    /// Palette group
    pub group: String,
    /// Optional editor widget id
    pub editor: Option<String>,
    /// Optional viewer widget id
    pub viewer: Option<String>,
    behavior: Arc<dyn ToolBehavior>,
}

impl fmt::Debug for ToolDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDef")
            .field("name", &self.name)
            .field("group", &self.group)
            .field("editor", &self.editor)
            .field("viewer", &self.viewer)
            .finish_non_exhaustive()
    }
}

impl ToolDef {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        behavior: Arc<dyn ToolBehavior>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            group: DEFAULT_GROUP.to_string(),
            editor: None,
            viewer: None,
            behavior,
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_editor(mut self, editor: impl Into<String>) -> Self {
        self.editor = Some(editor.into());
        self
    }

    pub fn with_viewer(mut self, viewer: impl Into<String>) -> Self {
        self.viewer = Some(viewer.into());
        self
    }

    /// Instantiate a tool with the given (already unique) name
    pub fn gen(&self, name: &str) -> Tool {
        Tool::new(self.name.clone(), name, Arc::clone(&self.behavior))
    }
}

/// Link-time registration of a tool definition
pub struct DefinitionFn(pub fn() -> ToolDef);

inventory::collect!(DefinitionFn);

/// Link-time registration of a palette group
pub struct GroupInfo {
    pub name: &'static str,
    /// Icon class shown in the palette
    pub icon: &'static str,
    /// Sort key, lower first
    pub order: u32,
}

inventory::collect!(GroupInfo);

/// A palette group with its definitions
#[derive(Debug, Clone)]
pub struct ToolGroup<'a> {
    pub name: &'a str,
    pub icon: Option<&'a str>,
    pub tools: Vec<&'a ToolDef>,
}

struct GroupEntry {
    icon: String,
    order: u32,
}

/// Registry of tool definitions
///
/// Registries can be composed by merging:
/// ```ignore
/// let mut registry = ToolRegistry::with_builtins();
/// registry.merge(plugin_registry); // Add plugin tools
/// ```
pub struct ToolRegistry {
    entries: HashMap<String, ToolDef>,
    order: Vec<String>,
    groups: HashMap<String, GroupEntry>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            groups: HashMap::new(),
        }
    }

    /// Registry populated with every definition submitted via `inventory`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for group in inventory::iter::<GroupInfo> {
            registry.register_group(group.name, group.icon, group.order);
        }
        for def in inventory::iter::<DefinitionFn> {
            registry.register((def.0)());
        }
        log::debug!("Registered {} builtin tools", registry.len());
        registry
    }

    /// Register a definition, replacing any with the same name
    pub fn register(&mut self, def: ToolDef) {
        if !self.entries.contains_key(&def.name) {
            self.order.push(def.name.clone());
        }
        self.entries.insert(def.name.clone(), def);
    }

    /// Describe a palette group
    pub fn register_group(&mut self, name: &str, icon: &str, order: u32) {
        self.groups.insert(
            name.to_string(),
            GroupEntry {
                icon: icon.to_string(),
                order,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&ToolDef> {
        self.entries.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Definitions in registration order
    pub fn definitions(&self) -> impl Iterator<Item = &ToolDef> {
        self.order.iter().filter_map(|name| self.entries.get(name))
    }

    /// Definitions grouped for the palette
    ///
    /// Groups are sorted by their registered order, then by name; groups
    /// without registration sort last.
    pub fn groups(&self) -> Vec<ToolGroup<'_>> {
        let mut groups: Vec<ToolGroup<'_>> = Vec::new();
        for def in self.definitions() {
            match groups.iter_mut().find(|g| g.name == def.group) {
                Some(group) => group.tools.push(def),
                None => groups.push(ToolGroup {
                    name: &def.group,
                    icon: self.groups.get(&def.group).map(|g| g.icon.as_str()),
                    tools: vec![def],
                }),
            }
        }
        groups.sort_by_key(|g| {
            let order = self.groups.get(g.name).map_or(u32::MAX, |e| e.order);
            (order, g.name.to_string())
        });
        for group in &mut groups {
            group.tools.sort_by(|a, b| a.name.cmp(&b.name));
        }
        groups
    }

    /// Merge another registry into this one
    ///
    /// Entries from `other` override entries in `self` if they share the same name.
    pub fn merge(&mut self, other: ToolRegistry) {
        let ToolRegistry {
            mut entries,
            order,
            groups,
        } = other;
        for name in order {
            if let Some(def) = entries.remove(&name) {
                self.register(def);
            }
        }
        self.groups.extend(groups);
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
