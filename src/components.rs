//! Externally selected UI components
//!
//! The component picker in the chat widget decides what is selected; this
//! crate only holds the latest snapshot and formats it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub file_name: String,
    pub line_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_number: Option<u32>,
}

/// The DOM node a component rendered into
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementRef {
    pub tag_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

impl ElementRef {
    pub fn new(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.to_string(),
            id: None,
            class_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// A UI framework component picked by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedComponent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub fiber_type: String,
    pub dom_element: ElementRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_location: Option<SourceLocation>,
    #[serde(default)]
    pub depth: usize,
    #[serde(default)]
    pub props: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
    #[serde(default)]
    pub hooks: Vec<HookInfo>,
}

impl SelectedComponent {
    pub fn new(id: &str, name: &str, tag_name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            fiber_type: String::new(),
            dom_element: ElementRef::new(tag_name),
            source_location: None,
            depth: 0,
            props: Map::new(),
            state: None,
            hooks: Vec::new(),
        }
    }

    /// Load a JSON array of components, as exported by the component picker
    pub fn list_from_json(json: &str) -> anyhow::Result<Vec<SelectedComponent>> {
        Ok(serde_json::from_str(json)?)
    }
}
