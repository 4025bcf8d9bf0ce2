//! Message actions
//!
//! Every envelope names what it is for. Replies from the host arrive as
//! `reply` (or, on older hosts, echo the original action) and are matched
//! through `original.messageId` rather than by action.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentAction {
    /// Host accepted the component and issued a session key
    ComponentRegistered,
    /// Host pushes the current set of theme stylesheets
    ActivateThemes,
    /// Component asks for the note currently in context
    StreamContextItem,
    /// Component persists one or more notes
    SaveItems,
    /// Component persists its own (extension-level) data
    SetComponentData,
    /// Component confirms the initial theme set was applied
    ThemesActivated,
    /// Host answers a previously posted message
    Reply,
    /// Anything this component does not understand
    #[default]
    #[serde(other)]
    Unknown,
}

impl ComponentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentAction::ComponentRegistered => "component-registered",
            ComponentAction::ActivateThemes => "activate-themes",
            ComponentAction::StreamContextItem => "stream-context-item",
            ComponentAction::SaveItems => "save-items",
            ComponentAction::SetComponentData => "set-component-data",
            ComponentAction::ThemesActivated => "themes-activated",
            ComponentAction::Reply => "reply",
            ComponentAction::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ComponentAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The `api` tag carried by every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageApi {
    #[default]
    Component,
}
