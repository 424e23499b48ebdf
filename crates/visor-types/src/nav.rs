//! Navigation states and menu rendering types.
//!
//! The menu hierarchy is a tree: `Main -> AgentList -> AgentMenu ->
//! AgentActiveMenu`, with a `Settings` branch off the root. Each state maps
//! to exactly one renderable `MenuView`; the view is rebuilt from current
//! session state on every display so dynamic labels (the audio-response
//! toggle) are never stale.

use serde::{Deserialize, Serialize};

use std::fmt;

/// One node in the menu hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavState {
    Main,
    AgentList,
    AgentMenu,
    AgentActiveMenu,
    Settings,
}

impl fmt::Display for NavState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NavState::Main => "main",
            NavState::AgentList => "agent_list",
            NavState::AgentMenu => "agent_menu",
            NavState::AgentActiveMenu => "agent_active_menu",
            NavState::Settings => "settings",
        };
        write!(f, "{s}")
    }
}

/// A resolved user intention, independent of input origin.
///
/// Both direct menu selection and voice-command tokens resolve to one of
/// these; there is exactly one dispatch path per action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavAction {
    /// Descend into the agent list.
    OpenAgentList,
    /// Descend into the settings branch.
    OpenSettings,
    /// Pick an agent from the list and show its menu.
    SelectAgent(String),
    /// Start an active-mode session with the displayed agent.
    EnterActiveMode,
    /// End the active-mode session.
    ExitActiveMode,
    /// Record and send an audio message.
    SendAudio,
    /// Capture and send a photo.
    SendPhoto,
    /// Replace the current thread with a fresh one.
    NewThread,
    /// Drop the persisted thread for the displayed agent.
    ClearThread,
    /// Flip the audio-response preference.
    ToggleAudioResponse,
    /// Pop one menu level; at the root this is an exit request.
    Back,
}

/// A single renderable menu entry.
///
/// `token` is the discrete voice-command word that selects this entry;
/// speaking the token and tapping the entry dispatch the same action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub label: String,
    pub token: String,
    pub action: NavAction,
}

impl MenuItem {
    pub fn new(label: impl Into<String>, token: impl Into<String>, action: NavAction) -> Self {
        Self {
            label: label.into(),
            token: token.into(),
            action,
        }
    }
}

/// One rendered menu: a title plus entries in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuView {
    pub title: String,
    /// Name of the menu resource this view was rendered from. For agent
    /// menus this comes from the agent's configured resource references.
    pub resource: String,
    pub items: Vec<MenuItem>,
}

impl MenuView {
    /// Find an entry by its voice token (case-insensitive).
    pub fn item_for_token(&self, token: &str) -> Option<&MenuItem> {
        self.items
            .iter()
            .find(|item| item.token.eq_ignore_ascii_case(token))
    }
}
