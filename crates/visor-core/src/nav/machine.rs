//! Stack-based navigation state machine.
//!
//! States form a tree (`Main -> AgentList -> AgentMenu -> AgentActiveMenu`,
//! plus a `Settings` branch). Entering a child pushes the parent onto an
//! explicit stack; "back" pops one level; at the root, "back" is an exit
//! request.
//!
//! Voice-command tokens and direct item selection resolve through the same
//! action dispatch -- one code path per action regardless of input origin.
//! Menus are rendered from a fresh [`SessionSnapshot`] every time, so
//! dynamic labels (the audio-response toggle) are never cached, and actions
//! that are invalid for the current orchestration state are rejected here
//! before they reach the orchestrator.
//!
//! The machine never changes state on the session's behalf: entering or
//! leaving the active-mode menu happens in `on_active_mode_started` /
//! `on_active_mode_ended`, driven by the orchestrator's events. The menu
//! therefore cannot sit in the active branch while no session exists.

use tracing::debug;

use visor_types::agent::AgentRegistry;
use visor_types::nav::{MenuItem, MenuView, NavAction, NavState};

use crate::session::state::SessionSnapshot;

/// User input feeding the machine: a tapped entry or a spoken token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavInput {
    /// Direct selection of a rendered menu entry by position.
    Select(usize),
    /// A discrete voice-command token from the recognizer.
    Token(String),
}

/// An orchestrator operation requested through the menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    EnterActiveMode { agent_id: String },
    ExitActiveMode,
    SendAudio,
    SendPhoto,
    NewThread,
    ClearThread { agent_id: String },
    ToggleAudioResponse,
}

/// What one dispatched input produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    /// Navigation-only change; re-render the current menu.
    Redisplay,
    /// Hand this command to the orchestrator.
    Command(SessionCommand),
    /// The action is not valid right now.
    Rejected { reason: String },
    /// "Back" at the root: the wearer wants out.
    ExitRequested,
}

/// Hierarchical menu machine for one client.
pub struct NavigationMachine {
    registry: AgentRegistry,
    state: NavState,
    stack: Vec<NavState>,
    /// The agent whose menu branch is being displayed.
    current_agent: Option<String>,
}

impl NavigationMachine {
    pub fn new(registry: AgentRegistry) -> Self {
        Self {
            registry,
            state: NavState::Main,
            stack: Vec::new(),
            current_agent: None,
        }
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn current_agent(&self) -> Option<&str> {
        self.current_agent.as_deref()
    }

    /// Render the menu for the current state.
    ///
    /// Always rebuilt from the snapshot -- dynamic labels are never cached.
    pub fn menu(&self, snapshot: &SessionSnapshot) -> MenuView {
        match self.state {
            NavState::Main => MenuView {
                title: "Visor".to_string(),
                resource: "main_menu".to_string(),
                items: vec![
                    MenuItem::new("Agents", "agents", NavAction::OpenAgentList),
                    MenuItem::new("Settings", "settings", NavAction::OpenSettings),
                    MenuItem::new("Exit", "exit", NavAction::Back),
                ],
            },
            NavState::AgentList => {
                let mut items: Vec<MenuItem> = self
                    .registry
                    .iter()
                    .map(|agent| {
                        MenuItem::new(
                            agent.name.clone(),
                            agent.name.to_lowercase(),
                            NavAction::SelectAgent(agent.id.clone()),
                        )
                    })
                    .collect();
                items.push(back_item());
                MenuView {
                    title: "Agents".to_string(),
                    resource: "agent_list".to_string(),
                    items,
                }
            }
            NavState::AgentMenu => MenuView {
                title: self.current_agent_name(),
                resource: self
                    .current_agent_ref()
                    .map(|agent| agent.menu.clone())
                    .unwrap_or_else(|| "agent_menu".to_string()),
                items: vec![
                    MenuItem::new("Start session", "start", NavAction::EnterActiveMode),
                    MenuItem::new("Clear conversation", "clear", NavAction::ClearThread),
                    back_item(),
                ],
            },
            NavState::AgentActiveMenu => MenuView {
                title: self.current_agent_name(),
                resource: self
                    .current_agent_ref()
                    .map(|agent| agent.active_menu.clone())
                    .unwrap_or_else(|| "agent_active_menu".to_string()),
                items: vec![
                    MenuItem::new("Ask by voice", "speak", NavAction::SendAudio),
                    MenuItem::new("Send photo", "photo", NavAction::SendPhoto),
                    MenuItem::new("New conversation", "new", NavAction::NewThread),
                    toggle_item(snapshot),
                    MenuItem::new("End session", "end", NavAction::ExitActiveMode),
                    back_item(),
                ],
            },
            NavState::Settings => MenuView {
                title: "Settings".to_string(),
                resource: "settings_menu".to_string(),
                items: vec![toggle_item(snapshot), back_item()],
            },
        }
    }

    /// Resolve an input against the currently rendered menu and apply it.
    ///
    /// The single dispatch path for both input origins.
    pub fn handle(&mut self, input: NavInput, snapshot: &SessionSnapshot) -> NavOutcome {
        let view = self.menu(snapshot);
        let action = match &input {
            NavInput::Select(index) => view.items.get(*index).map(|item| item.action.clone()),
            NavInput::Token(token) => view.item_for_token(token).map(|item| item.action.clone()),
        };
        let Some(action) = action else {
            return NavOutcome::Rejected {
                reason: "unrecognized command".to_string(),
            };
        };
        debug!(state = %self.state, ?action, "dispatching");
        self.apply(action, snapshot)
    }

    /// The orchestrator confirmed a session start; descend into the
    /// active-mode menu.
    pub fn on_active_mode_started(&mut self) {
        if self.state != NavState::AgentActiveMenu {
            self.push(NavState::AgentActiveMenu);
        }
    }

    /// The session ended (user action, error, or cancellation); leave the
    /// active-mode branch.
    pub fn on_active_mode_ended(&mut self) {
        if self.state == NavState::AgentActiveMenu {
            self.pop();
        }
    }

    fn apply(&mut self, action: NavAction, snapshot: &SessionSnapshot) -> NavOutcome {
        match action {
            NavAction::OpenAgentList => {
                self.push(NavState::AgentList);
                NavOutcome::Redisplay
            }
            NavAction::OpenSettings => {
                self.push(NavState::Settings);
                NavOutcome::Redisplay
            }
            NavAction::SelectAgent(agent_id) => {
                if self.registry.get(&agent_id).is_none() {
                    return NavOutcome::Rejected {
                        reason: format!("unknown agent: '{agent_id}'"),
                    };
                }
                self.current_agent = Some(agent_id);
                self.push(NavState::AgentMenu);
                NavOutcome::Redisplay
            }
            NavAction::EnterActiveMode => {
                if snapshot.is_active {
                    return NavOutcome::Rejected {
                        reason: "session already active".to_string(),
                    };
                }
                match &self.current_agent {
                    Some(agent_id) => NavOutcome::Command(SessionCommand::EnterActiveMode {
                        agent_id: agent_id.clone(),
                    }),
                    None => NavOutcome::Rejected {
                        reason: "no agent selected".to_string(),
                    },
                }
            }
            NavAction::ExitActiveMode => {
                if snapshot.is_active {
                    NavOutcome::Command(SessionCommand::ExitActiveMode)
                } else {
                    NavOutcome::Rejected {
                        reason: "no active session".to_string(),
                    }
                }
            }
            NavAction::SendAudio => self.gated_active(snapshot, SessionCommand::SendAudio),
            NavAction::SendPhoto => self.gated_active(snapshot, SessionCommand::SendPhoto),
            NavAction::NewThread => self.gated_active(snapshot, SessionCommand::NewThread),
            NavAction::ClearThread => {
                if snapshot.is_active {
                    return NavOutcome::Rejected {
                        reason: "end the session first".to_string(),
                    };
                }
                match &self.current_agent {
                    Some(agent_id) => NavOutcome::Command(SessionCommand::ClearThread {
                        agent_id: agent_id.clone(),
                    }),
                    None => NavOutcome::Rejected {
                        reason: "no agent selected".to_string(),
                    },
                }
            }
            NavAction::ToggleAudioResponse => {
                NavOutcome::Command(SessionCommand::ToggleAudioResponse)
            }
            NavAction::Back => self.back(snapshot),
        }
    }

    /// Actions that only make sense while a session is live.
    fn gated_active(&self, snapshot: &SessionSnapshot, command: SessionCommand) -> NavOutcome {
        if snapshot.is_active {
            NavOutcome::Command(command)
        } else {
            NavOutcome::Rejected {
                reason: "active mode required".to_string(),
            }
        }
    }

    fn back(&mut self, snapshot: &SessionSnapshot) -> NavOutcome {
        // Leaving the active-mode menu means leaving the session; the menu
        // stays put until the orchestrator confirms via events.
        if self.state == NavState::AgentActiveMenu && snapshot.is_active {
            return NavOutcome::Command(SessionCommand::ExitActiveMode);
        }
        if self.pop() {
            NavOutcome::Redisplay
        } else {
            NavOutcome::ExitRequested
        }
    }

    fn push(&mut self, next: NavState) {
        self.stack.push(self.state);
        self.state = next;
    }

    fn pop(&mut self) -> bool {
        match self.stack.pop() {
            Some(prev) => {
                self.state = prev;
                true
            }
            None => false,
        }
    }

    fn current_agent_ref(&self) -> Option<&visor_types::agent::Agent> {
        self.current_agent
            .as_deref()
            .and_then(|id| self.registry.get(id))
    }

    fn current_agent_name(&self) -> String {
        self.current_agent_ref()
            .map(|agent| agent.name.clone())
            .unwrap_or_else(|| "Agent".to_string())
    }
}

fn back_item() -> MenuItem {
    MenuItem::new("Back", "back", NavAction::Back)
}

/// The audio-response toggle entry, labelled from live state.
fn toggle_item(snapshot: &SessionSnapshot) -> MenuItem {
    let label = if snapshot.audio_response_enabled {
        "Voice replies: on"
    } else {
        "Voice replies: off"
    };
    MenuItem::new(label, "replies", NavAction::ToggleAudioResponse)
}
