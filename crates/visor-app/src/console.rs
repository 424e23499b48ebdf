//! Interactive session console.
//!
//! Stands in for the head-worn display and voice recognizer: stdin lines
//! are treated as discrete command tokens (or menu numbers), dispatched
//! through the navigation machine, and the session event stream is
//! rendered back as styled lines. Long-running orchestrator operations are
//! spawned as background tasks so the input loop never blocks; their
//! outcomes arrive via the event bus.

use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use visor_core::nav::{NavInput, NavOutcome, NavigationMachine, SessionCommand};
use visor_types::event::SessionEvent;

use crate::state::AppState;

pub struct Console {
    state: AppState,
    machine: NavigationMachine,
}

impl Console {
    pub fn new(state: AppState) -> Self {
        let machine = NavigationMachine::new(state.registry.clone());
        Self { state, machine }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        println!(
            "{}",
            style("visor console -- type a command word or a menu number; 'back' goes up").dim()
        );
        self.render_menu().await;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut events = self.state.orchestrator.bus().subscribe();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    if !self.handle_line(line.trim()).await {
                        break;
                    }
                }
                event = events.recv() => {
                    match event {
                        Ok(event) => self.handle_event(event).await,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(skipped, "console fell behind the event stream");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        }

        // Leaving the console releases any live session resources.
        self.state.orchestrator.exit_active_mode().await;
        Ok(())
    }

    /// Returns false when the session is over.
    async fn handle_line(&mut self, line: &str) -> bool {
        if line.is_empty() {
            self.render_menu().await;
            return true;
        }

        let input = match line.parse::<usize>() {
            Ok(number) if number > 0 => NavInput::Select(number - 1),
            _ => NavInput::Token(line.to_lowercase()),
        };

        let snapshot = self.state.orchestrator.snapshot().await;
        match self.machine.handle(input, &snapshot) {
            NavOutcome::Redisplay => self.render_menu().await,
            NavOutcome::Command(command) => self.dispatch(command).await,
            NavOutcome::Rejected { reason } => {
                println!("{}", style(format!("  {reason}")).yellow());
                self.render_menu().await;
            }
            NavOutcome::ExitRequested => return false,
        }
        true
    }

    async fn dispatch(&mut self, command: SessionCommand) {
        let orch = self.state.orchestrator.clone();
        match command {
            SessionCommand::EnterActiveMode { agent_id } => {
                println!("{}", style("  starting session...").dim());
                tokio::spawn(async move {
                    if let Err(err) = orch.enter_active_mode(&agent_id).await {
                        debug!(%err, "enter_active_mode failed");
                    }
                });
            }
            SessionCommand::ExitActiveMode => {
                orch.exit_active_mode().await;
            }
            SessionCommand::SendAudio => {
                tokio::spawn(async move {
                    if let Err(err) = orch.send_audio().await {
                        debug!(%err, "send_audio failed");
                    }
                });
            }
            SessionCommand::SendPhoto => {
                tokio::spawn(async move {
                    if let Err(err) = orch.send_photo(None).await {
                        debug!(%err, "send_photo failed");
                    }
                });
            }
            SessionCommand::NewThread => {
                tokio::spawn(async move {
                    if let Err(err) = orch.create_new_thread().await {
                        debug!(%err, "create_new_thread failed");
                    }
                });
            }
            SessionCommand::ClearThread { agent_id } => {
                match orch.clear_thread(&agent_id).await {
                    Ok(()) => println!("{}", style("  conversation cleared").green()),
                    Err(err) => println!("{}", style(format!("  {err}")).red()),
                }
                self.render_menu().await;
            }
            SessionCommand::ToggleAudioResponse => {
                if let Err(err) = orch.toggle_audio_response().await {
                    println!("{}", style(format!("  {err}")).red());
                }
            }
        }
    }

    async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::StatusUpdate { text } => {
                println!("{}", style(format!("  {text}")).dim());
            }
            SessionEvent::RecordingStarted => {
                println!("{}", style("  recording...").dim());
            }
            SessionEvent::ProcessingStarted => {
                println!("{}", style("  transcribing...").dim());
            }
            SessionEvent::CaptureStarted => {
                println!("{}", style("  taking photo...").dim());
            }
            SessionEvent::PhotoCaptured => {
                println!("{}", style("  photo captured").dim());
            }
            SessionEvent::VisionAnalysisStarted => {
                println!("{}", style("  analyzing image...").dim());
            }
            SessionEvent::AssistantProcessingStarted => {
                println!("{}", style("  waiting for the assistant...").dim());
            }
            SessionEvent::AssistantResponse { text } => {
                println!("{} {}", style(">").cyan().bold(), style(text).cyan());
                self.render_menu().await;
            }
            SessionEvent::Error { message } => {
                println!("{}", style(format!("  error: {message}")).red());
            }
            SessionEvent::ActiveModeStarted { thread_id } => {
                self.machine.on_active_mode_started();
                println!(
                    "{}",
                    style(format!("  session started (thread {thread_id})")).green()
                );
                self.render_menu().await;
            }
            SessionEvent::ActiveModeEnded => {
                self.machine.on_active_mode_ended();
                println!("{}", style("  session ended").green());
                self.render_menu().await;
            }
            SessionEvent::ThreadCreated { thread_id } => {
                println!(
                    "{}",
                    style(format!("  new conversation (thread {thread_id})")).green()
                );
            }
            SessionEvent::AudioResponseToggled { enabled } => {
                let label = if enabled { "on" } else { "off" };
                println!("{}", style(format!("  voice replies {label}")).green());
                self.render_menu().await;
            }
        }
    }

    /// Menus are always rebuilt from a fresh snapshot -- dynamic labels
    /// (the voice-replies toggle) stay current.
    async fn render_menu(&self) {
        let snapshot = self.state.orchestrator.snapshot().await;
        let view = self.machine.menu(&snapshot);

        println!();
        println!("{}", style(&view.title).bold());
        for (index, item) in view.items.iter().enumerate() {
            println!(
                "  {}. {} {}",
                index + 1,
                item.label,
                style(format!("(say \"{}\")", item.token)).dim()
            );
        }
    }
}
