// SPDX-License-Identifier: GPL-3.0-only

//! Terminal front end
//!
//! Starts on the lobby. Creating or joining mounts a meeting view that
//! renders the tiles and controls bar; leaving unmounts it and returns to
//! the lobby. Quitting from the lobby ends the program.

use crate::app::{Action, Lobby, LobbyAction, MeetingView, UiState, view};
use crate::backends::MediaPlatform;
use crate::config::Config;
use crate::constants::timing;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::{Backend, CrosstermBackend},
};
use std::io::{self, stdout};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

type KeyReceiver = mpsc::UnboundedReceiver<KeyEvent>;

/// How a meeting screen ended
enum MeetingExit {
    /// The user left; back to the lobby
    Left,
    /// Input is gone; nothing more can happen
    InputClosed,
}

/// Run the lobby and meetings in the terminal until the user quits
pub fn run(config: Config, platform: Arc<dyn MediaPlatform>) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let stop = Arc::new(AtomicBool::new(false));
    let result = runtime.block_on(async {
        let mut keys = spawn_key_reader(Arc::clone(&stop));
        run_app(&mut terminal, &mut keys, config, platform).await
    });
    stop.store(true, Ordering::Release);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    runtime.shutdown_timeout(Duration::from_secs(timing::STOP_TIMEOUT_SECS));
    result
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    keys: &mut KeyReceiver,
    config: Config,
    platform: Arc<dyn MediaPlatform>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut lobby = Lobby::default();

    loop {
        match run_lobby(terminal, keys, &mut lobby).await? {
            LobbyAction::Quit => break,
            action => {
                info!(?action, "Entering meeting");
                let exit = run_meeting(terminal, keys, &config, Arc::clone(&platform)).await?;
                if let MeetingExit::InputClosed = exit {
                    break;
                }
                info!("Back in the lobby");
            }
        }
    }

    info!("Terminal view closed");
    Ok(())
}

/// Show the lobby until a button is chosen
async fn run_lobby<B: Backend>(
    terminal: &mut Terminal<B>,
    keys: &mut KeyReceiver,
    lobby: &mut Lobby,
) -> Result<LobbyAction, Box<dyn std::error::Error>> {
    loop {
        terminal
            .draw(|f| view::draw_lobby(f, lobby))
            .map_err(draw_error)?;

        let Some(key) = keys.recv().await else {
            return Ok(LobbyAction::Quit);
        };
        if let Some(action) = lobby_action_for(key, lobby) {
            return Ok(action);
        }
    }
}

async fn run_meeting<B: Backend>(
    terminal: &mut Terminal<B>,
    keys: &mut KeyReceiver,
    config: &Config,
    platform: Arc<dyn MediaPlatform>,
) -> Result<MeetingExit, Box<dyn std::error::Error>> {
    let (meeting, mut notices) = MeetingView::mount(config, platform).await;
    let notice_lifetime = config.notice_duration();

    let mut ui = UiState::default();
    let mut tick = tokio::time::interval(Duration::from_millis(timing::UI_TICK_MS));

    let result = loop {
        let snapshot = meeting.snapshot();
        if let Err(e) = terminal.draw(|f| view::draw(f, &snapshot, &ui, notice_lifetime)) {
            error!(error = %e, "Failed to draw");
            break Err(draw_error(e).into());
        }

        tokio::select! {
            _ = tick.tick() => {}
            Some(notice) = notices.recv() => ui.show_notice(notice),
            key = keys.recv() => match key {
                Some(key) => {
                    if let Some(action) = action_for(key) {
                        if action == Action::ToggleHelp {
                            ui.show_help = !ui.show_help;
                        }
                        meeting.handle(action);
                    }
                }
                None => break Ok(MeetingExit::InputClosed),
            },
        }

        if meeting.has_left() {
            break Ok(MeetingExit::Left);
        }
    };

    meeting.leave().await;
    result
}

fn draw_error(e: impl std::fmt::Display) -> io::Error {
    io::Error::other(e.to_string())
}

fn action_for(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Leave),
        KeyCode::Char(c) => Action::from_key(c),
        KeyCode::Esc => Some(Action::Leave),
        _ => None,
    }
}

fn lobby_action_for(key: KeyEvent, lobby: &mut Lobby) -> Option<LobbyAction> {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(LobbyAction::Quit),
        KeyCode::Char(c) => LobbyAction::from_key(c),
        KeyCode::Esc => Some(LobbyAction::Quit),
        KeyCode::Enter => Some(lobby.selected()),
        KeyCode::Left | KeyCode::Up | KeyCode::BackTab => {
            lobby.select_previous();
            None
        }
        KeyCode::Right | KeyCode::Down | KeyCode::Tab => {
            lobby.select_next();
            None
        }
        _ => None,
    }
}

/// Read key presses on a blocking thread until `stop` is set
fn spawn_key_reader(stop: Arc<AtomicBool>) -> KeyReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::task::spawn_blocking(move || {
        while !stop.load(Ordering::Acquire) {
            match event::poll(Duration::from_millis(100)) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => {
                    error!(error = %e, "Failed to poll terminal events");
                    break;
                }
            }
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if tx.send(key).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Failed to read terminal event");
                    break;
                }
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::simulated::SimulatedPlatform;
    use ratatui::backend::TestBackend;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn lobby_keys() {
        let mut lobby = Lobby::default();
        assert_eq!(
            lobby_action_for(key(KeyCode::Enter), &mut lobby),
            Some(LobbyAction::CreateMeeting)
        );
        assert_eq!(lobby_action_for(key(KeyCode::Right), &mut lobby), None);
        assert_eq!(
            lobby_action_for(key(KeyCode::Enter), &mut lobby),
            Some(LobbyAction::JoinMeeting)
        );
        assert_eq!(
            lobby_action_for(key(KeyCode::Esc), &mut lobby),
            Some(LobbyAction::Quit)
        );
        // Meeting shortcuts do nothing here
        assert_eq!(lobby_action_for(key(KeyCode::Char('m')), &mut lobby), None);
    }

    #[test]
    fn escape_leaves_the_meeting() {
        assert_eq!(action_for(key(KeyCode::Esc)), Some(Action::Leave));
        assert_eq!(
            action_for(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Action::Leave)
        );
        assert_eq!(action_for(key(KeyCode::Char('c'))), Some(Action::ToggleCamera));
    }

    #[tokio::test]
    async fn leaving_returns_to_lobby() {
        let platform = Arc::new(SimulatedPlatform::with_default_devices());
        let dyn_platform: Arc<dyn MediaPlatform> = platform.clone();
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).expect("test terminal");

        let (tx, mut keys) = mpsc::unbounded_channel();
        // Create, leave, join, leave, quit
        for code in [
            KeyCode::Char('n'),
            KeyCode::Char('l'),
            KeyCode::Char('j'),
            KeyCode::Esc,
            KeyCode::Char('q'),
        ] {
            tx.send(key(code)).expect("queue key");
        }

        tokio::time::timeout(
            Duration::from_secs(5),
            run_app(&mut terminal, &mut keys, Config::default(), dyn_platform),
        )
        .await
        .expect("terminal loop finished")
        .expect("terminal loop ok");

        assert_eq!(platform.enumerate_calls(), 2, "devices listed once per meeting");
        assert_eq!(platform.live_tracks(), 0);
        assert!(keys.is_empty(), "quitting consumed the last key");
        drop(tx);
    }
}
