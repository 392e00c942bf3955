// SPDX-License-Identifier: GPL-3.0-only

//! Meeting view state types

use crate::constants::roster;
use crate::session::{
    ControlsState, DeviceCapability, Notice, RemotePlaceholder, StateHandle, TileProps,
    TileSource, TileView,
};
use std::time::{Duration, Instant};

/// User intents coming from the controls bar or the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ToggleMute,
    ToggleCamera,
    /// Retry the local tile after a failure
    Retry,
    Leave,
    ToggleHelp,
}

impl Action {
    /// Keyboard shortcut mapping
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'm' => Some(Action::ToggleMute),
            'c' => Some(Action::ToggleCamera),
            'r' => Some(Action::Retry),
            'q' | 'l' => Some(Action::Leave),
            'h' => Some(Action::ToggleHelp),
            _ => None,
        }
    }
}

/// Choices on the lobby screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyAction {
    CreateMeeting,
    JoinMeeting,
    Quit,
}

impl LobbyAction {
    /// Keyboard shortcut mapping
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'n' => Some(LobbyAction::CreateMeeting),
            'j' => Some(LobbyAction::JoinMeeting),
            'q' => Some(LobbyAction::Quit),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LobbyAction::CreateMeeting => "Create Meeting",
            LobbyAction::JoinMeeting => "Join Meeting",
            LobbyAction::Quit => "Quit",
        }
    }
}

/// Entry screen shown before joining and after leaving
#[derive(Debug, Default)]
pub struct Lobby {
    selected: usize,
}

impl Lobby {
    /// Buttons in display order
    pub const BUTTONS: [LobbyAction; 2] = [LobbyAction::CreateMeeting, LobbyAction::JoinMeeting];

    pub fn selected(&self) -> LobbyAction {
        Self::BUTTONS[self.selected % Self::BUTTONS.len()]
    }

    /// Move the highlight, wrapping at either end
    pub fn select_next(&mut self) {
        self.selected = (self.selected + 1) % Self::BUTTONS.len();
    }

    pub fn select_previous(&mut self) {
        self.selected = (self.selected + Self::BUTTONS.len() - 1) % Self::BUTTONS.len();
    }
}

/// Tiles of one meeting: the local participant first, then placeholders
pub fn roster(display_name: &str, local: StateHandle) -> Vec<TileProps> {
    let name = if display_name.trim().is_empty() {
        roster::LOCAL_DISPLAY_NAME
    } else {
        display_name
    };

    let mut tiles = vec![TileProps {
        label: name.to_string(),
        source: TileSource::Local(local),
    }];
    tiles.extend(
        roster::REMOTE_PLACEHOLDERS
            .iter()
            .map(|&(label, muted, camera_off)| TileProps {
                label: label.to_string(),
                source: TileSource::Remote(RemotePlaceholder { muted, camera_off }),
            }),
    );
    tiles
}

/// Everything needed to draw one frame of the meeting view
#[derive(Debug, Clone)]
pub struct MeetingSnapshot {
    pub controls: ControlsState,
    pub capability: DeviceCapability,
    /// Local tile first
    pub tiles: Vec<TileView>,
}

impl MeetingSnapshot {
    /// Persistent banner text, if any
    pub fn banner(&self) -> Option<&'static str> {
        if self.capability.unsupported {
            Some("Camera and microphone are not supported on this system")
        } else if !self.capability.has_camera {
            Some("No camera detected")
        } else {
            None
        }
    }
}

/// Terminal-side presentation state
#[derive(Debug, Default)]
pub struct UiState {
    pub show_help: bool,
    notice: Option<(Notice, Instant)>,
}

impl UiState {
    pub fn show_notice(&mut self, notice: Notice) {
        self.notice = Some((notice, Instant::now()));
    }

    /// Current notice unless it is older than `lifetime`
    pub fn notice(&self, lifetime: Duration) -> Option<&Notice> {
        self.notice
            .as_ref()
            .filter(|(_, shown)| shown.elapsed() < lifetime)
            .map(|(notice, _)| notice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_actions() {
        assert_eq!(Action::from_key('m'), Some(Action::ToggleMute));
        assert_eq!(Action::from_key('C'), Some(Action::ToggleCamera));
        assert_eq!(Action::from_key('l'), Some(Action::Leave));
        assert_eq!(Action::from_key('x'), None);
    }

    #[test]
    fn lobby_keys_and_selection() {
        assert_eq!(LobbyAction::from_key('N'), Some(LobbyAction::CreateMeeting));
        assert_eq!(LobbyAction::from_key('j'), Some(LobbyAction::JoinMeeting));
        assert_eq!(LobbyAction::from_key('q'), Some(LobbyAction::Quit));
        assert_eq!(LobbyAction::from_key('m'), None);

        let mut lobby = Lobby::default();
        assert_eq!(lobby.selected(), LobbyAction::CreateMeeting);
        lobby.select_next();
        assert_eq!(lobby.selected(), LobbyAction::JoinMeeting);
        lobby.select_next();
        assert_eq!(lobby.selected(), LobbyAction::CreateMeeting);
        lobby.select_previous();
        assert_eq!(lobby.selected(), LobbyAction::JoinMeeting);
    }
}
