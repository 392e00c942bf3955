// SPDX-License-Identifier: GPL-3.0-only

//! Terminal rendering of the meeting view
//!
//! Live tiles are drawn with Unicode half-block characters, two vertical
//! pixels per cell.

use super::state::{Lobby, MeetingSnapshot, UiState};
use crate::backends::types::VideoFrame;
use crate::session::{ControlsState, NoticeKind, Surface, TileView};
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Widget};
use std::sync::Arc;
use std::time::Duration;

/// Draw one frame of the whole view
pub fn draw(frame: &mut Frame, snapshot: &MeetingSnapshot, ui: &UiState, notice_lifetime: Duration) {
    let area = frame.area();
    let banner = snapshot.banner();

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(u16::from(banner.is_some())),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    if let Some(text) = banner {
        frame.render_widget(
            TextLine {
                text,
                style: Style::default().fg(Color::White).bg(Color::Red),
            },
            rows[0],
        );
    }

    if !snapshot.tiles.is_empty() {
        let count = snapshot.tiles.len() as u32;
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints((0..count).map(|_| Constraint::Ratio(1, count)))
            .split(rows[1]);
        for (tile, area) in snapshot.tiles.iter().zip(columns.iter()) {
            frame.render_widget(TileWidget::new(tile), *area);
        }
    }

    if let Some(notice) = ui.notice(notice_lifetime) {
        let color = if notice.kind.is_error() {
            Color::LightRed
        } else {
            Color::LightGreen
        };
        let text = format!("{}{}", notice_prefix(notice.kind), notice.message);
        frame.render_widget(
            TextLine {
                text: &text,
                style: Style::default().fg(color),
            },
            rows[2],
        );
    }

    frame.render_widget(
        ControlsBar {
            controls: snapshot.controls,
            show_help: ui.show_help,
        },
        rows[3],
    );
}

/// Draw the lobby: title and the create/join buttons
pub fn draw_lobby(frame: &mut Frame, lobby: &Lobby) {
    frame.render_widget(LobbyWidget { lobby }, frame.area());
}

struct LobbyWidget<'a> {
    lobby: &'a Lobby,
}

impl Widget for LobbyWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(0),
                Constraint::Length(1),
                Constraint::Length(2),
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(area);

        centered(
            rows[1],
            buf,
            &["Video Conferencing"],
            Style::default().add_modifier(Modifier::BOLD),
        );
        centered(
            rows[2],
            buf,
            &["Connect with anyone, anywhere, anytime"],
            Style::default().fg(Color::Gray),
        );

        let buttons = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Min(0),
                Constraint::Length(20),
                Constraint::Length(2),
                Constraint::Length(20),
                Constraint::Min(0),
            ])
            .split(rows[3]);
        for (action, area) in Lobby::BUTTONS.iter().zip([buttons[1], buttons[3]]) {
            let style = if *action == self.lobby.selected() {
                Style::default().fg(Color::Black).bg(Color::LightBlue)
            } else {
                Style::default()
            };
            let block = Block::default().borders(Borders::ALL).border_style(style);
            let inner = block.inner(area);
            block.render(area, buf);
            buf.set_style(inner, style);
            centered(inner, buf, &[action.label()], style);
        }

        TextLine {
            text: "Enter: select | n: Create | j: Join | q: Quit",
            style: Style::default().fg(Color::White).bg(Color::DarkGray),
        }
        .render(rows[5], buf);
    }
}

/// One participant tile
struct TileWidget<'a> {
    view: &'a TileView,
    frame: Option<Arc<VideoFrame>>,
}

impl<'a> TileWidget<'a> {
    fn new(view: &'a TileView) -> Self {
        let frame = match &view.surface {
            Surface::Live {
                frames: Some(frames),
                ..
            } => frames.borrow().clone(),
            _ => None,
        };
        Self { view, frame }
    }

    fn title(&self) -> String {
        let mut title = format!(" {} ", self.view.label);
        if self.view.is_local {
            title.push_str("(You) ");
        }
        if self.view.muted {
            title.push_str("[muted] ");
        }
        title
    }
}

impl Widget for TileWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border = match self.view.surface {
            Surface::Error { .. } => Color::Red,
            Surface::Live { .. } => Color::Green,
            _ => Color::DarkGray,
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(self.title());
        let inner = block.inner(area);
        block.render(area, buf);

        match &self.view.surface {
            Surface::Live { label, .. } => match &self.frame {
                Some(frame) => render_frame(frame, inner, buf),
                None => {
                    let text = format!("Live: {}", label);
                    centered(inner, buf, &[text.as_str()], Style::default())
                }
            },
            Surface::Connecting => {
                centered(inner, buf, &["Starting camera..."], Style::default())
            }
            Surface::CameraOff => centered(
                inner,
                buf,
                &["Camera Off"],
                Style::default().fg(Color::Gray),
            ),
            Surface::Error {
                message, retryable, ..
            } => {
                let hint = if *retryable { "Press 'r' to retry" } else { "" };
                centered(
                    inner,
                    buf,
                    &[message.as_str(), hint],
                    Style::default().fg(Color::LightRed),
                )
            }
            Surface::Placeholder => {
                let text = initials(&self.view.label);
                centered(
                    inner,
                    buf,
                    &[text.as_str()],
                    Style::default().add_modifier(Modifier::BOLD),
                )
            }
        }
    }
}

/// Scale a frame into `area`, keeping its aspect ratio
fn render_frame(frame: &VideoFrame, area: Rect, buf: &mut Buffer) {
    if frame.width == 0 || frame.height == 0 || area.width == 0 || area.height == 0 {
        return;
    }

    let frame_aspect = frame.width as f64 / frame.height as f64;
    let cells_w = area.width as f64;
    let pixels_h = (area.height * 2) as f64;

    let (display_width, display_height) = if cells_w / pixels_h > frame_aspect {
        ((pixels_h * frame_aspect) as u16, area.height)
    } else {
        (area.width, ((cells_w / frame_aspect) / 2.0) as u16)
    };
    if display_width == 0 || display_height == 0 {
        return;
    }

    let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
    let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;
    let x_scale = frame.width as f64 / display_width as f64;
    let y_scale = frame.height as f64 / (display_height * 2) as f64;

    for ty in 0..display_height {
        for tx in 0..display_width {
            let src_x = (tx as f64 * x_scale) as u32;
            let top = (ty as f64 * 2.0 * y_scale) as u32;
            let bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

            if let Some(cell) = buf.cell_mut((x_offset + tx, y_offset + ty)) {
                let (r, g, b) = frame.rgb_at(src_x, top);
                let (r2, g2, b2) = frame.rgb_at(src_x, bottom);
                cell.set_char('▀');
                cell.set_fg(Color::Rgb(r, g, b));
                cell.set_bg(Color::Rgb(r2, g2, b2));
            }
        }
    }
}

fn centered(area: Rect, buf: &mut Buffer, lines: &[&str], style: Style) {
    let lines: Vec<&str> = lines.iter().copied().filter(|l| !l.is_empty()).collect();
    let top = area.y + area.height.saturating_sub(lines.len() as u16) / 2;
    for (i, line) in lines.iter().enumerate() {
        let y = top + i as u16;
        if y >= area.y + area.height {
            break;
        }
        let text: String = line.chars().take(area.width as usize).collect();
        let x = area.x + area.width.saturating_sub(text.chars().count() as u16) / 2;
        buf.set_string(x, y, text, style);
    }
}

fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Single styled line filling its area
struct TextLine<'a> {
    text: &'a str,
    style: Style,
}

impl Widget for TextLine<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 {
            return;
        }
        buf.set_style(area, self.style);
        let text: String = self.text.chars().take(area.width as usize).collect();
        buf.set_string(area.x, area.y, text, self.style);
    }
}

/// Mic, camera, and leave buttons
struct ControlsBar {
    controls: ControlsState,
    show_help: bool,
}

impl ControlsBar {
    fn message(&self) -> String {
        if self.show_help {
            return "m: Mute/unmute | c: Camera on/off | r: Retry camera | q/l: Leave | h: Toggle help"
                .to_string();
        }

        let mic = if self.controls.muted { "Unmute" } else { "Mute" };
        let camera = if self.controls.loading {
            "Camera..."
        } else if !self.controls.camera_enabled {
            "No camera"
        } else if self.controls.camera_off {
            "Camera on"
        } else {
            "Camera off"
        };
        format!("'m' {} | 'c' {} | 'l' Leave | 'h' help", mic, camera)
    }
}

impl Widget for ControlsBar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        TextLine {
            text: &self.message(),
            style: Style::default().fg(Color::White).bg(Color::DarkGray),
        }
        .render(area, buf);
    }
}

/// Error notices stay recognizable without color
fn notice_prefix(kind: NoticeKind) -> &'static str {
    if kind.is_error() { "! " } else { "" }
}
