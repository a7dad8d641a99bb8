//! Control surfaces: global key bindings and OS media-control events.
//! Both delegate to the same command methods; no playback logic lives
//! here.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::media_session::MediaKeyEvent;

use super::RoomController;

impl RoomController {
    /// Global key bindings. `text_input_active` suppresses the Space
    /// binding while the user is typing into a text field.
    pub async fn handle_key_event(&self, key: KeyEvent, text_input_active: bool) -> Result<()> {
        if key.kind != KeyEventKind::Press {
            return Ok(());
        }

        let nav_modifier = key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT);

        match key.code {
            KeyCode::Char(' ') if !text_input_active => {
                self.toggle_play_pause().await;
            }
            KeyCode::Right if nav_modifier => {
                self.play_next().await;
            }
            KeyCode::Left if nav_modifier => {
                self.play_prev().await;
            }
            KeyCode::Char('q') | KeyCode::Char('Q') if !text_input_active => {
                self.session.request_quit();
            }
            _ => {}
        }
        Ok(())
    }

    /// Routes one OS media-control event into the regular command
    /// path. Seek nudges are deliberately ignored: only absolute seeks
    /// are supported, and those stay behind the admin gate.
    pub async fn handle_media_key(&self, event: MediaKeyEvent) {
        match event {
            MediaKeyEvent::Play => self.resume().await,
            MediaKeyEvent::Pause => self.pause().await,
            MediaKeyEvent::Toggle => self.toggle_play_pause().await,
            MediaKeyEvent::Next => self.play_next().await,
            MediaKeyEvent::Previous => self.play_prev().await,
            MediaKeyEvent::SetPosition(position) => {
                self.seek(position.as_secs_f64()).await;
            }
            MediaKeyEvent::SeekForward | MediaKeyEvent::SeekBackward => {}
        }
    }
}
