//! Room session handle: who we are in the room, whether the admin is
//! around, transient user-facing notices, and the shutdown flag.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::{Mutex, RwLock};

use crate::model::{AppContext, Role};
use crate::settings::Settings;

const NOTICE_TTL_SECS: u64 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A transient, non-blocking user-facing notice.
#[derive(Clone, Debug)]
pub struct Notice {
    pub message: String,
    pub severity: Severity,
    shown_at: Instant,
}

/// Created at session start, torn down at session end; passed by
/// handle to every component that needs room identity.
#[derive(Clone)]
pub struct Session {
    role: Arc<RwLock<Role>>,
    admin_online: Arc<AtomicBool>,
    context: AppContext,
    notice: Arc<Mutex<Option<Notice>>>,
    should_quit: Arc<AtomicBool>,
    settings: Arc<Mutex<Settings>>,
    settings_path: PathBuf,
}

impl Session {
    pub fn new(role: Role, context: AppContext, settings: Settings, settings_path: PathBuf) -> Self {
        Self {
            role: Arc::new(RwLock::new(role)),
            admin_online: Arc::new(AtomicBool::new(false)),
            context,
            notice: Arc::new(Mutex::new(None)),
            should_quit: Arc::new(AtomicBool::new(false)),
            settings: Arc::new(Mutex::new(settings)),
            settings_path,
        }
    }

    /// Live role read. Never cache the result: the room can promote or
    /// demote a participant between attempts.
    pub async fn role(&self) -> Role {
        *self.role.read().await
    }

    pub async fn set_role(&self, role: Role) {
        *self.role.write().await = role;
    }

    pub fn admin_online(&self) -> bool {
        self.admin_online.load(Ordering::SeqCst)
    }

    pub fn set_admin_online(&self, online: bool) {
        self.admin_online.store(online, Ordering::SeqCst);
    }

    pub fn context(&self) -> AppContext {
        self.context
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit.load(Ordering::SeqCst)
    }

    pub fn request_quit(&self) {
        self.should_quit.store(true, Ordering::SeqCst);
    }

    pub async fn warn(&self, message: impl Into<String>) {
        self.show(message.into(), Severity::Warning).await;
    }

    pub async fn error(&self, message: impl Into<String>) {
        self.show(message.into(), Severity::Error).await;
    }

    async fn show(&self, message: String, severity: Severity) {
        tracing::debug!(%message, ?severity, "User notice");
        *self.notice.lock().await = Some(Notice {
            message,
            severity,
            shown_at: Instant::now(),
        });
    }

    pub async fn current_notice(&self) -> Option<Notice> {
        self.notice.lock().await.clone()
    }

    /// Drops a notice once it has been on screen long enough.
    pub async fn auto_clear_old_notice(&self) {
        let mut notice = self.notice.lock().await;
        if let Some(n) = notice.as_ref() {
            if n.shown_at.elapsed().as_secs() >= NOTICE_TTL_SECS {
                *notice = None;
            }
        }
    }

    pub async fn settings(&self) -> Settings {
        self.settings.lock().await.clone()
    }

    /// Persists the volume preference on explicit user change.
    pub async fn save_volume(&self, volume: f64) -> Result<()> {
        let mut settings = self.settings.lock().await;
        settings.volume = volume.clamp(0.0, 1.0);
        settings.save(&self.settings_path)
    }

    /// Persists the background-video preference.
    pub async fn save_background(&self, enabled: bool) -> Result<()> {
        let mut settings = self.settings.lock().await;
        settings.background_enabled = enabled;
        settings.save(&self.settings_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: Role) -> Session {
        let dir = std::env::temp_dir().join("vibe-session-test");
        Session::new(
            role,
            AppContext::Web,
            Settings::default(),
            dir.join("settings.json"),
        )
    }

    #[tokio::test]
    async fn role_changes_are_visible_immediately() {
        let s = session(Role::Listener);
        assert_eq!(s.role().await, Role::Listener);
        s.set_role(Role::Admin).await;
        assert_eq!(s.role().await, Role::Admin);
    }

    #[tokio::test]
    async fn notices_replace_each_other() {
        let s = session(Role::Listener);
        s.warn("first").await;
        s.error("second").await;
        let notice = s.current_notice().await.unwrap();
        assert_eq!(notice.message, "second");
        assert_eq!(notice.severity, Severity::Error);
    }
}
