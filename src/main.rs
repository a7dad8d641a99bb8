use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use vibe_client::controller::RoomController;
use vibe_client::driver::{MediaDriver, MediaEngine, RodioEngine};
use vibe_client::logging;
use vibe_client::media_session::MediaSessionBridge;
use vibe_client::model::{AppContext, PlaybackState, PlaybackStore, Role};
use vibe_client::resolver::DirectResolver;
use vibe_client::session::Session;
use vibe_client::settings::Settings;
use vibe_client::transport::ChannelTransport;

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = logging::init_logging() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    tracing::info!("=== Vibe Client Starting ===");

    let settings_path = Settings::default_path();
    let settings = Settings::load(&settings_path);

    let role = match std::env::var("VIBE_ROLE").as_deref() {
        Ok("admin") => Role::Admin,
        _ => Role::Listener,
    };
    tracing::info!(?role, "Joining room");

    let session = Session::new(role, AppContext::Desktop, settings.clone(), settings_path);
    session.set_admin_online(role == Role::Admin);

    // Stand-in transport endpoint; a real room server attaches to the
    // other side of this channel pair.
    let (transport, mut server_rx) = ChannelTransport::pair();
    tokio::spawn(async move {
        while let Some(room_event) = server_rx.recv().await {
            tracing::debug!(?room_event, "Outbound room event");
        }
    });

    let audio: Arc<dyn MediaEngine> = Arc::new(RodioEngine::new()?);
    let driver = MediaDriver::audio_only(audio);

    let store = PlaybackStore::new(PlaybackState::new(
        settings.background_enabled,
        settings.volume,
    ));

    let controller = RoomController::new(
        store,
        driver,
        transport,
        Arc::new(DirectResolver),
        session,
    );

    // Push the persisted volume into the engine without re-saving it.
    controller.set_volume(settings.volume, false).await;
    controller.start_remote_event_listener();

    let mut bridge = match MediaSessionBridge::new() {
        Ok(bridge) => Some(bridge),
        Err(e) => {
            tracing::warn!(error = %e, "OS media controls unavailable");
            None
        }
    };

    enable_raw_mode()?;
    let res = run_loop(&controller, &mut bridge).await;
    disable_raw_mode()?;

    controller.shutdown().await;

    if let Err(err) = res {
        tracing::error!(error = ?err, "Client error");
    }

    tracing::info!("Vibe client shutting down");
    Ok(())
}

async fn run_loop(
    controller: &RoomController,
    bridge: &mut Option<MediaSessionBridge>,
) -> Result<()> {
    loop {
        controller.session().auto_clear_old_notice().await;

        // Short poll keeps media-session events and quit checks fresh.
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                controller.handle_key_event(key, false).await?;
            }
        }

        if let Some(bridge) = bridge.as_mut() {
            for media_key in bridge.poll_events() {
                controller.handle_media_key(media_key).await;
            }
            let snapshot = controller.store().snapshot().await;
            if let Err(e) = bridge.update_now_playing(&snapshot) {
                tracing::trace!(error = %e, "Media session update failed");
            }
        }

        if controller.session().should_quit() {
            break;
        }
    }

    Ok(())
}
