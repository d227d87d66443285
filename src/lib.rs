pub mod analytics;
pub mod api;
#[cfg(feature = "audio")]
pub mod audio;
pub mod auth;
pub mod breathing;
pub mod db;
pub mod events;
pub mod feedback;
pub mod hold;
pub mod poses;
pub mod practice;
pub mod settings;

use std::{env, fs, path::Path, sync::Arc, time::Duration};

use analytics::{load_dashboard, Dashboard};
use anyhow::{Context, Result};
use api::LocalApi;
use auth::{Gated, LocalIdentityProvider, SessionManager};
use breathing::cue_player;
use db::Database;
use events::{LogSink, SharedSink};
use feedback::StdioTransport;
use log::{info, warn};
use practice::{PracticeOptions, PracticeView};
use settings::SettingsStore;
use tokio::time::{self, MissedTickBehavior};

pub type Sessions = SessionManager<LocalIdentityProvider, Database>;

/// Process-wide services shared by every practice view.
pub struct AppState {
    pub db: Database,
    pub settings: SettingsStore,
    pub sessions: Sessions,
    pub api: LocalApi,
    pub events: SharedSink,
}

impl AppState {
    pub fn open(data_dir: &Path, events: SharedSink) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let settings = SettingsStore::open_in(data_dir)?;
        let db = Database::open_in(data_dir)?;
        let sessions = SessionManager::new(
            Arc::new(LocalIdentityProvider::new()),
            Arc::new(db.clone()),
            events.clone(),
        );

        Ok(Self {
            api: LocalApi::new(db.clone()),
            db,
            settings,
            sessions,
            events,
        })
    }

    pub fn practice_options(&self) -> PracticeOptions {
        PracticeOptions::new(self.settings.timing(), cue_player(&self.settings.cues()))
    }

    /// Opens the practice page for a route parameter, attributing runs to the
    /// signed-in user if there is one.
    pub async fn open_practice(&self, requested_pose: Option<&str>) -> Result<PracticeView> {
        let user_id = self.sessions.snapshot().user.map(|user| user.user_id);
        PracticeView::open(
            requested_pose,
            &self.api,
            self.db.clone(),
            user_id,
            self.practice_options(),
            self.events.clone(),
        )
        .await
    }

    /// The analytics page is only available to signed-in users.
    pub async fn dashboard(&self, pose_id: &str) -> Gated<Dashboard> {
        self.sessions
            .guard(|_user| load_dashboard(&self.api, pose_id))
            .await
    }
}

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("NYRA starting up...");

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(drive(env::args().nth(1)))
}

/// Headless practice session: detector verdicts arrive as JSON lines on
/// stdin, the pose selection goes out on stdout, UI events go to the log.
async fn drive(requested_pose: Option<String>) -> Result<()> {
    let state = AppState::open(&settings::data_dir(), Arc::new(LogSink))?;
    let subscription = state.sessions.start()?;
    state.sessions.wait_ready().await;

    let view = state.open_practice(requested_pose.as_deref()).await?;
    info!(
        "practicing {} (detector endpoint {})",
        view.pose(),
        state.settings.feedback().url()
    );

    view.enable_camera(StdioTransport::stdio()).await?;
    view.toggle_timer().await;

    tokio::select! {
        _ = wait_for_disconnect(&view) => info!("detector stream ended"),
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                warn!("failed to listen for Ctrl-C: {err}");
            }
            info!("interrupted");
        }
    }

    let pose = view.pose().to_string();
    if let Some(summary) = view.teardown().await? {
        info!("{}", serde_json::to_string(&summary)?);
    }

    match state.dashboard(&pose).await {
        Gated::Allowed(dashboard) => info!("{}", serde_json::to_string(&dashboard)?),
        Gated::SignInRequired => info!("sign in to see analytics for {pose}"),
    }

    subscription.dispose().await
}

async fn wait_for_disconnect(view: &PracticeView) {
    let mut interval = time::interval(Duration::from_millis(250));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if !view.feedback_connected().await {
            break;
        }
    }
}
