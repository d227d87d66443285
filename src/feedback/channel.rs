use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::{sync::mpsc, task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::events::{SharedSink, UiEvent};

use super::{
    message::{parse_message, FeedbackMessage, PoseSelection},
    transport::FeedbackTransport,
};

/// Live detector connection for one pose. There is no reconnection: once the
/// peer goes away the channel stays disconnected until it is reopened.
pub struct FeedbackChannel {
    pose: String,
    opened_at: Instant,
    connected: Arc<AtomicBool>,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl FeedbackChannel {
    /// Announces `pose` to the detector and starts forwarding its verdicts.
    pub async fn open<T: FeedbackTransport>(
        pose: &str,
        mut transport: T,
        events: SharedSink,
    ) -> Result<(Self, mpsc::UnboundedReceiver<FeedbackMessage>)> {
        let selection = serde_json::to_string(&PoseSelection { pose })?;
        transport
            .send(selection)
            .await
            .with_context(|| format!("failed to select pose {pose} on feedback channel"))?;

        info!("feedback channel opened for {pose}");
        events.emit(UiEvent::FeedbackConnection {
            pose: pose.to_string(),
            connected: true,
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));
        let cancel_token = CancellationToken::new();

        let handle = tokio::spawn(read_loop(
            pose.to_string(),
            transport,
            tx,
            connected.clone(),
            cancel_token.clone(),
            events,
        ));

        Ok((
            Self {
                pose: pose.to_string(),
                opened_at: Instant::now(),
                connected,
                cancel_token,
                handle: Some(handle),
            },
            rx,
        ))
    }

    pub fn pose(&self) -> &str {
        &self.pose
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn elapsed(&self) -> Duration {
        self.opened_at.elapsed()
    }

    /// Stops the reader and closes the transport. Returns how long the
    /// channel was open.
    pub async fn close(mut self) -> Result<Duration> {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.await.context("feedback reader failed to join")?;
        }
        Ok(self.elapsed())
    }
}

impl Drop for FeedbackChannel {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn read_loop<T: FeedbackTransport>(
    pose: String,
    mut transport: T,
    messages: mpsc::UnboundedSender<FeedbackMessage>,
    connected: Arc<AtomicBool>,
    cancel_token: CancellationToken,
    events: SharedSink,
) {
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                if let Err(err) = transport.close().await {
                    warn!("failed to close feedback transport for {pose}: {err:#}");
                }
                info!("feedback channel for {pose} closed");
                break;
            }
            frame = transport.recv() => {
                let Some(frame) = frame else {
                    warn!("feedback channel for {pose} dropped by peer");
                    break;
                };
                let Some(message) = parse_message(&frame) else {
                    continue;
                };
                if messages.send(message).is_err() {
                    info!("feedback consumer for {pose} went away");
                    break;
                }
            }
        }
    }

    connected.store(false, Ordering::SeqCst);
    events.emit(UiEvent::FeedbackConnection {
        pose,
        connected: false,
    });
}
