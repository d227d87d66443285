use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex as StdMutex, PoisonError,
    },
};

use anyhow::{bail, Result};
use log::{error, info, warn};
use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::events::{SharedSink, UiEvent};

use super::{
    error::AuthError,
    provider::{IdentityProvider, ProviderUser},
};

const FALLBACK_DISPLAY_NAME: &str = "Yoga User";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub user_id: String,
    pub email: Option<String>,
    pub display_name: String,
}

impl SessionUser {
    fn from_provider(user: &ProviderUser) -> Self {
        Self {
            user_id: user.uid.clone(),
            email: user.email.clone(),
            display_name: display_name_for(user),
        }
    }
}

/// Session as seen by the rest of the app. `ready` stays false until the
/// first provider notification (and its profile write) has settled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub user: Option<SessionUser>,
    pub ready: bool,
}

impl SessionSnapshot {
    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }
}

/// Persists the profile document for a signed-in user.
pub trait ProfileStore: Send + Sync + 'static {
    fn upsert_profile(&self, user: &SessionUser) -> impl Future<Output = Result<()>> + Send;
}

/// Provider display name, else the email's local part, else a generic name.
pub fn display_name_for(user: &ProviderUser) -> String {
    if let Some(name) = user.display_name.as_deref().map(str::trim) {
        if !name.is_empty() {
            return name.to_string();
        }
    }
    user.email
        .as_deref()
        .and_then(|email| email.split('@').next())
        .filter(|local| !local.is_empty())
        .unwrap_or(FALLBACK_DISPLAY_NAME)
        .to_string()
}

/// Display name chosen at sign-up that the provider has not echoed yet.
#[derive(Debug, Clone)]
struct PublishedName {
    uid: String,
    name: String,
}

type PendingName = Arc<StdMutex<Option<PublishedName>>>;

/// Keeps a locally published name over older provider snapshots of the same
/// account. The pending name is dropped once the provider reports it, or
/// when another account (or none) is signed in.
fn prefer_published_name(
    user: Option<&mut SessionUser>,
    provider_name: Option<&str>,
    pending: &PendingName,
) {
    let mut guard = pending.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(published) = guard.as_ref() else {
        return;
    };
    match user {
        Some(user) if user.user_id == published.uid => {
            if provider_name.map(str::trim) == Some(published.name.as_str()) {
                *guard = None;
            } else {
                user.display_name = published.name.clone();
            }
        }
        _ => *guard = None,
    }
}

/// Outcome of a signed-in-only action.
#[derive(Debug, PartialEq, Eq)]
pub enum Gated<T> {
    Allowed(T),
    SignInRequired,
}

/// Single owner of session state for the process.
pub struct SessionManager<P, S> {
    provider: Arc<P>,
    store: Arc<S>,
    state: Arc<watch::Sender<SessionSnapshot>>,
    events: SharedSink,
    pending_name: PendingName,
    started: AtomicBool,
}

impl<P: IdentityProvider, S: ProfileStore> SessionManager<P, S> {
    pub fn new(provider: Arc<P>, store: Arc<S>, events: SharedSink) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            provider,
            store,
            state: Arc::new(state),
            events,
            pending_name: Arc::new(StdMutex::new(None)),
            started: AtomicBool::new(false),
        }
    }

    /// Begins listening to provider notifications. Only one listener may
    /// exist per manager.
    pub fn start(&self) -> Result<SessionSubscription> {
        if self.started.swap(true, Ordering::SeqCst) {
            bail!("session listener already started");
        }

        let mut notifications = self.provider.subscribe();
        let store = self.store.clone();
        let state = self.state.clone();
        let events = self.events.clone();
        let pending_name = self.pending_name.clone();
        let token = CancellationToken::new();
        let cancel = token.clone();

        let handle = tokio::spawn(async move {
            loop {
                let current = notifications.borrow_and_update().clone();
                apply_notification(current, store.as_ref(), &state, &events, &pending_name).await;

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = notifications.changed() => {
                        if changed.is_err() {
                            warn!("identity provider closed its session stream");
                            break;
                        }
                    }
                }
            }
            info!("session listener stopped");
        });

        Ok(SessionSubscription {
            cancel_token: token,
            handle: Some(handle),
        })
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Resolves once the first provider notification has been applied.
    pub async fn wait_ready(&self) -> SessionSnapshot {
        let mut rx = self.state.subscribe();
        let ready = rx
            .wait_for(|snapshot| snapshot.ready)
            .await
            .map(|snapshot| snapshot.clone());
        ready.unwrap_or_else(|_| self.snapshot())
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionUser, AuthError> {
        let user = self.provider.sign_in(email, password).await?;
        let session_user = SessionUser::from_provider(&user);
        if let Err(err) = self.store.upsert_profile(&session_user).await {
            error!("failed to store profile after sign-in: {err:#}");
        }
        Ok(session_user)
    }

    /// Creates the account, names it, stores the profile and publishes the
    /// name right away without waiting for the provider to echo it.
    pub async fn sign_up(
        &self,
        display_name: &str,
        email: &str,
        password: &str,
    ) -> Result<SessionUser, AuthError> {
        let user = self.provider.create_account(email, password).await?;
        let display_name = display_name.trim();
        *self.pending_name.lock().unwrap_or_else(PoisonError::into_inner) = Some(PublishedName {
            uid: user.uid.clone(),
            name: display_name.to_string(),
        });
        if let Err(err) = self
            .provider
            .update_display_name(&user.uid, display_name)
            .await
        {
            *self.pending_name.lock().unwrap_or_else(PoisonError::into_inner) = None;
            return Err(err.into());
        }

        let session_user = SessionUser {
            user_id: user.uid,
            email: user.email,
            display_name: display_name.to_string(),
        };
        if let Err(err) = self.store.upsert_profile(&session_user).await {
            error!("failed to store profile after sign-up: {err:#}");
        }

        let snapshot = SessionSnapshot {
            user: Some(session_user.clone()),
            ready: true,
        };
        self.state.send_replace(snapshot.clone());
        self.events.emit(UiEvent::SessionChanged(snapshot));
        Ok(session_user)
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.provider.sign_out().await?;
        Ok(())
    }

    /// Runs `action` for a signed-in user; otherwise asks the UI to open the
    /// sign-in prompt.
    pub async fn guard<F, Fut, T>(&self, action: F) -> Gated<T>
    where
        F: FnOnce(SessionUser) -> Fut,
        Fut: Future<Output = T>,
    {
        let user = self.state.borrow().user.clone();
        match user {
            Some(user) => Gated::Allowed(action(user).await),
            None => {
                info!("signed-in action requested without a session");
                self.events.emit(UiEvent::SignInRequested);
                Gated::SignInRequired
            }
        }
    }
}

async fn apply_notification<S: ProfileStore>(
    current: Option<ProviderUser>,
    store: &S,
    state: &watch::Sender<SessionSnapshot>,
    events: &SharedSink,
    pending_name: &PendingName,
) {
    let provider_name = current.as_ref().and_then(|user| user.display_name.clone());
    let user = match current {
        Some(provider_user) => {
            let mut session_user = SessionUser::from_provider(&provider_user);
            prefer_published_name(Some(&mut session_user), provider_name.as_deref(), pending_name);
            if let Err(err) = store.upsert_profile(&session_user).await {
                error!(
                    "failed to store profile for {}: {err:#}",
                    session_user.user_id
                );
            }
            Some(session_user)
        }
        None => None,
    };

    let mut snapshot = SessionSnapshot { user, ready: true };
    let changed = state.send_if_modified(|current| {
        // sign-up may have published a name while the profile was written
        prefer_published_name(snapshot.user.as_mut(), provider_name.as_deref(), pending_name);
        if *current == snapshot {
            false
        } else {
            *current = snapshot.clone();
            true
        }
    });
    if changed {
        info!(
            "session changed: {}",
            if snapshot.is_signed_in() { "signed in" } else { "signed out" }
        );
        events.emit(UiEvent::SessionChanged(snapshot));
    }
}

/// Disposer for the session listener.
pub struct SessionSubscription {
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl SessionSubscription {
    pub async fn dispose(mut self) -> Result<()> {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.await?;
        }
        Ok(())
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
