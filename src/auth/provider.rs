use std::future::Future;

use tokio::sync::watch;

/// Account as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderUser {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Raw provider failure: a stable `auth/...` code plus a human message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// External identity service.
///
/// `subscribe` hands out a receiver whose current value is the present
/// session; every sign-in, sign-up and sign-out publishes a new value.
pub trait IdentityProvider: Send + Sync + 'static {
    fn subscribe(&self) -> watch::Receiver<Option<ProviderUser>>;

    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<ProviderUser, ProviderError>> + Send;

    fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<ProviderUser, ProviderError>> + Send;

    fn update_display_name(
        &self,
        uid: &str,
        display_name: &str,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;

    fn sign_out(&self) -> impl Future<Output = Result<(), ProviderError>> + Send;
}
