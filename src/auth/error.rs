//! User-facing authentication failures.

use super::provider::ProviderError;

/// Closed set of sign-in/sign-up failures. `Display` is the text shown to the
/// user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password. Please try again.")]
    InvalidCredentials,

    #[error("This email is already registered. Please sign in instead.")]
    EmailAlreadyRegistered,

    #[error("Password is too weak. Please use at least 6 characters.")]
    WeakPassword,

    #[error("Too many failed login attempts. Please try again later.")]
    TooManyAttempts,

    #[error("No account found with this email. Please sign up first.")]
    NoSuchAccount,

    /// Unrecognised provider code; the provider's own message is shown.
    #[error("{message}")]
    Provider { code: String, message: String },
}

impl AuthError {
    pub fn from_code(code: &str, message: &str) -> Self {
        match code {
            "auth/invalid-credential" | "auth/invalid-email" | "auth/wrong-password" => {
                AuthError::InvalidCredentials
            }
            "auth/email-already-in-use" => AuthError::EmailAlreadyRegistered,
            "auth/weak-password" => AuthError::WeakPassword,
            "auth/too-many-requests" => AuthError::TooManyAttempts,
            "auth/user-not-found" => AuthError::NoSuchAccount,
            _ => AuthError::Provider {
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        AuthError::from_code(&err.code, &err.message)
    }
}
