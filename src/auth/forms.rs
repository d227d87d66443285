//! Sign-in and sign-up dialog state.

use serde::Deserialize;

use super::{
    error::AuthError,
    provider::IdentityProvider,
    session::{ProfileStore, SessionManager, SessionUser},
};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("Passwords don't match!")]
    PasswordMismatch,

    #[error("Password must be at least 6 characters long")]
    PasswordTooShort,

    #[error("Name is required")]
    NameRequired,

    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

impl SignInForm {
    /// Signs in; the form is cleared only on success.
    pub async fn submit<P, S>(
        &mut self,
        sessions: &SessionManager<P, S>,
    ) -> Result<SessionUser, FormError>
    where
        P: IdentityProvider,
        S: ProfileStore,
    {
        let user = sessions.sign_in(&self.email, &self.password).await?;
        *self = Self::default();
        Ok(user)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpForm {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignUpForm {
    /// Local checks, in the order the dialog reports them.
    pub fn validate(&self) -> Result<(), FormError> {
        if self.password != self.confirm_password {
            return Err(FormError::PasswordMismatch);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(FormError::PasswordTooShort);
        }
        if self.full_name.trim().is_empty() {
            return Err(FormError::NameRequired);
        }
        Ok(())
    }

    pub async fn submit<P, S>(
        &mut self,
        sessions: &SessionManager<P, S>,
    ) -> Result<SessionUser, FormError>
    where
        P: IdentityProvider,
        S: ProfileStore,
    {
        self.validate()?;
        let user = sessions
            .sign_up(&self.full_name, &self.email, &self.password)
            .await?;
        *self = Self::default();
        Ok(user)
    }
}
