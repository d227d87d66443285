use std::collections::HashMap;

use log::{debug, info};
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use super::provider::{IdentityProvider, ProviderError, ProviderUser};

const MIN_PASSWORD_LEN: usize = 6;
const MAX_FAILED_ATTEMPTS: u32 = 5;

struct Account {
    uid: String,
    email: String,
    password: String,
    display_name: Option<String>,
}

impl Account {
    fn user(&self) -> ProviderUser {
        ProviderUser {
            uid: self.uid.clone(),
            email: Some(self.email.clone()),
            display_name: self.display_name.clone(),
        }
    }
}

#[derive(Default)]
struct Accounts {
    by_email: HashMap<String, Account>,
    failed_attempts: HashMap<String, u32>,
}

/// In-memory identity provider for offline use and tests. Reports the same
/// `auth/...` codes as the hosted service.
pub struct LocalIdentityProvider {
    accounts: Mutex<Accounts>,
    current: watch::Sender<Option<ProviderUser>>,
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(Accounts::default()),
            current,
        }
    }

    fn publish(&self, user: Option<ProviderUser>) {
        self.current.send_replace(user);
    }
}

impl Default for LocalIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_email(email: &str) -> Result<String, ProviderError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(ProviderError::new(
            "auth/invalid-email",
            "The email address is badly formatted.",
        )),
    }
}

impl IdentityProvider for LocalIdentityProvider {
    fn subscribe(&self) -> watch::Receiver<Option<ProviderUser>> {
        self.current.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderUser, ProviderError> {
        let email = normalize_email(email)?;
        let mut accounts = self.accounts.lock().await;

        let failures = accounts.failed_attempts.get(&email).copied().unwrap_or(0);
        if failures >= MAX_FAILED_ATTEMPTS {
            return Err(ProviderError::new(
                "auth/too-many-requests",
                "Access temporarily disabled due to many failed login attempts.",
            ));
        }

        let user = match accounts.by_email.get(&email) {
            None => {
                return Err(ProviderError::new(
                    "auth/user-not-found",
                    "There is no user record corresponding to this identifier.",
                ))
            }
            Some(account) if account.password != password => None,
            Some(account) => Some(account.user()),
        };

        let Some(user) = user else {
            *accounts.failed_attempts.entry(email).or_insert(0) += 1;
            debug!("rejected password for local account ({} failures)", failures + 1);
            return Err(ProviderError::new(
                "auth/invalid-credential",
                "The supplied credentials are incorrect.",
            ));
        };

        accounts.failed_attempts.remove(&email);
        drop(accounts);

        info!("local account {} signed in", user.uid);
        self.publish(Some(user.clone()));
        Ok(user)
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderUser, ProviderError> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ProviderError::new(
                "auth/weak-password",
                "Password should be at least 6 characters.",
            ));
        }

        let mut accounts = self.accounts.lock().await;
        if accounts.by_email.contains_key(&email) {
            return Err(ProviderError::new(
                "auth/email-already-in-use",
                "The email address is already in use by another account.",
            ));
        }

        let account = Account {
            uid: Uuid::new_v4().simple().to_string(),
            email: email.clone(),
            password: password.to_string(),
            display_name: None,
        };
        let user = account.user();
        accounts.by_email.insert(email, account);
        drop(accounts);

        info!("local account {} created", user.uid);
        self.publish(Some(user.clone()));
        Ok(user)
    }

    async fn update_display_name(&self, uid: &str, display_name: &str) -> Result<(), ProviderError> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts
            .by_email
            .values_mut()
            .find(|account| account.uid == uid)
            .ok_or_else(|| {
                ProviderError::new("auth/user-not-found", "No user record for this identifier.")
            })?;
        account.display_name = Some(display_name.to_string());
        let user = account.user();
        drop(accounts);

        self.current.send_if_modified(|current| match current {
            Some(signed_in) if signed_in.uid == user.uid => {
                *signed_in = user;
                true
            }
            _ => false,
        });
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.publish(None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn account_lifecycle_publishes_session() {
        let provider = LocalIdentityProvider::new();
        let rx = provider.subscribe();
        assert_eq!(*rx.borrow(), None);

        let created = provider
            .create_account("Asha@Example.com", "lotus123")
            .await
            .unwrap();
        assert_eq!(created.email.as_deref(), Some("asha@example.com"));
        assert_eq!(rx.borrow().as_ref().map(|u| u.uid.clone()), Some(created.uid.clone()));

        provider.update_display_name(&created.uid, "Asha").await.unwrap();
        assert_eq!(
            rx.borrow().as_ref().and_then(|u| u.display_name.clone()),
            Some("Asha".to_string())
        );

        provider.sign_out().await.unwrap();
        assert_eq!(*rx.borrow(), None);

        let user = provider.sign_in("asha@example.com", "lotus123").await.unwrap();
        assert_eq!(user.display_name.as_deref(), Some("Asha"));
    }

    #[tokio::test]
    async fn provider_error_codes() {
        let provider = LocalIdentityProvider::new();
        let code = |result: Result<ProviderUser, ProviderError>| result.unwrap_err().code;

        assert_eq!(code(provider.create_account("nope", "lotus123").await), "auth/invalid-email");
        assert_eq!(code(provider.create_account("a@b.io", "123").await), "auth/weak-password");
        provider.create_account("a@b.io", "lotus123").await.unwrap();
        assert_eq!(
            code(provider.create_account("a@b.io", "lotus123").await),
            "auth/email-already-in-use"
        );
        assert_eq!(code(provider.sign_in("x@b.io", "lotus123").await), "auth/user-not-found");
        assert_eq!(code(provider.sign_in("a@b.io", "wrong!").await), "auth/invalid-credential");
    }

    #[tokio::test]
    async fn repeated_failures_lock_the_account() {
        let provider = LocalIdentityProvider::new();
        provider.create_account("a@b.io", "lotus123").await.unwrap();
        for _ in 0..MAX_FAILED_ATTEMPTS {
            let err = provider.sign_in("a@b.io", "wrong!").await.unwrap_err();
            assert_eq!(err.code, "auth/invalid-credential");
        }
        let err = provider.sign_in("a@b.io", "lotus123").await.unwrap_err();
        assert_eq!(err.code, "auth/too-many-requests");
    }
}
