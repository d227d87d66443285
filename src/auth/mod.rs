//! Session state on top of an external identity provider.

pub mod error;
pub mod forms;
pub mod local;
pub mod provider;
pub mod session;

pub use error::AuthError;
pub use forms::{FormError, SignInForm, SignUpForm};
pub use local::LocalIdentityProvider;
pub use provider::{IdentityProvider, ProviderError, ProviderUser};
pub use session::{
    display_name_for, Gated, ProfileStore, SessionManager, SessionSnapshot, SessionSubscription,
    SessionUser,
};
