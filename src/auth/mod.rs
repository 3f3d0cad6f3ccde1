//! Authentication module.
//!
//! Provides account sign-up and sign-in, password reset and change,
//! signed bearer sessions and derivation of premium access.

pub mod access;
pub mod mailer;
pub mod manager;
pub mod password;
pub mod session;
pub mod types;

pub use access::{derive_access, AccessPolicy, AccessProfile};
pub use mailer::{EmailMessage, LogMailer, Mailer, MemoryMailer};
pub use manager::AuthManager;
pub use session::{SessionClaims, SessionSigner};
pub use types::{AuthError, Session, User};
