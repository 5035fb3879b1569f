pub mod client;
pub mod error;
mod store;

pub use client::{AuthClient, SignInForm, SignUpForm, SignedIn};
pub use error::Error;
pub use store::{CredentialStore, Credentials, DEFAULT_DISPLAY_NAME};
