//! Fulcrum Auth: bearer token generation, hashing and resolution of
//! bearer values into caller identities.

pub mod authenticator;
pub mod config;
pub mod error;
pub mod token;

pub use authenticator::{Authenticator, TokenAuthenticator};
pub use config::AuthConfig;
pub use error::AuthError;
