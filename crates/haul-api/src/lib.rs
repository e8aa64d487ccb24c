pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod health;
pub mod loads;
pub mod messages;
pub mod routes;

pub use auth::{AppState, AppStateInner};
pub use config::{AuthConfig, Config};
pub use routes::router;
