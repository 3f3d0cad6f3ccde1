//! Storage module for database, configuration and the avatar bucket.

pub mod avatars;
pub mod config;
pub mod database;
pub mod schema;

pub use avatars::{Avatar, AvatarError, AvatarStore};
pub use config::{AppConfig, ConfigError};
pub use database::{Database, DatabaseError};
