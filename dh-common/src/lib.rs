pub mod config;
pub mod credentials;
pub mod error;
