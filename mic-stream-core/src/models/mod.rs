pub mod config;
pub mod effective;
pub mod error;
pub mod metadata;
pub mod state;
