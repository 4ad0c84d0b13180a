pub mod config;
pub mod deploy;
pub mod events;
pub mod health;
pub mod history;
pub mod status;
