pub mod config;
pub mod deploy;
pub mod history;
pub mod serve;
pub mod status;
