pub mod config;
pub mod error;
pub mod history;
pub mod io;
pub mod machine;
pub mod paths;
pub mod types;
pub mod version;

pub use error::{GitopsError, Result};
