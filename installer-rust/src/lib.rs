pub mod association;
pub mod config;
pub mod deploy;
pub mod error;
pub mod fs_ops;
pub mod installer;
pub mod locate;
pub mod logging;
pub mod paths;
pub mod registry;
pub mod search_path;
pub mod store;
pub mod verify;

pub use error::InstallError;
pub use installer::{run, run_with_store, InstallReport, RunOptions};
