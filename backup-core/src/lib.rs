pub mod cloud;
pub mod config;
pub mod constants;
pub mod device;
pub mod error;
pub mod gdrive;
pub mod history;
pub mod inventory;
pub mod model;
pub mod retention;
pub mod routeros;
pub mod scheduler;
pub mod service;
pub mod settings;
pub mod transaction;
pub mod transfer;

pub use error::{BackupError, Result};
