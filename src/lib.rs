pub mod calendar;
pub mod cli;
pub mod config;
pub mod database;
pub mod logging;
pub mod models;
pub mod normalizer;
pub mod services;
pub mod session;
pub mod tui;
pub mod utils;

pub use config::Config;
pub use database::Database;
pub use services::Services;
pub use utils::Profile;
