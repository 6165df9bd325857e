pub mod config;
pub mod database;
pub mod jwt;
pub mod logging;
pub mod url;
