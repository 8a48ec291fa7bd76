pub mod logger;
pub mod models;
pub mod parser;
pub mod reporter;
pub mod runner;
pub mod ui;
