pub mod backend;
pub mod config;
pub mod errors;
pub mod logging;
pub mod runner;
pub mod session;
pub mod sse;
pub mod ui;
pub mod web;
