pub mod capture_result;
pub mod config;
pub mod error;
pub mod metadata;
pub mod sample;
pub mod state;
