pub mod backend;
pub mod cli;
pub mod config;
pub mod contract;
pub mod error;
pub mod export;
pub mod extract;
pub mod load_config;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod select;
