pub mod cli;
pub mod load_config;
pub mod schemas;

pub use cli::{run, Cli, Commands};
