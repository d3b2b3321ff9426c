pub mod agent;
pub mod answer;
pub mod asset_cache;
pub mod bootstrap;
pub mod config;
mod config_env;
pub mod fetch;
pub mod form;
pub mod inference;
pub mod persona;
pub mod ports;
pub mod results;
