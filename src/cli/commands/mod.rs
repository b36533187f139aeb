pub mod bootstrap;
pub mod chunk;
pub mod config;
pub mod ping;
pub mod update;
