pub mod action;
pub mod comments;
pub mod condition;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod github;
pub mod orchestrator;
pub mod reltime;
pub mod rule;
pub mod tracker;
pub mod types;

#[cfg(test)]
mod testing;

pub use error::{BotError, Result};
