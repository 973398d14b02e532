//! CLI support modules

pub mod commands;
pub mod output;
pub mod profile;
