// Library half of the subsync binary: configuration and command bodies.

pub mod commands;
pub mod config;
