//! Common functionality for the cemo capacity expansion model.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod cli;
pub mod cluster;
pub mod config;
pub mod finance;
pub mod formulation;
pub mod id;
pub mod input;
pub mod log;
pub mod model;
pub mod network;
pub mod output;
pub mod region;
pub mod settings;
pub mod simulation;
pub mod solution;
pub mod solver;
pub mod technology;
pub mod timeline;
pub mod trace;
pub mod units;

#[cfg(test)]
mod fixture;

/// Get the config folder for the program.
///
/// This will be something like: `~/.config/cemo`
pub fn get_cemo_config_dir() -> PathBuf {
    let Some(mut config_dir) = dirs::config_dir() else {
        // No appropriate config dir on this platform
        return PathBuf::default();
    };

    config_dir.push("cemo");
    config_dir
}
