//! Common functionality for subsector, a logit market-share allocation and calibration engine for
//! the subsectors of an energy sector.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod cli;
pub mod commodity;
pub mod id;
pub mod input;
pub mod log;
pub mod model;
pub mod output;
pub mod period;
pub mod sector;
pub mod settings;
pub mod simulation;
pub mod subsector;
pub mod summary;
pub mod technology;
pub mod units;

#[cfg(test)]
mod fixture;

/// Get the config folder for the program.
///
/// This will be something like: `~/.config/subsector`
pub fn get_config_dir() -> PathBuf {
    let Some(mut config_dir) = dirs::config_dir() else {
        // I'm not sure how this could happen in practice
        panic!("Could not get path to config dir");
    };
    config_dir.push("subsector");
    config_dir
}
