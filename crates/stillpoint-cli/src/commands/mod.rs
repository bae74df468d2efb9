pub mod cache;
pub mod config;
pub mod run;
pub mod schedule;

use std::path::Path;

use stillpoint_core::error::Result;
use stillpoint_core::Script;

/// The script at `path`, or the bundled one.
pub fn load_script(path: Option<&Path>) -> Result<Script> {
    match path {
        Some(path) => Ok(Script::load(path)?),
        None => Ok(Script::builtin()),
    }
}
