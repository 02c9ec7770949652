//! Host platform utility functions

use std::env;
use std::path::PathBuf;

/// Environment variable giving the root directory of the software, under which the `params` and
/// `sessions` directories are found.
pub const SW_ROOT_ENV_VAR: &str = "NAVBRIDGE_SW_ROOT";

/// Get the software root directory from the environment.
pub fn get_sw_root() -> Result<PathBuf, env::VarError> {
    env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}
