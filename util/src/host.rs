//! Host platform utility functions

use std::path::PathBuf;

/// Name of the environment variable pointing at the root of the software
/// checkout, under which `params/` and `sessions/` live.
pub const SW_ROOT_ENV_VAR: &str = "CANSAT_SW_ROOT";

/// Get the software root directory from the environment.
pub fn get_cansat_sw_root() -> Result<PathBuf, std::env::VarError> {
    std::env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}

/// Short description of the platform this executable was built for.
pub fn get_platform() -> String {
    format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS)
}
