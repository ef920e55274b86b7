//! synthwrap Command Line Interface.
//!
//! Operator tooling: fee quotes, config management and scripted scenarios
//! run against an in-process deployment.

pub mod output;
pub mod scenario;

pub use output::*;
pub use scenario::*;

use std::path::Path;

use crate::core::config::WrapperConfig;
use crate::error::Result;

/// Default config file name
pub const DEFAULT_CONFIG_FILE: &str = "synthwrap.json";

/// Load `path` when it exists, defaults otherwise; env overrides apply on top
pub fn load_or_default(path: &Path) -> Result<WrapperConfig> {
    let base = if path.exists() {
        WrapperConfig::load(path)?
    } else {
        WrapperConfig::default()
    };
    base.with_env_overrides()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EscrowPolicy;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.escrow_policy, EscrowPolicy::Retain);
    }

    #[test]
    fn test_load_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        let config = WrapperConfig {
            escrow_policy: EscrowPolicy::Drain,
            ..Default::default()
        };
        config.save(&path).unwrap();

        assert_eq!(load_or_default(&path).unwrap().escrow_policy, EscrowPolicy::Drain);
    }
}
