//! Layered configuration for [`crate::properties::BusDefaults`], following
//! the teacher server's own `figment` provider chain (defaults -> file ->
//! environment). Purely an ambient concern: the binding algorithm itself
//! never reaches into here directly, it only consumes the resolved
//! `BusDefaults`.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;

use crate::properties::BusDefaults;

/// Where to source an optional on-disk override from, and what environment
/// variable prefix to read overrides from on top of that.
#[derive(Debug, Clone)]
pub struct BusConfigSource {
    pub file_path: Option<String>,
    pub env_prefix: String,
}

impl Default for BusConfigSource {
    fn default() -> Self {
        BusConfigSource {
            file_path: None,
            env_prefix: "STREAMBUS_".to_string(),
        }
    }
}

/// Loads [`BusDefaults`] from compiled-in defaults, optionally overridden by
/// a TOML file and then by `STREAMBUS_*` environment variables.
pub fn load(source: &BusConfigSource) -> Result<BusDefaults, figment::Error> {
    let mut figment = Figment::from(Serialized::defaults(BusDefaults::default()));
    if let Some(path) = &source.file_path {
        figment = figment.merge(Toml::file(path));
    }
    figment = figment.merge(Env::prefixed(&source.env_prefix));
    figment.extract()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_compiled_in_defaults_when_nothing_overrides_them() {
        let defaults = load(&BusConfigSource {
            file_path: None,
            env_prefix: "STREAMBUS_TEST_UNSET_".to_string(),
        })
        .unwrap();
        assert_eq!(defaults, BusDefaults::default());
    }

    #[test]
    fn environment_overrides_a_single_field() {
        std::env::set_var("STREAMBUS_CFG_TEST_MAX_ATTEMPTS", "7");
        let defaults = load(&BusConfigSource {
            file_path: None,
            env_prefix: "STREAMBUS_CFG_TEST_".to_string(),
        })
        .unwrap();
        std::env::remove_var("STREAMBUS_CFG_TEST_MAX_ATTEMPTS");
        assert_eq!(defaults.max_attempts, 7);
        assert_eq!(defaults.batch_size, BusDefaults::default().batch_size);
    }
}
