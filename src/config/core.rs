use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
};
use std::path::Path;

use super::{SweepConfig, smart_load};

// Embed the default config at compile time
pub const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

pub const ENV_PREFIX: &str = "REPOSWEEP_";

impl SweepConfig {
    /// Load every layer. `overrides` holds only the flags the operator set.
    pub fn load(custom_config: Option<&Path>, overrides: Option<serde_json::Value>) -> Result<Self> {
        Self::load_with_env(custom_config, overrides, ENV_PREFIX)
    }

    pub(crate) fn load_with_env(
        custom_config: Option<&Path>,
        overrides: Option<serde_json::Value>,
        env_prefix: &str,
    ) -> Result<Self> {
        let figment = Self::figment(custom_config, overrides, env_prefix);
        figment.extract().context("Invalid configuration")
    }

    /// Only the embedded defaults
    pub fn defaults() -> Result<Self> {
        Figment::new()
            .merge(Toml::string(DEFAULT_CONFIG))
            .extract()
            .context("Invalid embedded default configuration")
    }

    fn figment(
        custom_config: Option<&Path>,
        overrides: Option<serde_json::Value>,
        env_prefix: &str,
    ) -> Figment {
        let user_config = Self::user_config_stem();
        let mut figment = Figment::new()
            .merge(Toml::string(DEFAULT_CONFIG))
            // User config - support multiple formats
            .merge(Toml::file(format!("{user_config}.toml")))
            .merge(Json::file(format!("{user_config}.json")))
            .merge(Yaml::file(format!("{user_config}.yaml")))
            .merge(Yaml::file(format!("{user_config}.yml")))
            // Repository config
            .merge(Toml::file("reposweep.toml"))
            .merge(Json::file("reposweep.json"))
            .merge(Yaml::file("reposweep.yaml"))
            .merge(Yaml::file("reposweep.yml"));

        if let Some(custom_path) = custom_config {
            figment = figment.merge(smart_load::auto(custom_path));
        }

        figment = figment.merge(Env::prefixed(env_prefix).split("__"));

        // CLI flags have the final say
        if let Some(overrides) = overrides {
            figment = figment.merge(Serialized::defaults(overrides));
        }

        figment
    }

    fn user_config_stem() -> String {
        match std::env::var("HOME") {
            Ok(home) => format!("{home}/.config/reposweep/config"),
            Err(_) => "~/.config/reposweep/config".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = SweepConfig::defaults().expect("Should load default config");
        assert_eq!(config.general.threads, 10);
        assert_eq!(config.scratch.root, PathBuf::from("/tmp"));
        assert_eq!(config.report.output, PathBuf::from("results.txt"));
        assert!(!config.report.cross_tool_dedup);
        assert!(config.targets.skip.is_empty());
    }

    #[test]
    fn test_custom_file_by_extension() {
        let temp = TempDir::new().unwrap();
        let yaml = temp.path().join("sweep.yaml");
        std::fs::write(&yaml, "general:\n  threads: 3\nreport:\n  merge: true\n").unwrap();

        let config = SweepConfig::load_with_env(Some(&yaml), None, "REPOSWEEP_TEST_NONE_").unwrap();
        assert_eq!(config.general.threads, 3);
        assert!(config.report.merge);
        // Untouched keys keep their defaults
        assert_eq!(config.git.program, PathBuf::from("git"));

        let toml_file = temp.path().join("sweep.toml");
        std::fs::write(&toml_file, "[targets]\nskip = [\"legacy-*\"]\n").unwrap();
        let config =
            SweepConfig::load_with_env(Some(&toml_file), None, "REPOSWEEP_TEST_NONE_").unwrap();
        assert_eq!(config.targets.skip, vec!["legacy-*"]);
    }

    #[test]
    fn test_overrides_beat_files() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("sweep.json");
        std::fs::write(&file, r#"{"general": {"threads": 3, "job_timeout_secs": 60}}"#).unwrap();

        let overrides = json!({"general": {"threads": 25}});
        let config =
            SweepConfig::load_with_env(Some(&file), Some(overrides), "REPOSWEEP_TEST_NONE_").unwrap();
        assert_eq!(config.general.threads, 25);
        assert_eq!(config.general.job_timeout_secs, 60);
    }

    #[test]
    fn test_environment_layer() {
        // Unique prefix so parallel tests never observe it
        unsafe {
            std::env::set_var("REPOSWEEP_TEST_ENV_GENERAL__THREADS", "4");
            std::env::set_var("REPOSWEEP_TEST_ENV_REPORT__MERGE", "true");
        }
        let config = SweepConfig::load_with_env(None, None, "REPOSWEEP_TEST_ENV_").unwrap();
        assert_eq!(config.general.threads, 4);
        assert!(config.report.merge);
    }

    #[test]
    fn test_invalid_value_is_an_error() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("sweep.toml");
        std::fs::write(&file, "[general]\nthreads = \"many\"\n").unwrap();
        assert!(SweepConfig::load_with_env(Some(&file), None, "REPOSWEEP_TEST_NONE_").is_err());
    }
}
