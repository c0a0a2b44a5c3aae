//! Configuration loading for the montuno generator.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/montuno/config.toml` (system)
//! 2. `~/.config/montuno/config.toml` (user)
//! 3. `./montuno.toml`, or the path given on the command line
//! 4. Environment variables (`MONTUNO_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [defaults]
//! template = "3-2"
//! harmonization = "octaves"
//! reference_dir = "~/montunos"
//!
//! [telemetry]
//! log_level = "debug"
//!
//! [templates."2-3"]
//! reference = "tradicional_2-3.mid"
//! lead_in = [3, 4, 4, 3]
//! steady = [5, 4, 4, 3]
//! ```

pub mod loader;
pub mod templates;

pub use loader::{
    discover_config_files_with_override, expand_path, parse_harmonization, ConfigSources,
};
pub use templates::{builtin_templates, TemplateConfig, DEFAULT_TEMPLATE};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use montuno::Harmonization;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Unknown template {name:?} (available: {})", .available.join(", "))]
    UnknownTemplate {
        name: String,
        available: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Template used when none is named on the command line.
    pub template: String,

    /// Harmonization in force before any inline marker. `None` plays plain tones.
    pub harmonization: Option<Harmonization>,

    /// Base directory for relative reference paths.
    pub reference_dir: PathBuf,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
            harmonization: None,
            reference_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Filter directive for the log subscriber, e.g. `info` or `montuno=debug`.
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Complete montuno configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MontunoConfig {
    pub defaults: DefaultsConfig,
    pub telemetry: TelemetryConfig,
    pub templates: BTreeMap<String, TemplateConfig>,
}

impl Default for MontunoConfig {
    fn default() -> Self {
        Self {
            defaults: DefaultsConfig::default(),
            telemetry: TelemetryConfig::default(),
            templates: builtin_templates(),
        }
    }
}

impl MontunoConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, with `config_path` replacing `./montuno.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = MontunoConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            let table = loader::load_from_file(&path)?;
            loader::apply_table(&mut config, &table, &path)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Look up a template by name.
    pub fn template(&self, name: &str) -> Result<&TemplateConfig, ConfigError> {
        self.templates
            .get(name)
            .ok_or_else(|| ConfigError::UnknownTemplate {
                name: name.to_string(),
                available: self.templates.keys().cloned().collect(),
            })
    }

    /// Where a template's reference file lives.
    pub fn reference_path(&self, template: &TemplateConfig) -> PathBuf {
        if template.reference.is_absolute() {
            template.reference.clone()
        } else {
            self.defaults.reference_dir.join(&template.reference)
        }
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        let quote = |s: &str| toml::Value::from(s).to_string();
        let list = |values: &[u32]| {
            let items: Vec<String> = values.iter().map(u32::to_string).collect();
            format!("[{}]", items.join(", "))
        };

        let mut output = String::new();
        output.push_str("# montuno configuration\n\n");

        output.push_str("[defaults]\n");
        output.push_str(&format!("template = {}\n", quote(&self.defaults.template)));
        if let Some(harmonization) = self.defaults.harmonization {
            output.push_str(&format!("harmonization = {}\n", quote(harmonization.name())));
        }
        output.push_str(&format!(
            "reference_dir = {}\n",
            quote(&self.defaults.reference_dir.to_string_lossy())
        ));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = {}\n", quote(&self.telemetry.log_level)));

        for (name, template) in &self.templates {
            output.push_str(&format!("\n[templates.{}]\n", quote(name)));
            output.push_str(&format!(
                "reference = {}\n",
                quote(&template.reference.to_string_lossy())
            ));
            output.push_str(&format!("lead_in = {}\n", list(&template.lead_in)));
            output.push_str(&format!("steady = {}\n", list(&template.steady)));
        }

        output
    }
}
