//! Config file discovery, loading, and environment variable overlay.

use std::env;
use std::path::{Path, PathBuf};

use montuno::Harmonization;

use crate::{ConfigError, MontunoConfig, TemplateConfig};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/montuno/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("montuno/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("montuno.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read and parse a TOML file.
pub fn load_from_file(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Overlay the keys present in `table` onto `config`.
///
/// Templates merge by name: a file may change one field of a built-in
/// template and keep the rest.
pub fn apply_table(
    config: &mut MontunoConfig,
    table: &toml::Table,
    path: &Path,
) -> Result<(), ConfigError> {
    let invalid = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    if let Some(defaults) = table.get("defaults").and_then(|v| v.as_table()) {
        if let Some(v) = defaults.get("template").and_then(|v| v.as_str()) {
            config.defaults.template = v.to_string();
        }
        if let Some(v) = defaults.get("harmonization").and_then(|v| v.as_str()) {
            config.defaults.harmonization =
                parse_harmonization(v).map_err(|_| invalid(format!("unknown harmonization {:?}", v)))?;
        }
        if let Some(v) = defaults.get("reference_dir").and_then(|v| v.as_str()) {
            config.defaults.reference_dir = expand_path(v);
        }
    }

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("log_level").and_then(|v| v.as_str()) {
            config.telemetry.log_level = v.to_string();
        }
    }

    if let Some(templates) = table.get("templates").and_then(|v| v.as_table()) {
        for (name, value) in templates {
            let section = value
                .as_table()
                .ok_or_else(|| invalid(format!("template {:?} must be a table", name)))?;

            let base = config.templates.get(name).cloned();
            let reference = match section.get("reference").and_then(|v| v.as_str()) {
                Some(v) => expand_path(v),
                None => base
                    .as_ref()
                    .map(|t| t.reference.clone())
                    .ok_or_else(|| invalid(format!("template {:?} has no reference", name)))?,
            };
            let lead_in = match section.get("lead_in") {
                Some(v) => slot_counts(v).map_err(|m| invalid(format!("template {:?} lead_in: {}", name, m)))?,
                None => base.as_ref().map(|t| t.lead_in.clone()).unwrap_or_default(),
            };
            let steady = match section.get("steady") {
                Some(v) => slot_counts(v).map_err(|m| invalid(format!("template {:?} steady: {}", name, m)))?,
                None => base
                    .as_ref()
                    .map(|t| t.steady.clone())
                    .ok_or_else(|| invalid(format!("template {:?} has no steady pattern", name)))?,
            };

            let template = TemplateConfig {
                reference,
                lead_in,
                steady,
            };
            template
                .pattern()
                .map_err(|e| invalid(format!("template {:?}: {}", name, e)))?;
            config.templates.insert(name.clone(), template);
        }
    }

    Ok(())
}

fn slot_counts(value: &toml::Value) -> Result<Vec<u32>, String> {
    let array = value.as_array().ok_or("expected an array of slot counts")?;
    array
        .iter()
        .map(|v| {
            v.as_integer()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| format!("{} is not a slot count", v))
        })
        .collect()
}

/// `plain` and `none` clear the default style.
pub fn parse_harmonization(value: &str) -> Result<Option<Harmonization>, montuno::Error> {
    match value.trim().to_ascii_lowercase().as_str() {
        "plain" | "none" | "" => Ok(None),
        _ => value.parse().map(Some),
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut MontunoConfig, sources: &mut ConfigSources) {
    if let Ok(v) = env::var("MONTUNO_TEMPLATE") {
        config.defaults.template = v;
        sources.env_overrides.push("MONTUNO_TEMPLATE".to_string());
    }
    if let Ok(v) = env::var("MONTUNO_HARMONIZATION") {
        if let Ok(harmonization) = parse_harmonization(&v) {
            config.defaults.harmonization = harmonization;
            sources.env_overrides.push("MONTUNO_HARMONIZATION".to_string());
        }
    }
    if let Ok(v) = env::var("MONTUNO_REFERENCE_DIR") {
        config.defaults.reference_dir = expand_path(&v);
        sources.env_overrides.push("MONTUNO_REFERENCE_DIR".to_string());
    }
    if let Ok(v) = env::var("MONTUNO_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("MONTUNO_LOG_LEVEL".to_string());
    }
    if let Ok(v) = env::var("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

/// Expand `~/` and a leading `$VAR` in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        return directories::BaseDirs::new()
            .map(|d| d.home_dir().join(stripped))
            .unwrap_or_else(|| PathBuf::from(path));
    }

    if let Some(stripped) = path.strip_prefix('$') {
        let (var_name, rest) = stripped.split_once('/').unwrap_or((stripped, ""));
        if let Ok(value) = env::var(var_name) {
            let base = PathBuf::from(value);
            return if rest.is_empty() { base } else { base.join(rest) };
        }
    }

    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn apply(toml: &str) -> Result<MontunoConfig, ConfigError> {
        let table: toml::Table = toml.parse().unwrap();
        let mut config = MontunoConfig::default();
        apply_table(&mut config, &table, Path::new("test.toml"))?;
        Ok(config)
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/montunos/refs");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.ends_with("montunos/refs"));
    }

    #[test]
    fn test_expand_path_absolute() {
        assert_eq!(expand_path("/srv/refs"), PathBuf::from("/srv/refs"));
    }

    #[test]
    fn test_expand_path_unknown_var_is_literal() {
        assert_eq!(
            expand_path("$MONTUNO_TEST_SURELY_UNSET/refs"),
            PathBuf::from("$MONTUNO_TEST_SURELY_UNSET/refs")
        );
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = apply("[defaults]\ntemplate = \"3-2\"\n").unwrap();
        assert_eq!(config.defaults.template, "3-2");
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.templates.len(), 2);
    }

    #[test]
    fn test_parse_full_toml() {
        let config = apply(
            r#"
[defaults]
template = "guajeo"
harmonization = "tenths"
reference_dir = "/data/refs"

[telemetry]
log_level = "montuno=debug"

[templates.guajeo]
reference = "guajeo.mid"
lead_in = [2]
steady = [4, 4]
"#,
        )
        .unwrap();

        assert_eq!(config.defaults.template, "guajeo");
        assert_eq!(config.defaults.harmonization, Some(Harmonization::Tenths));
        assert_eq!(config.defaults.reference_dir, PathBuf::from("/data/refs"));
        assert_eq!(config.telemetry.log_level, "montuno=debug");
        assert_eq!(
            config.templates["guajeo"],
            TemplateConfig {
                reference: PathBuf::from("guajeo.mid"),
                lead_in: vec![2],
                steady: vec![4, 4],
            }
        );
        assert_eq!(config.templates.len(), 3);
    }

    #[test]
    fn test_partial_template_keeps_builtin_fields() {
        let config = apply("[templates.\"2-3\"]\nreference = \"mine.mid\"\n").unwrap();
        let template = &config.templates["2-3"];
        assert_eq!(template.reference, PathBuf::from("mine.mid"));
        assert_eq!(template.steady, vec![5, 4, 4, 3]);
    }

    #[test]
    fn test_new_template_needs_steady() {
        let err = apply("[templates.x]\nreference = \"x.mid\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_zero_slot_count_rejected() {
        let err = apply("[templates.x]\nreference = \"x.mid\"\nsteady = [4, 0]\n").unwrap_err();
        assert!(err.to_string().contains("template \"x\""), "{}", err);
    }

    #[test]
    fn test_plain_clears_harmonization() {
        let config = apply("[defaults]\nharmonization = \"plain\"\n").unwrap();
        assert_eq!(config.defaults.harmonization, None);

        let err = apply("[defaults]\nharmonization = \"ninths\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_from_cli_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[defaults]\ntemplate = \"3-2\"\nharmonization = \"octaves\"").unwrap();

        let (config, sources) = MontunoConfig::load_with_sources_from(Some(file.path())).unwrap();
        assert_eq!(config.defaults.template, "3-2");
        assert!(sources.files.contains(&file.path().to_path_buf()));
    }

    #[test]
    fn test_load_reports_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[defaults\ntemplate = ").unwrap();

        let err = load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }
}
