//! Workspace configuration
//!
//! Settings live in an optional `codemeta.toml` at the workspace root. Every
//! other module reads settings through [`Config`]; values of the wrong type or
//! out of range fall back to the documented defaults.

use log::warn;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "codemeta.toml";

pub const DEFAULT_ID_LENGTH: usize = 10;
pub const ID_LENGTH_MIN: usize = 6;
pub const ID_LENGTH_MAX: usize = 32;
pub const DEFAULT_CMS_FOLDER: &str = ".cms";
pub const DEFAULT_CATEGORY: &str = "INFO";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

/// Display style for one category label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryStyle {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreground: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    id_length: usize,
    cms_folder: String,
    default_category: String,
    category_styles: Vec<CategoryStyle>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id_length: DEFAULT_ID_LENGTH,
            cms_folder: DEFAULT_CMS_FOLDER.to_string(),
            default_category: DEFAULT_CATEGORY.to_string(),
            category_styles: Vec::new(),
        }
    }
}

impl Config {
    /// Load `codemeta.toml` from the workspace root; a missing file yields defaults
    pub fn load_from_root(root: &Path) -> Result<Self, ConfigError> {
        Self::load_from_path(root.join(CONFIG_FILE))
    }

    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let table: toml::Table =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        Ok(Self::from_table(&table))
    }

    /// Build a config from a parsed table, ignoring malformed keys
    pub fn from_table(table: &toml::Table) -> Self {
        let mut config = Self::default();

        if let Some(value) = table.get("id_length") {
            match value.as_integer() {
                Some(n) => config.id_length = clamp_id_length(n),
                None => warn!("config: id_length is not an integer, using {DEFAULT_ID_LENGTH}"),
            }
        }

        if let Some(value) = table.get("cms_folder") {
            match value.as_str().map(str::trim) {
                Some(s) if !s.is_empty() => config.cms_folder = s.to_string(),
                _ => warn!("config: cms_folder must be a non-empty string, using {DEFAULT_CMS_FOLDER}"),
            }
        }

        if let Some(value) = table.get("default_category") {
            match value.as_str().map(str::trim) {
                Some(s) if !s.is_empty() => config.default_category = s.to_string(),
                _ => warn!(
                    "config: default_category must be a non-empty string, using {DEFAULT_CATEGORY}"
                ),
            }
        }

        if let Some(value) = table.get("category_styles") {
            match value.as_array() {
                Some(entries) => {
                    config.category_styles = entries.iter().filter_map(parse_style).collect()
                }
                None => warn!("config: category_styles must be an array of tables"),
            }
        }

        config
    }

    pub fn id_length(&self) -> usize {
        self.id_length
    }

    pub fn cms_folder(&self) -> &str {
        &self.cms_folder
    }

    pub fn default_category(&self) -> &str {
        &self.default_category
    }

    pub fn with_cms_folder(mut self, folder: impl Into<String>) -> Self {
        let folder = folder.into();
        if !folder.trim().is_empty() {
            self.cms_folder = folder.trim().to_string();
        }
        self
    }

    /// Style for a label; unknown labels use the INFO style, if one is configured
    pub fn style_for(&self, label: &str) -> Option<&CategoryStyle> {
        self.category_styles
            .iter()
            .find(|s| s.label == label)
            .or_else(|| {
                self.category_styles
                    .iter()
                    .find(|s| s.label.eq_ignore_ascii_case(DEFAULT_CATEGORY))
            })
    }
}

pub fn clamp_id_length(n: i64) -> usize {
    n.clamp(ID_LENGTH_MIN as i64, ID_LENGTH_MAX as i64) as usize
}

fn parse_style(value: &toml::Value) -> Option<CategoryStyle> {
    let table = value.as_table()?;
    let label = table.get("label")?.as_str()?.trim();
    if label.is_empty() {
        return None;
    }
    let color = |key: &str| {
        table
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    };
    Some(CategoryStyle {
        label: label.to_string(),
        foreground: color("foreground"),
        background: color("background"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_from_root(temp.path()).unwrap();
        assert_eq!(config.id_length(), 10);
        assert_eq!(config.cms_folder(), ".cms");
        assert_eq!(config.default_category(), "INFO");
        assert!(config.category_styles.is_empty());
    }

    #[test]
    fn test_values_are_read() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE),
            r##"
id_length = 12
cms_folder = "cms"
default_category = "NOTE"

[[category_styles]]
label = "TODO"
foreground = "#fff"
background = "#c00"
"##,
        )
        .unwrap();

        let config = Config::load_from_root(temp.path()).unwrap();
        assert_eq!(config.id_length(), 12);
        assert_eq!(config.cms_folder(), "cms");
        assert_eq!(config.default_category(), "NOTE");
        assert_eq!(config.category_styles.len(), 1);
        assert_eq!(
            config.style_for("TODO").unwrap().background.as_deref(),
            Some("#c00")
        );
    }

    #[test]
    fn test_id_length_is_clamped() {
        let table: toml::Table = toml::from_str("id_length = 2").unwrap();
        assert_eq!(Config::from_table(&table).id_length(), 6);

        let table: toml::Table = toml::from_str("id_length = 99").unwrap();
        assert_eq!(Config::from_table(&table).id_length(), 32);
    }

    #[test]
    fn test_wrong_types_fall_back() {
        let table: toml::Table = toml::from_str(
            "id_length = \"ten\"\ncms_folder = 5\ndefault_category = \"  \"\ncategory_styles = 1",
        )
        .unwrap();
        let config = Config::from_table(&table);
        assert_eq!(config.id_length(), DEFAULT_ID_LENGTH);
        assert_eq!(config.cms_folder(), DEFAULT_CMS_FOLDER);
        assert_eq!(config.default_category(), DEFAULT_CATEGORY);
        assert!(config.category_styles.is_empty());
    }

    #[test]
    fn test_unparseable_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(CONFIG_FILE), "id_length = [").unwrap();
        let err = Config::load_from_root(temp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigParseError { .. }));
    }

    #[test]
    fn test_unknown_label_uses_info_style() {
        let table: toml::Table = toml::from_str(
            "[[category_styles]]\nlabel = \"INFO\"\nforeground = \"blue\"\n\n[[category_styles]]\nlabel = \"\"\n",
        )
        .unwrap();
        let config = Config::from_table(&table);
        assert_eq!(config.category_styles.len(), 1);
        assert_eq!(
            config.style_for("WHATEVER").unwrap().foreground.as_deref(),
            Some("blue")
        );
    }

    #[test]
    fn test_cms_folder_override() {
        let config = Config::default().with_cms_folder("notes");
        assert_eq!(config.cms_folder(), "notes");
        let config = Config::default().with_cms_folder(" ");
        assert_eq!(config.cms_folder(), ".cms");
    }
}
