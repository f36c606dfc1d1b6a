use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{ActionSet, Database, parse_database_list};
use crate::error::KiraError;
use crate::table::{ExportOptions, OverwritePolicy};

pub const DEFAULT_CONFIG_FILE: &str = "kira-gv.json";
pub const DEFAULT_RADIUS: u32 = 5;
pub const DEFAULT_FRAGMENT_SIZE: usize = 100;
pub const DEFAULT_DATABASES: &str = "uniprot;kegg;pdb;swissprot";
pub const DEFAULT_SEARCH_TYPE: &str = "pf";
/// Pool size selected by `--multiprocess`.
pub const MULTIPROCESS_WORKERS: usize = 10;

/// One configuration layer. Every field is optional so that file and
/// command-line layers can be stacked over the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub radius: Option<u32>,
    #[serde(default)]
    pub fragment_size: Option<usize>,
    #[serde(default)]
    pub separator: Option<String>,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub overwrite: Option<OverwritePolicy>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub multiprocess: Option<bool>,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub sample_size: Option<usize>,
    #[serde(default)]
    pub databases: Option<DatabaseList>,
    #[serde(default)]
    pub search_type: Option<String>,
    #[serde(default)]
    pub labels: Option<String>,
}

/// `"uniprot;kegg"` or `["uniprot", "kegg"]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DatabaseList {
    Shorthand(String),
    Detailed(Vec<String>),
}

impl Config {
    /// Fields set in `over` win.
    pub fn layer(self, over: Config) -> Config {
        Config {
            schema_version: over.schema_version.or(self.schema_version),
            radius: over.radius.or(self.radius),
            fragment_size: over.fragment_size.or(self.fragment_size),
            separator: over.separator.or(self.separator),
            extension: over.extension.or(self.extension),
            overwrite: over.overwrite.or(self.overwrite),
            action: over.action.or(self.action),
            workers: over.workers.or(self.workers),
            multiprocess: over.multiprocess.or(self.multiprocess),
            folder: over.folder.or(self.folder),
            sample_size: over.sample_size.or(self.sample_size),
            databases: over.databases.or(self.databases),
            search_type: over.search_type.or(self.search_type),
            labels: over.labels.or(self.labels),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub schema_version: u32,
    pub radius: u32,
    pub fragment_size: usize,
    pub separator: u8,
    /// With leading dot.
    pub extension: String,
    pub overwrite: OverwritePolicy,
    pub actions: ActionSet,
    /// `None` runs sequentially.
    pub workers: Option<usize>,
    pub folder: Option<Utf8PathBuf>,
    pub sample_size: Option<usize>,
    pub databases: Vec<Database>,
    pub search_type: String,
    pub labels: Option<Utf8PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            radius: DEFAULT_RADIUS,
            fragment_size: DEFAULT_FRAGMENT_SIZE,
            separator: b';',
            extension: ".csv".to_string(),
            overwrite: OverwritePolicy::Overwrite,
            actions: ActionSet::all(),
            workers: None,
            folder: None,
            sample_size: None,
            databases: vec![
                Database::Uniprot,
                Database::Kegg,
                Database::Pdb,
                Database::Swissprot,
            ],
            search_type: DEFAULT_SEARCH_TYPE.to_string(),
            labels: None,
        }
    }
}

impl RunConfig {
    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            separator: self.separator,
            extension: self.extension.clone(),
            overwrite: self.overwrite,
        }
    }

    /// Truncates to the configured sample size, if any.
    pub fn sample<T>(&self, mut ids: Vec<T>) -> Vec<T> {
        if let Some(size) = self.sample_size.filter(|size| *size > 0) {
            ids.truncate(size);
        }
        ids
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads the config file layer. Without an explicit path a missing
    /// `kira-gv.json` is not an error.
    pub fn resolve(path: Option<&str>) -> Result<Config, KiraError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| KiraError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(config: Config) -> Result<RunConfig, KiraError> {
        let defaults = RunConfig::default();

        let radius = config.radius.unwrap_or(defaults.radius);
        if radius == 0 {
            return Err(KiraError::InvalidInput("radius must be at least 1".to_string()));
        }
        let fragment_size = config.fragment_size.unwrap_or(defaults.fragment_size);
        if fragment_size == 0 {
            return Err(KiraError::InvalidInput(
                "fragment size must be at least 1".to_string(),
            ));
        }

        let separator = match config.separator.as_deref() {
            Some(value) => parse_separator(value)?,
            None => defaults.separator,
        };
        let extension = config
            .extension
            .as_deref()
            .map(normalize_extension)
            .unwrap_or(defaults.extension);

        let actions = match config.action.as_deref() {
            Some(value) => value.parse()?,
            None => defaults.actions,
        };

        let workers = match (config.workers, config.multiprocess) {
            (Some(workers), _) => Some(workers),
            (None, Some(true)) => Some(MULTIPROCESS_WORKERS),
            _ => None,
        };

        let databases = match config.databases {
            Some(DatabaseList::Shorthand(value)) => parse_database_list(&value)?,
            Some(DatabaseList::Detailed(values)) => parse_database_list(&values.join(";"))?,
            None => parse_database_list(DEFAULT_DATABASES)?,
        };

        Ok(RunConfig {
            schema_version: config.schema_version.unwrap_or(defaults.schema_version),
            radius,
            fragment_size,
            separator,
            extension,
            overwrite: config.overwrite.unwrap_or(defaults.overwrite),
            actions,
            workers,
            folder: config.folder.map(Utf8PathBuf::from),
            sample_size: config.sample_size,
            databases,
            search_type: config.search_type.unwrap_or(defaults.search_type),
            labels: config.labels.map(Utf8PathBuf::from),
        })
    }
}

/// Accepts a single ASCII character, `\t` or `tab`.
pub fn parse_separator(value: &str) -> Result<u8, KiraError> {
    match value {
        "\\t" | "\t" | "tab" | "TAB" => Ok(b'\t'),
        other if other.len() == 1 && other.is_ascii() => Ok(other.as_bytes()[0]),
        other => Err(KiraError::InvalidSeparator(other.to_string())),
    }
}

pub fn normalize_extension(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.starts_with('.') {
        trimmed.to_string()
    } else {
        format!(".{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved, RunConfig::default());
    }

    #[test]
    fn cli_layer_wins() {
        let file = Config {
            radius: Some(3),
            separator: Some("tab".to_string()),
            ..Config::default()
        };
        let cli = Config {
            radius: Some(7),
            ..Config::default()
        };
        let resolved = ConfigLoader::resolve_config(file.layer(cli)).unwrap();
        assert_eq!(resolved.radius, 7);
        assert_eq!(resolved.separator, b'\t');
    }
}
