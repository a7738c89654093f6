use std::path::PathBuf;

use clap::{ArgAction, Parser};
use thiserror::Error;
use twelf::config;
use twelf::Layer;

pub const DEFAULT_URL: &str = "http://localhost:9200";
pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Parser, Debug, Default)]
#[command(
    name = "es-bulk-loader",
    version,
    about = "Bulk-load a JSON array of documents into an Elasticsearch index"
)]
pub struct Cli {
    /// Path to an INI-style config file (`key=value` lines, same keys as the flags)
    #[arg(short, long, env = "ES_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Elasticsearch URL
    #[arg(long, env = "ES_URL")]
    pub url: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long = "insecureSkipVerify", env = "ES_INSECURE_SKIP_VERIFY", action = ArgAction::SetTrue)]
    pub insecure_skip_verify: bool,

    /// Elasticsearch index name
    #[arg(long, env = "ES_INDEX")]
    pub index: Option<String>,

    /// Path to bulk JSON data file (array of objects)
    #[arg(long, env = "ES_DATA", value_name = "PATH")]
    pub data: Option<PathBuf>,

    /// Path to index settings JSON file (optional)
    #[arg(long, env = "ES_SETTINGS", value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Path to index mappings JSON file (optional)
    #[arg(long, env = "ES_MAPPINGS", value_name = "PATH")]
    pub mappings: Option<PathBuf>,

    /// Batch size for bulk inserts
    #[arg(long, env = "ES_BATCH")]
    pub batch: Option<usize>,

    /// Add documents to an existing index without recreating it
    #[arg(long, env = "ES_ADD", action = ArgAction::SetTrue)]
    pub add: bool,

    /// Delete the index if it exists
    #[arg(long, env = "ES_DELETE", action = ArgAction::SetTrue)]
    pub delete: bool,

    /// Username for basic auth (optional)
    #[arg(long, env = "ES_USER")]
    pub user: Option<String>,

    /// Password for basic auth (optional)
    #[arg(long, env = "ES_PASS")]
    pub pass: Option<String>,

    /// Elasticsearch API key (optional)
    #[arg(long = "apiKey", env = "ES_API_KEY")]
    pub api_key: Option<String>,
}

/// Config-file layer, keys named after the CLI flags. INI values are all
/// strings; typed keys are parsed during [`Config::resolve`].
#[config]
#[derive(Debug, Default)]
pub struct FileConf {
    url: Option<String>,
    #[serde(rename = "insecureSkipVerify")]
    insecure_skip_verify: Option<String>,
    index: Option<String>,
    data: Option<String>,
    settings: Option<String>,
    mappings: Option<String>,
    batch: Option<String>,
    add: Option<String>,
    delete: Option<String>,
    user: Option<String>,
    pass: Option<String>,
    #[serde(rename = "apiKey")]
    api_key: Option<String>,
}

fn parse_file_bool(key: &'static str, value: Option<String>) -> Result<Option<bool>, ConfError> {
    match value.as_deref().map(str::trim) {
        None => Ok(None),
        Some("true") | Some("1") | Some("yes") => Ok(Some(true)),
        Some("false") | Some("0") | Some("no") => Ok(Some(false)),
        Some(other) => Err(ConfError::InvalidValue {
            key,
            value: other.to_string(),
            expected: "a boolean",
        }),
    }
}

fn parse_file_usize(key: &'static str, value: Option<String>) -> Result<Option<usize>, ConfError> {
    match value.as_deref().map(str::trim) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ConfError::InvalidValue {
                key,
                value: raw.to_string(),
                expected: "a non-negative integer",
            }),
    }
}

#[derive(Debug, Error)]
pub enum ConfError {
    #[error("missing required option `--{0}`")]
    MissingRequired(&'static str),
    #[error("cannot use both basic auth and an API key, choose one method")]
    AmbiguousAuth,
    #[error("batch size must be a positive integer")]
    ZeroBatch,
    #[error("invalid value {value:?} for config file key `{key}`: expected {expected}")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("failed to load config file {path:?}: {source}")]
    File { path: PathBuf, source: twelf::Error },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    None,
    Basic { username: String, password: String },
    ApiKey(String),
}

/// Fully resolved configuration, immutable for the rest of the run.
#[derive(Debug, Clone)]
pub struct Config {
    url: String,
    insecure_skip_verify: bool,
    index: String,
    data: PathBuf,
    settings: Option<PathBuf>,
    mappings: Option<PathBuf>,
    batch: usize,
    add: bool,
    delete: bool,
    auth: Auth,
}

impl Config {
    /// Merges flags (with their env fallbacks, already applied by clap) over
    /// the config-file layer over the defaults, then validates.
    pub fn resolve(cli: Cli) -> Result<Self, ConfError> {
        let file = match &cli.config {
            Some(path) => FileConf::with_layers(&[Layer::Ini(path.clone())]).map_err(|source| {
                ConfError::File {
                    path: path.clone(),
                    source,
                }
            })?,
            None => FileConf::default(),
        };

        let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());
        let user = non_empty(cli.user.or(file.user));
        let pass = non_empty(cli.pass.or(file.pass));
        let api_key = non_empty(cli.api_key.or(file.api_key));

        if (user.is_some() || pass.is_some()) && api_key.is_some() {
            return Err(ConfError::AmbiguousAuth);
        }
        // Basic auth is only active when both halves are present.
        let auth = match (user, pass, api_key) {
            (_, _, Some(key)) => Auth::ApiKey(key),
            (Some(username), Some(password), None) => Auth::Basic { username, password },
            _ => Auth::None,
        };

        let index =
            non_empty(cli.index.or(file.index)).ok_or(ConfError::MissingRequired("index"))?;
        let data = cli
            .data
            .or(non_empty(file.data).map(PathBuf::from))
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ConfError::MissingRequired("data"))?;

        let batch = cli
            .batch
            .or(parse_file_usize("batch", file.batch)?)
            .unwrap_or(DEFAULT_BATCH_SIZE);
        if batch == 0 {
            return Err(ConfError::ZeroBatch);
        }

        let url = non_empty(cli.url.or(file.url)).unwrap_or_else(|| DEFAULT_URL.to_string());

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            insecure_skip_verify: cli.insecure_skip_verify
                || parse_file_bool("insecureSkipVerify", file.insecure_skip_verify)?
                    .unwrap_or(false),
            index,
            data,
            settings: cli.settings.or(non_empty(file.settings).map(PathBuf::from)),
            mappings: cli.mappings.or(non_empty(file.mappings).map(PathBuf::from)),
            batch,
            add: cli.add || parse_file_bool("add", file.add)?.unwrap_or(false),
            delete: cli.delete || parse_file_bool("delete", file.delete)?.unwrap_or(false),
            auth,
        })
    }

    pub fn get_url(&self) -> &str {
        &self.url
    }
    pub fn get_index(&self) -> &str {
        &self.index
    }
    pub fn get_data(&self) -> &PathBuf {
        &self.data
    }
    pub fn get_settings(&self) -> Option<&PathBuf> {
        self.settings.as_ref()
    }
    pub fn get_mappings(&self) -> Option<&PathBuf> {
        self.mappings.as_ref()
    }
    pub fn get_batch(&self) -> usize {
        self.batch
    }
    pub fn get_auth(&self) -> &Auth {
        &self.auth
    }
    pub fn is_add(&self) -> bool {
        self.add
    }
    pub fn is_delete(&self) -> bool {
        self.delete
    }
    pub fn is_insecure_skip_verify(&self) -> bool {
        self.insecure_skip_verify
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn minimal_cli() -> Cli {
        Cli {
            index: Some("people".to_string()),
            data: Some(PathBuf::from("people.json")),
            ..Default::default()
        }
    }

    #[test]
    fn resolve_applies_defaults() {
        let config = Config::resolve(minimal_cli()).unwrap();
        assert_eq!(config.get_url(), DEFAULT_URL);
        assert_eq!(config.get_batch(), DEFAULT_BATCH_SIZE);
        assert_eq!(config.get_auth(), &Auth::None);
        assert!(!config.is_add());
        assert!(!config.is_delete());
        assert!(!config.is_insecure_skip_verify());
    }

    #[test]
    fn resolve_requires_index_and_data() {
        let mut cli = minimal_cli();
        cli.index = None;
        assert!(matches!(
            Config::resolve(cli),
            Err(ConfError::MissingRequired("index"))
        ));

        let mut cli = minimal_cli();
        cli.data = None;
        assert!(matches!(
            Config::resolve(cli),
            Err(ConfError::MissingRequired("data"))
        ));
    }

    #[test]
    fn rejects_basic_auth_combined_with_api_key() {
        let mut cli = minimal_cli();
        cli.user = Some("elastic".to_string());
        cli.pass = Some("changeme".to_string());
        cli.api_key = Some("secret".to_string());
        assert!(matches!(Config::resolve(cli), Err(ConfError::AmbiguousAuth)));

        // A lone username still conflicts with an API key.
        let mut cli = minimal_cli();
        cli.user = Some("elastic".to_string());
        cli.api_key = Some("secret".to_string());
        assert!(matches!(Config::resolve(cli), Err(ConfError::AmbiguousAuth)));
    }

    #[test]
    fn basic_auth_requires_both_user_and_pass() {
        let mut cli = minimal_cli();
        cli.user = Some("elastic".to_string());
        let config = Config::resolve(cli).unwrap();
        assert_eq!(config.get_auth(), &Auth::None);

        let mut cli = minimal_cli();
        cli.user = Some("elastic".to_string());
        cli.pass = Some("changeme".to_string());
        let config = Config::resolve(cli).unwrap();
        assert_eq!(
            config.get_auth(),
            &Auth::Basic {
                username: "elastic".to_string(),
                password: "changeme".to_string(),
            }
        );
    }

    #[test]
    fn api_key_alone_is_accepted() {
        let mut cli = minimal_cli();
        cli.api_key = Some("secret".to_string());
        let config = Config::resolve(cli).unwrap();
        assert_eq!(config.get_auth(), &Auth::ApiKey("secret".to_string()));
    }

    #[test]
    fn rejects_zero_batch() {
        let mut cli = minimal_cli();
        cli.batch = Some(0);
        assert!(matches!(Config::resolve(cli), Err(ConfError::ZeroBatch)));
    }

    #[test]
    fn flags_take_precedence_over_file_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "url=https://search.example.com:9200/").unwrap();
        writeln!(file, "index=people").unwrap();
        writeln!(file, "data=/data/people.json").unwrap();
        writeln!(file, "batch=500").unwrap();
        writeln!(file, "insecureSkipVerify=true").unwrap();
        writeln!(file, "add=true").unwrap();
        writeln!(file, "delete=false").unwrap();
        file.flush().unwrap();

        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            batch: Some(250),
            ..Default::default()
        };
        let config = Config::resolve(cli).unwrap();
        // Trailing slash is normalized away.
        assert_eq!(config.get_url(), "https://search.example.com:9200");
        assert_eq!(config.get_index(), "people");
        assert_eq!(config.get_data(), &PathBuf::from("/data/people.json"));
        assert_eq!(config.get_batch(), 250);
        assert!(config.is_insecure_skip_verify());
        assert!(config.is_add());
        assert!(!config.is_delete());
    }

    #[test]
    fn bool_and_integer_file_values_are_parsed() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "index=people").unwrap();
        writeln!(file, "data=/data/people.json").unwrap();
        writeln!(file, "batch=42").unwrap();
        writeln!(file, "delete=1").unwrap();
        writeln!(file, "insecureSkipVerify=no").unwrap();
        file.flush().unwrap();

        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let config = Config::resolve(cli).unwrap();
        assert_eq!(config.get_batch(), 42);
        assert!(config.is_delete());
        assert!(!config.is_insecure_skip_verify());
    }

    #[test]
    fn rejects_malformed_typed_file_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "index=people").unwrap();
        writeln!(file, "data=/data/people.json").unwrap();
        writeln!(file, "batch=ten").unwrap();
        file.flush().unwrap();

        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert!(matches!(
            Config::resolve(cli),
            Err(ConfError::InvalidValue { key: "batch", .. })
        ));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "index=people").unwrap();
        writeln!(file, "data=/data/people.json").unwrap();
        writeln!(file, "add=maybe").unwrap();
        file.flush().unwrap();

        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert!(matches!(
            Config::resolve(cli),
            Err(ConfError::InvalidValue { key: "add", .. })
        ));
    }

    #[test]
    fn missing_config_file_is_fatal() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/loader.conf")),
            ..minimal_cli()
        };
        assert!(matches!(Config::resolve(cli), Err(ConfError::File { .. })));
    }

    #[test]
    fn camel_case_flags_parse() {
        let cli = Cli::try_parse_from([
            "es-bulk-loader",
            "--index",
            "people",
            "--data",
            "people.json",
            "--insecureSkipVerify",
            "--apiKey",
            "secret",
        ])
        .unwrap();
        assert!(cli.insecure_skip_verify);
        assert_eq!(cli.api_key.as_deref(), Some("secret"));
    }
}
