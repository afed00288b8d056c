use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Credentials file read when no `--config` is given.
pub const DEFAULT_CONFIG_PATH: &str = "dl.toml";

/// Public bucket holding the song and log datasets.
pub const DEFAULT_INPUT: &str = "s3a://udacity-dend/";

pub const DEFAULT_OUTPUT: &str = "./Results/";

/// The job reads one fixed song file unless told otherwise.
pub const DEFAULT_SONG_DATA: &str = "song_data/A/B/C/TRABCEI128F424C983.json";

pub const DEFAULT_LOG_DATA: &str = "log_data/*/*/*.json";

/// Region of the `udacity-dend` bucket.
pub const DEFAULT_REGION: &str = "us-west-2";

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub aws: AwsConfig,
    pub paths: PathsConfig,
}

/// On-disk layout of the credentials file. Section and key names follow the
/// `[AWS] KEY / SECRET` convention of the classic `dl.cfg`.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(rename = "AWS")]
    aws: Option<AwsSection>,
    #[serde(default)]
    job: PathsConfig,
}

#[derive(Debug, Deserialize)]
struct AwsSection {
    #[serde(rename = "KEY")]
    key: Option<String>,
    #[serde(rename = "SECRET")]
    secret: Option<String>,
    #[serde(rename = "REGION")]
    region: Option<String>,
    #[serde(rename = "SESSION_TOKEN")]
    session_token: Option<String>,
    #[serde(rename = "ENDPOINT")]
    endpoint: Option<String>,
}

impl JobConfig {
    /// Read and validate the credentials file at `path`.
    ///
    /// A missing file, invalid TOML, or an `[AWS]` section without `KEY` and
    /// `SECRET` are all errors; the job must not start without credentials.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let label = path.display().to_string();
        tracing::debug!(path = %label, "Loading job config");

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: label.clone(),
            source,
        })?;
        Self::parse(&content, &label)
    }

    /// Parse config text. `label` names the source in error messages.
    pub fn parse(content: &str, label: &str) -> Result<Self, ConfigError> {
        // Classic dl.cfg files are INI with bare values; retry with them quoted.
        let file: ConfigFile = match toml::from_str(content) {
            Ok(file) => file,
            Err(source) => toml::from_str(&quote_bare_values(content)).map_err(|_| {
                ConfigError::Parse {
                    path: label.to_string(),
                    source,
                }
            })?,
        };

        let section = file
            .aws
            .ok_or_else(|| ConfigError::Missing(format!("[AWS] section in {label}")))?;
        let key = non_empty(section.key)
            .ok_or_else(|| ConfigError::Missing(format!("AWS.KEY in {label}")))?;
        let secret = non_empty(section.secret)
            .ok_or_else(|| ConfigError::Missing(format!("AWS.SECRET in {label}")))?;

        let region = non_empty(section.region)
            .or_else(|| env_opt("AWS_REGION"))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        Ok(Self {
            aws: AwsConfig {
                region,
                access_key_id: Some(key),
                secret_access_key: Some(secret),
                session_token: non_empty(section.session_token),
                endpoint_url: non_empty(section.endpoint),
            },
            paths: file.job,
        })
    }

    /// Replace input/output roots with explicit overrides (CLI flags).
    pub fn with_overrides(mut self, input: Option<String>, output: Option<String>) -> Self {
        if let Some(input) = non_empty(input) {
            self.paths.input = input;
        }
        if let Some(output) = non_empty(output) {
            self.paths.output = output;
        }
        self
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!(
            "  aws:    region={}, credentials={}",
            self.aws.region,
            if self.aws.is_configured() { "set" } else { "(none)" }
        );
        tracing::info!("  input:  {}", self.paths.input);
        tracing::info!("  output: {}", self.paths.output);
        tracing::info!("  songs:  {}", self.paths.song_data);
        tracing::info!("  logs:   {}", self.paths.log_data);
    }
}

/// Rewrite INI-style `key=value` / `key: value` lines as TOML string
/// assignments. Section headers, comments and already-quoted values are kept.
fn quote_bare_values(content: &str) -> String {
    let mut out = String::with_capacity(content.len() + 16);
    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(comment) = trimmed.strip_prefix(';') {
            out.push('#');
            out.push_str(comment);
        } else if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('[') {
            out.push_str(trimmed);
        } else if let Some(at) = trimmed.find(['=', ':']) {
            let key = trimmed[..at].trim();
            let value = trimmed[at + 1..].trim();
            if value.starts_with('"') || value.starts_with('\'') {
                out.push_str(&format!("{key} = {value}"));
            } else {
                let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
                out.push_str(&format!("{key} = \"{escaped}\""));
            }
        } else {
            out.push_str(trimmed);
        }
        out.push('\n');
    }
    out
}

// ── AWS / S3 ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub endpoint_url: Option<String>,
}

impl AwsConfig {
    /// No credentials at all. Enough for jobs that only touch local paths.
    pub fn anonymous() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            endpoint_url: None,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }
}

// ── Paths ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_input")]
    pub input: String,
    #[serde(default = "default_output")]
    pub output: String,
    /// Glob (relative to `input`) selecting song JSON files.
    #[serde(default = "default_song_data")]
    pub song_data: String,
    /// Glob (relative to `input`) selecting log JSON files.
    #[serde(default = "default_log_data")]
    pub log_data: String,
}

fn default_input() -> String {
    DEFAULT_INPUT.to_string()
}

fn default_output() -> String {
    DEFAULT_OUTPUT.to_string()
}

fn default_song_data() -> String {
    DEFAULT_SONG_DATA.to_string()
}

fn default_log_data() -> String {
    DEFAULT_LOG_DATA.to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
            output: default_output(),
            song_data: default_song_data(),
            log_data: default_log_data(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_credentials() {
        let cfg = JobConfig::parse("[AWS]\nKEY = \"AKIA\"\nSECRET = \"s3cr3t\"\n", "dl.toml").unwrap();
        assert_eq!(cfg.aws.access_key_id.as_deref(), Some("AKIA"));
        assert_eq!(cfg.aws.secret_access_key.as_deref(), Some("s3cr3t"));
        assert!(cfg.aws.is_configured());
        assert_eq!(cfg.paths.input, DEFAULT_INPUT);
        assert_eq!(cfg.paths.output, DEFAULT_OUTPUT);
        assert_eq!(cfg.paths.song_data, DEFAULT_SONG_DATA);
        assert_eq!(cfg.paths.log_data, DEFAULT_LOG_DATA);
    }

    #[test]
    fn parse_job_section() {
        let text = r#"
[AWS]
KEY = "k"
SECRET = "s"
REGION = "eu-west-1"
ENDPOINT = "http://localhost:9000"

[job]
input = "/data/in/"
song_data = "song_data/*/*/*/*.json"
"#;
        let cfg = JobConfig::parse(text, "dl.toml").unwrap();
        assert_eq!(cfg.aws.region, "eu-west-1");
        assert_eq!(cfg.aws.endpoint_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(cfg.paths.input, "/data/in/");
        assert_eq!(cfg.paths.output, DEFAULT_OUTPUT);
        assert_eq!(cfg.paths.song_data, "song_data/*/*/*/*.json");
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = JobConfig::parse("[AWS]\nKEY = \"k\"\n", "dl.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref m) if m.contains("AWS.SECRET")));
    }

    #[test]
    fn missing_section_is_an_error() {
        let err = JobConfig::parse("[job]\ninput = \"x\"\n", "dl.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn parse_ini_style_dl_cfg() {
        let text = "; credentials\n[AWS]\nKEY=AKIAEXAMPLE\nSECRET = abc/def+ghi=\n\n[job]\noutput: s3a://my-bucket/out/\n";
        let cfg = JobConfig::parse(text, "dl.cfg").unwrap();
        assert_eq!(cfg.aws.access_key_id.as_deref(), Some("AKIAEXAMPLE"));
        assert_eq!(cfg.aws.secret_access_key.as_deref(), Some("abc/def+ghi="));
        assert_eq!(cfg.paths.output, "s3a://my-bucket/out/");
        assert_eq!(cfg.paths.input, DEFAULT_INPUT);
    }

    #[test]
    fn bare_values_are_quoted() {
        assert_eq!(
            quote_bare_values("[AWS]\nKEY=a\"b\nREGION = \"eu-west-1\"\n"),
            "[AWS]\nKEY = \"a\\\"b\"\nREGION = \"eu-west-1\"\n"
        );
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let err = JobConfig::parse("[AWS\nKEY=", "dl.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = JobConfig::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn load_from_file_and_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dl.toml");
        std::fs::write(&path, "[AWS]\nKEY = \"k\"\nSECRET = \"s\"\n").unwrap();

        let cfg = JobConfig::load(&path)
            .unwrap()
            .with_overrides(Some("/tmp/in".into()), Some(String::new()));
        assert_eq!(cfg.paths.input, "/tmp/in");
        assert_eq!(cfg.paths.output, DEFAULT_OUTPUT);
    }
}
