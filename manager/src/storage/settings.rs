//! Settings file management

use std::collections::HashMap;

use secrecy::SecretString;
use serde::Deserialize;

use crate::logs::LogLevel;

/// Manager settings, read from `settings.json`
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines on stdout
    #[serde(default)]
    pub log_json: bool,

    /// Also write daily-rolling log files under the layout's logs dir
    #[serde(default)]
    pub log_to_file: bool,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub jenkins: JenkinsSettings,

    #[serde(default)]
    pub gitlab: GitlabSettings,

    #[serde(default)]
    pub deploy: DeploySettings,

    /// Persist the document store to `store.json` after every write
    #[serde(default = "default_true")]
    pub store_snapshot: bool,

    /// Upper bound for joining workers on shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_shutdown_timeout() -> u64 {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_to_file: false,
            server: ServerSettings::default(),
            jenkins: JenkinsSettings::default(),
            gitlab: GitlabSettings::default(),
            deploy: DeploySettings::default(),
            store_snapshot: true,
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    38012
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Build system settings
#[derive(Debug, Clone, Deserialize)]
pub struct JenkinsSettings {
    #[serde(default = "default_jenkins_url")]
    pub url: String,

    #[serde(default)]
    pub username: String,

    #[serde(default = "empty_secret")]
    pub api_token: SecretString,

    #[serde(default = "default_jenkins_job")]
    pub job: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Budget for a build measured from its start
    #[serde(default = "default_build_timeout")]
    pub timeout_secs: u64,

    /// Prefix of the `PACKAGE_NAME` parameter
    #[serde(default = "default_package_prefix")]
    pub package_prefix: String,

    /// Binaries passed as `BIN`
    #[serde(default = "default_bins")]
    pub bins: Vec<String>,

    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default = "default_tag")]
    pub tag: String,

    /// Toolchain image per binary, overrides the built-in table
    #[serde(default)]
    pub toolchains: HashMap<String, String>,
}

fn default_jenkins_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_jenkins_job() -> String {
    "mikud-live".to_string()
}

fn default_poll_interval() -> u64 {
    30
}

fn default_build_timeout() -> u64 {
    3 * 60 * 60
}

fn default_package_prefix() -> String {
    "MIKUD_LIVE".to_string()
}

fn default_bins() -> Vec<String> {
    vec!["streamd".to_string()]
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_tag() -> String {
    "origin/main".to_string()
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

impl Default for JenkinsSettings {
    fn default() -> Self {
        Self {
            url: default_jenkins_url(),
            username: String::new(),
            api_token: empty_secret(),
            job: default_jenkins_job(),
            poll_interval_secs: default_poll_interval(),
            timeout_secs: default_build_timeout(),
            package_prefix: default_package_prefix(),
            bins: default_bins(),
            branch: default_branch(),
            tag: default_tag(),
            toolchains: HashMap::new(),
        }
    }
}

/// Version control settings
#[derive(Debug, Clone, Deserialize)]
pub struct GitlabSettings {
    /// API root, e.g. `https://gitlab.example.com/api/v4`
    #[serde(default = "default_gitlab_url")]
    pub url: String,

    #[serde(default = "empty_secret")]
    pub private_token: SecretString,

    /// Numeric id or url-encoded path of the tracked project
    #[serde(default)]
    pub project_id: String,

    #[serde(default = "default_mainline")]
    pub mainline: String,

    /// JSON file whose `version` field is rewritten on publish
    #[serde(default = "default_version_file")]
    pub version_file: String,

    /// Prefix of the release branch name
    #[serde(default = "default_module")]
    pub module: String,
}

fn default_gitlab_url() -> String {
    "http://localhost/api/v4".to_string()
}

fn default_mainline() -> String {
    "master".to_string()
}

fn default_version_file() -> String {
    "streamd.json".to_string()
}

fn default_module() -> String {
    "streamd".to_string()
}

impl Default for GitlabSettings {
    fn default() -> Self {
        Self {
            url: default_gitlab_url(),
            private_token: empty_secret(),
            project_id: String::new(),
            mainline: default_mainline(),
            version_file: default_version_file(),
            module: default_module(),
        }
    }
}

/// How a deploying release reaches `completed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CompletionMode {
    /// Complete automatically once the delay elapsed
    Fixed {
        #[serde(default = "default_completion_delay")]
        delay_secs: u64,
    },
    /// Wait for `POST /releases/{id}/complete`
    External,
}

fn default_completion_delay() -> u64 {
    60
}

impl Default for CompletionMode {
    fn default() -> Self {
        CompletionMode::Fixed {
            delay_secs: default_completion_delay(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploySettings {
    #[serde(default)]
    pub completion: CompletionMode,
}
