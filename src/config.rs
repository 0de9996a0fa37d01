//!
//! Run configuration, read once from the environment.
//!
use crate::{Error, Result};

/// Anypoint platform base URL
pub const DEFAULT_API_BASE_URL: &str = "https://anypoint.mulesoft.com";

/// OAuth2 token endpoint
pub const DEFAULT_TOKEN_URL: &str = "https://anypoint.mulesoft.com/accounts/api/v2/oauth2/token";

/// Reporting window, the last 24 hours
pub const TIME_WINDOW: &str = "from/now-1d/to/now";

/// SMTP port used when `MAIL_PORT` is missing or invalid
pub const DEFAULT_MAIL_PORT: u16 = 25;

/// Spreadsheet written when `REPORT_OUTPUT_FILE` is not set
pub const DEFAULT_OUTPUT_FILE: &str = "appReportMetrics.xlsx";

/// Settings for one report run
#[derive(Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub organization_id: String,
    pub environment_id: String,
    /// Display name of the environment, used in the report header and subject
    pub environment: String,
    pub api_base_url: String,
    pub token_url: String,
    pub accept_invalid_certs: bool,
    pub mail_host: String,
    pub mail_port: u16,
    pub mail_from: String,
    pub mail_to: String,
    pub output_file: std::path::PathBuf,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("client_id", &self.client_id)
            .field("organization_id", &self.organization_id)
            .field("environment_id", &self.environment_id)
            .field("environment", &self.environment)
            .field("api_base_url", &self.api_base_url)
            .field("token_url", &self.token_url)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("mail_host", &self.mail_host)
            .field("mail_port", &self.mail_port)
            .field("mail_from", &self.mail_from)
            .field("mail_to", &self.mail_to)
            .field("output_file", &self.output_file)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Read the configuration from the process environment
    /// * `METRICS_CLIENT_ID`, `METRICS_CLIENT_SECRET` - connected app credentials
    /// * `ANYPOINT_ORGANIZATION_ID`, `ANYPOINT_ENVIRONMENT_ID` - what to report on
    /// * `ANYPOINT_ENVIRONMENT` - environment display name
    /// * `MAIL_HOST`, `MAIL_PORT`, `MAIL_FROM`, `MAIL_TO` - SMTP delivery
    ///
    /// Optional: `ANYPOINT_BASE_URL`, `ANYPOINT_TOKEN_URL`, `ANYPOINT_ACCEPT_INVALID_CERTS`
    /// and `REPORT_OUTPUT_FILE`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Config::from_env`], but never fails: missing or invalid values are replaced by
    /// empty strings or defaults and returned alongside the configuration
    #[must_use]
    pub fn from_env_partial() -> (Self, Vec<Error>) {
        Self::from_lookup_partial(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup, failing on the first problem
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (config, problems) = Self::from_lookup_partial(lookup);
        match problems.into_iter().next() {
            Some(problem) => Err(problem),
            None => Ok(config),
        }
    }

    /// Build the configuration from an arbitrary key lookup, collecting every problem
    pub fn from_lookup_partial<F>(lookup: F) -> (Self, Vec<Error>)
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut problems = Vec::new();
        let mut required = |key: &str| {
            lookup(key).unwrap_or_else(|| {
                problems.push(Error::MissingEnv(key.to_string()));
                String::new()
            })
        };

        let client_id = required("METRICS_CLIENT_ID");
        let client_secret = required("METRICS_CLIENT_SECRET");
        let organization_id = required("ANYPOINT_ORGANIZATION_ID");
        let environment_id = required("ANYPOINT_ENVIRONMENT_ID");
        let environment = required("ANYPOINT_ENVIRONMENT");
        let mail_host = required("MAIL_HOST");
        let mail_port = required("MAIL_PORT");
        let mail_from = required("MAIL_FROM");
        let mail_to = required("MAIL_TO");

        let mail_port = if mail_port.is_empty() {
            DEFAULT_MAIL_PORT
        } else {
            mail_port.trim().parse::<u16>().unwrap_or_else(|e| {
                problems.push(Error::InvalidConfig("MAIL_PORT".into(), e.to_string()));
                DEFAULT_MAIL_PORT
            })
        };

        let accept_invalid_certs = lookup("ANYPOINT_ACCEPT_INVALID_CERTS").map_or(false, |v| {
            v.trim().parse::<bool>().unwrap_or_else(|e| {
                problems.push(Error::InvalidConfig(
                    "ANYPOINT_ACCEPT_INVALID_CERTS".into(),
                    e.to_string(),
                ));
                false
            })
        });

        let config = Self {
            client_id,
            client_secret,
            organization_id,
            environment_id,
            environment,
            api_base_url: lookup("ANYPOINT_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            token_url: lookup("ANYPOINT_TOKEN_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            accept_invalid_certs,
            mail_host,
            mail_port,
            mail_from,
            mail_to,
            output_file: lookup("REPORT_OUTPUT_FILE")
                .unwrap_or_else(|| DEFAULT_OUTPUT_FILE.to_string())
                .into(),
        };
        (config, problems)
    }

    /// Reporting window used in endpoint paths and the report header
    #[must_use]
    pub fn time_window(&self) -> &'static str {
        TIME_WINDOW
    }
}
