//!
//! Library for building the daily Anypoint application metrics report.
//!
//! ## Anypoint Client
//! The first interaction is to exchange the connected app credentials for a bearer token
//! ```no_run
//! #[tokio::main]
//! async fn main() -> Result<(), anypoint_metrics_report::Error> {
//!     use anypoint_metrics_report::ClientBuilder;
//!
//!     let client = ClientBuilder::new()
//!         .client_credentials_login(
//!             "https://anypoint.mulesoft.com/accounts/api/v2/oauth2/token",
//!             "https://anypoint.mulesoft.com",
//!             "client id",
//!             "client secret",
//!         )
//!         .await?;
//!
//!     let report: serde_json::Value = client
//!         .get_json("monitoring/api/organizations/org/environments/env/reports/requests/from/now-1d/to/now")
//!         .await?;
//!     println!("{report}");
//!     Ok(())
//! }
//! ```
//!
//! ## Report
//! ```no_run
//! #[tokio::main]
//! async fn main() -> Result<(), anypoint_metrics_report::Error> {
//!     use anypoint_metrics_report::{config::Config, pipeline};
//!
//!     let config = Config::from_env()?;
//!     let summary = pipeline::run(&config).await;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::missing_errors_doc)]
use serde::Deserialize;

pub mod aggregate;
pub mod config;
pub mod dispatch;
pub mod monitoring;
pub mod pipeline;
pub mod render;

/// Error returned by client functions
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Login failed
    #[error("Login failed: {0}")]
    LoginFailure(String),

    /// A required environment variable is missing
    #[error("Missing environment variable '{0}'")]
    MissingEnv(String),

    /// An environment variable is present but can't be used
    #[error("Invalid value for '{0}': {1}")]
    InvalidConfig(String, String),

    /// Failed returned by the HTTP server
    #[error("HTTP failed {0}, {1}")]
    WebServer(u16, String),

    /// JSON serialization/deserialization error
    #[error("Serde JSON error: {0}")]
    Serde(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL: {0}")]
    URL(#[from] url::ParseError),

    /// HTTP client error
    #[error("Reqwest: {0}")]
    HTTPClient(#[from] reqwest::Error),

    /// Spreadsheet encoding error
    #[error("Spreadsheet: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    /// The email message could not be assembled
    #[error("Mail message: {0}")]
    Mail(#[from] lettre::error::Error),

    /// Sender or recipient is not a valid mailbox
    #[error("Mail address: {0}")]
    MailAddress(#[from] lettre::address::AddressError),

    /// SMTP transport error
    #[error("SMTP: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// IO Errors
    #[error("IO error {0}")]
    IO(#[from] std::io::Error),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Token returned from the OAuth2 token endpoint
#[derive(Deserialize)]
pub(crate) struct LoginToken {
    pub access_token: String,
    expires_in: Option<i64>,
    token_type: Option<String>,
}

impl std::fmt::Debug for LoginToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginToken")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Builder for an Anypoint [`Client`]
#[derive(Clone, Default)]
pub struct ClientBuilder {
    disable_cert_verification: bool,
}

impl ClientBuilder {
    /// Create a new builder instance
    #[must_use]
    pub const fn new() -> Self {
        Self {
            disable_cert_verification: false,
        }
    }

    /// Disable certificate verification
    #[must_use]
    pub fn danger_accept_invalid_certs(self) -> Self {
        Self {
            disable_cert_verification: true,
        }
    }

    /// Exchange client credentials for a bearer token.
    ///
    /// `token_url` is the OAuth2 token endpoint, `host` the base of the monitoring API that
    /// later calls are resolved against. A path prefix on `host` is kept.
    pub async fn client_credentials_login(
        &self,
        token_url: &str,
        host: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Client> {
        let base_url = with_trailing_slash(url::Url::parse(host)?);
        let token_url = url::Url::parse(token_url)?;

        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(self.disable_cert_verification)
            .build()?;

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ];

        let result = client.post(token_url).form(&form).send().await?;

        if result.status().is_success() {
            let text = result.text().await?;
            let login_token = serde_json::from_str::<LoginToken>(&text)?;
            tracing::debug!("token retrieved {:?}", login_token);
            Ok(Client::new(client, base_url, login_token))
        } else {
            let text = result.text().await?;
            tracing::debug!("login returned {}", text);
            Err(Error::LoginFailure(text))
        }
    }
}

/// The `Client` is used for all interaction with the monitoring API.
/// Use [`ClientBuilder::client_credentials_login`] to create an instance.
#[derive(Clone)]
pub struct Client {
    base_url: url::Url,
    login_token: std::sync::Arc<LoginToken>,
    client: reqwest::Client,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("login_token", &self.login_token)
            .field("client", &self.client)
            .finish()
    }
}

impl Client {
    fn new(client: reqwest::Client, base_url: url::Url, login_token: LoginToken) -> Self {
        Self {
            client,
            base_url,
            login_token: std::sync::Arc::new(login_token),
        }
    }

    /// Returns the login bearer token
    #[must_use]
    pub fn bearer_token(&self) -> &str {
        &self.login_token.access_token
    }

    /// GET a json payload from the REST API. `path` is relative to the base URL, a leading `/`
    /// replaces the base path.
    pub async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path)?;

        let result = self
            .client
            .get(url)
            .bearer_auth(self.bearer_token())
            .header("Accept", "application/json")
            .send()
            .await?;

        if result.status().is_success() {
            let text = result.text().await?;
            tracing::debug!("GET {} returned {}", path, text);
            Ok(serde_json::from_str(&text)?)
        } else {
            let status = result.status();
            let text = result.text().await.unwrap_or_default();
            tracing::debug!("GET {} failed {}: {}", path, status, text);
            Err(Error::WebServer(status.as_u16(), status.to_string()))
        }
    }
}

// Url::join drops the last path segment unless it ends with a slash
fn with_trailing_slash(mut url: url::Url) -> url::Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
