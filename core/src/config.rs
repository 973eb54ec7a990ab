//! Client configuration.
//!
//! Credentials are stored verbatim; nothing here validates or re-encodes
//! them. Every other knob defaults to what the TribeHR API has always been
//! called with, except TLS verification, which stays on unless the caller
//! explicitly opts out with [`ClientConfig::danger_accept_invalid_certs`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Host every account subdomain lives under.
pub const DEFAULT_HOST_SUFFIX: &str = "mytribehr.com";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_REDIRECTS: u32 = 2;

/// URL scheme used for requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    Http,
    #[default]
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(Error::Config(format!("unsupported protocol: {other}"))),
        }
    }
}

/// Configuration for a [`TribeHrClient`](crate::TribeHrClient).
#[derive(Clone)]
pub struct ClientConfig {
    /// Account subdomain, e.g. `acme` for `acme.mytribehr.com`.
    pub subdomain: String,
    /// Basic-auth username.
    pub username: String,
    /// API key, sent as the basic-auth password.
    pub api_key: String,
    pub protocol: Protocol,
    pub host_suffix: String,
    /// Replaces `{protocol}://{subdomain}.{host_suffix}` when set.
    pub base_url: Option<String>,
    pub connect_timeout: Duration,
    /// Upper bound on the whole call, redirects included.
    pub timeout: Duration,
    pub max_redirects: u32,
    /// Skip certificate and hostname verification on https.
    ///
    /// Older TribeHR connectors always disabled verification. This client
    /// verifies by default; set this only to talk to hosts with broken
    /// certificates.
    pub danger_accept_invalid_certs: bool,
}

impl ClientConfig {
    pub fn new(
        subdomain: impl Into<String>,
        username: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            subdomain: subdomain.into(),
            username: username.into(),
            api_key: api_key.into(),
            protocol: Protocol::default(),
            host_suffix: DEFAULT_HOST_SUFFIX.to_string(),
            base_url: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            timeout: DEFAULT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            danger_accept_invalid_certs: false,
        }
    }

    /// Load configuration from the process environment, reading a `.env`
    /// file first if one exists.
    ///
    /// `TRIBEHR_SUBDOMAIN`, `TRIBEHR_USERNAME` and `TRIBEHR_API_KEY` are
    /// required. `TRIBEHR_PROTOCOL`, `TRIBEHR_BASE_URL` and
    /// `TRIBEHR_INSECURE_TLS` are optional.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::Config(format!("{key} is not set")))
        };

        let mut config = Self::new(
            required("TRIBEHR_SUBDOMAIN")?,
            required("TRIBEHR_USERNAME")?,
            required("TRIBEHR_API_KEY")?,
        );

        if let Some(protocol) = lookup("TRIBEHR_PROTOCOL") {
            config.protocol = protocol.parse()?;
        }
        if let Some(base_url) = lookup("TRIBEHR_BASE_URL").filter(|v| !v.is_empty()) {
            config = config.with_base_url(base_url);
        }
        if let Some(flag) = lookup("TRIBEHR_INSECURE_TLS") {
            config.danger_accept_invalid_certs = parse_flag(&flag)?;
        }

        Ok(config)
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_host_suffix(mut self, host_suffix: impl Into<String>) -> Self {
        self.host_suffix = host_suffix.into();
        self
    }

    /// Send every request to `base_url` instead of the account host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_redirects(mut self, max: u32) -> Self {
        self.max_redirects = max;
        self
    }

    /// Disable TLS certificate verification (dangerous).
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.danger_accept_invalid_certs = accept;
        self
    }

    /// Scheme and host every request path is appended to.
    pub fn origin(&self) -> String {
        match &self.base_url {
            Some(base_url) => base_url.clone(),
            None => format!("{}://{}.{}", self.protocol, self.subdomain, self.host_suffix),
        }
    }
}

// The API key never ends up in logs through `{:?}`.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("subdomain", &self.subdomain)
            .field("username", &self.username)
            .field("api_key", &"<redacted>")
            .field("protocol", &self.protocol)
            .field("host_suffix", &self.host_suffix)
            .field("base_url", &self.base_url)
            .field("connect_timeout", &self.connect_timeout)
            .field("timeout", &self.timeout)
            .field("max_redirects", &self.max_redirects)
            .field("danger_accept_invalid_certs", &self.danger_accept_invalid_certs)
            .finish()
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::Config(format!("invalid boolean flag: {other}"))),
    }
}
