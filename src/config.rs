//! Application-wide settings.
//!
//! A [`Config`] is handed to [`App::with_config`](crate::App::with_config)
//! once and shared read-only by every request afterwards.

use http::HeaderName;

/// Environment variable consulted for the default [`Config::env`].
pub const ENV_VAR: &str = "STRATA_ENV";

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Process-wide application settings.
///
/// ```rust
/// use strata::Config;
///
/// let config = Config::default().proxy(true).max_ips_count(2);
/// assert!(config.proxy);
/// assert_eq!(config.subdomain_offset, 2);
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    /// Trust `X-Forwarded-*` headers.
    pub proxy: bool,
    /// Suppress the default error report.
    pub silent: bool,
    pub env: String,
    /// Number of trailing host labels that are not subdomains.
    pub subdomain_offset: usize,
    pub proxy_ip_header: HeaderName,
    /// Keep only the last N addresses of the proxy header; 0 keeps all.
    pub max_ips_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proxy: false,
            silent: false,
            env: std::env::var(ENV_VAR).unwrap_or_else(|_| "development".to_owned()),
            subdomain_offset: 2,
            proxy_ip_header: X_FORWARDED_FOR,
            max_ips_count: 0,
        }
    }
}

impl Config {
    pub fn proxy(mut self, proxy: bool) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn env(mut self, env: impl Into<String>) -> Self {
        self.env = env.into();
        self
    }

    pub fn subdomain_offset(mut self, offset: usize) -> Self {
        self.subdomain_offset = offset;
        self
    }

    pub fn proxy_ip_header(mut self, header: HeaderName) -> Self {
        self.proxy_ip_header = header;
        self
    }

    pub fn max_ips_count(mut self, count: usize) -> Self {
        self.max_ips_count = count;
        self
    }
}
