use super::traits::ConfigSection;
use crate::error::ProbevolveError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_ms: u64,
    /// Report the `Location` header of a redirect as the outcome.
    pub redirect_mode: bool,
    /// Report the page title of a `200` response as the outcome.
    pub brute_mode: bool,
    /// Static user agent; rotated per request when unset.
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
    pub proxy_list: Option<PathBuf>,
    pub stop_on_block: bool,
    pub force_ssl: bool,
    pub accept_invalid_certs: bool,
    /// Refuse to start unless traffic leaves through Tor.
    pub check_tor: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 3000,
            redirect_mode: true,
            brute_mode: true,
            user_agent: None,
            proxy: None,
            proxy_list: None,
            stop_on_block: false,
            force_ssl: false,
            accept_invalid_certs: false,
            check_tor: false,
        }
    }
}

impl ConfigSection for FetchConfig {
    fn section_name() -> &'static str {
        "fetch"
    }

    fn validate(&self) -> Result<(), ProbevolveError> {
        if self.timeout_ms == 0 {
            return Err(ProbevolveError::Configuration(
                "Timeout must be positive".to_string()
            ));
        }
        if !self.redirect_mode && !self.brute_mode {
            return Err(ProbevolveError::Configuration(
                "At least one of redirect mode or brute mode must be enabled".to_string()
            ));
        }
        if let Some(proxy) = &self.proxy {
            proxy_urls(proxy)?;
        }
        Ok(())
    }
}

/// Proxy URLs to try for one configured entry, in order. A bare `host:port`
/// is tried as SOCKS first, with remote DNS, then as HTTP. Entries that carry
/// a scheme are used as they are.
pub fn proxy_urls(entry: &str) -> Result<Vec<String>, ProbevolveError> {
    let entry = entry.trim();
    if entry.contains("://") {
        return Ok(vec![entry.to_string()]);
    }
    let (host, port) = entry.rsplit_once(':').ok_or_else(|| {
        ProbevolveError::Configuration(format!("Invalid proxy setting: {}", entry))
    })?;
    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(ProbevolveError::Configuration(format!(
            "Invalid proxy setting: {}",
            entry
        )));
    }
    Ok(vec![
        format!("socks5h://{}:{}", host, port),
        format!("http://{}:{}", host, port),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_url_normalization() {
        assert_eq!(
            proxy_urls("127.0.0.1:9050").unwrap(),
            vec!["socks5h://127.0.0.1:9050", "http://127.0.0.1:9050"]
        );
        assert_eq!(proxy_urls("socks5://10.0.0.1:1080").unwrap(), vec!["socks5://10.0.0.1:1080"]);
        assert!(proxy_urls("127.0.0.1").is_err());
        assert!(proxy_urls("127.0.0.1:notaport").is_err());
    }

    #[test]
    fn test_requires_a_mode() {
        let config = FetchConfig {
            redirect_mode: false,
            brute_mode: false,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
