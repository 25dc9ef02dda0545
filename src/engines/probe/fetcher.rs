use crate::config::fetch::{proxy_urls, FetchConfig};
use crate::engines::probe::request::{RawRequest, RequestMethod};
use crate::error::{ProbevolveError, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, LOCATION, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

/// Resolves a probe to an outcome. `Ok(None)` means nothing is there.
///
/// Implementations must be safe to call from many evaluation tasks at once.
/// Recoverable failures should be reported as `ProbevolveError::Fetch`; any
/// other error aborts the run.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, probe: &str) -> Result<Option<String>>;
}

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Mobile Safari/537.36",
];

fn title_regex() -> &'static Regex {
    static TITLE: OnceLock<Regex> = OnceLock::new();
    TITLE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title pattern is valid"))
}

/// Text of the first `<title>` element, trimmed.
pub fn extract_title(body: &str) -> Option<String> {
    title_regex()
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Decides the outcome of one response.
///
/// Redirect mode reports the `Location` header. Brute mode reports the title
/// of a `200` page, falling back to the probe target when the title is empty,
/// unless the page looks like a captcha.
pub fn resolve_outcome(
    config: &FetchConfig,
    target: &str,
    status: StatusCode,
    location: Option<&str>,
    body: &str,
) -> Result<Option<String>> {
    if config.stop_on_block && status == StatusCode::FORBIDDEN {
        return Err(ProbevolveError::Blocked(format!("{} answered 403", target)));
    }

    let mut outcome = if config.redirect_mode {
        location.map(str::to_string)
    } else {
        None
    };

    if config.brute_mode && status == StatusCode::OK {
        outcome = match extract_title(body).filter(|t| !t.is_empty()) {
            Some(title) => Some(title),
            None if body.to_ascii_lowercase().contains("captcha") => {
                log::warn!("possible captcha served for {}", target);
                None
            }
            None => Some(target.to_string()),
        };
    }

    Ok(outcome)
}

pub const CHECK_TOR_URL: &str = "https://check.torproject.org/";
const NOT_TOR_MARKER: &str = "You are not using Tor";

/// Decides the Tor check from the response of `CHECK_TOR_URL`.
pub fn tor_check_verdict(status: StatusCode, body: &str) -> Result<()> {
    if status != StatusCode::OK {
        return Err(ProbevolveError::Configuration(format!(
            "Tor check page answered {}; traffic is likely not routed through Tor",
            status
        )));
    }
    if body.contains(NOT_TOR_MARKER) {
        return Err(ProbevolveError::Configuration(
            "Traffic is not routed through Tor".to_string(),
        ));
    }
    Ok(())
}

struct PreparedRequest {
    target: String,
    method: RequestMethod,
    headers: HeaderMap,
    body: String,
}

/// `Fetcher` over HTTP. Never follows redirects.
pub struct HttpFetcher {
    config: FetchConfig,
    /// One route per proxy entry. Clients of a route are tried in order while
    /// the connection itself fails.
    routes: Vec<Vec<Client>>,
    request_mode: bool,
}

impl HttpFetcher {
    /// `request_mode` makes every probe a raw request to replay rather than a
    /// URL to GET.
    pub fn new(config: FetchConfig, request_mode: bool) -> Result<Self> {
        let mut proxies: Vec<Vec<String>> = Vec::new();
        if let Some(path) = &config.proxy_list {
            proxies.extend(read_proxy_list(path)?);
        } else if let Some(proxy) = &config.proxy {
            proxies.push(proxy_urls(proxy)?);
        }

        let routes = if proxies.is_empty() {
            vec![vec![Self::build_client(&config, None)?]]
        } else {
            proxies
                .iter()
                .map(|urls| {
                    urls.iter()
                        .map(|url| Self::build_client(&config, Some(url)))
                        .collect::<Result<Vec<_>>>()
                })
                .collect::<Result<Vec<_>>>()?
        };

        log::info!(
            "http fetcher ready ({} route{}, timeout {}ms)",
            routes.len(),
            if routes.len() == 1 { "" } else { "s" },
            config.timeout_ms
        );

        Ok(Self {
            config,
            routes,
            request_mode,
        })
    }

    fn build_client(config: &FetchConfig, proxy: Option<&str>) -> Result<Client> {
        let mut builder = Client::builder()
            .redirect(Policy::none())
            .timeout(Duration::from_millis(config.timeout_ms))
            .danger_accept_invalid_certs(config.accept_invalid_certs);

        if let Some(proxy) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(builder.build()?)
    }

    fn pick_route(&self) -> &[Client] {
        self.routes
            .choose(&mut rand::thread_rng())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn user_agent(&self) -> &str {
        match &self.config.user_agent {
            Some(agent) => agent,
            None => USER_AGENTS
                .choose(&mut rand::thread_rng())
                .copied()
                .unwrap_or(USER_AGENTS[0]),
        }
    }

    fn prepare(&self, probe: &str) -> Result<PreparedRequest> {
        let mut headers = HeaderMap::new();

        let prepared = if self.request_mode {
            let raw = RawRequest::parse(probe, self.config.force_ssl)?;
            for (name, value) in &raw.headers {
                // reqwest derives Host and Content-Length from the target.
                if name.eq_ignore_ascii_case("host") || name.eq_ignore_ascii_case("content-length") {
                    continue;
                }
                match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                    (Ok(name), Ok(value)) => {
                        headers.insert(name, value);
                    }
                    _ => log::debug!("skipping unusable header '{}'", name),
                }
            }
            PreparedRequest {
                target: raw.url,
                method: raw.method,
                headers,
                body: raw.body,
            }
        } else {
            PreparedRequest {
                target: probe.to_string(),
                method: RequestMethod::Get,
                headers,
                body: String::new(),
            }
        };

        Ok(self.with_user_agent(prepared))
    }

    fn with_user_agent(&self, mut prepared: PreparedRequest) -> PreparedRequest {
        if !prepared.headers.contains_key(USER_AGENT) {
            if let Ok(agent) = HeaderValue::from_str(self.user_agent()) {
                prepared.headers.insert(USER_AGENT, agent);
            }
        }
        prepared
    }

    async fn send_via(&self, route: &[Client], prepared: &PreparedRequest) -> Result<reqwest::Response> {
        let mut last_error = None;
        for client in route {
            let request = match prepared.method {
                RequestMethod::Post => client.post(&prepared.target).body(prepared.body.clone()),
                RequestMethod::Get => client.get(&prepared.target),
            };
            match request.headers(prepared.headers.clone()).send().await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_connect() => {
                    log::debug!("connect failed for {}, trying next proxy scheme: {}", prepared.target, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(ProbevolveError::Fetch(format!("{}: {}", prepared.target, e))),
            }
        }
        Err(ProbevolveError::Fetch(match last_error {
            Some(e) => format!("{}: {}", prepared.target, e),
            None => format!("{}: no client available", prepared.target),
        }))
    }

    /// Fetches `CHECK_TOR_URL` through every route. Any route that cannot
    /// reach the page, or reaches it outside Tor, fails the check.
    pub async fn check_tor(&self) -> Result<()> {
        for route in &self.routes {
            let prepared = self.with_user_agent(PreparedRequest {
                target: CHECK_TOR_URL.to_string(),
                method: RequestMethod::Get,
                headers: HeaderMap::new(),
                body: String::new(),
            });
            let response = self.send_via(route, &prepared).await.map_err(|e| {
                ProbevolveError::Configuration(format!("Tor check failed: {}", e))
            })?;
            let status = response.status();
            let body = response.text().await.map_err(|e| {
                ProbevolveError::Configuration(format!("Tor check failed: {}", e))
            })?;
            tor_check_verdict(status, &body)?;
        }
        log::info!("Tor check validated");
        Ok(())
    }
}

fn read_proxy_list(path: &Path) -> Result<Vec<Vec<String>>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        ProbevolveError::Configuration(format!("Invalid proxy list file {}: {}", path.display(), e))
    })?;
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(proxy_urls)
        .collect()
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, probe: &str) -> Result<Option<String>> {
        let prepared = self.prepare(probe)?;
        let response = self.send_via(self.pick_route(), &prepared).await?;
        let target = prepared.target;
        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = if self.config.brute_mode && status == StatusCode::OK {
            response
                .text()
                .await
                .map_err(|e| ProbevolveError::Fetch(format!("{}: {}", target, e)))?
        } else {
            String::new()
        };

        log::debug!("{} -> {}", target, status);
        resolve_outcome(&self.config, &target, status, location.as_deref(), &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_title() {
        let body = "<html><head>\n<TITLE>\n  Secret Page </TITLE></head></html>";
        assert_eq!(extract_title(body).as_deref(), Some("Secret Page"));
        assert_eq!(extract_title("<html><body>none</body></html>"), None);
    }

    #[test]
    fn test_redirect_outcome_is_location() {
        let config = FetchConfig::default();
        let outcome = resolve_outcome(
            &config,
            "http://sho.rt/abc",
            StatusCode::MOVED_PERMANENTLY,
            Some("https://long.example.com/page"),
            "",
        )
        .unwrap();
        assert_eq!(outcome.as_deref(), Some("https://long.example.com/page"));
    }

    #[test]
    fn test_brute_outcome_prefers_title_then_target() {
        let config = FetchConfig::default();
        let titled = resolve_outcome(
            &config,
            "http://t/x",
            StatusCode::OK,
            None,
            "<title>Invoice 42</title>",
        )
        .unwrap();
        assert_eq!(titled.as_deref(), Some("Invoice 42"));

        let untitled = resolve_outcome(&config, "http://t/x", StatusCode::OK, None, "<p>hi</p>").unwrap();
        assert_eq!(untitled.as_deref(), Some("http://t/x"));
    }

    #[test]
    fn test_captcha_page_is_absent() {
        let config = FetchConfig::default();
        let outcome = resolve_outcome(
            &config,
            "http://t/x",
            StatusCode::OK,
            None,
            "<div class=\"g-recaptcha\"></div>",
        )
        .unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn test_not_found_is_absent() {
        let config = FetchConfig::default();
        let outcome = resolve_outcome(&config, "http://t/x", StatusCode::NOT_FOUND, None, "").unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn test_forbidden_with_stop_on_block_is_fatal() {
        let config = FetchConfig {
            stop_on_block: true,
            ..Default::default()
        };
        let err = resolve_outcome(&config, "http://t/x", StatusCode::FORBIDDEN, None, "").unwrap_err();
        assert!(matches!(err, ProbevolveError::Blocked(_)));
        assert!(err.is_fatal());

        let lenient = FetchConfig::default();
        assert!(resolve_outcome(&lenient, "http://t/x", StatusCode::FORBIDDEN, None, "")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_http_fetcher_builds_with_proxy() {
        let config = FetchConfig {
            proxy: Some("127.0.0.1:8080".to_string()),
            ..Default::default()
        };
        let fetcher = HttpFetcher::new(config, false).unwrap();
        assert_eq!(fetcher.routes.len(), 1);
        // SOCKS first, HTTP when the connection fails.
        assert_eq!(fetcher.routes[0].len(), 2);
    }

    #[test]
    fn test_http_fetcher_builds_with_socks_proxy() {
        let config = FetchConfig {
            proxy: Some("socks5://127.0.0.1:9050".to_string()),
            ..Default::default()
        };
        let fetcher = HttpFetcher::new(config, false).unwrap();
        assert_eq!(fetcher.routes.len(), 1);
        assert_eq!(fetcher.routes[0].len(), 1);
    }

    #[test]
    fn test_http_fetcher_builds_from_proxy_list() {
        let dir = tempfile::TempDir::new().unwrap();
        let list = dir.path().join("proxies.txt");
        std::fs::write(&list, "10.0.0.1:9050\n\nsocks5h://10.0.0.2:1080\n").unwrap();
        let config = FetchConfig {
            proxy_list: Some(list),
            ..Default::default()
        };
        let fetcher = HttpFetcher::new(config, false).unwrap();
        assert_eq!(fetcher.routes.len(), 2);
    }

    #[test]
    fn test_tor_check_verdict() {
        let using_tor = "<h1 class=\"not\">Congratulations. This browser is configured to use Tor.</h1>";
        assert!(tor_check_verdict(StatusCode::OK, using_tor).is_ok());

        let outside = "<h1 class=\"off\">Sorry. You are not using Tor.</h1>";
        let err = tor_check_verdict(StatusCode::OK, outside).unwrap_err();
        assert!(matches!(err, ProbevolveError::Configuration(_)));
        assert!(err.is_fatal());

        assert!(tor_check_verdict(StatusCode::FOUND, using_tor).is_err());
    }
}
