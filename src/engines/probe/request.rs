//! Parsing of raw HTTP request templates (as captured by an intercepting
//! proxy) so they can be replayed with a generated piece substituted in.

use crate::error::{ProbevolveError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequest {
    pub method: RequestMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RawRequest {
    /// The request line decides the method and resource, the `Host` header the
    /// target. Header lines run until the first line without `": "`; whatever
    /// follows is the body.
    pub fn parse(raw: &str, force_ssl: bool) -> Result<Self> {
        let lines: Vec<&str> = raw.lines().collect();
        let request_line = lines
            .first()
            .ok_or_else(|| ProbevolveError::Fetch("empty request template".to_string()))?;

        let method = if request_line.contains("POST") {
            RequestMethod::Post
        } else {
            RequestMethod::Get
        };

        let resource = match (request_line.find('/'), request_line.rfind(' ')) {
            (Some(start), Some(end)) if start < end => &request_line[start..end],
            _ => {
                return Err(ProbevolveError::Fetch(format!(
                    "could not parse resource from request line '{}'",
                    request_line
                )))
            }
        };

        let header_end = lines
            .iter()
            .skip(1)
            .position(|line| !line.contains(": "))
            .map(|pos| pos + 1)
            .unwrap_or(lines.len());

        let headers: Vec<(String, String)> = lines[1..header_end]
            .iter()
            .filter_map(|line| line.split_once(": "))
            .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
            .collect();

        let host = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("host"))
            .map(|(_, value)| value.clone())
            .ok_or_else(|| ProbevolveError::Fetch("request template has no Host header".to_string()))?;

        let scheme = if force_ssl { "https" } else { "http" };
        let body = lines[header_end..]
            .iter()
            .skip_while(|line| line.trim().is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("\n");

        Ok(Self {
            method,
            url: format!("{}://{}{}", scheme, host, resource),
            headers,
            body,
        })
    }
}
