//! Deploy boundary: size ceiling, content hash and the deploy capability

use crate::config::DeploySection;
use crate::{BundleError, BundleResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Publishes a finished document and returns its links
pub trait Deployer {
    /// Submit the document; the error is an opaque reason from the service
    fn deploy(&self, html: &str) -> Result<Vec<String>, String>;
}

/// Reject documents larger than `limit` bytes
pub fn check_size(html: &str, limit: usize) -> BundleResult<()> {
    let size = html.len();
    if size > limit {
        return Err(BundleError::SizeExceeded { size, limit });
    }
    Ok(())
}

/// Short content hash of a document (first 64 bits of BLAKE3, 16 hex chars)
pub fn content_hash(html: &str) -> String {
    let hash = blake3::hash(html.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash.as_bytes()[..8]);
    format!("{:016x}", u64::from_le_bytes(prefix))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeployRequest<'a> {
    html: &'a str,
    content_hash: String,
}

#[derive(Deserialize, Default)]
struct DeployResponse {
    #[serde(default)]
    links: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Deploys by POSTing JSON to an HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpDeployer {
    endpoint: String,
    timeout: Duration,
    user_agent: String,
}

impl HttpDeployer {
    /// Create a deployer for an endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: Duration::from_secs(60),
            user_agent: format!("singlefile-pack/{}", crate::VERSION),
        }
    }

    /// Create a deployer from the `[deploy]` section, if an endpoint is set
    pub fn from_config(config: &DeploySection) -> Option<Self> {
        config.endpoint.as_ref().map(Self::new)
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Deployer for HttpDeployer {
    fn deploy(&self, html: &str) -> Result<Vec<String>, String> {
        let body = serde_json::to_string(&DeployRequest {
            html,
            content_hash: content_hash(html),
        })
        .map_err(|e| format!("Failed to encode request: {}", e))?;

        let agent = ureq::AgentBuilder::new()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build();

        let response = match agent
            .post(&self.endpoint)
            .set("content-type", "application/json")
            .send_string(&body)
        {
            Ok(response) => response,
            // a failing status may still carry a JSON reason
            Err(ureq::Error::Status(code, response)) => {
                let text = response.into_string().unwrap_or_default();
                let reason = serde_json::from_str::<DeployResponse>(&text)
                    .ok()
                    .and_then(|r| r.error)
                    .unwrap_or(text);
                return Err(format!("HTTP {}: {}", code, reason));
            }
            Err(e) => return Err(e.to_string()),
        };

        let text = response
            .into_string()
            .map_err(|e| format!("Failed to read response: {}", e))?;
        parse_response(&text)
    }
}

fn parse_response(text: &str) -> Result<Vec<String>, String> {
    let response: DeployResponse =
        serde_json::from_str(text).map_err(|e| format!("Unexpected response: {}", e))?;

    if let Some(error) = response.error {
        return Err(error);
    }
    if response.links.is_empty() {
        return Err("Deploy service returned no links".to_string());
    }
    Ok(response.links)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_size() {
        assert!(check_size("abc", 3).is_ok());
        match check_size("abcd", 3) {
            Err(BundleError::SizeExceeded { size, limit }) => {
                assert_eq!(size, 4);
                assert_eq!(limit, 3);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_content_hash() {
        let hash = content_hash("<html></html>");
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, content_hash("<html></html>"));
        assert_ne!(hash, content_hash("<html> </html>"));
    }

    #[test]
    fn test_parse_response() {
        assert_eq!(
            parse_response(r#"{"links":["https://a.example/x"]}"#).unwrap(),
            vec!["https://a.example/x".to_string()]
        );
        assert_eq!(parse_response(r#"{"error":"quota"}"#).unwrap_err(), "quota");
        assert!(parse_response(r#"{"links":[]}"#).is_err());
        assert!(parse_response("not json").is_err());
    }

    #[test]
    fn test_from_config() {
        assert!(HttpDeployer::from_config(&DeploySection::default()).is_none());
        let section = DeploySection {
            endpoint: Some("https://deploy.example/api".to_string()),
            ..Default::default()
        };
        let deployer = HttpDeployer::from_config(&section).unwrap();
        assert_eq!(deployer.endpoint(), "https://deploy.example/api");
    }
}
