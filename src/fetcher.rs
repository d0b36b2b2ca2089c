//! # Remote Metadata Fetching
//!
//! Resolution only needs each module's `ModuleInfo.txt`, not the repository
//! itself, so the fetcher asks the hosting provider's raw-file endpoint for
//! that single file instead of cloning.
//!
//! ## Candidates
//!
//! The exact location of the file is not known up front, so a small ordered
//! list of candidates is tried:
//!
//! - branches: the requested branch (if any), then `main`, then `master`
//! - filenames: `ModuleInfo.txt`, then `moduleInfo.txt`
//!
//! each under the `lib/` directory. The first `200` response wins.
//!
//! ## Outcomes
//!
//! - `Ok(text)`: some candidate returned the document.
//! - `Error::NotFound`: every candidate answered, none with `200`.
//! - `Error::Network`: no candidate succeeded and at least one attempt failed
//!   at the transport level (timeout, DNS, connection refused). Callers treat
//!   this differently from `NotFound`, which just means the module has no
//!   declared info.
//! - `Error::UnsupportedHost`: the address is not on a known provider; no
//!   request is made.
//!
//! The HTTP call sits behind the `HttpTransport` trait so the candidate logic
//! can be tested without a network.

use std::time::Duration;

use log::debug;

use crate::address::{self, Host};
use crate::error::{Error, Result};
use crate::metadata::METADATA_DIR;

/// Default branches tried after the requested one.
pub const FALLBACK_BRANCHES: [&str; 2] = ["main", "master"];

/// Metadata filenames tried on each branch.
pub const CANDIDATE_FILENAMES: [&str; 2] = ["ModuleInfo.txt", "moduleInfo.txt"];

/// Trait for retrieving a module's metadata text - allows mocking in tests
pub trait MetadataSource: Send + Sync {
    /// Fetch the raw metadata document for a repository address.
    fn fetch(&self, address: &str, branch: Option<&str>) -> Result<String>;
}

/// Status and body of a completed HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Trait for a plain unauthenticated GET - allows mocking in tests
///
/// Implementations return `Err` only for transport failures; any HTTP status
/// is an `Ok` response.
pub trait HttpTransport: Send + Sync {
    fn get(&self, url: &str) -> Result<HttpResponse>;
}

/// The default transport, backed by a blocking `reqwest` client.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::Network {
                url: String::new(),
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = self.client.get(url).send().map_err(|e| Error::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let status = response.status().as_u16();
        let body = response.text().map_err(|e| Error::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(HttpResponse { status, body })
    }
}

/// Build the raw-file URL for one candidate, `None` without owner and repository.
fn raw_url(host: Host, segments: &[String], branch: &str, filename: &str) -> Option<String> {
    let (owner, rest) = segments.split_first()?;
    let repo = rest.first()?;
    let url = match host {
        Host::GitHub => format!(
            "https://raw.githubusercontent.com/{}/{}/{}/{}/{}",
            owner, repo, branch, METADATA_DIR, filename
        ),
        Host::GitLab => format!(
            "https://gitlab.com/{}/{}/-/raw/{}/{}/{}",
            owner,
            rest.join("/"),
            branch,
            METADATA_DIR,
            filename
        ),
    };
    Some(url)
}

/// Ordered candidate URLs for an address.
///
/// Fails with `UnsupportedHost` for unknown providers. Addresses without an
/// owner and repository yield no candidates.
pub fn candidate_urls(address: &str, branch: Option<&str>) -> Result<Vec<String>> {
    let host = Host::require(address)?;
    let segments = address::path_segments(address);
    if segments.len() < 2 {
        return Ok(Vec::new());
    }

    let mut branches: Vec<&str> = Vec::new();
    if let Some(b) = branch.filter(|b| !b.is_empty()) {
        branches.push(b);
    }
    branches.extend(FALLBACK_BRANCHES);

    let mut urls = Vec::new();
    for b in branches {
        for filename in CANDIDATE_FILENAMES {
            urls.extend(raw_url(host, &segments, b, filename));
        }
    }
    Ok(urls)
}

/// Fetches metadata over HTTP from a provider's raw-file endpoint.
pub struct HttpMetadataSource {
    transport: Box<dyn HttpTransport>,
}

impl HttpMetadataSource {
    /// Creates a source using `reqwest` with the given per-attempt timeout.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        Ok(Self {
            transport: Box::new(ReqwestTransport::new(timeout, user_agent)?),
        })
    }

    /// Creates a source with a custom transport.
    pub fn with_transport(transport: Box<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

impl MetadataSource for HttpMetadataSource {
    fn fetch(&self, address: &str, branch: Option<&str>) -> Result<String> {
        let urls = candidate_urls(address, branch)?;
        let mut transport_failure: Option<Error> = None;

        for url in urls {
            debug!("Trying {}", url);
            match self.transport.get(&url) {
                Ok(response) if response.status == 200 => {
                    debug!("Found metadata at {}", url);
                    return Ok(response.body);
                }
                Ok(response) => {
                    debug!("  {} -> HTTP {}", url, response.status);
                }
                Err(e) => {
                    debug!("  {} -> {}", url, e);
                    transport_failure = Some(e);
                }
            }
        }

        match transport_failure {
            Some(e @ Error::Network { .. }) => Err(e),
            Some(other) => Err(Error::Network {
                url: address.to_string(),
                message: other.to_string(),
            }),
            None => Err(Error::NotFound {
                address: address.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Mock transport answering from a fixed table
    struct MockTransport {
        responses: HashMap<String, Result<HttpResponse>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                responses: HashMap::new(),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn ok(mut self, url: &str, body: &str) -> Self {
            self.responses.insert(
                url.to_string(),
                Ok(HttpResponse {
                    status: 200,
                    body: body.to_string(),
                }),
            );
            self
        }

        fn status(mut self, url: &str, status: u16) -> Self {
            self.responses.insert(
                url.to_string(),
                Ok(HttpResponse {
                    status,
                    body: String::new(),
                }),
            );
            self
        }

        fn timeout(mut self, url: &str) -> Self {
            self.responses.insert(
                url.to_string(),
                Err(Error::Network {
                    url: url.to_string(),
                    message: "operation timed out".to_string(),
                }),
            );
            self
        }
    }

    impl HttpTransport for MockTransport {
        fn get(&self, url: &str) -> Result<HttpResponse> {
            self.calls.lock().unwrap().push(url.to_string());
            match self.responses.get(url) {
                Some(Ok(response)) => Ok(response.clone()),
                Some(Err(Error::Network { url, message })) => Err(Error::Network {
                    url: url.clone(),
                    message: message.clone(),
                }),
                Some(Err(_)) => unreachable!("mock only stores network errors"),
                None => Ok(HttpResponse {
                    status: 404,
                    body: String::new(),
                }),
            }
        }
    }

    const GH_MAIN: &str = "https://raw.githubusercontent.com/u/frame/main/lib/ModuleInfo.txt";
    const GH_MAIN_LOWER: &str = "https://raw.githubusercontent.com/u/frame/main/lib/moduleInfo.txt";
    const GH_MASTER: &str = "https://raw.githubusercontent.com/u/frame/master/lib/ModuleInfo.txt";

    #[test]
    fn test_candidate_urls_github_order() {
        let urls = candidate_urls("https://github.com/u/frame", Some("dev")).unwrap();
        assert_eq!(
            urls,
            vec![
                "https://raw.githubusercontent.com/u/frame/dev/lib/ModuleInfo.txt",
                "https://raw.githubusercontent.com/u/frame/dev/lib/moduleInfo.txt",
                GH_MAIN,
                GH_MAIN_LOWER,
                GH_MASTER,
                "https://raw.githubusercontent.com/u/frame/master/lib/moduleInfo.txt",
            ]
        );
    }

    #[test]
    fn test_candidate_urls_gitlab_nested_groups() {
        let urls = candidate_urls("https://gitlab.com/group/sub/panels.git", None).unwrap();
        assert_eq!(urls.len(), 4);
        assert_eq!(
            urls[0],
            "https://gitlab.com/group/sub/panels/-/raw/main/lib/ModuleInfo.txt"
        );
    }

    #[test]
    fn test_candidate_urls_unsupported_host() {
        let result = candidate_urls("https://bitbucket.org/u/frame", None);
        assert!(matches!(result, Err(Error::UnsupportedHost { .. })));
    }

    #[test]
    fn test_candidate_urls_without_repository() {
        assert!(candidate_urls("https://github.com/u", None).unwrap().is_empty());
    }

    #[test]
    fn test_raw_url_needs_owner_and_repository() {
        let owner_only = vec!["u".to_string()];
        assert_eq!(raw_url(Host::GitHub, &[], "main", "ModuleInfo.txt"), None);
        assert_eq!(raw_url(Host::GitLab, &owner_only, "main", "ModuleInfo.txt"), None);
        assert_eq!(
            raw_url(
                Host::GitHub,
                &["u".to_string(), "wheels".to_string()],
                "main",
                "ModuleInfo.txt"
            )
            .as_deref(),
            Some("https://raw.githubusercontent.com/u/wheels/main/lib/ModuleInfo.txt")
        );
    }

    #[test]
    fn test_fetch_stops_at_first_success() {
        let transport = MockTransport::new().ok(GH_MAIN_LOWER, "[Module Name] Frame\n");
        let calls = Arc::clone(&transport.calls);
        let source = HttpMetadataSource::with_transport(Box::new(transport));

        let text = source.fetch("https://github.com/u/frame", None).unwrap();
        assert_eq!(text, "[Module Name] Frame\n");
        assert_eq!(*calls.lock().unwrap(), vec![GH_MAIN, GH_MAIN_LOWER]);
    }

    #[test]
    fn test_fetch_not_found_after_all_candidates() {
        let transport = MockTransport::new().status(GH_MAIN, 403);
        let calls = Arc::clone(&transport.calls);
        let source = HttpMetadataSource::with_transport(Box::new(transport));

        let result = source.fetch("https://github.com/u/frame", None);
        assert!(matches!(result, Err(Error::NotFound { .. })));
        assert_eq!(calls.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_fetch_timeout_then_success_is_ok() {
        let transport = MockTransport::new()
            .timeout(GH_MAIN)
            .ok(GH_MASTER, "[Module Name] Old\n");
        let source = HttpMetadataSource::with_transport(Box::new(transport));

        let text = source.fetch("https://github.com/u/frame", None).unwrap();
        assert!(text.contains("Old"));
    }

    #[test]
    fn test_fetch_transport_failure_is_network_error() {
        let transport = MockTransport::new().timeout(GH_MAIN);
        let source = HttpMetadataSource::with_transport(Box::new(transport));

        let result = source.fetch("https://github.com/u/frame", None);
        assert!(matches!(result, Err(Error::Network { .. })));
    }

    #[test]
    fn test_fetch_unsupported_host_makes_no_requests() {
        let transport = MockTransport::new();
        let calls = Arc::clone(&transport.calls);
        let source = HttpMetadataSource::with_transport(Box::new(transport));

        let result = source.fetch("https://example.org/u/frame", None);
        assert!(matches!(result, Err(Error::UnsupportedHost { .. })));
        assert!(calls.lock().unwrap().is_empty());
    }
}
