//! # Repository Address Handling
//!
//! Module addresses come from hand-edited metadata files and are frequently
//! malformed: some carry a branch suffix copied from the browser
//! (`/tree/<branch>` on GitHub, `/-/tree/<branch>` on GitLab), others repeat
//! the scheme or host because they were assembled by string concatenation
//! (`https://github.com/https://github.com/org/repo`).
//!
//! `normalize` turns any of these into a clean address plus an optional
//! branch. It is idempotent, so already-clean addresses pass through
//! unchanged.

use url::Url;

use crate::error::{Error, Result};

const SCHEMES: [&str; 2] = ["https://", "http://"];

/// Hosting providers whose raw-file endpoints the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Host {
    GitHub,
    GitLab,
}

impl Host {
    pub const ALL: [Host; 2] = [Host::GitHub, Host::GitLab];

    /// The domain token used to recognize this host in an address.
    pub fn domain(&self) -> &'static str {
        match self {
            Host::GitHub => "github.com",
            Host::GitLab => "gitlab.com",
        }
    }

    /// Determine the provider of an address.
    ///
    /// The URL's host is checked first; addresses that do not parse as URLs
    /// fall back to a substring check on the domain token.
    pub fn detect(address: &str) -> Option<Host> {
        let with_scheme = ensure_scheme(address);
        if let Ok(url) = Url::parse(&with_scheme) {
            if let Some(host) = url.host_str() {
                let host = host.trim_start_matches("www.");
                return Host::ALL.into_iter().find(|h| host == h.domain());
            }
        }
        Host::ALL
            .into_iter()
            .find(|h| address.contains(h.domain()))
    }

    /// Like `detect`, failing with `UnsupportedHost` for unknown domains.
    pub fn require(address: &str) -> Result<Host> {
        Host::detect(address).ok_or_else(|| Error::UnsupportedHost {
            address: address.to_string(),
        })
    }
}

/// A cleaned address and the branch that was split off it, if any.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedAddress {
    pub address: String,
    pub branch: Option<String>,
}

impl NormalizedAddress {
    /// Render back to a single declared address, branch suffix included.
    ///
    /// `normalize(&n.to_declared()) == n`, which lets a node keep its declared
    /// child addresses in cleaned form without losing their branches.
    pub fn to_declared(&self) -> String {
        match &self.branch {
            None => self.address.clone(),
            Some(branch) => {
                let separator = match Host::detect(&self.address) {
                    Some(Host::GitLab) => "/-/tree/",
                    _ => "/tree/",
                };
                format!(
                    "{}{}{}",
                    self.address,
                    separator,
                    urlencoding::encode(branch)
                )
            }
        }
    }
}

/// Clean a raw address and split off a `/tree/<branch>` suffix.
///
/// Cleaning repeats until nothing changes, so whitespace or slashes exposed
/// by one step are removed by the next. The first branch found wins.
pub fn normalize(raw: &str) -> NormalizedAddress {
    let mut address = raw.to_string();
    let mut branch = None;
    loop {
        let (cleaned, found) = clean_once(&address);
        if branch.is_none() {
            branch = found;
        }
        if cleaned == address {
            break;
        }
        address = cleaned;
    }
    NormalizedAddress { address, branch }
}

/// One cleaning step. Never makes the address longer.
fn clean_once(raw: &str) -> (String, Option<String>) {
    let (rest, branch) = split_branch(raw.trim());

    let mut address = rest.trim().to_string();
    for scheme in SCHEMES {
        address = keep_last_occurrence(&address, scheme, scheme);
    }
    for host in Host::ALL {
        let token = format!("{}/", host.domain());
        address = keep_last_occurrence(&address, host.domain(), &token);
    }

    let address = address
        .trim_end_matches(|c: char| c == '/' || c.is_whitespace())
        .trim_start()
        .to_string();
    (address, branch)
}

/// Split a `/-/tree/<branch>` or `/tree/<branch>` suffix off an address.
///
/// The branch is cut at any query or fragment and URL-decoded.
pub fn split_branch(address: &str) -> (&str, Option<String>) {
    let split = match (address.find("/-/tree/"), address.find("/tree/")) {
        (Some(gitlab), Some(github)) if github < gitlab => address.split_once("/tree/"),
        (Some(_), _) => address.split_once("/-/tree/"),
        (None, _) => address.split_once("/tree/"),
    };

    match split {
        Some((rest, suffix)) => {
            let raw_branch = suffix
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .trim()
                .trim_matches('/');
            let branch = urlencoding::decode(raw_branch)
                .map(|b| b.into_owned())
                .unwrap_or_else(|_| raw_branch.to_string());
            (rest, Some(branch).filter(|b| !b.is_empty()))
        }
        None => (address, None),
    }
}

/// Remove all but the last occurrence of `removal` when `marker` repeats.
fn keep_last_occurrence(address: &str, marker: &str, removal: &str) -> String {
    let count = address.matches(marker).count();
    if count <= 1 {
        return address.to_string();
    }
    address.replacen(removal, "", count - 1)
}

/// Prefix `https://` to addresses written without a scheme.
pub fn ensure_scheme(address: &str) -> String {
    let trimmed = address.trim();
    if SCHEMES.iter().any(|s| trimmed.starts_with(s)) {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Last path segment of an address with any `.git` suffix removed.
pub fn repository_name(address: &str) -> String {
    let trimmed = address.trim().trim_end_matches('/');
    let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}

/// Whether `name` can be used as a directory directly below a project.
///
/// Rejects empty names, `.`, `..`, and anything containing a path separator
/// or NUL, so a working copy can never land outside its project directory.
pub fn is_valid_repository_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty()
        && trimmed != "."
        && trimmed != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// Whether two addresses name the same repository, ignoring scheme, case,
/// branch and a `.git` suffix.
pub fn same_repository(a: &str, b: &str) -> bool {
    fn key(address: &str) -> String {
        let n = normalize(address).address.to_lowercase();
        let n = n.strip_suffix(".git").unwrap_or(&n).to_string();
        SCHEMES
            .iter()
            .find_map(|s| n.strip_prefix(s))
            .unwrap_or(&n)
            .to_string()
    }
    key(a) == key(b)
}

/// `owner/repo...` path segments after the host, without `.git`.
pub fn path_segments(address: &str) -> Vec<String> {
    let with_scheme = ensure_scheme(address);
    let path = match Url::parse(&with_scheme) {
        Ok(url) => url.path().to_string(),
        Err(_) => with_scheme
            .split_once("://")
            .and_then(|(_, rest)| rest.split_once('/'))
            .map(|(_, path)| path.to_string())
            .unwrap_or_default(),
    };

    let mut segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if let Some(last) = segments.last_mut() {
        if let Some(stripped) = last.strip_suffix(".git") {
            *last = stripped.to_string();
        }
    }
    segments
}
