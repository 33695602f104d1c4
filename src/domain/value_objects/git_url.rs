use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Git URL errors
#[derive(Debug, Error, PartialEq)]
pub enum GitUrlError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(String),

    #[error("Invalid characters in URL: {0}")]
    InvalidCharacters(String),
}

/// Repository location as given by the user.
///
/// Accepts anything git accepts: `http(s)://`, `ssh://`, `git://`, `file://`,
/// scp-like `git@host:path` and plain filesystem paths. Only the scheme is
/// interpreted; the original text is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GitUrl {
    url: String,
    scheme: Option<String>,
}

impl GitUrl {
    pub fn new(url: &str) -> Result<Self, GitUrlError> {
        let trimmed = url.trim();

        if trimmed.is_empty() {
            return Err(GitUrlError::InvalidFormat("Empty URL".to_string()));
        }

        for ch in trimmed.chars() {
            if ch.is_control() {
                return Err(GitUrlError::InvalidCharacters(format!(
                    "Control character detected: {:?}",
                    ch
                )));
            }
        }

        // scp-like and plain paths do not parse as URLs and have no scheme
        let scheme = Url::parse(trimmed)
            .ok()
            .filter(|parsed| parsed.scheme().len() > 1)
            .map(|parsed| parsed.scheme().to_string());

        Ok(Self {
            url: trimmed.to_string(),
            scheme,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// True for `http` and `https` URLs
    pub fn is_remote(&self) -> bool {
        matches!(self.scheme(), Some("http") | Some("https"))
    }

    /// URL with `username:password@` placed in the authority.
    ///
    /// Only http(s) URLs are rewritten; any userinfo already present is
    /// replaced. Every other URL is returned unchanged.
    pub fn with_credentials(&self, username: &str, password: &str) -> String {
        match self.split_authority() {
            Some((prefix, authority, rest)) if self.is_remote() => {
                let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
                format!("{}{}:{}@{}{}", prefix, username, password, host, rest)
            }
            _ => self.url.clone(),
        }
    }

    /// URL with any password in the authority masked, for logging
    pub fn redacted(&self) -> String {
        match self.split_authority() {
            Some((prefix, authority, rest)) => match authority.rsplit_once('@') {
                Some((userinfo, host)) => {
                    let user = userinfo.split(':').next().unwrap_or_default();
                    format!("{}{}:***@{}{}", prefix, user, host, rest)
                }
                None => self.url.clone(),
            },
            None => self.url.clone(),
        }
    }

    /// Split `scheme://authority/rest` into its three parts
    fn split_authority(&self) -> Option<(&str, &str, &str)> {
        let scheme_end = self.url.find("://")? + 3;
        let (prefix, remainder) = self.url.split_at(scheme_end);
        let authority_end = remainder.find('/').unwrap_or(remainder.len());
        let (authority, rest) = remainder.split_at(authority_end);
        Some((prefix, authority, rest))
    }
}

impl fmt::Display for GitUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

impl TryFrom<&str> for GitUrl {
    type Error = GitUrlError;

    fn try_from(url: &str) -> Result<Self, Self::Error> {
        GitUrl::new(url)
    }
}

impl TryFrom<String> for GitUrl {
    type Error = GitUrlError;

    fn try_from(url: String) -> Result<Self, Self::Error> {
        GitUrl::new(&url)
    }
}

impl From<GitUrl> for String {
    fn from(url: GitUrl) -> Self {
        url.url
    }
}
