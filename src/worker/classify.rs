//! Which caching policy applies to an intercepted request.

use reqwest::Method;
use url::Url;

use crate::net::Request;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
  /// Upstream data: network first, cache as fallback
  Api,
  /// App shell and navigations: cache first
  Static,
}

/// Classification rule: reserved path prefix or known provider host.
#[derive(Debug, Clone)]
pub struct Classifier {
  api_prefix: String,
  api_hosts: Vec<String>,
}

impl Classifier {
  pub fn new(api_prefix: impl Into<String>, api_hosts: Vec<String>) -> Self {
    Self {
      api_prefix: api_prefix.into(),
      api_hosts: api_hosts
        .into_iter()
        .map(|h| h.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|h| !h.is_empty())
        .collect(),
    }
  }

  /// `None` means the request is not intercepted at all.
  pub fn classify(&self, request: &Request) -> Option<RequestClass> {
    if *request.method() != Method::GET {
      return None;
    }

    let (host, path) = split_url(request.url());

    let api_path = !self.api_prefix.is_empty() && path.starts_with(&self.api_prefix);
    let api_host = host.is_some_and(|host| self.is_api_host(&host));

    Some(if api_path || api_host {
      RequestClass::Api
    } else {
      RequestClass::Static
    })
  }

  fn is_api_host(&self, host: &str) -> bool {
    self.api_hosts.iter().any(|known| {
      host == known
        || host
          .strip_suffix(known.as_str())
          .is_some_and(|rest| rest.ends_with('.'))
    })
  }
}

/// Host (lowercased) and path of an absolute URL, or just the path of a
/// root-relative one.
fn split_url(url: &str) -> (Option<String>, String) {
  match Url::parse(url) {
    Ok(parsed) => (
      parsed.host_str().map(|h| h.to_ascii_lowercase()),
      parsed.path().to_string(),
    ),
    Err(_) => (
      None,
      url
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or("")
        .to_string(),
    ),
  }
}
