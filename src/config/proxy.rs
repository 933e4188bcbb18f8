//! Proxy URL normalization.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::config::constants::DEFAULT_PROXY_PORT;
use crate::error_handling::ConfigError;

static SCHEME_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\A([a-z][a-z0-9+\-.]*)://").ok());

// Authority (after optional userinfo) ending in an explicit `:port`.
static EXPLICIT_PORT_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\A[a-z][a-z0-9+\-.]*://(?:[^@/]*@)?(?:\[[^\]]*\]|[^:/\[]*):[0-9]+(?:/|\z)")
        .ok()
});

const SUPPORTED_SCHEMES: &[&str] = &["http", "https", "socks5"];

/// Returns true when `value` starts with `scheme://`.
pub(crate) fn has_scheme(value: &str) -> bool {
    SCHEME_RE
        .as_ref()
        .is_some_and(|re| re.is_match(value))
}

/// Builds the proxy URL from the `Proxy` and `ProxyUserPassword` settings.
///
/// - no scheme means `http://`; only `http`, `https` and `socks5` are accepted
/// - a host without a port gets port 1080
/// - credentials embedded in `proxy` win over `user_password`
///
/// An empty `proxy` means no proxy.
pub fn parse_proxy(proxy: &str, user_password: &str) -> Result<Option<Url>, ConfigError> {
    if proxy.is_empty() {
        return Ok(None);
    }

    let scheme = SCHEME_RE
        .as_ref()
        .and_then(|re| re.captures(proxy))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_lowercase());

    let raw = match scheme {
        None => format!("http://{}", proxy),
        Some(scheme) if SUPPORTED_SCHEMES.contains(&scheme.as_str()) => proxy.to_string(),
        Some(scheme) => return Err(ConfigError::UnsupportedProxy(scheme)),
    };

    let mut url = Url::parse(&raw).map_err(|err| ConfigError::InvalidUrl {
        name: "proxy URL",
        err,
    })?;

    let explicit_port = EXPLICIT_PORT_RE
        .as_ref()
        .is_some_and(|re| re.is_match(&raw));
    if url.port().is_none() && !explicit_port {
        url.set_port(Some(DEFAULT_PROXY_PORT))
            .map_err(|()| ConfigError::InvalidUrl {
                name: "proxy URL",
                err: url::ParseError::InvalidPort,
            })?;
    }

    if !url.username().is_empty() || url.password().is_some() || user_password.is_empty() {
        return Ok(Some(url));
    }

    let (user, password) = user_password
        .split_once(':')
        .ok_or(ConfigError::MalformedProxyCredentials)?;
    url.set_username(user)
        .and_then(|()| url.set_password(Some(password)))
        .map_err(|()| ConfigError::MalformedProxyCredentials)?;

    Ok(Some(url))
}
