use crate::config::QueueAssignment;
use crate::{UrlError, UrlResult};
use url::Url;

/// Parses a string into an absolute http(s) URI with a host
///
/// # Arguments
///
/// * `input` - The URI string
///
/// # Returns
///
/// * `Ok(Url)` - A URI the frontier can queue
/// * `Err(UrlError)` - The string is not an absolute http(s) URI
pub fn parse_absolute(input: &str) -> UrlResult<Url> {
    let uri = Url::parse(input).map_err(|e| UrlError::Parse(format!("{}: {}", input, e)))?;
    match uri.scheme() {
        "http" | "https" => {}
        other => return Err(UrlError::InvalidScheme(other.to_string())),
    }
    if uri.host_str().is_none() {
        return Err(UrlError::MissingHost(input.to_string()));
    }
    Ok(uri)
}

/// Returns the lowercase host of a URI
pub fn host_key(uri: &Url) -> UrlResult<String> {
    uri.host_str()
        .map(|h| h.to_lowercase())
        .ok_or_else(|| UrlError::MissingHost(uri.to_string()))
}

/// Returns `host[:port]`, with the port only when it is not the scheme default
///
/// This names a single server: robots.txt and server quotas are tracked per
/// authority regardless of how queues are assigned.
pub fn authority_key(uri: &Url) -> UrlResult<String> {
    let host = host_key(uri)?;
    Ok(match uri.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

/// Returns the class key naming the politeness queue a URI belongs to
///
/// # Examples
///
/// ```
/// use sumi_frontier::config::QueueAssignment;
/// use sumi_frontier::url::class_key;
/// use url::Url;
///
/// let uri = Url::parse("http://Example.COM:8080/a").unwrap();
/// assert_eq!(class_key(&uri, QueueAssignment::HostnamePort).unwrap(), "example.com:8080");
/// assert_eq!(class_key(&uri, QueueAssignment::Hostname).unwrap(), "example.com");
/// ```
pub fn class_key(uri: &Url, assignment: QueueAssignment) -> UrlResult<String> {
    match assignment {
        QueueAssignment::HostnamePort => authority_key(uri),
        QueueAssignment::Hostname => host_key(uri),
    }
}

/// Returns the robots.txt URI governing the given URI's server
pub fn robots_uri(uri: &Url) -> UrlResult<Url> {
    let authority = authority_key(uri)?;
    let raw = format!("{}://{}/robots.txt", uri.scheme(), authority);
    Url::parse(&raw).map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))
}
