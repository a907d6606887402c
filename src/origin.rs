//! Origins: the unit of trust for every check in this crate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

use crate::error::OriginError;

/// A scheme + host + port triple.
///
/// Two origins are equal iff all three components match exactly after
/// normalisation (lowercase scheme and host, default port made explicit).
/// There is no wildcard or prefix matching anywhere in this type.
///
/// # Examples
///
/// ```
/// use frame_handshake::Origin;
///
/// let merchant = Origin::parse("http://localhost:3000").unwrap();
/// assert_eq!(merchant, Origin::parse("HTTP://LocalHost:3000/").unwrap());
/// assert_ne!(merchant, Origin::parse("http://localhost:30000").unwrap());
/// assert_eq!(merchant.to_string(), "http://localhost:3000");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    scheme: String,
    host: String,
    port: u16,
}

impl Origin {
    /// Parses an origin string such as `https://pay.example:8443`.
    ///
    /// A single trailing `/` is tolerated; any other path, query or
    /// fragment is an error since it is not part of an origin.
    pub fn parse(input: &str) -> Result<Self, OriginError> {
        let url = parse_absolute(input)?;
        if !matches!(url.path(), "" | "/") || url.query().is_some() || url.fragment().is_some() {
            return Err(OriginError::new(input, "origin must not carry a path"));
        }
        Self::from_url(input, &url)
    }

    /// Splits a full URL into its origin and the remaining path (with query).
    ///
    /// The returned path always starts with `/`. Fragments are dropped.
    ///
    /// ```
    /// use frame_handshake::Origin;
    ///
    /// let (origin, path) = Origin::split_url("http://localhost:3005/cardFields?nonce=abc").unwrap();
    /// assert_eq!(origin.to_string(), "http://localhost:3005");
    /// assert_eq!(path, "/cardFields?nonce=abc");
    /// ```
    pub fn split_url(input: &str) -> Result<(Self, String), OriginError> {
        let url = parse_absolute(input)?;
        let origin = Self::from_url(input, &url)?;
        let mut path = match url.path() {
            "" => "/".to_string(),
            p if p.starts_with('/') => p.to_string(),
            p => format!("/{}", p),
        };
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        Ok((origin, path))
    }

    fn from_url(input: &str, url: &Url) -> Result<Self, OriginError> {
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| OriginError::new(input, "missing host"))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| OriginError::new(input, "no port and no default for scheme"))?;
        Ok(Self {
            scheme: url.scheme().to_string(),
            host: host.to_ascii_lowercase(),
            port,
        })
    }

    /// Builds an origin from already-normalised parts.
    pub(crate) fn from_parts(scheme: String, host: String, port: u16) -> Self {
        Self { scheme, host, port }
    }

    /// Returns the scheme, lowercased.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Returns the host, lowercased.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port, with scheme defaults made explicit.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Builds an absolute URL under this origin.
    pub fn join(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self, path)
        } else {
            format!("{}/{}", self, path)
        }
    }
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        "ftp" => Some(21),
        _ => None,
    }
}

// Scheme and host come back lowercased; userinfo is refused outright
fn parse_absolute(input: &str) -> Result<Url, OriginError> {
    let url = Url::parse(input).map_err(|e| OriginError::from_url(input, e))?;
    if !url.username().is_empty() || url.password().is_some() {
        return Err(OriginError::new(input, "userinfo is not allowed"));
    }
    Ok(url)
}

impl fmt::Display for Origin {
    /// ASCII serialisation: the default port is omitted, as browsers do.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if default_port(&self.scheme) == Some(self.port) {
            write!(f, "{}://{}", self.scheme, self.host)
        } else {
            write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
        }
    }
}

impl FromStr for Origin {
    type Err = OriginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Origin::parse(s)
    }
}

impl Serialize for Origin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Origin {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Origin::parse(&raw).map_err(serde::de::Error::custom)
    }
}
