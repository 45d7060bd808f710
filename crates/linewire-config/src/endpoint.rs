use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// TCP address the daemon listens on.
///
/// Accepts either a `tcp://host:port` URL or a bare `host:port` pair. The host
/// is kept as text; the server validates that it is an IPv4 literal when it
/// binds.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ListenEndpoint {
    /// IPv4 address to bind.
    pub host: String,
    /// TCP port to bind; zero lets the kernel choose.
    pub port: u16,
}

impl ListenEndpoint {
    /// Builds a TCP endpoint.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ListenEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "tcp://{}:{}", self.host, self.port)
    }
}

impl FromStr for ListenEndpoint {
    type Err = EndpointParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.contains("://") {
            return parse_url(input);
        }

        let (host, port) = input
            .rsplit_once(':')
            .ok_or_else(|| EndpointParseError::MissingPort(input.to_owned()))?;
        if host.is_empty() {
            return Err(EndpointParseError::MissingHost(input.to_owned()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| EndpointParseError::InvalidPort(input.to_owned()))?;
        Ok(Self::tcp(host, port))
    }
}

fn parse_url(input: &str) -> Result<ListenEndpoint, EndpointParseError> {
    let url = Url::parse(input)?;
    if url.scheme() != "tcp" {
        return Err(EndpointParseError::UnsupportedScheme(
            url.scheme().to_owned(),
        ));
    }
    let host = url
        .host_str()
        .ok_or_else(|| EndpointParseError::MissingHost(input.to_owned()))?;
    let port = url
        .port()
        .ok_or_else(|| EndpointParseError::MissingPort(input.to_owned()))?;
    Ok(ListenEndpoint::tcp(host, port))
}

/// Errors encountered while parsing a [`ListenEndpoint`] from text.
#[derive(Debug, Error)]
pub enum EndpointParseError {
    /// Scheme other than `tcp` was supplied.
    #[error("unsupported listen scheme '{0}'")]
    UnsupportedScheme(String),
    /// Host part was empty or absent.
    #[error("missing listen host in '{0}'")]
    MissingHost(String),
    /// Port part was absent.
    #[error("missing listen port in '{0}'")]
    MissingPort(String),
    /// Port was not a number in `0..=65535`.
    #[error("invalid listen port in '{0}'")]
    InvalidPort(String),
    /// URL failed to parse.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}
