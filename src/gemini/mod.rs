//! Gemini protocol client
//!
//! One request/response transaction per connection: the client opens a
//! TLS 1.2+ stream, sends `URL\r\n`, and reads a `CODE META\r\n` status
//! line followed by an optional body. Server certificates are pinned per
//! host on first contact; the transaction whose response is inspected is
//! always issued against an already-pinned host.

mod tofu;

pub use tofu::{CertStore, TofuVerifier};

use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use url::Url;

use crate::url::{normalize_url, GEMINI_DEFAULT_PORT};

/// Redirect chains longer than this are abandoned
pub const MAX_REDIRECTS: usize = 5;

/// Wall-clock budget for one transaction (including the pinning round)
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Status line cap: two digits, a space, up to 1024 bytes of meta, CRLF
const MAX_HEADER_LEN: usize = 2 + 1 + 1024 + 2;

/// Response status classes, by the decimal tens digit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Input,
    Success,
    Redirect,
    TempFailure,
    PermFailure,
}

/// A Gemini response: numeric status, meta line, optional body
#[derive(Debug, Clone)]
pub struct Response {
    pub code: u16,
    pub meta: String,
    pub body: Vec<u8>,
}

impl Response {
    pub fn class(&self) -> Option<StatusClass> {
        match self.code / 10 {
            1 => Some(StatusClass::Input),
            2 => Some(StatusClass::Success),
            3 => Some(StatusClass::Redirect),
            4 => Some(StatusClass::TempFailure),
            5 => Some(StatusClass::PermFailure),
            _ => None,
        }
    }

    /// Status 44 carries a retry-after value in seconds in its meta
    pub fn is_slowdown(&self) -> bool {
        self.code == 44
    }
}

/// Errors raised by Gemini transactions
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("URL has no host")]
    MissingHost,

    #[error("Cannot resolve host {0}")]
    Dns(String),

    #[error("Connection failed: {0}")]
    Connect(std::io::Error),

    #[error("TLS error: {0}")]
    Tls(std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid response header")]
    InvalidHeader,

    #[error("Invalid redirect target '{0}'")]
    InvalidRedirect(String),

    #[error("Too many redirects")]
    TooManyRedirects,

    #[error("Non-text document: {0}")]
    NonText(String),
}

impl GeminiError {
    /// Permanent network errors get the long retry interval: hosts that
    /// don't resolve, or are unroutable.
    pub fn is_permanent(&self) -> bool {
        match self {
            GeminiError::Dns(_) => true,
            GeminiError::Connect(e) => {
                e.kind() == std::io::ErrorKind::HostUnreachable
                    || e.to_string().contains("No route to host")
            }
            _ => false,
        }
    }
}

/// Gemini protocol client with trust-on-first-use certificate pinning
#[derive(Clone)]
pub struct Client {
    certs: CertStore,
}

impl Client {
    pub fn new(certs: CertStore) -> Self {
        Self { certs }
    }

    /// Performs one transaction against a host whose certificate is
    /// pinned first if necessary. When the host is unknown, a pinning
    /// transaction runs and its response is discarded; the returned
    /// response always comes from a connection verified against the
    /// pinned certificate.
    pub async fn request(&self, url: &Url) -> Result<Response, GeminiError> {
        let host = url.host_str().ok_or(GeminiError::MissingHost)?.to_string();
        if !self.certs.contains(&host) {
            let _ = self.request_once(url).await?;
        }
        self.request_once(url).await
    }

    /// Performs a transaction following up to [`MAX_REDIRECTS`]
    /// redirects, each target re-normalized. Returns the final response
    /// together with the URL it came from. A 2x response with a
    /// non-text media type is an error.
    pub async fn fetch(&self, url: &Url) -> Result<(Response, Url), GeminiError> {
        let mut current = url.clone();
        let mut redirects = 0usize;

        loop {
            let response = tokio::time::timeout(REQUEST_TIMEOUT, self.request(&current))
                .await
                .map_err(|_| GeminiError::Timeout)??;

            match response.class() {
                Some(StatusClass::Redirect) => {
                    redirects += 1;
                    if redirects >= MAX_REDIRECTS {
                        return Err(GeminiError::TooManyRedirects);
                    }

                    let target = current
                        .join(&response.meta)
                        .map_err(|_| GeminiError::InvalidRedirect(response.meta.clone()))?;
                    tracing::debug!("Redirecting to {} (from {})", target, current);
                    current = normalize_url(&target).unwrap_or(target);
                }
                Some(StatusClass::Success) => {
                    if !response.meta.starts_with("text/") {
                        return Err(GeminiError::NonText(response.meta));
                    }
                    return Ok((response, current));
                }
                _ => return Ok((response, current)),
            }
        }
    }

    async fn request_once(&self, url: &Url) -> Result<Response, GeminiError> {
        let host = url.host_str().ok_or(GeminiError::MissingHost)?.to_string();
        let port = url.port().unwrap_or(GEMINI_DEFAULT_PORT);

        let addr = tokio::net::lookup_host((host.as_str(), port))
            .await
            .map_err(|_| GeminiError::Dns(host.clone()))?
            .next()
            .ok_or_else(|| GeminiError::Dns(host.clone()))?;

        let tcp = TcpStream::connect(addr)
            .await
            .map_err(GeminiError::Connect)?;

        let config = ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(TofuVerifier::new(
                &host,
                self.certs.clone(),
            )))
            .with_no_client_auth();
        let connector = TlsConnector::from(Arc::new(config));
        let server_name = ServerName::try_from(host.clone())
            .map_err(|_| GeminiError::Dns(host.clone()))?;

        let mut stream = connector
            .connect(server_name, tcp)
            .await
            .map_err(GeminiError::Tls)?;

        stream.write_all(url.as_str().as_bytes()).await?;
        stream.write_all(b"\r\n").await?;
        stream.flush().await?;

        let mut raw = Vec::with_capacity(256);
        let mut byte = [0u8; 1];
        loop {
            let n = stream.read(&mut byte).await?;
            if n == 0 {
                return Err(GeminiError::InvalidHeader);
            }
            if byte[0] == b'\n' {
                break;
            }
            raw.push(byte[0]);
            if raw.len() > MAX_HEADER_LEN {
                return Err(GeminiError::InvalidHeader);
            }
        }

        let (code, meta) = parse_header(&raw)?;

        let mut body = Vec::new();
        if code / 10 == 2 {
            stream.read_to_end(&mut body).await?;
        }

        Ok(Response { code, meta, body })
    }
}

/// Parses a status line (without the trailing newline): two ASCII
/// digits, then optionally a space and the meta text.
fn parse_header(raw: &[u8]) -> Result<(u16, String), GeminiError> {
    if raw.len() < 2 || !raw[0].is_ascii_digit() || !raw[1].is_ascii_digit() {
        return Err(GeminiError::InvalidHeader);
    }
    let code = u16::from(raw[0] - b'0') * 10 + u16::from(raw[1] - b'0');

    let rest = std::str::from_utf8(&raw[2..])
        .map_err(|_| GeminiError::InvalidHeader)?
        .trim_end_matches('\r');
    let meta = rest.strip_prefix(' ').unwrap_or(rest).to_string();
    Ok((code, meta))
}
