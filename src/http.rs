//! HTTP collaborator: byte-range fetches and the size probe.
//!
//! Every suspension point of the crate lives here. One call is one HTTP
//! request; there is no retry loop, so cancelling the returned future aborts
//! the request and callers can impose their own deadlines.

use bytes::Bytes;
use reqwest::{Client, StatusCode, header};
use tracing::debug;

use crate::error::Error;

/// User-Agent sent with every request.
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Issues requests against a single archive URL.
///
/// Stateless apart from its configuration, so it is safe to share across
/// concurrent extractions.
#[derive(Debug)]
pub(crate) struct RangeClient {
    client: Client,
    url: String,
    /// Pre-encoded `Basic <credential>` header value, attached to every request.
    auth: Option<String>,
}

impl RangeClient {
    pub fn new(client: Client, url: String, auth: Option<String>) -> Self {
        Self { client, url, auth }
    }

    /// Fetch the inclusive byte window `[start, end]`.
    ///
    /// A 206 response yields exactly `end - start + 1` bytes. A 200 response
    /// means the server ignored the `Range` header and is sending the whole
    /// archive; that is a fatal [`Error::RangeUnsupported`] and the body is
    /// never read.
    pub async fn fetch_range(&self, start: u64, end: u64) -> Result<Bytes, Error> {
        debug_assert!(start <= end);
        let range = format!("bytes={start}-{end}");
        debug!(%range, "sending range request");

        let mut request = self
            .client
            .get(&self.url)
            .header(header::RANGE, &range)
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::ACCEPT, "*/*");
        if let Some(auth) = &self.auth {
            request = request.header(header::AUTHORIZATION, auth);
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::PARTIAL_CONTENT => {
                let body = response.bytes().await?;
                debug!(len = body.len(), "received partial content");
                Ok(body)
            }
            StatusCode::OK => Err(Error::RangeUnsupported),
            status => Err(Error::HttpStatus(status.as_u16())),
        }
    }

    /// Determine the total archive length from a HEAD request's
    /// `Content-Length` header.
    pub async fn probe_size(&self) -> Result<u64, Error> {
        let mut request = self
            .client
            .head(&self.url)
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::ACCEPT, "*/*");
        if let Some(auth) = &self.auth {
            request = request.header(header::AUTHORIZATION, auth);
        }

        let response = request.send().await?;
        if response.status() != StatusCode::OK {
            return Err(Error::HttpStatus(response.status().as_u16()));
        }

        let value = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .ok_or(Error::MissingContentLength)?;
        let size = value
            .to_str()
            .ok()
            .and_then(|text| text.parse::<u64>().ok())
            .ok_or_else(|| Error::MalformedContentLength(format!("{value:?}")))?;
        debug!(size, "probed archive size");
        Ok(size)
    }
}
