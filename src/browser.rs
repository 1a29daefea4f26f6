//! High-level browsing API: builder/initialization, member listing and
//! extraction.
//!
//! A [`ZipBrowser`] is constructed once through its builder, which probes the
//! archive size, resolves the trailer, and downloads and parses the central
//! directory. After that every member lookup is served from the in-memory
//! index; extracting a member costs one range request for the local file
//! header and one for the compressed payload.
//!
//! ## Example
//!
//! ```no_run
//! use zipbrowse::ZipBrowser;
//!
//! # async fn example() -> Result<(), zipbrowse::Error> {
//! let browser = ZipBrowser::builder("https://example.com/archive.zip")
//!     .build()
//!     .await?;
//!
//! for name in browser.list().await? {
//!     println!("{name}");
//! }
//!
//! if let Some(member) = browser.get("README.md").await? {
//!     let data = member.read_to_vec()?;
//!     println!("{} bytes", data.len());
//! }
//! # Ok(())
//! # }
//! ```

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use base64::prelude::*;
use bytes::{Buf, Bytes};
use flate2::read::DeflateDecoder;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::Error;
use crate::http::RangeClient;
use crate::zip::central::{Index, parse_central_directory};
use crate::zip::structures::{CompressionMethod, LocalFileHeader, ZipEntry};
use crate::zip::trailer::locate_central_directory;

/// Configures and initializes a [`ZipBrowser`].
///
/// Obtained from [`ZipBrowser::builder`]. All options have defaults; only the
/// archive URL is required.
pub struct ZipBrowserBuilder {
    url: String,
    client: Option<Client>,
    credentials: Option<(String, String)>,
}

impl ZipBrowserBuilder {
    fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: None,
            credentials: None,
        }
    }

    /// Attach HTTP Basic authentication to every request.
    pub fn basic_auth(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some((username.to_owned(), password.to_owned()));
        self
    }

    /// Replace the default HTTP client.
    ///
    /// The default client uses HTTP/1.1 and a 30-second request timeout.
    pub fn http_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Probe the archive size, resolve the trailer, and parse the central
    /// directory, returning a browser ready for lookups.
    pub async fn build(self) -> Result<ZipBrowser, Error> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .http1_only()
                .timeout(Duration::from_secs(30))
                .build()?,
        };
        let auth = self.credentials.map(|(username, password)| {
            format!(
                "Basic {}",
                BASE64_STANDARD.encode(format!("{username}:{password}"))
            )
        });
        let http = RangeClient::new(client, self.url, auth);

        let archive_size = http.probe_size().await?;
        let location = locate_central_directory(&http, archive_size).await?;

        let index = if location.size == 0 {
            Index::default()
        } else {
            let blob = http
                .fetch_range(location.offset, location.offset + location.size - 1)
                .await?;
            parse_central_directory(&blob)?
        };
        debug!(
            archive_size,
            declared_entries = location.total_entries,
            members = index.len(),
            "browser ready"
        );

        Ok(ZipBrowser {
            http,
            archive_size,
            index,
            closed: AtomicBool::new(false),
        })
    }
}

/// A remote ZIP archive, indexed and ready for member extraction.
///
/// The index is immutable after construction, so a browser can serve
/// concurrent [`get`](Self::get) calls without coordination; they share only
/// the HTTP client.
#[derive(Debug)]
pub struct ZipBrowser {
    http: RangeClient,
    archive_size: u64,
    index: Index,
    closed: AtomicBool,
}

impl ZipBrowser {
    /// Start configuring a browser for the archive at `url`.
    pub fn builder(url: impl Into<String>) -> ZipBrowserBuilder {
        ZipBrowserBuilder::new(url)
    }

    /// Total size of the remote archive in bytes.
    ///
    /// A plain value captured during initialization; readable even after
    /// [`close`](Self::close).
    pub fn size(&self) -> u64 {
        self.archive_size
    }

    /// Member names in central directory order.
    ///
    /// Completes immediately from the pre-built index without further I/O;
    /// fails only with [`Error::BrowserClosed`].
    pub async fn list(&self) -> Result<Vec<String>, Error> {
        self.ensure_open()?;
        Ok(self.index.names().to_vec())
    }

    /// Central directory metadata for `name`, including the stored CRC-32.
    pub fn entry(&self, name: &str) -> Result<Option<&ZipEntry>, Error> {
        self.ensure_open()?;
        Ok(self.index.get(name))
    }

    /// Fetch and decompress the member `name`.
    ///
    /// Returns `Ok(None)` when the archive has no such member or when the
    /// name refers to a directory entry. A failure extracting one member
    /// leaves the browser usable for others.
    pub async fn get(&self, name: &str) -> Result<Option<MemberReader>, Error> {
        self.ensure_open()?;

        let Some(entry) = self.index.get(name) else {
            debug!(name, "member not found");
            return Ok(None);
        };
        if entry.is_directory {
            debug!(name, "member is a directory");
            return Ok(None);
        }

        let payload = self.fetch_member_data(entry).await?;
        Ok(Some(MemberReader::new(payload, entry)))
    }

    /// Reject all further [`list`](Self::list) and [`get`](Self::get) calls.
    ///
    /// Idempotent. An extraction already in flight is allowed to finish; no
    /// resources other than the shared HTTP client are held, so this is
    /// purely a latch.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.closed.load(Ordering::SeqCst) {
            Err(Error::BrowserClosed)
        } else {
            Ok(())
        }
    }

    /// Re-read the local file header, reconcile the payload length, and
    /// fetch the compressed bytes.
    async fn fetch_member_data(&self, entry: &ZipEntry) -> Result<Bytes, Error> {
        let header_start = entry.local_header_offset;
        let header = self
            .http
            .fetch_range(header_start, header_start + LocalFileHeader::SIZE as u64 - 1)
            .await?;
        let local = LocalFileHeader::from_bytes(&header)?;

        let payload_len = if local.needs_size_fallback() {
            debug!(
                name = %entry.name,
                "local header sizes unusable, using central directory size"
            );
            entry.compressed_size
        } else {
            local.compressed_size
        };

        let payload_start = header_start
            + LocalFileHeader::SIZE as u64
            + u64::from(local.file_name_length)
            + u64::from(local.extra_field_length);

        // An inclusive byte range cannot express zero bytes.
        if payload_len == 0 {
            return Ok(Bytes::new());
        }

        debug!(
            name = %entry.name,
            payload_start,
            payload_len,
            "fetching member payload"
        );
        self.http
            .fetch_range(payload_start, payload_start + payload_len - 1)
            .await
    }
}

/// Decompressed member contents, read lazily.
///
/// Stored members read straight from the fetched bytes; deflated members run
/// a raw DEFLATE decoder on demand. A corrupt stream surfaces as an I/O error
/// from [`Read`], or as [`Error::DecompressionFailed`] from
/// [`read_to_vec`](Self::read_to_vec).
pub struct MemberReader {
    inner: Inner,
    uncompressed_size: u64,
}

enum Inner {
    Raw(bytes::buf::Reader<Bytes>),
    Deflate(DeflateDecoder<bytes::buf::Reader<Bytes>>),
}

impl MemberReader {
    fn new(payload: Bytes, entry: &ZipEntry) -> Self {
        let inner = match entry.compression_method {
            CompressionMethod::Stored => Inner::Raw(payload.reader()),
            // Raw DEFLATE: ZIP payloads carry no zlib header or trailer.
            CompressionMethod::Deflate => Inner::Deflate(DeflateDecoder::new(payload.reader())),
            CompressionMethod::Unknown(method) => {
                warn!(
                    name = %entry.name,
                    method,
                    "unknown compression method, returning raw bytes"
                );
                Inner::Raw(payload.reader())
            }
        };
        Self {
            inner,
            uncompressed_size: entry.uncompressed_size,
        }
    }

    /// Uncompressed size recorded in the central directory.
    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    /// Read the whole member into memory.
    pub fn read_to_vec(mut self) -> Result<Vec<u8>, Error> {
        let mut data = Vec::with_capacity(self.uncompressed_size as usize);
        self.read_to_end(&mut data)
            .map_err(Error::DecompressionFailed)?;
        Ok(data)
    }
}

impl Read for MemberReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            Inner::Raw(reader) => reader.read(buf),
            Inner::Deflate(decoder) => decoder.read(buf),
        }
    }
}
