use thiserror::Error;

/// The `Error` enum defines all failure modes of browsing a remote archive.
#[derive(Debug, Error)]
pub enum Error {
    /// The server answered a range request with `200 OK` and the whole file.
    ///
    /// This is fatal: slicing a full-archive body would defeat the point of
    /// range-based browsing, so the response body is never read.
    #[error("server does not support HTTP Range requests (got 200, expected 206)")]
    RangeUnsupported,

    /// Any other non-success status, from any request.
    #[error("HTTP request failed with status: {0}")]
    HttpStatus(u16),

    /// The size probe got a response without a `Content-Length` header.
    #[error("server did not provide a Content-Length header")]
    MissingContentLength,

    /// The size probe got a `Content-Length` header that is not a number.
    #[error("invalid Content-Length header: {0:?}")]
    MalformedContentLength(String),

    /// The backwards scan exhausted the maximum comment span without finding
    /// an end of central directory signature.
    #[error("end of central directory record not found")]
    EocdNotFound,

    /// Trailer field values fail the archive geometry checks, or a central
    /// directory record is cut short.
    #[error("invalid archive trailer: {0}")]
    InvalidTrailer(String),

    /// Signature mismatch or undersized ZIP64 end of central directory locator.
    #[error("invalid ZIP64 end of central directory locator")]
    InvalidZip64Locator,

    /// Signature mismatch or undersized ZIP64 end of central directory record.
    #[error("invalid ZIP64 end of central directory record")]
    InvalidZip64Eocd,

    /// Local file header signature mismatch during extraction.
    #[error("invalid local file header")]
    InvalidLocalHeader,

    /// Operation on a closed browser.
    #[error("browser is closed")]
    BrowserClosed,

    /// The DEFLATE stream of a member is corrupt.
    #[error("failed to decompress member data")]
    DecompressionFailed(#[source] std::io::Error),

    /// Connection-level failure from the HTTP client (timeout, DNS,
    /// connection refused).
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}
