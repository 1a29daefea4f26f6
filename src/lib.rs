//! # zipbrowse
//!
//! Browse and extract individual members of a remote ZIP archive over HTTP,
//! without downloading the whole file.
//!
//! ZIP archives keep their index (the central directory) at the end of the
//! file. This library fetches only that trailer via HTTP Range requests,
//! builds an in-memory member index, and then serves each extraction with one
//! request for the member's local header and one for its compressed payload.
//! The remote server must support Range requests and report `Content-Length`.
//!
//! ## Features
//!
//! - List member names without downloading the archive
//! - Extract single members, stored (uncompressed) or DEFLATE-compressed
//! - ZIP64 support for archives and members beyond the 32-bit limits
//! - HTTP Basic authentication and pluggable `reqwest` clients
//!
//! ## Example
//!
//! ```no_run
//! use zipbrowse::ZipBrowser;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), zipbrowse::Error> {
//!     let browser = ZipBrowser::builder("https://example.com/archive.zip")
//!         .build()
//!         .await?;
//!
//!     println!("archive is {} bytes", browser.size());
//!     for name in browser.list().await? {
//!         println!("{name}");
//!     }
//!
//!     if let Some(member) = browser.get("docs/README.md").await? {
//!         let data = member.read_to_vec()?;
//!         println!("{}", String::from_utf8_lossy(&data));
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod browser;
pub mod cli;
pub mod error;
mod http;
pub mod zip;

pub use browser::{MemberReader, ZipBrowser, ZipBrowserBuilder};
pub use cli::Cli;
pub use error::Error;
pub use zip::{CompressionMethod, ZipEntry};
