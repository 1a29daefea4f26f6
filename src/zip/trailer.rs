//! Trailer discovery: locating the End of Central Directory record and
//! following the ZIP64 locator chain.
//!
//! The EOCD sits at the end of the archive behind a comment of up to 65535
//! bytes, so its position is found by fetching a growing suffix of the
//! archive and scanning backwards for the signature. ZIP64 archives mark the
//! 32-bit EOCD fields with sentinels and store the real values in a separate
//! record reached through a fixed-size locator.

use tracing::debug;

use crate::error::Error;
use crate::http::RangeClient;
use crate::zip::structures::{EndOfCentralDirectory, Zip64Eocd, Zip64EocdLocator};

/// Initial suffix window for the EOCD scan.
const INITIAL_SEARCH_SIZE: u64 = 1024;

/// The EOCD starts at most this far from the end of the archive: a
/// maximum-length comment plus the record itself.
const MAX_SEARCH_SIZE: u64 = u16::MAX as u64 + EndOfCentralDirectory::SIZE as u64;

/// Where the central directory lives, as resolved from the trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CentralDirectoryLocation {
    pub offset: u64,
    pub size: u64,
    pub total_entries: u64,
}

/// Resolve the central directory location by scanning the archive suffix.
///
/// The window starts at 1 KiB and doubles until the EOCD is found or the
/// maximum comment span is exhausted, which yields [`Error::EocdNotFound`].
pub(crate) async fn locate_central_directory(
    http: &RangeClient,
    archive_size: u64,
) -> Result<CentralDirectoryLocation, Error> {
    if archive_size < EndOfCentralDirectory::SIZE as u64 {
        return Err(Error::EocdNotFound);
    }

    let limit = MAX_SEARCH_SIZE.min(archive_size);
    let mut window = INITIAL_SEARCH_SIZE.min(limit);
    loop {
        let start = archive_size - window;
        debug!(window, start, "scanning archive suffix for trailer");
        let buf = http.fetch_range(start, archive_size - 1).await?;

        if let Some(pos) = scan_eocd(&buf) {
            let eocd = EndOfCentralDirectory::from_bytes(&buf[pos..])?;
            let eocd_offset = start + pos as u64;
            debug!(
                eocd_offset,
                total_entries = eocd.total_entries,
                "found end of central directory record"
            );

            if eocd.is_zip64() {
                debug!("ZIP64 sentinels present, following locator chain");
                return read_zip64_trailer(http, archive_size, eocd_offset).await;
            }

            let location = CentralDirectoryLocation {
                offset: u64::from(eocd.central_dir_offset),
                size: u64::from(eocd.central_dir_size),
                total_entries: u64::from(eocd.total_entries),
            };
            validate_geometry(location, archive_size)?;
            return Ok(location);
        }

        if window == limit {
            return Err(Error::EocdNotFound);
        }
        window = (window * 2).min(limit);
    }
}

/// Backwards scan of `buf` (which ends at the archive's last byte) for a
/// plausible EOCD.
///
/// A candidate must carry the signature, a complete 22-byte record, and a
/// comment-length field that accounts for every byte after the record. The
/// last condition rejects signature look-alikes inside the comment, so the
/// scan keeps walking toward the true record below them.
fn scan_eocd(buf: &[u8]) -> Option<usize> {
    let len = buf.len();
    if len < EndOfCentralDirectory::SIZE {
        return None;
    }
    for i in (0..=len - EndOfCentralDirectory::SIZE).rev() {
        if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
            let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
            if i + EndOfCentralDirectory::SIZE + comment_len == len {
                return Some(i);
            }
        }
    }
    None
}

/// Follow the ZIP64 locator chain: the 20-byte locator immediately precedes
/// the EOCD and holds the absolute offset of the 56-byte ZIP64 EOCD.
async fn read_zip64_trailer(
    http: &RangeClient,
    archive_size: u64,
    eocd_offset: u64,
) -> Result<CentralDirectoryLocation, Error> {
    if eocd_offset < Zip64EocdLocator::SIZE as u64 {
        return Err(Error::InvalidZip64Locator);
    }
    let locator_start = eocd_offset - Zip64EocdLocator::SIZE as u64;
    let locator_buf = http.fetch_range(locator_start, eocd_offset - 1).await?;
    let locator = Zip64EocdLocator::from_bytes(&locator_buf)?;
    debug!(eocd64_offset = locator.eocd64_offset, "found ZIP64 locator");

    let eocd64_start = locator.eocd64_offset;
    let eocd64_len = Zip64Eocd::MIN_SIZE as u64;
    if eocd64_start
        .checked_add(eocd64_len)
        .is_none_or(|end| end > archive_size)
    {
        return Err(Error::InvalidZip64Eocd);
    }
    let eocd64_buf = http
        .fetch_range(eocd64_start, eocd64_start + eocd64_len - 1)
        .await?;
    let eocd64 = Zip64Eocd::from_bytes(&eocd64_buf)?;

    let location = CentralDirectoryLocation {
        offset: eocd64.central_dir_offset,
        size: eocd64.central_dir_size,
        total_entries: eocd64.total_entries,
    };
    validate_geometry(location, archive_size)?;
    Ok(location)
}

fn validate_geometry(
    location: CentralDirectoryLocation,
    archive_size: u64,
) -> Result<(), Error> {
    if location.offset >= archive_size {
        return Err(Error::InvalidTrailer(format!(
            "central directory offset {} is beyond the archive ({} bytes)",
            location.offset, archive_size
        )));
    }
    if location.size > archive_size {
        return Err(Error::InvalidTrailer(format!(
            "central directory size {} exceeds the archive ({} bytes)",
            location.size, archive_size
        )));
    }
    if location
        .offset
        .checked_add(location.size)
        .is_none_or(|end| end > archive_size)
    {
        return Err(Error::InvalidTrailer(
            "central directory extends beyond the archive".into(),
        ));
    }
    Ok(())
}
