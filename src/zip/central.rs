//! Central directory parsing and the member index.

use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use tracing::{debug, warn};

use crate::error::Error;
use crate::zip::structures::{
    CENTRAL_HEADER_SIGNATURE, CENTRAL_HEADER_SIZE, CompressionMethod, ZIP64_SENTINEL, ZipEntry,
};

/// ZIP64 extended-information extra field.
const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Directory flag in the external attributes (MS-DOS attribute bits).
const DOS_DIRECTORY_BIT: u32 = 0x10;

/// Name-to-entry mapping in central directory order.
///
/// Built once during initialization and never mutated afterwards, so lookups
/// and listings need no locking. On a duplicate name the later record wins,
/// keeping the first occurrence's position in the listing.
#[derive(Debug, Default)]
pub(crate) struct Index {
    names: Vec<String>,
    entries: HashMap<String, ZipEntry>,
}

impl Index {
    fn insert(&mut self, entry: ZipEntry) {
        let name = entry.name.clone();
        if self.entries.insert(name.clone(), entry).is_some() {
            warn!(%name, "duplicate member name, keeping the later record");
        } else {
            self.names.push(name);
        }
    }

    /// Member names in the order their records appear in the central directory.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Exact, byte-for-byte name lookup.
    pub fn get(&self, name: &str) -> Option<&ZipEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}

/// Parse the central directory blob into an index.
///
/// Records are walked in order; the first position without a valid signature
/// ends iteration, which tolerates trailing padding after the last entry. A
/// record whose variable-length tail is cut off by the end of the blob is a
/// hard error.
pub(crate) fn parse_central_directory(data: &[u8]) -> Result<Index, Error> {
    let mut index = Index::default();
    let mut cursor = Cursor::new(data);

    loop {
        let pos = cursor.position() as usize;
        if data.len() - pos < CENTRAL_HEADER_SIZE || &data[pos..pos + 4] != CENTRAL_HEADER_SIGNATURE
        {
            break;
        }
        let entry = parse_record(&mut cursor)
            .map_err(|_| Error::InvalidTrailer("truncated central directory record".into()))?;
        index.insert(entry);
    }

    debug!(members = index.len(), "parsed central directory");
    Ok(index)
}

/// Parse one central directory file header, leaving the cursor at the start
/// of the next record.
fn parse_record(cursor: &mut Cursor<&[u8]>) -> std::io::Result<ZipEntry> {
    let mut signature = [0u8; 4];
    cursor.read_exact(&mut signature)?;

    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let _flags = cursor.read_u16::<LittleEndian>()?;
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    let _last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let _last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let mut compressed_size = u64::from(cursor.read_u32::<LittleEndian>()?);
    let mut uncompressed_size = u64::from(cursor.read_u32::<LittleEndian>()?);
    let file_name_length = cursor.read_u16::<LittleEndian>()?;
    let extra_field_length = cursor.read_u16::<LittleEndian>()?;
    let file_comment_length = cursor.read_u16::<LittleEndian>()?;
    let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attributes = cursor.read_u16::<LittleEndian>()?;
    let external_attributes = cursor.read_u32::<LittleEndian>()?;
    let mut local_header_offset = u64::from(cursor.read_u32::<LittleEndian>()?);

    // The whole variable-length tail must fit inside the blob.
    let tail =
        file_name_length as u64 + extra_field_length as u64 + file_comment_length as u64;
    let remaining = cursor.get_ref().len() as u64 - cursor.position();
    if tail > remaining {
        return Err(std::io::ErrorKind::UnexpectedEof.into());
    }

    let mut name_bytes = vec![0u8; file_name_length as usize];
    cursor.read_exact(&mut name_bytes)?;
    let name = String::from_utf8_lossy(&name_bytes).into_owned();

    let mut extra = vec![0u8; extra_field_length as usize];
    cursor.read_exact(&mut extra)?;

    // Sentinel 32-bit fields mean the real values live in the 0x0001 extra
    // field, as consecutive 8-byte values in this fixed order, each present
    // only when its central directory field holds the sentinel.
    if compressed_size == ZIP64_SENTINEL
        || uncompressed_size == ZIP64_SENTINEL
        || local_header_offset == ZIP64_SENTINEL
    {
        let mut ex = Cursor::new(extra.as_slice());
        while ex.position() + 4 <= extra.len() as u64 {
            let header_id = ex.read_u16::<LittleEndian>()?;
            let data_size = u64::from(ex.read_u16::<LittleEndian>()?);
            if header_id == ZIP64_EXTRA_ID {
                let field_end = ex.position() + data_size;
                if uncompressed_size == ZIP64_SENTINEL && ex.position() + 8 <= field_end {
                    uncompressed_size = ex.read_u64::<LittleEndian>()?;
                }
                if compressed_size == ZIP64_SENTINEL && ex.position() + 8 <= field_end {
                    compressed_size = ex.read_u64::<LittleEndian>()?;
                }
                if local_header_offset == ZIP64_SENTINEL && ex.position() + 8 <= field_end {
                    local_header_offset = ex.read_u64::<LittleEndian>()?;
                }
                break;
            }
            ex.set_position(ex.position() + data_size);
        }
    }

    // The file comment is not used.
    cursor.set_position(cursor.position() + file_comment_length as u64);

    let is_directory = name.ends_with('/') || external_attributes & DOS_DIRECTORY_BIT != 0;

    Ok(ZipEntry {
        name,
        local_header_offset,
        compressed_size,
        uncompressed_size,
        compression_method: CompressionMethod::from_u16(compression_method),
        crc32,
        is_directory,
        file_name_length,
        extra_field_length,
    })
}
