use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::Error;

/// Sentinel value in 32-bit size/offset fields indicating the real value
/// lives in a ZIP64 structure.
pub(crate) const ZIP64_SENTINEL: u64 = 0xFFFF_FFFF;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
pub(crate) struct EndOfCentralDirectory {
    pub total_entries: u16,
    pub central_dir_size: u32,
    pub central_dir_offset: u32,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(Error::InvalidTrailer(
                "malformed end of central directory record".into(),
            ));
        }
        Self::decode(&data[4..]).map_err(|_| {
            Error::InvalidTrailer("malformed end of central directory record".into())
        })
    }

    fn decode(data: &[u8]) -> std::io::Result<Self> {
        let mut cursor = Cursor::new(data);
        let _disk_number = cursor.read_u16::<LittleEndian>()?;
        let _disk_with_cd = cursor.read_u16::<LittleEndian>()?;
        let _disk_entries = cursor.read_u16::<LittleEndian>()?;
        Ok(Self {
            total_entries: cursor.read_u16::<LittleEndian>()?,
            central_dir_size: cursor.read_u32::<LittleEndian>()?,
            central_dir_offset: cursor.read_u32::<LittleEndian>()?,
        })
    }

    /// Any sentinel field means the real values live in a ZIP64 EOCD.
    pub fn is_zip64(&self) -> bool {
        self.total_entries == 0xFFFF
            || u64::from(self.central_dir_size) == ZIP64_SENTINEL
            || u64::from(self.central_dir_offset) == ZIP64_SENTINEL
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub(crate) struct Zip64EocdLocator {
    pub eocd64_offset: u64,
}

impl Zip64EocdLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(Error::InvalidZip64Locator);
        }
        Self::decode(&data[4..]).map_err(|_| Error::InvalidZip64Locator)
    }

    fn decode(data: &[u8]) -> std::io::Result<Self> {
        let mut cursor = Cursor::new(data);
        let _disk_with_eocd64 = cursor.read_u32::<LittleEndian>()?;
        Ok(Self {
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
pub(crate) struct Zip64Eocd {
    pub total_entries: u64,
    pub central_dir_size: u64,
    pub central_dir_offset: u64,
}

impl Zip64Eocd {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        if data.len() < Self::MIN_SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(Error::InvalidZip64Eocd);
        }
        Self::decode(&data[4..]).map_err(|_| Error::InvalidZip64Eocd)
    }

    fn decode(data: &[u8]) -> std::io::Result<Self> {
        let mut cursor = Cursor::new(data);
        let _eocd64_size = cursor.read_u64::<LittleEndian>()?;
        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let _disk_number = cursor.read_u32::<LittleEndian>()?;
        let _disk_with_cd = cursor.read_u32::<LittleEndian>()?;
        let total_entries = cursor.read_u64::<LittleEndian>()?;
        let _disk_entries = cursor.read_u64::<LittleEndian>()?;
        Ok(Self {
            total_entries,
            central_dir_size: cursor.read_u64::<LittleEndian>()?,
            central_dir_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub(crate) const CENTRAL_HEADER_SIGNATURE: &[u8] = b"PK\x01\x02";
pub(crate) const CENTRAL_HEADER_SIZE: usize = 46;

/// The subset of the Local File Header needed to locate member data.
///
/// Filename and extra-field lengths in the local header may differ from the
/// central directory values, so the payload offset can only be computed from
/// a fresh read of this record.
pub(crate) struct LocalFileHeader {
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub file_name_length: u16,
    pub extra_field_length: u16,
}

impl LocalFileHeader {
    pub const SIGNATURE: &'static [u8] = b"PK\x03\x04";
    pub const SIZE: usize = 30;

    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(Error::InvalidLocalHeader);
        }
        Self::decode(&data[4..]).map_err(|_| Error::InvalidLocalHeader)
    }

    fn decode(data: &[u8]) -> std::io::Result<Self> {
        let mut cursor = Cursor::new(data);
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let _flags = cursor.read_u16::<LittleEndian>()?;
        let _compression_method = cursor.read_u16::<LittleEndian>()?;
        let _last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let _last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let _crc32 = cursor.read_u32::<LittleEndian>()?;
        Ok(Self {
            compressed_size: u64::from(cursor.read_u32::<LittleEndian>()?),
            uncompressed_size: u64::from(cursor.read_u32::<LittleEndian>()?),
            file_name_length: cursor.read_u16::<LittleEndian>()?,
            extra_field_length: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// Streaming-format archives leave zero sizes in the local header (the
    /// real values follow the payload in a data descriptor), and ZIP64
    /// archives may leave sentinels. Either way the central directory value
    /// is authoritative.
    pub fn needs_size_fallback(&self) -> bool {
        self.compressed_size == ZIP64_SENTINEL
            || self.uncompressed_size == ZIP64_SENTINEL
            || self.compressed_size == 0
            || self.uncompressed_size == 0
    }
}

/// One member of the archive, as recorded in its central directory entry.
#[derive(Debug, Clone)]
pub struct ZipEntry {
    /// Member path inside the archive, `/`-separated.
    pub name: String,
    /// Absolute offset of the member's local file header.
    pub local_header_offset: u64,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub compression_method: CompressionMethod,
    /// CRC-32 of the uncompressed data, as stored. Not verified on extraction.
    pub crc32: u32,
    pub is_directory: bool,
    /// Filename length recorded in the central directory entry.
    pub file_name_length: u16,
    /// Extra-field length recorded in the central directory entry.
    pub extra_field_length: u16,
}
