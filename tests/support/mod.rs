//! Test harness: an in-memory ZIP writer and a localhost HTTP server that
//! honors HEAD and Range requests.

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::read::DeflateEncoder;
use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

const LOCAL_HEADER_SIGNATURE: &[u8] = b"PK\x03\x04";
const CENTRAL_HEADER_SIGNATURE: &[u8] = b"PK\x01\x02";
const EOCD_SIGNATURE: &[u8] = b"PK\x05\x06";
const ZIP64_EOCD_SIGNATURE: &[u8] = b"PK\x06\x06";
const ZIP64_LOCATOR_SIGNATURE: &[u8] = b"PK\x06\x07";

/// Builds ZIP archives byte by byte, so the fixtures exercise exactly the
/// record layouts the library parses.
pub struct ArchiveBuilder {
    data: Vec<u8>,
    central: Vec<u8>,
    count: u64,
    comment: Vec<u8>,
    zip64_members: bool,
    zip64_trailer: bool,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            central: Vec::new(),
            count: 0,
            comment: Vec::new(),
            zip64_members: false,
            zip64_trailer: false,
        }
    }

    /// Append an archive comment after the end of central directory record.
    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    /// Write `0xFFFFFFFF` sentinels in the central directory size/offset
    /// slots and carry the real values in a `0x0001` extra field.
    pub fn zip64_members(mut self) -> Self {
        self.zip64_members = true;
        self
    }

    /// Write a ZIP64 end of central directory record and locator, with
    /// sentinels in the standard record.
    pub fn zip64_trailer(mut self) -> Self {
        self.zip64_trailer = true;
        self
    }

    /// Add a member without compression.
    pub fn stored(mut self, name: &str, content: &[u8]) -> Self {
        self.add_member(name, content, 0, 0);
        self
    }

    /// Add a member compressed with raw DEFLATE.
    pub fn deflated(mut self, name: &str, content: &[u8]) -> Self {
        self.add_member(name, content, 8, 0);
        self
    }

    /// Add a directory marker (name must end with `/`).
    pub fn directory(mut self, name: &str) -> Self {
        self.add_member(name, b"", 0, 0x10);
        self
    }

    fn add_member(&mut self, name: &str, content: &[u8], method: u16, external_attributes: u32) {
        let payload = match method {
            8 => {
                let mut encoder = DeflateEncoder::new(content, Compression::default());
                let mut compressed = Vec::new();
                encoder.read_to_end(&mut compressed).unwrap();
                compressed
            }
            _ => content.to_vec(),
        };
        let crc = crc32fast::hash(content);
        let offset = self.data.len() as u64;

        // Local file header.
        self.data.extend_from_slice(LOCAL_HEADER_SIGNATURE);
        self.data.write_u16::<LittleEndian>(20).unwrap(); // version needed
        self.data.write_u16::<LittleEndian>(0).unwrap(); // flags
        self.data.write_u16::<LittleEndian>(method).unwrap();
        self.data.write_u16::<LittleEndian>(0).unwrap(); // mod time
        self.data.write_u16::<LittleEndian>(0).unwrap(); // mod date
        self.data.write_u32::<LittleEndian>(crc).unwrap();
        self.data
            .write_u32::<LittleEndian>(payload.len() as u32)
            .unwrap();
        self.data
            .write_u32::<LittleEndian>(content.len() as u32)
            .unwrap();
        self.data
            .write_u16::<LittleEndian>(name.len() as u16)
            .unwrap();
        self.data.write_u16::<LittleEndian>(0).unwrap(); // extra length
        self.data.extend_from_slice(name.as_bytes());
        self.data.extend_from_slice(&payload);

        // Central directory record.
        let mut extra = Vec::new();
        if self.zip64_members {
            extra.write_u16::<LittleEndian>(0x0001).unwrap();
            extra.write_u16::<LittleEndian>(24).unwrap();
            extra.write_u64::<LittleEndian>(content.len() as u64).unwrap();
            extra.write_u64::<LittleEndian>(payload.len() as u64).unwrap();
            extra.write_u64::<LittleEndian>(offset).unwrap();
        }

        self.central.extend_from_slice(CENTRAL_HEADER_SIGNATURE);
        self.central.write_u16::<LittleEndian>(20).unwrap(); // version made by
        self.central.write_u16::<LittleEndian>(20).unwrap(); // version needed
        self.central.write_u16::<LittleEndian>(0).unwrap(); // flags
        self.central.write_u16::<LittleEndian>(method).unwrap();
        self.central.write_u16::<LittleEndian>(0).unwrap(); // mod time
        self.central.write_u16::<LittleEndian>(0).unwrap(); // mod date
        self.central.write_u32::<LittleEndian>(crc).unwrap();
        if self.zip64_members {
            self.central.write_u32::<LittleEndian>(u32::MAX).unwrap();
            self.central.write_u32::<LittleEndian>(u32::MAX).unwrap();
        } else {
            self.central
                .write_u32::<LittleEndian>(payload.len() as u32)
                .unwrap();
            self.central
                .write_u32::<LittleEndian>(content.len() as u32)
                .unwrap();
        }
        self.central
            .write_u16::<LittleEndian>(name.len() as u16)
            .unwrap();
        self.central
            .write_u16::<LittleEndian>(extra.len() as u16)
            .unwrap();
        self.central.write_u16::<LittleEndian>(0).unwrap(); // comment length
        self.central.write_u16::<LittleEndian>(0).unwrap(); // disk number
        self.central.write_u16::<LittleEndian>(0).unwrap(); // internal attributes
        self.central
            .write_u32::<LittleEndian>(external_attributes)
            .unwrap();
        if self.zip64_members {
            self.central.write_u32::<LittleEndian>(u32::MAX).unwrap();
        } else {
            self.central.write_u32::<LittleEndian>(offset as u32).unwrap();
        }
        self.central.extend_from_slice(name.as_bytes());
        self.central.extend_from_slice(&extra);

        self.count += 1;
    }

    pub fn build(self) -> Vec<u8> {
        let mut archive = self.data;
        let cd_offset = archive.len() as u64;
        let cd_size = self.central.len() as u64;
        archive.extend_from_slice(&self.central);

        if self.zip64_trailer {
            let eocd64_offset = archive.len() as u64;

            archive.extend_from_slice(ZIP64_EOCD_SIGNATURE);
            archive.write_u64::<LittleEndian>(44).unwrap(); // remaining record size
            archive.write_u16::<LittleEndian>(45).unwrap(); // version made by
            archive.write_u16::<LittleEndian>(45).unwrap(); // version needed
            archive.write_u32::<LittleEndian>(0).unwrap(); // disk number
            archive.write_u32::<LittleEndian>(0).unwrap(); // central directory disk
            archive.write_u64::<LittleEndian>(self.count).unwrap();
            archive.write_u64::<LittleEndian>(self.count).unwrap();
            archive.write_u64::<LittleEndian>(cd_size).unwrap();
            archive.write_u64::<LittleEndian>(cd_offset).unwrap();

            archive.extend_from_slice(ZIP64_LOCATOR_SIGNATURE);
            archive.write_u32::<LittleEndian>(0).unwrap(); // disk with the ZIP64 EOCD
            archive.write_u64::<LittleEndian>(eocd64_offset).unwrap();
            archive.write_u32::<LittleEndian>(1).unwrap(); // total disks

            archive.extend_from_slice(EOCD_SIGNATURE);
            archive.write_u16::<LittleEndian>(0).unwrap();
            archive.write_u16::<LittleEndian>(0).unwrap();
            archive.write_u16::<LittleEndian>(0xFFFF).unwrap();
            archive.write_u16::<LittleEndian>(0xFFFF).unwrap();
            archive.write_u32::<LittleEndian>(u32::MAX).unwrap();
            archive.write_u32::<LittleEndian>(u32::MAX).unwrap();
        } else {
            archive.extend_from_slice(EOCD_SIGNATURE);
            archive.write_u16::<LittleEndian>(0).unwrap(); // disk number
            archive.write_u16::<LittleEndian>(0).unwrap(); // central directory disk
            archive
                .write_u16::<LittleEndian>(self.count as u16)
                .unwrap();
            archive
                .write_u16::<LittleEndian>(self.count as u16)
                .unwrap();
            archive.write_u32::<LittleEndian>(cd_size as u32).unwrap();
            archive.write_u32::<LittleEndian>(cd_offset as u32).unwrap();
        }
        archive
            .write_u16::<LittleEndian>(self.comment.len() as u16)
            .unwrap();
        archive.extend_from_slice(&self.comment);
        archive
    }
}

/// Switches for misbehaving-server scenarios.
pub struct ServerConfig {
    /// When false, every GET answers 200 with the full archive, ignoring
    /// the Range header.
    pub range_support: bool,
    /// When false, HEAD responses omit Content-Length.
    pub send_content_length: bool,
    /// When set, requests must carry exactly this Authorization header.
    pub authorization: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            range_support: true,
            send_content_length: true,
            authorization: None,
        }
    }
}

/// Minimal HTTP/1.1 server for one archive at `/archive.zip`.
pub struct TestServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(archive: Vec<u8>) -> Self {
        Self::start_with(archive, ServerConfig::default()).await
    }

    pub async fn start_with(archive: Vec<u8>, config: ServerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new((archive, config));

        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    let _ = serve_connection(stream, &shared.0, &shared.1).await;
                });
            }
        });

        Self { addr, handle }
    }

    pub fn url(&self) -> String {
        format!("http://{}/archive.zip", self.addr)
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    archive: &[u8],
    config: &ServerConfig,
) -> std::io::Result<()> {
    use tokio::io::AsyncReadExt;
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        // Requests here carry no body, so the head ends the request.
        while find_header_end(&buf).is_none() {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Ok(());
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let end = find_header_end(&buf).unwrap();
        let head = String::from_utf8_lossy(&buf[..end]).into_owned();
        buf.drain(..end + 4);
        respond(&mut stream, &head, archive, config).await?;
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|window| window == b"\r\n\r\n")
}

async fn respond(
    stream: &mut TcpStream,
    head: &str,
    archive: &[u8],
    config: &ServerConfig,
) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let path = parts.next().unwrap_or_default();

    let header = |name: &str| {
        head.lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.trim().to_string())
    };

    if let Some(expected) = &config.authorization {
        if header("authorization").as_deref() != Some(expected) {
            return write_status(stream, "401 Unauthorized").await;
        }
    }

    if path != "/archive.zip" {
        return write_status(stream, "404 Not Found").await;
    }

    match method {
        "HEAD" => {
            let mut response = String::from("HTTP/1.1 200 OK\r\nAccept-Ranges: bytes\r\n");
            if config.send_content_length {
                response.push_str(&format!("Content-Length: {}\r\n", archive.len()));
            }
            response.push_str("\r\n");
            stream.write_all(response.as_bytes()).await
        }
        "GET" => {
            let range = header("range").filter(|_| config.range_support);
            match range {
                Some(range) => match parse_range(&range, archive.len() as u64) {
                    Some((start, end)) => {
                        let body = &archive[start as usize..=end as usize];
                        let response = format!(
                            "HTTP/1.1 206 Partial Content\r\nAccept-Ranges: bytes\r\n\
                             Content-Range: bytes {start}-{end}/{}\r\nContent-Length: {}\r\n\r\n",
                            archive.len(),
                            body.len()
                        );
                        stream.write_all(response.as_bytes()).await?;
                        stream.write_all(body).await
                    }
                    None => write_status(stream, "416 Range Not Satisfiable").await,
                },
                None => {
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n",
                        archive.len()
                    );
                    stream.write_all(response.as_bytes()).await?;
                    stream.write_all(archive).await
                }
            }
        }
        _ => write_status(stream, "405 Method Not Allowed").await,
    }
}

async fn write_status(stream: &mut TcpStream, status: &str) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;
    stream
        .write_all(format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\n\r\n").as_bytes())
        .await
}

/// Parse `bytes=S-E`, clamping the end to the archive size.
fn parse_range(value: &str, len: u64) -> Option<(u64, u64)> {
    let spec = value.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start: u64 = start.parse().ok()?;
    let end: u64 = end.parse().ok()?;
    let end = end.min(len.saturating_sub(1));
    if start > end || start >= len {
        return None;
    }
    Some((start, end))
}
