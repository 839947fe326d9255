//! On-disk blob object format.
//!
//! Every stored file becomes one object: a 16-byte header followed by the
//! (possibly compressed) file bytes.
//!
//! ```text
//! 0x00  4   "CAFS" magic
//! 0x04  1   version (u8) = 2
//! 0x05  1   type: 1=blob
//! 0x06  1   algo: 1=blake3-256
//! 0x07  1   compression: 0=none, 1=zstd
//! 0x08  8   payload_len (u64 LE) - stored size
//! 0x10  ... payload
//! ```

use crate::error::{Error, Result};
use crate::hash::Algorithm;

/// Magic bytes at the start of every object file.
pub const MAGIC: &[u8; 4] = b"CAFS";

/// Object format version written by this crate.
pub const VERSION: u8 = 2;

/// Size of the object header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Type byte of a blob object. Blobs are the only objects a site store holds.
const BLOB_TYPE: u8 = 1;

/// Payload compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None = 0,
    Zstd = 1,
}

impl Compression {
    fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Zstd),
            _ => Err(Error::invalid_header(format!(
                "Invalid compression type: {}",
                value
            ))),
        }
    }
}

/// Decoded header of a blob object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHeader {
    pub algorithm: Algorithm,
    pub compression: Compression,
    /// Stored payload length (compressed size when compressed).
    pub payload_len: u64,
}

impl BlobHeader {
    pub fn new(algorithm: Algorithm, compression: Compression, payload_len: u64) -> Self {
        Self {
            algorithm,
            compression,
            payload_len,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(MAGIC);
        buf[4] = VERSION;
        buf[5] = BLOB_TYPE;
        buf[6] = self.algorithm.id();
        buf[7] = self.compression as u8;
        buf[8..16].copy_from_slice(&self.payload_len.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::invalid_header(format!(
                "Header too short: {} bytes (expected {})",
                buf.len(),
                HEADER_SIZE
            )));
        }

        if &buf[0..4] != MAGIC {
            return Err(Error::invalid_header(format!(
                "Invalid magic: expected {:?}, got {:?}",
                MAGIC,
                &buf[0..4]
            )));
        }

        if buf[4] != VERSION {
            return Err(Error::invalid_header(format!(
                "Unsupported version: {} (expected {})",
                buf[4], VERSION
            )));
        }

        if buf[5] != BLOB_TYPE {
            return Err(Error::invalid_header(format!(
                "Not a blob object: type {}",
                buf[5]
            )));
        }

        let algorithm = Algorithm::from_id(buf[6])?;
        let compression = Compression::from_u8(buf[7])?;

        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&buf[8..16]);

        Ok(Self {
            algorithm,
            compression,
            payload_len: u64::from_le_bytes(len_bytes),
        })
    }
}
