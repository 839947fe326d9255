//! Local content-addressed blob store.
//!
//! This is the storage side of the CDN: every served file is written here
//! once, keyed by the BLAKE3 hash of its bytes, and the hex digest becomes the
//! fingerprint in the file's CDN URL.

use crate::error::{Error, Result};
use crate::hash::{Algorithm, ContentHash};
use crate::object::{BlobHeader, Compression, HEADER_SIZE};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Compression threshold: blobs >= 4KB are compressed.
const COMPRESSION_THRESHOLD: usize = 4096;

/// A content-addressed blob store rooted at a directory.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
    algorithm: Algorithm,
}

impl Store {
    /// Initialize a new store at the given path.
    ///
    /// Creates `objects/<algo>/` and a `config` file with version and algorithm.
    pub fn init<P: AsRef<Path>>(root: P, algorithm: Algorithm) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("objects").join(algorithm.as_str()))?;

        let config_content = format!("version=1\nalgo={}\n", algorithm.as_str());
        fs::write(root.join("config"), config_content)?;

        tracing::debug!(root = %root.display(), algo = algorithm.as_str(), "initialized store");

        Ok(Self { root, algorithm })
    }

    /// Open an existing store at the given path.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            return Err(Error::invalid_store(&root, "directory does not exist"));
        }

        let config_path = root.join("config");
        if !config_path.exists() {
            return Err(Error::invalid_store(&root, "config file not found"));
        }

        let algorithm = Self::parse_config(&fs::read_to_string(&config_path)?)
            .map_err(|e| Error::invalid_store(&root, e.to_string()))?;

        if !root.join("objects").join(algorithm.as_str()).exists() {
            return Err(Error::invalid_store(
                &root,
                "objects directory structure missing",
            ));
        }

        Ok(Self { root, algorithm })
    }

    /// Open the store at `root`, creating it first if there is none.
    pub fn open_or_init<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        if root.join("config").exists() {
            Self::open(root)
        } else {
            Self::init(root, Algorithm::Blake3)
        }
    }

    /// Parse the `key=value` config file and return the algorithm.
    fn parse_config(content: &str) -> Result<Algorithm> {
        let mut version = None;
        let mut algo = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                match key.trim() {
                    "version" => version = Some(value.trim()),
                    "algo" => algo = Some(value.trim()),
                    _ => {}
                }
            }
        }

        if version != Some("1") {
            return Err(Error::invalid_header(format!(
                "Unsupported config version: {:?}",
                version
            )));
        }

        let algo_str = algo.ok_or_else(|| Error::invalid_header("Missing algo in config"))?;
        Algorithm::parse(algo_str)
    }

    /// Returns: `objects/{algorithm}/{prefix}/{suffix}`
    pub fn object_path(&self, hash: &ContentHash) -> PathBuf {
        self.root
            .join("objects")
            .join(self.algorithm.as_str())
            .join(hash.prefix())
            .join(hash.suffix())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.object_path(hash).exists()
    }

    /// Store the contents of a file and return its hash.
    pub fn put_file(&self, path: &Path) -> Result<ContentHash> {
        let file = fs::File::open(path)?;
        self.put_blob(file)
    }

    /// Store a blob from a reader.
    ///
    /// Already-present content is not rewritten. Blobs >= 4KB are zstd compressed.
    pub fn put_blob<R: Read>(&self, mut reader: R) -> Result<ContentHash> {
        let mut payload = Vec::new();
        reader.read_to_end(&mut payload)?;

        let hash = ContentHash::of_bytes(&payload);
        if self.contains(&hash) {
            return Ok(hash);
        }

        let (stored, compression) = if payload.len() >= COMPRESSION_THRESHOLD {
            (compress_zstd(&payload)?, Compression::Zstd)
        } else {
            (payload, Compression::None)
        };

        let header = BlobHeader::new(self.algorithm, compression, stored.len() as u64);
        self.write_object_atomic(&hash, &header, &stored)?;

        tracing::debug!(%hash, bytes = stored.len(), "stored blob");
        Ok(hash)
    }

    /// Retrieve a blob, verifying its hash.
    pub fn get_blob(&self, hash: &ContentHash) -> Result<Vec<u8>> {
        let obj_path = self.object_path(hash);
        if !obj_path.exists() {
            return Err(Error::object_not_found(hash.to_hex()));
        }

        let mut file = fs::File::open(&obj_path)?;
        let mut header_buf = [0u8; HEADER_SIZE];
        file.read_exact(&mut header_buf)?;
        let header = BlobHeader::decode(&header_buf)?;

        let mut stored = Vec::new();
        file.read_to_end(&mut stored)?;
        if stored.len() as u64 != header.payload_len {
            return Err(Error::corrupted_object(
                &obj_path,
                format!(
                    "Payload length mismatch: expected {}, got {}",
                    header.payload_len,
                    stored.len()
                ),
            ));
        }

        let payload = match header.compression {
            Compression::None => stored,
            Compression::Zstd => decompress_zstd(&stored)?,
        };

        let computed = ContentHash::of_bytes(&payload);
        if computed != *hash {
            return Err(Error::corrupted_object(
                &obj_path,
                format!("Hash mismatch: expected {}, got {}", hash, computed),
            ));
        }

        Ok(payload)
    }

    /// Write a blob's bytes to a writer.
    pub fn cat_blob<W: Write>(&self, hash: &ContentHash, mut writer: W) -> Result<()> {
        writer.write_all(&self.get_blob(hash)?)?;
        Ok(())
    }

    fn write_object_atomic(
        &self,
        hash: &ContentHash,
        header: &BlobHeader,
        payload: &[u8],
    ) -> Result<()> {
        let obj_path = self.object_path(hash);
        let shard_dir = obj_path
            .parent()
            .ok_or_else(|| Error::invalid_store(&self.root, "object path has no parent"))?;
        fs::create_dir_all(shard_dir)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(shard_dir)?;
        temp_file.write_all(&header.encode())?;
        temp_file.write_all(payload)?;
        temp_file.flush()?;
        temp_file.persist(&obj_path)?;

        Ok(())
    }
}

fn compress_zstd(data: &[u8]) -> Result<Vec<u8>> {
    zstd::encode_all(data, 3) // Level 3 = fast compression
        .map_err(|e| Error::compression_error(format!("zstd compression failed: {}", e)))
}

fn decompress_zstd(data: &[u8]) -> Result<Vec<u8>> {
    zstd::decode_all(data)
        .map_err(|e| Error::compression_error(format!("zstd decompression failed: {}", e)))
}
