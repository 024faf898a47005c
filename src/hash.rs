// src/hash.rs

//! Checksums for source archives, patches and package ids
//!
//! Recipes pin every download with a prefixed checksum:
//! - **sha256**: `sha256:<64 hex chars>`, the default for upstream archives
//! - **xxh128**: `xxh128:<32 hex chars>`, fast, for locally produced files
//!
//! Package ids are always SHA-256.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;
use xxhash_rust::xxh3::Xxh3;

use crate::error::{Error, Result};

/// Hash algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Xxh128,
}

impl HashAlgorithm {
    /// Length of the hex digest
    #[inline]
    pub const fn hex_len(&self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Xxh128 => 32,
        }
    }

    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Xxh128 => "xxh128",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "xxh128" | "xxh3" => Ok(Self::Xxh128),
            _ => Err(Error::ParseError(format!(
                "Unsupported checksum algorithm: {} (supported: sha256, xxh128)",
                s
            ))),
        }
    }
}

/// A prefixed checksum such as `sha256:9f86d0...`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum {
    pub algorithm: HashAlgorithm,
    /// Lowercase hex digest
    pub value: String,
}

impl Checksum {
    /// Parse `algorithm:hex`, validating length and characters
    pub fn parse(s: &str) -> Result<Self> {
        let (algo, value) = s.split_once(':').ok_or_else(|| {
            Error::ParseError(format!(
                "Invalid checksum format: {}. Expected algorithm:hex",
                s
            ))
        })?;
        let algorithm: HashAlgorithm = algo.parse()?;

        if value.len() != algorithm.hex_len() {
            return Err(Error::ParseError(format!(
                "Invalid {} checksum length: expected {}, got {}",
                algorithm,
                algorithm.hex_len(),
                value.len()
            )));
        }
        if !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::ParseError(format!("Invalid hex in checksum: {}", value)));
        }

        Ok(Self {
            algorithm,
            value: value.to_lowercase(),
        })
    }

    /// Name usable as a cache file name (`sha256_<hex>`)
    pub fn cache_key(&self) -> String {
        format!("{}_{}", self.algorithm, self.value)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.value)
    }
}

enum HasherState {
    Sha256(Sha256),
    Xxh128(Box<Xxh3>),
}

/// Incremental hasher over either algorithm
pub struct Hasher {
    algorithm: HashAlgorithm,
    state: HasherState,
}

impl Hasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let state = match algorithm {
            HashAlgorithm::Sha256 => HasherState::Sha256(Sha256::new()),
            HashAlgorithm::Xxh128 => HasherState::Xxh128(Box::new(Xxh3::new())),
        };
        Self { algorithm, state }
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            HasherState::Sha256(h) => h.update(data),
            HasherState::Xxh128(h) => h.update(data),
        }
    }

    pub fn finalize(self) -> Checksum {
        let value = match self.state {
            HasherState::Sha256(h) => hex::encode(h.finalize()),
            HasherState::Xxh128(h) => format!("{:032x}", h.digest128()),
        };
        Checksum {
            algorithm: self.algorithm,
            value,
        }
    }
}

/// Hash a byte slice
pub fn hash_bytes(algorithm: HashAlgorithm, data: &[u8]) -> Checksum {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}

/// Hash everything a reader yields
pub fn hash_reader<R: Read>(algorithm: HashAlgorithm, reader: &mut R) -> io::Result<Checksum> {
    let mut hasher = Hasher::new(algorithm);
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize())
}

/// Hash a file on disk without loading it whole
pub fn hash_file(algorithm: HashAlgorithm, path: &Path) -> Result<Checksum> {
    let mut file = File::open(path)?;
    Ok(hash_reader(algorithm, &mut file)?)
}

/// Check that `path` matches `expected`, returning the actual checksum on mismatch
pub fn verify_file(path: &Path, expected: &Checksum) -> Result<()> {
    let actual = hash_file(expected.algorithm, path)?;
    if &actual != expected {
        return Err(Error::ChecksumMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}
