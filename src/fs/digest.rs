//! # Digest Engine
//!
//! Content fingerprints as lowercase hex. There are two ways to get one:
//! incremental hashing over an in-memory buffer or text, and streamed hashing
//! over an async reader (what the native probe does). Both must produce the
//! same string for the same bytes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Read size used when streaming a file through the hasher
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Supported fingerprint algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// MD5, the fingerprint the platform probes report
    #[default]
    Md5,
    /// SHA-256
    Sha256,
}

impl DigestAlgorithm {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(DigestAlgorithm::Md5),
            "sha256" | "sha-256" => Ok(DigestAlgorithm::Sha256),
            other => Err(format!("unknown digest algorithm: {}", other)),
        }
    }
}

/// A content fingerprint (lowercase hex)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

enum HasherState {
    Md5(md5::Context),
    Sha256(Sha256),
}

/// Incremental hasher
pub struct Hasher {
    state: HasherState,
}

impl Hasher {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        let state = match algorithm {
            DigestAlgorithm::Md5 => HasherState::Md5(md5::Context::new()),
            DigestAlgorithm::Sha256 => HasherState::Sha256(Sha256::new()),
        };
        Self { state }
    }

    /// Feed more bytes
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            HasherState::Md5(ctx) => ctx.consume(data),
            HasherState::Sha256(hasher) => hasher.update(data),
        }
    }

    /// Finish and render as hex
    pub fn finalize(self) -> Digest {
        match self.state {
            HasherState::Md5(ctx) => Digest(format!("{:x}", ctx.compute())),
            HasherState::Sha256(hasher) => Digest(format!("{:x}", hasher.finalize())),
        }
    }
}

/// Hash a byte buffer
pub fn digest_bytes(algorithm: DigestAlgorithm, bytes: &[u8]) -> Digest {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(bytes);
    hasher.finalize()
}

/// Hash text over its UTF-8 bytes
pub fn digest_text(algorithm: DigestAlgorithm, text: &str) -> Digest {
    digest_bytes(algorithm, text.as_bytes())
}

/// Stream a reader through the hasher, returning the digest and byte count
pub async fn digest_reader<R>(
    algorithm: DigestAlgorithm,
    reader: &mut R,
) -> std::io::Result<(Digest, u64)>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = Hasher::new(algorithm);
    let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }

    Ok((hasher.finalize(), total))
}
