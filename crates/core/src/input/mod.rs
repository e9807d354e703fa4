//! Input acquisition: logical input descriptors resolved to local files.
//!
//! An [`InputFile`] names a binary by any combination of file name, size,
//! hash, path hint and download URL. Resolution tries, in order: an absolute
//! path hint, each input dir joined with a relative hint, the download cache
//! joined with the hint, a recursive scan of the input dirs, a scan of the
//! download cache, and finally a fetch of the URL into the cache.

mod cache;

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{MatcherError, MatcherResult};

pub use cache::{download_name, CurlFetcher, DownloadCache, Fetcher};

const HASH_BUFFER: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashType {
    Sha1,
    #[default]
    Sha256,
}

impl HashType {
    /// Hex digest of a file, read in fixed-size chunks.
    pub fn hash_file(self, path: &Path) -> MatcherResult<String> {
        let mut file = File::open(path).map_err(|e| MatcherError::io(path, e))?;
        match self {
            HashType::Sha1 => stream::<Sha1>(&mut file, path),
            HashType::Sha256 => stream::<Sha256>(&mut file, path),
        }
    }
}

fn stream<D: Digest>(file: &mut File, path: &Path) -> MatcherResult<String> {
    let mut digest = D::new();
    let mut buffer = vec![0u8; HASH_BUFFER];
    loop {
        let read = file.read(&mut buffer).map_err(|e| MatcherError::io(path, e))?;
        if read == 0 {
            break;
        }
        digest.update(&buffer[..read]);
    }
    Ok(hex::encode(digest.finalize()))
}

/// Descriptor of one input binary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Lowercase hex digest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default)]
    pub hash_algorithm: HashType,
    /// Absolute path, or a path relative to an input dir or the download cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

fn sanitized_file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().replace('\n', " "))
}

impl InputFile {
    /// Fully specified descriptor for an existing file.
    pub fn from_path(path: &Path, hash_algorithm: HashType) -> MatcherResult<Self> {
        let meta = std::fs::metadata(path).map_err(|e| MatcherError::io(path, e))?;
        Ok(Self {
            file_name: sanitized_file_name(path),
            size: Some(meta.len()),
            hash: Some(hash_algorithm.hash_file(path)?),
            hash_algorithm,
            path: Some(path.to_path_buf()),
            url: None,
        })
    }

    /// Whether `path` agrees with every property this descriptor declares.
    pub fn matches(&self, path: &Path) -> MatcherResult<bool> {
        if !path.is_file() {
            return Ok(false);
        }
        if let Some(name) = &self.file_name {
            if sanitized_file_name(path).as_deref() != Some(name.as_str()) {
                return Ok(false);
            }
        }
        if let Some(size) = self.size {
            let meta = std::fs::metadata(path).map_err(|e| MatcherError::io(path, e))?;
            if meta.len() != size {
                return Ok(false);
            }
        }
        match &self.hash {
            Some(hash) => Ok(self.hash_algorithm.hash_file(path)?.eq_ignore_ascii_case(hash)),
            None => Ok(true),
        }
    }

    fn first_match(&self, candidates: impl IntoIterator<Item = PathBuf>) -> MatcherResult<Option<PathBuf>> {
        for candidate in candidates {
            if self.matches(&candidate)? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// Resolve this descriptor to a local file.
    pub fn resolve(
        &self,
        input_dirs: &[PathBuf],
        cache: &mut DownloadCache,
        fetcher: &dyn Fetcher,
    ) -> MatcherResult<PathBuf> {
        if let Some(hint) = &self.path {
            if hint.is_absolute() {
                if self.matches(hint)? {
                    return Ok(hint.clone());
                }
            } else {
                let hinted = input_dirs.iter().map(|dir| dir.join(hint));
                let cached = cache.path().map(|dir| dir.join(hint));
                if let Some(found) = self.first_match(hinted.chain(cached))? {
                    return Ok(found);
                }
            }
        }

        for dir in input_dirs {
            let files = WalkDir::new(dir)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path());
            if let Some(found) = self.first_match(files)? {
                debug!("found {self} at {}", found.display());
                return Ok(found);
            }
        }

        if let Some(found) = self.first_match(cache.files()?)? {
            return Ok(found);
        }

        if let Some(url) = &self.url {
            let downloaded = cache.fetch(url, fetcher)?;
            if !self.matches(&downloaded)? {
                return Err(MatcherError::integrity(
                    self.to_string(),
                    format!("download from {url} does not match the declared size or hash"),
                ));
            }
            info!("downloaded {self} to {}", downloaded.display());
            return Ok(downloaded);
        }

        Err(MatcherError::integrity(self.to_string(), "no matching file found"))
    }
}

/// Resolve every descriptor; the first failure aborts.
pub fn resolve_all(
    inputs: &[InputFile],
    input_dirs: &[PathBuf],
    cache: &mut DownloadCache,
    fetcher: &dyn Fetcher,
) -> MatcherResult<Vec<PathBuf>> {
    inputs.iter().map(|input| input.resolve(input_dirs, cache, fetcher)).collect()
}

impl fmt::Display for InputFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.file_name {
            return f.write_str(name);
        }
        if let Some(name) = self.path.as_deref().and_then(Path::file_name) {
            return write!(f, "{}", name.to_string_lossy());
        }
        if let Some(prefix) = self.hash.as_deref().and_then(hash_prefix) {
            return write!(f, "{prefix:x}");
        }
        f.write_str("unknown")
    }
}

/// First eight digest bytes as an integer.
fn hash_prefix(hex_digest: &str) -> Option<u64> {
    let bytes = hex::decode(hex_digest).ok()?;
    let head: [u8; 8] = bytes.get(..8)?.try_into().ok()?;
    Some(u64::from_be_bytes(head))
}

/// Descriptor sets for one run: both sides, the shared set, and search dirs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSets {
    pub a: Vec<InputFile>,
    pub b: Vec<InputFile>,
    pub shared: Vec<InputFile>,
    pub input_dirs: Vec<PathBuf>,
}
