use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;
use tracing::{debug, info};

use crate::error::{MatcherError, MatcherResult};

/// Retrieves a URL into a local file.
pub trait Fetcher {
    fn fetch(&self, url: &str, dest: &Path) -> MatcherResult<()>;
}

/// Fetcher backed by the `curl` command line tool.
#[derive(Debug, Clone, Default)]
pub struct CurlFetcher {
    /// Overall transfer limit in seconds.
    pub max_time: Option<u64>,
}

impl Fetcher for CurlFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> MatcherResult<()> {
        let mut cmd = Command::new("curl");
        cmd.args(["-L", "--fail", "--silent", "--show-error", "--connect-timeout", "10"]);
        if let Some(max_time) = self.max_time {
            cmd.args(["--max-time", &max_time.to_string()]);
        }
        cmd.arg("-o").arg(dest).arg(url);

        info!("downloading {url}");
        let status = cmd.status().map_err(|e| MatcherError::io(dest, e))?;
        if !status.success() {
            return Err(MatcherError::integrity(url, format!("download failed ({status})")));
        }
        Ok(())
    }
}

/// Scoped directory holding downloaded inputs.
///
/// The directory is created on first use and removed, with its contents,
/// when the cache is dropped.
#[derive(Debug, Default)]
pub struct DownloadCache {
    parent: Option<PathBuf>,
    dir: Option<TempDir>,
}

impl DownloadCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the cache directory under `parent` instead of the system temp dir.
    pub fn in_dir(parent: impl Into<PathBuf>) -> Self {
        Self { parent: Some(parent.into()), dir: None }
    }

    /// Location of the cache, if it has been created.
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    fn ensure(&mut self) -> MatcherResult<&Path> {
        if self.dir.is_none() {
            let mut builder = tempfile::Builder::new();
            builder.prefix("dl");
            let dir = match &self.parent {
                Some(parent) => {
                    fs::create_dir_all(parent).map_err(|e| MatcherError::io(parent, e))?;
                    builder.tempdir_in(parent).map_err(|e| MatcherError::io(parent, e))?
                }
                None => builder.tempdir().map_err(|e| MatcherError::io(std::env::temp_dir(), e))?,
            };
            debug!("created download cache at {}", dir.path().display());
            self.dir = Some(dir);
        }
        self.path().ok_or_else(|| MatcherError::Config("download cache unavailable".into()))
    }

    /// Files currently in the cache, sorted by name; empty before first use.
    pub fn files(&self) -> MatcherResult<Vec<PathBuf>> {
        let Some(dir) = self.path() else { return Ok(Vec::new()) };
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|e| MatcherError::io(dir, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        Ok(files)
    }

    /// Fresh path for a download of `url`, named after its last segment.
    pub fn target_for(&mut self, url: &str) -> MatcherResult<PathBuf> {
        let name = download_name(url);
        let dir = self.ensure()?;
        let mut out = dir.join(&name);
        let mut suffix = 0;
        while out.exists() {
            suffix += 1;
            out = dir.join(format!("{name}_{suffix}"));
        }
        Ok(out)
    }

    /// Download `url` into the cache and return the new file.
    pub fn fetch(&mut self, url: &str, fetcher: &dyn Fetcher) -> MatcherResult<PathBuf> {
        let target = self.target_for(url)?;
        fetcher.fetch(url, &target)?;
        Ok(target)
    }
}

/// Last URL segment with characters outside `[A-Za-z0-9_.\- ]` replaced by `x`.
pub fn download_name(url: &str) -> String {
    let segment = url.rsplit('/').next().unwrap_or_default();
    let name: String = segment
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | ' ') { c } else { 'x' })
        .collect();
    if name.is_empty() {
        "dl".to_string()
    } else {
        name
    }
}
