use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use rayon::prelude::*;
use serde::Deserialize;
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{MatcherError, MatcherResult};
use crate::loader::{parse_class, ClassRecord};

/// Records loaded from one input path, plus the per-class failures that were
/// skipped along the way.
#[derive(Debug, Default)]
pub struct LoadedClasses {
    pub records: Vec<ClassRecord>,
    pub failures: Vec<MatcherError>,
}

impl LoadedClasses {
    pub fn extend(&mut self, other: LoadedClasses) {
        self.records.extend(other.records);
        self.failures.extend(other.failures);
    }
}

/// Upper bound on the buffer reserved from an entry's declared size.
const MAX_PREALLOC: u64 = 1 << 24;

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordDump {
    Many(Vec<ClassRecord>),
    One(Box<ClassRecord>),
}

/// Load every class reachable from `path`.
///
/// Accepts a `.class` file, a `.jar`/`.zip` archive, a `.json` record dump,
/// or a directory containing any of those. A path that is requested directly
/// and cannot be read or parsed is an error; classes inside an archive or a
/// directory are loaded best-effort and their failures collected.
pub fn load_path(path: &Path) -> MatcherResult<LoadedClasses> {
    let meta = fs::metadata(path).map_err(|e| MatcherError::io(path, e))?;
    if meta.is_dir() {
        return load_dir(path);
    }
    load_file(path)
}

fn extension(path: &Path) -> String {
    path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_ascii_lowercase()
}

fn load_file(path: &Path) -> MatcherResult<LoadedClasses> {
    match extension(path).as_str() {
        "class" => {
            let bytes = fs::read(path).map_err(|e| MatcherError::io(path, e))?;
            let record = parse_class(&bytes, &path.display().to_string())?;
            Ok(LoadedClasses { records: vec![record], failures: Vec::new() })
        }
        "jar" | "zip" => load_archive(path),
        "json" => {
            let body = fs::read_to_string(path).map_err(|e| MatcherError::io(path, e))?;
            let dump: RecordDump = serde_json::from_str(&body).map_err(|e| {
                MatcherError::malformed(path.display().to_string(), format!("invalid record JSON: {e}"))
            })?;
            let records = match dump {
                RecordDump::Many(records) => records,
                RecordDump::One(record) => vec![*record],
            };
            Ok(LoadedClasses { records, failures: Vec::new() })
        }
        other => Err(MatcherError::malformed(
            path.display().to_string(),
            format!("unsupported input format '{other}'"),
        )),
    }
}

fn load_archive(path: &Path) -> MatcherResult<LoadedClasses> {
    let file = File::open(path).map_err(|e| MatcherError::io(path, e))?;
    // SAFETY: the mapping is read-only and dropped before this function returns.
    let mmap = unsafe { Mmap::map(&file).map_err(|e| MatcherError::io(path, e))? };
    let mut archive = ZipArchive::new(Cursor::new(&mmap[..])).map_err(|e| {
        MatcherError::malformed(path.display().to_string(), format!("unreadable archive: {e}"))
    })?;

    let mut entries: Vec<(String, Vec<u8>)> = Vec::new();
    let mut failures = Vec::new();
    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(e) => {
                failures.push(MatcherError::malformed(
                    format!("{}#{i}", path.display()),
                    format!("unreadable archive entry: {e}"),
                ));
                continue;
            }
        };
        if entry.is_dir() || !entry.name().ends_with(".class") {
            continue;
        }
        let name = format!("{}!/{}", path.display(), entry.name());
        let mut bytes = Vec::with_capacity(entry.size().min(MAX_PREALLOC) as usize);
        if let Err(e) = entry.read_to_end(&mut bytes) {
            failures.push(MatcherError::malformed(name, format!("failed to inflate: {e}")));
            continue;
        }
        entries.push((name, bytes));
    }

    let parsed: Vec<MatcherResult<ClassRecord>> =
        entries.par_iter().map(|(name, bytes)| parse_class(bytes, name)).collect();

    let mut loaded = LoadedClasses { records: Vec::with_capacity(parsed.len()), failures };
    for result in parsed {
        match result {
            Ok(record) => loaded.records.push(record),
            Err(e) => {
                warn!("skipping class: {e}");
                loaded.failures.push(e);
            }
        }
    }
    debug!("loaded {} classes from {}", loaded.records.len(), path.display());
    Ok(loaded)
}

/// Loadable files under `dir` in path order. Entries that cannot be read
/// are returned as failures.
fn collect_files(dir: &Path) -> (Vec<PathBuf>, Vec<MatcherError>) {
    let mut files = Vec::new();
    let mut failures = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file()
                    && matches!(extension(entry.path()).as_str(), "class" | "jar" | "zip" | "json")
                {
                    files.push(entry.into_path());
                }
            }
            Err(err) => {
                let path = err.path().unwrap_or(dir).to_path_buf();
                let source = err
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop"));
                warn!("skipping {}: {source}", path.display());
                failures.push(MatcherError::io(path, source));
            }
        }
    }
    (files, failures)
}

fn load_dir(dir: &Path) -> MatcherResult<LoadedClasses> {
    let (files, failures) = collect_files(dir);

    let mut loaded = LoadedClasses { records: Vec::new(), failures };
    for file in files {
        match load_file(&file) {
            Ok(part) => loaded.extend(part),
            Err(e) => {
                warn!("skipping {}: {e}", file.display());
                loaded.failures.push(e);
            }
        }
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_dump_accepts_single_record_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let one = dir.path().join("one.json");
        fs::write(&one, r#"{"binaryName": "a/A"}"#).unwrap();
        let many = dir.path().join("many.json");
        fs::write(&many, r#"[{"binaryName": "a/B"}, {"binaryName": "a/C", "superName": "a/B"}]"#)
            .unwrap();

        assert_eq!(load_path(&one).unwrap().records[0].binary_name, "a/A");
        let loaded = load_path(&many).unwrap();
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.records[1].super_name.as_deref(), Some("a/B"));
    }

    #[test]
    fn directory_load_collects_failures_without_aborting() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Broken.class"), b"not a class").unwrap();
        fs::write(dir.path().join("ok.json"), r#"{"binaryName": "a/Ok"}"#).unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let loaded = load_path(dir.path()).unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.failures.len(), 1);
    }

    #[test]
    fn nested_directories_load_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b/deep")).unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("b/deep/Z.json"), r#"{"binaryName": "b/Z"}"#).unwrap();
        fs::write(dir.path().join("a/Y.json"), r#"{"binaryName": "a/Y"}"#).unwrap();

        let loaded = load_path(dir.path()).unwrap();
        let names: Vec<&str> = loaded.records.iter().map(|r| r.binary_name.as_str()).collect();
        assert_eq!(names, vec!["a/Y", "b/Z"]);
        assert!(loaded.failures.is_empty());
    }

    #[test]
    fn oversized_entry_header_does_not_abort_loading() {
        use std::io::Write;
        use zip::write::FileOptions;

        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("huge.jar");
        let mut writer = zip::ZipWriter::new(File::create(&jar).unwrap());
        writer
            .start_file("x/Huge.class", FileOptions::default().compression_method(zip::CompressionMethod::Stored))
            .unwrap();
        writer.write_all(b"not a class").unwrap();
        writer.finish().unwrap();

        // claim a 4 GiB uncompressed size in the central directory
        let mut bytes = fs::read(&jar).unwrap();
        let central = bytes.windows(4).position(|w| w == b"PK\x01\x02").unwrap();
        bytes[central + 24..central + 28].copy_from_slice(&0xFFFF_FFF0u32.to_le_bytes());
        fs::write(&jar, &bytes).unwrap();

        let loaded = load_path(&jar).unwrap();
        assert!(loaded.records.is_empty());
        assert_eq!(loaded.failures.len(), 1);
        assert!(matches!(loaded.failures[0], MatcherError::MalformedBinary { .. }));
    }

    #[test]
    fn directly_requested_malformed_class_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Broken.class");
        fs::write(&path, b"nope").unwrap();
        assert!(matches!(load_path(&path), Err(MatcherError::MalformedBinary { .. })));
    }

    #[test]
    fn missing_path_is_io_error() {
        let err = load_path(Path::new("/definitely/not/here.jar")).unwrap_err();
        assert!(matches!(err, MatcherError::Io { .. }));
    }
}
