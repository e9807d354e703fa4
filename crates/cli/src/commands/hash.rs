use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use matcher_core::input::{HashType, InputFile};

/// Print an input descriptor for each file, ready for an input sets file.
pub fn hash_input_command(paths: &[PathBuf], algorithm: &str, url: Option<String>) -> Result<Vec<InputFile>> {
    let hash_type = match algorithm.to_ascii_lowercase().as_str() {
        "sha1" => HashType::Sha1,
        "sha256" => HashType::Sha256,
        other => return Err(anyhow!("Unsupported hash algorithm: {other} (expected sha1 or sha256)")),
    };

    let mut descriptors = Vec::with_capacity(paths.len());
    for path in paths {
        let mut descriptor = InputFile::from_path(path, hash_type)
            .with_context(|| format!("Failed to hash {}", path.display()))?;
        descriptor.url = url.clone();
        descriptors.push(descriptor);
    }
    println!("{}", serde_json::to_string_pretty(&descriptors)?);
    Ok(descriptors)
}
