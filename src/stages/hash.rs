// src/stages/hash.rs

//! Content-hash file names for cache busting.

use crate::pipeline::{Asset, FileStage, TransformError};

/// Number of hex digits of the digest kept in the file name.
pub const HASH_LEN: usize = 8;

/// Short hex digest of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let hex = blake3::hash(bytes).to_hex();
    hex.as_str()[..HASH_LEN].to_string()
}

/// `name.ext` → `name.<hash>.ext`.
pub fn hashed_name(file_name: &str, hash: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}.{hash}.{ext}"),
        _ => format!("{file_name}.{hash}"),
    }
}

#[derive(Debug, Default)]
pub struct HashRename;

impl FileStage for HashRename {
    fn name(&self) -> &'static str {
        "hash"
    }

    fn transform(&self, mut asset: Asset) -> Result<Option<Asset>, TransformError> {
        let hash = match &asset.contents {
            Some(bytes) => content_hash(bytes),
            None => {
                return Err(TransformError::for_file(self.name(), &asset.path, "file has no contents"));
            }
        };
        let renamed = hashed_name(&asset.file_name(), &hash);
        asset.set_file_name(&renamed);
        Ok(Some(asset))
    }
}
