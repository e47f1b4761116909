//! Staging and packing of a finished project tree.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use serde_json::json;
use sha2::{Digest, Sha256};
use sketchforge_contracts::EventWriter;
use uuid::Uuid;
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::error::{SketchError, SketchResult};
use crate::journal;
use crate::project::ProjectTree;

const COMPRESSION_LEVEL: i64 = 6;
const DIR_PERMISSIONS: u32 = 0o755;
const FILE_PERMISSIONS: u32 = 0o644;

/// Exclusively owned, uniquely named directory under a parent (normally the
/// system temp dir). Removed by [`StagingDir::cleanup`] or, failing that, on
/// drop.
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
    removed: bool,
}

impl StagingDir {
    pub fn create(parent: &Path) -> SketchResult<Self> {
        let path = parent.join(format!("sketchforge-{}", Uuid::new_v4()));
        fs::create_dir_all(parent).map_err(|err| SketchError::fs(parent, err))?;
        fs::create_dir(&path).map_err(|err| SketchError::fs(&path, err))?;
        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the tree under `<staging>/<tree root>/` and returns that path.
    pub fn write_tree(&self, tree: &ProjectTree) -> SketchResult<PathBuf> {
        let root = self.path.join(tree.root());
        fs::create_dir_all(&root).map_err(|err| SketchError::fs(&root, err))?;
        for dir in tree.dirs() {
            let path = root.join(dir);
            fs::create_dir_all(&path).map_err(|err| SketchError::fs(&path, err))?;
        }
        for (relative, contents) in tree.files() {
            let path = root.join(relative);
            fs::write(&path, contents).map_err(|err| SketchError::fs(&path, err))?;
        }
        Ok(root)
    }

    pub fn cleanup(mut self) -> std::io::Result<()> {
        self.removed = true;
        fs::remove_dir_all(&self.path)
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if !self.removed {
            let _ = fs::remove_dir_all(&self.path);
        }
    }
}

/// Zips everything below `staging`, depth-first in name order. Entry names
/// are relative to `staging` and use `/`; timestamps are fixed so equal
/// trees pack to equal bytes.
pub fn pack(staging: &Path) -> SketchResult<Vec<u8>> {
    let base = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL))
        .last_modified_time(DateTime::default());
    let dir_options = base.unix_permissions(DIR_PERMISSIONS);
    let file_options = base.unix_permissions(FILE_PERMISSIONS);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for entry in WalkDir::new(staging).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(staging).to_path_buf();
            SketchError::fs(path, err.into())
        })?;
        let relative = entry.path().strip_prefix(staging).map_err(|_| {
            SketchError::InvalidInput(format!(
                "{} is outside the staging directory",
                entry.path().display()
            ))
        })?;
        let name = relative
            .components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            writer.add_directory(format!("{name}/"), dir_options)?;
        } else if entry.file_type().is_file() {
            let bytes = fs::read(entry.path()).map_err(|err| SketchError::fs(entry.path(), err))?;
            writer.start_file(name, file_options)?;
            writer.write_all(&bytes).map_err(ZipError::from)?;
        }
    }
    Ok(writer.finish()?.into_inner())
}

#[derive(Debug, Clone)]
pub struct PackedArchive {
    pub bytes: Vec<u8>,
    /// Hex SHA-256 of `bytes`.
    pub sha256: String,
}

pub struct Packager {
    staging_parent: PathBuf,
    events: EventWriter,
}

impl Packager {
    pub fn new(staging_parent: impl Into<PathBuf>, events: EventWriter) -> Self {
        Self {
            staging_parent: staging_parent.into(),
            events,
        }
    }

    /// Stages the tree, packs it and removes the staging directory whether
    /// or not packing succeeded. A failed removal is logged, never returned.
    pub fn package(&self, tree: &ProjectTree) -> SketchResult<PackedArchive> {
        let staging = StagingDir::create(&self.staging_parent)?;
        let staging_path = staging.path().to_path_buf();
        let packed = staging
            .write_tree(tree)
            .and_then(|_| pack(&staging_path));

        if let Err(err) = staging.cleanup() {
            tracing::warn!(path = %staging_path.display(), error = %err, "failed to remove staging directory");
            journal(
                &self.events,
                "staging_cleanup_failed",
                json!({
                    "path": staging_path.display().to_string(),
                    "error": err.to_string(),
                }),
            );
        }

        let bytes = packed?;
        let sha256 = hex::encode(Sha256::digest(&bytes));
        tracing::info!(root = tree.root(), bytes = bytes.len(), "project archive written");
        journal(
            &self.events,
            "archive_written",
            json!({
                "project_root": tree.root(),
                "files": tree.file_count(),
                "bytes": bytes.len(),
                "sha256": sha256,
            }),
        );
        Ok(PackedArchive { bytes, sha256 })
    }
}
