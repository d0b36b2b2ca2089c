//! # Status Persistence
//!
//! Writes progress fields (`[Team/Assigned]`, `[Completed]`, `[Deployed]`)
//! back into a downloaded module's metadata file.
//!
//! Edits are targeted: only the line holding the field changes, everything
//! else in the file is written back byte for byte. The new content goes to a
//! temporary file in the same directory which is then renamed over the
//! original, so a crash never leaves a half-written file behind.
//!
//! The in-memory `ModuleNode` is updated only after the write succeeded. On
//! failure the node keeps its previous value and the caller receives
//! `Error::Persistence` or `Error::MetadataFileMissing`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::{debug, info};

use crate::error::{Error, Result};
use crate::hierarchy::{ModuleNode, UNASSIGNED};
use crate::metadata::{keys, CompletionStatus, MetadataDocument, METADATA_DIR};

/// Format of the `[Deployed]` timestamp.
pub const DEPLOYED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Spellings of the metadata filename seen in the wild, in lookup order.
pub const FILENAME_VARIANTS: [&str; 9] = [
    "ModuleInfo.txt",
    "moduleInfo.txt",
    "moduleinfo.txt",
    "MODULEINFO.txt",
    "ModuleInfor.txt",
    "moduleInfor.txt",
    "moduleinfor.txt",
    "Module_Info.txt",
    "module_info.txt",
];

/// Locate the metadata file of a downloaded module.
///
/// Known spellings are tried first, then any file in `lib/` whose lowercase
/// name contains `moduleinfo` or `moduleinfor`.
pub fn find_metadata_file(module_dir: &Path) -> Option<PathBuf> {
    let lib_dir = module_dir.join(METADATA_DIR);

    // Existence checks alone are case-insensitive on some filesystems, so the
    // returned path always uses the name actually on disk.
    let listing: Vec<String> = fs::read_dir(&lib_dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect();

    for variant in FILENAME_VARIANTS {
        if listing.iter().any(|name| name == variant) {
            return Some(lib_dir.join(variant));
        }
    }

    let mut fuzzy: Vec<&String> = listing
        .iter()
        .filter(|name| {
            let lower = name.to_lowercase();
            lower.contains("moduleinfo") || lower.contains("moduleinfor")
        })
        .collect();
    fuzzy.sort();
    fuzzy.first().map(|name| lib_dir.join(name))
}

/// Set one field in a module's metadata file.
///
/// Returns the path of the file that was written.
pub fn write_field(module_dir: &Path, key: &str, value: &str) -> Result<PathBuf> {
    let path = find_metadata_file(module_dir).ok_or_else(|| Error::MetadataFileMissing {
        module_dir: module_dir.to_path_buf(),
    })?;

    let text = fs::read_to_string(&path).map_err(|e| Error::Persistence {
        path: path.clone(),
        message: format!("read failed: {}", e),
    })?;

    let mut document = MetadataDocument::parse(&text);
    document.set_field(key, value);
    write_atomic(&path, &document.render())?;

    debug!("Set [{}] {} in {}", key, value, path.display());
    Ok(path)
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));

    let persistence = |e: std::io::Error| Error::Persistence {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    if let Err(e) = fs::write(&tmp_path, content) {
        // Nothing to clean up when the temp path could not be created
        if tmp_path.is_file() {
            let _ = fs::remove_file(&tmp_path);
        }
        return Err(persistence(e));
    }
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        persistence(e)
    })
}

/// Record who a module is assigned to.
///
/// An empty name resets the field to `None`.
pub fn set_assigned(node: &mut ModuleNode, module_dir: &Path, name: &str) -> Result<()> {
    let name = name.trim();
    let value = if name.is_empty() { UNASSIGNED } else { name };
    write_field(module_dir, keys::ASSIGNED, value)?;
    info!("Assigned '{}' to {}", node.name, value);
    node.assigned_to = value.to_string();
    Ok(())
}

/// Record a module's completion status.
pub fn set_completion_status(
    node: &mut ModuleNode,
    module_dir: &Path,
    status: CompletionStatus,
) -> Result<()> {
    write_field(module_dir, keys::COMPLETED, status.as_field())?;
    info!("Marked '{}' as {}", node.name, status);
    node.completion_status = status;
    Ok(())
}

/// Write the `[Deployed]` timestamp after a download.
///
/// Returns `false` without error when the module has no metadata file.
pub fn stamp_deployed(module_dir: &Path, timestamp: DateTime<Local>) -> Result<bool> {
    let value = timestamp.format(DEPLOYED_FORMAT).to_string();
    match write_field(module_dir, keys::DEPLOYED, &value) {
        Ok(_) => Ok(true),
        Err(Error::MetadataFileMissing { .. }) => {
            debug!("No metadata file to stamp in {}", module_dir.display());
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
