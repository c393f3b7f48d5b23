//! Publishing of export bundles as JSON files for the timeline front end.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use daybook_core::export::ExportBundle;
use serde::Serialize;

/// Name of the index of available days.
pub const MANIFEST_FILE: &str = "export_list.json";

/// Serialize `value` to `path` through a temp file and a rename, so readers
/// only ever see the previous or the complete new content.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let content = serde_json::to_vec(value)?;
    let temp_path = path.with_extension("json.tmp");
    {
        let mut file = File::create(&temp_path)
            .with_context(|| format!("Failed to create {}", temp_path.display()))?;
        file.write_all(&content)?;
        file.sync_all()?;
    }
    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to move {} into place", path.display()))?;
    Ok(())
}

/// Write every day payload and then the manifest into `out_dir`.
///
/// The manifest goes last so it never lists a day whose file is missing.
pub fn write_bundle(out_dir: &Path, bundle: &ExportBundle) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(bundle.days.len() + 1);
    for day in &bundle.days {
        let path = out_dir.join(&day.fname);
        write_json_atomic(&path, &day.export)?;
        written.push(path);
    }

    let manifest_path = out_dir.join(MANIFEST_FILE);
    write_json_atomic(&manifest_path, &bundle.manifest)?;
    written.push(manifest_path);

    tracing::debug!(
        "Wrote {} day files to {}",
        bundle.days.len(),
        out_dir.display()
    );
    Ok(written)
}
