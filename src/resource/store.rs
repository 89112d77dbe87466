use crate::{MirrorError, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

#[cfg(windows)]
const FILE_ATTRIBUTE_NORMAL: u32 = 0x80;
#[cfg(windows)]
const FILE_ATTRIBUTE_TEMPORARY: u32 = 0x100;

static NEXT_STAGING_ID: AtomicU64 = AtomicU64::new(0);

/// Writes a file below the output tree
///
/// Parent directories are created as needed. The content goes to a sibling
/// temporary file which is then renamed over the target, so readers never
/// observe a half-written file. Each call stages into its own file and the
/// last rename over a shared target wins.
///
/// `temporary` maps onto the Windows temporary-file attribute: `Some(true)`
/// sets it, `Some(false)` forces a normal file and `None` leaves the platform
/// default. Other platforms ignore it.
pub async fn write_file(path: &Path, data: &[u8], temporary: Option<bool>) -> Result<()> {
    let write_error = |source: std::io::Error| MirrorError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
    }

    let staging = staging_path(path);
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    apply_temporary_attribute(&mut options, temporary);

    let mut file = options.open(&staging).await.map_err(write_error)?;
    file.write_all(data).await.map_err(write_error)?;
    file.flush().await.map_err(write_error)?;
    drop(file);

    if let Err(e) = tokio::fs::rename(&staging, path).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(write_error(e));
    }

    Ok(())
}

/// Returns true if a file exists at `path`
pub async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let id = NEXT_STAGING_ID.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{}.{}-{}.partial", name, std::process::id(), id))
}

#[cfg(windows)]
fn apply_temporary_attribute(options: &mut OpenOptions, temporary: Option<bool>) {
    match temporary {
        Some(true) => {
            options.attributes(FILE_ATTRIBUTE_TEMPORARY);
        }
        Some(false) => {
            options.attributes(FILE_ATTRIBUTE_NORMAL);
        }
        None => {}
    }
}

#[cfg(not(windows))]
fn apply_temporary_attribute(_options: &mut OpenOptions, _temporary: Option<bool>) {}
