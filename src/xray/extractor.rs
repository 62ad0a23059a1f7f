//! Archive extraction for core releases
//!
//! Xray-core ships as a flat zip (binary, geoip.dat, geosite.dat, docs).
//! The whole archive is unpacked into the install directory.

use super::error::{CoreError, Result};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Extract every entry of `archive_path` into `dest_dir`; returns the files written
pub fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>> {
    log::info!(
        "Extracting {} into {}",
        archive_path.display(),
        dest_dir.display()
    );

    let file = File::open(archive_path).map_err(|e| {
        CoreError::Extraction(format!(
            "Failed to open archive {}: {}",
            archive_path.display(),
            e
        ))
    })?;

    let mut archive = zip::ZipArchive::new(file)?;
    fs::create_dir_all(dest_dir)?;

    let mut written = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;

        // Entries escaping the destination are skipped
        let Some(relative) = entry.enclosed_name() else {
            log::warn!("Skipping unsafe archive entry {}", entry.name());
            continue;
        };
        let out_path = dest_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut outfile = File::create(&out_path)?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|e| CoreError::Extraction(format!("Failed to extract {}: {}", entry.name(), e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o777))?;
            }
        }

        written.push(out_path);
    }

    log::info!("Extracted {} files", written.len());
    Ok(written)
}

/// Make the core binary executable on Unix
pub fn make_executable(binary: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(binary)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(binary, perms)?;
    }

    #[cfg(not(unix))]
    {
        let _ = binary;
    }

    Ok(())
}

/// Clean up downloaded archive
pub fn cleanup_archive(archive_path: &Path) -> Result<()> {
    if archive_path.exists() {
        fs::remove_file(archive_path)?;
        log::info!("Cleaned up archive: {}", archive_path.display());
    }
    Ok(())
}
