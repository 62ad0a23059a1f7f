//! Core provisioning
//!
//! Resolves, downloads, verifies, and unpacks the Xray-core release for
//! the host platform into the install directory.

use super::config::{CorePaths, ManagerSettings};
use super::downloader::{create_client, download_file, fetch_text};
use super::error::{CoreError, Result};
use super::extractor::{cleanup_archive, extract_zip, make_executable};
use super::hasher::{parse_dgst_sha256, verify_file_hash};
use super::platform::Platform;
use std::path::PathBuf;
use url::Url;

/// Release asset for one platform and version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDescriptor {
    pub platform: Platform,
    pub version: String,
    pub release_base: String,
}

impl ReleaseDescriptor {
    pub fn new(settings: &ManagerSettings, platform: Platform) -> Result<Self> {
        Ok(Self {
            platform,
            version: settings.normalized_version()?.to_string(),
            release_base: settings.release_base.trim_end_matches('/').to_string(),
        })
    }

    /// `<release-base>/v<version>/Xray-<platform>-<arch>.zip`
    pub fn url(&self) -> Result<Url> {
        let raw = format!(
            "{}/v{}/{}",
            self.release_base,
            self.version,
            self.platform.archive_name()
        );
        Url::parse(&raw).map_err(|e| CoreError::Settings(format!("invalid release URL {}: {}", raw, e)))
    }

    /// Local file name of the downloaded archive
    pub fn filename(&self) -> Result<String> {
        let url = self.url()?;
        url.path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| CoreError::Settings(format!("release URL {} has no file name", url)))
    }

    /// URL of the digest file published next to the archive
    pub fn digest_url(&self) -> Result<Url> {
        let url = self.url()?;
        Url::parse(&format!("{}.dgst", url))
            .map_err(|e| CoreError::Settings(format!("invalid digest URL: {}", e)))
    }
}

/// Build the release URL for the host platform
pub fn release_url(settings: &ManagerSettings) -> Result<Url> {
    ReleaseDescriptor::new(settings, Platform::current())?.url()
}

/// Downloads and installs the core binary
pub struct Provisioner {
    paths: CorePaths,
    platform: Platform,
}

impl Provisioner {
    pub fn new(paths: CorePaths) -> Self {
        Self::for_platform(paths, Platform::current())
    }

    pub fn for_platform(paths: CorePaths, platform: Platform) -> Self {
        Self { paths, platform }
    }

    pub fn descriptor(&self, settings: &ManagerSettings) -> Result<ReleaseDescriptor> {
        ReleaseDescriptor::new(settings, self.platform.clone())
    }

    /// Where the archive for `settings` lands on disk
    pub fn archive_path(&self, settings: &ManagerSettings) -> Result<PathBuf> {
        Ok(self.paths.install_dir.join(self.descriptor(settings)?.filename()?))
    }

    /// Fetch the release archive into the install directory
    pub async fn download(&self, settings: &ManagerSettings) -> Result<PathBuf> {
        let descriptor = self.descriptor(settings)?;
        let client = create_client(settings.proxy.as_deref())?;
        let archive = self.archive_path(settings)?;

        download_file(&client, descriptor.url()?.as_str(), &archive).await?;

        if settings.verify_digest {
            if let Err(e) = self.verify(&client, &descriptor, &archive).await {
                let _ = cleanup_archive(&archive);
                return Err(e);
            }
        }

        Ok(archive)
    }

    async fn verify(
        &self,
        client: &reqwest::Client,
        descriptor: &ReleaseDescriptor,
        archive: &std::path::Path,
    ) -> Result<()> {
        let digest_url = descriptor.digest_url()?;
        let Some(dgst) = fetch_text(client, digest_url.as_str()).await? else {
            log::warn!("No digest published at {}, skipping verification", digest_url);
            return Ok(());
        };

        let Some(expected) = parse_dgst_sha256(&dgst) else {
            log::warn!("Digest at {} has no SHA2-256 entry, skipping verification", digest_url);
            return Ok(());
        };

        let result = verify_file_hash(archive, &expected)?;
        if !result.matches {
            return Err(CoreError::DigestMismatch {
                expected: result.expected,
                computed: result.computed,
            });
        }

        log::info!("Hash verification passed");
        Ok(())
    }

    /// Unpack the downloaded archive and remove it
    pub fn unpack(&self, settings: &ManagerSettings) -> Result<PathBuf> {
        let archive = self.archive_path(settings)?;
        if !archive.exists() {
            return Err(CoreError::Extraction(format!(
                "archive {} not found",
                archive.display()
            )));
        }

        extract_zip(&archive, &self.paths.install_dir)?;
        cleanup_archive(&archive)?;

        let binary = self.paths.binary();
        if binary.exists() {
            make_executable(&binary)?;
        }
        Ok(binary)
    }

    /// Whether the core binary is present
    pub fn binary_exists(&self) -> bool {
        let binary = self.paths.binary();
        let exists = binary.exists();
        if !exists {
            log::warn!("xray core is not installed at {}", binary.display());
        }
        exists
    }

    /// Download, verify and unpack; returns the binary path
    pub async fn install(&self, settings: &ManagerSettings) -> Result<PathBuf> {
        let descriptor = self.descriptor(settings)?;
        log::info!(
            "Installing xray v{} for {}-{}",
            descriptor.version,
            descriptor.platform.os,
            descriptor.platform.arch
        );

        self.download(settings).await?;
        let binary = self.unpack(settings)?;

        if !self.binary_exists() {
            return Err(CoreError::Extraction(format!(
                "archive did not contain {}",
                binary.display()
            )));
        }

        log::info!("xray v{} installed at {}", descriptor.version, binary.display());
        Ok(binary)
    }
}
