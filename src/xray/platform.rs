//! Host platform resolution
//!
//! Translates the host OS and CPU architecture into the vocabulary used by
//! Xray-core release asset names (`Xray-<platform>-<arch>.zip`).

/// OS identifiers mapped to release platform names
const PLATFORMS: &[(&str, &str)] = &[
    ("macos", "macos"),
    ("darwin", "macos"),
    ("windows", "windows"),
    ("win32", "windows"),
    ("linux", "linux"),
    ("freebsd", "freebsd"),
    ("openbsd", "openbsd"),
];

/// CPU architecture identifiers mapped to release arch names
const ARCHES: &[(&str, &str)] = &[
    ("x86_64", "64"),
    ("x64", "64"),
    ("x86", "32"),
    ("ia32", "32"),
    ("aarch64", "arm64-v8a"),
    ("arm64", "arm64-v8a"),
    ("arm", "arm32-v7a"),
    ("mips64", "mips64"),
    ("riscv64", "riscv64"),
    ("s390x", "s390x"),
];

/// Canonical (platform, architecture) pair for release naming
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    /// Resolve the platform this binary is running on
    pub fn current() -> Self {
        Self::resolve(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Translate raw identifiers; unknown values pass through unchanged
    pub fn resolve(os: &str, arch: &str) -> Self {
        Self {
            os: lookup(PLATFORMS, os).to_string(),
            arch: lookup(ARCHES, arch).to_string(),
        }
    }

    /// Archive file name for this platform, e.g. `Xray-linux-64.zip`
    pub fn archive_name(&self) -> String {
        format!("Xray-{}-{}.zip", self.os, self.arch)
    }
}

fn lookup<'a>(table: &[(&str, &'a str)], raw: &'a str) -> &'a str {
    table
        .iter()
        .find(|(key, _)| *key == raw)
        .map(|(_, value)| *value)
        .unwrap_or(raw)
}
