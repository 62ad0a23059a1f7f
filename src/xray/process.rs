//! OS process capability
//!
//! Everything the manager needs from the operating system to run the core:
//! launching it detached, sending it a termination signal by pid, checking
//! liveness, and running its config self-test.

use super::config::XRAY_BINARY;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, Signal, System};

/// Process operations used by the controller and validator
pub trait CoreProcess: Send + Sync {
    /// Launch `binary` with `args` detached from the caller; returns its pid
    fn spawn(&self, binary: &Path, args: &[String]) -> io::Result<u32>;

    /// Ask `pid` to terminate; returns false if no such process
    fn terminate(&self, pid: u32) -> bool;

    /// Whether `pid` refers to a live (non-zombie) xray process
    fn is_alive(&self, pid: u32) -> bool;

    /// Run `binary` to completion and capture stdout; non-zero exit is an error
    fn self_test(&self, binary: &Path, args: &[String]) -> io::Result<String>;
}

/// `CoreProcess` backed by std::process and sysinfo
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcess;

impl SystemProcess {
    fn refreshed(pid: Pid) -> System {
        let mut sys = System::new();
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::new(),
        );
        sys
    }

    /// Whether `process` is an xray core rather than whatever reused its pid
    fn is_core(process: &Process) -> bool {
        process.name().to_string_lossy().to_lowercase() == XRAY_BINARY
    }
}

/// Resolve a relative binary against the caller's working directory
fn absolute_binary(binary: &Path) -> io::Result<PathBuf> {
    if binary.is_absolute() {
        Ok(binary.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(binary))
    }
}

impl CoreProcess for SystemProcess {
    fn spawn(&self, binary: &Path, args: &[String]) -> io::Result<u32> {
        let binary = absolute_binary(binary)?;
        let mut cmd = Command::new(&binary);
        cmd.args(args);

        if let Some(dir) = binary.parent() {
            cmd.current_dir(dir);
        }

        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
        cmd.stdin(Stdio::null());

        // Own process group so a Ctrl-C aimed at the manager leaves the core alone
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        log::info!("Starting xray: {:?}", cmd);
        let mut child = cmd.spawn()?;
        let pid = child.id();

        // Reap the child when it exits so it never lingers as a zombie
        std::thread::spawn(move || {
            match child.wait() {
                Ok(status) => log::info!("xray (PID {}) exited with {}", pid, status),
                Err(e) => log::warn!("Failed to wait on xray (PID {}): {}", pid, e),
            }
        });

        Ok(pid)
    }

    fn terminate(&self, pid: u32) -> bool {
        let pid = Pid::from_u32(pid);
        let sys = Self::refreshed(pid);

        match sys.process(pid) {
            Some(process) if Self::is_core(process) => {
                process.kill_with(Signal::Term).unwrap_or_else(|| process.kill())
            }
            Some(process) => {
                log::warn!(
                    "PID {} belongs to {:?}, not xray; leaving it alone",
                    pid,
                    process.name()
                );
                false
            }
            None => false,
        }
    }

    fn is_alive(&self, pid: u32) -> bool {
        let pid = Pid::from_u32(pid);
        let sys = Self::refreshed(pid);

        sys.process(pid)
            .filter(|process| Self::is_core(process))
            .map(|process| !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
            .unwrap_or(false)
    }

    fn self_test(&self, binary: &Path, args: &[String]) -> io::Result<String> {
        let mut cmd = Command::new(binary);
        cmd.args(args);
        cmd.stdin(Stdio::null());

        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let output = cmd.output()?;
        if !output.status.success() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!(
                    "{} exited with {}: {}",
                    binary.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stdout).trim()
                ),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
