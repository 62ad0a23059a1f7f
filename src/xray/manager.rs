//! Core process management
//!
//! Handles starting, stopping, and restarting the xray process. The PID
//! file is the only record of a running core; there is no in-memory state
//! shared between calls. Callers run one lifecycle operation at a time.

use super::config::CorePaths;
use super::error::{CoreError, Result};
use super::ports::{self, PortOutcome};
use super::process::{CoreProcess, SystemProcess};
use super::state::{CoreStatus, StartOutcome, StopOutcome};
use super::store::ConfigStore;
use super::validator::ConfigValidator;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Manages the xray process through its PID file
pub struct CoreManager {
    paths: CorePaths,
    store: ConfigStore,
    validator: ConfigValidator,
    process: Arc<dyn CoreProcess>,
}

impl CoreManager {
    /// Create a manager over `paths` using real OS processes
    pub fn new(paths: CorePaths) -> Self {
        Self::with_process(paths, Arc::new(SystemProcess))
    }

    /// Create a manager with a custom process capability
    pub fn with_process(paths: CorePaths, process: Arc<dyn CoreProcess>) -> Self {
        let paths = paths.absolutize();
        let store = ConfigStore::new(paths.config());
        let validator = ConfigValidator::new(paths.binary(), paths.config(), process.clone());
        Self {
            paths,
            store,
            validator,
            process,
        }
    }

    pub fn paths(&self) -> &CorePaths {
        &self.paths
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn validator(&self) -> &ConfigValidator {
        &self.validator
    }

    /// Start xray against the managed config
    pub fn start(&self) -> Result<StartOutcome> {
        log::info!("Starting xray...");

        if !self.validator.validate_default() {
            log::warn!(
                "Config at {} is missing or invalid, writing default",
                self.store.path().display()
            );
            self.store.write_default()?;
        }

        let Some(mut config) = self.store.read() else {
            log::info!("No core config available, nothing to start");
            return Ok(StartOutcome::SkippedNoConfig);
        };

        if config.first_inbound_port().is_none() {
            log::info!("Core config has no inbound port, nothing to start");
            return Ok(StartOutcome::SkippedNoInbound);
        }

        if let PortOutcome::Reassigned { from, to } = ports::reconcile(&mut config, &self.store)? {
            log::info!("Launching on port {} instead of {}", to, from);
        }

        let args = vec![
            "run".to_string(),
            "-c".to_string(),
            self.paths.config().to_string_lossy().into_owned(),
        ];
        let pid = self
            .process
            .spawn(&self.paths.binary(), &args)
            .map_err(CoreError::Spawn)?;

        self.write_pid(pid)?;
        log::info!("xray started with PID {}", pid);

        Ok(StartOutcome::Started(pid))
    }

    /// Send a termination signal to the recorded process
    ///
    /// Returns as soon as the signal is sent. The PID file is left in place.
    pub fn stop(&self) -> Result<StopOutcome> {
        log::info!("Stopping xray...");

        let pid_path = self.paths.pid_file();
        let contents = match fs::read_to_string(&pid_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("No PID file at {}, xray was not started here", pid_path.display());
                return Ok(StopOutcome::NotTracked);
            }
            Err(e) => return Err(e.into()),
        };

        let Some(pid) = parse_pid(&contents) else {
            if !contents.trim().is_empty() {
                log::warn!("Ignoring unreadable PID file {}", pid_path.display());
            }
            return Ok(StopOutcome::Empty);
        };

        if !self.process.is_alive(pid) {
            log::info!("xray (PID {}) is no longer running", pid);
            return Ok(StopOutcome::Stale(pid));
        }

        if self.process.terminate(pid) {
            log::info!("Sent termination signal to xray (PID {})", pid);
            Ok(StopOutcome::Signalled(pid))
        } else {
            log::info!("xray (PID {}) exited before it could be signalled", pid);
            Ok(StopOutcome::Stale(pid))
        }
    }

    /// Stop then start; does not wait for the old process to exit
    pub fn restart(&self) -> Result<(StopOutcome, StartOutcome)> {
        log::info!("Restarting xray...");
        let stopped = self.stop()?;
        let started = self.start()?;
        Ok((stopped, started))
    }

    /// Process id recorded in the PID file
    pub fn recorded_pid(&self) -> Option<u32> {
        fs::read_to_string(self.paths.pid_file())
            .ok()
            .and_then(|contents| parse_pid(&contents))
    }

    /// Whether the recorded process is alive
    pub fn is_running(&self) -> bool {
        self.recorded_pid()
            .map(|pid| self.process.is_alive(pid))
            .unwrap_or(false)
    }

    /// Installed / configured / running snapshot
    pub fn status(&self) -> CoreStatus {
        let config = self.store.read();
        let pid = self.recorded_pid();
        let running = pid.map(|pid| self.process.is_alive(pid)).unwrap_or(false);

        CoreStatus {
            installed: self.paths.binary().exists(),
            configured: config.is_some(),
            running,
            pid: if running { pid } else { None },
            port: config.as_ref().and_then(|c| c.first_inbound_port()),
            binary: self.paths.binary().to_string_lossy().to_string(),
            config: self.paths.config().to_string_lossy().to_string(),
        }
    }

    fn write_pid(&self, pid: u32) -> Result<()> {
        let pid_path = self.paths.pid_file();
        if let Some(parent) = pid_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&pid_path, pid.to_string())?;
        Ok(())
    }
}

fn parse_pid(contents: &str) -> Option<u32> {
    contents.trim().parse::<u32>().ok().filter(|pid| *pid != 0)
}

/// Removes the PID file when the owning session ends
///
/// Only the manager's own bookkeeping is cleaned up; the core process is
/// not touched.
pub struct PidFileGuard {
    path: PathBuf,
}

impl PidFileGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Removed PID file {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove PID file {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xray::process::fake::{Call, FakeProcess};
    use crate::xray::xray_config::{Inbound, XrayConfig};
    use serde_json::{json, Value};
    use std::net::{Ipv4Addr, TcpListener};
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    fn setup(process: FakeProcess) -> (TempDir, Arc<FakeProcess>, CoreManager) {
        let dir = tempdir().unwrap();
        let paths = CorePaths::new(dir.path().join("core"), dir.path().join("data"));
        let process = Arc::new(process);
        let manager = CoreManager::with_process(paths, process.clone());
        (dir, process, manager)
    }

    fn config_on_port(port: u16) -> XrayConfig {
        let mut config = XrayConfig::default_config();
        config.inbounds[0].set_port(port);
        config
    }

    #[test]
    fn test_start_spawns_and_records_pid() {
        let (_dir, process, manager) = setup(FakeProcess::new());
        let port = ports::free_port().unwrap();
        manager.store().write(&config_on_port(port)).unwrap();

        let outcome = manager.start().unwrap();

        let StartOutcome::Started(pid) = outcome else {
            panic!("expected start, got {:?}", outcome);
        };
        assert_eq!(manager.recorded_pid(), Some(pid));
        assert!(manager.is_running());

        let spawn = process
            .calls()
            .into_iter()
            .find(|call| matches!(call, Call::Spawn { .. }))
            .unwrap();
        assert_eq!(
            spawn,
            Call::Spawn {
                binary: manager.paths().binary(),
                args: vec![
                    "run".to_string(),
                    "-c".to_string(),
                    manager.paths().config().to_string_lossy().into_owned(),
                ],
            }
        );
    }

    #[test]
    fn test_start_without_config_falls_back_to_default() {
        let (_dir, process, manager) = setup(FakeProcess::new());
        assert!(manager.store().read().is_none());

        let outcome = manager.start().unwrap();

        assert!(outcome.pid().is_some());
        let config = manager.store().read().unwrap();
        assert!(!config.inbounds.is_empty());
        assert_eq!(config.outbounds, XrayConfig::default_config().outbounds);
        // Missing file means no self-test was attempted
        assert!(!process
            .calls()
            .iter()
            .any(|call| matches!(call, Call::SelfTest { .. })));
    }

    #[test]
    fn test_invalid_config_is_replaced_by_default() {
        let (_dir, _process, manager) = setup(FakeProcess::new().failing_self_test());
        let custom = XrayConfig {
            inbounds: vec![Inbound {
                port: Some(Value::from(ports::free_port().unwrap())),
                ..Default::default()
            }],
            ..Default::default()
        };
        manager.store().write(&custom).unwrap();

        manager.start().unwrap();

        let stored = manager.store().read().unwrap();
        assert_eq!(stored.outbounds, XrayConfig::default_config().outbounds);
    }

    #[test]
    fn test_start_with_zero_inbounds_is_skipped() {
        let (_dir, process, manager) = setup(FakeProcess::new());
        manager.store().write(&XrayConfig::default()).unwrap();

        let outcome = manager.start().unwrap();

        assert_eq!(outcome, StartOutcome::SkippedNoInbound);
        assert_eq!(process.spawn_count(), 0);
        assert!(!manager.paths().pid_file().exists());
    }

    #[test]
    fn test_start_with_portless_inbound_is_skipped() {
        let (_dir, process, manager) = setup(FakeProcess::new());
        manager
            .store()
            .write(&XrayConfig {
                inbounds: vec![Inbound {
                    protocol: Some("socks".to_string()),
                    ..Default::default()
                }],
                ..Default::default()
            })
            .unwrap();

        assert_eq!(manager.start().unwrap(), StartOutcome::SkippedNoInbound);
        assert_eq!(process.spawn_count(), 0);
    }

    #[test]
    fn test_start_with_port_zero_is_skipped() {
        let (_dir, process, manager) = setup(FakeProcess::new());
        manager.store().write(&config_on_port(0)).unwrap();

        assert_eq!(manager.start().unwrap(), StartOutcome::SkippedNoInbound);
        assert_eq!(process.spawn_count(), 0);
        assert!(!manager.paths().pid_file().exists());
    }

    #[test]
    fn test_start_with_string_port() {
        let (_dir, process, manager) = setup(FakeProcess::new());
        let port = ports::free_port().unwrap();
        let mut config = XrayConfig::default_config();
        config.inbounds[0].port = Some(json!(port.to_string()));
        manager.store().write(&config).unwrap();

        let outcome = manager.start().unwrap();

        assert!(matches!(outcome, StartOutcome::Started(_)));
        assert_eq!(process.spawn_count(), 1);
        // Free port left as the user wrote it
        assert_eq!(
            manager.store().read().unwrap().inbounds[0].port,
            Some(json!(port.to_string()))
        );
    }

    #[test]
    fn test_relative_paths_are_made_absolute() {
        let process = Arc::new(FakeProcess::new());
        let manager = CoreManager::with_process(
            CorePaths::new("relative-core", "relative-data"),
            process.clone(),
        );

        let cwd = std::env::current_dir().unwrap();
        assert_eq!(manager.paths().install_dir, cwd.join("relative-core"));
        assert_eq!(manager.paths().data_dir, cwd.join("relative-data"));
        assert!(manager.paths().binary().is_absolute());
        assert!(manager.store().path().is_absolute());
    }

    #[test]
    fn test_occupied_port_is_reassigned_before_spawn() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let taken = listener.local_addr().unwrap().port();

        let seen_port = Arc::new(Mutex::new(None));
        let seen = seen_port.clone();
        let (_dir, _process, manager) = setup(FakeProcess::new().on_spawn(move |args| {
            let config: XrayConfig =
                serde_json::from_str(&fs::read_to_string(&args[2]).unwrap()).unwrap();
            *seen.lock().unwrap() = config.first_inbound_port();
        }));
        manager.store().write(&config_on_port(taken)).unwrap();

        manager.start().unwrap();

        let persisted = manager.store().read().unwrap().first_inbound_port().unwrap();
        assert_ne!(persisted, taken);
        assert_eq!(*seen_port.lock().unwrap(), Some(persisted));
    }

    #[test]
    fn test_spawn_failure_is_an_error() {
        let (_dir, _process, manager) = setup(FakeProcess::new().failing_spawn());
        manager
            .store()
            .write(&config_on_port(ports::free_port().unwrap()))
            .unwrap();

        let err = manager.start().unwrap_err();
        assert!(matches!(err, CoreError::Spawn(_)));
        assert!(!manager.paths().pid_file().exists());
    }

    #[test]
    fn test_stop_without_pid_file_is_not_tracked() {
        let (_dir, process, manager) = setup(FakeProcess::new());

        assert_eq!(manager.stop().unwrap(), StopOutcome::NotTracked);
        assert!(!manager.paths().pid_file().exists());
        assert!(process.calls().is_empty());
    }

    #[test]
    fn test_stop_with_empty_pid_file() {
        let (_dir, process, manager) = setup(FakeProcess::new());
        fs::create_dir_all(&manager.paths().data_dir).unwrap();
        fs::write(manager.paths().pid_file(), "").unwrap();

        assert_eq!(manager.stop().unwrap(), StopOutcome::Empty);

        fs::write(manager.paths().pid_file(), "not-a-pid").unwrap();
        assert_eq!(manager.stop().unwrap(), StopOutcome::Empty);
        assert!(process.calls().is_empty());
    }

    #[test]
    fn test_stop_signals_running_process() {
        let (_dir, process, manager) = setup(FakeProcess::new());
        fs::create_dir_all(&manager.paths().data_dir).unwrap();
        fs::write(manager.paths().pid_file(), "777").unwrap();
        process.mark_alive(777);

        assert_eq!(manager.stop().unwrap(), StopOutcome::Signalled(777));
        assert_eq!(process.calls(), vec![Call::Terminate(777)]);
        // Stop never removes the PID file itself
        assert!(manager.paths().pid_file().exists());
    }

    #[test]
    fn test_stop_with_stale_pid_sends_nothing() {
        let (_dir, process, manager) = setup(FakeProcess::new());
        fs::create_dir_all(&manager.paths().data_dir).unwrap();
        fs::write(manager.paths().pid_file(), "31337\n").unwrap();

        assert_eq!(manager.stop().unwrap(), StopOutcome::Stale(31337));
        assert!(process.calls().is_empty());
    }

    #[test]
    fn test_restart_terminates_before_recording_new_pid() {
        let (_dir, process, manager) = setup(FakeProcess::new());
        manager
            .store()
            .write(&config_on_port(ports::free_port().unwrap()))
            .unwrap();

        let first = manager.start().unwrap().pid().unwrap();
        let (stopped, started) = manager.restart().unwrap();
        let second = started.pid().unwrap();

        assert_eq!(stopped, StopOutcome::Signalled(first));
        assert_ne!(first, second);
        assert_eq!(manager.recorded_pid(), Some(second));

        let calls = process.calls();
        let terminate_at = calls
            .iter()
            .position(|call| *call == Call::Terminate(first))
            .unwrap();
        let respawn_at = calls
            .iter()
            .rposition(|call| matches!(call, Call::Spawn { .. }))
            .unwrap();
        assert!(terminate_at < respawn_at);
    }

    #[test]
    fn test_status_reflects_lifecycle() {
        let (_dir, _process, manager) = setup(FakeProcess::new());

        let status = manager.status();
        assert!(!status.installed);
        assert!(!status.configured);
        assert!(!status.running);

        let port = ports::free_port().unwrap();
        manager.store().write(&config_on_port(port)).unwrap();
        let pid = manager.start().unwrap().pid().unwrap();

        let status = manager.status();
        assert!(status.configured);
        assert!(status.running);
        assert_eq!(status.pid, Some(pid));
        assert_eq!(status.port, Some(port));
    }

    #[test]
    fn test_pid_file_guard_removes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("xray.pid");
        fs::write(&path, "123").unwrap();

        drop(PidFileGuard::new(&path));
        assert!(!path.exists());

        // Missing file is fine
        drop(PidFileGuard::new(&path));
    }

    #[test]
    fn test_parse_pid() {
        assert_eq!(parse_pid("42"), Some(42));
        assert_eq!(parse_pid(" 42\n"), Some(42));
        assert_eq!(parse_pid(""), None);
        assert_eq!(parse_pid("0"), None);
        assert_eq!(parse_pid("-1"), None);
    }
}
