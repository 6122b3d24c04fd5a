//! External control surface (§6): the state file and the single-instance
//! guard.
//!
//! The state file is the one place CLI verbs, the running application's
//! poller, and (eventually) a GUI toggle all agree on: `$HOME/.talkie`
//! holding `{"transcribing": <bool>}`. The poller here only reads it and
//! feeds edges into a [`talkie_core::control::RunFlag`] — writing back out
//! to the file happens through the same `RunFlag::on_change` callback a CLI
//! verb uses, so there is exactly one persistence path (§4.6).

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use talkie_core::control::RunFlag;
use tracing::{info, warn};

use crate::error::{AppError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StateFileContents {
    pub transcribing: bool,
}

/// `$HOME/.talkie`. No `XDG_STATE_HOME` equivalent in §6 — this one path is
/// the literal external contract CLI verbs and other processes read.
pub fn default_state_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".talkie")
}

pub fn read_state(path: &std::path::Path) -> Result<StateFileContents> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(StateFileContents {
                transcribing: false,
            })
        }
        Err(e) => return Err(AppError::StateFile(format!("reading {}: {e}", path.display()))),
    };
    serde_json::from_str(&contents)
        .map_err(|e| AppError::StateFile(format!("parsing {}: {e}", path.display())))
}

pub fn write_state(path: &std::path::Path, transcribing: bool) -> Result<()> {
    let contents = serde_json::to_string(&StateFileContents { transcribing })
        .expect("StateFileContents always serializes");
    std::fs::write(path, contents)
        .map_err(|e| AppError::StateFile(format!("writing {}: {e}", path.display())))
}

/// Apply a CLI verb (§6) against the state file and return the exit code.
pub fn run_cli_verb(verb: &str, path: &std::path::Path) -> Result<i32> {
    match verb {
        "start" => {
            write_state(path, true)?;
            Ok(0)
        }
        "stop" => {
            write_state(path, false)?;
            Ok(0)
        }
        "toggle" => {
            let current = read_state(path)?;
            write_state(path, !current.transcribing)?;
            Ok(0)
        }
        "state" => {
            let raw = std::fs::read_to_string(path).unwrap_or_else(|_| {
                serde_json::to_string(&StateFileContents {
                    transcribing: false,
                })
                .unwrap()
            });
            println!("{raw}");
            Ok(0)
        }
        other => {
            warn!(verb = other, "unrecognized CLI verb");
            Ok(1)
        }
    }
}

/// Polls the state file every ~500 ms and applies edges to `run_flag`.
/// Call `shutdown` to stop the poll thread and join it.
pub struct StatePoller {
    thread: Option<JoinHandle<()>>,
    stop: Arc<std::sync::atomic::AtomicBool>,
}

impl StatePoller {
    pub fn spawn(path: PathBuf, run_flag: Arc<RunFlag>) -> Self {
        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let stop2 = Arc::clone(&stop);
        let thread = std::thread::Builder::new()
            .name("talkie-state-poll".into())
            .spawn(move || {
                while !stop2.load(std::sync::atomic::Ordering::Relaxed) {
                    match read_state(&path) {
                        Ok(state) => {
                            run_flag.set(state.transcribing);
                        }
                        Err(e) => warn!(error = %e, "state file poll failed"),
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
            })
            .expect("spawning state poll thread");
        Self {
            thread: Some(thread),
            stop,
        }
    }

    pub fn shutdown(mut self) {
        self.stop.store(true, std::sync::atomic::Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            thread.join().ok();
        }
    }
}

// ---------------------------------------------------------------------------
// Single-instance guard (§4.6)
// ---------------------------------------------------------------------------

/// Held for the process lifetime; dropping it releases the guard.
pub struct SingleInstanceGuard {
    #[cfg(target_os = "windows")]
    mutex: isize,
    #[cfg(not(target_os = "windows"))]
    pid_file: PathBuf,
}

#[cfg(target_os = "windows")]
impl Drop for SingleInstanceGuard {
    fn drop(&mut self) {
        use windows_sys::Win32::Foundation::CloseHandle;
        unsafe {
            CloseHandle(self.mutex as _);
        }
    }
}

#[cfg(not(target_os = "windows"))]
impl Drop for SingleInstanceGuard {
    fn drop(&mut self) {
        std::fs::remove_file(&self.pid_file).ok();
    }
}

/// Reject a second process instance, raising the existing one via
/// best-effort IPC (§4.6: "advisory lock on the state file or a pid file...
/// raise the existing window via an IPC best-effort").
#[cfg(target_os = "windows")]
pub fn acquire_single_instance() -> Result<SingleInstanceGuard> {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::Foundation::{GetLastError, ERROR_ALREADY_EXISTS};
    use windows_sys::Win32::System::Threading::CreateMutexW;
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        FindWindowW, SetForegroundWindow, ShowWindow, SW_RESTORE,
    };

    fn to_wide(s: &str) -> Vec<u16> {
        OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
    }

    let mutex_name = to_wide("Global\\TalkieSingleInstance");
    let mutex = unsafe { CreateMutexW(std::ptr::null(), true.into(), mutex_name.as_ptr()) };
    if unsafe { GetLastError() } == ERROR_ALREADY_EXISTS {
        let window_title = to_wide("Talkie");
        let hwnd = unsafe { FindWindowW(std::ptr::null(), window_title.as_ptr()) };
        if !hwnd.is_null() {
            unsafe {
                ShowWindow(hwnd, SW_RESTORE);
                SetForegroundWindow(hwnd);
            }
        }
        return Err(AppError::AlreadyRunning);
    }
    Ok(SingleInstanceGuard {
        mutex: mutex as isize,
    })
}

/// Non-Windows fallback: a pid file next to the state file. A stale file
/// left behind by a killed process is detected by checking whether its pid
/// is still alive (`kill(pid, 0)`) and reclaimed rather than trusted.
#[cfg(not(target_os = "windows"))]
pub fn acquire_single_instance() -> Result<SingleInstanceGuard> {
    let pid_file = default_state_path().with_extension("pid");

    if let Ok(existing) = std::fs::read_to_string(&pid_file) {
        if let Ok(pid) = existing.trim().parse::<i32>() {
            if process_is_alive(pid) {
                info!(pid, "another talkie instance is already running");
                return Err(AppError::AlreadyRunning);
            }
            warn!(pid, "removing stale single-instance pid file");
        }
    }

    std::fs::write(&pid_file, std::process::id().to_string())
        .map_err(|e| AppError::StateFile(format!("writing {}: {e}", pid_file.display())))?;
    Ok(SingleInstanceGuard { pid_file })
}

#[cfg(unix)]
fn process_is_alive(pid: i32) -> bool {
    // Signal 0 performs no-op permission/existence checks only (man kill(2)).
    unsafe { libc_kill(pid, 0) == 0 }
}

#[cfg(not(any(unix, target_os = "windows")))]
fn process_is_alive(_pid: i32) -> bool {
    false
}

#[cfg(unix)]
extern "C" {
    #[link_name = "kill"]
    fn libc_kill(pid: i32, sig: i32) -> i32;
}

#[cfg(test)]
mod tests {
    use super::*;

    static COUNTER: std::sync::atomic::AtomicU32 = std::sync::atomic::AtomicU32::new(0);

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!(
            "talkie-state-test-{}-{}.json",
            std::process::id(),
            COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
        ))
    }

    #[test]
    fn missing_state_file_reads_as_not_transcribing() {
        let path = temp_path();
        let state = read_state(&path).unwrap();
        assert!(!state.transcribing);
    }

    #[test]
    fn start_stop_toggle_round_trip() {
        let path = temp_path();
        assert_eq!(run_cli_verb("start", &path).unwrap(), 0);
        assert!(read_state(&path).unwrap().transcribing);

        assert_eq!(run_cli_verb("toggle", &path).unwrap(), 0);
        assert!(!read_state(&path).unwrap().transcribing);

        assert_eq!(run_cli_verb("stop", &path).unwrap(), 0);
        assert!(!read_state(&path).unwrap().transcribing);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn unknown_verb_exits_nonzero() {
        let path = temp_path();
        assert_eq!(run_cli_verb("bogus", &path).unwrap(), 1);
    }

    #[test]
    fn poller_applies_external_edits_to_run_flag() {
        let path = temp_path();
        write_state(&path, true).unwrap();

        let observed = Arc::new(std::sync::Mutex::new(Vec::new()));
        let observed2 = Arc::clone(&observed);
        let run_flag = RunFlag::new(false, move |v| observed2.lock().unwrap().push(v));

        let poller = StatePoller::spawn(path.clone(), Arc::clone(&run_flag));
        std::thread::sleep(Duration::from_millis(700));
        poller.shutdown();

        assert!(run_flag.get());
        assert_eq!(*observed.lock().unwrap(), vec![true]);
        std::fs::remove_file(&path).ok();
    }
}
