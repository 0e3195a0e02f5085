use std::{
    io::Read,
    path::Path,
    process::{Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use semver::Version;
use tracing::{info, warn};

use crate::config;

/// Result of asking the deployed executable for its version. Informational
/// only; it never changes the outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Passed { version: String },
    BannerMismatch { output: String },
    VersionMismatch { expected: String, found: String },
    Failed(String),
}

/// How long the installed executable gets to answer `--version`.
pub const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub fn probe_version(exe: &Path) -> Verification {
    probe_version_with(exe, config::VERSION_BANNER, config::VERSION, VERSION_TIMEOUT)
}

pub fn probe_version_with(
    exe: &Path,
    banner: &str,
    expected: &str,
    timeout: Duration,
) -> Verification {
    let mut cmd = Command::new(exe);
    cmd.arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => return Verification::Failed(format!("spawn {}: {err}", exe.display())),
    };
    // Drained on its own thread so a chatty child cannot fill the pipe and stall.
    let reader = child.stdout.take().map(|mut stdout| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stdout.read_to_end(&mut buf);
            buf
        })
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Verification::Failed(format!(
                    "timed out after {}s",
                    timeout.as_secs_f32()
                ));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(err) => return Verification::Failed(format!("wait {}: {err}", exe.display())),
        }
    };
    if !status.success() {
        return Verification::Failed(format!(
            "exit {}",
            status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        ));
    }

    let stdout = reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    let text = String::from_utf8_lossy(&stdout).trim().to_string();
    evaluate(&text, banner, expected)
}

fn evaluate(text: &str, banner: &str, expected: &str) -> Verification {
    if !banner.is_empty() && !text.contains(banner) {
        return Verification::BannerMismatch {
            output: text.to_string(),
        };
    }
    let Some(found) = find_version(text) else {
        return Verification::Passed {
            version: String::new(),
        };
    };
    match Version::parse(expected) {
        Ok(want) if want != found => Verification::VersionMismatch {
            expected: want.to_string(),
            found: found.to_string(),
        },
        _ => Verification::Passed {
            version: found.to_string(),
        },
    }
}

fn find_version(text: &str) -> Option<Version> {
    text.split_whitespace()
        .map(|word| word.trim_start_matches('v'))
        .find_map(|word| Version::parse(word).ok())
}

pub fn log_outcome(outcome: &Verification) {
    match outcome {
        Verification::Passed { version } if version.is_empty() => info!("verified install"),
        Verification::Passed { version } => info!(%version, "verified install"),
        Verification::BannerMismatch { output } => {
            warn!(output = %output, "unexpected --version output")
        }
        Verification::VersionMismatch { expected, found } => {
            warn!(%expected, %found, "installed executable reports a different version")
        }
        Verification::Failed(reason) => warn!("verification failed: {reason}"),
    }
}
