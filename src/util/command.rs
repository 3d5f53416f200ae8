use anyhow::{Context, Result};
use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How a bounded child process ended.
#[derive(Debug)]
pub enum RunOutcome {
    Exited { status: ExitStatus, stdout: String, stderr: String },
    /// The program could not be found on PATH.
    Missing,
    /// Killed after exceeding its time bound.
    TimedOut,
}

impl RunOutcome {
    /// Trimmed stderr, or stdout when stderr is empty. Used for failure messages.
    pub fn diagnostic(&self) -> String {
        match self {
            RunOutcome::Exited { stdout, stderr, .. } => {
                let s = if stderr.trim().is_empty() { stdout } else { stderr };
                s.trim().to_string()
            }
            RunOutcome::Missing  => "command not found".to_string(),
            RunOutcome::TimedOut => "timed out".to_string(),
        }
    }
}

/// Run `cmd` to completion, killing it once `timeout` elapses.
///
/// Output is drained after the child exits, so this is only meant for tools
/// that print little (df, dd, fsutil).
pub fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<RunOutcome> {
    log::debug!("running {:?} (timeout {}s)", cmd, timeout.as_secs());
    let spawned = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();

    let mut child = match spawned {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(RunOutcome::Missing),
        Err(e) => return Err(e).with_context(|| format!("failed to start {:?}", cmd.get_program())),
    };

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            log::warn!("{:?} exceeded {}s, killing it", cmd.get_program(), timeout.as_secs());
            let _ = child.kill();
            let _ = child.wait();
            return Ok(RunOutcome::TimedOut);
        }
        thread::sleep(POLL_INTERVAL);
    };

    let (stdout, stderr) = drain(&mut child);
    Ok(RunOutcome::Exited { status, stdout, stderr })
}

fn drain(child: &mut Child) -> (String, String) {
    let mut stdout = String::new();
    let mut stderr = String::new();
    if let Some(mut out) = child.stdout.take() {
        let _ = out.read_to_string(&mut stdout);
    }
    if let Some(mut err) = child.stderr.take() {
        let _ = err.read_to_string(&mut stderr);
    }
    (stdout, stderr)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_output_of_quick_command() {
        let out = run_with_timeout(Command::new("sh").args(["-c", "echo hi; echo oops >&2"]), Duration::from_secs(5)).unwrap();
        match &out {
            RunOutcome::Exited { status, stdout, .. } => {
                assert!(status.success());
                assert_eq!(stdout.trim(), "hi");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(out.diagnostic(), "oops");
    }

    #[test]
    fn missing_program_is_reported_as_missing() {
        let out = run_with_timeout(&mut Command::new("definitely-not-a-real-tool-4711"), Duration::from_secs(1)).unwrap();
        assert!(matches!(out, RunOutcome::Missing));
    }

    #[test]
    fn slow_program_is_killed() {
        let started = Instant::now();
        let out = run_with_timeout(Command::new("sleep").arg("5"), Duration::from_millis(200)).unwrap();
        assert!(matches!(out, RunOutcome::TimedOut));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
