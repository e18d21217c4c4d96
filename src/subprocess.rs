//! Runs an external tool under a deadline. Input is fed from its own thread so
//! a child that never reads stdin cannot outlive the timeout.

use anyhow::{bail, Context};
use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub(crate) struct Finished {
    pub status: ExitStatus,
    pub stderr: Vec<u8>,
}

impl Finished {
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Spawns `cmd`, writes `input` to its stdin (or gives it a null stdin),
/// collects stderr and waits. Past `timeout` the child is killed and an
/// error returned. A non-zero exit is returned as `Finished`, not an error.
pub(crate) fn run(
    mut cmd: Command,
    program: &str,
    input: Option<Vec<u8>>,
    timeout: Option<Duration>,
) -> anyhow::Result<Finished> {
    let stdin = if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    };
    cmd.stdin(stdin).stdout(Stdio::null()).stderr(Stdio::piped());

    let started = Instant::now();
    let mut child = cmd.spawn().with_context(|| format!("spawn {program}"))?;

    let writer = match (input, child.stdin.take()) {
        (Some(bytes), Some(mut stdin)) => Some(thread::spawn(move || stdin.write_all(&bytes))),
        _ => None,
    };

    let Some(mut stderr) = child.stderr.take() else {
        kill(&mut child);
        bail!("capture {program} stderr");
    };
    let reader = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stderr.read_to_end(&mut buf);
        buf
    });

    let status = wait(&mut child, program, started, timeout);
    let stderr = reader.join().unwrap_or_default();
    let status = status?;

    if let Some(writer) = writer {
        match writer.join() {
            Ok(Ok(())) => {}
            // The exit status and stderr say more than a broken pipe.
            Ok(Err(_)) if !status.success() => {}
            Ok(Err(err)) => return Err(err).with_context(|| format!("write input to {program}")),
            Err(_) => bail!("{program} input writer panicked"),
        }
    }

    Ok(Finished { status, stderr })
}

fn wait(
    child: &mut Child,
    program: &str,
    started: Instant,
    timeout: Option<Duration>,
) -> anyhow::Result<ExitStatus> {
    let Some(deadline) = timeout else {
        return child.wait().with_context(|| format!("wait for {program}"));
    };

    loop {
        if let Some(status) = child.try_wait().with_context(|| format!("poll {program}"))? {
            return Ok(status);
        }
        if started.elapsed() >= deadline {
            kill(child);
            bail!("{program} timed out after {:.1}s", deadline.as_secs_f32());
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn collects_stderr_and_exit_status() {
        let finished = run(sh("cat >/dev/null; echo oops >&2; exit 3"), "sh", Some(b"hi".to_vec()), None)
            .unwrap();
        assert_eq!(finished.status.code(), Some(3));
        assert_eq!(finished.stderr_lossy(), "oops");
    }

    #[test]
    fn child_that_never_reads_stdin_still_times_out() {
        let input = vec![b'x'; 4 * 1024 * 1024];
        let started = Instant::now();

        let err = run(
            sh("exec sleep 5"),
            "sh",
            Some(input),
            Some(Duration::from_millis(200)),
        )
        .unwrap_err();

        assert!(err.to_string().contains("timed out"), "{err:#}");
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn missing_program_is_an_error() {
        let err = run(Command::new("/no/such/tool"), "tool", None, None).unwrap_err();
        assert!(err.to_string().contains("spawn tool"));
    }
}
