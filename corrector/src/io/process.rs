//! Runs a backend command: prompt on stdin, bounded capture, hard timeout.

use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Wall-clock and memory bounds for one process run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessLimits {
    pub timeout: Duration,
    /// Bytes kept per stream; the rest is drained and counted.
    pub output_limit_bytes: usize,
}

/// One captured output stream.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Captured {
    pub bytes: Vec<u8>,
    pub dropped: u64,
}

impl Captured {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Captured,
    pub stderr: Captured,
    pub timed_out: bool,
}

/// Spawn `cmd`, feed it `input`, and collect its output within `limits`.
///
/// Input is written and both output pipes are drained on their own threads,
/// so the timeout runs from spawn whether or not the child reads its input.
/// A child still running after the timeout is killed and reported with
/// `timed_out`.
#[instrument(skip_all, fields(timeout_secs = limits.timeout.as_secs(), input_bytes = input.len()))]
pub fn run_with_input(
    mut cmd: Command,
    input: &[u8],
    limits: ProcessLimits,
) -> Result<ProcessOutput> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .inspect_err(|err| error!(err = %err, "failed to spawn command"))
        .context("spawn command")?;

    let stdout = spawn_capture(child.stdout.take(), limits.output_limit_bytes, "stdout")?;
    let stderr = spawn_capture(child.stderr.take(), limits.output_limit_bytes, "stderr")?;

    let child_stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("stdin was not piped"))?;
    let input = input.to_vec();
    let feeder = thread::spawn(move || feed(child_stdin, &input));

    let (status, timed_out) = wait_or_kill(&mut child, limits.timeout)?;
    join_feeder(feeder).context("write stdin")?;
    let stdout = join_capture(stdout).context("join stdout")?;
    let stderr = join_capture(stderr).context("join stderr")?;

    if stdout.dropped > 0 || stderr.dropped > 0 {
        warn!(
            stdout_dropped = stdout.dropped,
            stderr_dropped = stderr.dropped,
            "output truncated"
        );
    }
    debug!(exit_code = ?status.code(), timed_out, "command finished");

    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

fn wait_or_kill(child: &mut Child, timeout: Duration) -> Result<(ExitStatus, bool)> {
    if let Some(status) = child.wait_timeout(timeout).context("wait for command")? {
        return Ok((status, false));
    }
    warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
    child.kill().context("kill command")?;
    let status = child.wait().context("wait command after kill")?;
    Ok((status, true))
}

/// Write `input` and close the pipe. The child may exit or be killed before
/// reading all of it.
fn feed<W: Write>(mut pipe: W, input: &[u8]) -> io::Result<()> {
    match pipe.write_all(input) {
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

fn join_feeder(handle: JoinHandle<io::Result<()>>) -> Result<()> {
    handle
        .join()
        .map_err(|_| anyhow!("stdin writer thread panicked"))?
        .map_err(anyhow::Error::from)
}

fn spawn_capture<R>(
    pipe: Option<R>,
    limit: usize,
    name: &str,
) -> Result<JoinHandle<Result<Captured>>>
where
    R: Read + Send + 'static,
{
    let pipe = pipe.ok_or_else(|| anyhow!("{name} was not piped"))?;
    Ok(thread::spawn(move || capture(pipe, limit)))
}

fn join_capture(handle: JoinHandle<Result<Captured>>) -> Result<Captured> {
    handle
        .join()
        .map_err(|_| anyhow!("output reader thread panicked"))?
}

/// Keep the first `limit` bytes of `reader` and count everything after.
fn capture<R: Read>(reader: R, limit: usize) -> Result<Captured> {
    let mut head = reader.take(u64::try_from(limit).unwrap_or(u64::MAX));
    let mut bytes = Vec::new();
    head.read_to_end(&mut bytes).context("read output")?;
    let dropped = io::copy(&mut head.into_inner(), &mut io::sink()).context("drain output")?;
    Ok(Captured { bytes, dropped })
}
