use std::{
    io::{self, Read},
    path::Path,
    process::{Command, Stdio},
    thread,
};

use anyhow::{Context, Result};

const DEFAULT_MAX_CAPTURE_BYTES: usize = 1024 * 1024;

fn max_capture_bytes() -> usize {
    std::env::var("FROZENPKG_MAX_CAPTURE_BYTES")
        .ok()
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_MAX_CAPTURE_BYTES)
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Stdout followed by stderr, for surfacing a failed tool's output.
    pub fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&self.stderr);
        }
        text
    }
}

/// Execute a program and capture stdout/stderr.
///
/// Blocks until the child exits; there is no timeout.
///
/// # Errors
///
/// Returns an error when the program cannot be spawned or the I/O streams cannot
/// be read entirely.
pub fn run_command(
    program: &Path,
    args: &[String],
    envs: &[(String, String)],
    cwd: &Path,
) -> Result<RunOutput> {
    let mut command = Command::new(program);
    command.args(args);
    for (key, value) in envs {
        command.env(key, value);
    }
    command.current_dir(cwd);
    command.stdin(Stdio::null());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    let display = program.display().to_string();
    let mut child = command
        .spawn()
        .with_context(|| format!("failed to start {display}"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow::anyhow!("stdout missing for {display}"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow::anyhow!("stderr missing for {display}"))?;
    let limit = max_capture_bytes();
    let stdout_handle = thread::spawn(move || read_to_string_limited(stdout, limit));
    let stderr_handle = thread::spawn(move || read_to_string_limited(stderr, limit));

    let status = child
        .wait()
        .with_context(|| format!("failed to wait for {display}"))?;
    let code = status.code().unwrap_or(-1);
    let (mut stdout, stdout_truncated) = stdout_handle
        .join()
        .map_err(|_| anyhow::anyhow!("stdout thread panicked"))??;
    let (mut stderr, stderr_truncated) = stderr_handle
        .join()
        .map_err(|_| anyhow::anyhow!("stderr thread panicked"))??;
    if stdout_truncated {
        stdout.push_str("\n[...truncated...]\n");
    }
    if stderr_truncated {
        stderr.push_str("\n[...truncated...]\n");
    }
    Ok(RunOutput {
        code,
        stdout,
        stderr,
    })
}

/// Execute a program with stdout and stderr sharing one pipe, so the
/// captured text keeps the order the tool wrote it in.
///
/// The interleaved text lands in `stdout`; `stderr` stays empty.
///
/// # Errors
///
/// Returns an error when the pipe cannot be created, the program cannot be
/// spawned or its output cannot be read.
pub fn run_command_interleaved(
    program: &Path,
    args: &[String],
    envs: &[(String, String)],
    cwd: &Path,
) -> Result<RunOutput> {
    let display = program.display().to_string();
    let (reader, writer) = io::pipe().context("failed to create output pipe")?;
    let error_writer = writer
        .try_clone()
        .context("failed to duplicate output pipe")?;

    let mut command = Command::new(program);
    command.args(args);
    for (key, value) in envs {
        command.env(key, value);
    }
    command.current_dir(cwd);
    command.stdin(Stdio::null());
    command.stdout(writer);
    command.stderr(error_writer);
    let mut child = command
        .spawn()
        .with_context(|| format!("failed to start {display}"))?;
    // the builder holds the write ends; reading would never see EOF
    drop(command);

    let (mut stdout, truncated) = read_to_string_limited(reader, max_capture_bytes())?;
    let status = child
        .wait()
        .with_context(|| format!("failed to wait for {display}"))?;
    if truncated {
        stdout.push_str("\n[...truncated...]\n");
    }
    Ok(RunOutput {
        code: status.code().unwrap_or(-1),
        stdout,
        stderr: String::new(),
    })
}

fn read_to_string_limited(mut reader: impl Read, limit: usize) -> Result<(String, bool)> {
    let mut buffer = Vec::new();
    let mut truncated = false;
    let mut chunk = [0u8; 8192];
    loop {
        let read = reader.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        if buffer.len().saturating_add(read) <= limit {
            buffer.extend_from_slice(&chunk[..read]);
        } else {
            // keep the tail; tool errors are usually printed last
            truncated = true;
            buffer.extend_from_slice(&chunk[..read]);
            let excess = buffer.len() - limit;
            buffer.drain(0..excess);
        }
    }
    Ok((String::from_utf8_lossy(&buffer).to_string(), truncated))
}
