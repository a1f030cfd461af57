//! Running external programs under a wall-clock limit.

use crate::convert::ConvertError;
use base64::Engine;
use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs `command` to completion, killing it once `timeout` has elapsed.
///
/// `input` is written to the child's stdin. Output streams are drained on
/// background threads so a chatty child cannot block on a full pipe.
pub fn run_with_timeout(
    mut command: Command,
    input: Option<Vec<u8>>,
    timeout: Duration,
) -> Result<Output, ConvertError> {
    let program = command.get_program().to_string_lossy().into_owned();
    command
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|source| ConvertError::Spawn {
        program: program.clone(),
        source,
    })?;

    if let (Some(data), Some(mut stdin)) = (input, child.stdin.take()) {
        thread::spawn(move || {
            let _ = stdin.write_all(&data);
        });
    }
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match wait_until(&mut child, timeout)? {
        Some(status) => status,
        None => {
            log::warn!("{} timed out after {:?}, killing it", program, timeout);
            kill(&mut child);
            return Err(ConvertError::Timeout { program, timeout });
        }
    };

    Ok(Output {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

/// Polls `child` until it exits or `timeout` elapses.
pub fn wait_until(child: &mut Child, timeout: Duration) -> Result<Option<ExitStatus>, ConvertError> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if started.elapsed() > timeout {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kills and reaps `child`, ignoring a child that already exited.
pub fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(stream: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut stream) = stream {
            let _ = stream.read_to_end(&mut buf);
        }
        buf
    })
}

/// Formats a command line for log messages.
pub fn describe(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|part| part.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `-EncodedCommand` payload for PowerShell: base64 of the UTF-16LE script.
pub fn encode_powershell(script: &str) -> String {
    let bytes: Vec<u8> = script.encode_utf16().flat_map(u16::to_le_bytes).collect();
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Quotes `value` as a PowerShell single-quoted string literal.
pub fn powershell_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
