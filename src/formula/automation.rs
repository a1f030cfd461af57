//! Formula rendering through a word processor automation host.
//!
//! Long automation sessions are fragile, so rendering is driven in batches:
//! the host is restarted every `batch_size` formulas, restarted again after a
//! crash (up to `max_retries` times), and every session resumes from the
//! files already on disk.

use super::{checkpoint, FORMULA_PREFIX};
use crate::config::AutomationSettings;
use crate::process;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutomationError {
    /// The host cannot run here at all. Not retried.
    #[error("automation host unavailable: {0}")]
    Unavailable(String),

    /// The host failed mid-session. Retried with a fresh session.
    #[error("automation host failed: {0}")]
    Failed(String),
}

/// A process able to render the document's formulas by index.
pub trait AutomationHost {
    /// Starts a fresh session with the document open.
    fn start(&mut self) -> Result<(), AutomationError>;

    /// Number of formulas in the open document.
    fn formula_count(&mut self) -> Result<usize, AutomationError>;

    /// Renders formula `index` (1-based) to `output`. `Ok(false)` means the
    /// host produced no picture for it.
    fn render(&mut self, index: usize, output: &Path) -> Result<bool, AutomationError>;

    /// Ends the session. Must be safe to call when no session is running.
    fn stop(&mut self);
}

enum Session {
    Finished,
    Restart { next: usize },
}

/// Renders every formula `host` reports into `out_dir` as
/// `omml_NNNNNN.<ext>`, returning all completed outputs.
pub fn render_resumable(
    host: &mut dyn AutomationHost,
    out_dir: &Path,
    settings: &AutomationSettings,
    ext: &str,
) -> Vec<PathBuf> {
    let batch_size = settings.batch_size.max(AutomationSettings::MIN_BATCH_SIZE);
    let mut start = checkpoint::next_index(out_dir, FORMULA_PREFIX, ext);
    let mut retries_left = settings.max_retries;

    loop {
        let outcome = run_session(host, out_dir, batch_size, ext, start);
        host.stop();
        match outcome {
            Ok(Session::Finished) => break,
            Ok(Session::Restart { next }) => {
                log::info!("Proactive restart, continuing from formula {}", next);
                start = next;
            }
            Err(AutomationError::Unavailable(reason)) => {
                log::info!("Automation host unavailable: {}", reason);
                break;
            }
            Err(err) => {
                log::warn!("Automation session crashed: {}", err);
                if retries_left == 0 {
                    log::error!("No retries left, stopping at formula {}", start);
                    break;
                }
                retries_left -= 1;
                start = start.max(checkpoint::next_index(out_dir, FORMULA_PREFIX, ext));
                thread::sleep(settings.retry_delay);
            }
        }
    }

    checkpoint::rendered_files(out_dir, FORMULA_PREFIX, ext)
        .into_iter()
        .map(|(_, path)| path)
        .collect()
}

fn run_session(
    host: &mut dyn AutomationHost,
    out_dir: &Path,
    batch_size: usize,
    ext: &str,
    start: usize,
) -> Result<Session, AutomationError> {
    host.start()?;
    let total = host.formula_count()?;
    log::info!("Formulas total={}, resume from={}", total, start);

    let mut rendered = 0;
    for index in start..=total {
        if checkpoint::is_done(out_dir, FORMULA_PREFIX, index, ext) {
            continue;
        }
        let output = out_dir.join(checkpoint::file_name(FORMULA_PREFIX, index, ext));
        if !host.render(index, &output)? {
            log::debug!("No picture produced for formula {}", index);
        }
        rendered += 1;
        if index % 25 == 0 {
            log::debug!("Rendered formula {}/{}", index, total);
        }
        if rendered >= batch_size && index < total {
            return Ok(Session::Restart { next: index + 1 });
        }
    }
    Ok(Session::Finished)
}

const WORD_SCRIPT: &str = r#"
$ErrorActionPreference = 'Stop'
$word = New-Object -ComObject Word.Application
$word.Visible = $false
$word.DisplayAlerts = 0
try { $word.Options.CheckSpellingAsYouType = $false; $word.Options.CheckGrammarAsYouType = $false } catch {}
$doc = $null
$running = $true
[Console]::Out.WriteLine('READY')
[Console]::Out.Flush()
while ($running) {
  $line = [Console]::In.ReadLine()
  if ($line -eq $null) { break }
  $parts = $line.Split("`t")
  try {
    switch ($parts[0]) {
      'OPEN' {
        $doc = $word.Documents.Open($parts[1], $false, $true)
        [Console]::Out.WriteLine('OK')
      }
      'COUNT' { [Console]::Out.WriteLine('OK ' + $doc.OMaths.Count) }
      'RENDER' {
        $om = $doc.OMaths.Item([int]$parts[1])
        try { $om.BuildUp() } catch {}
        $bits = $om.Range.EnhMetaFileBits
        if ($bits -ne $null -and $bits.Length -gt 0) {
          [IO.File]::WriteAllBytes($parts[2], [byte[]]$bits)
          [Console]::Out.WriteLine('OK 1')
        } else {
          [Console]::Out.WriteLine('OK 0')
        }
      }
      'QUIT' { $running = $false; [Console]::Out.WriteLine('OK') }
      default { [Console]::Out.WriteLine('ERR unknown command') }
    }
  } catch {
    [Console]::Out.WriteLine('ERR ' + ($_.Exception.Message -replace "`r|`n", ' '))
  }
  [Console]::Out.Flush()
}
if ($doc -ne $null) { try { $doc.Close($false) } catch {} }
try { $word.Quit() } catch {}
"#;

/// Word driven through PowerShell COM, writing formulas as EMF.
pub struct WordHost {
    program: String,
    args: Vec<String>,
    /// Whether the host may only start on Windows.
    windows_only: bool,
    document: PathBuf,
    timeout: Duration,
    session: Option<WordSession>,
}

struct WordSession {
    child: Child,
    stdin: ChildStdin,
    lines: Receiver<String>,
}

impl WordHost {
    /// Output extension of this host.
    pub const EXTENSION: &'static str = "emf";

    pub fn new(powershell: &str, document: &Path, timeout: Duration) -> Self {
        Self {
            program: powershell.to_string(),
            args: ["-NoProfile", "-NonInteractive", "-EncodedCommand"]
                .into_iter()
                .map(String::from)
                .chain(std::iter::once(process::encode_powershell(WORD_SCRIPT)))
                .collect(),
            windows_only: true,
            document: document.to_path_buf(),
            timeout,
            session: None,
        }
    }

    pub fn is_available(powershell: &str) -> bool {
        cfg!(windows) && which::which(powershell).is_ok()
    }

    fn can_start(&self) -> bool {
        (!self.windows_only || cfg!(windows)) && which::which(&self.program).is_ok()
    }

    /// Sends one command line and returns the raw reply.
    fn exchange(&mut self, line: &str) -> Result<String, AutomationError> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| AutomationError::Failed("no session".into()))?;
        writeln!(session.stdin, "{}", line)
            .and_then(|_| session.stdin.flush())
            .map_err(|err| AutomationError::Failed(format!("host stdin closed: {err}")))?;
        read_line(&session.lines, self.timeout)
    }

    /// Like `exchange`, but an `ERR` reply fails the session.
    fn request(&mut self, line: &str) -> Result<String, AutomationError> {
        match parse_reply(&self.exchange(line)?) {
            Reply::Ok(rest) => Ok(rest),
            Reply::Err(message) => Err(AutomationError::Failed(message)),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Reply {
    Ok(String),
    Err(String),
}

fn parse_reply(reply: &str) -> Reply {
    match reply.strip_prefix("OK") {
        Some(rest) => Reply::Ok(rest.trim().to_string()),
        None => Reply::Err(reply.strip_prefix("ERR").unwrap_or(reply).trim().to_string()),
    }
}

fn read_line(lines: &Receiver<String>, timeout: Duration) -> Result<String, AutomationError> {
    match lines.recv_timeout(timeout) {
        Ok(line) => Ok(line),
        Err(RecvTimeoutError::Timeout) => Err(AutomationError::Failed(format!(
            "no reply within {timeout:?}"
        ))),
        Err(RecvTimeoutError::Disconnected) => {
            Err(AutomationError::Failed("host exited".into()))
        }
    }
}

impl AutomationHost for WordHost {
    fn start(&mut self) -> Result<(), AutomationError> {
        self.stop();
        if !self.can_start() {
            return Err(AutomationError::Unavailable(
                "Word automation requires Windows with PowerShell".into(),
            ));
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| AutomationError::Unavailable(err.to_string()))?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            process::kill(&mut child);
            return Err(AutomationError::Failed("host pipes unavailable".into()));
        };
        let (sender, lines) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                if sender.send(line.trim().to_string()).is_err() {
                    break;
                }
            }
        });
        self.session = Some(WordSession {
            child,
            stdin,
            lines,
        });

        let ready = match self.session.as_ref() {
            Some(session) => read_line(&session.lines, self.timeout)?,
            None => String::new(),
        };
        if ready != "READY" {
            return Err(AutomationError::Failed(format!("unexpected greeting: {ready}")));
        }
        let open = format!("OPEN\t{}", self.document.display());
        self.request(&open)?;
        Ok(())
    }

    fn formula_count(&mut self) -> Result<usize, AutomationError> {
        let reply = self.request("COUNT")?;
        reply
            .parse()
            .map_err(|_| AutomationError::Failed(format!("bad formula count: {reply}")))
    }

    fn render(&mut self, index: usize, output: &Path) -> Result<bool, AutomationError> {
        // An error inside RENDER concerns this formula only; the session goes on.
        match parse_reply(&self.exchange(&format!("RENDER\t{}\t{}", index, output.display()))?) {
            Reply::Ok(rest) => Ok(rest == "1" && crate::convert::is_nonempty_file(output)),
            Reply::Err(message) => {
                log::warn!("Formula {} failed to render: {}", index, message);
                Ok(false)
            }
        }
    }

    fn stop(&mut self) {
        if self.session.is_some() {
            let _ = self.request("QUIT");
        }
        if let Some(mut session) = self.session.take() {
            drop(session.stdin);
            let exited = process::wait_until(&mut session.child, Duration::from_secs(5));
            if !matches!(exited, Ok(Some(_))) {
                process::kill(&mut session.child);
            }
        }
    }
}

impl Drop for WordHost {
    fn drop(&mut self) {
        self.stop();
    }
}
