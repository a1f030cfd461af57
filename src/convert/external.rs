use super::{ConvertError, ConvertStrategy};
use crate::config::ToolSpec;
use crate::process::{describe, run_with_timeout};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// A command-line converter found on `PATH`.
pub struct ExternalTool {
    spec: ToolSpec,
    /// Resolved once, when the strategy list is built.
    resolved: Option<PathBuf>,
    timeout: Duration,
}

impl ExternalTool {
    pub fn new(spec: ToolSpec, timeout: Duration) -> Self {
        let resolved = which::which(&spec.program).ok();
        Self {
            spec,
            resolved,
            timeout,
        }
    }

    /// Expands the argument template for one conversion.
    pub fn arguments(&self, input: &Path, output: &Path) -> Vec<String> {
        let outdir = output.parent().unwrap_or_else(|| Path::new("."));
        self.spec
            .args
            .iter()
            .map(|arg| {
                arg.replace("{input}", &input.to_string_lossy())
                    .replace("{output}", &output.to_string_lossy())
                    .replace("{outdir}", &outdir.to_string_lossy())
            })
            .collect()
    }
}

impl ConvertStrategy for ExternalTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn is_available(&self) -> bool {
        self.resolved.is_some()
    }

    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let program = self
            .resolved
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.spec.program));
        let mut command = Command::new(program);
        command.args(self.arguments(input, output));
        let line = describe(&command);
        log::debug!("Running {}", line);

        let result = run_with_timeout(command, None, self.timeout)?;
        if !result.status.success() {
            return Err(ConvertError::Failed {
                command: line,
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        if !super::is_nonempty_file(output) {
            return Err(ConvertError::NoOutput(output.to_path_buf()));
        }
        Ok(())
    }
}
