use super::{ConvertError, ConvertStrategy};
use crate::process::{encode_powershell, powershell_literal, run_with_timeout};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// Native WMF/EMF decoding through GDI+ (`System.Drawing`), driven by
/// PowerShell. Windows only.
pub struct GdiPlusMetafile {
    resolved: Option<PathBuf>,
    timeout: Duration,
}

impl GdiPlusMetafile {
    pub fn new(powershell: &str, timeout: Duration) -> Self {
        let resolved = if cfg!(windows) {
            which::which(powershell).ok()
        } else {
            None
        };
        Self { resolved, timeout }
    }

    /// Arguments of the PowerShell call converting `input` to `output`.
    pub fn arguments(input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-NoProfile".to_string(),
            "-NonInteractive".to_string(),
            "-EncodedCommand".to_string(),
            encode_powershell(&metafile_script(input, output)),
        ]
    }
}

/// Draws the metafile at its native size on white and saves a PNG.
pub(crate) fn metafile_script(input: &Path, output: &Path) -> String {
    format!(
        r#"$ErrorActionPreference = 'Stop'
Add-Type -AssemblyName System.Drawing
$mf = New-Object System.Drawing.Imaging.Metafile({input})
try {{
  $w = [Math]::Max(1, $mf.Width)
  $h = [Math]::Max(1, $mf.Height)
  $bmp = New-Object System.Drawing.Bitmap($w, $h)
  try {{
    $g = [System.Drawing.Graphics]::FromImage($bmp)
    try {{
      $g.Clear([System.Drawing.Color]::White)
      $g.DrawImage($mf, 0, 0, $w, $h)
    }} finally {{ $g.Dispose() }}
    $bmp.Save({output}, [System.Drawing.Imaging.ImageFormat]::Png)
  }} finally {{ $bmp.Dispose() }}
}} finally {{ $mf.Dispose() }}
"#,
        input = powershell_literal(&input.to_string_lossy()),
        output = powershell_literal(&output.to_string_lossy()),
    )
}

impl ConvertStrategy for GdiPlusMetafile {
    fn name(&self) -> &str {
        "gdiplus"
    }

    fn is_available(&self) -> bool {
        self.resolved.is_some()
    }

    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let Some(program) = &self.resolved else {
            return Err(ConvertError::Render("GDI+ requires Windows".into()));
        };
        let mut command = Command::new(program);
        command.args(Self::arguments(input, output));

        let result = run_with_timeout(command, None, self.timeout)?;
        if !result.status.success() {
            return Err(ConvertError::Failed {
                command: "powershell System.Drawing.Imaging.Metafile".to_string(),
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
