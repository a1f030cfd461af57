//! Formula rendering without an office suite.
//!
//! OMML goes through the OMML2MML stylesheet (`xsltproc`), the MathML through
//! MathJax under node, and the SVG through `resvg`.

use super::{checkpoint, FORMULA_PREFIX};
use crate::adapters::docx::OmmlFragment;
use crate::config::ToolConfig;
use crate::convert::ConvertError;
use crate::process::run_with_timeout;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const MATHJAX_SCRIPT: &str = "\
const {mathjax} = require('mathjax-full/js/mathjax.js');
const {MathML} = require('mathjax-full/js/input/mathml.js');
const {SVG} = require('mathjax-full/js/output/svg.js');
const {liteAdaptor} = require('mathjax-full/js/adaptors/liteAdaptor.js');
const {RegisterHTMLHandler} = require('mathjax-full/js/handlers/html.js');
const adaptor = liteAdaptor();
RegisterHTMLHandler(adaptor);
const html = mathjax.document('', {InputJax: new MathML(), OutputJax: new SVG({fontCache: 'none'})});
let data = '';
process.stdin.setEncoding('utf8');
process.stdin.on('data', chunk => data += chunk);
process.stdin.on('end', () => {
  const node = html.convert(data, {display: true});
  process.stdout.write(adaptor.innerHTML(node));
});
";

/// Output extension of the headless path.
pub fn output_extension() -> &'static str {
    if cfg!(feature = "rasterize") {
        "png"
    } else {
        "svg"
    }
}

/// Renders OMML fragments through XSLT, MathJax and resvg.
pub struct HeadlessRenderer<'a> {
    tools: &'a ToolConfig,
    stylesheet: PathBuf,
    node: PathBuf,
    xslt: PathBuf,
}

impl<'a> HeadlessRenderer<'a> {
    /// Checks the tool chain, returning `None` (after one log line) when a
    /// piece is missing.
    pub fn detect(tools: &'a ToolConfig) -> Option<Self> {
        let Some(stylesheet) = tools.omml_stylesheet() else {
            log::info!("OMML stylesheet not found, formula rendering skipped");
            return None;
        };
        let Ok(xslt) = which::which(&tools.xslt_program) else {
            log::info!("{} not available, formula rendering skipped", tools.xslt_program);
            return None;
        };
        let Ok(node) = which::which(&tools.node_program) else {
            log::info!("node not available, formula rendering skipped");
            return None;
        };
        let renderer = Self {
            tools,
            stylesheet,
            node,
            xslt,
        };
        if !renderer.mathjax_available() {
            log::info!("MathJax not available, formula rendering skipped");
            return None;
        }
        Some(renderer)
    }

    fn node_command(&self) -> Command {
        let mut command = Command::new(&self.node);
        if let Some(dir) = &self.tools.mathjax_dir {
            command.current_dir(dir);
        }
        command
    }

    fn mathjax_available(&self) -> bool {
        let mut command = self.node_command();
        command.args(["-e", "require.resolve('mathjax-full')"]);
        matches!(
            run_with_timeout(command, None, self.tools.tool_timeout),
            Ok(output) if output.status.success()
        )
    }

    /// Renders every fragment without an existing output in `out_dir`.
    pub fn render_all(&self, formulas: &[OmmlFragment], out_dir: &Path) -> Vec<PathBuf> {
        let ext = output_extension();
        let mut rendered = Vec::new();
        for fragment in formulas {
            let output = out_dir.join(checkpoint::file_name(FORMULA_PREFIX, fragment.index, ext));
            if crate::convert::is_nonempty_file(&output) {
                rendered.push(output);
                continue;
            }
            match self.render_one(fragment, &output) {
                Ok(()) => rendered.push(output),
                Err(err) => log::warn!("Formula {} not rendered: {}", fragment.index, err),
            }
        }
        log::info!("MathJax formulas rendered: {}", rendered.len());
        rendered
    }

    fn render_one(&self, fragment: &OmmlFragment, output: &Path) -> Result<(), ConvertError> {
        let mathml = self.to_mathml(fragment)?;
        let svg = self.to_svg(&mathml)?;
        write_output(&svg, output)
    }

    fn to_mathml(&self, fragment: &OmmlFragment) -> Result<String, ConvertError> {
        let mut command = Command::new(&self.xslt);
        command.arg(&self.stylesheet).arg("-");
        let output = run_with_timeout(
            command,
            Some(fragment.standalone().into_bytes()),
            self.tools.tool_timeout,
        )?;
        checked_stdout(&self.tools.xslt_program, output)
    }

    fn to_svg(&self, mathml: &str) -> Result<String, ConvertError> {
        let mut command = self.node_command();
        command.args(["-e", MATHJAX_SCRIPT]);
        let output = run_with_timeout(
            command,
            Some(mathml.as_bytes().to_vec()),
            self.tools.tool_timeout,
        )?;
        checked_stdout(&self.tools.node_program, output)
    }
}

fn checked_stdout(program: &str, output: std::process::Output) -> Result<String, ConvertError> {
    if !output.status.success() {
        return Err(ConvertError::Failed {
            command: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if stdout.is_empty() {
        return Err(ConvertError::Render(format!("{program} produced no output")));
    }
    Ok(stdout)
}

#[cfg(feature = "rasterize")]
fn write_output(svg: &str, output: &Path) -> Result<(), ConvertError> {
    fs::write(output, svg_to_png(svg)?)?;
    Ok(())
}

#[cfg(not(feature = "rasterize"))]
fn write_output(svg: &str, output: &Path) -> Result<(), ConvertError> {
    fs::write(output, svg)?;
    Ok(())
}

/// Rasterizes an SVG document at 300 dpi.
#[cfg(feature = "rasterize")]
pub fn svg_to_png(svg: &str) -> Result<Vec<u8>, ConvertError> {
    use resvg::tiny_skia::{Pixmap, Transform};
    use resvg::usvg::{Options, Tree};

    let dpi = 300.0;
    let scale = dpi / 96.0;
    let options = Options {
        dpi,
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options)
        .map_err(|err| ConvertError::Render(format!("SVG parsing error: {err:?}")))?;

    let size = tree.size().to_int_size();
    let width = ((size.width() as f32 * scale) as u32).max(1);
    let height = ((size.height() as f32 * scale) as u32).max(1);
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| ConvertError::Render("unable to create pixel buffer".into()))?;
    resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|err| ConvertError::Render(format!("PNG encoding error: {err:?}")))
}
