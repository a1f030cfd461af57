//! External tool configuration.
//!
//! Everything the conversion chains need to know about the host is resolved
//! once into a [`ToolConfig`] and passed down explicitly, so tests can swap in
//! their own settings.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// An external converter invocation.
///
/// `args` may reference `{input}`, `{output}` and `{outdir}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
}

impl ToolSpec {
    pub fn new(name: &str, program: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Office suite in headless mode.
    pub fn soffice() -> Self {
        Self::new(
            "soffice",
            "soffice",
            &["--headless", "--convert-to", "png", "--outdir", "{outdir}", "{input}"],
        )
    }

    pub fn inkscape() -> Self {
        Self::new(
            "inkscape",
            "inkscape",
            &["{input}", "--export-type=png", "--export-filename={output}"],
        )
    }

    pub fn imagemagick() -> Self {
        Self::new("magick", "magick", &["{input}", "{output}"])
    }

    /// Known tools, in the default order of preference.
    pub fn defaults() -> Vec<Self> {
        vec![Self::soffice(), Self::inkscape(), Self::imagemagick()]
    }
}

/// Restart and retry policy of the office automation renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomationSettings {
    pub enabled: bool,
    /// Formulas rendered per host process before a proactive restart.
    pub batch_size: usize,
    pub max_retries: usize,
    pub retry_delay: Duration,
}

impl AutomationSettings {
    pub const MIN_BATCH_SIZE: usize = 10;

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(Self::MIN_BATCH_SIZE);
        self
    }
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: 40,
            max_retries: 5,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Host tools used by the metafile, formula, and `.doc` conversions.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Metafile converters, tried in order.
    pub converters: Vec<ToolSpec>,
    pub cloudconvert_api_key: Option<String>,
    pub cloudconvert_base_url: String,
    /// Office suite binary used to turn `.doc` into `.docx`.
    pub office_program: String,
    pub node_program: String,
    /// Directory where the `mathjax-full` package can be resolved from.
    pub mathjax_dir: Option<PathBuf>,
    pub xslt_program: String,
    /// Candidate locations of the OMML to MathML stylesheet.
    pub omml_stylesheets: Vec<PathBuf>,
    pub powershell_program: String,
    pub automation: AutomationSettings,
    /// Wall-clock limit for every external process call.
    pub tool_timeout: Duration,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            converters: ToolSpec::defaults(),
            cloudconvert_api_key: None,
            cloudconvert_base_url: "https://api.cloudconvert.com/v2".to_string(),
            office_program: "soffice".to_string(),
            node_program: "node".to_string(),
            mathjax_dir: None,
            xslt_program: "xsltproc".to_string(),
            omml_stylesheets: vec![PathBuf::from("resources/omml2mml.xsl")],
            powershell_program: "powershell".to_string(),
            automation: AutomationSettings::default(),
            tool_timeout: Duration::from_secs(120),
        }
    }
}

impl ToolConfig {
    /// Config with every external tool disabled.
    pub fn offline() -> Self {
        Self {
            converters: Vec::new(),
            omml_stylesheets: Vec::new(),
            automation: AutomationSettings {
                enabled: false,
                ..AutomationSettings::default()
            },
            ..Self::default()
        }
    }

    /// Reads overrides from the environment.
    ///
    /// - `WORDQUIZ_CONVERTERS`: comma-separated converter names, in order
    /// - `CLOUDCONVERT_API_KEY`
    /// - `WORDQUIZ_SOFFICE`, `WORDQUIZ_NODE`, `WORDQUIZ_MATHJAX_DIR`
    /// - `WORDQUIZ_OMML_XSL`: stylesheet path tried first
    /// - `WORDQUIZ_TOOL_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(names) = var("WORDQUIZ_CONVERTERS") {
            let names: Vec<&str> = names.split(',').map(str::trim).collect();
            config = config.with_converters(&names);
        }
        config.cloudconvert_api_key = var("CLOUDCONVERT_API_KEY");
        if let Some(soffice) = var("WORDQUIZ_SOFFICE") {
            config.office_program = soffice.clone();
            for spec in config.converters.iter_mut().filter(|s| s.name == "soffice") {
                spec.program = soffice.clone();
            }
        }
        if let Some(node) = var("WORDQUIZ_NODE") {
            config.node_program = node;
        }
        config.mathjax_dir = var("WORDQUIZ_MATHJAX_DIR").map(PathBuf::from);
        if let Some(secs) = var("WORDQUIZ_TOOL_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            config.tool_timeout = Duration::from_secs(secs);
        }

        let mut stylesheets = Vec::new();
        if let Some(path) = var("WORDQUIZ_OMML_XSL") {
            stylesheets.push(PathBuf::from(path));
        }
        if cfg!(windows) {
            stylesheets.extend(office_stylesheets());
        }
        stylesheets.append(&mut config.omml_stylesheets);
        if let Some(dir) = env::current_exe().ok().and_then(|p| p.parent().map(PathBuf::from)) {
            stylesheets.push(dir.join("resources").join("omml2mml.xsl"));
        }
        config.omml_stylesheets = stylesheets;

        config
    }

    /// Keeps the named converters, in the given order. Unknown names are ignored.
    pub fn with_converters(mut self, names: &[&str]) -> Self {
        let known = ToolSpec::defaults();
        self.converters = names
            .iter()
            .filter_map(|name| known.iter().find(|spec| spec.name == *name).cloned())
            .collect();
        self
    }

    /// First stylesheet candidate that exists.
    pub fn omml_stylesheet(&self) -> Option<PathBuf> {
        self.omml_stylesheets.iter().find(|p| p.is_file()).cloned()
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Stylesheet locations of installed Office versions.
fn office_stylesheets() -> Vec<PathBuf> {
    let mut bases: Vec<PathBuf> = Vec::new();
    for (key, fallback) in [
        ("PROGRAMFILES", r"C:\Program Files"),
        ("PROGRAMFILES(X86)", r"C:\Program Files (x86)"),
        ("PROGRAMW6432", r"C:\Program Files"),
    ] {
        let base = var(key).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(fallback));
        if !bases.contains(&base) {
            bases.push(base);
        }
    }

    let mut candidates = Vec::new();
    for base in &bases {
        for version in ["Office16", "Office15", "Office14"] {
            candidates.push(
                base.join("Microsoft Office")
                    .join("root")
                    .join(version)
                    .join("OMML2MML.XSL"),
            );
            candidates.push(base.join("Microsoft Office").join(version).join("OMML2MML.XSL"));
        }
    }
    candidates
}
