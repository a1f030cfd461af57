use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use wordquiz::{serialize_test_payload, ExtractOptions, ToolConfig, WordTestExtractor};

#[derive(Parser, Debug)]
#[command(author, version, about = "Extract tests from Word files", long_about = None)]
struct Args {
    /// Path to a .docx or .doc file
    file: PathBuf,

    /// Output directory for extracted tests
    #[arg(short, long, default_value = "data/tests")]
    output: PathBuf,

    /// Correct answer marker symbol
    #[arg(short, long, default_value = "*")]
    symbol: String,

    /// Report tables with fewer than 3 rows of content
    #[arg(long)]
    log_small_tables: bool,

    /// Skip formula rendering
    #[arg(long)]
    no_formulas: bool,

    /// Test title (defaults to the file name)
    #[arg(short, long)]
    title: Option<String>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(&args) {
        Ok(test_dir) => {
            println!("Saved test to {}", test_dir.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> wordquiz::Result<PathBuf> {
    let test_id = uuid::Uuid::new_v4().simple().to_string();
    let test_dir = args.output.join(&test_id);
    let assets_dir = test_dir.join("assets");
    fs::create_dir_all(&assets_dir)?;

    let options = ExtractOptions {
        marker: args.symbol.clone(),
        log_small_tables: args.log_small_tables,
        assets_dir: assets_dir.clone(),
        render_formulas: !args.no_formulas,
        ..Default::default()
    };
    let extractor = WordTestExtractor::new(&args.file, options, ToolConfig::from_env());
    let extraction = match extractor.extract() {
        Ok(extraction) => extraction,
        Err(e) => {
            // Leave nothing behind for a document that could not be read.
            let _ = fs::remove_dir_all(&test_dir);
            return Err(e);
        }
    };
    for line in &extraction.logs {
        println!("{}", line);
    }

    let title = args.title.clone().unwrap_or_else(|| {
        args.file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    let payload = serialize_test_payload(
        &test_id,
        &title,
        &extraction.questions,
        Some(assets_dir.as_path()),
    );
    fs::write(
        test_dir.join("test.json"),
        serde_json::to_string_pretty(&payload)?,
    )?;
    Ok(test_dir)
}
