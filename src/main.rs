use std::fs;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use notebook::{Config, Notebook, notebook_to_html, notebook_to_pdf, notebook_to_typst};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Pdf,
    Html,
    Typst,
    Json,
}

impl Format {
    fn extension(self) -> &'static str {
        match self {
            Format::Pdf => "pdf",
            Format::Html => "html",
            Format::Typst => "typ",
            Format::Json => "json",
        }
    }
}

#[derive(Parser)]
#[command(name = "notebook")]
#[command(about = "Render study-note Markdown as a printable notebook")]
struct Cli {
    /// Input Markdown file
    input: PathBuf,

    /// Output file (defaults to input name with the format's extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Pdf)]
    format: Format,

    /// Title printed at the top (defaults to the input file name)
    #[arg(short, long)]
    topic: Option<String>,

    /// TOML config file overriding the bundled defaults
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        None => Config::compiled_default(),
    };

    // Read input file
    let markdown = match fs::read_to_string(&cli.input) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading {}: {}", cli.input.display(), e);
            std::process::exit(1);
        }
    };

    let topic = cli.topic.clone().unwrap_or_else(|| {
        cli.input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    let notebook = Notebook::new(topic, &markdown);
    log::debug!("Parsed {} blocks", notebook.blocks.len());

    let bytes = match cli.format {
        Format::Pdf => match notebook_to_pdf(&notebook, &config) {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        Format::Html => notebook_to_html(&notebook, &config).into_bytes(),
        Format::Typst => notebook_to_typst(&notebook, &config).into_bytes(),
        Format::Json => match serde_json::to_string_pretty(&notebook) {
            Ok(json) => json.into_bytes(),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
    };

    // Determine output path
    let output = cli
        .output
        .unwrap_or_else(|| cli.input.with_extension(cli.format.extension()));

    if let Err(e) = fs::write(&output, bytes) {
        eprintln!("Error writing {}: {}", output.display(), e);
        std::process::exit(1);
    }

    println!("Created {}", output.display());
}
