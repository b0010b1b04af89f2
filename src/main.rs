use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use docxide_typeset::{ParallelMode, TypesetConfig};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    Sequential,
    Chunked,
    Threaded,
}

#[derive(Parser, Debug)]
#[command(version, about = "Lay out a document model and render it to PDF")]
struct Args {
    /// Document JSON (or a layout JSON with --from-layout)
    input: PathBuf,
    /// Output path; defaults to the input with a .pdf (or .layout.json) extension
    output: Option<PathBuf>,
    /// Page rendering mode
    #[arg(long, value_enum, default_value_t = Mode::Sequential)]
    mode: Mode,
    /// Worker count for parallel modes; defaults to the number of CPUs
    #[arg(long)]
    workers: Option<usize>,
    /// Treat the input as an exported layout instead of a document
    #[arg(long, conflicts_with = "export_layout")]
    from_layout: bool,
    /// Write the layout in its JSON interchange form instead of a PDF
    #[arg(long)]
    export_layout: bool,
    /// Extra directory to search for fonts (repeatable)
    #[arg(long = "font-dir")]
    font_dirs: Vec<PathBuf>,
    /// Skip the platform font directories; only --font-dir and builtin metrics are used
    #[arg(long)]
    no_system_fonts: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let workers = args
        .workers
        .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get()));
    let parallel = match args.mode {
        Mode::Sequential => ParallelMode::Sequential,
        Mode::Chunked => ParallelMode::Chunked { workers },
        Mode::Threaded => ParallelMode::Threaded { workers },
    };
    let mut config = TypesetConfig::from_env().with_parallel(parallel);
    config.font_dirs.extend(args.font_dirs);
    if args.no_system_fonts {
        config.scan_system_fonts = false;
    }

    let extension = if args.export_layout { "layout.json" } else { "pdf" };
    let output = args.output.unwrap_or_else(|| args.input.with_extension(extension));

    let result = if args.export_layout {
        docxide_typeset::export_layout(&args.input, &output, &config).map(|pages| {
            log::info!("Exported {pages} pages");
        })
    } else {
        let converted = if args.from_layout {
            docxide_typeset::convert_layout_to_pdf(&args.input, &output, &config)
        } else {
            docxide_typeset::convert_document_to_pdf(&args.input, &output, &config)
        };
        converted.map(|diagnostics| {
            if !diagnostics.is_empty() {
                eprintln!("{} block(s) rendered as placeholders", diagnostics.len());
            }
        })
    };

    match result {
        Ok(()) => {
            println!("{}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
