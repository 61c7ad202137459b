//! gradesheet CLI - grade spreadsheets to PDF reports and certificates

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gradesheet::{
    GradeDocError, PipelineBuilder, RenderConfig, RenderedDocument, ReportPipeline, SourceHandle,
    TemplateParams,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gradesheet")]
#[command(
    author,
    version,
    about = "Produce grade reports and bonafide certificates from spreadsheets"
)]
struct Cli {
    /// Directory holding uploaded spreadsheets and generated documents
    #[arg(long, global = true, env = "GRADESHEET_DATA_DIR", default_value = "uploads")]
    data_dir: PathBuf,

    /// Directory holding the logo and body font assets
    #[arg(long, global = true, env = "GRADESHEET_ASSETS_DIR", default_value = "assets")]
    assets_dir: PathBuf,

    /// Render configuration (JSON with `heading` and `letterhead`)
    #[arg(long, global = true, env = "GRADESHEET_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a spreadsheet and produce its bulk report
    Upload {
        /// Spreadsheet file (xlsx, xlsm, xlsb, xls, ods)
        input: PathBuf,
    },

    /// Produce the bulk report (converted.pdf) for a spreadsheet
    Report {
        #[command(flatten)]
        source: SourceArg,

        /// Also copy the PDF to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Produce a certificate for one record
    Certificate {
        /// Record key (registration number)
        key: String,

        #[command(flatten)]
        source: SourceArg,

        #[command(flatten)]
        params: ParamArgs,

        /// Also copy the PDF to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print one record as JSON
    Show {
        /// Record key (registration number)
        key: String,

        #[command(flatten)]
        source: SourceArg,
    },

    /// Write the last produced bulk report to a file or stdout
    Fetch {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List stored spreadsheets in upload order
    Sources,
}

#[derive(Args)]
struct SourceArg {
    /// Stored spreadsheet id (default: most recently uploaded)
    #[arg(short, long)]
    source: Option<String>,
}

#[derive(Args)]
struct ParamArgs {
    /// JSON file with template parameters (flags override its values)
    #[arg(long)]
    params: Option<PathBuf>,

    #[arg(long)]
    semester: Option<String>,

    #[arg(long)]
    academic_year: Option<String>,

    #[arg(long)]
    section: Option<String>,

    #[arg(long)]
    purpose: Option<String>,

    #[arg(long)]
    form_number: Option<String>,

    #[arg(long)]
    year_of_study: Option<String>,
}

impl ParamArgs {
    fn resolve(self) -> Result<TemplateParams> {
        let mut params = match &self.params {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read '{}'", path.display()))?;
                serde_json::from_str(&json)
                    .with_context(|| format!("Invalid template parameters in '{}'", path.display()))?
            }
            None => TemplateParams::default(),
        };

        for (slot, value) in [
            (&mut params.semester, self.semester),
            (&mut params.academic_year, self.academic_year),
            (&mut params.section, self.section),
            (&mut params.purpose, self.purpose),
            (&mut params.form_number, self.form_number),
            (&mut params.year_of_study, self.year_of_study),
        ] {
            if let Some(value) = value {
                *slot = value;
            }
        }
        Ok(params)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let not_found = err
                .downcast_ref::<GradeDocError>()
                .is_some_and(GradeDocError::is_not_found);
            eprintln!("Error: {:#}", err);
            if not_found {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<()> {
    let render = match &cli.config {
        Some(path) => RenderConfig::from_path(path)?,
        None => RenderConfig::default(),
    };
    let pipeline = PipelineBuilder::new()
        .with_upload_dir(&cli.data_dir)
        .with_assets_dir(&cli.assets_dir)
        .with_render_config(render)
        .build()?;

    match cli.command {
        Commands::Upload { input } => upload(&pipeline, &cli.data_dir, &input),
        Commands::Report { source, output } => {
            let source = resolve_source(&pipeline, source)?;
            let document = pipeline.produce_bulk_document(&source)?;
            report_document(&cli.data_dir, &document, output.as_deref())
        }
        Commands::Certificate {
            key,
            source,
            params,
            output,
        } => {
            let source = resolve_source(&pipeline, source)?;
            let params = params.resolve()?;
            let document = pipeline.produce_certificate(&source, &key, &params)?;
            report_document(&cli.data_dir, &document, output.as_deref())
        }
        Commands::Show { key, source } => {
            let source = resolve_source(&pipeline, source)?;
            let record = pipeline.find_record(&source, &key)?;
            let json = serde_json::to_string_pretty(&record)?;
            println!("{}", json);
            Ok(())
        }
        Commands::Fetch { output } => {
            let bytes = pipeline.fetch_last_bulk_document()?;
            match output {
                Some(path) => std::fs::write(&path, bytes)
                    .with_context(|| format!("Failed to write '{}'", path.display())),
                None => {
                    let mut stdout = io::stdout().lock();
                    stdout.write_all(&bytes)?;
                    stdout.flush()?;
                    Ok(())
                }
            }
        }
        Commands::Sources => {
            // 最新のものが最後に表示される
            let latest = pipeline.latest_source().ok();
            for handle in pipeline.list_sources()? {
                let marker = if Some(&handle) == latest.as_ref() { "*" } else { " " };
                println!("{} {}", marker, handle);
            }
            Ok(())
        }
    }
}

fn upload(pipeline: &ReportPipeline, data_dir: &Path, input: &Path) -> Result<()> {
    let bytes =
        std::fs::read(input).with_context(|| format!("Failed to read '{}'", input.display()))?;
    let original_name = input
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload.xlsx");
    let handle = pipeline.upload_source(original_name, &bytes)?;
    println!("{}", handle);

    // アップロードと同時に一覧レポートを作る
    let document = pipeline.produce_bulk_document(&handle)?;
    report_document(data_dir, &document, None)
}

fn resolve_source(pipeline: &ReportPipeline, arg: SourceArg) -> Result<SourceHandle> {
    match arg.source {
        Some(id) => Ok(SourceHandle::new(id)),
        None => Ok(pipeline.latest_source()?),
    }
}

fn report_document(data_dir: &Path, document: &RenderedDocument, output: Option<&Path>) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, &document.bytes)
            .with_context(|| format!("Failed to write '{}'", path.display()))?;
    }
    eprintln!(
        "Wrote {} ({} bytes)",
        data_dir.join(&document.file_name).display(),
        document.bytes.len()
    );
    Ok(())
}
