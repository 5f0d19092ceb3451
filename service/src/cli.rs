//! Command-line interface for MIHCSME metadata.
//!
//! This module provides the `mihcsme` tool for:
//! - Parsing and validating MIHCSME workbooks
//! - Converting between workbooks and JSON/YAML documents
//! - Uploading metadata onto a container of an annotation store
//! - Downloading metadata back from a container
//! - Removing uploaded metadata from a container

use crate::config::{MihcsmeConfig, load_service_config};
use crate::document;
use crate::remote::{
    ChildPolicy, DownloadReport, Downloader, LocalStore, Namespaces, RemovalReport, Remover,
    ReportStatus, UploadOptions, UploadReport, Uploader,
};
use crate::sheets::{MetadataSheetsGenerator, MetadataSheetsParser, ParseWarning};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use mihcsme_core::{ContainerRef, MetadataSet, MihcsmeError, Result, SampleId};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// MIHCSME metadata conversion tool
#[derive(Parser, Debug)]
#[command(name = "mihcsme", author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short = 'f', long, global = true, default_value = "pretty")]
    format: OutputFormat,

    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Pretty,
    /// `JSON` output
    Json,
}

/// Remote container kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TargetType {
    /// Screen of plates
    Screen,
    /// Single plate
    Plate,
}

impl TargetType {
    fn container(self, id: i64) -> ContainerRef {
        match self {
            Self::Screen => ContainerRef::screen(id),
            Self::Plate => ContainerRef::plate(id),
        }
    }
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a workbook into a JSON or YAML document
    Parse {
        /// Workbook path
        input: PathBuf,

        /// Document to write; printed to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check a workbook or document
    Validate {
        /// Workbook, JSON or YAML path
        input: PathBuf,
    },

    /// Write a document as a workbook
    ToSpreadsheet {
        /// JSON or YAML document
        document: PathBuf,

        /// Workbook to write
        output: PathBuf,
    },

    /// Upload metadata onto a container
    Upload {
        /// Workbook, JSON or YAML path
        input: PathBuf,

        /// Annotation store file
        #[arg(long)]
        store: PathBuf,

        /// Container kind
        #[arg(long)]
        target_type: TargetType,

        /// Container id
        #[arg(long)]
        target_id: i64,

        /// Treatment of existing child annotations
        #[arg(long)]
        child_policy: Option<ChildPolicy>,

        /// Only upload these identifiers (e.g. `A01` or `Plate1/A01`)
        #[arg(long, num_args = 1..)]
        only: Vec<String>,

        /// Resolve every identifier against the container without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Download metadata from a container
    Download {
        /// Annotation store file
        #[arg(long)]
        store: PathBuf,

        /// Container kind
        #[arg(long)]
        target_type: TargetType,

        /// Container id
        #[arg(long)]
        target_id: i64,

        /// Workbook, JSON or YAML to write
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Remove uploaded metadata from a container and its children
    Remove {
        /// Annotation store file
        #[arg(long)]
        store: PathBuf,

        /// Container kind
        #[arg(long)]
        target_type: TargetType,

        /// Container id
        #[arg(long)]
        target_id: i64,
    },
}

/// Whether a path names a workbook
fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "xlsx" | "xlsm"))
}

/// CLI application
pub struct CliApp {
    cli: Cli,
    config: MihcsmeConfig,
}

impl CliApp {
    /// Create the application, loading the configuration file if given
    ///
    /// # Errors
    ///
    /// Returns `MihcsmeError::Config` if the configuration is invalid
    pub fn new(cli: Cli) -> Result<Self> {
        let config = match &cli.config {
            Some(path) => load_service_config(path)?,
            None => MihcsmeConfig::default(),
        };
        Ok(Self { cli, config })
    }

    /// Install the tracing subscriber
    pub fn init_tracing(&self) {
        let filter = if self.cli.verbose {
            EnvFilter::new("mihcsme=debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mihcsme=info"))
        };
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Run the selected command; `Ok(false)` means the input was rejected
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or written or a container
    /// level remote call fails
    pub fn run(&self) -> Result<bool> {
        match &self.cli.command {
            Commands::Parse { input, output } => self.parse_command(input, output.as_deref()),
            Commands::Validate { input } => self.validate_command(input),
            Commands::ToSpreadsheet { document, output } => {
                let metadata = document::read_document(document)?;
                self.generator().generate_file(&metadata, output)?;
                self.success(&format!("Wrote {}", output.display()));
                Ok(true)
            }
            Commands::Upload {
                input,
                store,
                target_type,
                target_id,
                child_policy,
                only,
                dry_run,
            } => self.upload_command(
                input,
                store,
                target_type.container(*target_id),
                *child_policy,
                only,
                *dry_run,
            ),
            Commands::Download {
                store,
                target_type,
                target_id,
                output,
            } => self.download_command(store, target_type.container(*target_id), output),
            Commands::Remove {
                store,
                target_type,
                target_id,
            } => self.remove_command(store, target_type.container(*target_id)),
        }
    }

    fn parser(&self) -> MetadataSheetsParser {
        MetadataSheetsParser::with_config(self.config.parser.clone())
    }

    fn generator(&self) -> MetadataSheetsGenerator {
        MetadataSheetsGenerator::with_config(self.config.writer.clone())
            .with_comment_prefix(self.config.parser.comment_prefix.clone())
    }

    fn namespaces(&self) -> Namespaces {
        Namespaces::from_base(&self.config.namespace.base)
    }

    /// Load a workbook or document; rejected input is `Ok(None)` after printing
    fn load(&self, input: &Path) -> Result<Option<(MetadataSet, Vec<ParseWarning>)>> {
        let loaded = if is_workbook(input) {
            self.parser()
                .parse_file(input)
                .map(|parsed| (parsed.metadata, parsed.warnings))
        } else {
            document::read_document(input).map(|metadata| (metadata, Vec::new()))
        };
        match loaded {
            Ok(loaded) => Ok(Some(loaded)),
            Err(error @ (MihcsmeError::Validation(_) | MihcsmeError::Parse(_))) => {
                self.print_rejection(input, &error)?;
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    fn save(&self, metadata: &MetadataSet, output: &Path) -> Result<()> {
        if is_workbook(output) {
            self.generator().generate_file(metadata, output)
        } else {
            document::write_document(metadata, output)
        }
    }

    fn parse_command(&self, input: &Path, output: Option<&Path>) -> Result<bool> {
        let Some((metadata, warnings)) = self.load(input)? else {
            return Ok(false);
        };
        self.print_warnings(&warnings);
        match output {
            Some(output) => {
                self.save(&metadata, output)?;
                self.success(&format!("Wrote {}", output.display()));
            }
            None => println!("{}", document::to_json_string(&metadata)?),
        }
        Ok(true)
    }

    fn validate_command(&self, input: &Path) -> Result<bool> {
        let Some((metadata, warnings)) = self.load(input)? else {
            return Ok(false);
        };
        match self.cli.format {
            OutputFormat::Pretty => {
                println!("{}", "✓ Metadata is valid".green().bold());
                println!(
                    "  {} conditions, {} annotations",
                    metadata.conditions().len(),
                    metadata.annotation_count()
                );
                self.print_warnings(&warnings);
            }
            OutputFormat::Json => println!(
                "{}",
                serde_json::json!({
                    "valid": true,
                    "conditions": metadata.conditions().len(),
                    "annotations": metadata.annotation_count(),
                    "warnings": warnings,
                })
            ),
        }
        Ok(true)
    }

    fn upload_command(
        &self,
        input: &Path,
        store_path: &Path,
        container: ContainerRef,
        child_policy: Option<ChildPolicy>,
        only: &[String],
        dry_run: bool,
    ) -> Result<bool> {
        let policy = child_policy.or(self.config.upload.child_policy).ok_or_else(|| {
            MihcsmeError::config(
                "no child policy chosen: pass --child-policy replace|merge or set upload.child_policy",
            )
        })?;
        let only = only
            .iter()
            .map(|text| {
                text.parse::<SampleId>()
                    .map_err(|e| MihcsmeError::config(format!("invalid identifier '{text}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let Some((metadata, warnings)) = self.load(input)? else {
            return Ok(false);
        };
        self.print_warnings(&warnings);

        let mut options = UploadOptions::new(policy).with_namespaces(self.namespaces());
        if !only.is_empty() {
            options = options.only(only);
        }
        if dry_run {
            options = options.dry_run();
        }
        let attempted = options.planned(&metadata);

        let mut store = LocalStore::open(store_path)?;
        let progress = ProgressBar::new(attempted as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            progress.set_style(style.progress_chars("#>-"));
        }
        let report = Uploader::new(&mut store, options).upload_with(&metadata, &container, |outcome| {
            progress.set_message(outcome.identifier.clone());
            progress.inc(1);
        })?;
        progress.finish_and_clear();
        if !dry_run {
            store.save(store_path)?;
        }

        self.print_upload_report(&report)?;
        Ok(report.status() != ReportStatus::Error)
    }

    fn download_command(&self, store_path: &Path, container: ContainerRef, output: &Path) -> Result<bool> {
        let store = LocalStore::open(store_path)?;
        let report = match Downloader::new(&store, self.namespaces()).download(&container) {
            Ok(report) => report,
            Err(error @ MihcsmeError::Validation(_)) => {
                self.print_rejection(store_path, &error)?;
                return Ok(false);
            }
            Err(error) => return Err(error),
        };
        self.save(&report.metadata, output)?;
        self.print_download_report(&report, output)?;
        Ok(true)
    }

    fn remove_command(&self, store_path: &Path, container: ContainerRef) -> Result<bool> {
        let mut store = LocalStore::open(store_path)?;
        let report = Remover::new(&mut store, self.namespaces()).remove(&container)?;
        store.save(store_path)?;
        self.print_removal_report(&report)?;
        Ok(report.failures.is_empty())
    }

    fn success(&self, message: &str) {
        if self.cli.format == OutputFormat::Pretty {
            println!("{} {message}", "✓".green());
        }
    }

    fn print_warnings(&self, warnings: &[ParseWarning]) {
        if self.cli.format != OutputFormat::Pretty {
            return;
        }
        for warning in warnings {
            println!("  {} {warning}", "warning:".yellow());
        }
    }

    fn print_rejection(&self, input: &Path, error: &MihcsmeError) -> Result<()> {
        let lines: Vec<String> = match error {
            MihcsmeError::Validation(e) => e.issues().iter().map(ToString::to_string).collect(),
            MihcsmeError::Parse(e) => e.issues().iter().map(ToString::to_string).collect(),
            other => vec![other.to_string()],
        };
        match self.cli.format {
            OutputFormat::Pretty => {
                println!("{} {}", "✗ Rejected".red().bold(), input.display());
                for (i, line) in lines.iter().enumerate() {
                    println!("{:4}. {line}", i + 1);
                }
            }
            OutputFormat::Json => {
                let issues = match error {
                    MihcsmeError::Validation(e) => serde_json::to_value(e.issues())?,
                    MihcsmeError::Parse(e) => serde_json::to_value(e.issues())?,
                    _ => serde_json::to_value(&lines)?,
                };
                println!("{}", serde_json::json!({ "valid": false, "issues": issues }));
            }
        }
        Ok(())
    }

    fn print_upload_report(&self, report: &UploadReport) -> Result<()> {
        match self.cli.format {
            OutputFormat::Pretty => {
                let status = match (report.status(), report.dry_run) {
                    (ReportStatus::Success, false) => "✓ Upload succeeded".green().bold(),
                    (ReportStatus::Success, true) => "✓ Every identifier resolves".green().bold(),
                    (ReportStatus::PartialSuccess, false) => "! Upload partially succeeded".yellow().bold(),
                    (ReportStatus::PartialSuccess, true) => "! Some identifiers do not resolve".yellow().bold(),
                    (ReportStatus::Error, false) => "✗ Upload failed".red().bold(),
                    (ReportStatus::Error, true) => "✗ No identifier resolves".red().bold(),
                };
                println!("{status}");
                println!("  {} (policy: {})", report.summary(), report.policy);
                for outcome in report.failures() {
                    if let Some(failure) = &outcome.failure {
                        println!("  {} {}: {failure}", "✗".red(), outcome.identifier);
                    }
                }
                let retry = report.failed_identifiers();
                if !retry.is_empty() {
                    println!("  Retry with: --only {}", retry.join(" "));
                }
            }
            OutputFormat::Json => {
                let mut value = serde_json::to_value(report)?;
                value["status"] = serde_json::to_value(report.status())?;
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
        }
        Ok(())
    }

    fn print_removal_report(&self, report: &RemovalReport) -> Result<()> {
        match self.cli.format {
            OutputFormat::Pretty => {
                println!("{} {}", "✓".green(), report.summary());
                for failure in &report.failures {
                    println!("  {} child {}: {}", "✗".red(), failure.child, failure.failure);
                }
            }
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        }
        Ok(())
    }

    fn print_download_report(&self, report: &DownloadReport, output: &Path) -> Result<()> {
        match self.cli.format {
            OutputFormat::Pretty => {
                println!(
                    "{} Downloaded {}: {} annotations to {}",
                    "✓".green(),
                    report.container,
                    report.metadata.annotation_count(),
                    output.display()
                );
                for failure in &report.failures {
                    println!("  {} child {}: {}", "✗".red(), failure.child, failure.failure);
                }
            }
            OutputFormat::Json => println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "container": report.container,
                    "annotations": report.metadata.annotation_count(),
                    "failures": report.failures,
                    "output": output,
                }))?
            ),
        }
        Ok(())
    }
}
