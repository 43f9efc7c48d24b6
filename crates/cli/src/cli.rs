use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tcgen_core::request::OutputFormat;

/// Submit test-case generation and image recognition jobs and follow them
/// to completion.
#[derive(Parser, Debug)]
#[command(name = "tcgen", version)]
pub struct Cli {
    /// Job service root, e.g. http://localhost:8080/api
    #[arg(long, global = true, env = "TCGEN_BASE_URL")]
    pub base_url: Option<String>,

    /// Give up after this many failed status polls in a row
    #[arg(long, global = true)]
    pub max_poll_errors: Option<u32>,

    /// Give up if a job is not finished after this many seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate test cases from a requirements document or text
    Generate(GenerateArgs),
    /// Extract text from a screenshot
    Recognize(RecognizeArgs),
    /// Check that the job service is reachable
    Ping,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Requirements document to upload
    #[arg(long, conflicts_with = "text", required_unless_present = "text")]
    pub file: Option<PathBuf>,

    /// Requirements text
    #[arg(long)]
    pub text: Option<String>,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug)]
pub struct RecognizeArgs {
    /// Image to recognize (jpeg, png, bmp or tiff)
    #[arg(long)]
    pub image: PathBuf,

    /// Feed the recognized text into a generation job
    #[arg(long)]
    pub then_generate: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Export format of the generated test cases
    #[arg(long, default_value_t = OutputFormat::Excel)]
    pub format: OutputFormat,

    /// Directory the export is written to
    #[arg(long, default_value = ".")]
    pub out: PathBuf,
}
