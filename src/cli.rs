use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bookforge", version, about = "Turn long-form text into a chaptered audiobook with local TTS")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Process(ProcessArgs),
    Review(ReviewArgs),
    Resume(ProjectArgs),
    Assemble(AssembleArgs),
    Status(StatusArgs),
    Backends(BackendsArgs),
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct ProcessArgs {
    #[arg(value_name = "INPUT", help = "Source text (.txt, .md or .epub)")]
    pub input: PathBuf,

    #[arg(value_name = "OUTPUT_DIR", help = "Project directory to create")]
    pub output_dir: PathBuf,

    #[arg(short = 'm', long, value_name = "PATH", help = "Voice model file (e.g. a Piper .onnx)")]
    pub voice_model: PathBuf,

    #[arg(long, help = "Preset name (defaults to the configured default_preset)")]
    pub preset: Option<String>,

    #[arg(long, default_value_t = 0, help = "Leading chunks of the first chapter to leave out of the book")]
    pub skip_first_chunks: usize,
}

#[derive(Args, Debug)]
pub struct ReviewArgs {
    #[arg(value_name = "PROJECT_DIR")]
    pub project_dir: PathBuf,

    #[arg(value_name = "CHUNK", help = "Chunk id to re-render")]
    pub chunk: u32,

    #[arg(long, help = "Replacement text for the chunk")]
    pub new_text: Option<String>,

    #[arg(long, help = "Change the number of leading chunks left out of the book")]
    pub skip_first_chunks: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ProjectArgs {
    #[arg(value_name = "PROJECT_DIR")]
    pub project_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct AssembleArgs {
    #[arg(value_name = "PROJECT_DIR")]
    pub project_dir: PathBuf,

    #[arg(long, help = "Change the number of leading chunks left out of the book")]
    pub skip_first_chunks: Option<usize>,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[arg(value_name = "PROJECT_DIR")]
    pub project_dir: PathBuf,

    #[arg(long, help = "Output as JSON")]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct BackendsArgs {
    #[arg(long, help = "Output as JSON")]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[arg(long, help = "Show current config as JSON")]
    pub show: bool,

    #[arg(long, help = "Create default config file")]
    pub init: bool,

    #[arg(long, help = "Validate configuration")]
    pub validate: bool,
}
