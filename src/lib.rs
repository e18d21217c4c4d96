pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod project;
pub mod review;
mod subprocess;
pub mod text;
pub mod tts;

pub use error::{Error, Result};

use anyhow::Context;
use cli::{Cli, Commands};
use project::ProjectLayout;
use tracing_subscriber::EnvFilter;

pub fn run(cli: Cli) -> anyhow::Result<()> {
    setup_tracing(cli.verbose);

    match cli.command {
        Commands::Process(args) => process(args),
        Commands::Review(args) => review(args),
        Commands::Resume(args) => resume(args),
        Commands::Assemble(args) => assemble(args),
        Commands::Status(args) => status(args),
        Commands::Backends(args) => backends(args),
        Commands::Config(args) => config_cmd(args),
    }
}

fn setup_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn process(args: cli::ProcessArgs) -> anyhow::Result<()> {
    let config = config::Config::load().context("load config")?;
    let preset_name = args
        .preset
        .unwrap_or_else(|| config.default_preset.clone());
    let preset = config.load_preset(&preset_name)?;
    let backend = tts::select_backend(&config)?;

    let request = pipeline::ProcessRequest {
        input: args.input,
        output_dir: args.output_dir,
        voice_model: args.voice_model,
        preset_name,
        preset,
        skip_first_chunks: args.skip_first_chunks,
    };
    println!(
        "Processing {} -> {}",
        request.input.display(),
        request.output_dir.display()
    );

    let muxer = audio::select_muxer(&config);
    let report = pipeline::process(&request, backend.as_ref(), muxer.as_ref())?;
    print_run_report(&report, &request.output_dir);
    Ok(())
}

fn review(args: cli::ReviewArgs) -> anyhow::Result<()> {
    let config = config::Config::load().context("load config")?;
    let backend = tts::select_backend(&config)?;
    let layout = ProjectLayout::new(&args.project_dir);

    let request = review::ReviewRequest {
        chunk_id: args.chunk,
        new_text: args.new_text,
        skip_first_chunks: args.skip_first_chunks,
    };
    let muxer = audio::select_muxer(&config);
    let outcome = review::review(&layout, &request, backend.as_ref(), muxer.as_ref())?;

    match outcome.outcome {
        tts::ChunkOutcome::Rendered => println!(
            "Chunk {} re-rendered; chapter {} and book reassembled",
            outcome.chunk_id, outcome.chapter_id
        ),
        tts::ChunkOutcome::Failed => println!(
            "Chunk {} failed again (see {}); chapter {} and book reassembled without it",
            outcome.chunk_id,
            layout.failures_log().display(),
            outcome.chapter_id
        ),
    }
    Ok(())
}

fn resume(args: cli::ProjectArgs) -> anyhow::Result<()> {
    let config = config::Config::load().context("load config")?;
    let layout = ProjectLayout::new(&args.project_dir);
    let backend = tts::select_backend(&config)?;

    let muxer = audio::select_muxer(&config);
    let report = pipeline::resume(&layout, backend.as_ref(), muxer.as_ref())?;
    print_run_report(&report, &args.project_dir);
    Ok(())
}

fn assemble(args: cli::AssembleArgs) -> anyhow::Result<()> {
    let config = config::Config::load().context("load config")?;
    let layout = ProjectLayout::new(&args.project_dir);
    let muxer = audio::select_muxer(&config);
    let report = pipeline::assemble(&layout, muxer.as_ref(), args.skip_first_chunks)?;
    println!(
        "Assembled {} chapter(s); {} without rendered audio",
        report.chapters.len(),
        report.silent_chapters.len()
    );
    if let Some(book) = report.book {
        println!("Book: {}", layout.resolve(&book).display());
    }
    Ok(())
}

fn status(args: cli::StatusArgs) -> anyhow::Result<()> {
    let layout = ProjectLayout::new(&args.project_dir);
    let status = pipeline::status(&layout)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let summary = &status.summary;
    println!("Chapters: {}", summary.chapters);
    println!(
        "Chunks: {} ({} rendered, {} failed, {} pending)",
        summary.chunks, summary.rendered, summary.failed, summary.pending
    );
    println!("Estimated length: {}", format_duration(summary.estimated_seconds));
    if status.skip_first_chunks > 0 {
        println!("Book skips first {} chunk(s)", status.skip_first_chunks);
    }
    for chapter in &status.chapters {
        let audio = if chapter.audio_path.is_some() { "assembled" } else { "no audio" };
        println!(
            "- {:02} {} [{}/{} rendered, {}]",
            chapter.chapter_id, chapter.title, chapter.rendered, chapter.chunks, audio
        );
    }
    for failure in &status.failures {
        println!(
            "! chunk {} (chapter {}): {}",
            failure.chunk_id, failure.chapter_id, failure.error
        );
    }
    Ok(())
}

fn backends(args: cli::BackendsArgs) -> anyhow::Result<()> {
    let config = config::Config::load().context("load config")?;
    let info = tts::backends_info(&config);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Available backends:");
    for backend in info {
        let status = if backend.available { "available" } else { "unavailable" };
        println!("- {} ({}, {})", backend.name, backend.binary.display(), status);
    }
    Ok(())
}

fn config_cmd(args: cli::ConfigArgs) -> anyhow::Result<()> {
    if args.init {
        let path = config::Config::init_default()?;
        println!("Initialized config at {}", path.display());
        return Ok(());
    }

    if args.show {
        let config = config::Config::load()?;
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    if args.validate {
        let config = config::Config::load()?;
        config.validate()?;
        println!("Config OK");
        return Ok(());
    }

    let path = config::Config::default_path()?;
    println!("{}", path.display());
    Ok(())
}

fn print_run_report(report: &pipeline::RunReport, project_dir: &std::path::Path) {
    let summary = &report.summary;
    println!(
        "Synthesized {} chunk(s): {} rendered, {} failed",
        report.synthesis.attempted(),
        report.synthesis.rendered.len(),
        report.synthesis.failed.len()
    );
    if summary.failed > 0 {
        println!(
            "Failed chunks: {:?} (re-render with `bookforge review`)",
            summary.failed_chunk_ids
        );
    }
    if let Some(book) = &report.assembly.book {
        println!("Book: {}", project_dir.join(book).display());
    }
}

fn format_duration(seconds: f32) -> String {
    let total = seconds.round() as u64;
    format!("{}h{:02}m{:02}s", total / 3600, (total % 3600) / 60, total % 60)
}
