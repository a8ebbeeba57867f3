use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "seqcache", version)]
struct Cli {
    /// Cache config sidecar (JSON with a `CachePath` key). Defaults to the per-user location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log per-frame progress and pipeline details.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the displayable layers of one EXR frame.
    Layers(LayersArgs),
    /// Show the sequence pattern inferred from one frame.
    Pattern(PatternArgs),
    /// Convert a layer of the whole sequence into the cache (requires `oiiotool` on PATH).
    Convert(ConvertArgs),
    /// Print the cache root, or set it with `--set`.
    CacheDir(CacheDirArgs),
    /// List cached frames of a sequence layer.
    Cached(CachedArgs),
    /// Delete everything under the cache root.
    ClearCache(ClearArgs),
}

#[derive(Parser, Debug)]
struct LayersArgs {
    /// Any frame of the sequence.
    frame: PathBuf,

    /// Also print each layer's channel names.
    #[arg(long)]
    channels: bool,
}

#[derive(Parser, Debug)]
struct PatternArgs {
    frame: PathBuf,
}

#[derive(Parser, Debug)]
struct ConvertArgs {
    /// Any frame of the sequence.
    frame: PathBuf,

    /// Layer to extract (see `seqcache layers`).
    #[arg(long)]
    layer: String,

    /// Write frames here instead of the cache directory.
    #[arg(long)]
    dest: Option<PathBuf>,

    /// Worker count (default: half the available cores).
    #[arg(long)]
    workers: Option<usize>,

    /// Transcode program.
    #[arg(long, default_value = "oiiotool")]
    tool: PathBuf,

    /// Thread hint passed to each transcode invocation.
    #[arg(long, default_value_t = 1)]
    tool_threads: usize,
}

#[derive(Parser, Debug)]
struct CacheDirArgs {
    /// New cache root to persist.
    #[arg(long)]
    set: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct CachedArgs {
    frame: PathBuf,

    #[arg(long)]
    layer: String,
}

#[derive(Parser, Debug)]
struct ClearArgs {
    /// Required; clearing is never implied.
    #[arg(long)]
    yes: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .init();

    let locator = seqcache::CacheLocator::new(cache_config(cli.config.as_deref()));
    match cli.cmd {
        Command::Layers(args) => cmd_layers(args),
        Command::Pattern(args) => cmd_pattern(args),
        Command::Convert(args) => cmd_convert(args, &locator),
        Command::CacheDir(args) => cmd_cache_dir(args, &locator),
        Command::Cached(args) => cmd_cached(args, &locator),
        Command::ClearCache(args) => cmd_clear(args, &locator),
    }
}

fn cache_config(sidecar: Option<&Path>) -> seqcache::CacheConfig {
    let mut cfg = seqcache::CacheConfig::user_default();
    if let Some(path) = sidecar {
        cfg.sidecar_path = path.to_path_buf();
    }
    cfg
}

fn cmd_layers(args: LayersArgs) -> anyhow::Result<()> {
    let layers = seqcache::analyze_container(&seqcache::ExrChannelSource::default(), &args.frame)
        .with_context(|| format!("read layers of '{}'", args.frame.display()))?;
    if layers.is_empty() {
        eprintln!("no displayable layers in {}", args.frame.display());
        return Ok(());
    }
    for layer in layers.values() {
        let kind = if layer.has_rgba() { "rgba" } else { "rgb" };
        println!("{}\t{kind}", layer.name);
        if args.channels {
            for ch in &layer.channels {
                println!("  {ch}");
            }
        }
    }
    Ok(())
}

fn cmd_pattern(args: PatternArgs) -> anyhow::Result<()> {
    let seq = seqcache::resolve(&args.frame)?;
    let members = seq.enumerate()?;
    println!("directory: {}", seq.directory.display());
    println!("glob:      {}", seq.glob_pattern());
    println!("printf:    {}", seq.printf_pattern());
    println!("stem:      {}", seq.stem());
    println!("padding:   {}", seq.padding);
    match (members.first(), members.last()) {
        (Some(first), Some(last)) => println!(
            "frames:    {} files, {}-{}",
            members.len(),
            first.0.value,
            last.0.value
        ),
        _ => println!("frames:    none on disk"),
    }
    Ok(())
}

fn cmd_convert(args: ConvertArgs, locator: &seqcache::CacheLocator) -> anyhow::Result<()> {
    let transcoder = seqcache::OiioToolTranscoder::new(seqcache::OiioToolOpts {
        program: args.tool.clone(),
        threads: args.tool_threads,
        ..seqcache::OiioToolOpts::default()
    })?;
    if !transcoder.is_available() {
        anyhow::bail!(
            "'{}' is required for conversion, but was not found on PATH",
            args.tool.display()
        );
    }
    let pipeline = seqcache::Pipeline::new(
        Arc::new(transcoder),
        seqcache::PipelineOpts {
            workers: args.workers,
        },
    )?;

    let cancel = seqcache::CancelToken::new();
    let on_progress = |p: seqcache::ProgressSnapshot| eprintln!("{p}");

    let (dest, outcome) = match &args.dest {
        Some(dest) => {
            let outcome = pipeline.run(&args.frame, &args.layer, dest, &on_progress, &cancel)?;
            (dest.clone(), outcome)
        }
        None => pipeline.run_to_cache(locator, &args.frame, &args.layer, &on_progress, &cancel)?,
    };

    match outcome {
        seqcache::RunOutcome::Completed(summary) => {
            let seq = seqcache::resolve(&args.frame)?;
            eprintln!(
                "wrote {} frames to {} in {:.1}s",
                summary.completed_frames,
                dest.display(),
                summary.elapsed.as_secs_f64()
            );
            let glob = dest.join(format!("{}_*.{}", seq.stem(), seq.cache_extension()));
            println!("{}", glob.display());
            Ok(())
        }
        seqcache::RunOutcome::Failed { summary, error } => Err(anyhow::Error::new(error).context(
            format!(
                "conversion failed after {}/{} frames",
                summary.completed_frames, summary.total_frames
            ),
        )),
        seqcache::RunOutcome::Cancelled(summary) => anyhow::bail!(
            "conversion cancelled after {}/{} frames",
            summary.completed_frames,
            summary.total_frames
        ),
        seqcache::RunOutcome::Rejected => anyhow::bail!("a conversion is already running"),
    }
}

fn cmd_cache_dir(args: CacheDirArgs, locator: &seqcache::CacheLocator) -> anyhow::Result<()> {
    if let Some(root) = &args.set {
        locator
            .set_root(root)
            .with_context(|| format!("set cache root '{}'", root.display()))?;
    }
    println!("{}", locator.root_dir().display());
    Ok(())
}

fn cmd_cached(args: CachedArgs, locator: &seqcache::CacheLocator) -> anyhow::Result<()> {
    let seq = seqcache::resolve(&args.frame)?;
    let ext = seq.cache_extension();
    let frames = locator.cached_frames(seq.stem(), &args.layer, ext)?;
    eprintln!("{} cached frames", frames.len());
    if !frames.is_empty() {
        println!(
            "{}",
            locator
                .target_glob(seq.stem(), &args.layer, ext)?
                .display()
        );
    }
    Ok(())
}

fn cmd_clear(args: ClearArgs, locator: &seqcache::CacheLocator) -> anyhow::Result<()> {
    if !args.yes {
        anyhow::bail!(
            "refusing to clear '{}' without --yes",
            locator.root_dir().display()
        );
    }
    locator.clear_all()?;
    eprintln!("cleared {}", locator.root_dir().display());
    Ok(())
}
