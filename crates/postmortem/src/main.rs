use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use postmortem_core::object::ModuleTable;
use postmortem_core::prelude::*;
use postmortem_utils::{info, init_logging, warn, LogConfig, LogFormat, LogLevel};

/// Inspect postmortem snapshots of a crashed program's stack.
#[derive(Parser, Debug)]
#[command(name = "postmortem")]
#[command(version)]
#[command(about = "Inspect postmortem snapshots of a crashed program's stack", long_about = None)]
struct Cli
{
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, global = true)]
    log_format: Option<FormatArg>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg
{
    Pretty,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Load a snapshot and print its call stack
    #[command(alias = "load")]
    Show
    {
        /// Snapshot file to load
        file: PathBuf,
        /// Print local variables of every frame, not just the innermost
        #[arg(long, default_value_t = false)]
        all_locals: bool,
        /// Thread to show, for multi-thread snapshots
        #[arg(long)]
        thread: Option<String>,
    },
    /// Print a short summary of snapshot files
    Peek
    {
        /// Snapshot files, or directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Print one reconstructed object by id
    Object
    {
        /// Snapshot file to load
        file: PathBuf,
        /// Object id as stored in the snapshot
        id: String,
    },
}

fn main()
{
    let cli = Cli::parse();

    let mut config = LogConfig::from_env();
    if cli.verbose > 0 {
        config = config.with_level(LogLevel::from_verbosity(cli.verbose));
    }
    if let Some(format) = cli.log_format {
        config = config.with_format(match format {
            FormatArg::Pretty => LogFormat::Pretty,
            FormatArg::Json => LogFormat::Json,
        });
    }
    if let Some(file) = &cli.log_file {
        config = config.with_file(file);
    }
    let _guard = match init_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli.command) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn registry() -> Arc<TypeRegistry>
{
    let redaction = Arc::new(RedactionPolicy::from_env());
    Arc::new(TypeRegistry::standard(redaction, &ModuleTable::new()))
}

fn run_command(command: Commands) -> Result<()>
{
    match command {
        Commands::Show {
            file,
            all_locals,
            thread,
        } => {
            info!(path = %file.display(), "loading snapshot");
            let snapshot = Snapshot::read_from(&file)?;
            let loaded = snapshot.load(registry());
            if let Some(description) = snapshot.description.as_deref() {
                println!("{description}\n");
            }
            let frame = match thread {
                Some(thread) => loaded
                    .thread_views()
                    .into_iter()
                    .find(|(id, _)| *id == thread)
                    .map(|(_, view)| view)
                    .ok_or_else(|| PostmortemError::InvalidArgument(format!("no thread '{thread}' in snapshot")))?,
                None => loaded
                    .frame_view()
                    .ok_or_else(|| PostmortemError::InvalidArgument("snapshot has no frame".to_string()))?,
            };
            print_stack(&loaded, &frame, all_locals);
            Ok(())
        }
        Commands::Peek { paths } => {
            let files = expand_paths(&paths);
            let mut failed = 0usize;
            for (path, summary) in peek_files(&files) {
                match summary {
                    Ok(summary) => println!("{summary}"),
                    Err(e) => {
                        failed += 1;
                        eprintln!("{}: {e}", path.display());
                    }
                }
            }
            if failed > 0 {
                warn!(failed, total = files.len(), "some snapshots could not be read");
            }
            Ok(())
        }
        Commands::Object { file, id } => {
            let snapshot = Snapshot::read_from(&file)?;
            let loaded = snapshot.load(registry());
            let id = ObjectId::new(id);
            let value = loaded.container.get_object(&id);
            println!("{}", loaded.container.graph().repr(&id));
            if let Some(proxy) = value.as_proxy() {
                for name in proxy.attr_names() {
                    let attr = proxy.attr_id(name).map(|attr| loaded.container.graph().repr(attr));
                    println!("    {name} = {}", attr.unwrap_or_default());
                }
            }
            Ok(())
        }
    }
}

/// Print outermost caller first, like a traceback.
fn print_stack(loaded: &LoadedSnapshot, innermost: &FrameView, all_locals: bool)
{
    let mut frames = vec![innermost.clone()];
    while let Some(back) = frames.last().and_then(FrameView::back) {
        if frames.iter().any(|frame| frame.id() == back.id()) {
            break;
        }
        frames.push(back);
    }

    let graph = loaded.container.graph();
    for (depth, frame) in frames.iter().enumerate().rev() {
        let filename = frame.filename().unwrap_or_else(|| "<unknown>".to_string());
        let lineno = frame.lineno().unwrap_or_default();
        let name = frame.name().unwrap_or_else(|| "<unknown>".to_string());
        println!("  File \"{filename}\", line {lineno}, in {name}");
        if let Some(line) = loaded.source_line(&filename, lineno) {
            println!("    {}", line.trim());
        }
        if all_locals || depth == 0 {
            for (local, id) in frame.locals() {
                println!("      {local} = {}", graph.repr(&id));
            }
        }
    }
}

/// Files as given, directories replaced by the files directly inside them.
fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf>
{
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(dir_files(path));
        } else {
            files.push(path.clone());
        }
    }
    files
}

fn dir_files(dir: &Path) -> Vec<PathBuf>
{
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "cannot read directory");
            return Vec::new();
        }
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}
