use std::fmt::Display;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use futures::executor::block_on;

use evaluator::{
    DependencyResolver, EvalError, FileHandle, FsVault, ManualIntervals, RerenderQueue,
    ResolveError, Scheduler, Settings, Vault,
};
use lisp::LispBackend;
use notes::BlockKind;
use notes::template::wrap_in_fence;
use quill_cli::config::{self, Overrides};
use quill_cli::document_path;
use quill_cli::host::{AttachMode, SimulatedHost};

#[derive(Parser)]
#[command(name = "quill", version, about = "Evaluate the code blocks of markdown notes")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Vault root directory (defaults to the note's directory)
    #[arg(long, global = true)]
    vault: Option<PathBuf>,

    /// Settings file (defaults to quill.toml in the vault root)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Language tag of evaluated blocks, overriding the settings file
    #[arg(long, global = true)]
    lang: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate a note and its requirements, then print the rendered note
    Run(RunArgs),

    /// Print the order a note and its requirements are evaluated in
    Deps(FileArgs),

    /// List the evaluable code blocks of a note
    Blocks(FileArgs),

    /// Wrap stdin in a fenced code block
    Wrap,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Markdown note to evaluate
    file: String,

    /// Re-evaluate the note even if it is unchanged
    #[arg(short, long)]
    force: bool,

    /// Show full error details instead of the message only
    #[arg(long)]
    full_errors: bool,

    /// Refuse unsanitized HTML output
    #[arg(long)]
    no_unsafe_html: bool,

    /// Number of interval ticks to run before printing
    #[arg(long, default_value_t = 0)]
    ticks: u32,

    /// Length of one tick in milliseconds
    #[arg(long, default_value_t = 1000)]
    tick_ms: u64,

    /// Print the rendered HTML instead of text
    #[arg(long)]
    html: bool,

    /// Attach results by pairing code elements in order rather than by
    /// line ranges
    #[arg(long)]
    reconcile: bool,
}

#[derive(clap::Args)]
struct FileArgs {
    /// Markdown note
    file: String,
}

/// Options shared by every subcommand.
struct Env {
    color: ColorChoice,
    vault: Option<PathBuf>,
    config: Option<PathBuf>,
    lang: Option<String>,
}

fn main() {
    env_logger::Builder::from_default_env().init();

    let cli = Cli::parse();
    let env = Env {
        color: if cli.no_color {
            ColorChoice::Never
        } else {
            ColorChoice::Auto
        },
        vault: cli.vault,
        config: cli.config,
        lang: cli.lang,
    };

    match cli.command {
        Command::Run(args) => do_run(&env, args),
        Command::Deps(args) => do_deps(&env, args),
        Command::Blocks(args) => do_blocks(&env, args),
        Command::Wrap => do_wrap(&env),
    }
}

fn do_run(env: &Env, args: RunArgs) {
    let (vault, path) = open_vault(env, &args.file);
    let overrides = Overrides {
        lang: env.lang.clone(),
        full_errors: args.full_errors,
        no_unsafe_html: args.no_unsafe_html,
    };
    let settings = load_settings(env, vault.root(), &overrides);

    let intervals = Rc::new(ManualIntervals::new());
    let backend = Rc::new(LispBackend::new());
    let scheduler = Scheduler::from_settings(vault.clone(), backend, &settings, intervals.clone());

    let rerender = Rc::new(RerenderQueue::new());
    scheduler.on_document_evaluated({
        let rerender = rerender.clone();
        move |evaluation| {
            let errors = evaluation.blocks().iter().filter(|b| b.is_error()).count();
            log::info!(
                "evaluated {}: {} blocks, {} errors",
                evaluation.path(),
                evaluation.blocks().len(),
                errors
            );
            rerender.request(evaluation.path());
        }
    });

    let evaluated = match block_on(scheduler.evaluate(&path, args.force)) {
        Ok(evaluated) => evaluated,
        Err(err) => report(env, &vault, &err),
    };

    // Only the requested note has a view; dependencies just need evaluating.
    for refreshed in rerender.drain() {
        if refreshed != path {
            log::debug!("{} has no open view", refreshed);
        }
    }

    let content = match block_on(vault.read(&FileHandle::new(path.as_str()))) {
        Ok(content) => content,
        Err(err) => fail(err),
    };
    let host = SimulatedHost::render(&content);
    let mode = if args.reconcile {
        AttachMode::Reconcile
    } else {
        AttachMode::Lines
    };
    let evaluation = &evaluated.evaluation;
    let attached = host.attach(evaluation, mode, &settings.block_language);
    if attached < evaluation.blocks().len() {
        log::warn!(
            "{}: {} of {} blocks have no place in the rendered note",
            path,
            evaluation.blocks().len() - attached,
            evaluation.blocks().len()
        );
    }

    for _ in 0..args.ticks {
        intervals.advance(Duration::from_millis(args.tick_ms));
    }

    if args.html {
        println!("{}", host.to_html());
    } else {
        println!("{}", host.to_text());
    }

    // Detaches every evaluation, cancelling their intervals.
    scheduler.clear();
}

fn do_deps(env: &Env, args: FileArgs) {
    let (vault, path) = open_vault(env, &args.file);
    match block_on(DependencyResolver::new(&*vault).resolve(&path)) {
        Ok(plan) => {
            for document in &plan.order {
                println!("{}", document);
            }
        }
        Err(err) => report(env, &vault, &EvalError::Resolve(err)),
    }
}

fn do_blocks(env: &Env, args: FileArgs) {
    let content = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => fail(format!("cannot read '{}': {}", args.file, e)),
    };
    let root = vault_root(env, &args.file);
    let settings = load_settings(env, &root, &Overrides {
        lang: env.lang.clone(),
        ..Overrides::default()
    });

    for block in notes::extract_code_blocks(&settings.block_language, &content) {
        let kind = match block.kind {
            BlockKind::Fenced => "fenced",
            BlockKind::Inline => "inline",
        };
        let mut lines = block.source.lines();
        let first = lines.next().unwrap_or("");
        let more = if lines.next().is_some() { " ..." } else { "" };
        println!(
            "{:>4}-{:<4} {:<6} {}{}",
            block.line_start + 1,
            block.line_end + 1,
            kind,
            first,
            more
        );
    }
}

fn do_wrap(env: &Env) {
    let mut selection = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut selection) {
        fail(format!("cannot read stdin: {}", e));
    }
    let root = env.vault.clone().unwrap_or_else(|| PathBuf::from("."));
    let settings = load_settings(env, &root, &Overrides {
        lang: env.lang.clone(),
        ..Overrides::default()
    });

    let selection = selection.trim_end_matches('\n');
    let selection = if selection.trim().is_empty() {
        None
    } else {
        Some(selection)
    };
    let template = wrap_in_fence(&settings.block_language, selection);
    print!("{}", template.text);
    eprintln!("cursor: line {}", template.cursor_line + 1);
}

fn vault_root(env: &Env, file: &str) -> PathBuf {
    if let Some(vault) = &env.vault {
        return vault.clone();
    }
    match Path::new(file).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn open_vault(env: &Env, file: &str) -> (Rc<FsVault>, String) {
    let root = vault_root(env, file);
    let vault = Rc::new(FsVault::new(root));
    match document_path(&vault, file) {
        Some(path) => (vault, path),
        None => fail(format!(
            "'{}' is not a note in vault '{}'",
            file,
            vault.root().display()
        )),
    }
}

fn load_settings(env: &Env, root: &Path, overrides: &Overrides) -> Settings {
    match config::load_settings(root, env.config.as_deref()) {
        Ok(settings) => overrides.apply(settings),
        Err(err) => fail(err),
    }
}

/// Print `error` and exit. Front matter problems are shown against the
/// offending note's source.
fn report(env: &Env, vault: &FsVault, error: &EvalError) -> ! {
    if let EvalError::Resolve(ResolveError::FrontMatter { path, error: parse_error }) = error {
        if let Ok(source) = std::fs::read_to_string(vault.root().join(path)) {
            let mut files = SimpleFiles::new();
            let file_id = files.add(path.clone(), source);
            let writer = StandardStream::stderr(env.color);
            let config = term::Config::default();
            let diagnostic = parse_error.to_diagnostic(file_id);
            let _ = term::emit_to_write_style(&mut writer.lock(), &config, &files, &diagnostic);
            process::exit(1);
        }
    }
    fail(error)
}

fn fail(message: impl Display) -> ! {
    eprintln!("error: {}", message);
    process::exit(1);
}
