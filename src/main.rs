use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use objc_inject::{
    load_from_path, DeclarationSummary, InjectError, InjectionRequest, Injector, Located, Outcome,
    Target,
};
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "OBJC_INJECT_LOG";

#[derive(Parser)]
#[command(name = "objc-inject")]
#[command(about = "Inject code at the top of an Objective-C method body", long_about = None)]
#[command(version)]
struct Cli {
    /// Log decisions to stderr (OBJC_INJECT_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TargetArgs {
    /// Source file to search
    file: PathBuf,

    /// Selector to find, e.g. `application:didFinishLaunchingWithOptions:` or `-[AppDelegate run]`
    #[arg(short, long)]
    selector: String,

    /// Only match methods declared inside this class
    #[arg(long)]
    class: Option<String>,

    /// Skip declarations that have no body
    #[arg(long)]
    definitions_only: bool,

    /// Fail on syntax errors instead of indexing around them
    #[arg(long)]
    strict: bool,

    /// Compiler arguments, passed through to the indexer untouched
    #[arg(last = true)]
    compiler_args: Vec<String>,
}

impl TargetArgs {
    fn request(&self, code: String) -> Result<InjectionRequest> {
        let mut target = Target::parse(&self.selector)?;
        if let Some(class) = &self.class {
            target = Target::new(target.selector()).with_class(class.as_str());
        }
        Ok(InjectionRequest::new(&self.file, target, code)
            .with_args(self.compiler_args.iter().cloned())
            .definitions_only(self.definitions_only))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Inject code at the start of a method body
    Inject {
        #[command(flatten)]
        target: TargetArgs,

        /// Text to inject, inserted verbatim
        #[arg(long, conflicts_with = "code_file", required_unless_present = "code_file")]
        code: Option<String>,

        /// Read the text to inject from a file
        #[arg(long)]
        code_file: Option<PathBuf>,

        /// Show what would change without writing the file
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of the change
        #[arg(short, long)]
        diff: bool,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print where code would be injected
    Locate {
        #[command(flatten)]
        target: TargetArgs,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the injection described by a TOML request file
    Apply {
        /// Path to the request file
        request: PathBuf,

        /// Show what would change without writing the file
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of the change
        #[arg(short, long)]
        diff: bool,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the declarations found in a file
    List {
        file: PathBuf,

        /// Print the declarations as JSON
        #[arg(long)]
        json: bool,

        /// Compiler arguments, passed through to the indexer untouched
        #[arg(last = true)]
        compiler_args: Vec<String>,
    },
}

/// How a successful command ended.
enum Status {
    Done,
    NoMatch,
}

impl From<Status> for ExitCode {
    fn from(status: Status) -> Self {
        match status {
            Status::Done => ExitCode::SUCCESS,
            Status::NoMatch => ExitCode::from(2),
        }
    }
}

struct RunOptions {
    strict: bool,
    dry_run: bool,
    diff: bool,
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Inject {
            target,
            code,
            code_file,
            dry_run,
            diff,
            json,
        } => read_code(code, code_file)
            .and_then(|code| target.request(code))
            .and_then(|request| {
                let options = RunOptions {
                    strict: target.strict,
                    dry_run,
                    diff,
                    json,
                };
                cmd_inject(&request, &options)
            }),

        Commands::Locate { target, json } => target
            .request(String::new())
            .and_then(|request| cmd_locate(&request, target.strict, json)),

        Commands::Apply {
            request,
            dry_run,
            diff,
            json,
        } => cmd_apply(&request, dry_run, diff, json),

        Commands::List {
            file,
            json,
            compiler_args,
        } => cmd_list(&file, &compiler_args, json),
    };

    match result {
        Ok(status) => status.into(),
        Err(error) => {
            eprintln!("{} {:#}", "✗".red(), error);
            if error
                .downcast_ref::<InjectError>()
                .is_some_and(InjectError::may_have_modified_target)
            {
                eprintln!(
                    "{}",
                    "  The write failed part-way; the target file may be incomplete.".yellow()
                );
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn read_code(code: Option<String>, code_file: Option<PathBuf>) -> Result<String> {
    match (code, code_file) {
        (Some(code), _) => Ok(code),
        (None, Some(path)) => fs::read_to_string(&path)
            .with_context(|| format!("failed to read code file {}", path.display())),
        (None, None) => anyhow::bail!("either --code or --code-file is required"),
    }
}

fn cmd_inject(request: &InjectionRequest, options: &RunOptions) -> Result<Status> {
    let mut injector = Injector::objc(options.strict)?;

    if options.dry_run {
        let outcome = injector.preview(request)?;
        return match outcome {
            Outcome::Matched(preview) => {
                if options.json {
                    print_json(&Outcome::<&Located>::Matched(&preview.located))?;
                } else {
                    println!(
                        "{} Would inject {} bytes into {} at {}",
                        "✓".green(),
                        request.code.len(),
                        request.target,
                        describe(&preview.located),
                    );
                }
                if options.diff {
                    display_diff(
                        &preview.located.anchor.file,
                        &String::from_utf8_lossy(&preview.before),
                        &String::from_utf8_lossy(&preview.after),
                    );
                }
                Ok(Status::Done)
            }
            Outcome::NoMatch {
                target,
                suggestions,
            } => report_no_match(&target, &suggestions, options.json),
        };
    }

    let before = if options.diff {
        fs::read(&request.file).ok()
    } else {
        None
    };

    match injector.inject(request)? {
        Outcome::Matched(report) => {
            if options.json {
                print_json(&Outcome::<&objc_inject::Report>::Matched(&report))?;
            } else {
                println!(
                    "{} Injected {} bytes into {} at {}",
                    "✓".green(),
                    report.bytes_inserted,
                    request.target,
                    describe(&report.located),
                );
                if !report.fingerprint_matched {
                    println!(
                        "{}",
                        "  Warning: the file changed while it was being parsed".yellow()
                    );
                }
            }
            if let Some(before) = before {
                let file = &report.located.anchor.file;
                let after = fs::read(file)
                    .with_context(|| format!("failed to re-read {}", file.display()))?;
                display_diff(
                    file,
                    &String::from_utf8_lossy(&before),
                    &String::from_utf8_lossy(&after),
                );
            }
            Ok(Status::Done)
        }
        Outcome::NoMatch {
            target,
            suggestions,
        } => report_no_match(&target, &suggestions, options.json),
    }
}

fn cmd_locate(request: &InjectionRequest, strict: bool, json: bool) -> Result<Status> {
    let mut injector = Injector::objc(strict)?;
    match injector.locate(request)? {
        Outcome::Matched(located) => {
            if json {
                print_json(&Outcome::<&Located>::Matched(&located))?;
            } else {
                println!("{} {} found at {}", "✓".green(), request.target, describe(&located));
            }
            Ok(Status::Done)
        }
        Outcome::NoMatch {
            target,
            suggestions,
        } => report_no_match(&target, &suggestions, json),
    }
}

fn cmd_apply(path: &Path, dry_run: bool, diff: bool, json: bool) -> Result<Status> {
    let loaded = load_from_path(path)?;
    if !json {
        println!("{}", format!("Request: {}", path.display()).dimmed());
    }
    let options = RunOptions {
        strict: loaded.strict,
        dry_run,
        diff,
        json,
    };
    cmd_inject(&loaded.request, &options)
}

fn cmd_list(file: &Path, compiler_args: &[String], json: bool) -> Result<Status> {
    let mut injector = Injector::objc(false)?;
    let declarations = injector.declarations(file, compiler_args)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&declarations)?);
        return Ok(Status::Done);
    }

    println!("{}", format!("{}:", file.display()).bold());
    for DeclarationSummary {
        kind,
        name,
        container,
        line,
        is_definition,
    } in &declarations
    {
        let kind = format!("{kind:?}");
        let scope = container
            .as_deref()
            .map(|c| format!(" ({c})"))
            .unwrap_or_default();
        let body = if *is_definition { "" } else { " [no body]" };
        println!(
            "  {:>5}  {:<15} {}{}{}",
            line,
            kind.cyan(),
            name,
            scope.dimmed(),
            body.yellow()
        );
    }
    Ok(Status::Done)
}

fn report_no_match(target: &str, suggestions: &[String], json: bool) -> Result<Status> {
    if json {
        print_json(&Outcome::<()>::NoMatch {
            target: target.to_string(),
            suggestions: suggestions.to_vec(),
        })?;
        return Ok(Status::NoMatch);
    }

    println!("{} No declaration matches {}", "⊘".yellow(), target);
    if !suggestions.is_empty() {
        println!("  Did you mean: {}", suggestions.join(", "));
    }
    println!("{}", "  File left unmodified.".dimmed());
    Ok(Status::NoMatch)
}

fn describe(located: &Located) -> String {
    format!(
        "{}:{}:{} (offset {})",
        located.anchor.file.display(),
        located.anchor.line,
        located.anchor.column,
        located.anchor.offset
    )
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (injected)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}
