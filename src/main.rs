use std::error::Error;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use locator_diag::{
    config::{self, DiagConfig},
    detectors::{replace_locator_within, resolve_locator_within},
    diagnose::{Diagnoser, FsSource},
    harness::{self, TestRun},
    logger,
    normalize_url,
    state::{DiagnosisLog, FailureReport, LocatorDiagnostic, LocatorType},
};

#[derive(Parser)]
#[command(
    name = "locator-diag",
    version,
    about = "Find the UI locator behind a failed Playwright/Selenium pytest test."
)]
struct Cli {
    #[arg(long, global = true, help = "Print the diagnosis log to stderr")]
    verbose: bool,

    #[arg(long, global = true, help = "Lines scanned on each side of the failing line")]
    window: Option<usize>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Diagnose one failure from its error text
    Diagnose(DiagnoseArgs),
    /// Resolve the locator at a source line, without error text
    Resolve(ResolveArgs),
    /// Swap a failed locator for a new one in the test source
    Replace(ReplaceArgs),
    /// Run pytest and diagnose every failure
    Run(RunArgs),
    /// Strip query and fragment from a page URL
    NormalizeUrl { url: String },
}

#[derive(Args, Debug)]
struct DiagnoseArgs {
    #[arg(long, help = "File holding the error/traceback text, or - for stdin")]
    error: String,

    #[arg(long, help = "Test source file")]
    source: Option<PathBuf>,

    #[arg(long, default_value = "", help = "Test function name")]
    test_name: String,

    #[arg(long, help = "Failing line when the error text has none")]
    line: Option<usize>,

    #[arg(long, default_value_t = false, help = "Print JSON")]
    json: bool,
}

#[derive(Args, Debug)]
struct ResolveArgs {
    #[arg(long, help = "Test source file")]
    source: PathBuf,

    #[arg(long, help = "1-based line number")]
    line: usize,

    #[arg(long, value_enum, default_value_t = KindArg::Unknown)]
    kind: KindArg,
}

#[derive(Args, Debug)]
struct ReplaceArgs {
    #[arg(long, help = "Test source file")]
    source: PathBuf,

    #[arg(long, help = "Locator value to replace")]
    old: String,

    #[arg(long, help = "Replacement locator value")]
    new: String,

    #[arg(long, help = "Failing line; edits stay within --window of it")]
    line: Option<usize>,

    #[arg(long, default_value_t = false, help = "Rewrite the file instead of printing it")]
    write: bool,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long, default_value = ".", help = "Project root to run pytest in")]
    root: PathBuf,

    #[arg(long, help = "Extra pytest arguments (paths, -k expressions)")]
    target: Option<String>,

    #[arg(long, help = "Write the JSON report to this file")]
    out: Option<PathBuf>,

    #[arg(long, default_value_t = false, help = "Only print JSON report")]
    json: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    Playwright,
    Selenium,
    Unknown,
}

impl From<KindArg> for LocatorType {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Playwright => LocatorType::Playwright,
            KindArg::Selenium => LocatorType::Selenium,
            KindArg::Unknown => LocatorType::Unknown,
        }
    }
}

#[derive(Serialize)]
struct RunReport {
    generated_at: String,
    run: TestRun,
    failures: usize,
    diagnostics: Vec<LocatorDiagnostic>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let root = match &cli.command {
        CliCommand::Run(args) => args.root.clone(),
        _ => PathBuf::from("."),
    };
    let mut cfg = config::load(&root);
    cfg.verbose |= cli.verbose;
    if let Some(w) = cli.window {
        cfg.window = w;
    }

    match cli.command {
        CliCommand::Diagnose(args) => run_diagnose(args, cfg),
        CliCommand::Resolve(args) => run_resolve(args, &cfg),
        CliCommand::Replace(args) => run_replace(args, &cfg),
        CliCommand::Run(args) => run_suite(args, cfg),
        CliCommand::NormalizeUrl { url } => {
            println!("{}", normalize_url(&url));
            Ok(())
        }
    }
}

fn read_error_text(arg: &str) -> Result<String, Box<dyn Error>> {
    if arg == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    Ok(fs::read_to_string(arg)?)
}

fn run_diagnose(args: DiagnoseArgs, cfg: DiagConfig) -> Result<(), Box<dyn Error>> {
    let text = read_error_text(&args.error)?;
    let mut report = FailureReport::failed(args.test_name, text);
    report.source_file = args.source;
    report.line_hint = args.line;

    let verbose = cfg.verbose;
    let diagnoser = Diagnoser::new(FsSource::rooted("."), cfg);
    let mut state = DiagnosisLog::new();
    let result = diagnoser.diagnose_logged(&report, &mut state);

    if verbose {
        eprint!("{}", logger::render(&state));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    match result {
        Some(d) => print_diagnostic(&d),
        None => println!("no locator could be determined"),
    }
    Ok(())
}

fn run_resolve(args: ResolveArgs, cfg: &DiagConfig) -> Result<(), Box<dyn Error>> {
    let source = fs::read_to_string(&args.source)?;

    match resolve_locator_within(&source, args.line, args.kind.into(), cfg.window) {
        Some(found) => println!(
            "{}\t{}\t{:?}",
            found.value, found.family, found.strategy
        ),
        None => println!("no locator near {}:{}", args.source.display(), args.line),
    }
    Ok(())
}

fn run_replace(args: ReplaceArgs, cfg: &DiagConfig) -> Result<(), Box<dyn Error>> {
    let source = fs::read_to_string(&args.source)?;

    let Some(updated) = replace_locator_within(&source, &args.old, &args.new, args.line, cfg.window) else {
        return Err(format!("{:?} not found in {}", args.old, args.source.display()).into());
    };

    if args.write {
        fs::write(&args.source, updated)?;
        println!("updated {}", args.source.display());
    } else {
        print!("{}", updated);
    }
    Ok(())
}

fn run_suite(args: RunArgs, cfg: DiagConfig) -> Result<(), Box<dyn Error>> {
    let run = harness::run_pytest(&args.root, args.target.as_deref(), &cfg.pytest_cmd)?;
    let failures = harness::split_failures(&run.raw);

    let verbose = cfg.verbose;
    let diagnoser = Diagnoser::new(FsSource::rooted(&args.root), cfg);

    let mut diagnostics = Vec::new();
    for report in &failures {
        let mut state = DiagnosisLog::new();
        if let Some(d) = diagnoser.diagnose_logged(report, &mut state) {
            diagnostics.push(d);
        }
        if verbose {
            eprint!("{}", logger::render(&state));
        }
    }

    let report = RunReport {
        generated_at: Utc::now().to_rfc3339(),
        failures: failures.len(),
        run,
        diagnostics,
    };

    if let Some(path) = &args.out {
        write_report(path, &report)?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{}  passed={} failed={} ({} ms)",
        report.run.command, report.run.passed, report.run.failed, report.run.duration_ms
    );
    println!(
        "{} of {} failures traced to a locator",
        report.diagnostics.len(),
        report.failures
    );
    for d in &report.diagnostics {
        println!();
        print_diagnostic(d);
    }
    Ok(())
}

fn write_report(path: &Path, report: &RunReport) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(report)?)?;
    Ok(())
}

fn print_diagnostic(d: &LocatorDiagnostic) {
    let location = match (&d.test_file, d.line_number) {
        (Some(f), Some(n)) => format!("{}:{}", f, n),
        (Some(f), None) => f.clone(),
        (None, Some(n)) => format!("line {}", n),
        (None, None) => "-".to_string(),
    };

    println!("test     {}", d.test_function);
    println!("at       {}", location);
    println!("locator  {}", d.failed_locator.as_deref().unwrap_or("-"));
    println!("driver   {}", d.locator_type);
    println!("via      {:?}", d.strategy);
    if let Some(url) = &d.page_url {
        println!("page     {}", normalize_url(url));
    }
}
