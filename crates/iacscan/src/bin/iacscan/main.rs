mod cli;

use iacscan::config::ScanConfig;
use iacscan::hcl_documents::HclDocuments;
use iacscan::module::Module;
use iacscan::report::ScanReport;
use iacscan::scanner::Scanner;
use iacscan::variables::Overrides;
use std::io::Write;
use std::path::PathBuf;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("IACSCAN_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(2);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err);
                    std::process::exit(2);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Scan(scan_cli) => scan(scan_cli),
        cli::Command::Rules(rules_cli) => rules(rules_cli).map(|()| true),
        cli::Command::Dev(dev_cli) => dev(dev_cli).map(|()| true),
    };

    match command_result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            for error in e.chain() {
                eprintln!("{error}")
            }
            std::process::exit(2);
        }
    }
}

/// Returns `false` if anything failed
pub fn scan(cli: cli::ScanCommand) -> anyhow::Result<bool> {
    let documents = load(&cli.paths)?;
    let module = Module::new(&documents)?;

    let mut overrides = Overrides::from_env();
    for tfvars_file in &cli.tfvars_files {
        overrides.merge(Overrides::load_tfvars(tfvars_file)?);
    }

    let mut config = match &cli.config_file {
        Some(path) => ScanConfig::load(path)?,
        None => ScanConfig::default(),
    };
    config.merge(ScanConfig {
        exclude: cli.exclude.clone(),
        minimum_severity: cli.minimum_severity,
        ..Default::default()
    });

    let report = Scanner::new(iacscan::registry::global())
        .with_config(config)
        .parallel(!cli.sequential)
        .scan(&module, overrides);

    output(&cli.output, &report, cli.include_passed)?;
    Ok(!report.has_failures())
}

fn load(paths: &[PathBuf]) -> anyhow::Result<HclDocuments> {
    let mut documents = HclDocuments::default();

    if paths.is_empty() {
        documents.load_directory(&std::env::current_dir()?)?;
    }

    for path in paths {
        documents.load_path(path)?;
    }

    anyhow::ensure!(documents.source_count() > 0, "No files loaded");

    Ok(documents)
}

fn output(output: &cli::OutputArgs, report: &ScanReport, include_passed: bool) -> anyhow::Result<()> {
    let report = if include_passed {
        report.clone()
    } else {
        ScanReport {
            results: report.failures().cloned().collect(),
            warnings: report.warnings.clone(),
        }
    };

    match output.format {
        cli::OutputFormat::Text => {
            let mut stdout = std::io::stdout().lock();
            for warning in &report.warnings {
                writeln!(stdout, "WARNING {warning}")?;
            }
            for result in &report.results {
                writeln!(stdout, "{result}")?;
            }
            let failures = report.failures().count();
            writeln!(stdout, "\n{failures} problem(s) found")?;
        }
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), &report)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), &report)?,
    };

    Ok(())
}

#[derive(serde::Serialize)]
struct RuleInfo {
    code: &'static str,
    severity: iacscan::rule::Severity,
    summary: &'static str,
    resolution: &'static str,
}

pub fn rules(cli: cli::RulesCommand) -> anyhow::Result<()> {
    let rules: Vec<RuleInfo> = iacscan::registry::global()
        .rules()
        .iter()
        .map(|rule| RuleInfo {
            code: rule.code,
            severity: rule.severity,
            summary: rule.summary,
            resolution: rule.resolution,
        })
        .collect();

    match cli.output.format {
        cli::OutputFormat::Text => {
            let mut stdout = std::io::stdout().lock();
            for rule in &rules {
                writeln!(stdout, "{:<8} {}\n         {}", rule.severity, rule.code, rule.summary)?;
            }
        }
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), &rules)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), &rules)?,
    };

    Ok(())
}

/// (iacscan-)developer utilities
///
/// A quick way to expose internal structures for debugging purposes
pub fn dev(cli: cli::DevCommand) -> anyhow::Result<()> {
    use cli::DevSubCommand;

    match cli.command {
        DevSubCommand::Documents(args) => {
            let documents = load(&args.paths)?;
            println!("{documents:#?}");
        }
        DevSubCommand::Module(args) => {
            let documents = load(&args.paths)?;
            let module = Module::new(&documents)?;
            println!("{module:#?}");
        }
        DevSubCommand::Graph(args) => {
            let documents = load(&args.paths)?;
            let module = Module::new(&documents)?;
            let resolution = iacscan::scanner::resolve_module(&module, Overrides::from_env());
            println!("{resolution:#?}");
        }
    }

    Ok(())
}
