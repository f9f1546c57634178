use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use clap::Subcommand;
use miette::IntoDiagnostic;
use miette::WrapErr;
use postfix_calc::{Environment, Lexer, compile, evaluate_source, evaluate_statement};
use tracing::{Level, info, warn};

/// Evaluate `name = expression` statements through a postfix stack machine.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Raise the log level (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the tokens of every line.
    Tokenize { filename: Option<PathBuf> },
    /// Print the postfix trace of every statement.
    Parse { filename: Option<PathBuf> },
    /// Evaluate every line against one session.
    Run {
        filename: Option<PathBuf>,
        /// Print the batch report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Evaluate statements typed on standard input, one per line.
    Repl,
}

fn main() -> miette::Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .with_max_level(level)
        .init();

    match args.command {
        Commands::Tokenize { filename } => {
            let file_contents = read_input(filename.as_deref())?;

            for (index, line) in file_contents.lines().enumerate() {
                for token in Lexer::new(line) {
                    let token = match token {
                        Ok(token) => token,
                        Err(e) => {
                            eprintln!(
                                "[line {}] Error: Unexpected character: {}",
                                index + 1,
                                e.token
                            );
                            let report =
                                miette::Report::new(e).with_source_code(line.to_string());
                            eprintln!("{report:?}");
                            std::process::exit(65);
                        }
                    };
                    println!("// line {}: {token}", index + 1);
                }
            }
        }
        Commands::Parse { filename } => {
            let file_contents = read_input(filename.as_deref())?;

            for (index, line) in file_contents.lines().enumerate() {
                let statement = postfix_calc::lex(line).and_then(postfix_calc::parse);
                match statement {
                    Ok(Some(statement)) => println!("{}", compile(&statement)),
                    Ok(None) => {}
                    Err(e) => {
                        eprintln!("{}", e.line_message(index + 1));
                        eprintln!("{:?}", e.with_source(line));
                        std::process::exit(65);
                    }
                }
            }
        }
        Commands::Run { filename, json } => {
            let file_contents = read_input(filename.as_deref())?;

            let mut environment = Environment::new();
            let report = evaluate_source(&file_contents, &mut environment);
            if report.results.is_empty() && report.is_clean() {
                warn!("no statements to evaluate");
            }

            if json {
                let rendered = serde_json::to_string_pretty(&report)
                    .into_diagnostic()
                    .wrap_err("serializing the batch report failed")?;
                println!("{rendered}");
            } else {
                for result in &report.results {
                    println!("{}", result.result);
                }
                for error in &report.errors {
                    eprintln!("{error}");
                }
            }

            if !report.is_clean() {
                std::process::exit(65);
            }
        }
        Commands::Repl => repl()?,
    }
    Ok(())
}

fn read_input(filename: Option<&Path>) -> miette::Result<String> {
    match filename {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("reading `{}` failed", path.display())),
        _ => {
            let mut contents = String::new();
            io::stdin()
                .read_to_string(&mut contents)
                .into_diagnostic()
                .wrap_err("reading standard input failed")?;
            Ok(contents)
        }
    }
}

fn repl() -> miette::Result<()> {
    let mut environment = Environment::new();
    info!("session started");

    prompt()?;
    for line in io::stdin().lock().lines() {
        let line = line
            .into_diagnostic()
            .wrap_err("reading standard input failed")?;

        match evaluate_statement(&line, &mut environment) {
            Ok(Some(evaluation)) => println!("{evaluation}"),
            Ok(None) => {}
            Err(e) => eprintln!("{:?}", e.with_source(&line)),
        }
        prompt()?;
    }

    info!(variables = %environment, "session ended");
    Ok(())
}

fn prompt() -> miette::Result<()> {
    print!("> ");
    io::stdout()
        .flush()
        .into_diagnostic()
        .wrap_err("writing the prompt failed")
}
