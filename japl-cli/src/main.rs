//! `jpl` — drives the `lex -> parse -> optimize -> compile -> serialize`
//! pipeline over a file or inline source string and writes the resulting
//! `.japlc` artifact. The runtime VM, REPL, and on-disk cache policy are
//! out of scope here (`spec.md §1`); the flags that only make sense with
//! those pieces present are accepted and reported as unsupported rather
//! than rejected outright, so scripts invoking this binary the way they'd
//! invoke the full interpreter don't fail on argument parsing alone.

use clap::Parser;
use core::errors::Diagnostic;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Compile a JAPL source file (or an inline string) to a `.japlc` artifact.
#[derive(Parser)]
#[command(name = "jpl")]
#[command(version)]
#[command(about = "Compiles JAPL source to a .japlc bytecode artifact")]
struct Cli {
  /// Source file to compile. Required unless `-s/--string` is given.
  file: Option<PathBuf>,

  /// Treat the argument as inline source instead of a file path.
  #[arg(short = 's', long = "string")]
  string: Option<String>,

  /// Write the artifact to this path instead of alongside the source.
  #[arg(short = 'o', long = "output")]
  output: Option<PathBuf>,

  /// Skip writing the .japlc artifact; still runs the full pipeline and
  /// reports diagnostics. (`spec.md §6` spells this `-nd`; clap's derive
  /// short flags are single characters, so `-n` is the closest match.)
  #[arg(short = 'n', long = "nodump")]
  nodump: bool,

  /// Drop into a REPL after running. Not supported outside the VM/REPL
  /// driver this repository doesn't implement.
  #[arg(short = 'i', long = "interactive")]
  interactive: bool,

  /// Never read cached artifacts. Not supported outside the VM/REPL
  /// driver this repository doesn't implement.
  #[arg(long = "nocache")]
  nocache: bool,

  /// Cache freshness window, in minutes. Not supported outside the
  /// VM/REPL driver this repository doesn't implement.
  #[arg(long = "cache-delay", value_name = "MIN")]
  cache_delay: Option<u64>,
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  for inert in inert_flag_diagnostics(&cli) {
    eprintln!("{inert}");
  }

  let (source, filename) = match read_source(&cli) {
    Ok(pair) => pair,
    Err(message) => {
      eprintln!("{message}");
      return ExitCode::from(70);
    }
  };

  match run_pipeline(&source, &filename) {
    Ok(artifact) => {
      if !cli.nodump {
        let out_path = output_path(&cli, &filename);
        if let Err(e) = fs::write(&out_path, &artifact) {
          eprintln!("Could not write artifact to '{}': {e}", out_path.display());
          return ExitCode::from(70);
        }
      }
      ExitCode::SUCCESS
    }
    Err(diagnostics) => {
      for diag in &diagnostics {
        eprintln!("{diag}");
      }
      ExitCode::from(65)
    }
  }
}

/// `-i`/`-nc`/`-cd` are real flags the parser accepts so invocations
/// written against the full interpreter don't fail to parse here, but
/// none of them have anything to act on without a VM/REPL/cache driver.
fn inert_flag_diagnostics(cli: &Cli) -> Vec<String> {
  let mut messages = Vec::new();
  if cli.interactive {
    messages.push("'-i/--interactive' is not supported outside the VM/REPL driver.".to_string());
  }
  if cli.nocache {
    messages.push("'--nocache' is not supported outside the VM/REPL driver.".to_string());
  }
  if cli.cache_delay.is_some() {
    messages.push("'-cd/--cache-delay' is not supported outside the VM/REPL driver.".to_string());
  }
  messages
}

fn read_source(cli: &Cli) -> Result<(String, String), String> {
  if let Some(s) = &cli.string {
    return Ok((s.clone(), "<string>".to_string()));
  }

  let path = cli.file.as_ref().ok_or_else(|| "Expected a FILE argument or -s/--string.".to_string())?;
  let filename = path.display().to_string();
  let source = fs::read_to_string(path).map_err(|e| format!("Could not read '{filename}': {e}"))?;
  Ok((source, filename))
}

fn output_path(cli: &Cli, filename: &str) -> PathBuf {
  if let Some(out) = &cli.output {
    return out.clone();
  }
  if filename == "<string>" {
    return PathBuf::from("out.japlc");
  }
  Path::new(filename).with_extension("japlc")
}

/// Runs `lex -> parse -> optimize -> compile -> serialize` and returns the
/// finished artifact bytes, or every diagnostic collected by whichever
/// stage aborted first.
fn run_pipeline(source: &str, filename: &str) -> Result<Vec<u8>, Vec<Diagnostic>> {
  let (tokens, lex_errors) = lexer::lex(source, filename);
  if !lex_errors.is_empty() {
    return Err(lex_errors);
  }

  let (ast, parse_errors) = parser::parse(&tokens, filename);
  if !parse_errors.is_empty() {
    return Err(parse_errors);
  }

  let (ast, warnings) = optimizer::optimize(ast, filename, optimizer::Options::default());
  for warning in &warnings {
    eprintln!("{warning}");
  }

  let chunk = compiler::compile(ast, filename)?;

  let meta = serializer::DumpMetadata {
    branch: option_env!("JAPL_BUILD_BRANCH").unwrap_or(""),
    commit_hash: &"0".repeat(40),
    timestamp: 0,
  };
  serializer::dump(&chunk, source, filename, &meta).map_err(|e| vec![e])
}
