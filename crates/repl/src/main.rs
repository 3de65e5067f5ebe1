//! Line-oriented REPL and script runner for the Ember interpreter.
//!
//! Kept deliberately thin: this binary exists to drive `ember-core`
//! through the reference reader/printer, not to be an IDE. Multi-line
//! forms are handled by retrying a parse on `ReadError::UnexpectedEof`
//! with more input appended, rather than any bracket-counting of its
//! own — the reader already knows when a form is incomplete.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ember_core::interp::Interp;
use ember_core::prelude;
use ember_reader::{parser, printer, ReadError};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

#[derive(Parser)]
#[command(name = "ember", about = "Ember: an embeddable Lisp-family interpreter")]
struct Args {
    /// Run this script instead of starting an interactive session.
    script: Option<PathBuf>,

    /// Evaluate this expression and print its result, then exit.
    #[arg(short, long)]
    eval: Option<String>,

    /// Allow redefining existing global bindings without EEXIST.
    #[arg(long)]
    allow_redef: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .init();

    let args = Args::parse();
    let mut interp = Interp::new();
    interp.config.allow_redef = args.allow_redef;

    if let Err(e) = prelude::install(&mut interp) {
        eprintln!("ember: failed to install prelude: {}: {}", e.0, e.1);
        return ExitCode::FAILURE;
    }

    if let Some(src) = args.eval {
        return exit_code(run_source(&mut interp, &src, None));
    }
    if let Some(path) = args.script {
        let src = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("ember: {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        };
        return exit_code(run_source(&mut interp, &src, path.to_str()));
    }

    exit_code(run_repl(&mut interp))
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Read and evaluate every top-level form in `src`, printing each
/// result. Used for both `--eval` and script files. Returns whether
/// every form read and evaluated without error.
fn run_source(interp: &mut Interp, src: &str, file: Option<&str>) -> bool {
    let forms = match parser::read_all(interp, src, file) {
        Ok(forms) => forms,
        Err(e) => {
            eprintln!("ember: read error: {e:?}");
            return false;
        }
    };
    let env = interp.global_env();
    for form in forms {
        match interp.eval_top(form, env) {
            Ok(v) => println!("{}", printer::print_value(&interp.gc, v)),
            Err((code, msg)) => {
                eprintln!("ember: {code}: {msg}");
                return false;
            }
        }
    }
    true
}

fn run_repl(interp: &mut Interp) -> bool {
    let mut editor = match DefaultEditor::new() {
        Ok(e) => e,
        Err(e) => {
            eprintln!("ember: failed to start line editor: {e}");
            return false;
        }
    };
    let history_path = dirs_history_path();
    if let Some(path) = &history_path {
        let _ = editor.load_history(path);
    }

    let env = interp.global_env();
    let mut pending = String::new();
    loop {
        let prompt = if pending.is_empty() { "ember> " } else { "...  > " };
        match editor.readline(prompt) {
            Ok(line) => {
                if !pending.is_empty() {
                    pending.push('\n');
                }
                pending.push_str(&line);
                match parser::read_one(interp, &pending) {
                    Ok(Some(form)) => {
                        let _ = editor.add_history_entry(pending.as_str());
                        pending.clear();
                        match interp.eval_top(form, env) {
                            Ok(v) => println!("{}", printer::print_value(&interp.gc, v)),
                            Err((code, msg)) => eprintln!("error: {code}: {msg}"),
                        }
                    }
                    Ok(None) => pending.clear(),
                    Err(ReadError::UnexpectedEof) => continue,
                    Err(e) => {
                        eprintln!("ember: read error: {e:?}");
                        pending.clear();
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                pending.clear();
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("ember: {e}");
                break;
            }
        }
    }

    if let Some(path) = &history_path {
        let _ = editor.save_history(path);
    }
    true
}

fn dirs_history_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".ember_history"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_source_evaluates_every_top_level_form() {
        let mut interp = Interp::new();
        prelude::install(&mut interp).unwrap();
        assert!(run_source(&mut interp, "(def x 1) (+ x 2)", None));
    }

    #[test]
    fn run_source_reports_a_read_error() {
        let mut interp = Interp::new();
        prelude::install(&mut interp).unwrap();
        assert!(!run_source(&mut interp, "(+ 1", None));
    }

    #[test]
    fn run_source_reports_an_eval_error() {
        let mut interp = Interp::new();
        prelude::install(&mut interp).unwrap();
        assert!(!run_source(&mut interp, "(undefined-symbol)", None));
    }
}
