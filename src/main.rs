use std::{
    env::args_os,
    fs,
    io::{self, stdin, IsTerminal},
    path::Path,
    process::ExitCode,
};

use bisaya::console::StdConsole;
use bisaya::interpreter::{split_piped_input, Interpreter, Outcome};
use rustyline::validate::MatchingBracketValidator;
use rustyline::{error::ReadlineError, Editor};
use rustyline::{Completer, Helper, Highlighter, Hinter, Validator};

fn main() -> ExitCode {
    bisaya::init_tracing();

    if args_os().len() > 2 {
        eprintln!("usage: bisaya [file]");
        eprintln!("Piped without a file, the lines after KATAPUSAN are read by DAWAT.");
        return ExitCode::from(64);
    }

    let outcome = match args_os().nth(1) {
        Some(arg) => run_file(Path::new(&arg)),
        None if !stdin().is_terminal() => run_stdin(),
        None => run_prompt(),
    };
    ExitCode::from(outcome.exit_code())
}

fn run(code: &str, interpreter: &mut Interpreter) -> Outcome {
    let outcome = match interpreter.run(code) {
        Ok(()) => Outcome::Success,
        Err(err) => {
            eprintln!("{err}");
            err.outcome()
        }
    };
    tracing::debug!(?outcome, "run finished");
    outcome
}

fn run_file(path: &Path) -> Outcome {
    match fs::read_to_string(path) {
        Ok(content) => run(&content, &mut Interpreter::new()),
        Err(err) => {
            eprintln!("error: could not read {}: {err}", path.display());
            Outcome::RuntimeError
        }
    }
}

fn run_stdin() -> Outcome {
    match io::read_to_string(stdin().lock()) {
        Ok(source) => {
            let (program, input) = split_piped_input(&source);
            run(program, &mut Interpreter::with_console(StdConsole::with_input(input)))
        }
        Err(err) => {
            eprintln!("error: could not read stdin: {err}");
            Outcome::RuntimeError
        }
    }
}

#[derive(Helper, Completer, Hinter, Highlighter, Validator)]
struct PromptHelper {
    #[rustyline(Validator)]
    validator: MatchingBracketValidator,
}

/// Each entered line runs as its own program block. Globals persist
/// between lines; errors are reported and the prompt continues.
fn run_prompt() -> Outcome {
    let mut interpreter = Interpreter::new();
    let mut rl = match Editor::new() {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("error: {err}");
            return Outcome::RuntimeError;
        }
    };
    rl.set_helper(Some(PromptHelper {
        validator: MatchingBracketValidator::new(),
    }));

    loop {
        match rl.readline("> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());
                run(&format!("SUGOD\n{line}\nKATAPUSAN"), &mut interpreter);
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Outcome::Success,
            Err(err) => {
                eprintln!("error: {err}");
                return Outcome::RuntimeError;
            }
        }
    }
}
