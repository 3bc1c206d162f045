use crate::console::{Console, StdConsole};
use crate::expr::{EvalErr, EvalErrType, NativeCall, Val};
use crate::parser::{ParseErr, Parser};
use crate::scanner::{scan, ScanErr};
use crate::scope::{Environment, ScopeId};
use crate::statement::Stmt;
use crate::token::TokenType;
use std::fmt;
use thiserror::Error;

/// Splits piped text into the program and the input lines that follow it.
/// The program ends with the line holding the first KATAPUSAN token; text
/// without one is all program.
pub fn split_piped_input(source: &str) -> (&str, Vec<&str>) {
    let (tokens, _) = scan(source);
    let Some(end) = tokens.iter().find(|t| t.kind == TokenType::End) else {
        return (source, vec![]);
    };

    let mut offset = 0;
    for (i, line) in source.split_inclusive('\n').enumerate() {
        offset += line.len();
        if i + 1 >= end.line {
            break;
        }
    }
    let (program, rest) = source.split_at(offset);
    (program, rest.lines().collect())
}

/// How a run ended, as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    SyntaxError,
    RuntimeError,
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Success => 0,
            Self::SyntaxError => 65,
            Self::RuntimeError => 70,
        }
    }
}

#[derive(Debug, Error)]
pub enum InterpretErr {
    #[error("{}", ScanErrs(.0))]
    ScanErrs(Vec<ScanErr>),
    #[error(transparent)]
    ParseErr(#[from] ParseErr),
    #[error(transparent)]
    EvalErr(#[from] EvalErr),
}

struct ScanErrs<'a>(&'a [ScanErr]);

impl fmt::Display for ScanErrs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl InterpretErr {
    pub fn outcome(&self) -> Outcome {
        match self {
            Self::ScanErrs(_) | Self::ParseErr(_) => Outcome::SyntaxError,
            Self::EvalErr(_) => Outcome::RuntimeError,
        }
    }
}

/// Deepest chain of user function calls before a run is aborted.
pub const MAX_CALL_DEPTH: usize = 1024;

/// State threaded through statement execution and expression evaluation.
pub struct Runtime<'a> {
    pub env: &'a mut Environment,
    pub console: &'a mut dyn Console,
    pub call_depth: usize,
    displayed: bool,
}

impl<'a> Runtime<'a> {
    /// Runs `f` in a new scope under `parent`; the scope is popped even when `f` fails.
    pub fn in_scope<T, E>(
        &mut self,
        parent: ScopeId,
        f: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        let previous = self.env.push_scope(parent);
        let res = f(self);
        self.env.pop_scope(previous);
        res
    }

    pub fn display(&mut self, text: &str) -> Result<(), EvalErrType> {
        self.displayed = true;
        self.console.write(text)?;
        Ok(())
    }
}

pub struct Interpreter<C: Console = StdConsole> {
    env: Environment,
    console: C,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Interpreter {
        Self::with_console(StdConsole::default())
    }
}

impl<C: Console> Interpreter<C> {
    pub fn with_console(console: C) -> Self {
        let mut env = Environment::new();
        for nc in NativeCall::ALL {
            env.define_global(nc.name().into(), Val::NativeFunc(nc));
        }
        Interpreter { env, console }
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    /// Scans, parses and runs one program. Any scan or parse error stops
    /// the program from running at all.
    pub fn run(&mut self, code: &str) -> Result<(), InterpretErr> {
        let (tokens, errors) = scan(code);
        if !errors.is_empty() {
            tracing::debug!(errors = errors.len(), "scan failed");
            return Err(InterpretErr::ScanErrs(errors));
        }

        let program = Parser::new(&tokens).parse()?;
        tracing::debug!(statements = program.len(), "parsed program");
        self.interpret(&program)?;
        Ok(())
    }

    pub fn interpret(&mut self, program: &[Stmt]) -> Result<(), EvalErr> {
        let mut rt = Runtime {
            env: &mut self.env,
            console: &mut self.console,
            call_depth: 0,
            displayed: false,
        };

        for stmt in program.iter() {
            stmt.exec(&mut rt)?;
        }

        if !rt.displayed {
            rt.console
                .write("No Error.\n")
                .map_err(|e| EvalErrType::from(e).at(0))?;
        }
        Ok(())
    }

    pub fn get_global(&self, id: &str) -> Option<Val> {
        self.env.get_global(id)
    }

    pub fn scope_depth(&self) -> usize {
        self.env.depth()
    }
}
