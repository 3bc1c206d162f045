use std::{
    fmt, io,
    rc::Rc,
    time::{self, Duration},
};

use thiserror::Error;

use crate::console::Console;
use crate::interpreter::Runtime;
use crate::stack::ensure_sufficient_stack;
use crate::statement::FunDecl;
use crate::token::{Token, TokenType};

/// Declared type of a variable, parameter or function result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Int,
    Float,
    Char,
    Bool,
    String,
}

impl DataType {
    pub fn from_token(kind: &TokenType) -> Option<Self> {
        match kind {
            TokenType::IntType => Some(Self::Int),
            TokenType::FloatType => Some(Self::Float),
            TokenType::CharType => Some(Self::Char),
            TokenType::BoolType => Some(Self::Bool),
            TokenType::StringType => Some(Self::String),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Int => "NUMERO",
            Self::Float => "TIPIK",
            Self::Char => "LETRA",
            Self::Bool => "TINUOD",
            Self::String => "PULONG",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum NativeCall {
    Clock,
    Ceil,
    Floor,
    Sqrt,
    Abs,
    Pow,
    ScanString,
}

impl NativeCall {
    pub const ALL: [NativeCall; 7] = [
        Self::Clock,
        Self::Ceil,
        Self::Floor,
        Self::Sqrt,
        Self::Abs,
        Self::Pow,
        Self::ScanString,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Clock => "clock",
            Self::Ceil => "ceil",
            Self::Floor => "floor",
            Self::Sqrt => "sqrt",
            Self::Abs => "abs",
            Self::Pow => "pow",
            Self::ScanString => "scanString",
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Self::Clock => 0,
            Self::Pow => 2,
            Self::Ceil | Self::Floor | Self::Sqrt | Self::Abs | Self::ScanString => 1,
        }
    }

    pub fn call(&self, vals: &[Val], console: &mut dyn Console) -> Result<Val, EvalErrType> {
        if self.arity() != vals.len() {
            return Err(EvalErrType::WrongArgumentCount(self.arity(), vals.len()));
        }

        match (self, vals) {
            (Self::Clock, []) => Ok(Self::clock()),
            (Self::Ceil, [x]) => Ok(Val::Float(self.number(x)?.ceil())),
            (Self::Floor, [x]) => Ok(Val::Float(self.number(x)?.floor())),
            (Self::Sqrt, [x]) => Ok(Val::Float(self.number(x)?.sqrt())),
            (Self::Abs, [Val::Int(x)]) => Ok(Val::Int(x.wrapping_abs())),
            (Self::Abs, [x]) => Ok(Val::Float(self.number(x)?.abs())),
            (Self::Pow, [x, y]) => Ok(Val::Float(self.number(x)?.powf(self.number(y)?))),
            (Self::ScanString, [prompt]) => {
                console.write(&format!("{prompt}\n"))?;
                console
                    .read_line()?
                    .map(|line| Val::Str(line.into()))
                    .ok_or(EvalErrType::InputUnavailable)
            }
            _ => Err(EvalErrType::WrongArgumentCount(self.arity(), vals.len())),
        }
    }

    fn number(&self, val: &Val) -> Result<f64, EvalErrType> {
        match val {
            Val::Int(x) => Ok(*x as f64),
            Val::Float(x) => Ok(*x),
            other => Err(EvalErrType::NativeArgument {
                function: self.name(),
                found: other.type_name(),
            }),
        }
    }

    fn clock() -> Val {
        Val::Float(
            time::SystemTime::now()
                .duration_since(time::UNIX_EPOCH)
                .unwrap_or(Duration::ZERO)
                .as_secs_f64(),
        )
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Val {
    Int(i64),
    Float(f64),
    Char(char),
    Bool(bool),
    Str(Rc<str>),
    Fun(Rc<FunDecl>),
    NativeFunc(NativeCall),
    /// Result of calling a function without a return type.
    Nil,
}

impl Val {
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Self::Int(_) => Some(DataType::Int),
            Self::Float(_) => Some(DataType::Float),
            Self::Char(_) => Some(DataType::Char),
            Self::Bool(_) => Some(DataType::Bool),
            Self::Str(_) => Some(DataType::String),
            Self::Fun(_) | Self::NativeFunc(_) | Self::Nil => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Fun(_) | Self::NativeFunc(_) => "BUHAT",
            Self::Nil => "WALA",
            other => other.data_type().map_or("WALA", |ty| ty.keyword()),
        }
    }

    /// Only booleans have a truth value.
    pub fn truthy(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Rendering used in diagnostics: strings and characters are quoted.
    pub fn repr(&self) -> String {
        match self {
            Self::Str(s) => format!("\"{s}\""),
            Self::Char(c) => format!("'{c}'"),
            other => other.to_string(),
        }
    }
}

fn write_float(f: &mut fmt::Formatter, x: f64) -> fmt::Result {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
        write!(f, "{x:.1}")
    } else {
        write!(f, "{x}")
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Int(x) => write!(f, "{x}"),
            Self::Float(x) => write_float(f, *x),
            Self::Char(c) => write!(f, "{c}"),
            Self::Bool(true) => write!(f, "OO"),
            Self::Bool(false) => write!(f, "DILI"),
            Self::Str(s) => write!(f, "{s}"),
            Self::Fun(decl) => write!(f, "<BUHAT {}>", decl.name.lexeme),
            Self::NativeFunc(nc) => write!(f, "<native {}>", nc.name()),
            Self::Nil => Ok(()),
        }
    }
}

pub type ExprRef = Box<Expr>;

#[derive(Debug, PartialEq, Clone)]
pub enum Expr {
    /// Value and source line.
    Literal(Val, usize),
    Variable(Token),
    Assign(Token, ExprRef),
    Unary(Token, ExprRef),
    Binary(ExprRef, Token, ExprRef),
    Logical(ExprRef, Token, ExprRef),
    Grouping(ExprRef),
    Call(ExprRef, Token, Vec<Expr>),
}

impl Expr {
    pub fn line(&self) -> usize {
        match self {
            Self::Literal(_, line) => *line,
            Self::Variable(tok) | Self::Assign(tok, _) | Self::Unary(tok, _) => tok.line,
            Self::Binary(_, op, _) | Self::Logical(_, op, _) => op.line,
            Self::Grouping(inner) => inner.line(),
            Self::Call(_, paren, _) => paren.line,
        }
    }

    pub fn eval(&self, rt: &mut Runtime) -> Result<Val, EvalErr> {
        ensure_sufficient_stack(|| self.eval_inner(rt))
    }

    fn eval_inner(&self, rt: &mut Runtime) -> Result<Val, EvalErr> {
        match self {
            Self::Literal(v, _) => Ok(v.clone()),
            Self::Grouping(inner) => inner.eval(rt),
            Self::Variable(name) => rt.env.get(&name.lexeme).map_err(|e| e.at(name.line)),
            Self::Assign(name, value) => {
                let val = value.eval(rt)?;
                rt.env
                    .assign(&name.lexeme, val.clone())
                    .map_err(|e| e.at(name.line))?;
                Ok(val)
            }
            Self::Unary(op, operand) => {
                let val = operand.eval(rt)?;
                match (&op.kind, val) {
                    (TokenType::Bang, Val::Bool(b)) => Ok(Val::Bool(!b)),
                    (TokenType::Minus, Val::Int(x)) => Ok(Val::Int(x.wrapping_neg())),
                    (TokenType::Minus, Val::Float(x)) => Ok(Val::Float(-x)),
                    (TokenType::Plus, val @ (Val::Int(_) | Val::Float(_))) => Ok(val),
                    (TokenType::Bang, val) => Err(EvalErrType::BooleanOperand {
                        op: op.lexeme.clone(),
                        found: val.type_name(),
                    }
                    .at(op.line)),
                    (_, val) => Err(EvalErrType::NumberOperand {
                        op: op.lexeme.clone(),
                        found: val.type_name(),
                    }
                    .at(op.line)),
                }
            }
            Self::Logical(left, op, right) => {
                let l = left.eval(rt)?;
                let Some(truthy) = l.truthy() else {
                    return Err(EvalErrType::BooleanOperand {
                        op: op.lexeme.clone(),
                        found: l.type_name(),
                    }
                    .at(op.line));
                };

                if op.kind == TokenType::Or && truthy || op.kind == TokenType::And && !truthy {
                    return Ok(l);
                }

                right.eval(rt)
            }
            Self::Binary(left, op, right) => {
                let l = left.eval(rt)?;
                let r = right.eval(rt)?;
                binary(op, l, r).map_err(|e| e.at(op.line))
            }
            Self::Call(callee, paren, args) => {
                let fun = callee.eval(rt)?;
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(arg.eval(rt)?);
                }

                match fun {
                    Val::Fun(decl) => decl.call(rt, evaluated, paren.line),
                    Val::NativeFunc(nc) => {
                        tracing::trace!(native = nc.name(), "calling native function");
                        nc.call(&evaluated, &mut *rt.console).map_err(|e| e.at(paren.line))
                    }
                    other => Err(EvalErrType::NotCallable(other.type_name()).at(paren.line)),
                }
            }
        }
    }
}

fn binary(op: &Token, l: Val, r: Val) -> Result<Val, EvalErrType> {
    use TokenType as T;
    use Val::{Bool, Float, Int, Str};

    match (&op.kind, l, r) {
        (T::Ampersand, a, b) => Ok(Str(format!("{a}{b}").into())),
        (T::EqualEqual, a, b) => Ok(Bool(a == b)),
        (T::NotEqual, a, b) => Ok(Bool(a != b)),

        (T::Plus, Int(a), Int(b)) => Ok(Int(a.wrapping_add(b))),
        (T::Minus, Int(a), Int(b)) => Ok(Int(a.wrapping_sub(b))),
        (T::Star, Int(a), Int(b)) => Ok(Int(a.wrapping_mul(b))),
        (T::Slash | T::Percent, Int(_), Int(0)) => Err(EvalErrType::DivideByZero),
        (T::Slash, Int(a), Int(b)) => Ok(Int(a.wrapping_div(b))),
        (T::Percent, Int(a), Int(b)) => Ok(Int(a.wrapping_rem(b))),

        (T::Plus, Float(a), Float(b)) => Ok(Float(a + b)),
        (T::Minus, Float(a), Float(b)) => Ok(Float(a - b)),
        (T::Star, Float(a), Float(b)) => Ok(Float(a * b)),
        (T::Slash | T::Percent, Float(_), Float(b)) if b == 0.0 => Err(EvalErrType::DivideByZero),
        (T::Slash, Float(a), Float(b)) => Ok(Float(a / b)),
        (T::Percent, Float(a), Float(b)) => Ok(Float(a % b)),

        (T::Less, Int(a), Int(b)) => Ok(Bool(a < b)),
        (T::LessEqual, Int(a), Int(b)) => Ok(Bool(a <= b)),
        (T::Greater, Int(a), Int(b)) => Ok(Bool(a > b)),
        (T::GreaterEqual, Int(a), Int(b)) => Ok(Bool(a >= b)),
        (T::Less, Float(a), Float(b)) => Ok(Bool(a < b)),
        (T::LessEqual, Float(a), Float(b)) => Ok(Bool(a <= b)),
        (T::Greater, Float(a), Float(b)) => Ok(Bool(a > b)),
        (T::GreaterEqual, Float(a), Float(b)) => Ok(Bool(a >= b)),

        (_, a, b) => Err(EvalErrType::OperandMismatch {
            op: op.lexeme.clone(),
            left: a.type_name(),
            right: b.type_name(),
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalErrType {
    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(Rc<str>),
    #[error("Variable '{0}' is already defined in this scope.")]
    AlreadyDeclared(Rc<str>),
    #[error("Cannot assign to immutable variable '{0}'.")]
    Immutable(Rc<str>),
    #[error("Variable '{0}' is used before it is assigned a value.")]
    Uninitialized(Rc<str>),
    #[error("Type mismatch: cannot assign value {value} ({found}) to variable '{name}' of type {expected}.")]
    AssignMismatch {
        name: Rc<str>,
        value: String,
        found: &'static str,
        expected: DataType,
    },
    #[error("Value {value} ({found}) is not of type {expected}.")]
    DeclareMismatch {
        value: String,
        found: &'static str,
        expected: DataType,
    },
    #[error("Operands of '{op}' must both be NUMERO or both be TIPIK but found {left} and {right}.")]
    OperandMismatch {
        op: Rc<str>,
        left: &'static str,
        right: &'static str,
    },
    #[error("Operand of '{op}' must be NUMERO or TIPIK but found {found}.")]
    NumberOperand { op: Rc<str>, found: &'static str },
    #[error("Operand of '{op}' must be TINUOD but found {found}.")]
    BooleanOperand { op: Rc<str>, found: &'static str },
    #[error("Condition must be TINUOD but found {0}.")]
    NonBooleanCondition(&'static str),
    #[error("Cannot divide by zero.")]
    DivideByZero,
    #[error("Can only call functions, not {0}.")]
    NotCallable(&'static str),
    #[error("Expected {0} arguments but got {1}.")]
    WrongArgumentCount(usize, usize),
    #[error("Argument '{param}' of '{function}' must be {expected} but found {found}.")]
    ArgumentMismatch {
        function: Rc<str>,
        param: Rc<str>,
        expected: DataType,
        found: &'static str,
    },
    #[error("Argument of '{function}' must be NUMERO or TIPIK but found {found}.")]
    NativeArgument {
        function: &'static str,
        found: &'static str,
    },
    #[error("Function '{function}' must return {expected} but returned {found}.")]
    ReturnMismatch {
        function: Rc<str>,
        expected: DataType,
        found: &'static str,
    },
    #[error("Function '{function}' must return a value of type {expected}.")]
    MissingReturnValue { function: Rc<str>, expected: DataType },
    #[error("Function '{0}' has no return type and cannot return a value.")]
    VoidReturn(Rc<str>),
    #[error("IULI is only allowed inside a function.")]
    UnexpectedReturn,
    #[error("Stack overflow: more than {0} nested function calls.")]
    StackOverflow(usize),
    #[error("Expected {expected} value(s) but received more than {expected}.")]
    TooManyValues { expected: usize },
    #[error("Expected {expected} value(s) but received {received}.")]
    TooFewValues { expected: usize, received: usize },
    #[error("No input available for DAWAT.")]
    InputUnavailable,
    #[error("Console error: {0}")]
    Io(String),
}

impl EvalErrType {
    pub fn at(self, line: usize) -> EvalErr {
        EvalErr { kind: self, line }
    }
}

impl From<io::Error> for EvalErrType {
    fn from(value: io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("[Line {line}] Runtime Error : {kind}")]
pub struct EvalErr {
    pub kind: EvalErrType,
    pub line: usize,
}
