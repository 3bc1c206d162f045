use crate::expr::{DataType, EvalErr, EvalErrType, Expr, Val};
use crate::interpreter::{Runtime, MAX_CALL_DEPTH};
use crate::scope::GLOBAL_SCOPE;
use crate::token::Token;
use std::rc::Rc;

#[derive(Debug, PartialEq, Clone)]
pub struct Param {
    pub ty: DataType,
    pub name: Token,
}

#[derive(Debug, PartialEq, Clone)]
pub struct FunDecl {
    pub name: Token,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub return_type: Option<DataType>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Stmt {
    Print(Expr),
    Expr(Expr),
    Scan(Vec<Token>),
    Declare {
        name: Token,
        ty: DataType,
        init: Option<Expr>,
        mutable: bool,
    },
    Block(Vec<Stmt>),
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_ifs: Vec<(Expr, Vec<Stmt>)>,
        else_branch: Option<Vec<Stmt>>,
    },
    While(Expr, Vec<Stmt>),
    For {
        init: Box<Stmt>,
        cond: Expr,
        increment: Expr,
        body: Vec<Stmt>,
    },
    Return(Token, Option<Expr>),
    Fun(Rc<FunDecl>),
}

pub enum ExecInterruption {
    /// Returned value and the line of the IULI that produced it.
    Return(Option<Val>, usize),
    Err(EvalErr),
}

impl From<EvalErr> for ExecInterruption {
    fn from(value: EvalErr) -> Self {
        ExecInterruption::Err(value)
    }
}

impl From<ExecInterruption> for EvalErr {
    fn from(value: ExecInterruption) -> Self {
        match value {
            ExecInterruption::Err(e) => e,
            ExecInterruption::Return(_, line) => EvalErrType::UnexpectedReturn.at(line),
        }
    }
}

fn condition(cond: &Expr, rt: &mut Runtime) -> Result<bool, EvalErr> {
    let val = cond.eval(rt)?;
    val.truthy()
        .ok_or_else(|| EvalErrType::NonBooleanCondition(val.type_name()).at(cond.line()))
}

/// Runs `body` in a fresh child scope of the current one.
fn exec_block(body: &[Stmt], rt: &mut Runtime) -> Result<(), ExecInterruption> {
    let parent = rt.env.current();
    rt.in_scope(parent, |rt| -> Result<(), ExecInterruption> {
        for stmt in body.iter() {
            stmt.exec(rt)?;
        }
        Ok(())
    })
}

/// Splits a DAWAT input line into typed values.
pub fn parse_input(line: &str) -> Vec<Val> {
    line.split(',')
        .map(str::trim)
        .map(|field| {
            if let Ok(x) = field.parse::<i64>() {
                return Val::Int(x);
            }
            if field.bytes().any(|b| b.is_ascii_digit()) {
                if let Ok(x) = field.parse::<f64>() {
                    return Val::Float(x);
                }
            }
            let mut chars = field.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Val::Char(c),
                _ => match field {
                    "OO" => Val::Bool(true),
                    "DILI" => Val::Bool(false),
                    _ => Val::Str(field.into()),
                },
            }
        })
        .collect()
}

impl Stmt {
    pub fn exec(&self, rt: &mut Runtime) -> Result<(), ExecInterruption> {
        match self {
            Self::Print(expr) => {
                let val = expr.eval(rt)?;
                rt.display(&val.to_string()).map_err(|e| e.at(expr.line()))?;
            }
            Self::Expr(expr) => {
                expr.eval(rt)?;
            }
            Self::Scan(ids) => {
                let line = ids.first().map_or(0, |id| id.line);
                let input = rt
                    .console
                    .read_line()
                    .map_err(|e| EvalErrType::from(e).at(line))?
                    .ok_or_else(|| EvalErrType::InputUnavailable.at(line))?;
                let values = parse_input(&input);

                if values.len() > ids.len() {
                    return Err(EvalErrType::TooManyValues { expected: ids.len() }.at(line).into());
                }
                if values.len() < ids.len() {
                    return Err(EvalErrType::TooFewValues {
                        expected: ids.len(),
                        received: values.len(),
                    }
                    .at(line)
                    .into());
                }

                for (id, val) in ids.iter().zip(values) {
                    rt.env.assign(&id.lexeme, val).map_err(|e| e.at(id.line))?;
                }
            }
            Self::Declare {
                name,
                ty,
                init,
                mutable,
            } => {
                let val = match init {
                    Some(init) => {
                        let val = init.eval(rt)?;
                        if val.data_type() != Some(*ty) {
                            return Err(EvalErrType::DeclareMismatch {
                                value: val.repr(),
                                found: val.type_name(),
                                expected: *ty,
                            }
                            .at(name.line)
                            .into());
                        }
                        Some(val)
                    }
                    None => None,
                };
                rt.env
                    .declare(name.lexeme.clone(), Some(*ty), val, *mutable)
                    .map_err(|e| e.at(name.line))?;
            }
            Self::Block(stmts) => exec_block(stmts, rt)?,
            Self::If {
                cond,
                then_branch,
                else_ifs,
                else_branch,
            } => {
                if condition(cond, rt)? {
                    return exec_block(then_branch, rt);
                }
                for (cond, branch) in else_ifs.iter() {
                    if condition(cond, rt)? {
                        return exec_block(branch, rt);
                    }
                }
                if let Some(branch) = else_branch {
                    exec_block(branch, rt)?;
                }
            }
            Self::While(cond, body) => {
                while condition(cond, rt)? {
                    exec_block(body, rt)?;
                }
            }
            Self::For {
                init,
                cond,
                increment,
                body,
            } => {
                let parent = rt.env.current();
                rt.in_scope(parent, |rt| -> Result<(), ExecInterruption> {
                    init.exec(rt)?;
                    while condition(cond, rt)? {
                        exec_block(body, rt)?;
                        increment.eval(rt)?;
                    }
                    Ok(())
                })?;
            }
            Self::Return(keyword, Some(expr)) => {
                return Err(ExecInterruption::Return(Some(expr.eval(rt)?), keyword.line));
            }
            Self::Return(keyword, None) => {
                return Err(ExecInterruption::Return(None, keyword.line));
            }
            Self::Fun(decl) => {
                tracing::debug!(function = %decl.name.lexeme, arity = decl.params.len(), "defining function");
                rt.env
                    .declare(decl.name.lexeme.clone(), None, Some(Val::Fun(decl.clone())), false)
                    .map_err(|e| e.at(decl.name.line))?;
            }
        }
        Ok(())
    }
}

impl FunDecl {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Binds `args` in a scope whose parent is the global scope: function
    /// bodies never see the caller's locals.
    pub fn call(&self, rt: &mut Runtime, args: Vec<Val>, line: usize) -> Result<Val, EvalErr> {
        if args.len() != self.arity() {
            return Err(EvalErrType::WrongArgumentCount(self.arity(), args.len()).at(line));
        }

        for (param, arg) in self.params.iter().zip(args.iter()) {
            if arg.data_type() != Some(param.ty) {
                return Err(EvalErrType::ArgumentMismatch {
                    function: self.name.lexeme.clone(),
                    param: param.name.lexeme.clone(),
                    expected: param.ty,
                    found: arg.type_name(),
                }
                .at(line));
            }
        }

        if rt.call_depth >= MAX_CALL_DEPTH {
            return Err(EvalErrType::StackOverflow(MAX_CALL_DEPTH).at(line));
        }

        tracing::debug!(function = %self.name.lexeme, depth = rt.call_depth, "calling function");
        rt.call_depth += 1;
        let outcome = rt.in_scope(GLOBAL_SCOPE, |rt| -> Result<(), ExecInterruption> {
            for (param, arg) in self.params.iter().zip(args) {
                rt.env
                    .declare(param.name.lexeme.clone(), Some(param.ty), Some(arg), true)
                    .map_err(|e| e.at(param.name.line))?;
            }
            for stmt in self.body.iter() {
                stmt.exec(rt)?;
            }
            Ok(())
        });
        rt.call_depth -= 1;

        let function = || self.name.lexeme.clone();
        match (outcome, self.return_type) {
            (Ok(()), None) | (Err(ExecInterruption::Return(None, _)), None) => Ok(Val::Nil),
            (Err(ExecInterruption::Err(e)), _) => Err(e),
            (Err(ExecInterruption::Return(Some(_), line)), None) => {
                Err(EvalErrType::VoidReturn(function()).at(line))
            }
            (Err(ExecInterruption::Return(Some(val), line)), Some(expected)) => {
                if val.data_type() == Some(expected) {
                    Ok(val)
                } else {
                    Err(EvalErrType::ReturnMismatch {
                        function: function(),
                        expected,
                        found: val.type_name(),
                    }
                    .at(line))
                }
            }
            (Err(ExecInterruption::Return(None, line)), Some(expected)) => {
                Err(EvalErrType::MissingReturnValue {
                    function: function(),
                    expected,
                }
                .at(line))
            }
            (Ok(()), Some(expected)) => Err(EvalErrType::MissingReturnValue {
                function: function(),
                expected,
            }
            .at(self.name.line)),
        }
    }
}
