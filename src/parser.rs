use crate::expr::*;
use crate::stack::ensure_sufficient_stack;
use crate::statement::{FunDecl, Param, Stmt};
use crate::token::*;

use std::rc::Rc;
use thiserror::Error;

type ExprResult = Result<ExprRef, ParseErr>;

const MAX_ARGS: usize = 255;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseErrType {
    #[error("Expected {expected} {context} but found {found}.")]
    ExpectedToken {
        expected: TokenType,
        context: &'static str,
        found: String,
    },
    #[error("Expected an identifier {context} but found {found}.")]
    ExpectedIdentifier { context: &'static str, found: String },
    #[error("Expected a type (NUMERO, TIPIK, LETRA, TINUOD or PULONG) but found {0}.")]
    ExpectedType(String),
    #[error("Expected expression but found {0}.")]
    ExpectedExpression(String),
    #[error("Invalid assignment target.")]
    NotLvalue,
    #[error("Only one SUGOD/KATAPUSAN program block is permitted.")]
    MultiplePrograms,
    #[error("Functions must be declared before SUGOD.")]
    MisplacedFunction,
    #[error("Statement outside of the SUGOD/KATAPUSAN program block.")]
    OutsideProgram,
    #[error("Variable declarations must come before other statements.")]
    DeclarationAfterStatement,
    #[error("KUNG WALA must follow at least one KUNG DILI clause.")]
    ElseWithoutElseIf,
    #[error("IULI is only allowed inside a function.")]
    ReturnOutsideFunction,
    #[error("Function '{function}' declares return type {ty} but does not end with IULI.")]
    MissingReturn { function: Rc<str>, ty: DataType },
    #[error("Expected 'name++' or 'name--' as the loop increment but found {0}.")]
    InvalidIncrement(String),
    #[error("Can't have more than 255 arguments.")]
    TooManyArguments,
    #[error("Can't have more than 255 parameters.")]
    TooManyParameters,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("[Line {line}] Syntax Error : {data}")]
pub struct ParseErr {
    pub data: ParseErrType,
    pub line: usize,
}

impl ParseErr {
    fn new(data: ParseErrType, line: usize) -> Self {
        ParseErr { data, line }
    }
}

fn describe(tok: &Token) -> String {
    match tok.kind {
        TokenType::Eof => "end of input".to_string(),
        _ => format!("'{}'", tok.lexeme),
    }
}

pub struct Parser<'a> {
    tokens: &'a [Token],
    index: usize,
    // Stands in for a missing trailing Eof token.
    eof: Token,
    in_function: bool,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        let line = tokens.last().map_or(1, |t| t.line);
        Parser {
            tokens,
            index: 0,
            eof: Token::new(TokenType::Eof, "".into(), line),
            in_function: false,
        }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.index).unwrap_or(&self.eof)
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenType::Eof
    }

    fn check(&self, tok: &TokenType) -> bool {
        self.peek().kind == *tok
    }

    fn check_next(&self, tok: &TokenType) -> bool {
        self.tokens.get(self.index + 1).map(|x| &x.kind) == Some(tok)
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.index += 1;
        }
        self.previous()
    }

    fn previous(&self) -> &Token {
        self.index
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .unwrap_or(&self.eof)
    }

    fn match_next_lits<const N: usize>(&mut self, ttypes: [TokenType; N]) -> bool {
        let res = ttypes.iter().any(|x| self.check(x));
        if res {
            self.advance();
        }
        res
    }

    fn error(&self, data: ParseErrType) -> ParseErr {
        ParseErr::new(data, self.peek().line)
    }

    fn consume(&mut self, tok: &TokenType, context: &'static str) -> Result<Token, ParseErr> {
        if !self.check(tok) {
            return Err(self.error(ParseErrType::ExpectedToken {
                expected: tok.clone(),
                context,
                found: describe(self.peek()),
            }));
        }
        Ok(self.advance().clone())
    }

    fn consume_identifier(&mut self, context: &'static str) -> Result<Token, ParseErr> {
        if let TokenType::Identifier(_) = self.peek().kind {
            Ok(self.advance().clone())
        } else {
            Err(self.error(ParseErrType::ExpectedIdentifier {
                context,
                found: describe(self.peek()),
            }))
        }
    }

    fn consume_type(&mut self) -> Result<DataType, ParseErr> {
        match DataType::from_token(&self.peek().kind) {
            Some(ty) => {
                self.advance();
                Ok(ty)
            }
            None => Err(self.error(ParseErrType::ExpectedType(describe(self.peek())))),
        }
    }

    // Parsing the actual grammar.
    pub fn parse(&mut self) -> Result<Vec<Stmt>, ParseErr> {
        let mut res = vec![];
        while self.match_next_lits([TokenType::Function]) {
            res.push(self.function()?);
        }

        self.consume(&TokenType::Begin, "at the start of the program")?;
        res.extend(self.items(&TokenType::End, false)?);
        self.consume(&TokenType::End, "at the end of the program")?;

        match self.peek().kind {
            TokenType::Eof => Ok(res),
            TokenType::Begin => Err(self.error(ParseErrType::MultiplePrograms)),
            TokenType::Function => Err(self.error(ParseErrType::MisplacedFunction)),
            _ => Err(self.error(ParseErrType::OutsideProgram)),
        }
    }

    /// Leading declarations, then statements, up to `closer`. With
    /// `stop_at_return` a top-level IULI ends the list.
    fn items(&mut self, closer: &TokenType, stop_at_return: bool) -> Result<Vec<Stmt>, ParseErr> {
        let mut res = vec![];
        while self.match_next_lits([TokenType::Declare, TokenType::Immutable]) {
            res.extend(self.var_declaration()?);
        }

        while !self.is_at_end() && !self.check(closer) {
            if self.check(&TokenType::Declare) || self.check(&TokenType::Immutable) {
                return Err(self.error(ParseErrType::DeclarationAfterStatement));
            }
            let stmt = self.statement()?;
            let is_return = matches!(stmt, Stmt::Return(..));
            res.push(stmt);
            if stop_at_return && is_return {
                break;
            }
        }
        Ok(res)
    }

    fn var_declaration(&mut self) -> Result<Vec<Stmt>, ParseErr> {
        let mutable = self.previous().kind == TokenType::Declare;
        let ty = self.consume_type()?;
        let mut res = vec![];
        loop {
            let (name, init) = self.declarator()?;
            res.push(Stmt::Declare {
                name,
                ty,
                init,
                mutable,
            });
            if !self.match_next_lits([TokenType::Comma]) {
                break;
            }
        }
        Ok(res)
    }

    /// `MUGNA`/`PIRMI` has already been consumed; parses `type name [= init]`.
    fn single_declaration(&mut self) -> Result<Stmt, ParseErr> {
        let mutable = self.previous().kind == TokenType::Declare;
        let ty = self.consume_type()?;
        let (name, init) = self.declarator()?;
        Ok(Stmt::Declare {
            name,
            ty,
            init,
            mutable,
        })
    }

    fn declarator(&mut self) -> Result<(Token, Option<Expr>), ParseErr> {
        let name = self.consume_identifier("as variable name")?;
        let init = if self.match_next_lits([TokenType::Equal]) {
            Some(*self.expression()?)
        } else {
            None
        };
        Ok((name, init))
    }

    fn function(&mut self) -> Result<Stmt, ParseErr> {
        let return_type = DataType::from_token(&self.peek().kind);
        if return_type.is_some() {
            self.advance();
        }

        let name = self.consume_identifier("as function name")?;
        self.consume(&TokenType::LeftParen, "after function name")?;
        let mut params = vec![];
        if !self.check(&TokenType::RightParen) {
            loop {
                if params.len() >= MAX_ARGS {
                    return Err(self.error(ParseErrType::TooManyParameters));
                }
                let ty = self.consume_type()?;
                let name = self.consume_identifier("as parameter name")?;
                params.push(Param { ty, name });
                if !self.match_next_lits([TokenType::Comma]) {
                    break;
                }
            }
        }
        self.consume(&TokenType::RightParen, "after parameters")?;

        self.in_function = true;
        let body = self.block(true);
        self.in_function = false;
        let body = body?;

        if let Some(ty) = return_type {
            if !matches!(body.last(), Some(Stmt::Return(..))) {
                return Err(ParseErr::new(
                    ParseErrType::MissingReturn {
                        function: name.lexeme.clone(),
                        ty,
                    },
                    name.line,
                ));
            }
        }

        Ok(Stmt::Fun(Rc::new(FunDecl {
            name,
            params,
            body,
            return_type,
        })))
    }

    fn statement(&mut self) -> Result<Stmt, ParseErr> {
        if self.match_next_lits([TokenType::Display]) {
            self.display_statement()
        } else if self.match_next_lits([TokenType::Scan]) {
            self.scan_statement()
        } else if self.match_next_lits([TokenType::If]) {
            self.if_statement()
        } else if self.match_next_lits([TokenType::While]) {
            self.while_statement()
        } else if self.match_next_lits([TokenType::For]) {
            self.for_statement()
        } else if self.match_next_lits([TokenType::Return]) {
            self.return_statement()
        } else if self.match_next_lits([TokenType::Block]) {
            Ok(Stmt::Block(self.braced(false)?))
        } else if self.check(&TokenType::Function) {
            Err(self.error(ParseErrType::MisplacedFunction))
        } else {
            self.expression_statement()
        }
    }

    fn display_statement(&mut self) -> Result<Stmt, ParseErr> {
        self.consume(&TokenType::Colon, "after IPAKITA")?;
        Ok(Stmt::Print(*self.logic_or()?))
    }

    fn scan_statement(&mut self) -> Result<Stmt, ParseErr> {
        self.consume(&TokenType::Colon, "after DAWAT")?;
        let mut ids = vec![self.consume_identifier("after DAWAT:")?];
        while self.match_next_lits([TokenType::Comma]) {
            ids.push(self.consume_identifier("after ','")?);
        }
        Ok(Stmt::Scan(ids))
    }

    fn return_statement(&mut self) -> Result<Stmt, ParseErr> {
        let keyword = self.previous().clone();
        if !self.in_function {
            return Err(ParseErr::new(ParseErrType::ReturnOutsideFunction, keyword.line));
        }

        let val = if self.check(&TokenType::RightBrace) || self.is_at_end() {
            None
        } else {
            Some(*self.expression()?)
        };

        Ok(Stmt::Return(keyword, val))
    }

    /// `( or-expression )` after KUNG or KUNG DILI.
    fn condition(&mut self) -> Result<Expr, ParseErr> {
        self.consume(&TokenType::LeftParen, "before condition")?;
        let cond = self.logic_or()?;
        self.consume(&TokenType::RightParen, "after condition")?;
        Ok(*cond)
    }

    fn if_statement(&mut self) -> Result<Stmt, ParseErr> {
        let cond = self.condition()?;
        let then_branch = self.block(false)?;

        let mut else_ifs = vec![];
        while self.check(&TokenType::ElseIf) && self.check_next(&TokenType::LeftParen) {
            self.advance();
            let cond = self.condition()?;
            else_ifs.push((cond, self.block(false)?));
        }

        let else_branch = if self.check(&TokenType::Else) {
            // A bare KUNG WALA is rejected; it needs a KUNG DILI before it.
            if else_ifs.is_empty() {
                return Err(self.error(ParseErrType::ElseWithoutElseIf));
            }
            self.advance();
            Some(self.block(false)?)
        } else {
            None
        };

        Ok(Stmt::If {
            cond,
            then_branch,
            else_ifs,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt, ParseErr> {
        self.consume(&TokenType::LeftParen, "after SAMTANG")?;
        let cond = self.expression()?;
        self.consume(&TokenType::RightParen, "after condition")?;
        let body = self.block(false)?;
        Ok(Stmt::While(*cond, body))
    }

    fn for_statement(&mut self) -> Result<Stmt, ParseErr> {
        self.consume(&TokenType::LeftParen, "after ALANG SA")?;

        let init = if self.match_next_lits([TokenType::Declare, TokenType::Immutable]) {
            self.single_declaration()?
        } else {
            let name = self.consume_identifier("as loop initializer")?;
            self.consume(&TokenType::Equal, "in loop initializer")?;
            let value = self.expression()?;
            Stmt::Expr(Expr::Assign(name, value))
        };
        self.consume(&TokenType::Comma, "after loop initializer")?;

        let cond = self.expression()?;
        self.consume(&TokenType::Comma, "after loop condition")?;

        let increment = self.increment()?;
        self.consume(&TokenType::RightParen, "after loop increment")?;

        let body = self.block(false)?;
        Ok(Stmt::For {
            init: Box::new(init),
            cond: *cond,
            increment,
            body,
        })
    }

    /// `i++` / `i--`, desugared to `i = i + 1` / `i = i - 1`.
    fn increment(&mut self) -> Result<Expr, ParseErr> {
        let name = self.consume_identifier("as loop increment")?;
        let op = self.peek().clone();
        let (kind, lexeme) = match op.kind {
            TokenType::Plus => (TokenType::Plus, "+"),
            TokenType::Minus => (TokenType::Minus, "-"),
            _ => return Err(self.error(ParseErrType::InvalidIncrement(describe(&op)))),
        };
        self.advance();
        if !self.check(&kind) {
            return Err(self.error(ParseErrType::InvalidIncrement(describe(self.peek()))));
        }
        self.advance();

        let one = Expr::Literal(Val::Int(1), name.line);
        let op = Token::new(kind, lexeme.into(), op.line);
        let sum = Expr::Binary(Box::new(Expr::Variable(name.clone())), op, Box::new(one));
        Ok(Expr::Assign(name, Box::new(sum)))
    }

    /// `PUNDOK { ... }`
    fn block(&mut self, stop_at_return: bool) -> Result<Vec<Stmt>, ParseErr> {
        self.consume(&TokenType::Block, "before block")?;
        self.braced(stop_at_return)
    }

    fn braced(&mut self, stop_at_return: bool) -> Result<Vec<Stmt>, ParseErr> {
        self.consume(&TokenType::LeftBrace, "after PUNDOK")?;
        let res = self.items(&TokenType::RightBrace, stop_at_return)?;
        let context = match res.last() {
            Some(Stmt::Return(..)) if stop_at_return => "after return statement",
            _ => "to close block",
        };
        self.consume(&TokenType::RightBrace, context)?;
        Ok(res)
    }

    fn expression_statement(&mut self) -> Result<Stmt, ParseErr> {
        Ok(Stmt::Expr(*self.expression()?))
    }

    fn expression(&mut self) -> ExprResult {
        ensure_sufficient_stack(|| self.assignment())
    }

    fn assignment(&mut self) -> ExprResult {
        let expr = self.logic_or()?;
        if self.match_next_lits([TokenType::Equal]) {
            let equals = self.previous().line;
            let val = self.assignment()?;
            if let Expr::Variable(tok) = *expr {
                Ok(Box::new(Expr::Assign(tok, val)))
            } else {
                Err(ParseErr::new(ParseErrType::NotLvalue, equals))
            }
        } else {
            Ok(expr)
        }
    }

    fn logic_or(&mut self) -> ExprResult {
        let mut expr = self.logic_and()?;

        while self.match_next_lits([TokenType::Or]) {
            let op = self.previous().clone();
            let right = self.logic_and()?;
            expr = Box::new(Expr::Logical(expr, op, right));
        }

        Ok(expr)
    }

    fn logic_and(&mut self) -> ExprResult {
        let mut expr = self.equality()?;

        while self.match_next_lits([TokenType::And]) {
            let op = self.previous().clone();
            let right = self.equality()?;
            expr = Box::new(Expr::Logical(expr, op, right));
        }

        Ok(expr)
    }

    fn equality(&mut self) -> ExprResult {
        let mut expr = self.comparison()?;

        while self.match_next_lits([TokenType::NotEqual, TokenType::EqualEqual]) {
            let op = self.previous().clone();
            let right = self.comparison()?;
            expr = Box::new(Expr::Binary(expr, op, right));
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> ExprResult {
        let mut expr = self.term()?;
        while self.match_next_lits([
            TokenType::Greater,
            TokenType::GreaterEqual,
            TokenType::Less,
            TokenType::LessEqual,
        ]) {
            let op = self.previous().clone();
            let right = self.term()?;
            expr = Box::new(Expr::Binary(expr, op, right));
        }

        Ok(expr)
    }

    fn term(&mut self) -> ExprResult {
        let mut expr = self.factor()?;

        while self.match_next_lits([TokenType::Plus, TokenType::Minus, TokenType::Ampersand]) {
            let op = self.previous().clone();
            let right = self.factor()?;
            expr = Box::new(Expr::Binary(expr, op, right));
        }

        Ok(expr)
    }

    fn factor(&mut self) -> ExprResult {
        let mut expr = self.unary()?;

        while self.match_next_lits([TokenType::Slash, TokenType::Star, TokenType::Percent]) {
            let op = self.previous().clone();
            let right = self.unary()?;
            expr = Box::new(Expr::Binary(expr, op, right));
        }

        Ok(expr)
    }

    fn unary(&mut self) -> ExprResult {
        if self.match_next_lits([TokenType::Bang, TokenType::Minus, TokenType::Plus]) {
            let op = self.previous().clone();
            Ok(Box::new(Expr::Unary(op, self.unary()?)))
        } else {
            self.call()
        }
    }

    fn call(&mut self) -> ExprResult {
        let mut expr = self.primary()?;
        while self.match_next_lits([TokenType::LeftParen]) {
            expr = self.finish_call(expr)?;
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: ExprRef) -> ExprResult {
        let mut args = vec![];
        if !self.check(&TokenType::RightParen) {
            loop {
                if args.len() >= MAX_ARGS {
                    return Err(self.error(ParseErrType::TooManyArguments));
                }
                args.push(*self.expression()?);
                if !self.match_next_lits([TokenType::Comma]) {
                    break;
                }
            }
        }

        let paren = self.consume(&TokenType::RightParen, "after arguments")?;

        Ok(Box::new(Expr::Call(callee, paren, args)))
    }

    fn primary(&mut self) -> ExprResult {
        let tok = self.peek().clone();
        let line = tok.line;
        let res = match &tok.kind {
            TokenType::True => Expr::Literal(Val::Bool(true), line),
            TokenType::False => Expr::Literal(Val::Bool(false), line),
            TokenType::Int(x) => Expr::Literal(Val::Int(*x), line),
            TokenType::Float(x) => Expr::Literal(Val::Float(*x), line),
            TokenType::Char(c) => Expr::Literal(Val::Char(*c), line),
            TokenType::String(s) => Expr::Literal(Val::Str(s.clone()), line),
            TokenType::Identifier(_) => Expr::Variable(tok.clone()),
            TokenType::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(&TokenType::RightParen, "after expression")?;
                return Ok(Box::new(Expr::Grouping(expr)));
            }
            _ => return Err(self.error(ParseErrType::ExpectedExpression(describe(&tok)))),
        };

        self.advance();
        Ok(Box::new(res))
    }
}
