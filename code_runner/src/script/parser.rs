use super::ast::*;
use super::error::ScriptError;
use super::lexer::{Spanned, Token, tokenize};

/// Deepest allowed nesting of blocks and sub-expressions.
pub const MAX_NESTING: usize = 64;

pub fn parse(source: &str) -> Result<Program, ScriptError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        loops: 0,
    };
    let mut body = Vec::new();
    while !parser.check(&Token::Eof) {
        body.push(parser.statement()?);
    }
    Ok(Program { body })
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    loops: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn peek_next(&self) -> &Token {
        self.tokens
            .get(self.pos + 1)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|s| s.line)
            .unwrap_or(1)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<(), ScriptError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}, found {}", describe(self.peek()))))
        }
    }

    fn ident(&mut self, what: &str) -> Result<String, ScriptError> {
        match self.advance() {
            Token::Ident(name) => Ok(name),
            other => Err(self.error(format!("expected {what}, found {}", describe(&other)))),
        }
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::syntax(self.line(), message)
    }

    fn nest(&mut self) -> Result<(), ScriptError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error(format!("nesting deeper than {MAX_NESTING} levels")));
        }
        Ok(())
    }

    fn unnest(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // --- statements ---

    fn statement(&mut self) -> Result<Stmt, ScriptError> {
        let line = self.line();
        let kind = match self.peek() {
            Token::Let => {
                self.advance();
                let name = self.ident("variable name after 'let'")?;
                self.expect(&Token::Assign, "'=' after variable name")?;
                let value = self.expression()?;
                self.end_simple();
                StmtKind::Let(name, value)
            }
            Token::If => {
                self.advance();
                self.if_statement()?
            }
            Token::While => {
                self.advance();
                let cond = self.expression()?;
                let body = self.loop_block()?;
                StmtKind::While(cond, body)
            }
            Token::For => {
                self.advance();
                let name = self.ident("loop variable after 'for'")?;
                self.expect(&Token::In, "'in' after loop variable")?;
                let iterable = self.expression()?;
                let body = self.loop_block()?;
                StmtKind::For(name, iterable, body)
            }
            Token::Break | Token::Continue => {
                let token = self.advance();
                if self.loops == 0 {
                    return Err(ScriptError::syntax(
                        line,
                        format!("{} outside of a loop", describe(&token)),
                    ));
                }
                self.end_simple();
                if token == Token::Break {
                    StmtKind::Break
                } else {
                    StmtKind::Continue
                }
            }
            Token::Return => {
                self.advance();
                self.end_simple();
                StmtKind::Return
            }
            _ => self.expression_statement()?,
        };
        Ok(Stmt { line, kind })
    }

    fn end_simple(&mut self) {
        self.eat(&Token::Semicolon);
    }

    fn if_statement(&mut self) -> Result<StmtKind, ScriptError> {
        let mut branches = Vec::new();
        let cond = self.expression()?;
        branches.push((cond, self.block()?));

        let mut otherwise = None;
        while self.eat(&Token::Else) {
            if self.eat(&Token::If) {
                let cond = self.expression()?;
                branches.push((cond, self.block()?));
            } else {
                otherwise = Some(self.block()?);
                break;
            }
        }
        Ok(StmtKind::If {
            branches,
            otherwise,
        })
    }

    fn loop_block(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        self.loops += 1;
        let body = self.block();
        self.loops -= 1;
        body
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        self.expect(&Token::LBrace, "'{'")?;
        self.nest()?;
        let mut body = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.check(&Token::Eof) {
                return Err(self.error("unclosed block, expected '}'"));
            }
            body.push(self.statement()?);
        }
        self.advance();
        self.unnest();
        Ok(body)
    }

    fn expression_statement(&mut self) -> Result<StmtKind, ScriptError> {
        let expr = self.expression()?;
        let op = match self.peek() {
            Token::Assign => Some(AssignOp::Set),
            Token::PlusAssign => Some(AssignOp::Add),
            Token::MinusAssign => Some(AssignOp::Sub),
            Token::StarAssign => Some(AssignOp::Mul),
            Token::SlashAssign => Some(AssignOp::Div),
            _ => None,
        };

        let Some(op) = op else {
            self.end_simple();
            return Ok(StmtKind::Expr(expr));
        };
        self.advance();
        let target = into_target(expr).ok_or_else(|| self.error("invalid assignment target"))?;
        let value = self.expression()?;
        self.end_simple();
        Ok(StmtKind::Assign(target, op, value))
    }

    // --- expressions ---

    fn expression(&mut self) -> Result<Expr, ScriptError> {
        self.nest()?;
        let expr = self.or();
        self.unnest();
        expr
    }

    fn or(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.and()?;
        while self.eat(&Token::Or) {
            let right = self.and()?;
            left = Expr::Logical(LogicalOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.not()?;
        while self.eat(&Token::And) {
            let right = self.not()?;
            left = Expr::Logical(LogicalOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr, ScriptError> {
        if self.check(&Token::Not) && self.peek_next() != &Token::In {
            self.advance();
            self.nest()?;
            let inner = self.not();
            self.unnest();
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Token::Eq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::NotEq,
                Token::Lt => BinaryOp::Lt,
                Token::LtEq => BinaryOp::LtEq,
                Token::Gt => BinaryOp::Gt,
                Token::GtEq => BinaryOp::GtEq,
                Token::In => BinaryOp::In,
                Token::Not if self.peek_next() == &Token::In => {
                    self.advance();
                    BinaryOp::NotIn
                }
                _ => break,
            };
            self.advance();
            let right = self.additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Rem,
                _ => break,
            };
            self.advance();
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Bang => UnaryOp::Not,
            _ => return self.postfix(),
        };
        self.advance();
        self.nest()?;
        let operand = self.unary();
        self.unnest();
        Ok(Expr::Unary(op, Box::new(operand?)))
    }

    fn postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.primary()?;
        while self.eat(&Token::LBracket) {
            let index = self.expression()?;
            self.expect(&Token::RBracket, "']'")?;
            expr = Expr::Index(Box::new(expr), Box::new(index));
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        match self.advance() {
            Token::Num(n) => Ok(Expr::Literal(Literal::Num(n))),
            Token::Str(s) => Ok(Expr::Literal(Literal::Str(s))),
            Token::True => Ok(Expr::Literal(Literal::Bool(true))),
            Token::False => Ok(Expr::Literal(Literal::Bool(false))),
            Token::Nil => Ok(Expr::Literal(Literal::Nil)),
            Token::Ident(name) => {
                if self.eat(&Token::LParen) {
                    let args = self.sequence(&Token::RParen)?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Var(name))
                }
            }
            Token::LParen => {
                let inner = self.expression()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::LBracket => Ok(Expr::List(self.sequence(&Token::RBracket)?)),
            Token::LBrace => self.map_literal(),
            other => Err(self.error(format!("unexpected {}", describe(&other)))),
        }
    }

    /// Comma separated expressions up to `close`, trailing comma allowed.
    fn sequence(&mut self, close: &Token) -> Result<Vec<Expr>, ScriptError> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.expression()?);
            if !self.eat(&Token::Comma) {
                self.expect(close, &describe(close))?;
                break;
            }
        }
        Ok(items)
    }

    fn map_literal(&mut self) -> Result<Expr, ScriptError> {
        let mut entries = Vec::new();
        while !self.eat(&Token::RBrace) {
            // bare identifiers before ':' are string keys
            let bare_key = match (self.peek(), self.peek_next()) {
                (Token::Ident(name), Token::Colon) => Some(name.clone()),
                _ => None,
            };
            let key = match bare_key {
                Some(name) => {
                    self.advance();
                    Expr::Literal(Literal::Str(name))
                }
                None => self.expression()?,
            };
            self.expect(&Token::Colon, "':' in map literal")?;
            let value = self.expression()?;
            entries.push((key, value));
            if !self.eat(&Token::Comma) {
                self.expect(&Token::RBrace, "'}'")?;
                break;
            }
        }
        Ok(Expr::Map(entries))
    }
}

fn into_target(expr: Expr) -> Option<Target> {
    match expr {
        Expr::Var(name) => Some(Target {
            name,
            path: Vec::new(),
        }),
        Expr::Index(base, index) => {
            let mut target = into_target(*base)?;
            target.path.push(*index);
            Some(target)
        }
        _ => None,
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Num(n) => format!("number {n}"),
        Token::Str(s) => format!("string {s:?}"),
        Token::Ident(name) => format!("'{name}'"),
        Token::Eof => "end of script".to_string(),
        Token::Break => "'break'".to_string(),
        Token::Continue => "'continue'".to_string(),
        Token::RParen => "')'".to_string(),
        Token::RBracket => "']'".to_string(),
        Token::RBrace => "'}'".to_string(),
        other => format!("{other:?}").to_lowercase(),
    }
}
