use crate::ast::{BinOp, Expr, Stmt, Target, UnOp};
use crate::error::ParseError;
use crate::lexer::{Lexer, Tok, Token};

/// Parse a source chunk into a statement list.
pub fn parse(src: &str) -> Result<Vec<Stmt>, ParseError> {
    let mut p = Parser::new(src)?;
    let stmts = p.block()?;
    p.expect(Tok::Eof, "end of input")?;
    Ok(stmts)
}

struct Parser<'src> {
    lexer: Lexer<'src>,
    cur: Token,
}

impl<'src> Parser<'src> {
    fn new(src: &'src str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(src);
        let cur = lexer.next_token()?;
        Ok(Self { lexer, cur })
    }

    fn advance(&mut self) -> Result<Token, ParseError> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.cur, next))
    }

    fn check(&self, tok: &Tok) -> bool {
        self.cur.tok == *tok
    }

    fn eat(&mut self, tok: &Tok) -> Result<bool, ParseError> {
        if self.check(tok) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, tok: Tok, what: &str) -> Result<(), ParseError> {
        if self.check(&tok) {
            self.advance()?;
            Ok(())
        } else {
            Err(self.err(format!("expected {}, found {:?}", what, self.cur.tok)))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, ParseError> {
        if let Tok::Ident(_) = self.cur.tok {
            let t = self.advance()?;
            match t.tok {
                Tok::Ident(name) => Ok(name),
                _ => unreachable!(),
            }
        } else {
            Err(self.err(format!("expected {}, found {:?}", what, self.cur.tok)))
        }
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.cur.line, message)
    }

    fn at_block_end(&self) -> bool {
        matches!(self.cur.tok, Tok::End | Tok::Elseif | Tok::Else | Tok::Eof)
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        while !self.at_block_end() {
            let stmt = self.statement()?;
            let was_return = matches!(stmt, Stmt::Return { .. });
            stmts.push(stmt);
            if was_return {
                // `return` must close its block
                if !self.at_block_end() {
                    return Err(self.err("'return' must be the last statement of a block"));
                }
                break;
            }
        }
        Ok(stmts)
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.cur.line;
        match self.cur.tok {
            Tok::Local => {
                self.advance()?;
                let name = self.expect_ident("a local name")?;
                self.expect(Tok::Assign, "'='")?;
                let value = self.expr()?;
                Ok(Stmt::Local { name, value, line })
            }
            Tok::Function => {
                self.advance()?;
                self.function_decl(line)
            }
            Tok::If => {
                self.advance()?;
                self.if_stmt(line)
            }
            Tok::While => {
                self.advance()?;
                let cond = self.expr()?;
                self.expect(Tok::Do, "'do'")?;
                let body = self.block()?;
                self.expect(Tok::End, "'end'")?;
                Ok(Stmt::While { cond, body, line })
            }
            Tok::Return => {
                self.advance()?;
                let mut values = Vec::new();
                if !self.at_block_end() {
                    values.push(self.expr()?);
                    while self.eat(&Tok::Comma)? {
                        values.push(self.expr()?);
                    }
                }
                Ok(Stmt::Return { values, line })
            }
            _ => {
                let expr = self.suffixed_expr()?;
                if self.check(&Tok::Assign) {
                    self.advance()?;
                    let target = match expr {
                        Expr::Name(name) => Target::Name(name),
                        Expr::Field { obj, name, .. } => Target::Field { obj, name },
                        _ => return Err(self.err("cannot assign to this expression")),
                    };
                    let value = self.expr()?;
                    Ok(Stmt::Assign {
                        target,
                        value,
                        line,
                    })
                } else if matches!(expr, Expr::Call { .. } | Expr::MethodCall { .. }) {
                    Ok(Stmt::ExprStmt(expr))
                } else {
                    Err(self.err("expected statement"))
                }
            }
        }
    }

    fn function_decl(&mut self, line: u32) -> Result<Stmt, ParseError> {
        let first = self.expect_ident("a function name")?;
        let (target, name) = if self.eat(&Tok::Dot)? {
            let field = self.expect_ident("a function name after '.'")?;
            let display = format!("{}.{}", first, field);
            (
                Target::Field {
                    obj: Box::new(Expr::Name(first)),
                    name: field,
                },
                display,
            )
        } else {
            (Target::Name(first.clone()), first)
        };

        self.expect(Tok::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.check(&Tok::RParen) {
            params.push(self.expect_ident("a parameter name")?);
            while self.eat(&Tok::Comma)? {
                params.push(self.expect_ident("a parameter name")?);
            }
        }
        self.expect(Tok::RParen, "')'")?;
        let body = self.block()?;
        self.expect(Tok::End, "'end'")?;

        Ok(Stmt::Function {
            target,
            name,
            params,
            body,
            line,
        })
    }

    fn if_stmt(&mut self, line: u32) -> Result<Stmt, ParseError> {
        let mut arms = Vec::new();
        let cond = self.expr()?;
        self.expect(Tok::Then, "'then'")?;
        arms.push((cond, self.block()?));

        let mut otherwise = None;
        loop {
            if self.eat(&Tok::Elseif)? {
                let cond = self.expr()?;
                self.expect(Tok::Then, "'then'")?;
                arms.push((cond, self.block()?));
            } else if self.eat(&Tok::Else)? {
                otherwise = Some(self.block()?);
                self.expect(Tok::End, "'end'")?;
                break;
            } else {
                self.expect(Tok::End, "'end'")?;
                break;
            }
        }

        Ok(Stmt::If {
            arms,
            otherwise,
            line,
        })
    }

    // ---- expressions, lowest precedence first ----

    fn expr(&mut self) -> Result<Expr, ParseError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.and_expr()?;
        while self.check(&Tok::Or) {
            let line = self.cur.line;
            self.advance()?;
            let rhs = self.and_expr()?;
            lhs = Expr::Binary {
                op: BinOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.cmp_expr()?;
        while self.check(&Tok::And) {
            let line = self.cur.line;
            self.advance()?;
            let rhs = self.cmp_expr()?;
            lhs = Expr::Binary {
                op: BinOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn cmp_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.concat_expr()?;
        loop {
            let op = match self.cur.tok {
                Tok::EqEq => BinOp::Eq,
                Tok::NotEq => BinOp::Ne,
                Tok::Lt => BinOp::Lt,
                Tok::Le => BinOp::Le,
                Tok::Gt => BinOp::Gt,
                Tok::Ge => BinOp::Ge,
                _ => break,
            };
            let line = self.cur.line;
            self.advance()?;
            let rhs = self.concat_expr()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn concat_expr(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.add_expr()?;
        if self.check(&Tok::Concat) {
            let line = self.cur.line;
            self.advance()?;
            // right-associative
            let rhs = self.concat_expr()?;
            return Ok(Expr::Binary {
                op: BinOp::Concat,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            });
        }
        Ok(lhs)
    }

    fn add_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.mul_expr()?;
        loop {
            let op = match self.cur.tok {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => break,
            };
            let line = self.cur.line;
            self.advance()?;
            let rhs = self.mul_expr()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn mul_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary_expr()?;
        loop {
            let op = match self.cur.tok {
                Tok::Star => BinOp::Mul,
                Tok::Slash => BinOp::Div,
                Tok::Percent => BinOp::Mod,
                _ => break,
            };
            let line = self.cur.line;
            self.advance()?;
            let rhs = self.unary_expr()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> Result<Expr, ParseError> {
        let op = match self.cur.tok {
            Tok::Minus => Some(UnOp::Neg),
            Tok::Not => Some(UnOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            let line = self.cur.line;
            self.advance()?;
            let expr = self.unary_expr()?;
            return Ok(Expr::Unary {
                op,
                expr: Box::new(expr),
                line,
            });
        }
        self.suffixed_expr()
    }

    /// Primary expression followed by any number of `.name`, `:name(...)`
    /// and `(...)` suffixes.
    fn suffixed_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary_expr()?;
        loop {
            match self.cur.tok {
                Tok::Dot => {
                    let line = self.cur.line;
                    self.advance()?;
                    let name = self.expect_ident("a field name")?;
                    expr = Expr::Field {
                        obj: Box::new(expr),
                        name,
                        line,
                    };
                }
                Tok::Colon => {
                    let line = self.cur.line;
                    self.advance()?;
                    let name = self.expect_ident("a method name")?;
                    self.expect(Tok::LParen, "'('")?;
                    let args = self.call_args()?;
                    expr = Expr::MethodCall {
                        recv: Box::new(expr),
                        name,
                        args,
                        line,
                    };
                }
                Tok::LParen => {
                    let line = self.cur.line;
                    self.advance()?;
                    let args = self.call_args()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        line,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if !self.check(&Tok::RParen) {
            args.push(self.expr()?);
            while self.eat(&Tok::Comma)? {
                args.push(self.expr()?);
            }
        }
        self.expect(Tok::RParen, "')'")?;
        Ok(args)
    }

    fn primary_expr(&mut self) -> Result<Expr, ParseError> {
        match self.cur.tok.clone() {
            Tok::Nil => {
                self.advance()?;
                Ok(Expr::Nil)
            }
            Tok::True => {
                self.advance()?;
                Ok(Expr::True)
            }
            Tok::False => {
                self.advance()?;
                Ok(Expr::False)
            }
            Tok::Num(n) => {
                self.advance()?;
                Ok(Expr::Num(n))
            }
            Tok::Str(s) => {
                self.advance()?;
                Ok(Expr::Str(s))
            }
            Tok::Ident(name) => {
                self.advance()?;
                Ok(Expr::Name(name))
            }
            Tok::LParen => {
                self.advance()?;
                let expr = self.expr()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(expr)
            }
            Tok::LBrace => {
                self.advance()?;
                let mut fields = Vec::new();
                while !self.check(&Tok::RBrace) {
                    let key = self.expect_ident("a field name")?;
                    self.expect(Tok::Assign, "'='")?;
                    let value = self.expr()?;
                    fields.push((key, value));
                    if !self.eat(&Tok::Comma)? {
                        break;
                    }
                }
                self.expect(Tok::RBrace, "'}'")?;
                Ok(Expr::Table(fields))
            }
            other => Err(self.err(format!("unexpected token {:?}", other))),
        }
    }
}
