use std::rc::Rc;

use crate::ast::{BinOp, Expr, Stmt, Target, UnOp};
use crate::bytecode::{Chunk, Function, Op};
use crate::error::ParseError;
use crate::value::Value;

/// Compile a parsed statement list into a zero-argument top-level function.
pub fn compile(stmts: &[Stmt], chunk_name: &str) -> Result<Rc<Function>, ParseError> {
    let func = compile_function(chunk_name, &[], stmts, 1)?;
    tracing::trace!(chunk = chunk_name, ops = func.chunk.ops.len(), "compiled chunk");
    Ok(func)
}

fn compile_function(
    name: &str,
    params: &[String],
    body: &[Stmt],
    line: u32,
) -> Result<Rc<Function>, ParseError> {
    if params.len() > u8::MAX as usize {
        return Err(ParseError::new(line, "too many parameters"));
    }
    let mut c = Compiler::new();
    for p in params {
        c.declare_local(p.clone(), line)?;
    }
    c.block(body)?;
    // implicit `return` for functions that fall off the end
    c.chunk.emit(Op::Return { count: 0 }, line);
    Ok(Rc::new(Function {
        name: name.to_string(),
        arity: params.len() as u8,
        chunk: c.chunk,
    }))
}

struct Local {
    name: String,
    depth: u32,
}

struct Compiler {
    chunk: Chunk,
    locals: Vec<Local>,
    scope_depth: u32,
}

impl Compiler {
    fn new() -> Self {
        Self {
            chunk: Chunk::default(),
            locals: Vec::new(),
            scope_depth: 0,
        }
    }

    fn add_const(&mut self, value: Value, line: u32) -> Result<u16, ParseError> {
        self.chunk
            .add_const(value)
            .ok_or_else(|| ParseError::new(line, "too many constants in one chunk"))
    }

    fn name_const(&mut self, name: &str, line: u32) -> Result<u16, ParseError> {
        self.add_const(Value::str(name), line)
    }

    fn declare_local(&mut self, name: String, line: u32) -> Result<u8, ParseError> {
        if self.locals.len() >= u8::MAX as usize {
            return Err(ParseError::new(line, "too many local variables"));
        }
        let slot = self.locals.len() as u8;
        self.locals.push(Local {
            name,
            depth: self.scope_depth,
        });
        Ok(slot)
    }

    fn resolve_local(&self, name: &str) -> Option<u8> {
        self.locals
            .iter()
            .rposition(|l| l.name == name)
            .map(|i| i as u8)
    }

    fn begin_scope(&mut self) {
        self.scope_depth += 1;
    }

    fn end_scope(&mut self, line: u32) {
        self.scope_depth -= 1;
        while matches!(self.locals.last(), Some(l) if l.depth > self.scope_depth) {
            self.locals.pop();
            self.chunk.emit(Op::Pop, line);
        }
    }

    fn block(&mut self, stmts: &[Stmt]) -> Result<(), ParseError> {
        for stmt in stmts {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn scoped_block(&mut self, stmts: &[Stmt], line: u32) -> Result<(), ParseError> {
        self.begin_scope();
        self.block(stmts)?;
        self.end_scope(line);
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), ParseError> {
        match stmt {
            Stmt::Local { name, value, line } => {
                self.expr(value)?;
                // the value slot becomes the local
                self.declare_local(name.clone(), *line)?;
                Ok(())
            }
            Stmt::Assign {
                target,
                value,
                line,
            } => self.assign(target, *line, |c| c.expr(value)),
            Stmt::ExprStmt(expr) => {
                self.expr(expr)?;
                self.chunk.emit(Op::Pop, expr_line(expr));
                Ok(())
            }
            Stmt::Return { values, line } => {
                if values.len() > u8::MAX as usize {
                    return Err(ParseError::new(*line, "too many return values"));
                }
                for v in values {
                    self.expr(v)?;
                }
                self.chunk.emit(
                    Op::Return {
                        count: values.len() as u8,
                    },
                    *line,
                );
                Ok(())
            }
            Stmt::If {
                arms,
                otherwise,
                line,
            } => {
                let mut end_jumps = Vec::new();
                for (cond, body) in arms {
                    self.expr(cond)?;
                    let skip = self.chunk.emit(Op::JumpIfFalse(0), *line);
                    self.scoped_block(body, *line)?;
                    end_jumps.push(self.chunk.emit(Op::Jump(0), *line));
                    self.chunk.patch_jump_here(skip);
                }
                if let Some(body) = otherwise {
                    self.scoped_block(body, *line)?;
                }
                for j in end_jumps {
                    self.chunk.patch_jump_here(j);
                }
                Ok(())
            }
            Stmt::While { cond, body, line } => {
                let start = self.chunk.ops.len();
                self.expr(cond)?;
                let exit = self.chunk.emit(Op::JumpIfFalse(0), *line);
                self.scoped_block(body, *line)?;
                self.chunk.emit(Op::Jump(start), *line);
                self.chunk.patch_jump_here(exit);
                Ok(())
            }
            Stmt::Function {
                target,
                name,
                params,
                body,
                line,
            } => {
                let func = compile_function(name, params, body, *line)?;
                self.assign(target, *line, |c| {
                    let idx = c.add_const(Value::Func(func.clone()), *line)?;
                    c.chunk.emit(Op::Const(idx), *line);
                    Ok(())
                })
            }
        }
    }

    /// Compile `target = <value>`, where `value` is emitted by the closure
    /// at the right point of the operand order.
    fn assign<F>(&mut self, target: &Target, line: u32, value: F) -> Result<(), ParseError>
    where
        F: FnOnce(&mut Self) -> Result<(), ParseError>,
    {
        match target {
            Target::Name(name) => {
                value(self)?;
                if let Some(slot) = self.resolve_local(name) {
                    self.chunk.emit(Op::SetLocal(slot), line);
                } else {
                    let idx = self.name_const(name, line)?;
                    self.chunk.emit(Op::SetGlobal(idx), line);
                }
                Ok(())
            }
            Target::Field { obj, name } => {
                self.expr(obj)?;
                value(self)?;
                let idx = self.name_const(name, line)?;
                self.chunk.emit(Op::SetField(idx), line);
                Ok(())
            }
        }
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), ParseError> {
        match expr {
            Expr::Nil => {
                self.chunk.emit(Op::Nil, 0);
                Ok(())
            }
            Expr::True => {
                self.chunk.emit(Op::True, 0);
                Ok(())
            }
            Expr::False => {
                self.chunk.emit(Op::False, 0);
                Ok(())
            }
            Expr::Num(n) => {
                let idx = self.add_const(Value::Num(*n), 0)?;
                self.chunk.emit(Op::Const(idx), 0);
                Ok(())
            }
            Expr::Str(s) => {
                let idx = self.add_const(Value::str(s), 0)?;
                self.chunk.emit(Op::Const(idx), 0);
                Ok(())
            }
            Expr::Name(name) => {
                if let Some(slot) = self.resolve_local(name) {
                    self.chunk.emit(Op::GetLocal(slot), 0);
                } else {
                    let idx = self.name_const(name, 0)?;
                    self.chunk.emit(Op::GetGlobal(idx), 0);
                }
                Ok(())
            }
            Expr::Field { obj, name, line } => {
                self.expr(obj)?;
                let idx = self.name_const(name, *line)?;
                self.chunk.emit(Op::GetField(idx), *line);
                Ok(())
            }
            Expr::Call { callee, args, line } => {
                if args.len() > u8::MAX as usize {
                    return Err(ParseError::new(*line, "too many arguments"));
                }
                self.expr(callee)?;
                for a in args {
                    self.expr(a)?;
                }
                self.chunk.emit(
                    Op::Call {
                        argc: args.len() as u8,
                    },
                    *line,
                );
                Ok(())
            }
            Expr::MethodCall {
                recv,
                name,
                args,
                line,
            } => {
                if args.len() >= u8::MAX as usize {
                    return Err(ParseError::new(*line, "too many arguments"));
                }
                self.expr(recv)?;
                for a in args {
                    self.expr(a)?;
                }
                let idx = self.name_const(name, *line)?;
                self.chunk.emit(
                    Op::MethodCall {
                        name: idx,
                        argc: args.len() as u8,
                    },
                    *line,
                );
                Ok(())
            }
            Expr::Table(fields) => {
                self.chunk.emit(Op::NewTable, 0);
                for (key, value) in fields {
                    self.expr(value)?;
                    let idx = self.name_const(key, 0)?;
                    self.chunk.emit(Op::InitField(idx), 0);
                }
                Ok(())
            }
            Expr::Binary { op, lhs, rhs, line } => match op {
                BinOp::And => {
                    self.expr(lhs)?;
                    let skip = self.chunk.emit(Op::JumpIfFalseKeep(0), *line);
                    self.chunk.emit(Op::Pop, *line);
                    self.expr(rhs)?;
                    self.chunk.patch_jump_here(skip);
                    Ok(())
                }
                BinOp::Or => {
                    self.expr(lhs)?;
                    let skip = self.chunk.emit(Op::JumpIfTrueKeep(0), *line);
                    self.chunk.emit(Op::Pop, *line);
                    self.expr(rhs)?;
                    self.chunk.patch_jump_here(skip);
                    Ok(())
                }
                _ => {
                    self.expr(lhs)?;
                    self.expr(rhs)?;
                    let op = match op {
                        BinOp::Add => Op::Add,
                        BinOp::Sub => Op::Sub,
                        BinOp::Mul => Op::Mul,
                        BinOp::Div => Op::Div,
                        BinOp::Mod => Op::Mod,
                        BinOp::Concat => Op::Concat,
                        BinOp::Eq => Op::Eq,
                        BinOp::Ne => Op::Ne,
                        BinOp::Lt => Op::Lt,
                        BinOp::Le => Op::Le,
                        BinOp::Gt => Op::Gt,
                        BinOp::Ge => Op::Ge,
                        BinOp::And | BinOp::Or => unreachable!(),
                    };
                    self.chunk.emit(op, *line);
                    Ok(())
                }
            },
            Expr::Unary { op, expr, line } => {
                self.expr(expr)?;
                let op = match op {
                    UnOp::Neg => Op::Neg,
                    UnOp::Not => Op::Not,
                };
                self.chunk.emit(op, *line);
                Ok(())
            }
        }
    }
}

fn expr_line(expr: &Expr) -> u32 {
    match expr {
        Expr::Call { line, .. }
        | Expr::MethodCall { line, .. }
        | Expr::Binary { line, .. }
        | Expr::Unary { line, .. } => *line,
        _ => 0,
    }
}
