use std::collections::HashMap;
use std::rc::Rc;

use crate::bytecode::{Chunk, Function, Op};
use crate::error::RuntimeError;
use crate::value::{NativeFn, TableRef, Value};

/// Bound on nested script/native call frames; a runaway recursion becomes a
/// script error instead of exhausting the native stack.
const MAX_CALL_DEPTH: usize = 200;

enum Flow {
    Normal,
    Return(Vec<Value>),
}

/// The VM: operand stack, globals, and the native-type dispatch registry.
///
/// Strictly single-threaded and non-reentrant; the embedding host owns it
/// for its whole lifetime and serializes access externally if needed.
pub struct Vm {
    stack: Vec<Value>,
    globals: HashMap<String, Value>,
    /// Type name -> dispatch table. The empty name is the delegation target
    /// for bare pointer values.
    types: HashMap<String, TableRef>,
    call_depth: usize,
}

impl Vm {
    pub fn new() -> Self {
        let mut vm = Self {
            stack: Vec::new(),
            globals: HashMap::new(),
            types: HashMap::new(),
            call_depth: 0,
        };
        vm.install_builtins();
        vm
    }

    fn install_builtins(&mut self) {
        // `error(msg)` raises a script runtime error
        let error_fn: NativeFn = Rc::new(|_vm, args| {
            let msg = args
                .first()
                .and_then(|v| v.coerce_str())
                .unwrap_or_else(|| "error".to_string());
            Err(RuntimeError::new(msg))
        });
        self.globals
            .insert("error".to_string(), Value::Native(error_fn));
    }

    // ---- value stack adapter ----

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Option<Value> {
        self.stack.pop()
    }

    /// Borrow the value `from_top` slots below the stack top (0 = top).
    pub fn peek(&self, from_top: usize) -> Option<&Value> {
        let len = self.stack.len();
        self.stack.get(len.checked_sub(from_top + 1)?)
    }

    /// Borrow the value at an absolute stack index (0 = bottom).
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.stack.get(idx)
    }

    pub fn truncate(&mut self, depth: usize) {
        self.stack.truncate(depth);
    }

    // ---- globals ----

    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    // ---- native-type dispatch registry ----

    /// Register (or replace) the dispatch table for a type name. The empty
    /// name installs the no-name table used by bare pointer values.
    pub fn register_type(&mut self, name: impl Into<String>, table: TableRef) {
        let name = name.into();
        tracing::trace!(type_name = %name, "registered dispatch table");
        self.types.insert(name, table);
    }

    pub fn type_table(&self, name: &str) -> Option<TableRef> {
        self.types.get(name).cloned()
    }

    /// Field resolution with single-level delegation: tables resolve
    /// directly; wrapped objects and bare pointers resolve through their
    /// dispatch table, looked up by name at access time. A missing table or
    /// entry resolves to `Nil`.
    pub fn get_field(&self, value: &Value, name: &str) -> Result<Value, RuntimeError> {
        match value {
            Value::Table(t) => Ok(t.borrow().get(name).unwrap_or(Value::Nil)),
            Value::Object { type_name, .. } => Ok(self
                .types
                .get(type_name.as_ref())
                .and_then(|t| t.borrow().get(name))
                .unwrap_or(Value::Nil)),
            Value::Ptr(_) => Ok(self
                .types
                .get("")
                .and_then(|t| t.borrow().get(name))
                .unwrap_or(Value::Nil)),
            other => Err(RuntimeError::new(format!(
                "attempt to index a {} value",
                other.type_name()
            ))),
        }
    }

    // ---- execution ----

    /// Run a zero-argument chunk under protection.
    pub fn exec(&mut self, func: Rc<Function>) -> Result<(), RuntimeError> {
        self.push(Value::Func(func));
        self.pcall(0, 0)
    }

    /// Protected call. Expects `[callee, a1..aN]` on top of the stack; on
    /// success exactly `nresults` results replace them (padded with `Nil` or
    /// truncated). On failure the stack is restored to its depth below the
    /// callee and the error is returned.
    pub fn pcall(&mut self, argc: usize, nresults: usize) -> Result<(), RuntimeError> {
        let Some(callee_idx) = self.stack.len().checked_sub(argc + 1) else {
            return Err(RuntimeError::new("stack underflow in protected call"));
        };
        match self.call_value(argc, nresults) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.stack.truncate(callee_idx);
                Err(e)
            }
        }
    }

    fn call_value(&mut self, argc: usize, nresults: usize) -> Result<(), RuntimeError> {
        let Some(callee_idx) = self.stack.len().checked_sub(argc + 1) else {
            return Err(RuntimeError::new("stack underflow in call"));
        };
        let callee = self.stack[callee_idx].clone();

        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::new("call stack overflow"));
        }

        match callee {
            Value::Func(func) => {
                // adjust supplied args to the declared arity
                let arity = func.arity as usize;
                if argc < arity {
                    for _ in argc..arity {
                        self.stack.push(Value::Nil);
                    }
                } else {
                    self.stack.truncate(callee_idx + 1 + arity);
                }
                let base = callee_idx + 1;

                self.call_depth += 1;
                let result = self.run(&func, base);
                self.call_depth -= 1;
                let rets = result?;

                self.stack.truncate(callee_idx);
                for i in 0..nresults {
                    self.stack.push(rets.get(i).cloned().unwrap_or(Value::Nil));
                }
                Ok(())
            }
            Value::Native(f) => {
                let args = self.stack.split_off(callee_idx + 1);
                self.stack.truncate(callee_idx);

                self.call_depth += 1;
                let result = f(self, &args);
                self.call_depth -= 1;
                let ret = result?;

                if nresults > 0 {
                    self.stack.push(ret);
                    for _ in 1..nresults {
                        self.stack.push(Value::Nil);
                    }
                }
                Ok(())
            }
            other => Err(RuntimeError::new(format!(
                "attempt to call a {} value",
                other.type_name()
            ))),
        }
    }

    fn run(&mut self, func: &Function, base: usize) -> Result<Vec<Value>, RuntimeError> {
        let chunk = &func.chunk;
        let mut ip = 0usize;
        loop {
            let Some(op) = chunk.ops.get(ip) else {
                // compiler always emits a trailing Return; treat running off
                // the end as returning nothing
                return Ok(Vec::new());
            };
            let line = chunk.lines.get(ip).copied().unwrap_or(0);
            let op = op.clone();
            ip += 1;
            match self.exec_op(op, chunk, base, &mut ip) {
                Ok(Flow::Normal) => {}
                Ok(Flow::Return(vals)) => return Ok(vals),
                Err(e) => return Err(e.with_frame(&func.name, line)),
            }
        }
    }

    fn exec_op(
        &mut self,
        op: Op,
        chunk: &Chunk,
        base: usize,
        ip: &mut usize,
    ) -> Result<Flow, RuntimeError> {
        match op {
            Op::Const(idx) => {
                let v = chunk
                    .consts
                    .get(idx as usize)
                    .cloned()
                    .ok_or_else(|| RuntimeError::new("bad constant index"))?;
                self.stack.push(v);
            }
            Op::Nil => self.stack.push(Value::Nil),
            Op::True => self.stack.push(Value::Bool(true)),
            Op::False => self.stack.push(Value::Bool(false)),
            Op::Pop => {
                self.pop_checked()?;
            }

            Op::GetLocal(slot) => {
                let v = self
                    .stack
                    .get(base + slot as usize)
                    .cloned()
                    .ok_or_else(|| RuntimeError::new("local slot out of range"))?;
                self.stack.push(v);
            }
            Op::SetLocal(slot) => {
                let v = self.pop_checked()?;
                let idx = base + slot as usize;
                if idx >= self.stack.len() {
                    return Err(RuntimeError::new("local slot out of range"));
                }
                self.stack[idx] = v;
            }
            Op::GetGlobal(idx) => {
                let name = self.const_str(chunk, idx)?;
                let v = self.globals.get(name.as_ref()).cloned().unwrap_or(Value::Nil);
                self.stack.push(v);
            }
            Op::SetGlobal(idx) => {
                let name = self.const_str(chunk, idx)?;
                let v = self.pop_checked()?;
                self.globals.insert(name.to_string(), v);
            }

            Op::GetField(idx) => {
                let name = self.const_str(chunk, idx)?;
                let obj = self.pop_checked()?;
                let v = self.get_field(&obj, &name)?;
                self.stack.push(v);
            }
            Op::SetField(idx) => {
                let name = self.const_str(chunk, idx)?;
                let value = self.pop_checked()?;
                let obj = self.pop_checked()?;
                match obj {
                    Value::Table(t) => t.borrow_mut().set(name.to_string(), value),
                    other => {
                        return Err(RuntimeError::new(format!(
                            "attempt to index a {} value",
                            other.type_name()
                        )))
                    }
                }
            }
            Op::InitField(idx) => {
                let name = self.const_str(chunk, idx)?;
                let value = self.pop_checked()?;
                match self.peek(0) {
                    Some(Value::Table(t)) => t.borrow_mut().set(name.to_string(), value),
                    _ => return Err(RuntimeError::new("table constructor corrupted")),
                }
            }
            Op::NewTable => {
                self.stack
                    .push(Value::Table(crate::value::Table::new().into_ref()));
            }

            Op::Call { argc } => {
                self.call_value(argc as usize, 1)?;
            }
            Op::MethodCall { name, argc } => {
                let name = self.const_str(chunk, name)?;
                let argc = argc as usize;
                let Some(recv_idx) = self.stack.len().checked_sub(argc + 1) else {
                    return Err(RuntimeError::new("stack underflow in method call"));
                };
                let recv = self.stack[recv_idx].clone();
                let method = self.get_field(&recv, &name)?;
                // [recv, args..] -> [method, recv, args..]
                self.stack.insert(recv_idx, method);
                self.call_value(argc + 1, 1)?;
            }

            Op::Add => self.arith(|a, b| a + b)?,
            Op::Sub => self.arith(|a, b| a - b)?,
            Op::Mul => self.arith(|a, b| a * b)?,
            Op::Div => self.arith(|a, b| a / b)?,
            Op::Mod => self.arith(|a, b| a % b)?,
            Op::Concat => {
                let rhs = self.pop_checked()?;
                let lhs = self.pop_checked()?;
                let (Some(a), Some(b)) = (lhs.coerce_str(), rhs.coerce_str()) else {
                    let bad = if lhs.coerce_str().is_none() { &lhs } else { &rhs };
                    return Err(RuntimeError::new(format!(
                        "attempt to concatenate a {} value",
                        bad.type_name()
                    )));
                };
                self.stack.push(Value::str(&format!("{}{}", a, b)));
            }
            Op::Eq => {
                let rhs = self.pop_checked()?;
                let lhs = self.pop_checked()?;
                self.stack.push(Value::Bool(lhs == rhs));
            }
            Op::Ne => {
                let rhs = self.pop_checked()?;
                let lhs = self.pop_checked()?;
                self.stack.push(Value::Bool(lhs != rhs));
            }
            Op::Lt => self.compare(|o| o == std::cmp::Ordering::Less)?,
            Op::Le => self.compare(|o| o != std::cmp::Ordering::Greater)?,
            Op::Gt => self.compare(|o| o == std::cmp::Ordering::Greater)?,
            Op::Ge => self.compare(|o| o != std::cmp::Ordering::Less)?,
            Op::Neg => {
                let v = self.pop_checked()?;
                match v.as_num() {
                    Some(n) => self.stack.push(Value::Num(-n)),
                    None => {
                        return Err(RuntimeError::new(format!(
                            "attempt to perform arithmetic on a {} value",
                            v.type_name()
                        )))
                    }
                }
            }
            Op::Not => {
                let v = self.pop_checked()?;
                self.stack.push(Value::Bool(!v.truthy()));
            }

            Op::Jump(target) => *ip = target,
            Op::JumpIfFalse(target) => {
                let c = self.pop_checked()?;
                if !c.truthy() {
                    *ip = target;
                }
            }
            Op::JumpIfFalseKeep(target) => {
                let keep = self
                    .peek(0)
                    .ok_or_else(|| RuntimeError::new("stack underflow"))?;
                if !keep.truthy() {
                    *ip = target;
                }
            }
            Op::JumpIfTrueKeep(target) => {
                let keep = self
                    .peek(0)
                    .ok_or_else(|| RuntimeError::new("stack underflow"))?;
                if keep.truthy() {
                    *ip = target;
                }
            }

            Op::Return { count } => {
                let count = count as usize;
                let Some(at) = self.stack.len().checked_sub(count) else {
                    return Err(RuntimeError::new("stack underflow in return"));
                };
                let vals = self.stack.split_off(at);
                return Ok(Flow::Return(vals));
            }
        }
        Ok(Flow::Normal)
    }

    fn pop_checked(&mut self) -> Result<Value, RuntimeError> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::new("stack underflow"))
    }

    fn const_str(&self, chunk: &Chunk, idx: u16) -> Result<Rc<str>, RuntimeError> {
        match chunk.consts.get(idx as usize) {
            Some(Value::Str(s)) => Ok(s.clone()),
            _ => Err(RuntimeError::new("bad name constant")),
        }
    }

    fn arith(&mut self, f: impl FnOnce(f64, f64) -> f64) -> Result<(), RuntimeError> {
        let rhs = self.pop_checked()?;
        let lhs = self.pop_checked()?;
        match (lhs.as_num(), rhs.as_num()) {
            (Some(a), Some(b)) => {
                self.stack.push(Value::Num(f(a, b)));
                Ok(())
            }
            _ => {
                let bad = if lhs.as_num().is_none() { lhs } else { rhs };
                Err(RuntimeError::new(format!(
                    "attempt to perform arithmetic on a {} value",
                    bad.type_name()
                )))
            }
        }
    }

    fn compare(&mut self, f: impl FnOnce(std::cmp::Ordering) -> bool) -> Result<(), RuntimeError> {
        let rhs = self.pop_checked()?;
        let lhs = self.pop_checked()?;
        let ord = match (&lhs, &rhs) {
            (Value::Num(a), Value::Num(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => None,
        };
        match ord {
            Some(ord) => {
                self.stack.push(Value::Bool(f(ord)));
                Ok(())
            }
            None => Err(RuntimeError::new(format!(
                "attempt to compare {} with {}",
                lhs.type_name(),
                rhs.type_name()
            ))),
        }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
