//! Tree-walking evaluator for parsed scoring scripts.
//!
//! The interpreter owns every resource check: a step counter bounded by
//! `max_steps`, a wall-clock deadline, an external cancellation flag polled
//! alongside the deadline, and a byte meter covering every variable and
//! every freshly built value.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use super::ast::*;
use super::builtins::{self, CallSite, resolve_index};
use super::error::ScriptError;
use super::value::{VALUE_OVERHEAD, Value};

/// Deepest nesting allowed for lists and maps built at runtime.
pub const MAX_VALUE_DEPTH: usize = 64;

/// How many steps pass between clock and cancellation checks.
const POLL_INTERVAL: u64 = 64;

/// Container elements (or metered bytes / 16) processed per charged step.
/// Builtins and the memory meter walk whole values, so a single statement
/// over a large list costs in proportion to its size.
const ELEMENTS_PER_STEP: usize = 4;

pub const READ_ONLY_INPUTS: [&str; 4] = ["answer", "answers", "question_id", "max_points"];

/// Values handed to a script. Plain data so it can cross into the worker thread.
#[derive(Debug, Clone, Default)]
pub struct ScriptInputs {
    pub answer: String,
    pub answers: BTreeMap<String, String>,
    pub question_id: String,
    pub max_points: f64,
}

/// What a script leaves behind in `score` and `feedback`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOutputs {
    pub score: f64,
    pub feedback: String,
}

#[derive(Debug, Clone, Copy)]
pub struct Budget {
    pub max_steps: u64,
    pub memory_bytes: usize,
    pub deadline: Instant,
}

struct Slot {
    value: Value,
    bytes: usize,
    read_only: bool,
}

enum Flow {
    Normal,
    Break,
    Continue,
    Return,
}

pub struct Interpreter<'c> {
    vars: HashMap<String, Slot>,
    budget: Budget,
    cancel: &'c AtomicBool,
    steps: u64,
    live_bytes: usize,
    peak_bytes: usize,
    line: usize,
}

impl<'c> Interpreter<'c> {
    pub fn new(budget: Budget, cancel: &'c AtomicBool) -> Self {
        Self {
            vars: HashMap::new(),
            budget,
            cancel,
            steps: 0,
            live_bytes: 0,
            peak_bytes: 0,
            line: 0,
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn peak_bytes(&self) -> usize {
        self.peak_bytes
    }

    /// Binds the inputs, runs `program` and reads back the outputs.
    pub fn run(
        &mut self,
        program: &Program,
        inputs: &ScriptInputs,
    ) -> Result<ScriptOutputs, ScriptError> {
        let answers = inputs
            .answers
            .iter()
            .map(|(q, a)| (q.clone(), Value::str(a.as_str())))
            .collect();

        self.bind("answer", Value::str(inputs.answer.as_str()), true)?;
        self.bind("answers", Value::map(answers), true)?;
        self.bind("question_id", Value::str(inputs.question_id.as_str()), true)?;
        self.bind("max_points", Value::Num(inputs.max_points), true)?;
        self.bind("score", Value::Nil, false)?;
        self.bind("feedback", Value::Nil, false)?;

        self.exec_block(&program.body)?;

        let score = match self.vars.get("score").map(|slot| &slot.value) {
            Some(Value::Num(n)) if n.is_finite() => *n,
            Some(Value::Num(_)) => {
                return Err(ScriptError::runtime(self.line, "score is not a finite number"));
            }
            Some(Value::Nil) | None => {
                return Err(ScriptError::runtime(self.line, "script did not set a score"));
            }
            Some(other) => {
                return Err(ScriptError::runtime(
                    self.line,
                    format!("score must be a number, got {}", other.type_name()),
                ));
            }
        };
        let feedback = match self.vars.get("feedback").map(|slot| &slot.value) {
            Some(Value::Nil) | None => String::new(),
            Some(other) => other.to_string(),
        };

        Ok(ScriptOutputs { score, feedback })
    }

    // --- resource accounting ---

    fn tick(&mut self) -> Result<(), ScriptError> {
        self.charge(1)
    }

    /// Spends `units` steps. Clock and cancellation are polled whenever the
    /// counter crosses a poll boundary, and always for expensive charges.
    fn charge(&mut self, units: u64) -> Result<(), ScriptError> {
        if units == 0 {
            return Ok(());
        }
        let before = self.steps;
        self.steps = self.steps.saturating_add(units);
        if self.steps > self.budget.max_steps {
            return Err(ScriptError::StepLimit(self.budget.max_steps));
        }
        if units >= POLL_INTERVAL || before / POLL_INTERVAL != self.steps / POLL_INTERVAL {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(ScriptError::Cancelled);
            }
            if Instant::now() >= self.budget.deadline {
                return Err(ScriptError::Deadline);
            }
        }
        Ok(())
    }

    fn charge_elements(&mut self, elements: usize) -> Result<(), ScriptError> {
        self.charge((elements / ELEMENTS_PER_STEP) as u64)
    }

    fn remaining_bytes(&self) -> usize {
        self.budget.memory_bytes.saturating_sub(self.live_bytes)
    }

    fn call_site(&self) -> CallSite {
        CallSite {
            line: self.line,
            remaining_bytes: self.remaining_bytes(),
            limit_bytes: self.budget.memory_bytes,
        }
    }

    /// Measures a value and rejects it if it is too deep or does not fit
    /// next to what is already live.
    fn admit(&mut self, value: &Value, replacing: usize) -> Result<usize, ScriptError> {
        let (bytes, depth) = value.measure();
        self.charge_elements(bytes / VALUE_OVERHEAD)?;
        if depth > MAX_VALUE_DEPTH {
            return Err(ScriptError::runtime(
                self.line,
                format!("value nested deeper than {MAX_VALUE_DEPTH} levels"),
            ));
        }
        let projected = self
            .live_bytes
            .saturating_sub(replacing)
            .saturating_add(bytes);
        if projected > self.budget.memory_bytes {
            return Err(ScriptError::Memory {
                needed: projected,
                limit: self.budget.memory_bytes,
            });
        }
        self.peak_bytes = self.peak_bytes.max(projected);
        Ok(bytes)
    }

    fn reserve(&self, extra: usize) -> Result<(), ScriptError> {
        if extra > self.remaining_bytes() {
            return Err(ScriptError::Memory {
                needed: self.live_bytes.saturating_add(extra),
                limit: self.budget.memory_bytes,
            });
        }
        Ok(())
    }

    // --- variables ---

    fn bind(&mut self, name: &str, value: Value, read_only: bool) -> Result<(), ScriptError> {
        let bytes = self.admit(&value, 0)? + name.len();
        self.live_bytes += bytes;
        self.vars.insert(
            name.to_string(),
            Slot {
                value,
                bytes,
                read_only,
            },
        );
        Ok(())
    }

    fn store(&mut self, name: &str, value: Value) -> Result<(), ScriptError> {
        let (old_bytes, read_only) = self
            .vars
            .get(name)
            .map(|slot| (slot.bytes, slot.read_only))
            .unwrap_or((0, false));
        if read_only {
            return Err(ScriptError::runtime(
                self.line,
                format!("'{name}' is a read-only input"),
            ));
        }
        let key_bytes = name.len();
        let bytes = self.admit(&value, old_bytes.saturating_sub(key_bytes))?;
        self.live_bytes = self.live_bytes.saturating_sub(old_bytes) + bytes + key_bytes;
        self.vars.insert(
            name.to_string(),
            Slot {
                value,
                bytes: bytes + key_bytes,
                read_only: false,
            },
        );
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<Value, ScriptError> {
        self.vars
            .get(name)
            .map(|slot| slot.value.clone())
            .ok_or_else(|| ScriptError::runtime(self.line, format!("undefined variable '{name}'")))
    }

    // --- statements ---

    fn exec_block(&mut self, body: &[Stmt]) -> Result<Flow, ScriptError> {
        for stmt in body {
            match self.exec(stmt)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<Flow, ScriptError> {
        self.line = stmt.line;
        self.tick()?;

        match &stmt.kind {
            StmtKind::Let(name, expr) => {
                let value = self.eval(expr)?;
                self.store(name, value)?;
            }
            StmtKind::Assign(target, op, expr) => {
                let value = self.eval(expr)?;
                self.assign(target, *op, value)?;
            }
            StmtKind::If {
                branches,
                otherwise,
            } => {
                for (cond, body) in branches {
                    if self.eval(cond)?.truthy() {
                        return self.exec_block(body);
                    }
                }
                if let Some(body) = otherwise {
                    return self.exec_block(body);
                }
            }
            StmtKind::While(cond, body) => loop {
                self.line = stmt.line;
                self.tick()?;
                if !self.eval(cond)?.truthy() {
                    break;
                }
                match self.exec_block(body)? {
                    Flow::Break => break,
                    Flow::Return => return Ok(Flow::Return),
                    Flow::Normal | Flow::Continue => {}
                }
            },
            StmtKind::For(name, iterable, body) => {
                let items: Vec<Value> = match self.eval(iterable)? {
                    Value::List(items) => items.to_vec(),
                    Value::Map(entries) => entries.keys().map(|k| Value::str(k.as_str())).collect(),
                    Value::Str(s) => s.chars().map(|c| Value::str(c.to_string())).collect(),
                    other => {
                        return Err(ScriptError::runtime(
                            stmt.line,
                            format!("cannot iterate over {}", other.type_name()),
                        ));
                    }
                };
                for item in items {
                    self.line = stmt.line;
                    self.tick()?;
                    self.store(name, item)?;
                    match self.exec_block(body)? {
                        Flow::Break => break,
                        Flow::Return => return Ok(Flow::Return),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Return => return Ok(Flow::Return),
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn assign(&mut self, target: &Target, op: AssignOp, value: Value) -> Result<(), ScriptError> {
        if target.path.is_empty() {
            let combined = match op {
                AssignOp::Set => value,
                _ => {
                    let current = self.lookup(&target.name)?;
                    self.binary(compound_op(op), current, value)?
                }
            };
            return self.store(&target.name, combined);
        }

        let mut keys = Vec::with_capacity(target.path.len());
        for index in &target.path {
            keys.push(self.eval(index)?);
        }

        let slot = self.vars.get_mut(&target.name).ok_or_else(|| {
            ScriptError::runtime(self.line, format!("undefined variable '{}'", target.name))
        })?;
        if slot.read_only {
            return Err(ScriptError::runtime(
                self.line,
                format!("'{}' is a read-only input", target.name),
            ));
        }
        // take the root out so the container is uniquely owned while editing it
        let mut root = std::mem::replace(&mut slot.value, Value::Nil);
        let line = self.line;
        let updated = self.update_path(&mut root, &keys, op, value, line);
        let restored = self.store_existing(&target.name, root);
        updated?;
        restored
    }

    /// Re-stores a value taken out of its slot, keeping the slot's key bytes.
    fn store_existing(&mut self, name: &str, value: Value) -> Result<(), ScriptError> {
        let old_bytes = self.vars.get(name).map(|slot| slot.bytes).unwrap_or(0);
        let key_bytes = name.len();
        let bytes = self.admit(&value, old_bytes.saturating_sub(key_bytes))?;
        self.live_bytes = self.live_bytes.saturating_sub(old_bytes) + bytes + key_bytes;
        if let Some(slot) = self.vars.get_mut(name) {
            slot.value = value;
            slot.bytes = bytes + key_bytes;
        }
        Ok(())
    }

    fn update_path(
        &mut self,
        container: &mut Value,
        keys: &[Value],
        op: AssignOp,
        value: Value,
        line: usize,
    ) -> Result<(), ScriptError> {
        let Some((key, rest)) = keys.split_first() else {
            return Ok(());
        };

        let slot: &mut Value = match (container, key) {
            (Value::List(items), Value::Num(i)) => {
                let items = Rc::make_mut(items);
                let idx = resolve_index(items.len(), *i).ok_or_else(|| {
                    ScriptError::runtime(line, format!("list index {i} out of range"))
                })?;
                &mut items[idx]
            }
            (Value::Map(entries), Value::Str(k)) => {
                let entries = Rc::make_mut(entries);
                if rest.is_empty() && op == AssignOp::Set {
                    entries.insert(k.to_string(), value);
                    return Ok(());
                }
                entries
                    .get_mut(&**k)
                    .ok_or_else(|| ScriptError::runtime(line, format!("key {k:?} not found")))?
            }
            (other, key) => {
                return Err(ScriptError::runtime(
                    line,
                    format!(
                        "cannot assign into {} with a {} index",
                        other.type_name(),
                        key.type_name()
                    ),
                ));
            }
        };

        if !rest.is_empty() {
            return self.update_path(slot, rest, op, value, line);
        }
        *slot = match op {
            AssignOp::Set => value,
            _ => {
                let current = std::mem::replace(slot, Value::Nil);
                self.binary(compound_op(op), current, value)?
            }
        };
        Ok(())
    }

    // --- expressions ---

    fn eval(&mut self, expr: &Expr) -> Result<Value, ScriptError> {
        self.tick()?;
        match expr {
            Expr::Literal(lit) => Ok(match lit {
                Literal::Nil => Value::Nil,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Num(n) => Value::Num(*n),
                Literal::Str(s) => Value::str(s.as_str()),
            }),
            Expr::Var(name) => self.lookup(name),
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                let list = Value::list(values);
                self.admit(&list, 0)?;
                Ok(list)
            }
            Expr::Map(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    let key = match self.eval(key)? {
                        Value::Str(s) => s.to_string(),
                        other => {
                            return Err(ScriptError::runtime(
                                self.line,
                                format!("map keys must be strings, got {}", other.type_name()),
                            ));
                        }
                    };
                    let value = self.eval(value)?;
                    map.insert(key, value);
                }
                let map = Value::map(map);
                self.admit(&map, 0)?;
                Ok(map)
            }
            Expr::Unary(op, operand) => {
                let value = self.eval(operand)?;
                match (op, value) {
                    (UnaryOp::Not, v) => Ok(Value::Bool(!v.truthy())),
                    (UnaryOp::Neg, Value::Num(n)) => Ok(Value::Num(-n)),
                    (UnaryOp::Neg, other) => Err(ScriptError::runtime(
                        self.line,
                        format!("cannot negate {}", other.type_name()),
                    )),
                }
            }
            Expr::Logical(op, left, right) => {
                let left = self.eval(left)?.truthy();
                let result = match op {
                    LogicalOp::And => left && self.eval(right)?.truthy(),
                    LogicalOp::Or => left || self.eval(right)?.truthy(),
                };
                Ok(Value::Bool(result))
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.binary(*op, left, right)
            }
            Expr::Index(base, index) => {
                let base = self.eval(base)?;
                let index = self.eval(index)?;
                self.index(base, index)
            }
            Expr::Call(name, args) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                self.charge_elements(values.iter().map(Value::work_units).sum())?;
                let result = builtins::call(name, values, &self.call_site())?;
                self.admit(&result, 0)?;
                Ok(result)
            }
        }
    }

    fn index(&self, base: Value, index: Value) -> Result<Value, ScriptError> {
        match (&base, &index) {
            (Value::List(items), Value::Num(i)) => resolve_index(items.len(), *i)
                .map(|i| items[i].clone())
                .ok_or_else(|| {
                    ScriptError::runtime(self.line, format!("list index {i} out of range"))
                }),
            (Value::Str(s), Value::Num(i)) => {
                let chars: Vec<char> = s.chars().collect();
                resolve_index(chars.len(), *i)
                    .map(|i| Value::str(chars[i].to_string()))
                    .ok_or_else(|| {
                        ScriptError::runtime(self.line, format!("string index {i} out of range"))
                    })
            }
            // missing keys read as nil so `answers["Q9"]` is safe
            (Value::Map(entries), Value::Str(k)) => {
                Ok(entries.get(&**k).cloned().unwrap_or(Value::Nil))
            }
            (b, i) => Err(ScriptError::runtime(
                self.line,
                format!("cannot index {} with {}", b.type_name(), i.type_name()),
            )),
        }
    }

    fn binary(&mut self, op: BinaryOp, left: Value, right: Value) -> Result<Value, ScriptError> {
        use BinaryOp::*;

        let mismatch = |line: usize, verb: &str, l: &Value, r: &Value| {
            ScriptError::runtime(
                line,
                format!("cannot {verb} {} and {}", l.type_name(), r.type_name()),
            )
        };

        let value = match (op, &left, &right) {
            (Add, Value::Num(a), Value::Num(b)) => Value::Num(a + b),
            (Add, Value::Str(a), Value::Str(b)) => {
                self.reserve(a.len() + b.len() + VALUE_OVERHEAD)?;
                let mut joined = String::with_capacity(a.len() + b.len());
                joined.push_str(a);
                joined.push_str(b);
                Value::str(joined)
            }
            (Add, Value::List(a), Value::List(b)) => {
                self.reserve((a.len() + b.len() + 1) * VALUE_OVERHEAD)?;
                let mut joined = a.to_vec();
                joined.extend(b.iter().cloned());
                Value::list(joined)
            }
            (Add, l, r) => return Err(mismatch(self.line, "add", l, r)),

            (Sub, Value::Num(a), Value::Num(b)) => Value::Num(a - b),
            (Mul, Value::Num(a), Value::Num(b)) => Value::Num(a * b),
            (Mul, Value::Str(s), Value::Num(n)) | (Mul, Value::Num(n), Value::Str(s)) => {
                let times = self.repeat_count(*n)?;
                self.reserve(s.len().saturating_mul(times).saturating_add(VALUE_OVERHEAD))?;
                Value::str(s.repeat(times))
            }
            (Mul, Value::List(items), Value::Num(n)) | (Mul, Value::Num(n), Value::List(items)) => {
                let times = self.repeat_count(*n)?;
                self.reserve(
                    items
                        .len()
                        .saturating_mul(times)
                        .saturating_add(1)
                        .saturating_mul(VALUE_OVERHEAD),
                )?;
                let mut out = Vec::with_capacity(items.len() * times);
                for _ in 0..times {
                    out.extend(items.iter().cloned());
                }
                Value::list(out)
            }
            (Div | Rem, Value::Num(_), Value::Num(b)) if *b == 0.0 => {
                return Err(ScriptError::runtime(self.line, "division by zero"));
            }
            (Div, Value::Num(a), Value::Num(b)) => Value::Num(a / b),
            (Rem, Value::Num(a), Value::Num(b)) => Value::Num(a % b),
            (Sub | Mul | Div | Rem, l, r) => {
                return Err(mismatch(self.line, "do arithmetic on", l, r));
            }

            (Eq, l, r) => Value::Bool(l == r),
            (NotEq, l, r) => Value::Bool(l != r),
            (Lt | LtEq | Gt | GtEq, l, r) => {
                let ord = l
                    .compare(r)
                    .ok_or_else(|| mismatch(self.line, "compare", l, r))?;
                Value::Bool(match op {
                    Lt => ord.is_lt(),
                    LtEq => ord.is_le(),
                    Gt => ord.is_gt(),
                    _ => ord.is_ge(),
                })
            }
            (In | NotIn, needle, haystack) => {
                let found = match (needle, haystack) {
                    (Value::Str(n), Value::Str(h)) => h.contains(&**n),
                    (n, Value::List(items)) => items.contains(n),
                    (Value::Str(n), Value::Map(entries)) => entries.contains_key(&**n),
                    (l, r) => return Err(mismatch(self.line, "test membership of", l, r)),
                };
                Value::Bool(if op == In { found } else { !found })
            }
        };
        self.admit(&value, 0)?;
        Ok(value)
    }

    fn repeat_count(&self, n: f64) -> Result<usize, ScriptError> {
        if n < 0.0 || n.fract() != 0.0 || !n.is_finite() {
            return Err(ScriptError::runtime(
                self.line,
                "repetition count must be a non-negative integer",
            ));
        }
        // anything this large fails the memory reservation anyway
        Ok(n.min(usize::MAX as f64) as usize)
    }
}

fn compound_op(op: AssignOp) -> BinaryOp {
    match op {
        AssignOp::Add => BinaryOp::Add,
        AssignOp::Sub => BinaryOp::Sub,
        AssignOp::Mul => BinaryOp::Mul,
        AssignOp::Div | AssignOp::Set => BinaryOp::Div,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parser::parse;
    use std::time::Duration;

    fn budget() -> Budget {
        Budget {
            max_steps: 100_000,
            memory_bytes: 1 << 20,
            deadline: Instant::now() + Duration::from_secs(5),
        }
    }

    fn inputs(answer: &str) -> ScriptInputs {
        ScriptInputs {
            answer: answer.into(),
            answers: BTreeMap::from([
                ("Q1".to_string(), answer.to_string()),
                ("Q2".to_string(), "42".to_string()),
            ]),
            question_id: "Q1".into(),
            max_points: 10.0,
        }
    }

    fn run_with(source: &str, answer: &str, budget: Budget) -> Result<ScriptOutputs, ScriptError> {
        let program = parse(source)?;
        let cancel = AtomicBool::new(false);
        Interpreter::new(budget, &cancel).run(&program, &inputs(answer))
    }

    fn run(source: &str, answer: &str) -> Result<ScriptOutputs, ScriptError> {
        run_with(source, answer, budget())
    }

    #[test]
    fn scores_keyword_presence() {
        let script = r#"
            let hits = 0
            for w in ["cell", "membrane"] {
                if w in lower(answer) { hits += 1 }
            }
            score = max_points * hits / 2
            feedback = "found " + str(hits)
        "#;
        let out = run(script, "The Cell has a MEMBRANE").unwrap();
        assert_eq!(out.score, 10.0);
        assert_eq!(out.feedback, "found 2");
    }

    #[test]
    fn reads_sibling_answers() {
        let out = run("score = num(answers['Q2']) / 42 * max_points", "x").unwrap();
        assert_eq!(out.score, 10.0);
        let missing = run("if answers['Q9'] == nil { score = 1 } else { score = 0 }", "x").unwrap();
        assert_eq!(missing.score, 1.0);
    }

    #[test]
    fn indexed_assignment_updates_nested_values() {
        let script = r#"
            m = {counts: [0, 0]}
            m["counts"][1] += 5
            m["extra"] = 1
            score = m["counts"][-1] + len(m)
        "#;
        assert_eq!(run(script, "").unwrap().score, 7.0);
    }

    #[test]
    fn while_with_break_and_continue() {
        let script = r#"
            i = 0
            total = 0
            while true {
                i += 1
                if i % 2 == 0 { continue }
                if i > 9 { break }
                total += i
            }
            score = total
        "#;
        assert_eq!(run(script, "").unwrap().score, 25.0);
    }

    #[test]
    fn return_stops_early() {
        let out = run("score = 3\nreturn\nscore = 9", "").unwrap();
        assert_eq!(out.score, 3.0);
    }

    #[test]
    fn inputs_are_read_only() {
        let err = run("answer = 'x'\nscore = 1", "").unwrap_err();
        assert!(err.to_string().contains("read-only"));
        assert!(run("answers['Q1'] = 'x'\nscore = 1", "").is_err());
    }

    #[test]
    fn missing_or_non_numeric_score_is_an_error() {
        assert!(run("feedback = 'no score'", "").unwrap_err().to_string().contains("did not set"));
        assert!(run("score = 'ten'", "").unwrap_err().to_string().contains("must be a number"));
    }

    #[test]
    fn step_budget_stops_infinite_loops() {
        let err = run("while true { }", "").unwrap_err();
        assert!(matches!(err, ScriptError::StepLimit(_)));
    }

    #[test]
    fn builtins_over_large_lists_cost_steps() {
        let b = Budget {
            max_steps: 10_000,
            memory_bytes: 8 << 20,
            ..budget()
        };
        let err = run_with("let l = range(100000)\nscore = len(sort(l))", "", b).unwrap_err();
        assert!(matches!(err, ScriptError::StepLimit(_)), "{err:?}");

        let small = run_with("let l = range(100)\nscore = len(sort(l))", "", b).unwrap();
        assert_eq!(small.score, 100.0);
    }

    #[test]
    fn expensive_statements_check_the_deadline_immediately() {
        let b = Budget {
            max_steps: u64::MAX,
            memory_bytes: 8 << 20,
            deadline: Instant::now(),
        };
        // one loop iteration is only a few statement steps
        let err = run_with("let l = range(10000)\nwhile true { l = reverse(l) }", "", b).unwrap_err();
        assert_eq!(err, ScriptError::Deadline);
    }

    #[test]
    fn deadline_stops_long_loops() {
        let b = Budget {
            max_steps: u64::MAX,
            deadline: Instant::now(),
            ..budget()
        };
        let err = run_with("while true { }", "", b).unwrap_err();
        assert_eq!(err, ScriptError::Deadline);
    }

    #[test]
    fn cancellation_flag_is_observed() {
        let program = parse("while true { }").unwrap();
        let cancel = AtomicBool::new(true);
        let b = Budget {
            max_steps: u64::MAX,
            ..budget()
        };
        let err = Interpreter::new(b, &cancel)
            .run(&program, &inputs(""))
            .unwrap_err();
        assert_eq!(err, ScriptError::Cancelled);
    }

    #[test]
    fn string_doubling_hits_memory_limit() {
        let err = run("s = 'x'\nwhile true { s = s + s }", "").unwrap_err();
        assert!(matches!(err, ScriptError::Memory { .. }), "{err:?}");
    }

    #[test]
    fn repetition_is_checked_before_allocating() {
        let err = run("s = 'abc' * 1e15", "").unwrap_err();
        assert!(matches!(err, ScriptError::Memory { .. }));
    }

    #[test]
    fn deeply_nested_values_are_rejected() {
        let err = run("x = []\nwhile true { x = [x] }", "").unwrap_err();
        assert!(err.to_string().contains("nested deeper"));
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        assert!(matches!(
            run("score = 1 / 0", ""),
            Err(ScriptError::Runtime { line: 1, .. })
        ));
    }

    #[test]
    fn raised_errors_keep_their_message() {
        let err = run("error('unsupported format')", "").unwrap_err();
        assert!(err.to_string().contains("unsupported format"));
    }
}
