//! The only functions a scoring script can call.
//!
//! Every builtin is a pure function over [`Value`]s. Nothing here touches
//! files, the network, the clock, the environment or other processes.
//! Builtins that can grow memory check the remaining byte budget before
//! allocating.

use std::collections::BTreeMap;

use super::error::ScriptError;
use super::value::{VALUE_OVERHEAD, Value};

pub const BUILTINS: &[&str] = &[
    "len", "lower", "upper", "trim", "contains", "starts_with", "ends_with", "split", "words",
    "join", "replace", "count", "slice", "num", "str", "abs", "min", "max", "round", "floor",
    "ceil", "sqrt", "pow", "keys", "values", "get", "has", "push", "sort", "reverse", "range",
    "type", "error",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Per-call context: the source line for error messages and the bytes still
/// available to the script.
pub struct CallSite {
    pub line: usize,
    pub remaining_bytes: usize,
    pub limit_bytes: usize,
}

impl CallSite {
    fn err(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::runtime(self.line, message)
    }

    fn reserve(&self, bytes: usize) -> Result<(), ScriptError> {
        if bytes > self.remaining_bytes {
            return Err(ScriptError::Memory {
                needed: self.limit_bytes - self.remaining_bytes + bytes,
                limit: self.limit_bytes,
            });
        }
        Ok(())
    }

    fn arity(&self, name: &str, args: &[Value], min: usize, max: usize) -> Result<(), ScriptError> {
        if args.len() < min || args.len() > max {
            let expected = if min == max {
                format!("{min}")
            } else {
                format!("{min} to {max}")
            };
            return Err(self.err(format!(
                "{name}() takes {expected} argument(s), got {}",
                args.len()
            )));
        }
        Ok(())
    }

    fn text<'v>(&self, name: &str, value: &'v Value) -> Result<&'v str, ScriptError> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(self.err(format!("{name}() expects a string, got {}", other.type_name()))),
        }
    }

    fn number(&self, name: &str, value: &Value) -> Result<f64, ScriptError> {
        match value {
            Value::Num(n) => Ok(*n),
            other => Err(self.err(format!("{name}() expects a number, got {}", other.type_name()))),
        }
    }

    fn list<'v>(&self, name: &str, value: &'v Value) -> Result<&'v [Value], ScriptError> {
        match value {
            Value::List(items) => Ok(items),
            other => Err(self.err(format!("{name}() expects a list, got {}", other.type_name()))),
        }
    }

    fn map<'v>(
        &self,
        name: &str,
        value: &'v Value,
    ) -> Result<&'v BTreeMap<String, Value>, ScriptError> {
        match value {
            Value::Map(entries) => Ok(entries),
            other => Err(self.err(format!("{name}() expects a map, got {}", other.type_name()))),
        }
    }
}

pub fn call(name: &str, args: Vec<Value>, site: &CallSite) -> Result<Value, ScriptError> {
    match name {
        "len" => {
            site.arity(name, &args, 1, 1)?;
            let n = match &args[0] {
                Value::Str(s) => s.chars().count(),
                Value::List(items) => items.len(),
                Value::Map(entries) => entries.len(),
                other => return Err(site.err(format!("len() of {}", other.type_name()))),
            };
            Ok(Value::Num(n as f64))
        }
        "lower" | "upper" | "trim" => {
            site.arity(name, &args, 1, 1)?;
            let s = site.text(name, &args[0])?;
            site.reserve(s.len() + VALUE_OVERHEAD)?;
            Ok(Value::str(match name {
                "lower" => s.to_lowercase(),
                "upper" => s.to_uppercase(),
                _ => s.trim().to_string(),
            }))
        }
        "contains" => {
            site.arity(name, &args, 2, 2)?;
            let found = match (&args[0], &args[1]) {
                (Value::Str(hay), Value::Str(needle)) => hay.contains(&**needle),
                (Value::List(items), item) => items.contains(item),
                (Value::Map(entries), Value::Str(key)) => entries.contains_key(&**key),
                (a, b) => {
                    return Err(site.err(format!(
                        "contains() cannot search {} for {}",
                        a.type_name(),
                        b.type_name()
                    )));
                }
            };
            Ok(Value::Bool(found))
        }
        "starts_with" | "ends_with" => {
            site.arity(name, &args, 2, 2)?;
            let s = site.text(name, &args[0])?;
            let affix = site.text(name, &args[1])?;
            Ok(Value::Bool(if name == "starts_with" {
                s.starts_with(affix)
            } else {
                s.ends_with(affix)
            }))
        }
        "split" => {
            site.arity(name, &args, 1, 2)?;
            let s = site.text(name, &args[0])?;
            let pieces: Vec<&str> = match args.get(1) {
                None => s.split_whitespace().collect(),
                Some(sep) => {
                    let sep = site.text(name, sep)?;
                    if sep.is_empty() {
                        return Err(site.err("split() separator must not be empty"));
                    }
                    site.reserve((s.matches(sep).count() + 1) * VALUE_OVERHEAD + s.len())?;
                    s.split(sep).collect()
                }
            };
            string_list(pieces, site)
        }
        "words" => {
            site.arity(name, &args, 1, 1)?;
            let s = site.text(name, &args[0])?;
            string_list(s.split_whitespace().collect(), site)
        }
        "join" => {
            site.arity(name, &args, 1, 2)?;
            let items = site.list(name, &args[0])?;
            let sep = match args.get(1) {
                Some(sep) => site.text(name, sep)?,
                None => "",
            };
            let rendered: Vec<String> = items.iter().map(Value::to_string).collect();
            let total = rendered.iter().map(String::len).sum::<usize>()
                + sep.len() * rendered.len().saturating_sub(1);
            site.reserve(total + VALUE_OVERHEAD)?;
            Ok(Value::str(rendered.join(sep)))
        }
        "replace" => {
            site.arity(name, &args, 3, 3)?;
            let s = site.text(name, &args[0])?;
            let from = site.text(name, &args[1])?;
            let to = site.text(name, &args[2])?;
            if from.is_empty() {
                return Err(site.err("replace() pattern must not be empty"));
            }
            let grow = s.matches(from).count().saturating_mul(to.len());
            site.reserve(s.len().saturating_add(grow) + VALUE_OVERHEAD)?;
            Ok(Value::str(s.replace(from, to)))
        }
        "count" => {
            site.arity(name, &args, 2, 2)?;
            let n = match (&args[0], &args[1]) {
                (Value::Str(hay), Value::Str(needle)) if !needle.is_empty() => {
                    hay.matches(&**needle).count()
                }
                (Value::List(items), item) => items.iter().filter(|v| *v == item).count(),
                _ => return Err(site.err("count() expects (string, non-empty string) or (list, value)")),
            };
            Ok(Value::Num(n as f64))
        }
        "slice" => {
            site.arity(name, &args, 2, 3)?;
            let start = site.number(name, &args[1])?;
            let end = args.get(2).map(|v| site.number(name, v)).transpose()?;
            match &args[0] {
                Value::Str(s) => {
                    let chars: Vec<char> = s.chars().collect();
                    let (a, b) = slice_bounds(chars.len(), start, end);
                    Ok(Value::str(chars[a..b].iter().collect::<String>()))
                }
                Value::List(items) => {
                    let (a, b) = slice_bounds(items.len(), start, end);
                    Ok(Value::list(items[a..b].to_vec()))
                }
                other => Err(site.err(format!("slice() of {}", other.type_name()))),
            }
        }
        "num" => {
            site.arity(name, &args, 1, 1)?;
            Ok(match &args[0] {
                Value::Num(n) => Value::Num(*n),
                Value::Bool(b) => Value::Num(if *b { 1.0 } else { 0.0 }),
                Value::Str(s) => {
                    let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
                    match cleaned.parse::<f64>() {
                        Ok(n) if n.is_finite() => Value::Num(n),
                        _ => Value::Nil,
                    }
                }
                _ => Value::Nil,
            })
        }
        "str" => {
            site.arity(name, &args, 1, 1)?;
            let rendered = args[0].to_string();
            site.reserve(rendered.len() + VALUE_OVERHEAD)?;
            Ok(Value::str(rendered))
        }
        "abs" | "floor" | "ceil" | "sqrt" => {
            site.arity(name, &args, 1, 1)?;
            let x = site.number(name, &args[0])?;
            let out = match name {
                "abs" => x.abs(),
                "floor" => x.floor(),
                "ceil" => x.ceil(),
                _ if x < 0.0 => return Err(site.err("sqrt() of a negative number")),
                _ => x.sqrt(),
            };
            Ok(Value::Num(out))
        }
        "pow" => {
            site.arity(name, &args, 2, 2)?;
            let base = site.number(name, &args[0])?;
            let exp = site.number(name, &args[1])?;
            Ok(Value::Num(base.powf(exp)))
        }
        "round" => {
            site.arity(name, &args, 1, 2)?;
            let x = site.number(name, &args[0])?;
            let digits = match args.get(1) {
                Some(d) => site.number(name, d)?.clamp(0.0, 12.0) as i32,
                None => 0,
            };
            let factor = 10f64.powi(digits);
            Ok(Value::Num((x * factor).round() / factor))
        }
        "min" | "max" => {
            let pool: &[Value] = match args.as_slice() {
                [Value::List(items)] => items.as_slice(),
                [] => return Err(site.err(format!("{name}() needs at least one value"))),
                many => many,
            };
            let mut best: Option<&Value> = None;
            for candidate in pool {
                best = Some(match best {
                    None => candidate,
                    Some(current) => {
                        let ord = candidate.compare(current).ok_or_else(|| {
                            site.err(format!(
                                "{name}() cannot compare {} and {}",
                                candidate.type_name(),
                                current.type_name()
                            ))
                        })?;
                        let better = if name == "min" { ord.is_lt() } else { ord.is_gt() };
                        if better { candidate } else { current }
                    }
                });
            }
            best.cloned()
                .ok_or_else(|| site.err(format!("{name}() of an empty list")))
        }
        "keys" => {
            site.arity(name, &args, 1, 1)?;
            let entries = site.map(name, &args[0])?;
            Ok(Value::list(entries.keys().map(|k| Value::str(k.as_str())).collect()))
        }
        "values" => {
            site.arity(name, &args, 1, 1)?;
            let entries = site.map(name, &args[0])?;
            Ok(Value::list(entries.values().cloned().collect()))
        }
        "get" => {
            site.arity(name, &args, 2, 3)?;
            let fallback = args.get(2).cloned().unwrap_or(Value::Nil);
            let found = match (&args[0], &args[1]) {
                (Value::Map(entries), Value::Str(key)) => entries.get(&**key).cloned(),
                (Value::List(items), Value::Num(i)) => {
                    resolve_index(items.len(), *i).map(|i| items[i].clone())
                }
                (a, b) => {
                    return Err(site.err(format!(
                        "get() cannot look up {} in {}",
                        b.type_name(),
                        a.type_name()
                    )));
                }
            };
            Ok(found.unwrap_or(fallback))
        }
        "has" => {
            site.arity(name, &args, 2, 2)?;
            let present = match (&args[0], &args[1]) {
                (Value::Map(entries), Value::Str(key)) => entries.contains_key(&**key),
                (Value::List(items), Value::Num(i)) => resolve_index(items.len(), *i).is_some(),
                _ => return Err(site.err("has() expects (map, string) or (list, number)")),
            };
            Ok(Value::Bool(present))
        }
        "push" => {
            site.arity(name, &args, 2, 2)?;
            let mut args = args;
            let item = args.pop().unwrap_or(Value::Nil);
            let Some(Value::List(items)) = args.pop() else {
                return Err(site.err("push() expects a list as its first argument"));
            };
            site.reserve(item.measure().0)?;
            let mut items = items;
            std::rc::Rc::make_mut(&mut items).push(item);
            Ok(Value::List(items))
        }
        "sort" => {
            site.arity(name, &args, 1, 1)?;
            let mut items = site.list(name, &args[0])?.to_vec();
            if items.iter().all(|v| matches!(v, Value::Num(_))) {
                items.sort_by(|a, b| match (a, b) {
                    (Value::Num(x), Value::Num(y)) => x.total_cmp(y),
                    _ => std::cmp::Ordering::Equal,
                });
            } else if items.iter().all(|v| matches!(v, Value::Str(_))) {
                items.sort_by(|a, b| match (a, b) {
                    (Value::Str(x), Value::Str(y)) => x.cmp(y),
                    _ => std::cmp::Ordering::Equal,
                });
            } else {
                return Err(site.err("sort() needs a list of only numbers or only strings"));
            }
            Ok(Value::list(items))
        }
        "reverse" => {
            site.arity(name, &args, 1, 1)?;
            match &args[0] {
                Value::List(items) => Ok(Value::list(items.iter().rev().cloned().collect())),
                Value::Str(s) => Ok(Value::str(s.chars().rev().collect::<String>())),
                other => Err(site.err(format!("reverse() of {}", other.type_name()))),
            }
        }
        "range" => {
            site.arity(name, &args, 1, 3)?;
            let nums = args
                .iter()
                .map(|v| site.number(name, v))
                .collect::<Result<Vec<_>, _>>()?;
            let (start, stop, step) = match nums.as_slice() {
                [stop] => (0.0, *stop, 1.0),
                [start, stop] => (*start, *stop, 1.0),
                [start, stop, step] => (*start, *stop, *step),
                _ => return Err(site.err("range() takes 1 to 3 argument(s)")),
            };
            if step == 0.0 || !step.is_finite() || !start.is_finite() || !stop.is_finite() {
                return Err(site.err("range() needs finite bounds and a non-zero step"));
            }
            let count = ((stop - start) / step).ceil().max(0.0);
            let needed = (count + 1.0) * VALUE_OVERHEAD as f64;
            if needed > site.remaining_bytes as f64 {
                return Err(ScriptError::Memory {
                    needed: (site.limit_bytes - site.remaining_bytes).saturating_add(needed as usize),
                    limit: site.limit_bytes,
                });
            }
            let count = count as usize;
            Ok(Value::list(
                (0..count)
                    .map(|i| Value::Num(start + step * i as f64))
                    .collect(),
            ))
        }
        "type" => {
            site.arity(name, &args, 1, 1)?;
            Ok(Value::str(args[0].type_name()))
        }
        "error" => {
            site.arity(name, &args, 0, 1)?;
            let message = args
                .first()
                .map(Value::to_string)
                .unwrap_or_else(|| "error() called".to_string());
            Err(ScriptError::Raised {
                line: site.line,
                message,
            })
        }
        other => Err(site.err(format!("unknown function '{other}'"))),
    }
}

fn string_list(pieces: Vec<&str>, site: &CallSite) -> Result<Value, ScriptError> {
    let bytes: usize = pieces.iter().map(|p| p.len() + VALUE_OVERHEAD).sum();
    site.reserve(bytes + VALUE_OVERHEAD)?;
    Ok(Value::list(pieces.into_iter().map(Value::str).collect()))
}

/// Resolves a possibly negative index against `len`.
pub fn resolve_index(len: usize, index: f64) -> Option<usize> {
    if index.fract() != 0.0 || !index.is_finite() {
        return None;
    }
    let idx = if index < 0.0 { len as f64 + index } else { index };
    if idx < 0.0 || idx >= len as f64 {
        None
    } else {
        Some(idx as usize)
    }
}

fn slice_bounds(len: usize, start: f64, end: Option<f64>) -> (usize, usize) {
    let clamp = |i: f64| -> usize {
        let i = if i < 0.0 { len as f64 + i } else { i };
        i.clamp(0.0, len as f64) as usize
    };
    let a = clamp(start.trunc());
    let b = end.map(|e| clamp(e.trunc())).unwrap_or(len);
    (a, b.max(a))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> CallSite {
        CallSite {
            line: 1,
            remaining_bytes: 1 << 20,
            limit_bytes: 1 << 20,
        }
    }

    fn s(text: &str) -> Value {
        Value::str(text)
    }

    fn n(x: f64) -> Value {
        Value::Num(x)
    }

    #[test]
    fn string_helpers() {
        assert_eq!(call("lower", vec![s("PaRiS")], &site()).unwrap(), s("paris"));
        assert_eq!(call("len", vec![s("héllo")], &site()).unwrap(), n(5.0));
        assert_eq!(
            call("split", vec![s("a;b;c"), s(";")], &site()).unwrap(),
            Value::list(vec![s("a"), s("b"), s("c")])
        );
        assert_eq!(call("slice", vec![s("abcdef"), n(-3.0)], &site()).unwrap(), s("def"));
        assert_eq!(call("replace", vec![s("a-b"), s("-"), s("+")], &site()).unwrap(), s("a+b"));
    }

    #[test]
    fn num_parses_or_returns_nil() {
        assert_eq!(call("num", vec![s(" 1,234.5 ")], &site()).unwrap(), n(1234.5));
        assert_eq!(call("num", vec![s("abc")], &site()).unwrap(), Value::Nil);
    }

    #[test]
    fn min_max_over_list_or_arguments() {
        let list = Value::list(vec![n(3.0), n(1.0), n(2.0)]);
        assert_eq!(call("min", vec![list.clone()], &site()).unwrap(), n(1.0));
        assert_eq!(call("max", vec![n(1.0), n(9.0)], &site()).unwrap(), n(9.0));
        assert!(call("max", vec![n(1.0), s("x")], &site()).is_err());
    }

    #[test]
    fn range_respects_memory_budget() {
        let tight = CallSite {
            line: 1,
            remaining_bytes: 1024,
            limit_bytes: 1024,
        };
        assert!(matches!(
            call("range", vec![n(1e9)], &tight),
            Err(ScriptError::Memory { .. })
        ));
        assert_eq!(
            call("range", vec![n(1.0), n(4.0)], &site()).unwrap(),
            Value::list(vec![n(1.0), n(2.0), n(3.0)])
        );
    }

    #[test]
    fn sort_rejects_mixed_types() {
        let mixed = Value::list(vec![n(1.0), s("a")]);
        assert!(call("sort", vec![mixed], &site()).is_err());
    }

    #[test]
    fn error_builtin_raises() {
        let err = call("error", vec![s("bad answer")], &site()).unwrap_err();
        assert_eq!(
            err,
            ScriptError::Raised {
                line: 1,
                message: "bad answer".into()
            }
        );
    }

    #[test]
    fn every_listed_builtin_is_dispatched() {
        for name in BUILTINS {
            let result = call(name, vec![], &site());
            if let Err(ScriptError::Runtime { message, .. }) = result {
                assert!(!message.starts_with("unknown function"), "{name} is not wired up");
            }
        }
    }
}
