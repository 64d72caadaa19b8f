use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Runtime value of the scoring language.
///
/// Containers are reference counted so that reading a variable is cheap;
/// mutation goes through `Rc::make_mut`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Num(f64),
    Str(Rc<str>),
    List(Rc<Vec<Value>>),
    Map(Rc<BTreeMap<String, Value>>),
}

/// Fixed per-value overhead charged by the memory meter.
pub const VALUE_OVERHEAD: usize = 16;

impl Value {
    pub fn str(s: impl Into<Rc<str>>) -> Self {
        Value::Str(s.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(items))
    }

    pub fn map(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(Rc::new(entries))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Num(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Elements a builtin has to walk to process this value, without descending
    /// into nested containers.
    pub fn work_units(&self) -> usize {
        match self {
            Value::Nil | Value::Bool(_) | Value::Num(_) => 0,
            Value::Str(s) => s.len() / VALUE_OVERHEAD,
            Value::List(items) => items.len(),
            Value::Map(entries) => entries.len(),
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
        }
    }

    /// Approximate footprint in bytes and nesting depth, walked together so the
    /// meter can reject both in one pass.
    pub fn measure(&self) -> (usize, usize) {
        match self {
            Value::Nil | Value::Bool(_) | Value::Num(_) => (VALUE_OVERHEAD, 0),
            Value::Str(s) => (VALUE_OVERHEAD + s.len(), 0),
            Value::List(items) => {
                let mut bytes = VALUE_OVERHEAD;
                let mut depth = 0;
                for item in items.iter() {
                    let (b, d) = item.measure();
                    bytes = bytes.saturating_add(b);
                    depth = depth.max(d);
                }
                (bytes, depth + 1)
            }
            Value::Map(entries) => {
                let mut bytes = VALUE_OVERHEAD;
                let mut depth = 0;
                for (key, item) in entries.iter() {
                    let (b, d) = item.measure();
                    bytes = bytes.saturating_add(b).saturating_add(key.len());
                    depth = depth.max(d);
                }
                (bytes, depth + 1)
            }
        }
    }

    /// Ordering used by comparisons and `sort`; only numbers with numbers and
    /// strings with strings are comparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Num(a), Value::Num(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Renders numbers without a trailing `.0` when they are integral.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Num(n) => f.write_str(&format_number(*n)),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_nested(f, item)?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, item)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key:?}: ")?;
                    write_nested(f, item)?;
                }
                f.write_str("}")
            }
        }
    }
}

fn write_nested(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Str(s) => write!(f, "{:?}", s.as_ref()),
        other => write!(f, "{other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_numbers_render_without_fraction() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-2.5), "-2.5");
        assert_eq!(Value::list(vec![Value::Num(1.0), Value::str("a")]).to_string(), r#"[1, "a"]"#);
    }

    #[test]
    fn measure_reports_depth_and_bytes() {
        let inner = Value::list(vec![Value::str("abcd")]);
        let outer = Value::list(vec![inner, Value::Nil]);
        let (bytes, depth) = outer.measure();
        assert_eq!(depth, 2);
        assert_eq!(bytes, VALUE_OVERHEAD * 4 + 4);
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.truthy());
        assert!(!Value::str("").truthy());
        assert!(Value::Num(0.5).truthy());
        assert!(!Value::list(vec![]).truthy());
    }
}
