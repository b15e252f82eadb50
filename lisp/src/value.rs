use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::env::Env;
use crate::error::LispError;
use crate::eval::Context;

pub type BuiltinFn = fn(&[Value], &Context) -> Result<Value, LispError>;

/// A value produced by reading or evaluating a form.
#[derive(Clone)]
pub enum Value {
    Nil,
    Boolean(bool),
    Number(f64),
    String(String),
    Keyword(String),
    Symbol(String),
    List(Vec<Value>),
    Vector(Vec<Value>),
    /// Entries in insertion order; keys are unique.
    Map(Vec<(Value, Value)>),
    Atom(Rc<RefCell<Value>>),
    Lambda(Rc<Lambda>),
    Builtin(&'static str, BuiltinFn),
}

/// A closure created by `fn`.
pub struct Lambda {
    pub name: Option<String>,
    pub params: Vec<String>,
    /// Name bound to the remaining arguments after `&`.
    pub rest: Option<String>,
    pub body: Vec<Value>,
    pub env: Env,
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Boolean(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Keyword(_) => "keyword",
            Value::Symbol(_) => "symbol",
            Value::List(_) => "list",
            Value::Vector(_) => "vector",
            Value::Map(_) => "map",
            Value::Atom(_) => "atom",
            Value::Lambda(_) | Value::Builtin(..) => "function",
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Lambda(_) | Value::Builtin(..) | Value::Keyword(_))
    }

    /// Elements of a list, vector or map (as `[k v]` vectors); nil is empty.
    pub fn items(&self) -> Result<Vec<Value>, LispError> {
        match self {
            Value::Nil => Ok(Vec::new()),
            Value::List(items) | Value::Vector(items) => Ok(items.clone()),
            Value::Map(entries) => Ok(entries
                .iter()
                .map(|(k, v)| Value::Vector(vec![k.clone(), v.clone()]))
                .collect()),
            Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
            other => Err(LispError::TypeError {
                expected: "a collection".to_string(),
                got: other.type_name().to_string(),
            }),
        }
    }

    /// Look up `key` in a map.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Readable representation: strings are quoted and escaped.
    pub fn pr_str(&self) -> String {
        let mut out = String::new();
        write_value(self, true, &mut out);
        out
    }
}

/// Plain representation, as produced by `str`: strings are written as is and
/// nil is empty.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => Ok(()),
            Value::String(s) => write!(f, "{}", s),
            other => {
                let mut out = String::new();
                write_value(other, false, &mut out);
                write!(f, "{}", out)
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pr_str())
    }
}

fn write_value(value: &Value, readable: bool, out: &mut String) {
    match value {
        Value::Nil => out.push_str("nil"),
        Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&format_number(*n)),
        Value::String(s) if readable => {
            out.push('"');
            for c in s.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    c => out.push(c),
                }
            }
            out.push('"');
        }
        Value::String(s) => out.push_str(s),
        Value::Keyword(k) => {
            out.push(':');
            out.push_str(k);
        }
        Value::Symbol(s) => out.push_str(s),
        Value::List(items) => write_seq("(", ")", items, readable, out),
        Value::Vector(items) => write_seq("[", "]", items, readable, out),
        Value::Map(entries) => {
            out.push('{');
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(k, readable, out);
                out.push(' ');
                write_value(v, readable, out);
            }
            out.push('}');
        }
        Value::Atom(cell) => {
            out.push_str("#<Atom ");
            write_value(&cell.borrow(), readable, out);
            out.push('>');
        }
        Value::Lambda(lambda) => match &lambda.name {
            Some(name) => {
                out.push_str("#<fn ");
                out.push_str(name);
                out.push('>');
            }
            None => out.push_str("#<fn>"),
        },
        Value::Builtin(name, _) => {
            out.push_str("#<builtin ");
            out.push_str(name);
            out.push('>');
        }
    }
}

fn write_seq(open: &str, close: &str, items: &[Value], readable: bool, out: &mut String) {
    out.push_str(open);
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        write_value(item, readable, out);
    }
    out.push_str(close);
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n == n.floor() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Keyword(a), Value::Keyword(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            // Lists and vectors with equal elements are equal, as in Clojure.
            (Value::List(a) | Value::Vector(a), Value::List(b) | Value::Vector(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| other.get(k) == Some(v))
            }
            (Value::Atom(a), Value::Atom(b)) => Rc::ptr_eq(a, b),
            (Value::Lambda(a), Value::Lambda(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a, _), Value::Builtin(b, _)) => a == b,
            _ => false,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
