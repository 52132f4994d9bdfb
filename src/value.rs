//! The tagged-union leaf type stored at every path in a [`crate::store::Store`].

use crate::ast::Ast;
use crate::store::Store;

/// A leaf or interior node of the configuration tree.
///
/// `Map` always owns its children. An `Expr` is replaced in place by an
/// `Integer` once the fixed-point evaluator reduces it (§3.3).
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Text(String),
    Map(Store),
    Expr(Ast),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Store> {
        match self {
            Value::Map(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Store> {
        match self {
            Value::Map(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_expr(&self) -> Option<&Ast> {
        match self {
            Value::Expr(a) => Some(a),
            _ => None,
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Store> for Value {
    fn from(s: Store) -> Self {
        Value::Map(s)
    }
}

impl From<Ast> for Value {
    fn from(a: Ast) -> Self {
        Value::Expr(a)
    }
}
