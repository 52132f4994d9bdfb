//! Hierarchical key/value container (§4.1).
//!
//! A [`Store`] is an insertion-ordered mapping from dot-free key segments to
//! [`Value`]s. Dotted paths (`"a.b.c"`) traverse nested `Map` values. The
//! sentinel key `+` holds an inherited super-store consulted on a local
//! lookup miss.
//!
//! Absolute paths (a leading `/`) are honored by simply stripping the
//! slash: `Store` is tree-shaped with no parent pointers, so "absolute"
//! only has meaning relative to whichever store the caller holds — callers
//! that need true root-relative semantics call `insert`/`lookup` on the
//! root store directly, exactly as the evaluator's scope stack does for
//! identifier resolution (§4.3).

use crate::ast::{Ast, BinOp};
use crate::diag::StoreError;
use crate::value::Value;
use indexmap::IndexMap;

pub const SUPER_KEY: &str = "+";

#[derive(Debug, Clone, Default)]
pub struct Store {
    children: IndexMap<String, Value>,
}

impl Store {
    pub fn new() -> Self {
        Self { children: IndexMap::new() }
    }

    /// Creates intermediate `Map`s for missing path segments and inserts
    /// `value` at the final one. A leading `+` on the last segment marks
    /// the insert as append-merge (§4.1).
    pub fn insert(&mut self, path: &str, value: Value) -> Result<(), StoreError> {
        let path = path.strip_prefix('/').unwrap_or(path);
        let segs: Vec<&str> = path.split('.').collect();
        if segs.iter().any(|s| s.is_empty()) {
            return Err(StoreError::EmptySegment(path.to_string()));
        }
        let (last, init) = segs.split_last().expect("split_last on non-empty path");
        let mut cur = self;
        for seg in init {
            cur = cur.child_map_mut(seg)?;
        }
        let (is_append, key) = match last.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, *last),
        };
        if key.is_empty() {
            return Err(StoreError::EmptySegment(path.to_string()));
        }
        cur.set(key, value, is_append);
        Ok(())
    }

    pub fn insert_map(&mut self, path: &str) -> Result<&mut Store, StoreError> {
        self.insert(path, Value::Map(Store::new()))?;
        self.lookup_mut(path).and_then(Value::as_map_mut).ok_or_else(|| StoreError::NotAMap(path.to_string()))
    }

    fn child_map_mut(&mut self, seg: &str) -> Result<&mut Store, StoreError> {
        if seg.is_empty() {
            return Err(StoreError::EmptySegment(seg.to_string()));
        }
        let entry = self.children.entry(seg.to_string()).or_insert_with(|| Value::Map(Store::new()));
        match entry {
            Value::Map(m) => Ok(m),
            _ => Err(StoreError::NotAMap(seg.to_string())),
        }
    }

    fn set(&mut self, key: &str, value: Value, is_append: bool) {
        if is_append {
            if let Some(slot) = self.children.get_mut(key) {
                let existing = std::mem::replace(slot, Value::Integer(0));
                *slot = combine(existing, value);
                return;
            }
        }
        self.children.insert(key.to_string(), value);
    }

    /// Walks a dotted path, consulting the `+` super-store on each local
    /// miss (§4.1). Returns `None` if any intermediate segment is not a
    /// `Map` or the path is entirely unresolved.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let path = path.strip_prefix('/').unwrap_or(path);
        let segs: Vec<&str> = path.split('.').collect();
        let (last, init) = segs.split_last()?;
        let mut cur = self;
        for seg in init {
            cur = cur.get(seg)?.as_map()?;
        }
        cur.get(last)
    }

    pub(crate) fn lookup_mut(&mut self, path: &str) -> Option<&mut Value> {
        let path = path.strip_prefix('/').unwrap_or(path);
        let segs: Vec<&str> = path.split('.').collect();
        let (last, init) = segs.split_last()?;
        let mut cur = self;
        for seg in init {
            cur = cur.children.get_mut(*seg)?.as_map_mut()?;
        }
        cur.children.get_mut(*last)
    }

    /// Direct child lookup with no super-store fallback — used by the `+.`
    /// name-resolution rule (§4.3), which wants the declared super-store
    /// map itself rather than a recursively-resolved value.
    pub(crate) fn local(&self, key: &str) -> Option<&Value> {
        self.children.get(key)
    }

    /// Local-then-super-store lookup of a single non-dotted key.
    fn get(&self, key: &str) -> Option<&Value> {
        if let Some(v) = self.children.get(key) {
            return Some(v);
        }
        match self.children.get(SUPER_KEY) {
            Some(Value::Map(sup)) => sup.get(key),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.children.get_mut(key)
    }

    pub fn contains_local(&self, key: &str) -> bool {
        self.children.contains_key(key)
    }

    /// Deep union with `other`. Conflicting scalar keys: the incoming value
    /// wins unless it was declared with a leading `+` (append-merge rule).
    /// Conflicting `Map` keys recurse.
    pub fn merge(&mut self, other: Store) {
        for (k, incoming) in other.children {
            let (is_append, real_key) = match k.strip_prefix('+') {
                Some(rest) => (true, rest.to_string()),
                None => (false, k),
            };
            if is_append {
                if let Some(slot) = self.children.get_mut(&real_key) {
                    let existing = std::mem::replace(slot, Value::Integer(0));
                    *slot = combine(existing, incoming);
                    continue;
                }
                self.children.insert(real_key, incoming);
                continue;
            }
            match self.children.get_mut(&real_key) {
                Some(Value::Map(existing_map)) => {
                    if let Value::Map(incoming_map) = incoming {
                        existing_map.merge(incoming_map);
                    } else {
                        self.children.insert(real_key, incoming);
                    }
                }
                Some(slot) => {
                    *slot = incoming;
                }
                None => {
                    self.children.insert(real_key, incoming);
                }
            }
        }
    }

    /// For any `Map` whose child `+` itself holds a `Map`, copies each of
    /// that inner map's entries into self wherever self lacks the key.
    /// Recurses first so nested inheritance is itself flattened. Idempotent.
    pub fn flatten(&mut self) {
        let keys: Vec<String> = self.children.keys().cloned().collect();
        for k in &keys {
            if let Some(Value::Map(m)) = self.children.get_mut(k) {
                m.flatten();
            }
        }
        let inherited = match self.children.get(SUPER_KEY) {
            Some(Value::Map(m)) => Some(m.clone()),
            _ => None,
        };
        if let Some(sup) = inherited {
            for (k, v) in sup.children {
                self.children.entry(k).or_insert(v);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Visits every value in the tree exactly once, depth-first. Used by
    /// the fixed-point evaluator and by the ownership invariant test (§8.8).
    pub fn visit_mut(&mut self, f: &mut dyn FnMut(&mut Value)) {
        for (_, v) in self.children.iter_mut() {
            if let Value::Map(m) = v {
                m.visit_mut(f);
            } else {
                f(v);
            }
        }
    }

    /// Visits every `Map` node (this one included), depth-first. Used for
    /// derived-key write-back passes that need to find component maps by
    /// the keys they carry rather than by path.
    pub fn for_each_map_mut(&mut self, f: &mut dyn FnMut(&mut Store)) {
        f(self);
        for (_, v) in self.children.iter_mut() {
            if let Value::Map(m) = v {
                m.for_each_map_mut(f);
            }
        }
    }

    pub fn count_values(&self) -> usize {
        let mut n = 0;
        for (_, v) in self.children.iter() {
            n += 1;
            if let Value::Map(m) = v {
                n += m.count_values();
            }
        }
        n
    }
}

fn combine(existing: Value, incoming: Value) -> Value {
    match (existing, incoming) {
        (Value::Text(a), Value::Text(b)) => Value::Text(format!("{a} {b}")),
        (Value::Integer(a), Value::Integer(b)) => {
            Value::Expr(Ast::Binary(BinOp::Add, Box::new(Ast::Num(a)), Box::new(Ast::Num(b))))
        }
        (Value::Expr(a), Value::Expr(b)) => Value::Expr(Ast::Binary(BinOp::Add, Box::new(a), Box::new(b))),
        (Value::Integer(a), Value::Expr(b)) => {
            Value::Expr(Ast::Binary(BinOp::Add, Box::new(Ast::Num(a)), Box::new(b)))
        }
        (Value::Expr(a), Value::Integer(b)) => {
            Value::Expr(Ast::Binary(BinOp::Add, Box::new(a), Box::new(Ast::Num(b))))
        }
        (Value::Map(mut a), Value::Map(b)) => {
            a.merge(b);
            Value::Map(a)
        }
        (_, incoming) => incoming,
    }
}
