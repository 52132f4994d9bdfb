//! Fixed-point evaluator (§4.3): alternates AST resolution against the
//! store with string interpolation, sweeping until nothing changes.

use crate::diag::Sink;
use crate::store::{Store, SUPER_KEY};
use crate::value::Value;

const INTERP_SITE_LIMIT: usize = 64;

/// Runs sweeps until quiescent or `max_sweeps` is reached. Returns the
/// number of sweeps actually run. Exceeding `max_sweeps` records a fatal
/// diagnostic (SPEC_FULL.md §E) — spec.md argues this cannot happen for a
/// well-formed store, but a malformed one should not hang the process.
pub fn run_fixed_point(root: &mut Store, sink: &mut Sink, max_sweeps: usize) -> usize {
    let mut sweeps = 0;
    loop {
        sweeps += 1;
        let mut changes = Vec::new();
        {
            let mut stack: Vec<&Store> = Vec::new();
            collect_sweep_changes(root, &mut stack, String::new(), sink, &mut changes);
        }
        if changes.is_empty() {
            break;
        }
        for (path, value) in changes {
            if let Some(slot) = root.lookup_mut(&path) {
                *slot = value;
            }
        }
        if sweeps >= max_sweeps {
            sink.fatal("eval", None, format!("evaluator did not reach a fixed point within {max_sweeps} sweeps"));
            break;
        }
    }
    sweeps
}

fn collect_sweep_changes<'a>(
    store: &'a Store,
    stack: &mut Vec<&'a Store>,
    prefix: String,
    sink: &mut Sink,
    changes: &mut Vec<(String, Value)>,
) {
    stack.push(store);
    for (k, v) in store.iter() {
        let path = if prefix.is_empty() { k.to_string() } else { format!("{prefix}.{k}") };
        match v {
            Value::Map(m) => collect_sweep_changes(m, stack, path, sink, changes),
            Value::Expr(ast) => {
                let mut clone = ast.deep_copy();
                {
                    let stack_ref = &stack[..];
                    let here = store;
                    let mut resolver = |name: &str| resolve_name(name, stack_ref, here);
                    clone.resolve_names(&mut resolver);
                }
                if clone.is_defined() {
                    let mut sink_opt = Some(&mut *sink);
                    let n = clone.evaluate_reporting(&mut sink_opt);
                    changes.push((path, Value::Integer(n)));
                }
            }
            Value::Text(s) => {
                if let Some(new_s) = interpolate(s, &stack[..], store, sink) {
                    changes.push((path, Value::Text(new_s)));
                }
            }
            Value::Integer(_) => {}
        }
    }
    stack.pop();
}

fn value_to_int(v: &Value) -> Option<i64> {
    match v {
        Value::Integer(n) => Some(*n),
        Value::Expr(a) if a.is_defined() => Some(a.evaluate()),
        _ => None,
    }
}

/// Resolves an identifier per the four name-resolution rules of §4.3.
fn resolve_value<'a>(name: &str, stack: &[&'a Store], here: &'a Store) -> Option<&'a Value> {
    if let Some(rest) = name.strip_prefix('.') {
        return here.lookup(rest);
    }
    if let Some(rest) = name.strip_prefix("+.") {
        let sup = here.local(SUPER_KEY)?.as_map()?;
        return sup.lookup(rest);
    }
    if let Some(rest) = name.strip_prefix('/') {
        let root = *stack.first()?;
        return root.lookup(rest);
    }
    if let Some(v) = here.lookup(name) {
        return Some(v);
    }
    for frame in stack.iter().rev() {
        if let Some(v) = frame.lookup(name) {
            return Some(v);
        }
    }
    None
}

fn resolve_name(name: &str, stack: &[&Store], here: &Store) -> Option<i64> {
    resolve_value(name, stack, here).and_then(value_to_int)
}

/// Re-scans `s` for `@$(path)` / `@$[fmt](path)` sites until no more of
/// them can be substituted, returning `Some(new_string)` if anything
/// changed this sweep.
fn interpolate(s: &str, stack: &[&Store], here: &Store, sink: &mut Sink) -> Option<String> {
    let mut current = s.to_string();
    let mut any_change = false;
    for _ in 0..INTERP_SITE_LIMIT {
        match interpolate_once(&current, stack, here, sink) {
            Some(next) => {
                any_change = true;
                current = next;
            }
            None => break,
        }
    }
    if any_change {
        Some(current)
    } else {
        None
    }
}

/// Performs one left-to-right pass over `s`, substituting every site whose
/// target currently resolves. Returns `None` if nothing changed.
fn interpolate_once(s: &str, stack: &[&Store], here: &Store, sink: &mut Sink) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    let mut changed = false;
    loop {
        let Some(idx) = rest.find("@$") else {
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..idx]);
        let after = &rest[idx + 2..];

        let (fmt, after_fmt): (Option<&str>, &str) = if let Some(stripped) = after.strip_prefix('[') {
            match stripped.find(']') {
                Some(end) => (Some(&stripped[..end]), &stripped[end + 1..]),
                None => {
                    out.push_str("@$");
                    rest = after;
                    continue;
                }
            }
        } else {
            (None, after)
        };

        let Some(body) = after_fmt.strip_prefix('(') else {
            out.push_str("@$");
            if let Some(f) = fmt {
                out.push('[');
                out.push_str(f);
                out.push(']');
            }
            rest = after_fmt;
            continue;
        };
        let Some(end) = body.find(')') else {
            out.push_str("@$");
            if let Some(f) = fmt {
                out.push('[');
                out.push_str(f);
                out.push(']');
            }
            out.push('(');
            rest = body;
            continue;
        };
        let path = &body[..end];
        let tail = &body[end + 1..];

        match resolve_value(path, stack, here) {
            Some(Value::Text(t)) => {
                out.push_str(t);
                changed = true;
            }
            Some(Value::Integer(n)) => {
                out.push_str(&render(fmt, *n));
                changed = true;
            }
            Some(Value::Expr(a)) if a.is_defined() => {
                let mut sink_opt = Some(&mut *sink);
                let n = a.evaluate_reporting(&mut sink_opt);
                out.push_str(&render(fmt, n));
                changed = true;
            }
            _ => {
                out.push_str("@$");
                if let Some(f) = fmt {
                    out.push('[');
                    out.push_str(f);
                    out.push(']');
                }
                out.push('(');
                out.push_str(path);
                out.push(')');
            }
        }
        rest = tail;
    }
    if changed {
        Some(out)
    } else {
        None
    }
}

/// Renders an integer the way `@$[fmt](path)` interpolation would, for
/// callers that need the same formatting outside of string substitution
/// (the `EXPR`/`VAL`/`STR` write-back in `pipeline.rs`, §6.5).
pub fn format_integer(fmt: Option<&str>, n: i64) -> String {
    render(fmt, n)
}

fn render(fmt: Option<&str>, n: i64) -> String {
    match fmt {
        None => n.to_string(),
        Some(f) => render_printf(f, n),
    }
}

/// Minimal printf-subset formatter: `[0][width]{d,x,X,o,b}` with literal
/// text around the single conversion. Good enough for register-offset and
/// address-literal formatting, which is all §6.4 asks for.
fn render_printf(fmt: &str, n: i64) -> String {
    let Some(pct) = fmt.find('%') else {
        return n.to_string();
    };
    let before = &fmt[..pct];
    let mut chars = fmt[pct + 1..].chars().peekable();
    let zero_pad = chars.next_if_eq(&'0').is_some();
    let mut width_str = String::new();
    while let Some(c) = chars.peek().copied() {
        if c.is_ascii_digit() {
            width_str.push(c);
            chars.next();
        } else {
            break;
        }
    }
    let width: usize = width_str.parse().unwrap_or(0);
    let spec = chars.next().unwrap_or('d');
    let digits = match spec {
        'x' => format!("{n:x}"),
        'X' => format!("{n:X}"),
        'o' => format!("{n:o}"),
        'b' => format!("{n:b}"),
        _ => n.to_string(),
    };
    let padded = if width > digits.len() {
        let pad = width - digits.len();
        if zero_pad {
            format!("{}{digits}", "0".repeat(pad))
        } else {
            format!("{}{digits}", " ".repeat(pad))
        }
    } else {
        digits
    };
    let after: String = chars.collect();
    format!("{before}{padded}{after}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast;

    #[test]
    fn expression_reduces_and_then_interpolates() {
        let mut root = Store::new();
        root.insert("X", Value::Integer(3)).unwrap();
        root.insert("EXPR", Value::Expr(ast::parse("(X+4)*2").unwrap())).unwrap();
        root.insert("MSG", Value::Text("value=@$(.EXPR)".to_string())).unwrap();
        let mut sink = Sink::new();
        run_fixed_point(&mut root, &mut sink, 256);
        assert_eq!(root.lookup("EXPR").and_then(Value::as_int), Some(14));
        assert_eq!(root.lookup("MSG").and_then(Value::as_text), Some("value=14"));
    }

    #[test]
    fn second_sweep_is_a_no_op() {
        let mut root = Store::new();
        root.insert("X", Value::Integer(1)).unwrap();
        root.insert("Y", Value::Expr(ast::parse("X+1").unwrap())).unwrap();
        let mut sink = Sink::new();
        run_fixed_point(&mut root, &mut sink, 256);
        let mut changes = Vec::new();
        collect_sweep_changes(&root, &mut Vec::new(), String::new(), &mut sink, &mut changes);
        assert!(changes.is_empty());
    }

    #[test]
    fn formatted_interpolation() {
        let mut root = Store::new();
        root.insert("BASE", Value::Integer(255)).unwrap();
        root.insert("MSG", Value::Text("@$[%04x](.BASE)".to_string())).unwrap();
        let mut sink = Sink::new();
        run_fixed_point(&mut root, &mut sink, 256);
        assert_eq!(root.lookup("MSG").and_then(Value::as_text), Some("00ff"));
    }
}
