//! Renders a [`Value`] back into the surface syntax the parser accepts,
//! the inverse operation of [`crate::parser`]. Used by the REPL to print
//! results and by error reporting to render a form in a backtrace.

use ember_core::gc::Gc;
use ember_core::value::{Cons, HeapData, StrStorage, Value};

/// Render `v` to its printed representation. Cyclic list structure is
/// not guarded against: the evaluator never hands the printer a form
/// with a cyclic spine, and a host embedder constructing one by hand is
/// outside this crate's contract.
pub fn print_value(gc: &Gc, v: Value) -> String {
    let mut out = String::new();
    write_value(gc, v, &mut out);
    out
}

fn write_value(gc: &Gc, v: Value, out: &mut String) {
    match v {
        Value::Nil => out.push_str("()"),
        Value::Int(i) => out.push_str(&i.to_string()),
        Value::Double(d) => write_double(d, out),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::UserPtr { tag, payload } => {
            out.push_str(&format!("#<user-ptr:{tag}:{payload:#x}>"))
        }
        Value::TypeCode(t) => out.push_str(&format!("#<type:{t}>")),
        Value::ErrorCode(c) => out.push_str(&format!("#<error-code:{c}>")),
        Value::Id(id) => write_ident(gc, id, out),
        Value::List(_) => write_list(gc, v, out),
        Value::Quote(id) => write_wrapped(gc, "'", id, out),
        Value::Backquote(id) => write_wrapped(gc, "`", id, out),
        Value::Comma(id) => write_wrapped(gc, ",", id, out),
        Value::Splice(id) => write_wrapped(gc, ",@", id, out),
        Value::Str(id) => write_string(gc, id, out),
        Value::Func(_) => out.push_str("#<func>"),
        Value::ExtFunc(id) => match gc.data(id) {
            HeapData::ExtFunc(f) => out.push_str(&format!("#<ext-func:{}>", f.name)),
            _ => out.push_str("#<ext-func>"),
        },
        Value::SpecialForm(id) => match gc.data(id) {
            HeapData::SpecialForm(sf) => out.push_str(&format!("#<special:{}>", sf.name)),
            _ => out.push_str("#<special>"),
        },
        Value::Env(_) => out.push_str("#<env>"),
    }
}

fn write_double(d: f64, out: &mut String) {
    if d.is_nan() {
        // Preserve the sign bit on the way out: `-nan` and `nan` are
        // distinct bit patterns and round-trip through the reader as
        // distinct values (the reader never produces a NaN literal
        // itself, but arithmetic can, and printing is the only way a
        // caller observes the sign).
        out.push_str(if d.is_sign_negative() { "-nan" } else { "nan" });
    } else if d.is_infinite() {
        out.push_str(if d > 0.0 { "inf" } else { "-inf" });
    } else if d.fract() == 0.0 && d.abs() < 1e15 {
        out.push_str(&format!("{d:.1}"));
    } else {
        out.push_str(&format!("{d}"));
    }
}

fn write_ident(gc: &Gc, id: ember_core::value::HeapId, out: &mut String) {
    match gc.data(id) {
        HeapData::Ident { name, .. } => out.push_str(name),
        _ => out.push_str("#<ident>"),
    }
}

fn write_wrapped(gc: &Gc, prefix: &str, id: ember_core::value::HeapId, out: &mut String) {
    out.push_str(prefix);
    if let HeapData::Wrapper(_kind, inner) = gc.data(id) {
        write_value(gc, *inner, out);
    }
}

fn write_list(gc: &Gc, mut v: Value, out: &mut String) {
    out.push('(');
    let mut first = true;
    loop {
        match v {
            Value::Nil => break,
            Value::List(id) => match gc.data(id) {
                HeapData::Cons(Cons { value, next }) => {
                    if !first {
                        out.push(' ');
                    }
                    first = false;
                    write_value(gc, *value, out);
                    v = *next;
                }
                _ => break,
            },
            other => {
                // Dotted tail: a non-nil, non-cons cdr.
                out.push_str(" . ");
                write_value(gc, other, out);
                break;
            }
        }
    }
    out.push(')');
}

fn write_string(gc: &Gc, id: ember_core::value::HeapId, out: &mut String) {
    out.push('"');
    for &b in resolve_str_bytes(gc, id).iter() {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b'\r' => out.push_str("\\r"),
            _ => out.push(b as char),
        }
    }
    out.push('"');
}

/// Resolve a string record's bytes, following a `View` to its flattened
/// `origin` (views never chain, per the core's substring invariant).
fn resolve_str_bytes(gc: &Gc, id: ember_core::value::HeapId) -> Vec<u8> {
    match gc.data(id) {
        HeapData::Str(s) => match &s.storage {
            StrStorage::Owned(bytes) => bytes.to_vec(),
            StrStorage::View { origin, start, len } => match gc.data(*origin) {
                HeapData::Str(origin_str) => match &origin_str.storage {
                    StrStorage::Owned(bytes) => bytes[*start..*start + *len].to_vec(),
                    StrStorage::View { .. } => Vec::new(),
                },
                _ => Vec::new(),
            },
        },
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::interp::Interp;

    #[test]
    fn prints_atoms() {
        let interp = Interp::new();
        assert_eq!(print_value(&interp.gc, Value::Int(42)), "42");
        assert_eq!(print_value(&interp.gc, Value::Double(1.5)), "1.5");
        assert_eq!(print_value(&interp.gc, Value::Bool(true)), "true");
        assert_eq!(print_value(&interp.gc, Value::Nil), "()");
    }

    #[test]
    fn prints_whole_numbers_as_doubles_with_trailing_dot_zero() {
        let interp = Interp::new();
        assert_eq!(print_value(&interp.gc, Value::Double(3.0)), "3.0");
    }

    #[test]
    fn prints_a_list_round_tripping_through_the_parser() {
        let mut interp = Interp::new();
        let form = crate::parser::read_one(&mut interp, "(+ 1 2)").unwrap().unwrap();
        assert_eq!(print_value(&interp.gc, form), "(+ 1 2)");
    }

    #[test]
    fn prints_a_string_with_escapes() {
        let mut interp = Interp::new();
        let form = crate::parser::read_one(&mut interp, r#""a\nb""#).unwrap().unwrap();
        assert_eq!(print_value(&interp.gc, form), r#""a\nb""#);
    }

    #[test]
    fn prints_quote_sugar() {
        let mut interp = Interp::new();
        let form = crate::parser::read_one(&mut interp, "'(a b)").unwrap().unwrap();
        assert_eq!(print_value(&interp.gc, form), "'(a b)");
    }

    #[test]
    fn negative_nan_keeps_its_sign_on_the_way_out() {
        let interp = Interp::new();
        let neg_nan = -f64::NAN;
        assert_eq!(print_value(&interp.gc, Value::Double(neg_nan)), "-nan");
    }
}
