//! Declarative argument parser used by every builtin.
//!
//! `unpack(args, fmt)` walks a format string describing the expected
//! shape of an argument list and returns one [`Slot`] per format item.
//! Lowercase letters evaluate their argument before type-checking;
//! uppercase letters pass the raw form through unevaluated. Consumed
//! values are pinned via [`crate::gc::Gc::ref_value`] for the duration of
//! the call so host code can't observe them being collected out from
//! under it, released again once unpacking returns.

use crate::error::ErrorCode;
use crate::interp::Interp;
use crate::value::{HeapData, HeapId, Value};

#[derive(Debug, Clone)]
pub enum Slot {
    Int(i64),
    Double(f64),
    Bool(bool),
    Ident(HeapId),
    IdentName(String),
    Str(HeapId),
    List(Value),
    Func(HeapId),
    ExtFunc(HeapId),
    Env(HeapId),
    ErrorCode(i32),
    Any(Value),
    Missing,
    Many(Vec<Slot>),
}

impl Slot {
    pub fn as_value(&self) -> Value {
        match self {
            Slot::Int(i) => Value::Int(*i),
            Slot::Double(d) => Value::Double(*d),
            Slot::Bool(b) => Value::Bool(*b),
            Slot::Ident(id) => Value::Id(*id),
            Slot::IdentName(_) => Value::Nil,
            Slot::Str(id) => Value::Str(*id),
            Slot::List(v) => *v,
            Slot::Func(id) => Value::Func(*id),
            Slot::ExtFunc(id) => Value::ExtFunc(*id),
            Slot::Env(id) => Value::Env(*id),
            Slot::ErrorCode(c) => Value::ErrorCode(*c),
            Slot::Any(v) => *v,
            Slot::Missing => Value::Nil,
            Slot::Many(_) => Value::Nil,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Slot::Int(i) => Some(*i),
            Slot::Any(Value::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Slot::Double(d) => Some(*d),
            Slot::Int(i) => Some(*i as f64),
            Slot::Any(Value::Double(d)) => Some(*d),
            Slot::Any(Value::Int(i)) => Some(*i as f64),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    One,
    Optional,
    OneOrMore,
    ZeroOrMore,
}

struct Item {
    codes: Vec<char>,
    modifier: Modifier,
    bang: bool,
}

fn parse_format(fmt: &str) -> Vec<Item> {
    let chars: Vec<char> = fmt.chars().collect();
    let mut items = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        // A leading `?`/`+`/`*` with no preceding code names no
        // particular type: it's a bare repetition over "any".
        let (codes, mut modifier) = if matches!(chars[i], '?' | '+' | '*') {
            let leading = chars[i];
            i += 1;
            (
                vec!['_'],
                match leading {
                    '?' => Modifier::Optional,
                    '+' => Modifier::OneOrMore,
                    '*' => Modifier::ZeroOrMore,
                    _ => unreachable!(),
                },
            )
        } else if chars[i] == '[' {
            let mut group = Vec::new();
            i += 1;
            while i < chars.len() && chars[i] != ']' {
                group.push(chars[i]);
                i += 1;
            }
            i += 1; // skip ']'
            (group, Modifier::One)
        } else {
            let c = chars[i];
            i += 1;
            (vec![c], Modifier::One)
        };
        let mut bang = false;
        while i < chars.len() && matches!(chars[i], '?' | '+' | '*' | '!') {
            match chars[i] {
                '?' => modifier = Modifier::Optional,
                '+' => modifier = Modifier::OneOrMore,
                '*' => modifier = Modifier::ZeroOrMore,
                '!' => bang = true,
                _ => unreachable!(),
            }
            i += 1;
        }
        items.push(Item {
            codes,
            modifier,
            bang,
        });
    }
    items
}

fn matches_one(
    interp: &mut Interp,
    env: HeapId,
    code: char,
    raw: Value,
    bang: bool,
) -> Result<Slot, (ErrorCode, String)> {
    let evaluate = code.is_lowercase();
    let v = if evaluate {
        interp.eval_top(raw, env)?
    } else {
        raw
    };
    let slot = match code.to_ascii_lowercase() {
        'i' => match v {
            Value::Int(i) => Slot::Int(i),
            _ => return Err(type_err("int", v)),
        },
        'd' => match v {
            Value::Double(d) => Slot::Double(d),
            _ => return Err(type_err("double", v)),
        },
        'b' => match v {
            Value::Bool(b) => Slot::Bool(b),
            _ => return Err(type_err("bool", v)),
        },
        'n' => match v {
            Value::Id(id) => {
                if bang {
                    let name = match interp.gc.data(id) {
                        HeapData::Ident { name, .. } => name.to_string(),
                        _ => unreachable!(),
                    };
                    Slot::IdentName(name)
                } else {
                    Slot::Ident(id)
                }
            }
            _ => return Err(type_err("identifier", v)),
        },
        's' => match v {
            Value::Str(id) => Slot::Str(id),
            _ => return Err(type_err("string", v)),
        },
        'c' => match v {
            Value::List(_) | Value::Nil => Slot::List(v),
            _ => return Err(type_err("list", v)),
        },
        'l' => match v {
            Value::Func(id) => Slot::Func(id),
            _ => return Err(type_err("function", v)),
        },
        'p' => match v {
            Value::ExtFunc(id) => Slot::ExtFunc(id),
            _ => return Err(type_err("ext-func", v)),
        },
        'e' => match v {
            Value::Env(id) => Slot::Env(id),
            _ => return Err(type_err("environment", v)),
        },
        'x' => match v {
            Value::ErrorCode(c) => Slot::ErrorCode(c),
            _ => return Err(type_err("errorcode", v)),
        },
        '#' => match v {
            Value::Int(_) | Value::Double(_) => Slot::Any(v),
            _ => return Err(type_err("numeric", v)),
        },
        '.' | '_' => Slot::Any(v),
        _ => {
            return Err((ErrorCode::Api, format!("unpack: unknown format code '{code}'")));
        }
    };
    Ok(slot)
}

/// Try each alternative in a bracket group until one type-checks.
fn matches_group(
    interp: &mut Interp,
    env: HeapId,
    codes: &[char],
    raw: Value,
    bang: bool,
) -> Result<Slot, (ErrorCode, String)> {
    let mut last_err = None;
    for &code in codes {
        match matches_one(interp, env, code, raw, bang) {
            Ok(slot) => return Ok(slot),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or((ErrorCode::Type, "unpack: empty alternative group".into())))
}

/// Parse `args` against `fmt`, evaluating lowercase-coded slots against
/// `env`. Returns one [`Slot`] per format item (in order), matching
/// `+`/`*` groups collapsed into a single [`Slot::Many`].
pub fn unpack(
    interp: &mut Interp,
    args: &[Value],
    env: HeapId,
    fmt: &str,
) -> Result<Vec<Slot>, (ErrorCode, String)> {
    let items = parse_format(fmt);
    let mut out = Vec::new();
    let mut pins = Vec::new();
    let mut ai = 0;
    for item in &items {
        match item.modifier {
            Modifier::One => {
                if ai >= args.len() {
                    return Err((ErrorCode::Match, "unpack: too few arguments".into()));
                }
                let slot = matches_group(interp, env, &item.codes, args[ai], item.bang)?;
                pins.push(interp.gc.ref_value(slot.as_value()));
                out.push(slot);
                ai += 1;
            }
            Modifier::Optional => {
                if ai < args.len() {
                    match matches_group(interp, env, &item.codes, args[ai], item.bang) {
                        Ok(slot) => {
                            pins.push(interp.gc.ref_value(slot.as_value()));
                            out.push(slot);
                            ai += 1;
                        }
                        Err(_) => out.push(Slot::Missing),
                    }
                } else {
                    out.push(Slot::Missing);
                }
            }
            Modifier::OneOrMore | Modifier::ZeroOrMore => {
                let mut many = Vec::new();
                while ai < args.len() {
                    match matches_group(interp, env, &item.codes, args[ai], item.bang) {
                        Ok(slot) => {
                            pins.push(interp.gc.ref_value(slot.as_value()));
                            many.push(slot);
                            ai += 1;
                        }
                        Err(_) => break,
                    }
                }
                if item.modifier == Modifier::OneOrMore && many.is_empty() {
                    return Err((ErrorCode::Match, "unpack: expected one or more".into()));
                }
                out.push(Slot::Many(many));
            }
        }
    }
    if ai != args.len() {
        return Err((ErrorCode::Match, "unpack: too many arguments".into()));
    }
    for h in pins {
        interp.gc.unref(h);
    }
    Ok(out)
}

fn type_err(expected: &str, got: Value) -> (ErrorCode, String) {
    (
        ErrorCode::Type,
        format!("unpack: expected {expected}, got {:?}", got.type_tag()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::Interp;

    #[test]
    fn single_int_round_trips() {
        let mut interp = Interp::new();
        let env = interp.global_env();
        let out = unpack(&mut interp, &[Value::Int(1)], env, "i").unwrap();
        assert_eq!(out[0].as_int(), Some(1));
    }

    #[test]
    fn optional_missing_yields_none() {
        let mut interp = Interp::new();
        let env = interp.global_env();
        let out = unpack(&mut interp, &[], env, "I?").unwrap();
        assert!(matches!(out[0], Slot::Missing));
    }

    #[test]
    fn one_or_more_collects_a_list() {
        let mut interp = Interp::new();
        let env = interp.global_env();
        let out = unpack(
            &mut interp,
            &[Value::Int(1), Value::Int(2), Value::Int(3)],
            env,
            "I+",
        )
        .unwrap();
        match &out[0] {
            Slot::Many(items) => {
                assert_eq!(items.len(), 3);
                assert_eq!(items[2].as_int(), Some(3));
            }
            _ => panic!("expected Many"),
        }
    }

    #[test]
    fn too_many_arguments_is_an_error() {
        let mut interp = Interp::new();
        let env = interp.global_env();
        let err = unpack(&mut interp, &[Value::Int(1), Value::Int(2)], env, "I").unwrap_err();
        assert_eq!(err.0, ErrorCode::Match);
    }

    #[test]
    fn bare_plus_collects_every_remaining_argument() {
        let mut interp = Interp::new();
        let env = interp.global_env();
        let out = unpack(
            &mut interp,
            &[Value::Int(1), Value::Int(2), Value::Int(3)],
            env,
            "+",
        )
        .unwrap();
        match &out[0] {
            Slot::Many(items) => {
                assert_eq!(items.len(), 3);
                assert_eq!(items[0].as_int(), Some(1));
                assert_eq!(items[2].as_int(), Some(3));
            }
            _ => panic!("expected Many"),
        }
    }

    #[test]
    fn bracket_group_accepts_either_alternative() {
        let mut interp = Interp::new();
        let env = interp.global_env();
        let out = unpack(&mut interp, &[Value::Double(1.5)], env, "[ID]").unwrap();
        assert_eq!(out[0].as_double(), Some(1.5));
    }
}
