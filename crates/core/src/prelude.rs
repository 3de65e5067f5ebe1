//! Glue: the special forms and host functions present in every fresh
//! interpreter instance.
//!
//! Deliberately small. Arithmetic here is the handful of operators
//! needed to exercise the evaluator (`+ - * / = < > <= >= not eq?`), the
//! list primitives needed to build and walk program data
//! (`cons car cdr list null? pair?`), and `substr`, which exists
//! specifically to exercise the origin-sharing string invariant; a
//! fuller numeric tower, string library, and I/O surface are
//! host-provided, not part of this module.

use std::rc::Rc;

use crate::env::{self, DefFlags};
use crate::error::ErrorCode;
use crate::eval::{self, Step};
use crate::interp::Interp;
use crate::preprocessor::{list_elems, Instr, Program};
use crate::unpack;
use crate::value::{Closure, HeapData, StrStorage, Value};

pub fn install(interp: &mut Interp) -> Result<(), (ErrorCode, String)> {
    install_special_forms(interp)?;
    install_builtins(interp)?;
    install_error_codes(interp)?;
    Ok(())
}

/// Bind every builtin error code under its name (`EVALUE`, `ENOSYM`, ...)
/// as a read-only global, so `throw`/`catch` clauses can name a code
/// instead of spelling out its integer.
fn install_error_codes(interp: &mut Interp) -> Result<(), (ErrorCode, String)> {
    for &(code, name) in crate::error::builtin_codes() {
        let id = interp.intern.intern(&mut interp.gc, name);
        interp.define_global(id, Value::ErrorCode(code), DefFlags(DefFlags::READONLY))?;
    }
    Ok(())
}

// ---------------------------------------------------------------- special forms

fn install_special_forms(interp: &mut Interp) -> Result<(), (ErrorCode, String)> {
    let if_program = Program {
        root: Instr::seq(0, vec![Instr::expr(1), Instr::expr(2), Instr::maybe(3, Instr::expr(3))]),
        messages: vec![
            "if: malformed".into(),
            "if: missing condition".into(),
            "if: missing then-branch".into(),
            "if: malformed else-branch".into(),
        ],
    };
    interp.define_special("if", Rc::new(sf_if), Some(if_program))?;
    interp.define_special("do", Rc::new(sf_do), None)?;
    interp.define_special("let", Rc::new(sf_let), None)?;
    interp.define_special("fn", Rc::new(sf_fn), None)?;
    interp.define_special("defmacro", Rc::new(sf_defmacro), None)?;
    interp.define_special("quote", Rc::new(sf_quote), None)?;
    interp.define_special("quasiquote", Rc::new(sf_quasiquote), None)?;
    interp.define_special("try", Rc::new(sf_try), None)?;
    interp.define_special("throw", Rc::new(sf_throw), None)?;

    let def_program = Program {
        root: Instr::seq(0, vec![Instr::lit(1), Instr::expr(2), Instr::nil(3)]),
        messages: vec![
            "def: malformed".into(),
            "def: expected a name".into(),
            "def: expected a value".into(),
            "def: too many arguments".into(),
        ],
    };
    interp.define_special("def", Rc::new(sf_def), Some(def_program))?;
    interp.define_special("set!", Rc::new(sf_set), None)?;
    interp.define_special("match", Rc::new(sf_match), None)?;
    Ok(())
}

fn sf_if(interp: &mut Interp, args: Value, env: crate::value::HeapId) -> Step {
    let elems = list_elems(&interp.gc, args);
    if elems.len() < 2 || elems.len() > 3 {
        interp.errors.throw(ErrorCode::Match as i32, "if: expected (if cond then [else])");
        return Step::Value(Value::Nil);
    }
    let cond = match eval::eval_checked(interp, elems[0], env) {
        Some(v) => v,
        None => return Step::Value(Value::Nil),
    };
    if cond.is_truthy() {
        Step::Eval(elems[1], env)
    } else if elems.len() == 3 {
        Step::Eval(elems[2], env)
    } else {
        Step::Value(Value::Nil)
    }
}

fn sf_do(interp: &mut Interp, args: Value, env: crate::value::HeapId) -> Step {
    let elems = list_elems(&interp.gc, args);
    if elems.is_empty() {
        return Step::Value(Value::Nil);
    }
    for form in &elems[..elems.len() - 1] {
        if eval::eval_checked(interp, *form, env).is_none() {
            return Step::Value(Value::Nil);
        }
    }
    Step::Eval(*elems.last().unwrap(), env)
}

/// `(let ((name value) ...) body...)`. Bindings are sequential (each
/// name is visible to the value expressions after it), matching the
/// single-frame `let*` shape most small Lisps settle on.
fn sf_let(interp: &mut Interp, args: Value, env: crate::value::HeapId) -> Step {
    let elems = list_elems(&interp.gc, args);
    if elems.is_empty() {
        interp.errors.throw(ErrorCode::Match as i32, "let: expected a binding list");
        return Step::Value(Value::Nil);
    }
    let bindings = list_elems(&interp.gc, elems[0]);
    let frame = env::push_env(&mut interp.gc, env);
    for binding in bindings {
        let pair = list_elems(&interp.gc, binding);
        if pair.len() != 2 {
            interp.errors.throw(ErrorCode::Match as i32, "let: malformed binding");
            return Step::Value(Value::Nil);
        }
        let name_id = match pair[0] {
            Value::Id(id) => id,
            _ => {
                interp.errors.throw(ErrorCode::Type as i32, "let: binding name must be an identifier");
                return Step::Value(Value::Nil);
            }
        };
        let value = match eval::eval_checked(interp, pair[1], frame) {
            Some(v) => v,
            None => return Step::Value(Value::Nil),
        };
        if interp.throw_or(env::define(&mut interp.gc, frame, name_id, value, DefFlags(0), false, true)).is_none() {
            return Step::Value(Value::Nil);
        }
    }
    let body = &elems[1..];
    if body.is_empty() {
        return Step::Value(Value::Nil);
    }
    for form in &body[..body.len() - 1] {
        if eval::eval_checked(interp, *form, frame).is_none() {
            return Step::Value(Value::Nil);
        }
    }
    Step::Eval(body[body.len() - 1], frame)
}

/// `(fn (params...) body...)`: an anonymous closure capturing `env`.
fn sf_fn(interp: &mut Interp, args: Value, env: crate::value::HeapId) -> Step {
    match make_closure(interp, args, env) {
        Some(func) => Step::Value(func),
        None => Step::Value(Value::Nil),
    }
}

fn make_closure(interp: &mut Interp, args: Value, env: crate::value::HeapId) -> Option<Value> {
    let elems = list_elems(&interp.gc, args);
    if elems.is_empty() {
        interp.errors.throw(ErrorCode::Match as i32, "fn: expected a parameter list");
        return None;
    }
    env::mark_escaped(&mut interp.gc, env);
    let closure = Closure {
        formal_args: elems[0],
        body: elems[1..].to_vec(),
        lexenv: env,
    };
    let id = interp.throw_or(interp.alloc(HeapData::Closure(closure)))?;
    Some(Value::Func(id))
}

/// `(defmacro name (params...) body...)`: installs a closure in the
/// macro namespace rather than the global variable namespace, so
/// `eval_inner`'s macro lookup finds it before treating `name` as an
/// ordinary function call.
fn sf_defmacro(interp: &mut Interp, args: Value, env: crate::value::HeapId) -> Step {
    let elems = list_elems(&interp.gc, args);
    if elems.len() < 2 {
        interp.errors.throw(ErrorCode::Match as i32, "defmacro: expected (defmacro name (params) body...)");
        return Step::Value(Value::Nil);
    }
    let name_id = match elems[0] {
        Value::Id(id) => id,
        _ => {
            interp.errors.throw(ErrorCode::Type as i32, "defmacro: expected a name");
            return Step::Value(Value::Nil);
        }
    };
    env::mark_escaped(&mut interp.gc, env);
    let closure = Closure {
        formal_args: elems[1],
        body: elems[2..].to_vec(),
        lexenv: env,
    };
    let id = match interp.throw_or(interp.alloc(HeapData::Closure(closure))) {
        Some(id) => id,
        None => return Step::Value(Value::Nil),
    };
    if interp
        .throw_or(env::define(&mut interp.gc, interp.macros_env, name_id, Value::Func(id), DefFlags(0), true, true))
        .is_none()
    {
        return Step::Value(Value::Nil);
    }
    Step::Value(Value::Id(name_id))
}

fn sf_quote(interp: &mut Interp, args: Value, _env: crate::value::HeapId) -> Step {
    let elems = list_elems(&interp.gc, args);
    Step::Value(elems.first().copied().unwrap_or(Value::Nil))
}

fn sf_quasiquote(interp: &mut Interp, args: Value, env: crate::value::HeapId) -> Step {
    let elems = list_elems(&interp.gc, args);
    let form = elems.first().copied().unwrap_or(Value::Nil);
    match eval::quasiquote(interp, form, env, 1) {
        Ok(v) => Step::Value(v),
        Err((code, msg)) => {
            interp.errors.throw(code as i32, msg);
            Step::Value(Value::Nil)
        }
    }
}

/// `(try body (catch code err body...)? (finally body...)?)`. Only a
/// `catch` clause whose (evaluated) code operand equals the thrown
/// code is entered; a mismatched clause leaves the error state set for
/// the next one (or for the caller, if none match).
fn sf_try(interp: &mut Interp, args: Value, env: crate::value::HeapId) -> Step {
    let elems = list_elems(&interp.gc, args);
    if elems.is_empty() {
        return Step::Value(Value::Nil);
    }
    let mut result = eval::eval(interp, elems[0], env).unwrap_or(Value::Nil);

    if interp.errors.is_set() {
        let errno = interp.errors.errno();
        let message = interp.errors.message().unwrap_or("").to_string();
        for clause in &elems[1..] {
            let parts = list_elems(&interp.gc, *clause);
            if parts.len() < 3 {
                continue;
            }
            if !matches!(parts[0], Value::Id(id) if id == interp.intern.std_catch) {
                continue;
            }
            // Evaluate the code operand against a clean error state; put
            // the pending error back if it turns out not to match.
            interp.errors.clear();
            let code = eval::eval_checked(interp, parts[1], env).and_then(|v| match v {
                Value::ErrorCode(c) => Some(c),
                Value::Int(i) => Some(i as i32),
                _ => None,
            });
            if code != Some(errno) {
                interp.errors.throw(errno, message.clone());
                continue;
            }

            let frame = env::push_env(&mut interp.gc, env);
            let err_val = interp
                .throw_or(interp.alloc(HeapData::Str(crate::value::SeqStr::owned(message.as_bytes()))))
                .map(Value::Str)
                .unwrap_or(Value::ErrorCode(errno));
            if let Value::Id(err_var) = parts[2] {
                let _ = env::define(&mut interp.gc, frame, err_var, err_val, DefFlags(0), false, true);
            }
            // No body forms: the clause's value is the bound error value.
            let mut out = err_val;
            for form in &parts[3..] {
                match eval::eval_checked(interp, *form, frame) {
                    Some(v) => out = v,
                    None => break,
                }
            }
            result = out;
            break;
        }
    }

    for clause in &elems[1..] {
        let parts = list_elems(&interp.gc, *clause);
        if matches!(parts.first(), Some(Value::Id(id)) if *id == interp.intern.std_finally) {
            let pending = interp
                .errors
                .is_set()
                .then(|| (interp.errors.errno(), interp.errors.message().unwrap_or("").to_string()));
            interp.errors.clear();
            for form in &parts[1..] {
                eval::eval_checked(interp, *form, env);
            }
            if let Some((code, msg)) = pending {
                if !interp.errors.is_set() {
                    interp.errors.throw(code, msg);
                }
            }
        }
    }

    Step::Value(result)
}

fn sf_throw(interp: &mut Interp, args: Value, env: crate::value::HeapId) -> Step {
    let elems = list_elems(&interp.gc, args);
    let code = match elems.first().and_then(|f| eval::eval_checked(interp, *f, env)) {
        Some(Value::ErrorCode(c)) => c,
        Some(Value::Int(i)) => i as i32,
        _ => ErrorCode::Value as i32,
    };
    let message = match elems.get(1).and_then(|f| eval::eval_checked(interp, *f, env)) {
        Some(Value::Str(id)) => str_contents(&interp.gc, id),
        _ => String::new(),
    };
    interp.errors.throw(code, message);
    Step::Value(Value::Nil)
}

/// Resolve a `Str` heap record's bytes to an owned `String`. A `View`'s
/// `origin` always points at an `Owned` record directly (substrings are
/// flattened at construction time), so this never recurses.
fn str_contents(gc: &crate::gc::Gc, id: crate::value::HeapId) -> String {
    let bytes = match gc.data(id) {
        HeapData::Str(s) => match &s.storage {
            StrStorage::Owned(b) => b.to_vec(),
            StrStorage::View { origin, start, len } => match gc.data(*origin) {
                HeapData::Str(o) => match &o.storage {
                    StrStorage::Owned(b) => b[*start..*start + *len].to_vec(),
                    StrStorage::View { .. } => Vec::new(),
                },
                _ => Vec::new(),
            },
        },
        _ => Vec::new(),
    };
    String::from_utf8_lossy(&bytes).into_owned()
}

fn sf_def(interp: &mut Interp, args: Value, env: crate::value::HeapId) -> Step {
    let elems = list_elems(&interp.gc, args);
    if elems.len() != 2 {
        interp.errors.throw(ErrorCode::Match as i32, "def: expected (def name value)");
        return Step::Value(Value::Nil);
    }
    let name_id = match elems[0] {
        Value::Id(id) => id,
        _ => {
            interp.errors.throw(ErrorCode::Type as i32, "def: expected a name");
            return Step::Value(Value::Nil);
        }
    };
    let value = match eval::eval_checked(interp, elems[1], env) {
        Some(v) => v,
        None => return Step::Value(Value::Nil),
    };
    if interp.throw_or(interp.define_global(name_id, value, DefFlags(0))).is_none() {
        return Step::Value(Value::Nil);
    }
    Step::Value(Value::Id(name_id))
}

fn sf_set(interp: &mut Interp, args: Value, env: crate::value::HeapId) -> Step {
    let elems = list_elems(&interp.gc, args);
    if elems.len() != 2 {
        interp.errors.throw(ErrorCode::Match as i32, "set!: expected (set! name value)");
        return Step::Value(Value::Nil);
    }
    let name_id = match elems[0] {
        Value::Id(id) => id,
        _ => {
            interp.errors.throw(ErrorCode::Type as i32, "set!: expected a name");
            return Step::Value(Value::Nil);
        }
    };
    let value = match eval::eval_checked(interp, elems[1], env) {
        Some(v) => v,
        None => return Step::Value(Value::Nil),
    };
    if interp.throw_or(env::set(&mut interp.gc, env, name_id, value)).is_none() {
        return Step::Value(Value::Nil);
    }
    Step::Value(value)
}

/// `(match expr (pattern body...) ...)`. Patterns are raw, unevaluated
/// forms walked structurally by [`crate::eval::match_pattern`]; the
/// first clause whose pattern matches wins.
fn sf_match(interp: &mut Interp, args: Value, env: crate::value::HeapId) -> Step {
    let elems = list_elems(&interp.gc, args);
    if elems.is_empty() {
        return Step::Value(Value::Nil);
    }
    let subject = match eval::eval_checked(interp, elems[0], env) {
        Some(v) => v,
        None => return Step::Value(Value::Nil),
    };
    let wildcard = interp.intern.intern(&mut interp.gc, "_");
    let colon = interp.intern.std_colon;
    for clause in &elems[1..] {
        let parts = list_elems(&interp.gc, *clause);
        if parts.is_empty() {
            continue;
        }
        let mut bindings = Vec::new();
        if eval::match_pattern(&interp.gc, parts[0], subject, wildcard, colon, &mut bindings) {
            let frame = env::push_env(&mut interp.gc, env);
            for (id, value) in bindings {
                let _ = env::define(&mut interp.gc, frame, id, value, DefFlags(0), false, true);
            }
            let body = &parts[1..];
            if body.is_empty() {
                return Step::Value(Value::Nil);
            }
            for form in &body[..body.len() - 1] {
                if eval::eval_checked(interp, *form, frame).is_none() {
                    return Step::Value(Value::Nil);
                }
            }
            return Step::Eval(body[body.len() - 1], frame);
        }
    }
    interp.errors.throw(ErrorCode::Match as i32, "match: no clause matched");
    Step::Value(Value::Nil)
}

// ------------------------------------------------------------------- builtins

fn install_builtins(interp: &mut Interp) -> Result<(), (ErrorCode, String)> {
    interp.define_ext_func("+", Rc::new(ext_add))?;
    interp.define_ext_func("-", Rc::new(ext_sub))?;
    interp.define_ext_func("*", Rc::new(ext_mul))?;
    interp.define_ext_func("/", Rc::new(ext_div))?;
    interp.define_ext_func("=", Rc::new(|i, a| ext_cmp(i, a, std::cmp::Ordering::is_eq)))?;
    interp.define_ext_func("<", Rc::new(|i, a| ext_cmp(i, a, std::cmp::Ordering::is_lt)))?;
    interp.define_ext_func(">", Rc::new(|i, a| ext_cmp(i, a, std::cmp::Ordering::is_gt)))?;
    interp.define_ext_func("<=", Rc::new(|i, a| ext_cmp(i, a, std::cmp::Ordering::is_le)))?;
    interp.define_ext_func(">=", Rc::new(|i, a| ext_cmp(i, a, std::cmp::Ordering::is_ge)))?;
    interp.define_ext_func("not", Rc::new(ext_not))?;
    interp.define_ext_func("eq?", Rc::new(ext_eq))?;
    interp.define_ext_func("cons", Rc::new(ext_cons))?;
    interp.define_ext_func("car", Rc::new(ext_car))?;
    interp.define_ext_func("cdr", Rc::new(ext_cdr))?;
    interp.define_ext_func("list", Rc::new(ext_list))?;
    interp.define_ext_func("null?", Rc::new(ext_null))?;
    interp.define_ext_func("pair?", Rc::new(ext_pair))?;
    interp.define_ext_func("substr", Rc::new(ext_substr))?;
    Ok(())
}

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Double(f64),
}

fn to_num(v: Value) -> Option<Num> {
    match v {
        Value::Int(i) => Some(Num::Int(i)),
        Value::Double(d) => Some(Num::Double(d)),
        _ => None,
    }
}

fn num_value(n: Num) -> Value {
    match n {
        Num::Int(i) => Value::Int(i),
        Num::Double(d) => Value::Double(d),
    }
}

fn num_order(a: Num, b: Num) -> std::cmp::Ordering {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => x.cmp(&y),
        (Num::Int(x), Num::Double(y)) => (x as f64).partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        (Num::Double(x), Num::Int(y)) => x.partial_cmp(&(y as f64)).unwrap_or(std::cmp::Ordering::Equal),
        (Num::Double(x), Num::Double(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
    }
}

fn fold_numeric(
    interp: &mut Interp,
    args: &[Value],
    identity: Num,
    int_op: fn(i64, i64) -> i64,
    f64_op: fn(f64, f64) -> f64,
) -> Value {
    let mut acc = identity;
    for &a in args {
        let n = match to_num(a) {
            Some(n) => n,
            None => {
                interp.errors.throw(ErrorCode::Type as i32, "expected a number");
                return Value::Nil;
            }
        };
        acc = match (acc, n) {
            (Num::Int(x), Num::Int(y)) => Num::Int(int_op(x, y)),
            (Num::Int(x), Num::Double(y)) => Num::Double(f64_op(x as f64, y)),
            (Num::Double(x), Num::Int(y)) => Num::Double(f64_op(x, y as f64)),
            (Num::Double(x), Num::Double(y)) => Num::Double(f64_op(x, y)),
        };
    }
    num_value(acc)
}

fn ext_add(interp: &mut Interp, args: &[Value]) -> Value {
    fold_numeric(interp, args, Num::Int(0), |a, b| a.wrapping_add(b), |a, b| a + b)
}

fn ext_mul(interp: &mut Interp, args: &[Value]) -> Value {
    fold_numeric(interp, args, Num::Int(1), |a, b| a.wrapping_mul(b), |a, b| a * b)
}

fn ext_sub(interp: &mut Interp, args: &[Value]) -> Value {
    if args.is_empty() {
        interp.errors.throw(ErrorCode::Match as i32, "-: expected at least one argument");
        return Value::Nil;
    }
    let first = match to_num(args[0]) {
        Some(n) => n,
        None => {
            interp.errors.throw(ErrorCode::Type as i32, "-: expected a number");
            return Value::Nil;
        }
    };
    if args.len() == 1 {
        return num_value(match first {
            Num::Int(i) => Num::Int(-i),
            Num::Double(d) => Num::Double(-d),
        });
    }
    let mut acc = first;
    for &a in &args[1..] {
        let n = match to_num(a) {
            Some(n) => n,
            None => {
                interp.errors.throw(ErrorCode::Type as i32, "-: expected a number");
                return Value::Nil;
            }
        };
        acc = match (acc, n) {
            (Num::Int(x), Num::Int(y)) => Num::Int(x.wrapping_sub(y)),
            (Num::Int(x), Num::Double(y)) => Num::Double(x as f64 - y),
            (Num::Double(x), Num::Int(y)) => Num::Double(x - y as f64),
            (Num::Double(x), Num::Double(y)) => Num::Double(x - y),
        };
    }
    num_value(acc)
}

fn ext_div(interp: &mut Interp, args: &[Value]) -> Value {
    if args.is_empty() {
        interp.errors.throw(ErrorCode::Match as i32, "/: expected at least one argument");
        return Value::Nil;
    }
    let first = match to_num(args[0]) {
        Some(n) => n,
        None => {
            interp.errors.throw(ErrorCode::Type as i32, "/: expected a number");
            return Value::Nil;
        }
    };
    let (mut acc, divisors): (Num, &[Value]) = if args.len() == 1 {
        (Num::Int(1), &args[..])
    } else {
        (first, &args[1..])
    };
    for &a in divisors {
        let n = match to_num(a) {
            Some(n) => n,
            None => {
                interp.errors.throw(ErrorCode::Type as i32, "/: expected a number");
                return Value::Nil;
            }
        };
        acc = match (acc, n) {
            (Num::Int(_), Num::Int(0)) => {
                interp.errors.throw(ErrorCode::DivZero as i32, "/: division by zero");
                return Value::Nil;
            }
            (Num::Int(x), Num::Int(y)) if x % y == 0 => Num::Int(x / y),
            (Num::Int(x), Num::Int(y)) => Num::Double(x as f64 / y as f64),
            (Num::Int(x), Num::Double(y)) => Num::Double(x as f64 / y),
            (Num::Double(x), Num::Int(y)) => Num::Double(x / y as f64),
            (Num::Double(x), Num::Double(y)) => Num::Double(x / y),
        };
    }
    num_value(acc)
}

fn ext_cmp(interp: &mut Interp, args: &[Value], accept: fn(std::cmp::Ordering) -> bool) -> Value {
    for w in args.windows(2) {
        let a = match to_num(w[0]) {
            Some(n) => n,
            None => {
                interp.errors.throw(ErrorCode::Type as i32, "comparison: expected a number");
                return Value::Nil;
            }
        };
        let b = match to_num(w[1]) {
            Some(n) => n,
            None => {
                interp.errors.throw(ErrorCode::Type as i32, "comparison: expected a number");
                return Value::Nil;
            }
        };
        if !accept(num_order(a, b)) {
            return Value::Bool(false);
        }
    }
    Value::Bool(true)
}

fn ext_not(interp: &mut Interp, args: &[Value]) -> Value {
    let env = interp.global_env();
    let out = match interp.throw_or(unpack::unpack(interp, args, env, ".")) {
        Some(out) => out,
        None => return Value::Nil,
    };
    Value::Bool(!out[0].as_value().is_truthy())
}

fn ext_eq(interp: &mut Interp, args: &[Value]) -> Value {
    let env = interp.global_env();
    let out = match interp.throw_or(unpack::unpack(interp, args, env, "..")) {
        Some(out) => out,
        None => return Value::Nil,
    };
    let (a, b) = (out[0].as_value(), out[1].as_value());
    let eq = match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Double(x), Value::Double(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Nil, Value::Nil) => true,
        (x, y) => x.heap_id().zip(y.heap_id()).is_some_and(|(hx, hy)| hx == hy),
    };
    Value::Bool(eq)
}

fn ext_cons(interp: &mut Interp, args: &[Value]) -> Value {
    let env = interp.global_env();
    let out = match interp.throw_or(unpack::unpack(interp, args, env, "..")) {
        Some(out) => out,
        None => return Value::Nil,
    };
    let id = match interp.throw_or(interp.alloc(HeapData::Cons(crate::value::Cons {
        value: out[0].as_value(),
        next: out[1].as_value(),
    }))) {
        Some(id) => id,
        None => return Value::Nil,
    };
    Value::List(id)
}

fn ext_car(interp: &mut Interp, args: &[Value]) -> Value {
    let env = interp.global_env();
    let out = match interp.throw_or(unpack::unpack(interp, args, env, "C")) {
        Some(out) => out,
        None => return Value::Nil,
    };
    match out[0].as_value() {
        Value::List(id) => match interp.gc.data(id) {
            HeapData::Cons(c) => c.value,
            _ => unreachable!(),
        },
        _ => {
            interp.errors.throw(ErrorCode::Type as i32, "car: expected a non-empty list");
            Value::Nil
        }
    }
}

fn ext_cdr(interp: &mut Interp, args: &[Value]) -> Value {
    let env = interp.global_env();
    let out = match interp.throw_or(unpack::unpack(interp, args, env, "C")) {
        Some(out) => out,
        None => return Value::Nil,
    };
    match out[0].as_value() {
        Value::List(id) => match interp.gc.data(id) {
            HeapData::Cons(c) => c.next,
            _ => unreachable!(),
        },
        _ => {
            interp.errors.throw(ErrorCode::Type as i32, "cdr: expected a non-empty list");
            Value::Nil
        }
    }
}

fn ext_list(interp: &mut Interp, args: &[Value]) -> Value {
    interp.throw_or(eval::build_list(interp, args)).unwrap_or(Value::Nil)
}

fn ext_null(_interp: &mut Interp, args: &[Value]) -> Value {
    Value::Bool(args.first().is_some_and(Value::is_nil))
}

fn ext_pair(_interp: &mut Interp, args: &[Value]) -> Value {
    Value::Bool(matches!(args.first(), Some(Value::List(_))))
}

/// A string record's byte window relative to its ultimate owning
/// `Owned` record: `(origin, absolute_start, len)`. Already-flattened
/// per the `View` invariant ("substring of a substring"), so this
/// never recurses more than one level.
fn str_window(gc: &crate::gc::Gc, id: crate::value::HeapId) -> (crate::value::HeapId, usize, usize) {
    match gc.data(id) {
        HeapData::Str(s) => match &s.storage {
            StrStorage::Owned(bytes) => (id, 0, bytes.len()),
            StrStorage::View { origin, start, len } => (*origin, *start, *len),
        },
        _ => (id, 0, 0),
    }
}

/// `(substr s start len)`: a new string record sharing `s`'s origin
/// bytes rather than copying them ("a string and its substrings
/// share origin").
fn ext_substr(interp: &mut Interp, args: &[Value]) -> Value {
    let env = interp.global_env();
    let out = match interp.throw_or(unpack::unpack(interp, args, env, "sii")) {
        Some(out) => out,
        None => return Value::Nil,
    };
    let id = match out[0].as_value() {
        Value::Str(id) => id,
        _ => unreachable!("unpack format 's' guarantees a Str value"),
    };
    let start = out[1].as_int().unwrap_or(0);
    let len = out[2].as_int().unwrap_or(0);
    let (origin, base_start, total_len) = str_window(&interp.gc, id);
    if start < 0 || len < 0 || (start as usize).saturating_add(len as usize) > total_len {
        interp.errors.throw(ErrorCode::Index as i32, "substr: window out of bounds");
        return Value::Nil;
    }
    let view = crate::value::SeqStr {
        storage: StrStorage::View {
            origin,
            start: base_start + start as usize,
            len: len as usize,
        },
    };
    match interp.throw_or(interp.alloc(HeapData::Str(view))) {
        Some(id) => Value::Str(id),
        None => Value::Nil,
    }
}
