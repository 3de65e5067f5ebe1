//! The evaluator: tail-call trampoline, quasiquotation, and structural
//! pattern matching.
//!
//! `eval` is a `loop` rather than a recursive function. A special form's
//! handler returns a [`Step`]: either a finished [`Value`], or a form and
//! environment to continue with in tail position. The loop keeps
//! rewriting `(form, env)` from `Step::Eval` without growing the Rust
//! call stack, so a `do`/`if`/`fn`-call chain in tail position runs in
//! bounded native stack regardless of how many logical calls deep it is.
//! Only non-tail calls (arguments, non-final body forms) recurse through
//! `eval` directly, and those are bounded by the configured stack limit
//! (see [`crate::config`]).

use crate::env::{self, DefFlags};
use crate::error::ErrorCode;
use crate::interp::Interp;
use crate::preprocessor::{self, list_elems};
use crate::value::{Closure, HeapData, HeapId, Value, WrapperKind};

/// What a special form's handler wants to happen next.
pub enum Step {
    /// The form is fully evaluated; this is its value.
    Value(Value),
    /// Continue the trampoline with this form in this environment,
    /// instead of recursing back into `eval`.
    Eval(Value, HeapId),
}

pub type SpecialFormFn = crate::value::SpecialFormFn;

/// Build a proper list from a slice of values.
pub fn build_list(interp: &mut Interp, items: &[Value]) -> Result<Value, (ErrorCode, String)> {
    let mut tail = Value::Nil;
    for v in items.iter().rev() {
        let id = interp.alloc(HeapData::Cons(crate::value::Cons {
            value: *v,
            next: tail,
        }))?;
        tail = Value::List(id);
    }
    Ok(tail)
}

fn wrap(interp: &mut Interp, kind: WrapperKind, inner: Value) -> Result<Value, (ErrorCode, String)> {
    let id = interp.alloc(HeapData::Wrapper(kind, inner))?;
    Ok(match kind {
        WrapperKind::Quote => Value::Quote(id),
        WrapperKind::Backquote => Value::Backquote(id),
        WrapperKind::Comma => Value::Comma(id),
        WrapperKind::Splice => Value::Splice(id),
    })
}

fn unwrap(interp: &Interp, id: HeapId) -> Value {
    match interp.gc.data(id) {
        HeapData::Wrapper(_, inner) => *inner,
        _ => unreachable!("wrapper variant must hold HeapData::Wrapper"),
    }
}

/// Evaluate `form` in `env`. Every call here (other than the tail-step
/// rewrites inside the trampoline itself) consumes one unit of the
/// configured stack budget, so a non-tail-recursive user function still
/// fails with `ESTACK` instead of overflowing the native stack; a form in
/// proper tail position never reaches this accounting at all, since the
/// trampoline in [`eval_inner`] rewrites `(form, env)` in place.
pub fn eval(interp: &mut Interp, form: Value, env: HeapId) -> Result<Value, (ErrorCode, String)> {
    interp.stack_depth += 1;
    if interp.stack_depth > interp.config.stack_limit {
        interp.stack_depth -= 1;
        interp.errors.throw(ErrorCode::Stack as i32, "stack limit exceeded");
        return Ok(Value::Nil);
    }
    interp.active_envs.push(env);
    interp.active_forms.push(form);
    let result = eval_inner(interp, form, env);
    interp.active_forms.pop();
    interp.active_envs.pop();
    interp.stack_depth -= 1;
    // Every evaluator-internal Result collapses into the thrown-error
    // state machine here, so `try`/`catch` can observe it regardless of
    // which helper detected it (unbound symbol, arity mismatch, ...).
    Ok(interp.throw_or(result).unwrap_or(Value::Nil))
}

/// Point the innermost [`Interp::active_envs`] entry at `env`. Called
/// whenever the trampoline below rewrites its local `env` in place, so the
/// GC root set tracks the tail position currently being evaluated rather
/// than only the frame `eval` was first entered with.
fn retarget_active_env(interp: &mut Interp, env: HeapId) {
    if let Some(top) = interp.active_envs.last_mut() {
        *top = env;
    }
}

/// Point the innermost [`Interp::active_forms`] entry at `form`, the
/// `active_forms` counterpart to [`retarget_active_env`].
fn retarget_active_form(interp: &mut Interp, form: Value) {
    if let Some(top) = interp.active_forms.last_mut() {
        *top = form;
    }
}

fn eval_inner(interp: &mut Interp, mut form: Value, mut env: HeapId) -> Result<Value, (ErrorCode, String)> {
    loop {
        if interp.errors.is_set() {
            return Ok(Value::Nil);
        }
        match form {
            Value::Id(id) => return env::get(&interp.gc, env, id),
            Value::Quote(id) => return Ok(unwrap(interp, id)),
            Value::Backquote(id) => {
                let inner = unwrap(interp, id);
                return quasiquote(interp, inner, env, 1);
            }
            Value::Comma(_) | Value::Splice(_) => {
                return Err((
                    ErrorCode::Eval,
                    "comma/splice used outside quasiquote".into(),
                ));
            }
            Value::List(id) => {
                let cons = match interp.gc.data(id) {
                    HeapData::Cons(c) => (c.value, c.next),
                    _ => unreachable!("Value::List always points at a Cons"),
                };
                let (op_form, args) = cons;

                if let Value::Id(op_id) = op_form {
                    if let Some(macro_env) = env::lookup(&interp.gc, interp.macros_env, op_id) {
                        let macro_val = env::get(&interp.gc, macro_env, op_id)?;
                        if let Value::Func(mid) = macro_val {
                            let expansion = preprocessor::expand(interp, mid, form, args, env)?;
                            form = expansion;
                            continue;
                        }
                    }
                    if let Some(_owner) = env::lookup(&interp.gc, interp.special_env, op_id) {
                        let special_val = env::get(&interp.gc, interp.special_env, op_id)?;
                        if let Value::SpecialForm(sid) = special_val {
                            let (handler, program) = match interp.gc.data(sid) {
                                HeapData::SpecialForm(sf) => (sf.handler.clone(), sf.preprocessor.is_some()),
                                _ => unreachable!(),
                            };
                            if program {
                                if let HeapData::SpecialForm(sf) = interp.gc.data(sid) {
                                    if let Some(p) = &sf.preprocessor {
                                        preprocessor::validate(&interp.gc, p, args)?;
                                    }
                                }
                            }
                            match handler(interp, args, env) {
                                Step::Value(v) => return Ok(v),
                                Step::Eval(f, e) => {
                                    if !interp.config.tail_call_elimination {
                                        return eval(interp, f, e);
                                    }
                                    form = f;
                                    env = e;
                                    retarget_active_env(interp, env);
                                    retarget_active_form(interp, form);
                                    continue;
                                }
                            }
                        }
                    }
                }

                let func = eval(interp, op_form, env)?;
                if interp.errors.is_set() {
                    return Ok(Value::Nil);
                }
                // `func` and each evaluated argument are fresh values that
                // may not (yet) be reachable from any root other than this
                // local `Vec` — pin them for the stretch between "done
                // evaluating" and "bound into the callee's frame" so an
                // allocation triggered by evaluating a later argument, or by
                // `apply`'s own frame construction, can't sweep an earlier
                // one out from under it.
                let func_pin = interp.gc.ref_value(func);
                let arg_forms = list_elems(&interp.gc, args);
                let mut evaluated = Vec::with_capacity(arg_forms.len());
                let mut arg_pins = Vec::with_capacity(arg_forms.len());
                for a in arg_forms {
                    let v = eval(interp, a, env)?;
                    if interp.errors.is_set() {
                        interp.gc.unref(func_pin);
                        for p in arg_pins {
                            interp.gc.unref(p);
                        }
                        return Ok(Value::Nil);
                    }
                    arg_pins.push(interp.gc.ref_value(v));
                    evaluated.push(v);
                }
                let step = apply(interp, func, evaluated);
                interp.gc.unref(func_pin);
                for p in arg_pins {
                    interp.gc.unref(p);
                }
                match step? {
                    Step::Value(v) => return Ok(v),
                    Step::Eval(f, e) => {
                        if !interp.config.tail_call_elimination {
                            return eval(interp, f, e);
                        }
                        form = f;
                        env = e;
                        retarget_active_env(interp, env);
                        retarget_active_form(interp, form);
                        continue;
                    }
                }
            }
            // Immediates and every other heap-backed variant (strings,
            // functions, envs, ...) evaluate to themselves.
            _ => return Ok(form),
        }
    }
}

/// Evaluate `form`, returning `None` (rather than a propagated `Result`)
/// if doing so set `interp.errors`. Special form handlers can't return
/// `Result` (see [`crate::value::SpecialFormFn`]), so this is the
/// idiomatic shape for "evaluate this non-tail sub-form, bail out of the
/// handler if it threw."
pub fn eval_checked(interp: &mut Interp, form: Value, env: HeapId) -> Option<Value> {
    let v = eval(interp, form, env).unwrap_or(Value::Nil);
    if interp.errors.is_set() {
        None
    } else {
        Some(v)
    }
}

/// Call `func` with already-evaluated `args`. Returns a [`Step`] rather
/// than a `Value` so a closure call's final body form lands in the
/// caller's trampoline instead of recursing.
pub fn apply(interp: &mut Interp, func: Value, args: Vec<Value>) -> Result<Step, (ErrorCode, String)> {
    match func {
        Value::Func(id) => {
            let closure: Closure = match interp.gc.data(id) {
                HeapData::Closure(c) => c.clone(),
                _ => unreachable!(),
            };
            let frame = bind_args(interp, &closure, &args)?;
            if closure.body.is_empty() {
                return Ok(Step::Value(Value::Nil));
            }
            for form in &closure.body[..closure.body.len() - 1] {
                eval(interp, *form, frame)?;
                if interp.errors.is_set() {
                    return Ok(Step::Value(Value::Nil));
                }
            }
            Ok(Step::Eval(*closure.body.last().unwrap(), frame))
        }
        Value::ExtFunc(id) => {
            let handler = match interp.gc.data(id) {
                HeapData::ExtFunc(f) => f.handler.clone(),
                _ => unreachable!(),
            };
            Ok(Step::Value(handler(interp, &args)))
        }
        _ => Err((ErrorCode::Type, "apply: value is not callable".into())),
    }
}

/// Bind `args` against `closure.formal_args`: a proper list of
/// identifiers, optionally ending in `: rest` (the dotted-tail
/// binding, using the pre-interned `:` identifier) to collect any
/// remaining arguments into a list bound to `rest`.
fn bind_args(interp: &mut Interp, closure: &Closure, args: &[Value]) -> Result<HeapId, (ErrorCode, String)> {
    let frame = env::push_env(&mut interp.gc, closure.lexenv);
    let colon = interp.intern.std_colon;
    let mut pattern = closure.formal_args;
    let mut i = 0;
    loop {
        match pattern {
            Value::Nil => {
                if i != args.len() {
                    return Err((ErrorCode::Match, "wrong number of arguments".into()));
                }
                break;
            }
            Value::List(lid) => {
                let (value, next) = match interp.gc.data(lid) {
                    HeapData::Cons(c) => (c.value, c.next),
                    _ => unreachable!(),
                };
                if let Value::Id(id) = value {
                    if id == colon {
                        let rest_id = match next {
                            Value::List(rid) => match interp.gc.data(rid) {
                                HeapData::Cons(c) => match c.value {
                                    Value::Id(rest_id) => rest_id,
                                    _ => return Err((ErrorCode::Type, "malformed rest parameter".into())),
                                },
                                _ => return Err((ErrorCode::Type, "malformed rest parameter".into())),
                            },
                            _ => return Err((ErrorCode::Type, "`:` must be followed by a rest parameter".into())),
                        };
                        let rest = build_list(interp, &args[i..])?;
                        env::define(&mut interp.gc, frame, rest_id, rest, DefFlags(0), false, false)?;
                        break;
                    }
                }
                if i >= args.len() {
                    return Err((ErrorCode::Match, "too few arguments".into()));
                }
                if let Value::Id(param_id) = value {
                    env::define(&mut interp.gc, frame, param_id, args[i], DefFlags(0), false, false)?;
                }
                i += 1;
                pattern = next;
            }
            _ => return Err((ErrorCode::Type, "malformed parameter list".into())),
        }
    }
    Ok(frame)
}

/// Quasiquote expansion. `depth` tracks quasiquote nesting: a
/// `,x` only evaluates `x` when `depth == 1`; deeper nesting just
/// decrements (for `,`) or increments (for `` ` ``) the depth and keeps
/// walking. `,@x` (splice) behaves like `,x` but its evaluated list is
/// spliced into the surrounding list rather than inserted as one element;
/// that part is handled by [`quasiquote_list`], the only place a splice
/// is syntactically legal.
pub fn quasiquote(interp: &mut Interp, form: Value, env: HeapId, depth: u32) -> Result<Value, (ErrorCode, String)> {
    match form {
        Value::Comma(id) => {
            let inner = unwrap(interp, id);
            if depth == 1 {
                eval(interp, inner, env)
            } else {
                let expanded = quasiquote(interp, inner, env, depth - 1)?;
                wrap(interp, WrapperKind::Comma, expanded)
            }
        }
        Value::Backquote(id) => {
            let inner = unwrap(interp, id);
            let expanded = quasiquote(interp, inner, env, depth + 1)?;
            wrap(interp, WrapperKind::Backquote, expanded)
        }
        Value::Splice(id) => {
            // A bare splice outside list position; treat like comma.
            let inner = unwrap(interp, id);
            if depth == 1 {
                eval(interp, inner, env)
            } else {
                let expanded = quasiquote(interp, inner, env, depth - 1)?;
                wrap(interp, WrapperKind::Splice, expanded)
            }
        }
        Value::List(_) => quasiquote_list(interp, form, env, depth),
        other => Ok(other),
    }
}

fn quasiquote_list(interp: &mut Interp, form: Value, env: HeapId, depth: u32) -> Result<Value, (ErrorCode, String)> {
    let mut items = Vec::new();
    let mut cur = form;
    let tail = loop {
        match cur {
            Value::List(id) => {
                let (value, next) = match interp.gc.data(id) {
                    HeapData::Cons(c) => (c.value, c.next),
                    _ => unreachable!(),
                };
                match value {
                    Value::Splice(sid) if depth == 1 => {
                        let inner = unwrap(interp, sid);
                        let spliced = eval(interp, inner, env)?;
                        items.extend(list_elems(&interp.gc, spliced));
                    }
                    _ => items.push(quasiquote(interp, value, env, depth)?),
                }
                cur = next;
            }
            Value::Nil => break Value::Nil,
            other => break quasiquote(interp, other, env, depth)?,
        }
    };
    let mut out = tail;
    for v in items.into_iter().rev() {
        let id = interp.alloc(HeapData::Cons(crate::value::Cons { value: v, next: out }))?;
        out = Value::List(id);
    }
    Ok(out)
}

/// Structural pattern matching for the `match` special form. `_` (the
/// wildcard identifier) always matches without binding; any other
/// identifier binds the corresponding value; literals compare by
/// structural equality on immediates (heap-backed literals compare by
/// identity, matching `eq?`'s semantics rather than a deep walk). Inside
/// a list pattern, the pre-interned `:` identifier marks a dotted tail:
/// `(a b : rest)` binds `a`/`b` positionally and `rest` to whatever
/// remains of `value` at that point, without recursing further.
/// Returns the bindings to install if `pattern` matches `value`.
pub fn match_pattern(
    gc: &crate::gc::Gc,
    pattern: Value,
    value: Value,
    wildcard: HeapId,
    colon: HeapId,
    bindings: &mut Vec<(HeapId, Value)>,
) -> bool {
    match pattern {
        Value::Id(id) if id == wildcard => true,
        Value::Id(id) => {
            bindings.push((id, value));
            true
        }
        Value::List(pid) => {
            let (pv, pn) = match gc.data(pid) {
                HeapData::Cons(c) => (c.value, c.next),
                _ => return false,
            };
            if let Value::Id(head_id) = pv {
                if head_id == colon {
                    let rest_pattern = match pn {
                        Value::List(rid) => match gc.data(rid) {
                            HeapData::Cons(c) => c.value,
                            _ => return false,
                        },
                        _ => return false,
                    };
                    return match_pattern(gc, rest_pattern, value, wildcard, colon, bindings);
                }
            }
            let vid = match value {
                Value::List(vid) => vid,
                _ => return false,
            };
            let (vv, vn) = match gc.data(vid) {
                HeapData::Cons(c) => (c.value, c.next),
                _ => return false,
            };
            match_pattern(gc, pv, vv, wildcard, colon, bindings) && match_pattern(gc, pn, vn, wildcard, colon, bindings)
        }
        Value::Nil => value.is_nil(),
        Value::Int(a) => matches!(value, Value::Int(b) if a == b),
        Value::Double(a) => matches!(value, Value::Double(b) if a == b),
        Value::Bool(a) => matches!(value, Value::Bool(b) if a == b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::Interp;

    #[test]
    fn self_evaluating_immediates() {
        let mut interp = Interp::new();
        let env = interp.global_env();
        assert_eq!(eval(&mut interp, Value::Int(42), env).unwrap(), Value::Int(42));
    }

    #[test]
    fn quote_returns_its_unevaluated_body() {
        let mut interp = Interp::new();
        let env = interp.global_env();
        let id = interp.intern.intern(&mut interp.gc, "x");
        let quoted = wrap(&mut interp, WrapperKind::Quote, Value::Id(id)).unwrap();
        assert_eq!(eval(&mut interp, quoted, env).unwrap(), Value::Id(id));
    }

    #[test]
    fn quasiquote_splices_a_list_at_depth_one() {
        let mut interp = Interp::new();
        let env = interp.global_env();
        let spliced_list = build_list(&mut interp, &[Value::Int(2), Value::Int(3)]).unwrap();
        let quote_of_list = wrap(&mut interp, WrapperKind::Quote, spliced_list).unwrap();
        let splice = wrap(&mut interp, WrapperKind::Splice, quote_of_list).unwrap();
        let template = build_list(&mut interp, &[Value::Int(1), splice, Value::Int(4)]).unwrap();
        let result = quasiquote(&mut interp, template, env, 1).unwrap();
        let elems = list_elems(&interp.gc, result);
        assert_eq!(elems, vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]);
    }

    #[test]
    fn wildcard_pattern_matches_without_binding() {
        let mut interp = Interp::new();
        let wildcard = interp.intern.intern(&mut interp.gc, "_");
        let colon = interp.intern.std_colon;
        let mut bindings = Vec::new();
        assert!(match_pattern(&interp.gc, Value::Id(wildcard), Value::Int(7), wildcard, colon, &mut bindings));
        assert!(bindings.is_empty());
    }

    #[test]
    fn list_pattern_destructures_and_binds() {
        let mut interp = Interp::new();
        let wildcard = interp.intern.intern(&mut interp.gc, "_");
        let colon = interp.intern.std_colon;
        let a = interp.intern.intern(&mut interp.gc, "a");
        let b = interp.intern.intern(&mut interp.gc, "b");
        let pattern = build_list(&mut interp, &[Value::Id(a), Value::Id(b)]).unwrap();
        let value = build_list(&mut interp, &[Value::Int(1), Value::Int(2)]).unwrap();
        let mut bindings = Vec::new();
        assert!(match_pattern(&interp.gc, pattern, value, wildcard, colon, &mut bindings));
        assert_eq!(bindings, vec![(a, Value::Int(1)), (b, Value::Int(2))]);
    }

    #[test]
    fn hyper_gc_does_not_collect_an_earlier_evaluated_argument() {
        // `(list (list 1 2) (list 3 4))`: each inner `(list ...)` call
        // allocates a fresh, not-yet-rooted cons chain. With a collection
        // forced after every allocation, evaluating the *second* argument
        // must not sweep the freshly built first argument before `apply`
        // gets a chance to bind it into the callee's frame.
        let mut interp = Interp::new();
        crate::prelude::install(&mut interp).unwrap();
        interp.config.hyper_gc = true;
        let env = interp.global_env();

        let list_id = interp.intern.intern(&mut interp.gc, "list");
        let first = build_list(&mut interp, &[Value::Id(list_id), Value::Int(1), Value::Int(2)]).unwrap();
        let second = build_list(&mut interp, &[Value::Id(list_id), Value::Int(3), Value::Int(4)]).unwrap();
        let call = build_list(&mut interp, &[Value::Id(list_id), first, second]).unwrap();

        let result = interp.eval_top(call, env).unwrap();
        assert!(!interp.errors.is_set());
        let outer = list_elems(&interp.gc, result);
        assert_eq!(outer.len(), 2);
        assert_eq!(list_elems(&interp.gc, outer[0]), vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(list_elems(&interp.gc, outer[1]), vec![Value::Int(3), Value::Int(4)]);
    }

    #[test]
    fn hyper_gc_does_not_collect_the_active_environment_chain() {
        // With a collection forced after every allocation, a `let` frame
        // that never escapes into a closure and isn't yet reachable from
        // any namespace must still survive long enough for its own body
        // to read the binding back out.
        let mut interp = Interp::new();
        crate::prelude::install(&mut interp).unwrap();
        interp.config.hyper_gc = true;
        let env = interp.global_env();

        let let_id = interp.intern.intern(&mut interp.gc, "let");
        let x_id = interp.intern.intern(&mut interp.gc, "x");
        let cons_id = interp.intern.intern(&mut interp.gc, "cons");

        let binding = build_list(&mut interp, &[Value::Id(x_id), Value::Int(7)]).unwrap();
        let bindings = build_list(&mut interp, &[binding]).unwrap();
        // Force a handful of allocations (each one a potential GC trigger
        // under hyper-gc) while `x` is bound only in the still-unrooted
        // `let` frame, then read `x` back out at the end.
        let body = build_list(
            &mut interp,
            &[
                Value::Id(cons_id),
                Value::Id(x_id),
                build_list(&mut interp, &[Value::Id(cons_id), Value::Id(x_id), Value::Nil]).unwrap(),
            ],
        )
        .unwrap();
        let call = build_list(&mut interp, &[Value::Id(let_id), bindings, body]).unwrap();

        let result = interp.eval_top(call, env).unwrap();
        assert!(!interp.errors.is_set());
        let elems = list_elems(&interp.gc, result);
        assert_eq!(elems, vec![Value::Int(7), Value::Int(7)]);
    }

    #[test]
    fn disabling_tce_makes_deep_tail_recursion_hit_the_stack_limit() {
        // With TCE off, a self-tail-recursive `fn` consumes one `eval`
        // stack unit per logical call, so a loop deep enough to exceed
        // `stack_limit` raises ESTACK instead of looping forever in
        // bounded native stack.
        let mut interp = Interp::new();
        crate::prelude::install(&mut interp).unwrap();
        interp.config.tail_call_elimination = false;
        interp.config.stack_limit = 64;
        let env = interp.global_env();

        let fn_id = interp.intern.intern(&mut interp.gc, "fn");
        let if_id = interp.intern.intern(&mut interp.gc, "if");
        let let_id = interp.intern.intern(&mut interp.gc, "let");
        let le_id = interp.intern.intern(&mut interp.gc, "<=");
        let minus_id = interp.intern.intern(&mut interp.gc, "-");
        let n_id = interp.intern.intern(&mut interp.gc, "n");
        let loop_id = interp.intern.intern(&mut interp.gc, "loop");

        let cond = build_list(&mut interp, &[Value::Id(le_id), Value::Id(n_id), Value::Int(0)]).unwrap();
        let decremented = build_list(&mut interp, &[Value::Id(minus_id), Value::Id(n_id), Value::Int(1)]).unwrap();
        let recurse = build_list(&mut interp, &[Value::Id(loop_id), decremented]).unwrap();
        let if_form = build_list(&mut interp, &[Value::Id(if_id), cond, Value::Int(0), recurse]).unwrap();
        let params = build_list(&mut interp, &[Value::Id(n_id)]).unwrap();
        let fn_form = build_list(&mut interp, &[Value::Id(fn_id), params, if_form]).unwrap();
        let binding = build_list(&mut interp, &[Value::Id(loop_id), fn_form]).unwrap();
        let bindings = build_list(&mut interp, &[binding]).unwrap();
        let call = build_list(&mut interp, &[Value::Id(loop_id), Value::Int(1_000)]).unwrap();
        let let_form = build_list(&mut interp, &[Value::Id(let_id), bindings, call]).unwrap();

        interp.eval_top(let_form, env).unwrap();
        assert_eq!(interp.errors.errno(), ErrorCode::Stack as i32);
    }

    #[test]
    fn dotted_tail_pattern_binds_the_remainder() {
        let mut interp = Interp::new();
        let wildcard = interp.intern.intern(&mut interp.gc, "_");
        let colon = interp.intern.std_colon;
        let a = interp.intern.intern(&mut interp.gc, "a");
        let rest = interp.intern.intern(&mut interp.gc, "rest");
        let pattern = build_list(&mut interp, &[Value::Id(a), Value::Id(colon), Value::Id(rest)]).unwrap();
        let value = build_list(&mut interp, &[Value::Int(1), Value::Int(2), Value::Int(3)]).unwrap();
        let mut bindings = Vec::new();
        assert!(match_pattern(&interp.gc, pattern, value, wildcard, colon, &mut bindings));
        assert_eq!(bindings[0], (a, Value::Int(1)));
        let rest_value = bindings.iter().find(|(id, _)| *id == rest).unwrap().1;
        assert_eq!(list_elems(&interp.gc, rest_value), vec![Value::Int(2), Value::Int(3)]);
    }
}
