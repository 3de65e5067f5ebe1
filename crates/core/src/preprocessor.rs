//! Static shape validation for special-form argument lists, and macro
//! expansion.
//!
//! A special form or macro may carry a [`Program`]: a small tree of
//! [`Op`]s that walks the unevaluated argument list once, before the
//! form's handler ever runs, rejecting malformed call shapes with a
//! specific message rather than a generic arity error. Each [`Instr`]
//! pairs an `Op` with an index into the program's own message table
//! (conceptually the instruction's high nibble, the opcode its low
//! nibble — kept here as two struct fields rather than a packed byte,
//! since the validator never serializes the tree) so a failure deep in
//! a nested pattern reports which clause rejected it without a parallel
//! lookup structure threaded through the matcher.
//!
//! Macro expansion runs the macro's closure body against the raw
//! (unevaluated) argument forms, tags the result's `ORIG-FORM`
//! attribute with the call site, and sets `PREPROC_BIT` on the
//! expansion so the evaluator and printer can tell a macro-produced form
//! from one the user wrote directly.

use crate::env::{self, DefFlags};
use crate::error::ErrorCode;
use crate::flags::PREPROC_BIT;
use crate::gc::Gc;
use crate::interp::Interp;
use crate::value::{HeapData, HeapId, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Matches only `Value::Nil`: the end of the argument list.
    Nil,
    /// Matches a cons cell; recurses into its `value` then `next`.
    Node,
    /// Matches the listed sub-patterns in order against successive list
    /// positions (each consumes one `Node`'s `value`, the group shares
    /// one walk through `next`).
    Seq,
    /// Zero or one occurrences of the wrapped pattern.
    Maybe,
    /// Accepts any value at this position without recursing further.
    Lit,
    /// Accepts any value, marking this position as an evaluated
    /// sub-expression (informational only; `validate` does not itself
    /// evaluate).
    Expr,
}

pub struct Instr {
    pub op: Op,
    pub err_idx: u8,
    pub children: Vec<Instr>,
}

impl Instr {
    pub fn nil(err_idx: u8) -> Self {
        Instr {
            op: Op::Nil,
            err_idx,
            children: Vec::new(),
        }
    }
    pub fn node(err_idx: u8, value: Instr, next: Instr) -> Self {
        Instr {
            op: Op::Node,
            err_idx,
            children: vec![value, next],
        }
    }
    pub fn seq(err_idx: u8, items: Vec<Instr>) -> Self {
        Instr {
            op: Op::Seq,
            err_idx,
            children: items,
        }
    }
    pub fn maybe(err_idx: u8, inner: Instr) -> Self {
        Instr {
            op: Op::Maybe,
            err_idx,
            children: vec![inner],
        }
    }
    pub fn lit(err_idx: u8) -> Self {
        Instr {
            op: Op::Lit,
            err_idx,
            children: Vec::new(),
        }
    }
    pub fn expr(err_idx: u8) -> Self {
        Instr {
            op: Op::Expr,
            err_idx,
            children: Vec::new(),
        }
    }
}

pub struct Program {
    pub root: Instr,
    pub messages: Vec<String>,
}

impl Program {
    pub fn message(&self, idx: u8) -> &str {
        self.messages
            .get(idx as usize)
            .map(String::as_str)
            .unwrap_or("malformed form")
    }
}

fn fail(program: &Program, instr: &Instr) -> (ErrorCode, String) {
    (ErrorCode::Match, program.message(instr.err_idx).to_string())
}

/// Validate `form` (the unevaluated argument list of a call) against
/// `program`.
pub fn validate(gc: &Gc, program: &Program, form: Value) -> Result<(), (ErrorCode, String)> {
    validate_node(gc, program, &program.root, form)
}

fn validate_node(gc: &Gc, program: &Program, instr: &Instr, form: Value) -> Result<(), (ErrorCode, String)> {
    match instr.op {
        Op::Nil => {
            if form.is_nil() {
                Ok(())
            } else {
                Err(fail(program, instr))
            }
        }
        Op::Node => {
            let id = match form {
                Value::List(id) => id,
                _ => return Err(fail(program, instr)),
            };
            let cons = match gc.data(id) {
                HeapData::Cons(c) => c,
                _ => return Err(fail(program, instr)),
            };
            validate_node(gc, program, &instr.children[0], cons.value)?;
            validate_node(gc, program, &instr.children[1], cons.next)
        }
        Op::Seq => {
            let mut cur = form;
            for child in &instr.children {
                if child.op == Op::Nil {
                    validate_node(gc, program, child, cur)?;
                    continue;
                }
                let id = match cur {
                    Value::List(id) => id,
                    _ => return Err(fail(program, child)),
                };
                let cons = match gc.data(id) {
                    HeapData::Cons(c) => c,
                    _ => return Err(fail(program, child)),
                };
                validate_node(gc, program, child, cons.value)?;
                cur = cons.next;
            }
            Ok(())
        }
        Op::Maybe => {
            if form.is_nil() {
                Ok(())
            } else {
                validate_node(gc, program, &instr.children[0], form).or(Ok(()))
            }
        }
        Op::Lit | Op::Expr => Ok(()),
    }
}

/// Collect a proper list's elements as a `Vec<Value>`; used to bind a
/// macro's formal argument pattern against the raw call-site forms.
pub(crate) fn list_elems(gc: &Gc, mut form: Value) -> Vec<Value> {
    let mut out = Vec::new();
    loop {
        match form {
            Value::Nil => break,
            Value::List(id) => match gc.data(id) {
                HeapData::Cons(c) => {
                    out.push(c.value);
                    form = c.next;
                }
                _ => break,
            },
            other => {
                out.push(other);
                break;
            }
        }
    }
    out
}

/// `expand(macro_id, args, use_env)`: bind the macro's formal parameters
/// to the raw, unevaluated `args`, evaluate its body for an expansion
/// value, then mark that value as macro-produced.
///
/// `use_env` is only consulted to build the binding frame's parent chain
/// (a macro's body runs under its definition-site closure
/// environment bifurcated over the call site), never to evaluate `args`.
pub fn expand(
    interp: &mut Interp,
    macro_id: HeapId,
    call_form: Value,
    args: Value,
    use_env: HeapId,
) -> Result<Value, (ErrorCode, String)> {
    let closure = match interp.gc.data(macro_id) {
        HeapData::Closure(c) => c.clone(),
        _ => return Err((ErrorCode::Type, "expand: not a macro closure".into())),
    };
    let formal_names = list_elems(&interp.gc, closure.formal_args);
    let arg_forms = list_elems(&interp.gc, args);
    if formal_names.len() != arg_forms.len() {
        return Err((
            ErrorCode::Match,
            "macro call: argument count mismatch".into(),
        ));
    }
    tracing::trace!(forms = closure.body.len(), "expanding macro call");
    let bound = env::enter_env(&mut interp.gc, closure.lexenv, use_env);
    let frame = env::push_env(&mut interp.gc, bound);
    for (name, arg) in formal_names.iter().zip(arg_forms.iter()) {
        if let Value::Id(id) = name {
            env::define(&mut interp.gc, frame, *id, *arg, DefFlags(0), false, false)?;
        }
    }
    let mut result = Value::Nil;
    for form in &closure.body {
        result = interp.eval_top(*form, frame)?;
    }
    if let Some(result_id) = result.heap_id() {
        interp.attributes.set_orig_form(&mut interp.gc, result_id, call_form);
        interp.gc.get_mut(result_id).flags.set(PREPROC_BIT);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Cons;

    fn cons_list(gc: &mut Gc, items: &[Value]) -> Value {
        let mut tail = Value::Nil;
        for v in items.iter().rev() {
            let id = gc.alloc(HeapData::Cons(Cons {
                value: *v,
                next: tail,
            }));
            tail = Value::List(id);
        }
        tail
    }

    #[test]
    fn nil_pattern_rejects_nonempty_list() {
        let mut gc = Gc::new();
        let program = Program {
            root: Instr::nil(0),
            messages: vec!["expected ()".into()],
        };
        let form = cons_list(&mut gc, &[Value::Int(1)]);
        assert!(validate(&gc, &program, form).is_err());
        assert!(validate(&gc, &program, Value::Nil).is_ok());
    }

    #[test]
    fn seq_validates_fixed_arity_with_a_literal_tail() {
        let mut gc = Gc::new();
        let program = Program {
            root: Instr::seq(0, vec![Instr::expr(1), Instr::expr(2), Instr::nil(3)]),
            messages: vec![
                "bad".into(),
                "bad first arg".into(),
                "bad second arg".into(),
                "too many arguments".into(),
            ],
        };
        let good = cons_list(&mut gc, &[Value::Int(1), Value::Int(2)]);
        assert!(validate(&gc, &program, good).is_ok());
        let bad = cons_list(&mut gc, &[Value::Int(1), Value::Int(2), Value::Int(3)]);
        let err = validate(&gc, &program, bad).unwrap_err();
        assert_eq!(err.1, "too many arguments");
    }

    #[test]
    fn maybe_allows_the_optional_clause_to_be_absent() {
        let mut gc = Gc::new();
        let program = Program {
            root: Instr::seq(0, vec![Instr::expr(1), Instr::maybe(2, Instr::expr(3))]),
            messages: vec!["bad".into(), "bad".into(), "bad".into(), "bad".into()],
        };
        let one_arg = cons_list(&mut gc, &[Value::Int(1)]);
        assert!(validate(&gc, &program, one_arg).is_ok());
        let two_args = cons_list(&mut gc, &[Value::Int(1), Value::Int(2)]);
        assert!(validate(&gc, &program, two_args).is_ok());
    }
}
