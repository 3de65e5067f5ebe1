//! Nested lexical scopes and the get/set symbol model.
//!
//! Environments form a singly-linked stack of `Normal` frames, each
//! holding a hash table from an identifier's `HeapId` to a [`Symbol`].
//! A `Bifurcated` frame overlays two existing environments read-only,
//! consulting its `left` branch then its `right`; it exists so a lexical
//! scoping boundary (e.g. a macro's definition-site bindings merged with
//! its use-site arguments) can be modeled without copying either side.

use std::rc::Rc;

use crate::error::ErrorCode;
use crate::flags::NO_ESC_BIT;
use crate::gc::Gc;
use crate::hashtable::SeqHashTable;
use crate::value::{HeapData, HeapId, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefFlags(pub u8);

impl DefFlags {
    pub const NONE: u8 = 0;
    pub const READONLY: u8 = 1 << 0;
    pub const WRITEONLY: u8 = 1 << 1;
}

pub type GetFn = Rc<dyn Fn() -> Value>;
pub type SetFn = Rc<dyn Fn(Value)>;
pub type SymFinalizer = Rc<dyn Fn(Value)>;

/// Stock symbols read/write `protected_value` directly; synced symbols
/// marshal through caller-owned callbacks (e.g. a host-synced numeric
/// primitive backed by a Rust cell the embedder owns).
pub enum Access {
    Stock,
    Synced { get: Option<GetFn>, set: Option<SetFn> },
}

pub struct Symbol {
    pub access: Access,
    pub readable: bool,
    pub writable: bool,
    pub value: Value,
    pub finalizer: Option<SymFinalizer>,
}

impl Symbol {
    pub fn variable(initial: Value, flags: DefFlags) -> Self {
        Symbol {
            access: Access::Stock,
            readable: flags.0 & DefFlags::WRITEONLY == 0,
            writable: flags.0 & DefFlags::READONLY == 0,
            value: initial,
            finalizer: None,
        }
    }

    pub fn synced(get: Option<GetFn>, set: Option<SetFn>) -> Self {
        Symbol {
            readable: get.is_some(),
            writable: set.is_some(),
            access: Access::Synced { get, set },
            value: Value::Nil,
            finalizer: None,
        }
    }

    pub fn get(&self) -> Option<Value> {
        if !self.readable {
            return None;
        }
        match &self.access {
            Access::Stock => Some(self.value),
            Access::Synced { get, .. } => get.as_ref().map(|g| g()),
        }
    }

    pub fn set(&mut self, v: Value) -> bool {
        if !self.writable {
            return false;
        }
        match &self.access {
            Access::Stock => {
                self.value = v;
                true
            }
            Access::Synced { set, .. } => {
                if let Some(s) = set {
                    s(v);
                    true
                } else {
                    false
                }
            }
        }
    }
}

pub enum EnvRecord {
    Normal {
        syms: SeqHashTable<HeapId, Symbol>,
        below: Option<HeapId>,
    },
    Bifurcated {
        left: HeapId,
        right: HeapId,
    },
}

impl std::fmt::Debug for EnvRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvRecord::Normal { below, .. } => {
                write!(f, "Normal(below={below:?})")
            }
            EnvRecord::Bifurcated { left, right } => {
                write!(f, "Bifurcated({left:?}, {right:?})")
            }
        }
    }
}

/// `push-env`: allocate a new normal frame above `below`, unescaped until
/// something captures it as a closure's `lexenv`.
pub fn push_env(gc: &mut Gc, below: HeapId) -> HeapId {
    let id = gc.alloc(HeapData::Env(EnvRecord::Normal {
        syms: SeqHashTable::new(),
        below: Some(below),
    }));
    gc.get_mut(id).flags.set(NO_ESC_BIT);
    id
}

/// Allocate a root normal frame with no parent (used for the three
/// namespace environments: globals, special-operators, macros).
pub fn new_root_env(gc: &mut Gc) -> HeapId {
    gc.alloc(HeapData::Env(EnvRecord::Normal {
        syms: SeqHashTable::new(),
        below: None,
    }))
}

/// `enter-env`: a read-only overlay of two environments.
pub fn enter_env(gc: &mut Gc, left: HeapId, right: HeapId) -> HeapId {
    gc.alloc(HeapData::Env(EnvRecord::Bifurcated { left, right }))
}

/// `pop-env`: unlink back to `below`. If `env` never escaped (nothing
/// captured it as a `lexenv`), it can be collected immediately; otherwise
/// it survives until the tracing GC proves it unreachable.
pub fn pop_env(gc: &mut Gc, env: HeapId) -> HeapId {
    let below = match &gc.data(env) {
        HeapData::Env(EnvRecord::Normal { below, .. }) => *below,
        HeapData::Env(EnvRecord::Bifurcated { .. }) => {
            panic!("pop-env on a bifurcated frame")
        }
        _ => panic!("pop-env on a non-environment value"),
    };
    below.expect("pop-env on the root environment")
}

/// Capturing an environment as a closure's `lexenv` unsets `NO_ESC_BIT` on
/// every frame currently on the active chain, so `pop_env` never frees one
/// a closure still points at.
pub fn mark_escaped(gc: &mut Gc, mut env: HeapId) {
    loop {
        gc.get_mut(env).flags.clear(NO_ESC_BIT);
        match gc.data(env) {
            HeapData::Env(EnvRecord::Normal { below: Some(b), .. }) => env = *b,
            _ => break,
        }
    }
}

fn lookup_in<'g>(gc: &'g Gc, env: HeapId, id: HeapId) -> Option<(&'g Symbol, HeapId)> {
    match gc.data(env) {
        HeapData::Env(EnvRecord::Normal { syms, below }) => {
            if let Some(sym) = syms.get(&id) {
                Some((sym, env))
            } else {
                below.and_then(|b| lookup_in(gc, b, id))
            }
        }
        HeapData::Env(EnvRecord::Bifurcated { left, right }) => {
            lookup_in(gc, *left, id).or_else(|| lookup_in(gc, *right, id))
        }
        _ => None,
    }
}

/// Resolve `id` by walking the chain. Returns the owning frame's id too,
/// so callers (e.g. `set!`) can mutate the right symbol table.
pub fn lookup(gc: &Gc, env: HeapId, id: HeapId) -> Option<HeapId> {
    lookup_in(gc, env, id).map(|(_, owner)| owner)
}

pub fn get(gc: &Gc, env: HeapId, id: HeapId) -> Result<Value, (ErrorCode, String)> {
    match lookup_in(gc, env, id) {
        Some((sym, _)) => sym.get().ok_or_else(|| {
            (
                ErrorCode::WriteOnly,
                format!("{}: write-only symbol", ident_name(gc, id)),
            )
        }),
        None => Err((
            ErrorCode::NoSym,
            format!("unbound identifier: {}", ident_name(gc, id)),
        )),
    }
}

pub fn set(gc: &mut Gc, env: HeapId, id: HeapId, v: Value) -> Result<(), (ErrorCode, String)> {
    let owner = lookup(gc, env, id).ok_or_else(|| {
        (
            ErrorCode::NoSym,
            format!("unbound identifier: {}", ident_name(gc, id)),
        )
    })?;
    match gc.data_mut(owner) {
        HeapData::Env(EnvRecord::Normal { syms, .. }) => {
            let sym = syms.get_mut(&id).expect("lookup found it, get_mut must too");
            if sym.set(v) {
                Ok(())
            } else {
                Err((
                    ErrorCode::ReadOnly,
                    format!("{}: read-only symbol", ident_name(gc, id)),
                ))
            }
        }
        _ => unreachable!("lookup only returns Normal frames"),
    }
}

/// `def name value flags` in the innermost normal environment of `env`.
/// `allow_redef` controls whether redefining an existing *global* binding
/// replaces it (running the old symbol's finalizer) or raises `EEXIST`.
pub fn define(
    gc: &mut Gc,
    env: HeapId,
    id: HeapId,
    value: Value,
    flags: DefFlags,
    is_global: bool,
    allow_redef: bool,
) -> Result<(), (ErrorCode, String)> {
    let syms = match gc.data_mut(env) {
        HeapData::Env(EnvRecord::Normal { syms, .. }) => syms,
        _ => {
            return Err((
                ErrorCode::Api,
                "def: target is not a normal environment".into(),
            ));
        }
    };
    if syms.contains(&id) {
        if is_global && allow_redef {
            if let Some(old) = syms.remove(&id) {
                if let Some(fin) = &old.finalizer {
                    fin(old.value);
                }
            }
        } else {
            return Err((
                ErrorCode::Exist,
                format!("duplicate definition: {}", ident_name(gc, id)),
            ));
        }
    }
    let syms = match gc.data_mut(env) {
        HeapData::Env(EnvRecord::Normal { syms, .. }) => syms,
        _ => unreachable!(),
    };
    syms.set(id, Symbol::variable(value, flags))
        .map_err(|_| (ErrorCode::NoMem, "environment table full".to_string()))
}

fn ident_name(gc: &Gc, id: HeapId) -> String {
    match gc.data(id) {
        HeapData::Ident { name, .. } => name.to_string(),
        _ => format!("<#{}>", id.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Intern;

    #[test]
    fn shadowing_follows_the_spec_scenario() {
        let mut gc = Gc::new();
        let mut intern = Intern::new();
        let x = intern.intern(&mut gc, "x");

        let globals = new_root_env(&mut gc);
        let mut env = push_env(&mut gc, globals);
        define(&mut gc, env, x, Value::Int(1), DefFlags(0), false, false).unwrap();
        env = push_env(&mut gc, env);
        define(&mut gc, env, x, Value::Int(2), DefFlags(0), false, false).unwrap();
        assert_eq!(get(&gc, env, x).unwrap(), Value::Int(2));
        env = pop_env(&mut gc, env);
        assert_eq!(get(&gc, env, x).unwrap(), Value::Int(1));
    }

    #[test]
    fn unbound_lookup_is_nosym() {
        let mut gc = Gc::new();
        let mut intern = Intern::new();
        let y = intern.intern(&mut gc, "y");
        let globals = new_root_env(&mut gc);
        let err = get(&gc, globals, y).unwrap_err();
        assert_eq!(err.0, ErrorCode::NoSym);
    }

    #[test]
    fn readonly_flag_rejects_set() {
        let mut gc = Gc::new();
        let mut intern = Intern::new();
        let z = intern.intern(&mut gc, "z");
        let globals = new_root_env(&mut gc);
        define(
            &mut gc,
            globals,
            z,
            Value::Int(1),
            DefFlags(DefFlags::READONLY),
            false,
            false,
        )
        .unwrap();
        let err = set(&mut gc, globals, z, Value::Int(2)).unwrap_err();
        assert_eq!(err.0, ErrorCode::ReadOnly);
    }

    #[test]
    fn bifurcated_env_checks_left_then_right() {
        let mut gc = Gc::new();
        let mut intern = Intern::new();
        let a = intern.intern(&mut gc, "a");
        let b = intern.intern(&mut gc, "b");
        let left = new_root_env(&mut gc);
        define(&mut gc, left, a, Value::Int(10), DefFlags(0), false, false).unwrap();
        let right = new_root_env(&mut gc);
        define(&mut gc, right, b, Value::Int(20), DefFlags(0), false, false).unwrap();
        let bi = enter_env(&mut gc, left, right);
        assert_eq!(get(&gc, bi, a).unwrap(), Value::Int(10));
        assert_eq!(get(&gc, bi, b).unwrap(), Value::Int(20));
    }
}
