//! The interpreter instance: owns the heap, the three namespace
//! environments, and every piece of side-band state a running program
//! can observe.
//!
//! `Interp` is the seam between [`crate::gc::Gc`] (collection mechanics)
//! and [`crate::alloc::Allocator`] (budget accounting): every heap
//! construction goes through [`Interp::alloc`], which accounts for the
//! record's estimated size first and triggers a collection if the
//! allocator's soft threshold has armed, rather than letting `Gc` and
//! `Allocator` drift out of sync by updating them independently.

use crate::alloc::Allocator;
use crate::attributes::Attributes;
use crate::config::Config;
use crate::env::{self, DefFlags};
use crate::error::{ErrorCode, ErrorState, Frame};
use crate::eval;
use crate::gc::Gc;
use crate::intern::Intern;
use crate::types::TypeRegistry;
use crate::value::{HeapData, HeapId, Value};

pub struct Interp {
    pub gc: Gc,
    pub allocator: Allocator,
    pub intern: Intern,
    pub attributes: Attributes,
    pub types: TypeRegistry,
    pub errors: ErrorState,
    pub config: Config,
    pub stack_depth: usize,

    pub globals_env: HeapId,
    pub special_env: HeapId,
    pub macros_env: HeapId,

    /// The environment each live `eval` stack frame is currently working
    /// in, innermost last. [`eval::eval`] pushes its `env` argument here
    /// on entry and pops it on return; the trampoline in
    /// [`eval::eval_inner`] updates the top entry in place as tail
    /// positions rewrite `env` without recursing. Marked as GC roots
    /// ("the current environment chain" is always a GC root) so a collection triggered
    /// by an allocation mid-evaluation never sweeps the frame the
    /// in-flight call is bound in, even though it may not yet be
    /// reachable from any namespace or closure.
    pub active_envs: Vec<HeapId>,

    /// The form each live `eval` stack frame is currently reducing,
    /// parallel to `active_envs`. A call's unevaluated argument forms
    /// (and any nested sub-forms not yet reached) live only in this
    /// form's cons structure until they're individually evaluated; with
    /// nothing else pointing at them, an allocation triggered while
    /// evaluating an earlier argument could otherwise sweep a later one
    /// still waiting its turn. Rooting the form itself roots that whole
    /// structure transitively through `Gc::collect`'s mark phase.
    pub active_forms: Vec<Value>,
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}

impl Interp {
    pub fn new() -> Self {
        let mut gc = Gc::new();
        let intern = Intern::new_in(&mut gc);
        let globals_env = env::new_root_env(&mut gc);
        let special_env = env::new_root_env(&mut gc);
        let macros_env = env::new_root_env(&mut gc);
        let mut allocator = Allocator::new();
        let config = Config::default();
        allocator.set_mem_limit(config.mem_limit as u64);
        Interp {
            gc,
            allocator,
            intern,
            attributes: Attributes::new(),
            types: TypeRegistry::new(),
            errors: ErrorState::new(),
            config,
            stack_depth: 0,
            globals_env,
            special_env,
            macros_env,
            active_envs: Vec::new(),
            active_forms: Vec::new(),
        }
    }

    pub fn global_env(&self) -> HeapId {
        self.globals_env
    }

    /// Evaluate `form` in `env`, pushing a backtrace frame first so a
    /// `throw` part-way through points somewhere useful.
    pub fn eval_top(&mut self, form: Value, env: HeapId) -> Result<Value, (ErrorCode, String)> {
        self.errors.push_frame(Frame {
            file: None,
            line: None,
            form_summary: format!("{:?}", form.type_tag()),
        });
        let result = eval::eval(self, form, env);
        result
    }

    /// Rough per-record byte cost for allocator accounting. Doesn't need
    /// to be exact, only monotonic with what `HeapData` actually holds, so
    /// `mem-limit` behaves predictably rather than precisely.
    fn estimate_size(data: &HeapData) -> u64 {
        use std::mem::size_of;
        let base = size_of::<crate::flags::RtFlags>() as u64 + 16;
        base + match data {
            HeapData::Ident { name, .. } => name.len() as u64,
            HeapData::Cons(_) => size_of::<crate::value::Cons>() as u64,
            HeapData::Str(s) => match &s.storage {
                crate::value::StrStorage::Owned(bytes) => bytes.len() as u64,
                crate::value::StrStorage::View { .. } => 0,
            },
            HeapData::Wrapper(_, _) => size_of::<Value>() as u64,
            HeapData::Closure(c) => (c.body.len() * size_of::<Value>()) as u64 + 32,
            HeapData::ExtFunc(f) => f.name.len() as u64 + 16,
            HeapData::SpecialForm(sf) => sf.name.len() as u64 + 16,
            HeapData::Env(_) => 64,
        }
    }

    /// Allocate a heap record, accounting for its size and forcing a
    /// collection first if the request would exceed `mem-limit` or the
    /// soft threshold has armed since the last sweep.
    pub fn alloc(&mut self, data: HeapData) -> Result<HeapId, (ErrorCode, String)> {
        let size = Self::estimate_size(&data);
        if self.config.hyper_gc || self.allocator.triggered() {
            self.run_gc();
        }
        if self.allocator.account(size).is_err() {
            self.run_gc();
            self.allocator.account(size).map_err(|_| {
                tracing::warn!(size, mem_limit = self.config.mem_limit, "allocation exceeds mem-limit after gc");
                (ErrorCode::NoMem, "allocation exceeds configured mem-limit".to_string())
            })?;
        }
        Ok(self.gc.alloc(data))
    }

    /// Run one full collection cycle, finalizing every freed record:
    /// identifiers unlink from the intern table, every attribute table
    /// entry for the id is dropped, and a dying environment frame runs
    /// each of its symbols' finalizers.
    pub fn run_gc(&mut self) {
        tracing::debug!(all_mem = self.allocator.all_mem(), "running gc cycle");
        let mut roots = vec![
            Value::Env(self.globals_env),
            Value::Env(self.special_env),
            Value::Env(self.macros_env),
            // The standard-identifier cache: pre-interned at startup and
            // compared by `HeapId` on evaluator hot paths (`:` in dotted
            // patterns, `catch`/`finally`), so nothing else may reference
            // them for arbitrarily long stretches of a program's run.
            Value::Id(self.intern.std_colon),
            Value::Id(self.intern.std_defget),
            Value::Id(self.intern.std_defset),
            Value::Id(self.intern.std_catch),
            Value::Id(self.intern.std_finally),
        ];
        roots.extend(self.active_envs.iter().map(|id| Value::Env(*id)));
        roots.extend(self.active_forms.iter().copied());
        roots.extend(self.attributes.orig_form_values());
        let Some(freed) = self.gc.collect(roots) else {
            return;
        };
        let mut released = 0u64;
        for (id, obj) in freed {
            released += Self::estimate_size(&obj.data);
            self.attributes.remove_all(id);
            match obj.data {
                HeapData::Ident { name, .. } => self.intern.remove(&name),
                HeapData::Env(crate::env::EnvRecord::Normal { syms, .. }) => {
                    syms.foreach(|_, sym| {
                        if let Some(fin) = &sym.finalizer {
                            fin(sym.value);
                        }
                    });
                }
                _ => {}
            }
        }
        self.allocator.release(released);
        self.allocator.mark_swept();
        tracing::trace!(released, remaining = self.allocator.all_mem(), "gc cycle released bytes");
    }

    /// `def name value` in the global environment, honoring `allow-redef`.
    pub fn define_global(&mut self, id: HeapId, value: Value, flags: DefFlags) -> Result<(), (ErrorCode, String)> {
        env::define(&mut self.gc, self.globals_env, id, value, flags, true, self.config.allow_redef)
    }

    /// Register a special form under `name` in the special-operators
    /// namespace.
    pub fn define_special(&mut self, name: &str, handler: crate::value::SpecialFormFn, preprocessor: Option<crate::preprocessor::Program>) -> Result<(), (ErrorCode, String)> {
        let id = self.intern.intern(&mut self.gc, name);
        let sf_id = self.gc.alloc(HeapData::SpecialForm(crate::value::SpecialForm {
            name: name.to_string(),
            handler,
            preprocessor,
        }));
        env::define(&mut self.gc, self.special_env, id, Value::SpecialForm(sf_id), DefFlags(0), true, true)
    }

    /// Funnel an internal `Result` into the thrown-error state machine at
    /// the boundary where it meets a `Value`-returning guest-visible API
    /// ([`crate::value::ExtFn`], [`crate::value::SpecialFormFn`]). Internal
    /// code (unpack, environment lookups, binder) stays ergonomic with `?`;
    /// this is the single place that turns a Rust `Err` into something
    /// `try`/`catch` can observe. A no-op if an error is already set, so the
    /// first failure in a chain wins.
    pub fn throw_or<T>(&mut self, result: Result<T, (ErrorCode, String)>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err((code, msg)) => {
                if !self.errors.is_set() {
                    self.errors.throw(code as i32, msg);
                }
                None
            }
        }
    }

    /// Register a host (Rust-implemented) function under `name` in the
    /// global environment.
    pub fn define_ext_func(&mut self, name: &str, handler: crate::value::ExtFn) -> Result<(), (ErrorCode, String)> {
        let id = self.intern.intern(&mut self.gc, name);
        let ef_id = self.gc.alloc(HeapData::ExtFunc(crate::value::ExtFunc {
            name: name.to_string(),
            handler,
        }));
        self.define_global(id, Value::ExtFunc(ef_id), DefFlags(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_interp_has_three_empty_root_environments() {
        let interp = Interp::new();
        assert_ne!(interp.globals_env, interp.special_env);
        assert_ne!(interp.special_env, interp.macros_env);
    }

    #[test]
    fn alloc_tracks_allocator_accounting() {
        let mut interp = Interp::new();
        let before = interp.allocator.all_mem();
        interp
            .alloc(HeapData::Str(crate::value::SeqStr::owned(b"hello")))
            .unwrap();
        assert!(interp.allocator.all_mem() > before);
    }

    #[test]
    fn run_gc_never_collects_the_standard_identifier_cache() {
        // `:`, `defget`, `defset`, `catch`, `finally` are pre-interned at
        // startup and compared by `HeapId` deep in evaluator hot paths;
        // nothing in user code need ever reference them directly, so a
        // collection that didn't root them specifically would eventually
        // free their heap records even though `Intern` still holds (and
        // hands out) the now-dangling ids.
        let mut interp = Interp::new();
        for _ in 0..5 {
            interp.run_gc();
        }
        assert!(matches!(
            interp.gc.data(interp.intern.std_colon),
            HeapData::Ident { name, .. } if &**name == ":"
        ));
        assert!(matches!(
            interp.gc.data(interp.intern.std_catch),
            HeapData::Ident { name, .. } if &**name == "catch"
        ));
        assert_eq!(interp.intern.lookup(":"), Some(interp.intern.std_colon));
    }

    #[test]
    fn run_gc_keeps_an_orig_form_value_alive_via_the_attribute_table() {
        // A macro expansion's `ORIG-FORM` attribute holds the pre-expansion
        // call form, keyed on the expanded result's id. The result stays
        // reachable through the global it's bound to, but the original
        // form has no other pointer to it once expansion finishes.
        let mut interp = Interp::new();
        let call_form = interp
            .alloc(HeapData::Cons(crate::value::Cons {
                value: Value::Int(99),
                next: Value::Nil,
            }))
            .unwrap();
        let result = interp
            .alloc(HeapData::Cons(crate::value::Cons {
                value: Value::Int(1),
                next: Value::Nil,
            }))
            .unwrap();
        interp
            .attributes
            .set_orig_form(&mut interp.gc, result, Value::List(call_form));
        let name = interp.intern.intern(&mut interp.gc, "kept-result");
        interp
            .define_global(name, Value::List(result), DefFlags(0))
            .unwrap();
        interp.run_gc();
        assert!(matches!(
            interp.gc.data(call_form),
            HeapData::Cons(c) if c.value == Value::Int(99)
        ));
    }

    #[test]
    fn run_gc_unlinks_a_freed_identifier_from_intern() {
        let mut interp = Interp::new();
        let id = interp.intern.intern(&mut interp.gc, "throwaway");
        assert!(interp.intern.lookup("throwaway").is_some());
        let _ = id;
        interp.run_gc();
        assert!(interp.intern.lookup("throwaway").is_none());
    }

    #[test]
    fn mem_limit_rejects_an_oversized_allocation() {
        let mut interp = Interp::new();
        interp.config.mem_limit = 10;
        interp.allocator.set_mem_limit(10);
        let err = interp
            .alloc(HeapData::Str(crate::value::SeqStr::owned(b"way too long for ten bytes")))
            .unwrap_err();
        assert_eq!(err.0, ErrorCode::NoMem);
    }
}
