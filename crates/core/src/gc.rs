//! Tracing mark-and-sweep collector over an arena of heap records.
//!
//! Rather than chase raw pointers, the heap is a `Vec<Option<HeapObject>>`
//! addressed by [`HeapId`] (a plain index). Marking walks `Value`s through
//! their `HeapId`s and flips `GC_MARKED` on the arena slot; sweeping frees
//! every unmarked, GC-owned slot. Environment chains and closures are
//! routinely cyclic, so indices are used instead of raw pointers: they
//! don't need Rust-level lifetime or ownership gymnastics, and a slot
//! revisited through a second path is simply already marked.

use crate::flags::{GC_BIT, GC_MARKED, REF_BIT};
use crate::value::{HeapData, HeapId, HeapObject, Value, WrapperKind};

/// Returned by [`Gc::ref_value`]; composes with nested pins on the same
/// object by only clearing the bit if this handle is the one that set it.
#[derive(Debug, Clone, Copy)]
pub struct RefHandle {
    id: Option<HeapId>,
    owns: bool,
}

pub struct Gc {
    arena: Vec<Option<HeapObject>>,
    free_list: Vec<u32>,
    /// Estimated byte size of each live slot, mirrored into the allocator.
    locked: bool,
}

impl Default for Gc {
    fn default() -> Self {
        Self::new()
    }
}

impl Gc {
    pub fn new() -> Self {
        Gc {
            arena: Vec::new(),
            free_list: Vec::new(),
            locked: false,
        }
    }

    /// Allocate a new heap record, returning its id. Unconditional: callers
    /// in [`crate::interp`] check the allocator's budget first.
    pub fn alloc(&mut self, data: HeapData) -> HeapId {
        let obj = HeapObject {
            flags: crate::flags::RtFlags::new(),
            data,
        };
        if let Some(idx) = self.free_list.pop() {
            self.arena[idx as usize] = Some(obj);
            HeapId(idx)
        } else {
            let idx = self.arena.len() as u32;
            self.arena.push(Some(obj));
            HeapId(idx)
        }
    }

    pub fn get(&self, id: HeapId) -> &HeapObject {
        self.arena[id.0 as usize]
            .as_ref()
            .expect("dangling HeapId: object was already freed")
    }

    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapObject {
        self.arena[id.0 as usize]
            .as_mut()
            .expect("dangling HeapId: object was already freed")
    }

    pub fn data(&self, id: HeapId) -> &HeapData {
        &self.get(id).data
    }

    pub fn data_mut(&mut self, id: HeapId) -> &mut HeapData {
        &mut self.get_mut(id).data
    }

    pub fn live_count(&self) -> usize {
        self.arena.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// `ref(value)`: pin as a GC root. No-op for immediates.
    pub fn ref_value(&mut self, v: Value) -> RefHandle {
        match v.heap_id() {
            None => RefHandle {
                id: None,
                owns: false,
            },
            Some(id) => {
                let obj = self.get_mut(id);
                let already = obj.flags.has(REF_BIT);
                obj.flags.set(REF_BIT);
                RefHandle {
                    id: Some(id),
                    owns: !already,
                }
            }
        }
    }

    /// `unref(handle)`: clears `REF_BIT` iff this handle set it.
    pub fn unref(&mut self, handle: RefHandle) {
        if handle.owns {
            if let Some(id) = handle.id {
                if let Some(obj) = self.arena[id.0 as usize].as_mut() {
                    obj.flags.clear(REF_BIT);
                }
            }
        }
    }

    /// Mark phase: walk every root value, following heap structure.
    /// Iterative (explicit work stack) so deeply nested lists don't grow
    /// the Rust call stack.
    fn mark(&mut self, roots: impl IntoIterator<Item = Value>) {
        let mut work: Vec<Value> = roots.into_iter().collect();
        while let Some(v) = work.pop() {
            let Some(id) = v.heap_id() else { continue };
            let obj = &mut self.arena[id.0 as usize]
                .as_mut()
                .expect("dangling HeapId among GC roots");
            if obj.flags.has(GC_MARKED) {
                continue;
            }
            obj.flags.set(GC_MARKED);
            match &obj.data {
                HeapData::Ident { .. } => {}
                HeapData::Cons(cons) => {
                    work.push(cons.value);
                    work.push(cons.next);
                }
                HeapData::Str(s) => {
                    if let crate::value::StrStorage::View { origin, .. } = s.storage {
                        work.push(Value::Str(origin));
                    }
                }
                HeapData::Wrapper(_, inner) => work.push(*inner),
                HeapData::Closure(c) => {
                    work.push(c.formal_args);
                    for form in &c.body {
                        work.push(*form);
                    }
                    work.push(Value::Env(c.lexenv));
                }
                HeapData::ExtFunc(_) => {}
                HeapData::SpecialForm(_) => {}
                HeapData::Env(env) => match env {
                    crate::env::EnvRecord::Normal { syms, below } => {
                        syms.foreach(|id, sym| {
                            work.push(Value::Id(*id));
                            work.push(sym.value);
                        });
                        if let Some(b) = below {
                            work.push(Value::Env(*b));
                        }
                    }
                    crate::env::EnvRecord::Bifurcated { left, right } => {
                        work.push(Value::Env(*left));
                        work.push(Value::Env(*right));
                    }
                },
            }
        }
    }

    /// Every `REF_BIT`-pinned object is a root regardless of reachability
    /// from explicit roots passed in.
    fn ref_pinned_roots(&self) -> Vec<Value> {
        let mut roots = Vec::new();
        for (idx, slot) in self.arena.iter().enumerate() {
            if let Some(obj) = slot {
                if obj.flags.has(REF_BIT) {
                    roots.push(Self::value_for(idx as u32, obj));
                }
            }
        }
        roots
    }

    fn value_for(idx: u32, obj: &HeapObject) -> Value {
        let id = HeapId(idx);
        match &obj.data {
            HeapData::Ident { .. } => Value::Id(id),
            HeapData::Cons(_) => Value::List(id),
            HeapData::Str(_) => Value::Str(id),
            HeapData::Wrapper(WrapperKind::Quote, _) => Value::Quote(id),
            HeapData::Wrapper(WrapperKind::Backquote, _) => Value::Backquote(id),
            HeapData::Wrapper(WrapperKind::Comma, _) => Value::Comma(id),
            HeapData::Wrapper(WrapperKind::Splice, _) => Value::Splice(id),
            HeapData::Closure(_) => Value::Func(id),
            HeapData::ExtFunc(_) => Value::ExtFunc(id),
            HeapData::SpecialForm(_) => Value::SpecialForm(id),
            HeapData::Env(_) => Value::Env(id),
        }
    }

    /// Sweep phase: free every unmarked GC-owned slot, returning the freed
    /// records so the interpreter can run type-specific finalizers (they
    /// need access to interpreter state - the intern table, attribute
    /// tables - that the collector itself doesn't own).
    fn sweep(&mut self) -> Vec<(HeapId, HeapObject)> {
        let mut freed = Vec::new();
        for idx in 0..self.arena.len() {
            let marked = matches!(&self.arena[idx], Some(o) if o.flags.has(GC_MARKED));
            if marked {
                self.arena[idx].as_mut().unwrap().flags.clear(GC_MARKED);
                continue;
            }
            if let Some(obj) = self.arena[idx].take() {
                if obj.flags.has(GC_BIT) {
                    self.free_list.push(idx as u32);
                    freed.push((HeapId(idx as u32), obj));
                } else {
                    self.arena[idx] = Some(obj);
                }
            }
        }
        freed
    }

    /// Run one full mark-and-sweep cycle. Returns freed records for
    /// finalization, or `None` if the collector is already locked (re-entry
    /// from a finalizer is forbidden).
    pub fn collect(&mut self, roots: impl IntoIterator<Item = Value>) -> Option<Vec<(HeapId, HeapObject)>> {
        if self.locked {
            tracing::debug!("collect: skipped, collector already locked");
            return None;
        }
        self.locked = true;
        let before = self.live_count();
        let mut all_roots: Vec<Value> = roots.into_iter().collect();
        all_roots.extend(self.ref_pinned_roots());
        self.mark(all_roots);
        let freed = self.sweep();
        self.locked = false;
        tracing::trace!(before, after = self.live_count(), freed = freed.len(), "gc cycle complete");
        Some(freed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Cons, SeqStr};

    fn alloc_list(gc: &mut Gc, items: &[i64]) -> Value {
        let mut tail = Value::Nil;
        for &i in items.iter().rev() {
            let id = gc.alloc(HeapData::Cons(Cons {
                value: Value::Int(i),
                next: tail,
            }));
            tail = Value::List(id);
        }
        tail
    }

    #[test]
    fn unreachable_objects_are_freed() {
        let mut gc = Gc::new();
        let kept = alloc_list(&mut gc, &[1, 2, 3]);
        let _dropped = alloc_list(&mut gc, &[4, 5]);
        assert_eq!(gc.live_count(), 5);
        gc.collect(vec![kept]);
        assert_eq!(gc.live_count(), 3);
    }

    #[test]
    fn ref_pinned_objects_survive_without_being_a_root() {
        let mut gc = Gc::new();
        let v = alloc_list(&mut gc, &[1]);
        let handle = gc.ref_value(v);
        gc.collect(vec![]);
        assert_eq!(gc.live_count(), 1);
        gc.unref(handle);
        gc.collect(vec![]);
        assert_eq!(gc.live_count(), 0);
    }

    #[test]
    fn nested_refs_compose() {
        let mut gc = Gc::new();
        let s = gc.alloc(HeapData::Str(SeqStr::owned(b"hi")));
        let v = Value::Str(s);
        let outer = gc.ref_value(v);
        let inner = gc.ref_value(v);
        gc.unref(inner); // no-op, didn't own the bit
        gc.collect(vec![]);
        assert_eq!(gc.live_count(), 1);
        gc.unref(outer);
        gc.collect(vec![]);
        assert_eq!(gc.live_count(), 0);
    }

    #[test]
    fn cyclic_structures_do_not_hang_the_marker() {
        let mut gc = Gc::new();
        let id = gc.alloc(HeapData::Cons(Cons {
            value: Value::Int(1),
            next: Value::Nil,
        }));
        // Make the cons cell's `next` point back to itself.
        if let HeapData::Cons(c) = gc.data_mut(id) {
            c.next = Value::List(id);
        }
        gc.collect(vec![Value::List(id)]);
        assert_eq!(gc.live_count(), 1);
    }
}
