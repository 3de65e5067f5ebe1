//! Interned identifier table.
//!
//! For any byte sequence there is at most one identifier record per
//! interpreter instance; pointer (here, [`HeapId`]) equality therefore
//! implies identifier equality. A handful of "standard identifiers" are
//! pre-interned at startup so evaluator hot paths (`:`  in dotted
//! patterns, `catch`/`finally` keywords) can compare by id rather than by
//! string.

use crate::gc::Gc;
use crate::hashtable::{SeqHashTable, djb2};
use crate::value::{HeapData, HeapId};

pub struct Intern {
    table: SeqHashTable<String, HeapId>,
    pub std_colon: HeapId,
    pub std_defget: HeapId,
    pub std_defset: HeapId,
    pub std_catch: HeapId,
    pub std_finally: HeapId,
}

impl Intern {
    /// Construct the table and pre-intern the standard identifiers. Takes
    /// `gc` because pre-interning allocates heap records up front.
    pub fn new_in(gc: &mut Gc) -> Self {
        let mut table = SeqHashTable::new();
        let mut mk = |gc: &mut Gc, table: &mut SeqHashTable<String, HeapId>, name: &str| {
            let id = gc.alloc(HeapData::Ident {
                name: name.into(),
                hash: djb2(name.as_bytes()),
            });
            table.set(name.to_string(), id).expect("startup intern never hits the ceiling");
            id
        };
        let std_colon = mk(gc, &mut table, ":");
        let std_defget = mk(gc, &mut table, "defget");
        let std_defset = mk(gc, &mut table, "defset");
        let std_catch = mk(gc, &mut table, "catch");
        let std_finally = mk(gc, &mut table, "finally");
        Intern {
            table,
            std_colon,
            std_defget,
            std_defset,
            std_catch,
            std_finally,
        }
    }

    /// Test-only convenience: builds its own throwaway `Gc` is not
    /// possible here since identifiers must live in the caller's arena;
    /// callers needing a quick identifier still go through [`Self::intern`].
    #[cfg(test)]
    pub fn new() -> Self {
        // Only used by unit tests in other modules that don't otherwise
        // need the standard identifiers; build against a scratch arena.
        let mut gc = Gc::new();
        Self::new_in(&mut gc)
    }

    pub fn intern(&mut self, gc: &mut Gc, name: &str) -> HeapId {
        if let Some(id) = self.table.get(&name.to_string()) {
            return *id;
        }
        let id = gc.alloc(HeapData::Ident {
            name: name.into(),
            hash: djb2(name.as_bytes()),
        });
        self.table
            .set(name.to_string(), id)
            .expect("identifier table at capacity ceiling");
        id
    }

    pub fn lookup(&self, name: &str) -> Option<HeapId> {
        self.table.get(&name.to_string()).copied()
    }

    /// Finalizer hook: an identifier's heap record was freed by the GC;
    /// unlink it from the table too.
    pub fn remove(&mut self, name: &str) {
        self.table.remove(&name.to_string());
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_byte_sequences_intern_to_the_same_id() {
        let mut gc = Gc::new();
        let mut intern = Intern::new_in(&mut gc);
        let a = intern.intern(&mut gc, "foo");
        let b = intern.intern(&mut gc, "foo");
        assert_eq!(a, b);
        let c = intern.intern(&mut gc, "bar");
        assert_ne!(a, c);
    }

    #[test]
    fn standard_identifiers_are_preinterned() {
        let mut gc = Gc::new();
        let intern = Intern::new_in(&mut gc);
        assert_eq!(intern.lookup(":"), Some(intern.std_colon));
        assert_eq!(intern.lookup("catch"), Some(intern.std_catch));
    }

    #[test]
    fn removal_drops_the_mapping() {
        let mut gc = Gc::new();
        let mut intern = Intern::new_in(&mut gc);
        intern.intern(&mut gc, "temp");
        assert!(intern.lookup("temp").is_some());
        intern.remove("temp");
        assert!(intern.lookup("temp").is_none());
    }
}
