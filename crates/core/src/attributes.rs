//! Side-band metadata attached to heap objects without changing their
//! type.
//!
//! Three tables, keyed by the heap object's [`HeapId`]:
//! - `ORIG-FORM` — the pre-macro-expansion list, for diagnostics.
//! - `LOCATION` — `{file, byte-offset, line}` for reader-produced forms.
//! - `DOC` — a doc string, keyed on the identifier naming the symbol
//!   (identifiers already have stable heap identity, so there's no need
//!   for a separate symbol-object heap allocation just to hang a doc
//!   string off of).
//!
//! Presence in a table is mirrored as a bit in the object's `rtflags`
//! (enforced invariant: bit set iff table has an entry) so hot-path code
//! can test `flags.has(ATTR_DOC)` without touching the hash table.

use crate::flags::{ATTR_DOC, ATTR_LOCATION, ATTR_ORIG_FORM};
use crate::gc::Gc;
use crate::hashtable::SeqHashTable;
use crate::value::{HeapId, Value};

#[derive(Debug, Clone)]
pub struct Location {
    pub file: Option<String>,
    pub byte_offset: usize,
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    OrigForm,
    Location,
    Doc,
}

impl AttrKind {
    fn bit(self) -> u16 {
        match self {
            AttrKind::OrigForm => ATTR_ORIG_FORM,
            AttrKind::Location => ATTR_LOCATION,
            AttrKind::Doc => ATTR_DOC,
        }
    }
}

pub struct Attributes {
    orig_form: SeqHashTable<HeapId, Value>,
    location: SeqHashTable<HeapId, Location>,
    doc: SeqHashTable<HeapId, String>,
}

impl Default for Attributes {
    fn default() -> Self {
        Self::new()
    }
}

impl Attributes {
    pub fn new() -> Self {
        Attributes {
            orig_form: SeqHashTable::new(),
            location: SeqHashTable::new(),
            doc: SeqHashTable::new(),
        }
    }

    pub fn set_orig_form(&mut self, gc: &mut Gc, id: HeapId, orig: Value) {
        self.orig_form.set(id, orig).expect("attribute table full");
        gc.get_mut(id).flags.set(AttrKind::OrigForm.bit());
    }

    pub fn orig_form(&self, id: HeapId) -> Option<Value> {
        self.orig_form.get(&id).copied()
    }

    pub fn set_location(&mut self, gc: &mut Gc, id: HeapId, loc: Location) {
        self.location.set(id, loc).expect("attribute table full");
        gc.get_mut(id).flags.set(AttrKind::Location.bit());
    }

    pub fn location(&self, id: HeapId) -> Option<&Location> {
        self.location.get(&id)
    }

    pub fn set_doc(&mut self, gc: &mut Gc, id: HeapId, doc: String) {
        self.doc.set(id, doc).expect("attribute table full");
        gc.get_mut(id).flags.set(AttrKind::Doc.bit());
    }

    pub fn doc(&self, id: HeapId) -> Option<&str> {
        self.doc.get(&id).map(String::as_str)
    }

    /// All live doc strings; always marked as GC roots.
    pub fn doc_entries(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.doc.foreach(|_, v| out.push(v.clone()));
        out
    }

    /// Every `ORIG-FORM` value currently on file. The expanded macro
    /// result they're keyed on may be the only other thing pointing at
    /// them (or may itself have gone out of scope while the attribute
    /// lingers until the next sweep's `remove_all`), so a collection
    /// needs these as roots in their own right rather than relying on
    /// the key's reachability.
    pub fn orig_form_values(&self) -> Vec<Value> {
        let mut out = Vec::new();
        self.orig_form.foreach(|_, v| out.push(*v));
        out
    }

    pub fn copy(&mut self, gc: &mut Gc, kind: AttrKind, from: HeapId, to: HeapId) {
        match kind {
            AttrKind::OrigForm => {
                if let Some(v) = self.orig_form(from) {
                    self.set_orig_form(gc, to, v);
                }
            }
            AttrKind::Location => {
                if let Some(v) = self.location(from).cloned() {
                    self.set_location(gc, to, v);
                }
            }
            AttrKind::Doc => {
                if let Some(v) = self.doc(from).map(str::to_string) {
                    self.set_doc(gc, to, v);
                }
            }
        }
    }

    /// Strip every attribute from `id` (used by list finalization).
    pub fn remove_all(&mut self, id: HeapId) {
        self.orig_form.remove(&id);
        self.location.remove(&id);
        self.doc.remove(&id);
    }
}
