//! Runtime-extensible alias/cast system over the base type tags.
//!
//! The registry is append-only, starting at `BASIC_LAST + 1`. Each alias
//! carries an optional custom printer and a list of casts to other types.
//! Modeled as a plain array of small records with function pointers
//! (closures, here) rather than trait-object inheritance, per the design
//! note on avoiding dynamic dispatch via language-level hierarchies.

use std::rc::Rc;

use crate::value::{Value, BASIC_LAST};

pub type PrinterFn = Rc<dyn Fn(Value) -> String>;
pub type ConverterFn = Rc<dyn Fn(Value) -> Value>;

pub struct Cast {
    pub target: u16,
    pub converter: ConverterFn,
}

pub struct TypeEntry {
    pub name: String,
    pub base_type: u16,
    pub printer: Option<PrinterFn>,
    pub casts: Vec<Cast>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleDetected;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryFull;

pub struct TypeRegistry {
    entries: Vec<TypeEntry>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    const CEILING: usize = (u16::MAX as usize) - (BASIC_LAST as usize);

    pub fn new() -> Self {
        TypeRegistry { entries: Vec::new() }
    }

    /// Register a new alias, returning its tag.
    pub fn register(&mut self, name: impl Into<String>, base_type: u16) -> Result<u16, RegistryFull> {
        if self.entries.len() >= Self::CEILING {
            return Err(RegistryFull);
        }
        self.entries.push(TypeEntry {
            name: name.into(),
            base_type,
            printer: None,
            casts: Vec::new(),
        });
        Ok(BASIC_LAST + 1 + (self.entries.len() as u16 - 1))
    }

    fn entry(&self, tag: u16) -> Option<&TypeEntry> {
        if tag <= BASIC_LAST {
            None
        } else {
            self.entries.get((tag - BASIC_LAST - 1) as usize)
        }
    }

    fn entry_mut(&mut self, tag: u16) -> Option<&mut TypeEntry> {
        if tag <= BASIC_LAST {
            None
        } else {
            self.entries.get_mut((tag - BASIC_LAST - 1) as usize)
        }
    }

    pub fn name_of(&self, tag: u16) -> Option<&str> {
        self.entry(tag).map(|e| e.name.as_str())
    }

    pub fn set_printer(&mut self, tag: u16, printer: PrinterFn) {
        if let Some(e) = self.entry_mut(tag) {
            e.printer = Some(printer);
        }
    }

    pub fn printer(&self, tag: u16) -> Option<PrinterFn> {
        self.entry(tag).and_then(|e| e.printer.clone())
    }

    pub fn add_cast(&mut self, src: u16, dst: u16, converter: ConverterFn) {
        if let Some(e) = self.entry_mut(src) {
            e.casts.push(Cast {
                target: dst,
                converter,
            });
        }
    }

    /// Reduce an alias chain to its basic type, detecting cycles.
    pub fn resolve_type(&self, tag: u16) -> Result<u16, CycleDetected> {
        let mut seen = Vec::new();
        let mut t = tag;
        while t > BASIC_LAST {
            if seen.contains(&t) {
                return Err(CycleDetected);
            }
            seen.push(t);
            t = match self.entry(t) {
                Some(e) => e.base_type,
                None => return Ok(t),
            };
        }
        Ok(t)
    }

    /// `cast(v, t)`: succeeds iff `v`'s type equals `t`, `v`'s immediate
    /// base type equals `t`, or (for user aliases) a registered converter
    /// chain reaches `t`.
    pub fn cast(&self, v: Value, v_tag: u16, t: u16) -> Option<Value> {
        if v_tag == t {
            return Some(v);
        }
        if self.resolve_type(v_tag).ok() == Some(t) {
            return Some(v);
        }
        if let Some(e) = self.entry(v_tag) {
            for c in &e.casts {
                if c.target == t {
                    return Some((c.converter)(v));
                }
                // allow one hop through the target's own alias chain
                if self.resolve_type(c.target).ok() == Some(t) {
                    return Some((c.converter)(v));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TypeTag;

    #[test]
    fn register_and_resolve_to_basic() {
        let mut reg = TypeRegistry::new();
        let meters = reg.register("meters", TypeTag::Double as u16).unwrap();
        assert_eq!(reg.resolve_type(meters), Ok(TypeTag::Double as u16));
    }

    #[test]
    fn resolve_detects_cycles() {
        let mut reg = TypeRegistry::new();
        let a = reg.register("a", BASIC_LAST + 2).unwrap();
        let _b = reg.register("b", a).unwrap();
        // Manually corrupt `a`'s base to point at `b`, forming a cycle.
        reg.entries[(a - BASIC_LAST - 1) as usize].base_type = a + 1;
        assert_eq!(reg.resolve_type(a), Err(CycleDetected));
    }

    #[test]
    fn cast_via_converter_chain() {
        let mut reg = TypeRegistry::new();
        let celsius = reg.register("celsius", TypeTag::Double as u16).unwrap();
        let fahrenheit = reg.register("fahrenheit", TypeTag::Double as u16).unwrap();
        reg.add_cast(
            celsius,
            fahrenheit,
            Rc::new(|v| match v {
                Value::Double(c) => Value::Double(c * 9.0 / 5.0 + 32.0),
                other => other,
            }),
        );
        let result = reg.cast(Value::Double(0.0), celsius, fahrenheit).unwrap();
        assert_eq!(result, Value::Double(32.0));
    }
}
