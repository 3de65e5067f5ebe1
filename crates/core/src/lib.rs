//! Ember: an embeddable Lisp-family interpreter core.
//!
//! This crate carries the interpreter's design-risk subsystems: the
//! tagged value representation, the mark-and-sweep collector, the
//! interned identifier table, nested lexical environments, the
//! evaluator (tail calls, quasiquote, macro expansion), the static
//! preprocessor, and the `unpack` argument parser. A reader, printer,
//! and CLI are separate crates that talk to this one only through
//! [`interp::Interp`] and the [`value::Value`] constructors.
//!
//! A fresh instance is inert until [`prelude::install`] registers the
//! special forms and host functions a program needs to do anything:
//!
//! ```
//! use ember_core::interp::Interp;
//! use ember_core::{prelude, eval};
//! use ember_core::value::Value;
//!
//! let mut interp = Interp::new();
//! prelude::install(&mut interp).unwrap();
//! let env = interp.global_env();
//!
//! let plus = interp.intern.intern(&mut interp.gc, "+");
//! let call = eval::build_list(&mut interp, &[Value::Id(plus), Value::Int(1), Value::Int(2)]).unwrap();
//! assert_eq!(interp.eval_top(call, env).unwrap(), Value::Int(3));
//! ```

pub mod alloc;
pub mod attributes;
pub mod config;
pub mod env;
pub mod error;
pub mod eval;
pub mod flags;
pub mod gc;
pub mod hashtable;
pub mod intern;
pub mod interp;
pub mod prelude;
pub mod preprocessor;
pub mod types;
pub mod unpack;
pub mod value;
