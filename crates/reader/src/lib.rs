//! S-expression reader and printer for the Ember interpreter.
//!
//! This crate is deliberately outside `ember-core`: the core names a
//! "reader" and a "printer" as external collaborators it hands forms to
//! and receives forms from, but never implements itself, so that a host
//! embedding the core is free to bring its own surface syntax. This
//! crate is the reference syntax used by [`ember-repl`] and by the
//! core's own doc tests.
//!
//! ```
//! use ember_core::interp::Interp;
//! use ember_core::prelude;
//! use ember_reader::{parser, printer};
//!
//! let mut interp = Interp::new();
//! prelude::install(&mut interp).unwrap();
//! let env = interp.global_env();
//!
//! let form = parser::read_one(&mut interp, "(+ 1 2)").unwrap().unwrap();
//! let result = interp.eval_top(form, env).unwrap();
//! assert_eq!(printer::print_value(&interp.gc, result), "3");
//! ```

pub mod lexer;
pub mod parser;
pub mod printer;

pub use parser::{read_all, read_one, ReadError, Reader};
pub use printer::print_value;
