//! Recursive-descent parser building [`Value`]s directly in an
//! interpreter's heap. The reader is an external collaborator of the
//! core (per its scope): it talks to `ember_core` only through
//! `Interp::alloc`, `Interp::intern`, and the public value constructors,
//! the same surface a host embedder would use.

use ember_core::attributes::Location;
use ember_core::error::ErrorCode;
use ember_core::eval::build_list;
use ember_core::interp::Interp;
use ember_core::value::{Cons, HeapData, HeapId, SeqStr, Value, WrapperKind};

use crate::lexer::{LexError, Lexer, TokKind, Token};

#[derive(Debug, Clone, PartialEq)]
pub enum ReadError {
    /// Reached end of input with open parens outstanding; a REPL can use
    /// this to distinguish "keep reading more lines" from a real error.
    UnexpectedEof,
    UnexpectedCloseParen { line: u32 },
    BadNumber { text: String, line: u32 },
    Lex(LexError),
    Alloc(ErrorCode, String),
}

impl From<ReadError> for (ErrorCode, String) {
    fn from(e: ReadError) -> Self {
        match e {
            ReadError::UnexpectedEof => (ErrorCode::Eof, "unexpected end of input".into()),
            ReadError::UnexpectedCloseParen { line } => {
                (ErrorCode::Lex, format!("line {line}: unexpected ')'"))
            }
            ReadError::BadNumber { text, line } => {
                (ErrorCode::Lex, format!("line {line}: malformed number '{text}'"))
            }
            ReadError::Lex(LexError::UnterminatedString { line }) => {
                (ErrorCode::Lex, format!("line {line}: unterminated string literal"))
            }
            ReadError::Lex(LexError::BadEscape { line, ch }) => {
                (ErrorCode::Lex, format!("line {line}: bad escape '\\{ch}'"))
            }
            ReadError::Alloc(code, msg) => (code, msg),
        }
    }
}

fn alloc_err(e: (ErrorCode, String)) -> ReadError {
    ReadError::Alloc(e.0, e.1)
}

pub struct Reader<'a, 'src> {
    interp: &'a mut Interp,
    lexer: Lexer<'src>,
    peeked: Option<Token>,
    file: Option<String>,
}

impl<'a, 'src> Reader<'a, 'src> {
    pub fn new(interp: &'a mut Interp, src: &'src str, file: Option<&str>) -> Self {
        Reader {
            interp,
            lexer: Lexer::new(src),
            peeked: None,
            file: file.map(str::to_string),
        }
    }

    fn next(&mut self) -> Result<Option<Token>, ReadError> {
        if let Some(tok) = self.peeked.take() {
            return Ok(Some(tok));
        }
        self.lexer.next_token().map_err(ReadError::Lex)
    }

    fn peek(&mut self) -> Result<Option<&Token>, ReadError> {
        if self.peeked.is_none() {
            self.peeked = self.lexer.next_token().map_err(ReadError::Lex)?;
        }
        Ok(self.peeked.as_ref())
    }

    /// Read one top-level form, or `Ok(None)` if the input is exhausted
    /// at a form boundary (no partial form pending).
    pub fn read(&mut self) -> Result<Option<Value>, ReadError> {
        if self.peek()?.is_none() {
            return Ok(None);
        }
        self.read_form().map(Some)
    }

    /// Read every top-level form to end of input.
    pub fn read_all(&mut self) -> Result<Vec<Value>, ReadError> {
        let mut out = Vec::new();
        while let Some(v) = self.read()? {
            out.push(v);
        }
        Ok(out)
    }

    fn read_form(&mut self) -> Result<Value, ReadError> {
        let tok = self.next()?.ok_or(ReadError::UnexpectedEof)?;
        match tok.kind {
            TokKind::LParen => self.read_list(tok.line, tok.byte_offset),
            TokKind::RParen => Err(ReadError::UnexpectedCloseParen { line: tok.line }),
            TokKind::Quote => self.read_wrapped(WrapperKind::Quote),
            TokKind::Backquote => self.read_wrapped(WrapperKind::Backquote),
            TokKind::Comma => self.read_wrapped(WrapperKind::Comma),
            TokKind::CommaAt => self.read_wrapped(WrapperKind::Splice),
            TokKind::Str(s) => self.make_string(&s),
            TokKind::Atom(a) => self.read_atom(&a, tok.line),
        }
    }

    fn read_wrapped(&mut self, kind: WrapperKind) -> Result<Value, ReadError> {
        let inner = self.read_form()?;
        let id = self
            .interp
            .alloc(HeapData::Wrapper(kind, inner))
            .map_err(alloc_err)?;
        Ok(match kind {
            WrapperKind::Quote => Value::Quote(id),
            WrapperKind::Backquote => Value::Backquote(id),
            WrapperKind::Comma => Value::Comma(id),
            WrapperKind::Splice => Value::Splice(id),
        })
    }

    fn read_list(&mut self, line: u32, byte_offset: usize) -> Result<Value, ReadError> {
        let mut items = Vec::new();
        loop {
            match self.peek()? {
                None => return Err(ReadError::UnexpectedEof),
                Some(Token { kind: TokKind::RParen, .. }) => {
                    self.next()?;
                    break;
                }
                _ => items.push(self.read_form()?),
            }
        }
        let list = build_list(self.interp, &items).map_err(alloc_err)?;
        if self.interp.config.gen_debug_info {
            if let Some(id) = list.heap_id() {
                self.interp.attributes.set_location(
                    &mut self.interp.gc,
                    id,
                    Location {
                        file: self.file.clone(),
                        byte_offset,
                        line,
                    },
                );
            }
        }
        Ok(list)
    }

    fn make_string(&mut self, s: &str) -> Result<Value, ReadError> {
        let id = self
            .interp
            .alloc(HeapData::Str(SeqStr::owned(s.as_bytes())))
            .map_err(alloc_err)?;
        Ok(Value::Str(id))
    }

    fn read_atom(&mut self, text: &str, line: u32) -> Result<Value, ReadError> {
        match text {
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            "nil" => return Ok(Value::Nil),
            _ => {}
        }
        if let Some(v) = parse_number(text) {
            return match v {
                Ok(n) => Ok(n),
                Err(()) => Err(ReadError::BadNumber { text: text.to_string(), line }),
            };
        }
        let id = self.interp.intern.intern(&mut self.interp.gc, text);
        Ok(Value::Id(id))
    }
}

/// `None` if `text` doesn't look numeric at all (an ordinary
/// identifier); `Some(Err(()))` if it looks numeric but doesn't parse
/// (e.g. `1.2.3`), which the reader surfaces as a lex error rather than
/// silently treating as a symbol.
fn parse_number(text: &str) -> Option<Result<Value, ()>> {
    let starts_numeric = text
        .strip_prefix(['+', '-'])
        .unwrap_or(text)
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit());
    if !starts_numeric {
        return None;
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Ok(Value::Int(i)));
    }
    if text.contains('.') || text.contains(['e', 'E']) {
        if let Ok(d) = text.parse::<f64>() {
            return Some(Ok(Value::Double(d)));
        }
    }
    Some(Err(()))
}

/// Read every top-level form in `src` into fresh heap records owned by
/// `interp`.
pub fn read_all(interp: &mut Interp, src: &str, file: Option<&str>) -> Result<Vec<Value>, ReadError> {
    Reader::new(interp, src, file).read_all()
}

/// Read a single top-level form, or `None` if `src` holds no more forms.
pub fn read_one(interp: &mut Interp, src: &str) -> Result<Option<Value>, ReadError> {
    Reader::new(interp, src, None).read()
}

/// Walk a proper list's cons spine into a flat `Vec`, stopping at `Nil`.
/// Test-only helper standing in for the core's internal list-walking
/// (the core keeps that private; a reader has no need for it outside
/// assertions).
#[cfg(test)]
fn collect_list(interp: &Interp, mut v: Value) -> Vec<Value> {
    let mut out = Vec::new();
    while let Value::List(id) = v {
        match interp.gc.data(id) {
            HeapData::Cons(Cons { value, next }) => {
                out.push(*value);
                v = *next;
            }
            _ => break,
        }
    }
    out
}

#[cfg(test)]
fn wrapper_inner(interp: &Interp, id: HeapId) -> Value {
    match interp.gc.data(id) {
        HeapData::Wrapper(_, inner) => *inner,
        _ => panic!("not a wrapper record"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_integers_and_doubles() {
        let mut interp = Interp::new();
        let forms = read_all(&mut interp, "1 -2 3.5 -0.5", None).unwrap();
        assert_eq!(forms, vec![Value::Int(1), Value::Int(-2), Value::Double(3.5), Value::Double(-0.5)]);
    }

    #[test]
    fn reads_a_nested_list() {
        let mut interp = Interp::new();
        let forms = read_all(&mut interp, "(+ 1 (* 2 3))", None).unwrap();
        assert_eq!(forms.len(), 1);
        let elems = collect_list(&interp, forms[0]);
        assert_eq!(elems.len(), 3);
        assert_eq!(elems[1], Value::Int(1));
        let inner = collect_list(&interp, elems[2]);
        assert_eq!(inner[1], Value::Int(2));
    }

    #[test]
    fn quote_sugar_wraps_the_following_form() {
        let mut interp = Interp::new();
        let forms = read_all(&mut interp, "'(1 2)", None).unwrap();
        assert!(matches!(forms[0], Value::Quote(_)));
    }

    #[test]
    fn quasiquote_comma_splice_sugar() {
        let mut interp = Interp::new();
        let forms = read_all(&mut interp, "`(1 ,x ,@xs)", None).unwrap();
        let backquoted = match forms[0] {
            Value::Backquote(id) => wrapper_inner(&interp, id),
            _ => panic!("expected backquote"),
        };
        let elems = collect_list(&interp, backquoted);
        assert!(matches!(elems[1], Value::Comma(_)));
        assert!(matches!(elems[2], Value::Splice(_)));
    }

    #[test]
    fn booleans_and_nil() {
        let mut interp = Interp::new();
        let forms = read_all(&mut interp, "true false nil ()", None).unwrap();
        assert_eq!(forms[0], Value::Bool(true));
        assert_eq!(forms[1], Value::Bool(false));
        assert_eq!(forms[2], Value::Nil);
        assert_eq!(forms[3], Value::Nil);
    }

    #[test]
    fn strings_are_heap_allocated() {
        let mut interp = Interp::new();
        let forms = read_all(&mut interp, r#""hello world""#, None).unwrap();
        assert!(matches!(forms[0], Value::Str(_)));
    }

    #[test]
    fn unterminated_list_is_unexpected_eof() {
        let mut interp = Interp::new();
        let err = read_all(&mut interp, "(+ 1 2", None).unwrap_err();
        assert_eq!(err, ReadError::UnexpectedEof);
    }

    #[test]
    fn unmatched_close_paren_is_an_error() {
        let mut interp = Interp::new();
        let err = read_all(&mut interp, ")", None).unwrap_err();
        assert!(matches!(err, ReadError::UnexpectedCloseParen { .. }));
    }

    #[test]
    fn equal_identifiers_across_reads_intern_to_the_same_id() {
        let mut interp = Interp::new();
        let a = read_one(&mut interp, "foo").unwrap().unwrap();
        let b = read_one(&mut interp, "foo").unwrap().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn malformed_number_is_a_read_error() {
        let mut interp = Interp::new();
        let err = read_all(&mut interp, "1.2.3", None).unwrap_err();
        assert!(matches!(err, ReadError::BadNumber { .. }));
    }

    /// Evaluate every top-level form in `src`, returning the last result.
    /// Panics (surfacing the thrown code/message) if any form fails.
    fn run(interp: &mut Interp, src: &str) -> Value {
        let forms = read_all(interp, src, None).unwrap();
        let env = interp.global_env();
        let mut result = Value::Nil;
        for form in forms {
            result = interp.eval_top(form, env).unwrap();
            assert!(
                !interp.errors.is_set(),
                "eval error: {} {:?}",
                interp.errors.errno(),
                interp.errors.message()
            );
        }
        result
    }

    /// Spec scenario: `(+ 1 2)` ⇒ `3`.
    #[test]
    fn end_to_end_addition() {
        let mut interp = Interp::new();
        ember_core::prelude::install(&mut interp).unwrap();
        assert_eq!(run(&mut interp, "(+ 1 2)"), Value::Int(3));
    }

    /// Spec scenario: an anonymous closure applied immediately.
    #[test]
    fn end_to_end_immediate_closure_application() {
        let mut interp = Interp::new();
        ember_core::prelude::install(&mut interp).unwrap();
        assert_eq!(run(&mut interp, "((fn (x) (* x x)) 5)"), Value::Int(25));
    }

    /// Spec scenario: `defmacro` expanding `twice` to evaluate its
    /// argument form twice, observed through a mutation that must
    /// therefore run twice.
    #[test]
    fn end_to_end_macro_expansion_runs_its_argument_form_twice() {
        let mut interp = Interp::new();
        ember_core::prelude::install(&mut interp).unwrap();
        let result = run(
            &mut interp,
            "(defmacro twice (x) `(do ,x ,x)) \
             (let ((c 0)) (twice (set! c (+ c 1))) c)",
        );
        assert_eq!(result, Value::Int(2));
    }

    /// Spec scenario: `try`/`throw`/`catch` round-trips the thrown
    /// message string through the bound error variable, only entering
    /// the clause whose code matches the one thrown.
    #[test]
    fn end_to_end_try_catch_recovers_the_thrown_message() {
        let mut interp = Interp::new();
        ember_core::prelude::install(&mut interp).unwrap();
        let result = run(&mut interp, r#"(try (throw EVALUE "boom") (catch EVALUE errmsg))"#);
        match result {
            Value::Str(id) => {
                let bytes = match interp.gc.data(id) {
                    HeapData::Str(s) => match &s.storage {
                        ember_core::value::StrStorage::Owned(b) => b.to_vec(),
                        _ => panic!("expected an owned string"),
                    },
                    _ => unreachable!(),
                };
                assert_eq!(bytes, b"boom");
            }
            other => panic!("expected a string, got {other:?}"),
        }
    }

    /// Spec scenario: a self-tail-recursive loop over a large `n`
    /// completes without overflowing the native stack, because TCE keeps
    /// the trampoline in `eval_inner` from recursing through `eval` at
    /// each iteration.
    #[test]
    fn end_to_end_deep_tail_recursion_does_not_overflow_the_stack() {
        let mut interp = Interp::new();
        ember_core::prelude::install(&mut interp).unwrap();
        let result = run(
            &mut interp,
            "(let ((loop (fn (n) (if (<= n 0) 'done (loop (- n 1)))))) (loop 200000))",
        );
        match result {
            Value::Id(id) => {
                let name = match interp.gc.data(id) {
                    HeapData::Ident { name, .. } => name.to_string(),
                    _ => unreachable!(),
                };
                assert_eq!(name, "done");
            }
            other => panic!("expected the identifier 'done', got {other:?}"),
        }
    }
}
