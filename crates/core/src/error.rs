//! Error codes, thrown-state machine, and backtrace ring buffer.
//!
//! Errors are not exceptions in the Rust sense: they are interpreter-level
//! state. `throw` sets it; every evaluator step and every builtin checks it
//! on entry and propagates a nil value without doing further work once set.
//! `try/catch/finally` is the only thing that clears it (other than
//! `clear_error`).

use std::fmt;

/// Built-in error codes. Negative values are reserved for internal use by
/// embedders extending the core; positive values here are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    Read = 1,
    Eof,
    Lex,
    Eval,
    NoSym,
    Stack,
    Type,
    Match,
    Nil,
    DivZero,
    ReadOnly,
    WriteOnly,
    Value,
    Overflow,
    Api,
    Io,
    NoMem,
    Exist,
    Static,
    Index,
}

/// First code number available to host-registered error names.
pub const EUSER0: i32 = 1000;

const BUILTIN_NAMES: &[(i32, &str)] = &[
    (ErrorCode::Read as i32, "EREAD"),
    (ErrorCode::Eof as i32, "EEOF"),
    (ErrorCode::Lex as i32, "ELEX"),
    (ErrorCode::Eval as i32, "EEVAL"),
    (ErrorCode::NoSym as i32, "ENOSYM"),
    (ErrorCode::Stack as i32, "ESTACK"),
    (ErrorCode::Type as i32, "ETYPE"),
    (ErrorCode::Match as i32, "EMATCH"),
    (ErrorCode::Nil as i32, "ENIL"),
    (ErrorCode::DivZero as i32, "EDIVZERO"),
    (ErrorCode::ReadOnly as i32, "EREADONLY"),
    (ErrorCode::WriteOnly as i32, "EWRITEONLY"),
    (ErrorCode::Value as i32, "EVALUE"),
    (ErrorCode::Overflow as i32, "EOVERFLOW"),
    (ErrorCode::Api as i32, "EAPI"),
    (ErrorCode::Io as i32, "EIO"),
    (ErrorCode::NoMem as i32, "ENOMEM"),
    (ErrorCode::Exist as i32, "EEXIST"),
    (ErrorCode::Static as i32, "ESTATIC"),
    (ErrorCode::Index as i32, "EINDEX"),
];

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", code_name(*self as i32).unwrap_or("EUNKNOWN"))
    }
}

/// A single backtrace frame: where evaluation entered a user form.
#[derive(Debug, Clone)]
pub struct Frame {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub form_summary: String,
}

/// Thrown-error state plus a ring-buffer backtrace, owned by the
/// interpreter instance.
pub struct ErrorState {
    code: i32,
    message: Option<String>,
    backtrace: Vec<Frame>,
    backtrace_limit: usize,
    user_codes: Vec<(i32, String)>,
    next_user_code: i32,
}

impl Default for ErrorState {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorState {
    pub fn new() -> Self {
        ErrorState {
            code: 0,
            message: None,
            backtrace: Vec::new(),
            backtrace_limit: 32,
            user_codes: Vec::new(),
            next_user_code: EUSER0,
        }
    }

    pub fn is_set(&self) -> bool {
        self.code != 0
    }

    pub fn errno(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn throw(&mut self, code: i32, msg: impl Into<String>) {
        self.code = code;
        self.message = Some(msg.into());
    }

    pub fn clear(&mut self) {
        self.code = 0;
        self.message = None;
        self.backtrace.clear();
    }

    /// Push a frame, evicting the oldest if over the configured limit.
    pub fn push_frame(&mut self, frame: Frame) {
        if self.backtrace.len() >= self.backtrace_limit {
            self.backtrace.remove(0);
        }
        self.backtrace.push(frame);
    }

    pub fn backtrace(&self) -> &[Frame] {
        &self.backtrace
    }

    pub fn set_backtrace_limit(&mut self, limit: usize) {
        self.backtrace_limit = limit;
    }

    /// Register a new user error code, returning its number.
    pub fn register_code(&mut self, name: impl Into<String>) -> i32 {
        let code = self.next_user_code;
        self.next_user_code += 1;
        self.user_codes.push((code, name.into()));
        code
    }

    pub fn code_name(&self, code: i32) -> Option<String> {
        if code < EUSER0 {
            code_name(code).map(str::to_string)
        } else {
            self.user_codes
                .iter()
                .find(|(c, _)| *c == code)
                .map(|(_, n)| n.clone())
        }
    }

    /// `perror prefix`: formats "prefix: message [CODENAME]".
    pub fn perror_string(&self, prefix: &str) -> String {
        let name = self
            .code_name(self.code)
            .unwrap_or_else(|| "EUNKNOWN".to_string());
        format!(
            "{}: {} [{}]",
            prefix,
            self.message.as_deref().unwrap_or(""),
            name
        )
    }
}

/// Binary search over the builtin code table (sorted by construction).
pub fn code_name(code: i32) -> Option<&'static str> {
    BUILTIN_NAMES
        .binary_search_by_key(&code, |(c, _)| *c)
        .ok()
        .map(|idx| BUILTIN_NAMES[idx].1)
}

/// Every builtin `(code, name)` pair, e.g. `(ErrorCode::Value as i32,
/// "EVALUE")`. Used to expose each code under its name as a global
/// constant so guest code can write `(throw EVALUE "...")` instead of
/// a bare integer.
pub fn builtin_codes() -> &'static [(i32, &'static str)] {
    BUILTIN_NAMES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_is_sorted_for_binary_search() {
        let mut sorted = BUILTIN_NAMES.to_vec();
        sorted.sort_by_key(|(c, _)| *c);
        assert_eq!(sorted, BUILTIN_NAMES.to_vec());
    }

    #[test]
    fn throw_and_clear() {
        let mut e = ErrorState::new();
        assert!(!e.is_set());
        e.throw(ErrorCode::Value as i32, "boom");
        assert!(e.is_set());
        assert_eq!(e.message(), Some("boom"));
        e.clear();
        assert!(!e.is_set());
    }

    #[test]
    fn user_codes_start_at_euser0() {
        let mut e = ErrorState::new();
        let c1 = e.register_code("emy-custom");
        assert_eq!(c1, EUSER0);
        assert_eq!(e.code_name(c1).as_deref(), Some("emy-custom"));
    }

    #[test]
    fn backtrace_ring_buffer_evicts_oldest() {
        let mut e = ErrorState::new();
        e.set_backtrace_limit(2);
        e.push_frame(Frame {
            file: None,
            line: None,
            form_summary: "a".into(),
        });
        e.push_frame(Frame {
            file: None,
            line: None,
            form_summary: "b".into(),
        });
        e.push_frame(Frame {
            file: None,
            line: None,
            form_summary: "c".into(),
        });
        let summaries: Vec<_> = e.backtrace().iter().map(|f| f.form_summary.clone()).collect();
        assert_eq!(summaries, vec!["b", "c"]);
    }

    #[test]
    fn perror_format() {
        let mut e = ErrorState::new();
        e.throw(ErrorCode::Value as i32, "boom");
        assert_eq!(e.perror_string("eval"), "eval: boom [EVALUE]");
    }
}
