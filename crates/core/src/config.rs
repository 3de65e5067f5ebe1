//! Interpreter-wide configuration switches, read via `get-opt`/`set-opt`.
//!
//! A small fixed set of named options rather than an open string-keyed
//! map: every option here has a concrete effect on the evaluator or
//! allocator, so a typo in a builtin call is a compile error, not a
//! silently-ignored `set-opt` at runtime.

use crate::error::ErrorCode;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptValue {
    Bool(bool),
    Int(i64),
}

impl OptValue {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            OptValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_int(self) -> Option<i64> {
        match self {
            OptValue::Int(i) => Some(i),
            _ => None,
        }
    }
}

/// Default stack recursion budget (non-tail `eval` calls). Chosen well
/// below typical native stack sizes so `ESTACK` fires before the host
/// process's guard page does.
pub const DEFAULT_STACK_LIMIT: usize = 10_000;

/// Default heap byte budget before a collection is forced; mirrors
/// [`crate::alloc::GC_RUN_THRESHOLD`] until overridden.
pub const DEFAULT_MEM_LIMIT: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Redefining an existing global binding replaces it instead of
    /// raising `EEXIST`.
    pub allow_redef: bool,
    /// Attach `LOCATION`/`ORIG-FORM` attributes as forms are produced,
    /// at some allocation cost; off by default for embedding.
    pub gen_debug_info: bool,
    /// Special forms rewrite their tail position through [`crate::eval::Step::Eval`]
    /// rather than recursing. Disabling this is a diagnostic knob only
    /// (it does not change program semantics, only stack behavior) and
    /// is never honored by the collector-critical paths.
    pub tail_call_elimination: bool,
    /// Run a collection after every allocation instead of only past the
    /// threshold; a correctness-testing aid; very slow.
    pub hyper_gc: bool,
    pub mem_limit: usize,
    pub stack_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            allow_redef: false,
            gen_debug_info: false,
            tail_call_elimination: true,
            hyper_gc: false,
            mem_limit: DEFAULT_MEM_LIMIT,
            stack_limit: DEFAULT_STACK_LIMIT,
        }
    }
}

impl Config {
    pub fn get_opt(&self, name: &str) -> Result<OptValue, (ErrorCode, String)> {
        Ok(match name {
            "allow-redef" => OptValue::Bool(self.allow_redef),
            "gen-debug-info" => OptValue::Bool(self.gen_debug_info),
            "tail-call-elimination" => OptValue::Bool(self.tail_call_elimination),
            "hyper-gc" => OptValue::Bool(self.hyper_gc),
            "mem-limit" => OptValue::Int(self.mem_limit as i64),
            "stack-limit" => OptValue::Int(self.stack_limit as i64),
            other => {
                return Err((ErrorCode::Api, format!("unknown option: {other}")));
            }
        })
    }

    pub fn set_opt(&mut self, name: &str, value: OptValue) -> Result<(), (ErrorCode, String)> {
        macro_rules! set_bool {
            ($field:expr) => {{
                $field = value
                    .as_bool()
                    .ok_or((ErrorCode::Type, format!("{name}: expected bool")))?;
                Ok(())
            }};
        }
        macro_rules! set_usize {
            ($field:expr) => {{
                let n = value
                    .as_int()
                    .ok_or((ErrorCode::Type, format!("{name}: expected int")))?;
                if n < 0 {
                    return Err((ErrorCode::Value, format!("{name}: must be non-negative")));
                }
                $field = n as usize;
                Ok(())
            }};
        }
        match name {
            "allow-redef" => set_bool!(self.allow_redef),
            "gen-debug-info" => set_bool!(self.gen_debug_info),
            "tail-call-elimination" => set_bool!(self.tail_call_elimination),
            "hyper-gc" => set_bool!(self.hyper_gc),
            "mem-limit" => set_usize!(self.mem_limit),
            "stack-limit" => set_usize!(self.stack_limit),
            other => Err((ErrorCode::Api, format!("unknown option: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_bool_option() {
        let mut cfg = Config::default();
        assert_eq!(cfg.get_opt("allow-redef").unwrap(), OptValue::Bool(false));
        cfg.set_opt("allow-redef", OptValue::Bool(true)).unwrap();
        assert_eq!(cfg.get_opt("allow-redef").unwrap(), OptValue::Bool(true));
    }

    #[test]
    fn unknown_option_is_eapi() {
        let cfg = Config::default();
        let err = cfg.get_opt("does-not-exist").unwrap_err();
        assert_eq!(err.0, ErrorCode::Api);
    }

    #[test]
    fn negative_stack_limit_is_rejected() {
        let mut cfg = Config::default();
        let err = cfg.set_opt("stack-limit", OptValue::Int(-1)).unwrap_err();
        assert_eq!(err.0, ErrorCode::Value);
    }
}
