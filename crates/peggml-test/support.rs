//! `peggml_core`'s registry/session/error-channel are process-wide
//! singletons, same as the real foreign-call ABI they back. Tests in
//! this crate that drive them serialize on this lock rather than each
//! getting their own isolated instance, since that's the actual
//! concurrency contract the crate under test provides.

use std::sync::{Mutex, MutexGuard, OnceLock};

pub fn lock() -> MutexGuard<'static, ()> {
  static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
  LOCK.get_or_init(|| Mutex::new(())).lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub const CALCULATOR_GRAMMAR: &str = "\
Additive <- Multitive '+' Additive / Multitive
Multitive <- Primary '*' Multitive / Primary
Primary <- '(' Additive ')' / Number
Number <- < [0-9]+ >
%whitespace <- [ \\t]*
";
