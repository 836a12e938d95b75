//! THE CORE: the context-switch coroutine, parser registry, per-parser
//! symbol table, parse session, and error channel. `peggml-ffi` is a
//! thin, purely numeric/string-flattening wrapper around this crate;
//! every decision with actual semantics lives here.
//!
//! Concurrency model: single-threaded, cooperative, one active parse at
//! a time, matching the foreign ABI's own constraints. The three
//! process-wide components (registry, session, error channel) are each
//! held behind their own `OnceLock<Mutex<..>>`, mirroring how the
//! teacher keeps a single process-wide `Arc<RwLock<ScratchPad>>` for
//! diagnostics aggregation -- a future multi-session redesign only has
//! to replace these accessors, not the logic in `Session`/`ParserRegistry`.

pub mod config;
pub mod coroutine;
pub mod error;
pub mod error_channel;
pub mod registry;
pub mod session;

pub use config::SessionConfig;
pub use error::{PeggmlError, PeggmlResult};

use error_channel::ErrorChannel;
use registry::ParserRegistry;
use session::Session;
use std::sync::{Mutex, OnceLock};

fn registry() -> &'static Mutex<ParserRegistry> {
  static REGISTRY: OnceLock<Mutex<ParserRegistry>> = OnceLock::new();
  REGISTRY.get_or_init(|| Mutex::new(ParserRegistry::new()))
}

fn session() -> &'static Mutex<Session> {
  static SESSION: OnceLock<Mutex<Session>> = OnceLock::new();
  SESSION.get_or_init(|| Mutex::new(Session::new(config().stack_size_bytes)))
}

fn error_channel() -> &'static Mutex<ErrorChannel> {
  static EC: OnceLock<Mutex<ErrorChannel>> = OnceLock::new();
  EC.get_or_init(|| Mutex::new(ErrorChannel::new()))
}

fn config() -> &'static SessionConfig {
  static CONFIG: OnceLock<SessionConfig> = OnceLock::new();
  CONFIG.get_or_init(SessionConfig::new)
}

/// Runs `f` against the process-wide components, recording any
/// `PeggmlError` into the Error Channel before propagating it. This is
/// the seam `peggml-ffi` calls through: every foreign function is one
/// call to `with_core`, followed by flattening the `PeggmlResult` into a
/// numeric code (and, for string-returning functions, a thread-local
/// buffer).
pub fn with_core<T>(f: impl FnOnce(&mut ParserRegistry, &mut Session) -> PeggmlResult<T>) -> PeggmlResult<T> {
  let mut reg = registry().lock().unwrap();
  let mut sess = session().lock().unwrap();
  let result = f(&mut reg, &mut sess);
  if let Err(e) = &result {
    error_channel().lock().unwrap().set(e.to_string());
  }
  result
}

pub fn error_occurred() -> bool {
  error_channel().lock().unwrap().occurred()
}

pub fn error_str() -> String {
  error_channel().lock().unwrap().message().to_string()
}

pub fn set_error(message: &str) {
  error_channel().lock().unwrap().set(message);
}

pub fn clear_error() {
  error_channel().lock().unwrap().clear();
}
