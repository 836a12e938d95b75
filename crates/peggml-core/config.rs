//! Session-wide configuration, styled after the builder-struct
//! configuration types elsewhere in this ecosystem: a plain `Copy` data
//! struct with a `Default` impl and chained `with_*` methods, rather than
//! bare integer parameters threaded through every constructor.

use crate::coroutine::DEFAULT_STACK_SIZE;

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
  /// Worker thread stack size, in bytes.
  pub stack_size_bytes: usize,
  /// Whether newly created parsers start with packrat memoization on.
  pub packrat_by_default: bool,
}

impl Default for SessionConfig {
  fn default() -> Self {
    SessionConfig { stack_size_bytes: DEFAULT_STACK_SIZE, packrat_by_default: false }
  }
}

impl SessionConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_stack_size(mut self, bytes: usize) -> Self {
    self.stack_size_bytes = bytes;
    self
  }

  pub fn with_packrat_by_default(mut self, on: bool) -> Self {
    self.packrat_by_default = on;
    self
  }
}
