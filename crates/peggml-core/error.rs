//! Error taxonomy for the core. Every fallible core operation returns a
//! `PeggmlResult<T>`; only the FFI layer flattens a `PeggmlError` into a
//! numeric status code and an Error Channel message.

use std::fmt;

#[derive(Debug, Clone)]
pub enum PeggmlError {
  /// A precondition was violated: resuming an already-active coroutine,
  /// yielding from outside it, beginning a parse while one is in
  /// progress, destroying an empty handle, registering symbol id 0, etc.
  Misuse(String),
  /// The grammar failed to compile. `diagnostics` is the `line:col: msg`
  /// text collected from the grammar compiler, empty when the compiler
  /// rejected the grammar without producing positioned diagnostics.
  GrammarCompile { diagnostics: String },
  /// The parser raised partway through a parse.
  ParseFailure(String),
  /// A getter index (child, token) fell outside the current match's
  /// bounds.
  OutOfRange(String),
  /// Stack allocation / configuration failure. `code` is the specific
  /// FFI status this maps to -- stack sizing has several distinct ways
  /// to fail (too small, too large, allocation refused, wrong state)
  /// and callers need to tell them apart rather than get one generic
  /// failure.
  Resource { code: u8, message: String },
  /// `elt_token_number` could not parse its token as a number.
  TokenParse(String),
}

pub type PeggmlResult<T> = Result<T, PeggmlError>;

impl fmt::Display for PeggmlError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PeggmlError::Misuse(msg) => write!(f, "{}", msg),
      PeggmlError::GrammarCompile { diagnostics } if diagnostics.is_empty() => {
        write!(f, "grammar syntax invalid")
      }
      PeggmlError::GrammarCompile { diagnostics } => write!(f, "{}", diagnostics),
      PeggmlError::ParseFailure(msg) => write!(f, "parse failed: {}", msg),
      PeggmlError::OutOfRange(msg) => write!(f, "{}", msg),
      PeggmlError::Resource { message, .. } => write!(f, "{}", message),
      PeggmlError::TokenParse(msg) => write!(f, "{}", msg),
    }
  }
}

impl std::error::Error for PeggmlError {}
