//! Error Channel: a process-wide last-error slot. Any core operation
//! that fails populates it with a human-readable message before
//! returning its numeric failure code; operations that succeed never
//! touch it.

#[derive(Default)]
pub struct ErrorChannel {
  occurred: bool,
  message: String,
}

impl ErrorChannel {
  pub fn new() -> Self {
    ErrorChannel::default()
  }

  /// `true` once an error has been set; cleared only by `clear` or a
  /// subsequent `set`/`clear` call, never implicitly by a successful
  /// operation.
  pub fn occurred(&self) -> bool {
    self.occurred
  }

  pub fn message(&self) -> &str {
    &self.message
  }

  pub fn set(&mut self, message: impl Into<String>) {
    self.occurred = true;
    self.message = message.into();
  }

  pub fn clear(&mut self) {
    self.occurred = false;
    self.message.clear();
  }
}
