//! Parser Registry: a process-wide table mapping integer handles to
//! owned, compiled grammars. Slots are reused but the index space only
//! grows -- once handle `h` has been issued, it stays a valid index
//! (empty or occupied) for the rest of the process.

use crate::error::{PeggmlError, PeggmlResult};
use peggml_peg::Parser;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A registered grammar plus the rule-name -> symbol-id table the host
/// has installed on it via `set_symbol_id`. Wrapped in its own
/// `Arc<Mutex<..>>` so a parse in progress can hold a clone of the `Arc`
/// on the worker thread without borrowing the registry itself.
pub struct ParserEntry {
  pub parser: Parser,
  pub symbols: HashMap<String, f64>,
}

pub type ParserHandle = Arc<Mutex<ParserEntry>>;

#[derive(Default)]
pub struct ParserRegistry {
  slots: Vec<Option<ParserHandle>>,
}

impl ParserRegistry {
  pub fn new() -> Self {
    ParserRegistry { slots: Vec::new() }
  }

  /// Compiles `grammar` and places it in the lowest empty slot (or
  /// appends). Returns the handle on success.
  pub fn create(&mut self, grammar: &str) -> Result<usize, PeggmlError> {
    let parser = Parser::load_grammar(grammar).map_err(|e| PeggmlError::GrammarCompile { diagnostics: e.to_string() })?;
    let entry = Arc::new(Mutex::new(ParserEntry { parser, symbols: HashMap::new() }));

    if let Some((index, slot)) = self.slots.iter_mut().enumerate().find(|(_, s)| s.is_none()) {
      *slot = Some(entry);
      return Ok(index);
    }

    self.slots.push(Some(entry));
    Ok(self.slots.len() - 1)
  }

  /// Empties `handle`'s slot. Fails if out of range or already empty.
  pub fn destroy(&mut self, handle: usize) -> PeggmlResult<()> {
    match self.slots.get_mut(handle) {
      Some(slot @ Some(_)) => {
        *slot = None;
        Ok(())
      }
      Some(None) => Err(PeggmlError::Misuse(format!("parser handle {} is already empty", handle))),
      None => Err(PeggmlError::Misuse(format!("parser handle {} is out of range", handle))),
    }
  }

  pub fn get(&self, handle: usize) -> PeggmlResult<ParserHandle> {
    match self.slots.get(handle) {
      Some(Some(entry)) => Ok(entry.clone()),
      Some(None) => Err(PeggmlError::Misuse(format!("parser handle {} is empty", handle))),
      None => Err(PeggmlError::Misuse(format!("parser handle {} is out of range", handle))),
    }
  }

  pub fn enable_packrat(&self, handle: usize) -> PeggmlResult<()> {
    let entry = self.get(handle)?;
    entry.lock().unwrap().parser.enable_packrat();
    Ok(())
  }

  /// Number of occupied slots.
  pub fn live_count(&self) -> usize {
    self.slots.iter().filter(|s| s.is_some()).count()
  }
}
