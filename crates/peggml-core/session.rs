//! Parse Session: drives exactly one parse at a time over a `Coroutine`,
//! translating between the PEG engine's recursive-descent, post-order
//! match stream and the host's pull-based `parse_next` loop.

use crate::coroutine::{Coroutine, Outcome, YieldHandle};
use crate::error::{PeggmlError, PeggmlResult};
use crate::registry::ParserRegistry;
use peggml_peg::SemanticValues;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Owned snapshot of a `SemanticValues` view, captured the instant its
/// rule's action fires, before control is handed back to the host. Every
/// core-facing getter reads out of the session's current snapshot rather
/// than a borrow into engine-internal storage, since that storage lives
/// on the worker thread's stack and the host inspects it from the
/// driving thread.
#[derive(Clone)]
pub struct MatchSnapshot {
  pub symbol_id: f64,
  pub uuid: f64,
  pub text: String,
  pub offset: usize,
  pub line: usize,
  pub column: usize,
  pub choice: usize,
  pub children: Vec<f64>,
  pub tokens: Vec<(String, usize)>,
}

struct ActiveParse {
  next_uuid: AtomicU64,
  yield_handle: YieldHandle<MatchSnapshot, f64>,
}

type ActiveParseSlot = Arc<Mutex<Option<Arc<ActiveParse>>>>;

pub struct Session {
  coroutine: Coroutine<MatchSnapshot, f64>,
  active: ActiveParseSlot,
  in_progress: bool,
  current_match: Option<MatchSnapshot>,
  root_uuid: f64,
}

impl Session {
  pub fn new(stack_size_bytes: usize) -> Self {
    Session {
      coroutine: Coroutine::new(stack_size_bytes),
      active: Arc::new(Mutex::new(None)),
      in_progress: false,
      current_match: None,
      root_uuid: -1.0,
    }
  }

  pub fn get_stack_size(&self) -> usize {
    self.coroutine.get_stack_size()
  }

  pub fn current_stack_depth(&self) -> usize {
    self.coroutine.current_stack_depth()
  }

  pub fn estimate_peak_stack_usage(&self) -> usize {
    self.coroutine.estimate_peak_stack_usage()
  }

  pub fn set_stack_size(&mut self, bytes: i64) -> PeggmlResult<()> {
    if self.in_progress {
      return Err(PeggmlError::Resource { code: 1, message: "cannot resize the stack while a parse is in progress".into() });
    }
    if bytes <= 0 {
      return Err(PeggmlError::Resource { code: 2, message: "stack size must be positive".into() });
    }
    self.coroutine.set_stack_size(bytes as usize);
    Ok(())
  }

  /// Registers (or replaces) the action fired when `rule_name` matches in
  /// the grammar at `handle`. The closure built here is what actually
  /// bridges the PEG engine's synchronous callback into this session's
  /// coroutine: it captures a clone of `self.active`, so whichever parse
  /// is running when the rule fires supplies the yield handle and uuid
  /// counter.
  pub fn set_symbol_id(&self, registry: &ParserRegistry, handle: usize, rule_name: &str, id: f64) -> PeggmlResult<()> {
    if id == 0.0 {
      return Err(PeggmlError::Misuse("symbol id must be nonzero".into()));
    }
    if rule_name.is_empty() {
      return Err(PeggmlError::Misuse("rule name must not be empty".into()));
    }

    let entry = registry.get(handle)?;
    let active = self.active.clone();
    let rule = rule_name.to_string();

    let mut guard = entry.lock().unwrap();
    let installed = guard.parser.set_action(
      rule_name,
      Box::new(move |sv: &SemanticValues| -> f64 { fire_action(&active, id, sv) }),
    );
    if !installed {
      return Err(PeggmlError::Misuse(format!("grammar has no rule named '{}'", rule)));
    }
    guard.symbols.insert(rule, id);
    Ok(())
  }

  /// Preconditions: no parse in progress; `handle` valid.
  pub fn parse_begin(&mut self, registry: &ParserRegistry, handle: usize, text: &str) -> PeggmlResult<()> {
    if self.in_progress {
      return Err(PeggmlError::Misuse("parse already in progress".into()));
    }
    let entry = registry.get(handle)?;

    self.root_uuid = -1.0;
    self.current_match = None;

    let active = self.active.clone();
    let text = text.to_string();

    self
      .coroutine
      .begin(move |yh: &YieldHandle<MatchSnapshot, f64>| -> f64 {
        {
          let mut guard = active.lock().unwrap();
          *guard = Some(Arc::new(ActiveParse { next_uuid: AtomicU64::new(0), yield_handle: yh.clone() }));
        }
        let result = entry.lock().unwrap().parser.parse(&text);
        {
          let mut guard = active.lock().unwrap();
          *guard = None;
        }
        match result {
          Ok(value) => value,
          Err(message) => panic!("{}", message),
        }
      })
      .map_err(|msg| PeggmlError::Misuse(msg.into()))?;

    self.in_progress = true;
    Ok(())
  }

  /// Drives the coroutine one step. Returns the symbol id of the match
  /// that was yielded, or `0.0` once the parse has terminated (normally
  /// or by failure).
  pub fn parse_next(&mut self) -> PeggmlResult<f64> {
    if !self.in_progress {
      return Ok(0.0);
    }
    match self.coroutine.resume() {
      Ok(Outcome::Yielded(snapshot)) => {
        let symbol_id = snapshot.symbol_id;
        self.current_match = Some(snapshot);
        Ok(symbol_id)
      }
      Ok(Outcome::Terminated(root_value)) => {
        self.in_progress = false;
        self.current_match = None;
        self.root_uuid = root_value;
        Ok(0.0)
      }
      Ok(Outcome::Failed(message)) => {
        self.in_progress = false;
        self.current_match = None;
        Err(PeggmlError::ParseFailure(message))
      }
      Err(message) => {
        self.in_progress = false;
        self.current_match = None;
        Err(PeggmlError::Misuse(message.into()))
      }
    }
  }

  /// Unwinds the worker thread without joining it. Leaves `Coroutine` in
  /// `Error` so a stale `resume` cannot silently succeed.
  pub fn parse_abort(&mut self) -> PeggmlResult<()> {
    if !self.in_progress {
      return Err(PeggmlError::Misuse("no parse is in progress".into()));
    }
    self.coroutine.abort();
    self.in_progress = false;
    self.current_match = None;
    *self.active.lock().unwrap() = None;
    Ok(())
  }

  pub fn is_in_progress(&self) -> bool {
    self.in_progress
  }

  pub fn get_root_uuid(&self) -> f64 {
    self.root_uuid
  }

  fn current(&self) -> PeggmlResult<&MatchSnapshot> {
    self.current_match.as_ref().ok_or_else(|| PeggmlError::Misuse("no current match -- call parse_next first".into()))
  }

  pub fn elt_uuid(&self) -> PeggmlResult<f64> {
    Ok(self.current()?.uuid)
  }

  pub fn elt_string(&self) -> PeggmlResult<&str> {
    Ok(&self.current()?.text)
  }

  pub fn elt_string_offset(&self) -> PeggmlResult<usize> {
    Ok(self.current()?.offset)
  }

  pub fn elt_string_line(&self) -> PeggmlResult<usize> {
    Ok(self.current()?.line)
  }

  pub fn elt_string_column(&self) -> PeggmlResult<usize> {
    Ok(self.current()?.column)
  }

  pub fn elt_choice(&self) -> PeggmlResult<usize> {
    Ok(self.current()?.choice)
  }

  pub fn elt_child_count(&self) -> PeggmlResult<usize> {
    Ok(self.current()?.children.len())
  }

  pub fn elt_child_uuid(&self, index: usize) -> PeggmlResult<f64> {
    let cur = self.current()?;
    cur.children.get(index).copied().ok_or_else(|| {
      PeggmlError::OutOfRange(format!("child index {} out of range (have {})", index, cur.children.len()))
    })
  }

  pub fn elt_token_count(&self) -> PeggmlResult<usize> {
    Ok(self.current()?.tokens.len())
  }

  pub fn elt_token_offset(&self, index: usize) -> PeggmlResult<usize> {
    let cur = self.current()?;
    cur.tokens.get(index).map(|(_, offset)| *offset).ok_or_else(|| {
      PeggmlError::OutOfRange(format!("token index {} out of range (have {})", index, cur.tokens.len()))
    })
  }

  pub fn elt_token_string(&self, index: usize) -> PeggmlResult<&str> {
    let cur = self.current()?;
    cur.tokens.get(index).map(|(text, _)| text.as_str()).ok_or_else(|| {
      PeggmlError::OutOfRange(format!("token index {} out of range (have {})", index, cur.tokens.len()))
    })
  }

  pub fn elt_token_number(&self) -> PeggmlResult<f64> {
    let cur = self.current()?;
    let (first, _) =
      cur.tokens.first().ok_or_else(|| PeggmlError::OutOfRange("current match has no captured tokens".into()))?;
    first.trim().parse::<f64>().map_err(|_| PeggmlError::TokenParse(format!("token '{}' is not a number", first)))
  }
}

fn fire_action(active: &ActiveParseSlot, symbol_id: f64, sv: &SemanticValues) -> f64 {
  let ctx = active.lock().unwrap().clone().expect("semantic action fired outside an active parse");
  let uuid = ctx.next_uuid.fetch_add(1, Ordering::SeqCst) as f64;
  let snapshot = MatchSnapshot {
    symbol_id,
    uuid,
    text: sv.text.to_string(),
    offset: sv.offset,
    line: sv.line,
    column: sv.column,
    choice: sv.choice,
    children: sv.children.to_vec(),
    tokens: sv.tokens.iter().map(|t| (t.text.clone(), t.offset)).collect(),
  };
  ctx.yield_handle.yield_value(snapshot);
  uuid
}

#[cfg(test)]
mod tests {
  use super::*;

  const CALC_GRAMMAR: &str = "\
Additive <- Multitive '+' Additive / Multitive
Multitive <- Primary '*' Multitive / Primary
Primary <- '(' Additive ')' / Number
Number <- < [0-9]+ >
%whitespace <- [ \\t]*
";

  fn setup() -> (ParserRegistry, Session, usize) {
    let mut registry = ParserRegistry::new();
    let handle = registry.create(CALC_GRAMMAR).unwrap();
    let session = Session::new(1024 * 1024);
    session.set_symbol_id(&registry, handle, "Additive", 1.0).unwrap();
    session.set_symbol_id(&registry, handle, "Multitive", 2.0).unwrap();
    session.set_symbol_id(&registry, handle, "Number", 4.0).unwrap();
    (registry, session, handle)
  }

  #[test]
  fn calculator_round_trip_sums_and_multiplies_to_28() {
    let (registry, mut session, handle) = setup();
    session.parse_begin(&registry, handle, "5 + (3 * 7) + 2").unwrap();

    let mut values: HashMap<u64, i64> = HashMap::new();
    let key = |f: f64| f.to_bits();

    loop {
      let symbol = session.parse_next().unwrap();
      if symbol == 0.0 {
        break;
      }
      let uuid = session.elt_uuid().unwrap();
      let value = if symbol == 4.0 {
        session.elt_token_number().unwrap() as i64
      } else {
        let count = session.elt_child_count().unwrap();
        let children: Vec<i64> =
          (0..count).map(|i| values[&key(session.elt_child_uuid(i).unwrap())]).collect();
        if symbol == 1.0 {
          children.iter().sum()
        } else {
          children.iter().product()
        }
      };
      values.insert(key(uuid), value);
    }

    let root = session.get_root_uuid();
    assert_eq!(values[&key(root)], 28);
  }

  #[test]
  fn out_of_range_child_index_is_rejected() {
    let (registry, mut session, handle) = setup();
    session.parse_begin(&registry, handle, "5 + (3 * 7) + 2").unwrap();
    loop {
      let symbol = session.parse_next().unwrap();
      if symbol == 0.0 {
        break;
      }
      let count = session.elt_child_count().unwrap();
      assert!(session.elt_child_uuid(count).is_err());
    }
  }

  #[test]
  fn reentrant_parse_begin_is_rejected() {
    let (registry, mut session, handle) = setup();
    session.parse_begin(&registry, handle, "1 + 2").unwrap();
    assert!(matches!(session.parse_begin(&registry, handle, "1 + 2"), Err(PeggmlError::Misuse(_))));
    session.parse_abort().unwrap();
  }

  #[test]
  fn stack_size_cannot_change_mid_parse() {
    let (registry, mut session, handle) = setup();
    session.parse_begin(&registry, handle, "1 + 2").unwrap();
    assert!(matches!(session.set_stack_size(4096), Err(PeggmlError::Resource { code: 1, .. })));
    session.parse_abort().unwrap();
  }
}
