//! A small recursive-descent PEG engine: the "vendored library" this
//! workspace wraps. Grammars are compiled from a text description at
//! runtime (no macros, no codegen) and matched against an input string,
//! invoking a caller-registered action on every match of a named rule.
//!
//! This crate deliberately does not know anything about UUIDs, parse
//! sessions, or coroutines -- it is the stand-in for an external PEG
//! library treated as a black box by everything above it. Every action
//! returns an `f64` and nothing else; what the caller does with that
//! number is not this crate's concern.

mod compile;
mod grammar;
mod matcher;

pub use compile::GrammarError;
pub use grammar::{Rule, RuleId};
pub use matcher::{SemanticValues, Token};

use std::collections::HashMap;

/// A semantic action invoked when its rule matches. Returns the value
/// that the match contributes to its parent's child list.
pub type Action = Box<dyn Fn(&SemanticValues) -> f64 + Send>;

/// A compiled grammar plus any actions registered on its rules.
pub struct Parser {
  pub(crate) rules: HashMap<String, Rule>,
  pub(crate) rule_order: Vec<String>,
  pub(crate) root: String,
  pub(crate) whitespace: Option<String>,
  pub(crate) actions: HashMap<String, Action>,
  pub(crate) packrat: bool,
}

impl std::fmt::Debug for Parser {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Parser")
      .field("rules", &self.rules)
      .field("rule_order", &self.rule_order)
      .field("root", &self.root)
      .field("whitespace", &self.whitespace)
      .field("actions", &self.actions.keys().collect::<Vec<_>>())
      .field("packrat", &self.packrat)
      .finish()
  }
}

impl Parser {
  /// Compiles `grammar` into a new, action-less `Parser`.
  pub fn load_grammar(grammar: &str) -> Result<Parser, GrammarError> {
    compile::compile(grammar)
  }

  /// Enables packrat (position, rule) memoization for subsequent parses.
  pub fn enable_packrat(&mut self) {
    self.packrat = true;
  }

  /// Registers (or replaces) the action fired when `rule_name` matches.
  /// Returns `false` if the grammar has no rule by that name.
  pub fn set_action(&mut self, rule_name: &str, action: Action) -> bool {
    if !self.rules.contains_key(rule_name) {
      return false;
    }
    self.actions.insert(rule_name.to_string(), action);
    true
  }

  /// Runs the grammar's root rule against `text`, invoking registered
  /// actions as their rules match. Returns the root rule's own action
  /// value (or `0.0` if the root rule has no registered action).
  ///
  /// This function runs to completion without suspending -- the
  /// suspend/resume behavior belongs to `peggml-core`'s coroutine, which
  /// drives this function from inside registered actions by blocking
  /// them on a rendezvous channel. From this crate's point of view, an
  /// action is just a synchronous callback.
  pub fn parse(&self, text: &str) -> Result<f64, String> {
    matcher::parse(self, text)
  }
}
