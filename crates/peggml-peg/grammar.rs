//! The compiled grammar's AST. Built once by `compile`, then walked
//! repeatedly (and, when packrat is enabled, memoized) by `matcher`.

/// Index of a rule within a compiled grammar's rule table. Stable for the
/// lifetime of the `Parser` -- used as half of the packrat cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleId(pub usize);

#[derive(Debug, Clone)]
pub enum Expr {
  Literal(String),
  CharClass { ranges: Vec<(char, char)>, negate: bool },
  AnyChar,
  Ref(RuleId),
  /// A bare identifier not yet resolved to a `RuleId`. Only ever appears
  /// between parsing and the post-pass in `compile::resolve_refs`.
  UnresolvedRef(String),
  Seq(Vec<Expr>),
  Choice(Vec<Expr>),
  /// `(min, max)` repetitions of the inner expression. `max == None` means
  /// unbounded (`*` is `(0, None)`, `+` is `(1, None)`, `?` is `(0, Some(1))`).
  Repeat(Box<Expr>, usize, Option<usize>),
  And(Box<Expr>),
  Not(Box<Expr>),
  Capture(Box<Expr>),
}

#[derive(Debug, Clone)]
pub struct Rule {
  pub name: String,
  pub id: RuleId,
  pub expr: Expr,
}
