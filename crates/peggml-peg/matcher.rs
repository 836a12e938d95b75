//! Executes a compiled `Parser` against an input string.
//!
//! Matching is ordinary backtracking recursive descent. Packrat
//! memoization, when enabled, caches the *structural* outcome of a
//! (rule, position) attempt -- end position, captured tokens, and child
//! values -- but still re-invokes the rule's semantic action on every
//! cache hit, since each hit represents a distinct place in the overall
//! derivation reaching that rule, and the action's side effect (handing
//! the match to the coroutine's yield point) has to happen there too.
//! This mirrors peglib's own behavior: backtracked-out alternatives can
//! still have fired actions for their successful sub-matches before the
//! enclosing choice ultimately picked a different alternative.

use crate::grammar::{Expr, Rule, RuleId};
use crate::Parser;
use std::cell::RefCell;
use std::collections::HashMap;

/// An explicit `< ... >` capture: the captured substring and its start
/// offset, expressed in `char` (Unicode scalar value) indices rather than
/// bytes -- this engine works over a `Vec<char>` view of the input so
/// multi-byte input doesn't shift reported offsets out of sync with
/// reported columns.
#[derive(Debug, Clone)]
pub struct Token {
  pub text: String,
  pub offset: usize,
}

/// The view a semantic action receives when its rule matches.
pub struct SemanticValues<'a> {
  pub text: &'a str,
  pub offset: usize,
  pub line: usize,
  pub column: usize,
  pub choice: usize,
  pub children: &'a [f64],
  pub tokens: &'a [Token],
}

#[derive(Clone)]
struct CacheEntry {
  end: usize,
  children: Vec<f64>,
  tokens: Vec<Token>,
  choice: usize,
}

struct Frame {
  children: Vec<f64>,
  tokens: Vec<Token>,
  choice: usize,
}

impl Frame {
  fn new() -> Self {
    Frame { children: Vec::new(), tokens: Vec::new(), choice: 0 }
  }
}

struct Ctx<'a> {
  parser: &'a Parser,
  chars: Vec<char>,
  cache: RefCell<HashMap<(usize, usize), Option<CacheEntry>>>,
}

pub fn parse(parser: &Parser, text: &str) -> Result<f64, String> {
  let ctx = Ctx { parser, chars: text.chars().collect(), cache: RefCell::new(HashMap::new()) };

  let root_id = parser.rules.get(&parser.root).map(|r| r.id).ok_or_else(|| "grammar has no root rule".to_string())?;

  let start = skip_ws(&ctx, 0);
  match match_rule(&ctx, root_id, start) {
    Some((end, value)) => {
      let trailing = skip_ws(&ctx, end);
      if trailing != ctx.chars.len() {
        Err(format!(
          "unexpected trailing input at position {} (matched {} of {} characters)",
          trailing,
          trailing,
          ctx.chars.len()
        ))
      } else {
        Ok(value)
      }
    }
    None => Err("input does not match the grammar's root rule".to_string()),
  }
}

fn whitespace_expr<'a>(ctx: &'a Ctx) -> Option<&'a Expr> {
  ctx.parser.rules.get("%whitespace").map(|r| &r.expr)
}

fn skip_ws(ctx: &Ctx, pos: usize) -> usize {
  let Some(ws) = whitespace_expr(ctx) else { return pos };
  let mut pos = pos;
  loop {
    let mut scratch = Frame::new();
    match match_expr(ctx, ws, pos, &mut scratch) {
      Some(new_pos) if new_pos > pos => pos = new_pos,
      _ => break,
    }
  }
  pos
}

fn line_col(ctx: &Ctx, pos: usize) -> (usize, usize) {
  let mut line = 1;
  let mut col = 1;
  for &c in &ctx.chars[..pos.min(ctx.chars.len())] {
    if c == '\n' {
      line += 1;
      col = 1;
    } else {
      col += 1;
    }
  }
  (line, col)
}

fn match_rule(ctx: &Ctx, id: RuleId, pos: usize) -> Option<(usize, f64)> {
  let name = ctx.parser.rule_order.get(id.0)?;
  let rule: &Rule = ctx.parser.rules.get(name)?;

  if ctx.parser.packrat {
    if let Some(entry) = ctx.cache.borrow().get(&(id.0, pos)) {
      return match entry {
        Some(e) => {
          let value = invoke_action(ctx, rule, pos, e.end, &e.children, &e.tokens, e.choice);
          Some((e.end, value))
        }
        None => None,
      };
    }
  }

  let mut frame = Frame::new();
  let outcome = match_expr(ctx, &rule.expr, pos, &mut frame);

  if ctx.parser.packrat {
    let entry = outcome.map(|end| CacheEntry {
      end,
      children: frame.children.clone(),
      tokens: frame.tokens.clone(),
      choice: frame.choice,
    });
    ctx.cache.borrow_mut().insert((id.0, pos), entry);
  }

  let end = outcome?;
  let value = invoke_action(ctx, rule, pos, end, &frame.children, &frame.tokens, frame.choice);
  Some((end, value))
}

fn invoke_action(ctx: &Ctx, rule: &Rule, start: usize, end: usize, children: &[f64], tokens: &[Token], choice: usize) -> f64 {
  let Some(action) = ctx.parser.actions.get(&rule.name) else { return 0.0 };
  let text: String = ctx.chars[start..end].iter().collect();
  let (line, column) = line_col(ctx, start);
  let sv = SemanticValues { text: &text, offset: start, line, column, choice, children, tokens };
  action(&sv)
}

/// Matches `expr` starting at `pos`, contributing any nonterminal values
/// and explicit captures it produces into `frame` (the *enclosing rule's*
/// frame -- `Expr::Ref` is the only place that opens a fresh one). Returns
/// the position just past the match on success.
fn match_expr(ctx: &Ctx, expr: &Expr, pos: usize, frame: &mut Frame) -> Option<usize> {
  match expr {
    Expr::Literal(lit) => {
      let chars: Vec<char> = lit.chars().collect();
      if pos + chars.len() > ctx.chars.len() {
        return None;
      }
      if ctx.chars[pos..pos + chars.len()] == chars[..] {
        Some(pos + chars.len())
      } else {
        None
      }
    }
    Expr::CharClass { ranges, negate } => {
      let c = *ctx.chars.get(pos)?;
      let in_class = ranges.iter().any(|&(lo, hi)| c >= lo && c <= hi);
      if in_class != *negate {
        Some(pos + 1)
      } else {
        None
      }
    }
    Expr::AnyChar => {
      if pos < ctx.chars.len() {
        Some(pos + 1)
      } else {
        None
      }
    }
    Expr::Ref(id) => {
      let (end, value) = match_rule(ctx, *id, pos)?;
      frame.children.push(value);
      Some(end)
    }
    Expr::UnresolvedRef(_) => unreachable!("grammar compiled with an unresolved reference"),
    Expr::Seq(items) => {
      let mut cur = pos;
      for (i, item) in items.iter().enumerate() {
        if i > 0 {
          cur = skip_ws(ctx, cur);
        }
        cur = match_expr(ctx, item, cur, frame)?;
      }
      Some(cur)
    }
    Expr::Choice(alts) => {
      for (idx, alt) in alts.iter().enumerate() {
        let children_len = frame.children.len();
        let tokens_len = frame.tokens.len();
        if let Some(end) = match_expr(ctx, alt, pos, frame) {
          frame.choice = idx;
          return Some(end);
        }
        frame.children.truncate(children_len);
        frame.tokens.truncate(tokens_len);
      }
      None
    }
    Expr::Repeat(inner, min, max) => {
      let mut cur = pos;
      let mut count = 0usize;
      loop {
        if let Some(limit) = max {
          if count >= *limit {
            break;
          }
        }
        let children_len = frame.children.len();
        let tokens_len = frame.tokens.len();
        // Whitespace-skip belongs to sequencing, not repetition: a bare
        // `[0-9]+`-style repeat over a non-`Seq` inner expression must not
        // swallow whitespace between iterations, or a plain digit-class
        // repeat would silently accept "1 2 3" as one match.
        let probe = if count == 0 || !matches!(inner.as_ref(), Expr::Seq(_)) { cur } else { skip_ws(ctx, cur) };
        match match_expr(ctx, inner, probe, frame) {
          Some(end) => {
            let made_progress = end > probe;
            cur = end;
            count += 1;
            if !made_progress {
              // A non-advancing match would loop forever; one such match
              // is enough to satisfy the repetition.
              break;
            }
          }
          None => {
            frame.children.truncate(children_len);
            frame.tokens.truncate(tokens_len);
            break;
          }
        }
      }
      if count >= *min {
        Some(cur)
      } else {
        None
      }
    }
    Expr::And(inner) => {
      let mut scratch = Frame::new();
      match_expr(ctx, inner, pos, &mut scratch).map(|_| pos)
    }
    Expr::Not(inner) => {
      let mut scratch = Frame::new();
      match match_expr(ctx, inner, pos, &mut scratch) {
        Some(_) => None,
        None => Some(pos),
      }
    }
    Expr::Capture(inner) => {
      let end = match_expr(ctx, inner, pos, frame)?;
      let text: String = ctx.chars[pos..end].iter().collect();
      frame.tokens.push(Token { text, offset: pos });
      Some(end)
    }
  }
}
