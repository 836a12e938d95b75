//! The remaining invariants from the testable-properties list, each as
//! its own focused check against `peggml_core`'s public API.

use crate::support::{lock, CALCULATOR_GRAMMAR};
use peggml_core::{error::PeggmlError, with_core};

#[test]
fn grammar_rejection_populates_no_slot() {
  let _guard = lock();
  let before = with_core(|reg, _sess| Ok(reg.live_count())).unwrap();
  let result = with_core(|reg, _sess| reg.create("this is not a grammar ((("));
  assert!(result.is_err());
  let after = with_core(|reg, _sess| Ok(reg.live_count())).unwrap();
  assert_eq!(before, after);
}

#[test]
fn symbol_id_zero_is_rejected() {
  let _guard = lock();
  let handle = with_core(|reg, _sess| reg.create(CALCULATOR_GRAMMAR)).unwrap();
  let result = with_core(|reg, sess| sess.set_symbol_id(reg, handle, "Additive", 0.0));
  assert!(matches!(result, Err(PeggmlError::Misuse(_))));
  with_core(|reg, _sess| reg.destroy(handle)).unwrap();
}

#[test]
fn registering_a_rule_twice_replaces_the_first_registration() {
  let _guard = lock();
  let handle = with_core(|reg, _sess| reg.create(CALCULATOR_GRAMMAR)).unwrap();
  with_core(|reg, sess| sess.set_symbol_id(reg, handle, "Number", 4.0)).unwrap();
  with_core(|reg, sess| sess.set_symbol_id(reg, handle, "Number", 9.0)).unwrap();
  with_core(|reg, sess| sess.parse_begin(reg, handle, "42")).unwrap();
  let symbol = with_core(|_reg, sess| sess.parse_next()).unwrap();
  assert_eq!(symbol, 9.0, "the later registration must win");
  while with_core(|_reg, sess| sess.parse_next()).unwrap() != 0.0 {}
  with_core(|reg, _sess| reg.destroy(handle)).unwrap();
}

#[test]
fn reentrant_parse_begin_is_rejected_with_misuse() {
  let _guard = lock();
  let handle = with_core(|reg, _sess| reg.create(CALCULATOR_GRAMMAR)).unwrap();
  with_core(|reg, sess| sess.set_symbol_id(reg, handle, "Number", 4.0)).unwrap();
  with_core(|reg, sess| sess.parse_begin(reg, handle, "1")).unwrap();

  let second = with_core(|reg, sess| sess.parse_begin(reg, handle, "2"));
  assert!(matches!(second, Err(PeggmlError::Misuse(_))));

  with_core(|_reg, sess| sess.parse_abort()).unwrap();
  with_core(|reg, _sess| reg.destroy(handle)).unwrap();
}

#[test]
fn out_of_range_child_index_is_rejected_every_match() {
  let _guard = lock();
  let handle = with_core(|reg, _sess| reg.create(CALCULATOR_GRAMMAR)).unwrap();
  with_core(|reg, sess| sess.set_symbol_id(reg, handle, "Additive", 1.0)).unwrap();
  with_core(|reg, sess| sess.set_symbol_id(reg, handle, "Multitive", 2.0)).unwrap();
  with_core(|reg, sess| sess.set_symbol_id(reg, handle, "Number", 4.0)).unwrap();
  with_core(|reg, sess| sess.parse_begin(reg, handle, "1 + 2 * 3")).unwrap();

  loop {
    let symbol = with_core(|_reg, sess| sess.parse_next()).unwrap();
    if symbol == 0.0 {
      break;
    }
    let count = with_core(|_reg, sess| sess.elt_child_count()).unwrap();
    let result = with_core(|_reg, sess| sess.elt_child_uuid(count));
    assert!(result.is_err(), "index == count must be rejected");
  }

  with_core(|reg, _sess| reg.destroy(handle)).unwrap();
}

#[test]
fn set_stack_size_during_a_parse_is_rejected() {
  let _guard = lock();
  let handle = with_core(|reg, _sess| reg.create(CALCULATOR_GRAMMAR)).unwrap();
  with_core(|reg, sess| sess.set_symbol_id(reg, handle, "Number", 4.0)).unwrap();
  with_core(|reg, sess| sess.parse_begin(reg, handle, "1")).unwrap();

  let result = with_core(|_reg, sess| sess.set_stack_size(4096));
  assert!(matches!(result, Err(PeggmlError::Resource { code: 1, .. })));

  with_core(|_reg, sess| sess.parse_abort()).unwrap();
  with_core(|reg, _sess| reg.destroy(handle)).unwrap();
}

#[test]
fn uuids_are_strictly_increasing_within_a_parse() {
  let _guard = lock();
  let handle = with_core(|reg, _sess| reg.create(CALCULATOR_GRAMMAR)).unwrap();
  with_core(|reg, sess| sess.set_symbol_id(reg, handle, "Additive", 1.0)).unwrap();
  with_core(|reg, sess| sess.set_symbol_id(reg, handle, "Multitive", 2.0)).unwrap();
  with_core(|reg, sess| sess.set_symbol_id(reg, handle, "Number", 4.0)).unwrap();
  with_core(|reg, sess| sess.parse_begin(reg, handle, "5 + (3 * 7) + 2")).unwrap();

  let mut last = -1.0_f64;
  loop {
    let symbol = with_core(|_reg, sess| sess.parse_next()).unwrap();
    if symbol == 0.0 {
      break;
    }
    let uuid = with_core(|_reg, sess| sess.elt_uuid()).unwrap();
    assert!(uuid > last, "uuid {} did not increase past {}", uuid, last);
    last = uuid;
  }

  with_core(|reg, _sess| reg.destroy(handle)).unwrap();
}
