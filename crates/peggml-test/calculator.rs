//! End-to-end scenarios 3 and 4: the calculator grammar, driven through
//! `peggml_core`'s public (global) API rather than a locally constructed
//! `Session`/`ParserRegistry` pair -- this is what a host embedding the
//! crate actually calls.

use crate::support::{lock, CALCULATOR_GRAMMAR};
use peggml_core::with_core;
use std::collections::HashMap;

fn fresh_calculator_handle() -> usize {
  let handle = with_core(|reg, _sess| reg.create(CALCULATOR_GRAMMAR)).unwrap();
  with_core(|reg, sess| sess.set_symbol_id(reg, handle, "Additive", 1.0)).unwrap();
  with_core(|reg, sess| sess.set_symbol_id(reg, handle, "Multitive", 2.0)).unwrap();
  with_core(|reg, sess| sess.set_symbol_id(reg, handle, "Number", 4.0)).unwrap();
  handle
}

#[test]
fn calculator_round_trip_and_stream_ordering() {
  let _guard = lock();
  let handle = fresh_calculator_handle();
  with_core(|reg, sess| sess.parse_begin(reg, handle, "5 + (3 * 7) + 2")).unwrap();

  let mut values: HashMap<u64, i64> = HashMap::new();
  let key = |f: f64| f.to_bits();

  loop {
    let symbol = with_core(|_reg, sess| sess.parse_next()).unwrap();
    if symbol == 0.0 {
      break;
    }

    let uuid = with_core(|_reg, sess| sess.elt_uuid()).unwrap();
    let value = if symbol == 4.0 {
      with_core(|_reg, sess| sess.elt_token_number()).unwrap() as i64
    } else {
      let count = with_core(|_reg, sess| sess.elt_child_count()).unwrap();
      let mut children = Vec::with_capacity(count);
      for i in 0..count {
        let child_uuid = with_core(|_reg, sess| sess.elt_child_uuid(i)).unwrap();
        // Scenario 4: every child must already be in the host's map --
        // it was necessarily yielded by an earlier `parse_next`.
        assert!(values.contains_key(&key(child_uuid)), "child {} observed before it was yielded", child_uuid);
        children.push(values[&key(child_uuid)]);
      }
      if symbol == 1.0 {
        children.iter().sum()
      } else {
        children.iter().product()
      }
    };
    values.insert(key(uuid), value);
  }

  let root = with_core(|_reg, sess| Ok(sess.get_root_uuid())).unwrap();
  assert_eq!(values[&key(root)], 28);

  with_core(|reg, _sess| reg.destroy(handle)).unwrap();
}

#[test]
fn once_terminated_parse_next_keeps_returning_zero() {
  let _guard = lock();
  let handle = fresh_calculator_handle();
  with_core(|reg, sess| sess.parse_begin(reg, handle, "1 + 1")).unwrap();

  while with_core(|_reg, sess| sess.parse_next()).unwrap() != 0.0 {}
  assert_eq!(with_core(|_reg, sess| sess.parse_next()).unwrap(), 0.0);
  assert_eq!(with_core(|_reg, sess| sess.parse_next()).unwrap(), 0.0);

  with_core(|reg, _sess| reg.destroy(handle)).unwrap();
}
