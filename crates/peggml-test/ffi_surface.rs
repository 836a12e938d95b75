//! Drives the raw `extern "C"` functions in `peggml_ffi` directly, the
//! way a foreign host actually calls this crate: through `CString`/`CStr`
//! marshaling and bare `f64` status codes, never through `peggml_core`
//! types. Where a scenario is also covered in `calculator.rs` through the
//! plain Rust API, this file re-runs it through the FFI boundary to prove
//! the two layers agree.

use crate::support::{lock, CALCULATOR_GRAMMAR};
use peggml_ffi::*;
use std::collections::HashMap;
use std::ffi::{CStr, CString};

fn read_c_str(ptr: *const std::os::raw::c_char) -> String {
  assert!(!ptr.is_null());
  unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

#[test]
fn abi_probe_reports_name_and_version() {
  let _guard = lock();
  let name = read_c_str(peggml_abi_test());
  assert_eq!(name, "gml-peglib");
  assert_eq!(peggml_version(), 1.2);
}

#[test]
fn bad_grammar_is_rejected_and_populates_the_error_channel() {
  let _guard = lock();
  peggml_clear_error();
  let grammar = CString::new("this is not a grammar (((").unwrap();
  let handle = unsafe { peggml_parser_create(grammar.as_ptr()) };
  assert_eq!(handle, -1.0);
  assert_eq!(peggml_error(), 1.0);
  assert!(!read_c_str(peggml_error_str()).is_empty());
}

#[test]
fn out_of_range_child_uuid_is_rejected_over_ffi() {
  let _guard = lock();
  let grammar = CString::new(CALCULATOR_GRAMMAR).unwrap();
  let handle = unsafe { peggml_parser_create(grammar.as_ptr()) };
  assert!(handle >= 0.0);

  let additive = CString::new("Additive").unwrap();
  let multitive = CString::new("Multitive").unwrap();
  let number = CString::new("Number").unwrap();
  unsafe {
    assert_eq!(peggml_parser_set_symbol_id(handle, additive.as_ptr(), 1.0), 0.0);
    assert_eq!(peggml_parser_set_symbol_id(handle, multitive.as_ptr(), 2.0), 0.0);
    assert_eq!(peggml_parser_set_symbol_id(handle, number.as_ptr(), 4.0), 0.0);
  }

  let text = CString::new("1 + 2 * 3").unwrap();
  let begin = unsafe { peggml_parse_begin(handle, text.as_ptr()) };
  assert_eq!(begin, 0.0);

  loop {
    let symbol = peggml_parse_next();
    if symbol == 0.0 {
      break;
    }
    let count = peggml_parse_elt_get_child_count();
    peggml_clear_error();
    let result = peggml_parse_elt_get_child_uuid(count);
    assert_eq!(result, -1.0);
    assert_eq!(peggml_error(), 1.0);
  }

  assert_eq!(peggml_parser_destroy(handle), 0.0);
}

#[test]
fn reentrant_parse_begin_is_rejected_over_ffi() {
  let _guard = lock();
  let grammar = CString::new(CALCULATOR_GRAMMAR).unwrap();
  let handle = unsafe { peggml_parser_create(grammar.as_ptr()) };
  assert!(handle >= 0.0);

  let number = CString::new("Number").unwrap();
  unsafe { assert_eq!(peggml_parser_set_symbol_id(handle, number.as_ptr(), 4.0), 0.0) };

  let first = CString::new("1").unwrap();
  assert_eq!(unsafe { peggml_parse_begin(handle, first.as_ptr()) }, 0.0);

  peggml_clear_error();
  let second = CString::new("2").unwrap();
  let result = unsafe { peggml_parse_begin(handle, second.as_ptr()) };
  assert_eq!(result, -1.0);
  assert_eq!(peggml_error(), 1.0);

  assert_eq!(peggml_parse_abort(), 0.0);
  assert_eq!(peggml_parser_destroy(handle), 0.0);
}

#[test]
fn calculator_round_trip_agrees_with_the_plain_api() {
  let _guard = lock();
  let grammar = CString::new(CALCULATOR_GRAMMAR).unwrap();
  let handle = unsafe { peggml_parser_create(grammar.as_ptr()) };
  assert!(handle >= 0.0);

  let additive = CString::new("Additive").unwrap();
  let multitive = CString::new("Multitive").unwrap();
  let number = CString::new("Number").unwrap();
  unsafe {
    assert_eq!(peggml_parser_set_symbol_id(handle, additive.as_ptr(), 1.0), 0.0);
    assert_eq!(peggml_parser_set_symbol_id(handle, multitive.as_ptr(), 2.0), 0.0);
    assert_eq!(peggml_parser_set_symbol_id(handle, number.as_ptr(), 4.0), 0.0);
  }

  let text = CString::new("5 + (3 * 7) + 2").unwrap();
  assert_eq!(unsafe { peggml_parse_begin(handle, text.as_ptr()) }, 0.0);

  let mut values: HashMap<u64, i64> = HashMap::new();
  let key = |f: f64| f.to_bits();

  loop {
    let symbol = peggml_parse_next();
    if symbol == 0.0 {
      break;
    }
    let uuid = peggml_parse_elt_get_uuid();
    let value = if symbol == 4.0 {
      peggml_parse_elt_get_token_number() as i64
    } else {
      let count = peggml_parse_elt_get_child_count() as usize;
      let mut children = Vec::with_capacity(count);
      for i in 0..count {
        let child_uuid = peggml_parse_elt_get_child_uuid(i as f64);
        assert!(values.contains_key(&key(child_uuid)));
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

  let root = peggml_get_root_uuid();
  assert_eq!(values[&key(root)], 28);

  assert_eq!(peggml_parser_destroy(handle), 0.0);
}
