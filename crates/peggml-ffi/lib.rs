//! The flat C-ABI surface: `extern "C"` functions that take and return
//! only `f64` ("double") and `*const c_char`, backed entirely by
//! `peggml_core`. A foreign scripting host that can only call
//! C-calling-convention functions returning scalars talks to this crate,
//! never to `peggml-core` directly.
//!
//! Every function here does three things and nothing else: pull raw
//! arguments off the C boundary, call into `peggml_core`, and flatten
//! the result into a status code or a borrowed C string. No parsing
//! logic, no session state, lives in this crate.

use peggml_core::{error::PeggmlError, with_core};
use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;

fn to_c_string(buf: &'static std::thread::LocalKey<RefCell<CString>>, s: &str) -> *const c_char {
  let owned = CString::new(s).unwrap_or_else(|_| CString::new(s.replace('\0', "")).unwrap());
  buf.with(|cell| {
    *cell.borrow_mut() = owned;
    cell.borrow().as_ptr()
  })
}

thread_local! {
  static ERROR_STR_BUF: RefCell<CString> = RefCell::new(CString::new("").unwrap());
  static ELT_STRING_BUF: RefCell<CString> = RefCell::new(CString::new("").unwrap());
  static ELT_TOKEN_STRING_BUF: RefCell<CString> = RefCell::new(CString::new("").unwrap());
}

fn borrow_str<'a>(ptr: *const c_char) -> Option<&'a str> {
  if ptr.is_null() {
    return None;
  }
  unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

/// `f` as a nonnegative array index, or `None` if it isn't a faithful
/// whole number (negative, fractional, or out of `usize` range).
fn as_index(f: f64) -> Option<usize> {
  if f < 0.0 || f.fract() != 0.0 {
    return None;
  }
  if f > usize::MAX as f64 {
    return None;
  }
  Some(f as usize)
}

// ---------------------------------------------------------------- error channel

#[unsafe(no_mangle)]
pub extern "C" fn peggml_error() -> f64 {
  if peggml_core::error_occurred() {
    1.0
  } else {
    0.0
  }
}

#[unsafe(no_mangle)]
pub extern "C" fn peggml_error_str() -> *const c_char {
  to_c_string(&ERROR_STR_BUF, &peggml_core::error_str())
}

/// # Safety
/// `s` must be a valid NUL-terminated C string or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn peggml_set_error(s: *const c_char) -> f64 {
  let message = unsafe { borrow_str(s) }.unwrap_or("");
  peggml_core::set_error(message);
  0.0
}

#[unsafe(no_mangle)]
pub extern "C" fn peggml_clear_error() -> f64 {
  peggml_core::clear_error();
  0.0
}

// ---------------------------------------------------------------------- engine

#[unsafe(no_mangle)]
pub extern "C" fn peggml_abi_test() -> *const c_char {
  static BUF: std::sync::OnceLock<CString> = std::sync::OnceLock::new();
  BUF.get_or_init(|| CString::new("gml-peglib").unwrap()).as_ptr()
}

#[unsafe(no_mangle)]
pub extern "C" fn peggml_version() -> f64 {
  1.2
}

#[unsafe(no_mangle)]
pub extern "C" fn peggml_set_stack_size(bytes: f64) -> f64 {
  let result = with_core(|_reg, sess| sess.set_stack_size(bytes as i64));
  match result {
    Ok(()) => 0.0,
    Err(PeggmlError::Resource { code, .. }) => code as f64,
    Err(_) => 4.0,
  }
}

#[unsafe(no_mangle)]
pub extern "C" fn peggml_get_stack_size() -> f64 {
  with_core(|_reg, sess| Ok(sess.get_stack_size() as f64)).unwrap_or(0.0)
}

#[unsafe(no_mangle)]
pub extern "C" fn peggml_stack_current_depth() -> f64 {
  with_core(|_reg, sess| Ok(sess.current_stack_depth() as f64)).unwrap_or(0.0)
}

#[unsafe(no_mangle)]
pub extern "C" fn peggml_estimate_stack_usage() -> f64 {
  with_core(|_reg, sess| Ok(sess.estimate_peak_stack_usage() as f64)).unwrap_or(0.0)
}

// -------------------------------------------------------------------- parsers

/// # Safety
/// `grammar` must be a valid NUL-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn peggml_parser_create(grammar: *const c_char) -> f64 {
  let Some(text) = (unsafe { borrow_str(grammar) }) else {
    peggml_core::set_error("grammar pointer was null or not valid UTF-8");
    return -2.0;
  };
  match with_core(|reg, _sess| reg.create(text)) {
    Ok(handle) => handle as f64,
    Err(PeggmlError::GrammarCompile { diagnostics }) if diagnostics.trim().is_empty() => -2.0,
    Err(_) => -1.0,
  }
}

#[unsafe(no_mangle)]
pub extern "C" fn peggml_parser_destroy(handle: f64) -> f64 {
  let Some(handle) = as_index(handle) else { return 1.0 };
  match with_core(|reg, _sess| reg.destroy(handle)) {
    Ok(()) => 0.0,
    Err(_) => 1.0,
  }
}

#[unsafe(no_mangle)]
pub extern "C" fn peggml_parser_enable_packrat(handle: f64) -> f64 {
  let Some(handle) = as_index(handle) else { return 1.0 };
  match with_core(|reg, _sess| reg.enable_packrat(handle)) {
    Ok(()) => 0.0,
    Err(_) => 1.0,
  }
}

/// # Safety
/// `rule_name` must be a valid NUL-terminated C string or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn peggml_parser_set_symbol_id(handle: f64, rule_name: *const c_char, id: f64) -> f64 {
  if id == 0.0 {
    peggml_core::set_error("symbol id must be nonzero");
    return 2.0;
  }
  let Some(name) = (unsafe { borrow_str(rule_name) }) else {
    peggml_core::set_error("rule name pointer was null or not valid UTF-8");
    return 3.0;
  };
  let Some(handle) = as_index(handle) else {
    peggml_core::set_error("parser handle out of range");
    return 1.0;
  };
  match with_core(|reg, sess| sess.set_symbol_id(reg, handle, name, id)) {
    Ok(()) => 0.0,
    Err(_) => 1.0,
  }
}

/// Live (non-empty) registry slot count. Not part of the original
/// interface; costs nothing to expose from `ParserRegistry`'s existing
/// state and is useful host-side bookkeeping.
#[unsafe(no_mangle)]
pub extern "C" fn peggml_parser_count() -> f64 {
  with_core(|reg, _sess| Ok(reg.live_count() as f64)).unwrap_or(0.0)
}

// --------------------------------------------------------------- parse session

/// # Safety
/// `text` must be a valid NUL-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn peggml_parse_begin(handle: f64, text: *const c_char) -> f64 {
  let Some(input) = (unsafe { borrow_str(text) }) else {
    peggml_core::set_error("text pointer was null or not valid UTF-8");
    return -2.0;
  };
  let already_in_progress = with_core(|_reg, sess| Ok(sess.is_in_progress())).unwrap_or(false);
  if already_in_progress {
    peggml_core::set_error("parse already in progress");
    return -1.0;
  }
  let Some(handle) = as_index(handle) else {
    peggml_core::set_error("parser handle out of range");
    return -2.0;
  };
  match with_core(|reg, sess| sess.parse_begin(reg, handle, input)) {
    Ok(()) => 0.0,
    Err(_) => -2.0,
  }
}

#[unsafe(no_mangle)]
pub extern "C" fn peggml_parse_next() -> f64 {
  with_core(|_reg, sess| sess.parse_next()).unwrap_or(0.0)
}

#[unsafe(no_mangle)]
pub extern "C" fn peggml_parse_abort() -> f64 {
  match with_core(|_reg, sess| sess.parse_abort()) {
    Ok(()) => 0.0,
    Err(_) => 1.0,
  }
}

#[unsafe(no_mangle)]
pub extern "C" fn peggml_parse_elt_get_uuid() -> f64 {
  with_core(|_reg, sess| sess.elt_uuid()).unwrap_or(-1.0)
}

#[unsafe(no_mangle)]
pub extern "C" fn peggml_parse_elt_get_string() -> *const c_char {
  let text = with_core(|_reg, sess| sess.elt_string().map(str::to_string)).unwrap_or_default();
  to_c_string(&ELT_STRING_BUF, &text)
}

#[unsafe(no_mangle)]
pub extern "C" fn peggml_parse_elt_get_string_offset() -> f64 {
  with_core(|_reg, sess| sess.elt_string_offset().map(|v| v as f64)).unwrap_or(0.0)
}

#[unsafe(no_mangle)]
pub extern "C" fn peggml_parse_elt_get_string_line() -> f64 {
  with_core(|_reg, sess| sess.elt_string_line().map(|v| v as f64)).unwrap_or(0.0)
}

#[unsafe(no_mangle)]
pub extern "C" fn peggml_parse_elt_get_string_column() -> f64 {
  with_core(|_reg, sess| sess.elt_string_column().map(|v| v as f64)).unwrap_or(0.0)
}

#[unsafe(no_mangle)]
pub extern "C" fn peggml_parse_elt_get_choice() -> f64 {
  with_core(|_reg, sess| sess.elt_choice().map(|v| v as f64)).unwrap_or(0.0)
}

#[unsafe(no_mangle)]
pub extern "C" fn peggml_parse_elt_get_child_count() -> f64 {
  with_core(|_reg, sess| sess.elt_child_count().map(|v| v as f64)).unwrap_or(0.0)
}

#[unsafe(no_mangle)]
pub extern "C" fn peggml_parse_elt_get_child_uuid(i: f64) -> f64 {
  let Some(index) = as_index(i) else {
    peggml_core::set_error("child index must be a nonnegative whole number");
    return -1.0;
  };
  with_core(|_reg, sess| sess.elt_child_uuid(index)).unwrap_or(-1.0)
}

#[unsafe(no_mangle)]
pub extern "C" fn peggml_parse_elt_get_token_count() -> f64 {
  with_core(|_reg, sess| sess.elt_token_count().map(|v| v as f64)).unwrap_or(0.0)
}

#[unsafe(no_mangle)]
pub extern "C" fn peggml_parse_elt_get_token_offset(i: f64) -> f64 {
  let Some(index) = as_index(i) else { return 0.0 };
  with_core(|_reg, sess| sess.elt_token_offset(index).map(|v| v as f64)).unwrap_or(0.0)
}

#[unsafe(no_mangle)]
pub extern "C" fn peggml_parse_elt_get_token_string(i: f64) -> *const c_char {
  let text = as_index(i)
    .and_then(|index| with_core(|_reg, sess| sess.elt_token_string(index).map(str::to_string)).ok())
    .unwrap_or_default();
  to_c_string(&ELT_TOKEN_STRING_BUF, &text)
}

#[unsafe(no_mangle)]
pub extern "C" fn peggml_parse_elt_get_token_number() -> f64 {
  with_core(|_reg, sess| sess.elt_token_number()).unwrap_or(0.0)
}

#[unsafe(no_mangle)]
pub extern "C" fn peggml_get_root_uuid() -> f64 {
  with_core(|_reg, sess| Ok(sess.get_root_uuid())).unwrap_or(-1.0)
}
