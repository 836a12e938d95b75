//! The Context Switch (CS): a one-shot coroutine between a driving
//! ("external") thread and a worker ("internal") thread running on its
//! own, size-configurable OS stack.
//!
//! A stack-switching fiber built from `setjmp`/`longjmp` plus inline
//! assembly is the classic way to do this, but it needs unsafe
//! stack-pointer surgery that doesn't belong in safe Rust, and a
//! hand-written generator state machine would force the PEG engine's
//! recursive descent to be rewritten around it. Instead, `body` runs on
//! a real `std::thread` built with the requested stack size, and
//! `yield`/`resume` are a two-phase rendezvous over a pair of
//! zero-capacity channels: at any instant exactly one of the two threads
//! is runnable, which is what "single active coroutine" requires.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineState {
  Inactive,
  Suspended,
  Active,
  Error,
}

pub enum Outcome<Y, R> {
  Yielded(Y),
  Terminated(R),
  Failed(String),
}

enum ToWorker {
  Resume,
}

enum ToHost<Y, R> {
  Yielded(Y),
  Terminated(R),
  Failed(String),
}

/// Handed to the user function running on the worker thread. Calling
/// `yield_value` blocks the worker until the host calls `resume` again.
///
/// Cloneable (cheap: everything is an `Arc`) so a grammar's semantic
/// actions, which are registered long before a given parse begins, can
/// each hold their own handle to whichever handle is current once a
/// parse actually starts.
pub struct YieldHandle<Y, R> {
  to_host: SyncSender<ToHost<Y, R>>,
  to_worker: Arc<Mutex<Receiver<ToWorker>>>,
  stack_start: usize,
  depth: Arc<AtomicUsize>,
  peak: Arc<AtomicUsize>,
}

impl<Y, R> Clone for YieldHandle<Y, R> {
  fn clone(&self) -> Self {
    YieldHandle {
      to_host: self.to_host.clone(),
      to_worker: self.to_worker.clone(),
      stack_start: self.stack_start,
      depth: self.depth.clone(),
      peak: self.peak.clone(),
    }
  }
}

impl<Y, R> YieldHandle<Y, R> {
  /// Suspends the worker, handing `value` to the host. Blocks until the
  /// host resumes. Panics (turning into `Outcome::Failed` on the host
  /// side) if the host has aborted the parse instead of resuming.
  pub fn yield_value(&self, value: Y) {
    let local = 0u8;
    let here = &local as *const u8 as usize;
    let depth = here.abs_diff(self.stack_start);
    self.depth.store(depth, Ordering::SeqCst);
    self.peak.fetch_max(depth, Ordering::SeqCst);

    if self.to_host.send(ToHost::Yielded(value)).is_err() {
      panic!("parse aborted: host is no longer listening");
    }
    match self.to_worker.lock().unwrap().recv() {
      Ok(ToWorker::Resume) => {}
      Err(_) => panic!("parse aborted: host dropped the resume channel"),
    }
  }
}

/// A secondary-stack coroutine yielding values of type `Y` and finally
/// returning a value of type `R`.
pub struct Coroutine<Y, R> {
  state: CoroutineState,
  stack_size: usize,
  error_what: Option<String>,
  resume_tx: Option<SyncSender<ToWorker>>,
  yield_rx: Option<Receiver<ToHost<Y, R>>>,
  join: Option<JoinHandle<()>>,
  depth: Arc<AtomicUsize>,
  peak: Arc<AtomicUsize>,
}

/// Default stack size for the worker thread, matching the original's
/// default (8 MiB).
pub const DEFAULT_STACK_SIZE: usize = 8 * 1024 * 1024;

impl<Y: Send + 'static, R: Send + 'static> Coroutine<Y, R> {
  pub fn new(stack_size_bytes: usize) -> Self {
    Coroutine {
      state: CoroutineState::Inactive,
      stack_size: stack_size_bytes,
      error_what: None,
      resume_tx: None,
      yield_rx: None,
      join: None,
      depth: Arc::new(AtomicUsize::new(0)),
      peak: Arc::new(AtomicUsize::new(0)),
    }
  }

  pub fn get_stack_size(&self) -> usize {
    self.stack_size
  }

  pub fn set_stack_size(&mut self, stack_size_bytes: usize) {
    self.stack_size = stack_size_bytes;
  }

  pub fn is_active(&self) -> bool {
    self.state == CoroutineState::Active
  }

  pub fn is_suspended(&self) -> bool {
    self.state == CoroutineState::Suspended
  }

  pub fn is_inactive(&self) -> bool {
    matches!(self.state, CoroutineState::Inactive | CoroutineState::Error)
  }

  pub fn is_error(&self) -> bool {
    self.state == CoroutineState::Error
  }

  pub fn error_what(&self) -> Option<&str> {
    self.error_what.as_deref()
  }

  pub fn current_stack_depth(&self) -> usize {
    self.depth.load(Ordering::SeqCst)
  }

  pub fn estimate_peak_stack_usage(&self) -> usize {
    self.peak.load(Ordering::SeqCst)
  }

  /// Stores `body`, transitioning to `Suspended` without running it yet
  /// (the first `resume` starts it). Precondition: `Inactive` or `Error`.
  pub fn begin<F>(&mut self, body: F) -> Result<(), &'static str>
  where
    F: FnOnce(&YieldHandle<Y, R>) -> R + Send + 'static,
  {
    if !matches!(self.state, CoroutineState::Inactive | CoroutineState::Error) {
      return Err("cannot begin stackframe -- already active or suspended.");
    }

    let (resume_tx, resume_rx) = mpsc::sync_channel::<ToWorker>(0);
    let (yield_tx, yield_rx) = mpsc::sync_channel::<ToHost<Y, R>>(0);
    let depth = self.depth.clone();
    let peak = self.peak.clone();

    // The worker blocks here until the first `resume`, so `begin` never
    // executes `body`.
    let stack_size = self.stack_size;
    let join = std::thread::Builder::new()
      .stack_size(stack_size)
      .spawn(move || {
        let stack_start = {
          let local = 0u8;
          &local as *const u8 as usize
        };

        match resume_rx.recv() {
          Ok(ToWorker::Resume) => {}
          Err(_) => return,
        }

        let handle =
          YieldHandle { to_host: yield_tx.clone(), to_worker: Arc::new(Mutex::new(resume_rx)), stack_start, depth, peak };

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| body(&handle)));
        match result {
          Ok(value) => {
            let _ = yield_tx.send(ToHost::Terminated(value));
          }
          Err(payload) => {
            let msg = panic_message(&payload);
            let _ = yield_tx.send(ToHost::Failed(msg));
          }
        }
      })
      .map_err(|_| "error allocating stack")?;

    self.resume_tx = Some(resume_tx);
    self.yield_rx = Some(yield_rx);
    self.join = Some(join);
    self.state = CoroutineState::Suspended;
    Ok(())
  }

  /// Runs `body` until it yields, returns, or panics. Precondition:
  /// `Suspended`.
  pub fn resume(&mut self) -> Result<Outcome<Y, R>, &'static str> {
    if self.state != CoroutineState::Suspended {
      return Err("cannot resume stack -- not suspended.");
    }

    self.state = CoroutineState::Active;

    let Some(tx) = &self.resume_tx else {
      self.state = CoroutineState::Error;
      return Ok(Outcome::Failed("coroutine was never started".into()));
    };
    if tx.send(ToWorker::Resume).is_err() {
      self.state = CoroutineState::Error;
      self.error_what = Some("worker thread is gone".into());
      return Ok(Outcome::Failed("worker thread is gone".into()));
    }

    let Some(rx) = &self.yield_rx else {
      self.state = CoroutineState::Error;
      return Ok(Outcome::Failed("coroutine was never started".into()));
    };

    match rx.recv() {
      Ok(ToHost::Yielded(y)) => {
        self.state = CoroutineState::Suspended;
        Ok(Outcome::Yielded(y))
      }
      Ok(ToHost::Terminated(r)) => {
        self.state = CoroutineState::Inactive;
        self.join_quietly();
        Ok(Outcome::Terminated(r))
      }
      Ok(ToHost::Failed(msg)) => {
        self.state = CoroutineState::Error;
        self.error_what = Some(msg.clone());
        self.join_quietly();
        Ok(Outcome::Failed(msg))
      }
      Err(_) => {
        self.state = CoroutineState::Error;
        self.error_what = Some("worker thread vanished without a result".into());
        Ok(Outcome::Failed("worker thread vanished without a result".into()))
      }
    }
  }

  /// Unwinds the worker thread without joining it: drops the resume
  /// channel so a blocked worker's next `recv` fails and it panics its
  /// way to exit on its own. Leaves the coroutine in `Error`.
  pub fn abort(&mut self) {
    self.resume_tx = None;
    self.yield_rx = None;
    self.join = None;
    self.state = CoroutineState::Error;
    self.error_what = Some("parse aborted by host".into());
  }

  fn join_quietly(&mut self) {
    if let Some(join) = self.join.take() {
      let _ = join.join();
    }
  }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    s.to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic".to_string()
  }
}
