//! Utilities for debouncing events, synchronously or as an async hook.

use std::time::Duration;

use futures_executor::block_on;
use tokio::{
  sync::mpsc::{
    self,
    Sender,
    error::TrySendError,
  },
  time::Instant,
};

/// Maximum time to block when sending to a full channel.
/// Better to drop a message than to freeze input handling.
const SEND_TIMEOUT_MS: u64 = 2;

/// Holds the latest pending event until `interval` passes without a new one.
///
/// This is the synchronous flavour, for owners that already run an event loop
/// and can call [`Debouncer::poll`] on every tick. Every [`Debouncer::push`]
/// replaces the pending event and restarts the timer.
#[derive(Debug)]
pub struct Debouncer<T> {
  interval: Duration,
  pending:  Option<(T, std::time::Instant)>,
}

impl<T> Debouncer<T> {
  pub fn new(interval: Duration) -> Self {
    Self {
      interval,
      pending: None,
    }
  }

  pub fn interval(&self) -> Duration {
    self.interval
  }

  /// Queue `event`, dropping whatever was pending. Returns the new deadline.
  pub fn push(&mut self, event: T, now: std::time::Instant) -> std::time::Instant {
    let deadline = now + self.interval;
    self.pending = Some((event, deadline));
    deadline
  }

  /// Take the pending event if its deadline has passed.
  pub fn poll(&mut self, now: std::time::Instant) -> Option<T> {
    match &self.pending {
      Some((_, deadline)) if *deadline <= now => self.pending.take().map(|(event, _)| event),
      _ => None,
    }
  }

  /// Take the pending event regardless of its deadline.
  pub fn flush(&mut self) -> Option<T> {
    self.pending.take().map(|(event, _)| event)
  }

  /// Drop the pending event.
  pub fn cancel(&mut self) {
    self.pending = None;
  }

  pub fn next_deadline(&self) -> Option<std::time::Instant> {
    self.pending.as_ref().map(|(_, deadline)| *deadline)
  }

  pub fn is_pending(&self) -> bool {
    self.pending.is_some()
  }
}

/// Async hooks provide a convenient framework for implementing (debounced)
/// async event handlers. A hook runs as a background tokio task that waits
/// for events to be sent through a channel.
pub trait AsyncHook: Sync + Send + 'static + Sized {
  type Event: Sync + Send + 'static;
  /// Called immediately whenever an event is received, this function can
  /// consume the event immediately or debounce it. In case of debouncing,
  /// it can either define a new debounce timeout or continue the current one
  fn handle_event(&mut self, event: Self::Event, timeout: Option<Instant>) -> Option<Instant>;

  /// Called whenever the debounce timeline is reached
  fn finish_debounce(&mut self);

  fn spawn(self) -> mpsc::Sender<Self::Event> {
    let (tx, rx) = mpsc::channel(256);
    // only spawn worker if we are inside runtime to avoid having to spawn a runtime
    // for unrelated unit tests
    if tokio::runtime::Handle::try_current().is_ok() {
      tokio::spawn(run(self, rx));
    }
    tx
  }
}

async fn run<Hook: AsyncHook>(mut hook: Hook, mut rx: mpsc::Receiver<Hook::Event>) {
  let mut deadline = None;
  loop {
    let event = match deadline {
      Some(deadline_) => {
        let res = tokio::time::timeout_at(deadline_, rx.recv()).await;
        match res {
          Ok(event) => event,
          Err(_) => {
            hook.finish_debounce();
            deadline = None;
            continue;
          },
        }
      },
      None => rx.recv().await,
    };
    let Some(event) = event else {
      // flush whatever was pending before the senders went away
      if deadline.is_some() {
        hook.finish_debounce();
      }
      break;
    };
    deadline = hook.handle_event(event, deadline);
  }
}

/// Async counterpart of [`Debouncer`]: keeps the latest event and forwards it
/// to `output` once `interval` passes without a new one.
pub struct Coalesce<T> {
  interval: Duration,
  pending:  Option<T>,
  output:   Sender<T>,
}

impl<T> Coalesce<T> {
  pub fn new(interval: Duration, output: Sender<T>) -> Self {
    Self {
      interval,
      pending: None,
      output,
    }
  }
}

impl<T: Sync + Send + 'static> AsyncHook for Coalesce<T> {
  type Event = T;

  fn handle_event(&mut self, event: T, _timeout: Option<Instant>) -> Option<Instant> {
    self.pending = Some(event);
    Some(Instant::now() + self.interval)
  }

  fn finish_debounce(&mut self) {
    if let Some(event) = self.pending.take()
      && !try_send(&self.output, event)
    {
      log::warn!("dropped coalesced event: receiver full or closed");
    }
  }
}

/// Send an event to a channel, blocking only briefly if the channel is full.
///
/// Attempts a non-blocking send first. If the channel is full it blocks for
/// at most `SEND_TIMEOUT_MS` milliseconds and then drops the message.
pub fn send_blocking<T>(tx: &Sender<T>, data: T) {
  match tx.try_send(data) {
    Ok(()) => {},
    Err(TrySendError::Full(data)) => {
      let _ = block_on(tx.send_timeout(data, Duration::from_millis(SEND_TIMEOUT_MS)));
    },
    Err(TrySendError::Closed(_)) => {
      log::warn!("Attempted to send to closed channel");
    },
  }
}

/// Try to send an event without blocking at all.
/// Returns true if the event was sent, false if the channel was full or closed.
pub fn try_send<T>(tx: &Sender<T>, data: T) -> bool {
  tx.try_send(data).is_ok()
}
