//! Event timing primitives shared by the input layers.

pub mod debounce;

pub use debounce::{
  AsyncHook,
  Coalesce,
  Debouncer,
  send_blocking,
  try_send,
};
