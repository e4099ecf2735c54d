//! Redirection of hot-path methods to native trampolines.
//!
//! Selected methods (operators, small constructors) can bypass bytecode
//! interpretation. Before dispatching a call, the interpreter asks the
//! [`RedirectionTable`]; when a trampoline is registered for the callee's
//! [`MethodSignature`] it runs natively against the caller's frame, otherwise
//! the interpreter executes the bytecode as usual. Redirection is purely an
//! optimization: a redirected method must behave exactly like its bytecode.
//!
//! # Lifecycle
//!
//! ```text
//! RedirectionTableBuilder ──register()──► ... ──freeze()──► RedirectionTable
//!      (startup, open)                                      (shared, read-only)
//! ```
//!
//! # Key Components
//!
//! - [`MethodSignature`] - `(declaring type, name, parameter types)` key
//! - [`Trampoline`] / [`RedirectContext`] - Native implementation and its view of the frame
//! - [`RedirectionTableBuilder`] / [`RedirectionTable`] - Open and frozen table
//! - [`RedirectOutcome`] - Whether a call was redirected

mod context;
mod signature;
mod table;

pub use context::{RedirectContext, RedirectOutcome, Trampoline};
pub use signature::MethodSignature;
pub use table::{RedirectionTable, RedirectionTableBuilder};
