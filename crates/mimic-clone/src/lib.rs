//! # Mimic Clone
//!
//! Deep and shallow cloning of object graphs held in a [`mimic_heap`] heap.
//!
//! ## Design
//!
//! - **Topology preserving**: shared references stay shared and cycles stay
//!   cycles, tracked by an [`IdentityMap`] per clone session
//! - **Immutables are shared**: registered classes, registered instances and
//!   classes carrying the immutable marker are never copied
//! - **Pluggable**: [`TypeCloner`] strategies take over exact classes or whole
//!   subtype trees; standard containers, dates and text buffers ship built in
//! - **Thread-safe**: a [`Cloner`] can be configured and used concurrently
//!
//! ```ignore
//! let classes = ClassRegistry::standard();
//! let cloner = Cloner::new(&classes)?;
//! let copy = cloner.deep_clone(&graph)?;
//! ```

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod builtin;
pub mod classify;
pub mod cloner;
pub mod config;
pub mod error;
pub mod session;
pub mod strategy;

pub use classify::{Classification, ImmutableRegistry};
pub use cloner::Cloner;
pub use config::ClonerConfig;
pub use error::{CloneError, CloneResult};
pub use session::IdentityMap;
pub use strategy::{StrategyRegistry, TypeCloner};
