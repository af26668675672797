//! Declarative registration records and their accumulation.
//!
//! Registrations are collected from the internal configuration, bootstrapper
//! hooks and registration tasks, flattened into [`TypeRegistration`]s and
//! checked for lifetime conflicts before any container is built.

pub mod accumulator;
pub mod contract;
pub mod lifetime;
pub mod registrations;

pub use accumulator::*;
pub use contract::*;
pub use lifetime::*;
pub use registrations::*;
