//! # Shop Sample
//!
//! A small shop built on `actor-runtime`, exposed as a library for the
//! integration tests.

pub mod clients;
pub mod lifecycle;
pub mod model;
