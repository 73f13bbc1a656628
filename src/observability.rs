//! # Observability & Tracing
//!
//! The runtime logs through the `tracing` crate and never installs a
//! subscriber on its own. Binaries and tests call [`setup_tracing`] once.
//!
//! ## Configuration
//!
//! The subscriber reads its filter from `RUST_LOG` and uses the compact
//! format without module targets, so lines stay short while structured
//! fields (`actor`, `task`, `method`, `reason`) remain filterable.
//!
//! ```bash
//! # Lifecycle only: boots, spawns, exits, restarts, shutdown
//! RUST_LOG=info cargo run
//!
//! # Every dispatched call, task switch and exit event
//! RUST_LOG=debug cargo run
//!
//! # Only the supervision layer
//! RUST_LOG=actor_runtime::supervisor=debug cargo run
//! ```
//!
//! ## What Gets Logged
//!
//! - **Actor lifecycle** (`info`): actor started, actor terminated.
//! - **Crashes** (`error`): the failing method and the error that escaped it.
//! - **Aborts** (`debug`): rejected calls; the caller receives the error and
//!   the actor keeps running.
//! - **Supervision** (`warn`): restarts, intensity limits, killed stragglers.
//! - **Discards** (`debug`): late responses and unmatched messages.
//!
//! A crash at `RUST_LOG=info` looks like:
//!
//! ```text
//! ERROR Actor crashed actor=actor-3 method="divide" error=division by zero
//! ERROR Actor exited after crash actor=actor-3 error=division by zero
//! WARN Restarting crashed actor actor=actor-3 name=Some("calculator") error=division by zero
//! ```

/// Installs a compact `fmt` subscriber filtered by `RUST_LOG`.
///
/// Calling it again (every test does) is harmless: only the first
/// subscriber wins.
pub fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}
