//! Test support for the clnet workspace.
//!
//! The centrepiece is [`SimulatedCl`], an in-process driver implementing
//! [`clnet_sys::ClApi`]. Tests that touch process environment variables
//! should combine `temp_env::with_var` with `#[serial(clnet_env)]`.

use std::sync::Arc;

use clnet_sys::ClApi;

pub mod encode;
pub mod fixture;
pub mod sim;

pub use fixture::{SimDevice, SimPlatform};
pub use sim::{SUPPORTED_IMAGE_FORMATS, SimulatedCl, kernel_signatures, simulated_binary};

/// Route `tracing` output through the test harness. Safe to call from every
/// test; only the first call installs a subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("clnet=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// A shared simulator plus the same object as a `dyn ClApi`.
pub fn simulated(sim: SimulatedCl) -> (Arc<SimulatedCl>, Arc<dyn ClApi>) {
    let sim = Arc::new(sim);
    let api: Arc<dyn ClApi> = sim.clone();
    (sim, api)
}
