//! Bluetooth Low Energy adapter for bluetune
//!
//! Provides the capability task that turns session effects into adapter calls
//! and adapter notifications into session events.
//!
//! ## Architecture
//!
//! - [`config`] - Adapter configuration
//! - [`error`] - Error types specific to the adapter
//! - [`discovery`] - Adapter initialization and scanning
//! - [`connection`] - Connection attempts, link tracking and GATT discovery
//! - [`adapter`] - `BleAdapterTask`, the btleplug-backed task
//! - [`simulated`] - `SimulatedAdapterTask`, a scripted stand-in
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bluetune_ble::{BleAdapterTask, BleConfig};
//! use bluetune_runtime::RuntimeBuilder;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let adapter = BleAdapterTask::new(BleConfig::default());
//! let runtime = RuntimeBuilder::new()
//!     .add_task(Box::new(adapter))
//!     .build_and_start()
//!     .await?;
//! runtime.start_scanning().await?;
//! # Ok(())
//! # }
//! ```

mod adapter;
mod config;
mod connection;
mod discovery;
mod error;
mod simulated;

// Public API exports
pub use adapter::BleAdapterTask;
pub use config::BleConfig;
pub use error::{BleError, BleResult};
pub use simulated::{
    demo_peripherals, ConnectBehavior, SimulatedAdapterTask, SimulatedPeripheral,
    SimulatorControl, SimulatorTiming,
};
