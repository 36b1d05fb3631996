// Copyright 2022 bmc::labs Gmbh. All rights reserved.

//! Streams differential channels behind a MUX80 off a LabJack T-series device
//! and stores the captured blocks in reloadable capture files.
//!
//! An `Acquisition` drives any `Binding` (the LJM library with the `ljm`
//! feature, or the `SimulatedDevice`) and appends one `Capture` per block read
//! to a `Session`, which `stream_file` writes and reads back.

pub mod acquisition;
pub mod binding;
pub mod channel;
pub mod config;
pub mod error;
#[cfg(feature = "ljm")]
pub mod ljm;
pub mod session;
pub mod sim;
pub mod skip;
pub mod stream_file;

pub use acquisition::{Acquisition, ReadSummary};
pub use binding::{Binding, BindingError, Handle, StreamBlock};
pub use channel::{Axis, ChannelId, ChannelMap};
pub use config::{StreamConfig, StreamSettings};
pub use error::{DaqError, Result};
#[cfg(feature = "ljm")]
pub use ljm::Ljm;
pub use session::{Capture, ChannelSeries, Session};
pub use sim::SimulatedDevice;
pub use skip::SkipReport;
