// Copyright 2022 bmc::labs Gmbh. All rights reserved.

use getset::{CopyGetters, Getters};
use std::{error, fmt};


/// Device handle as returned by `Binding::open`.
pub type Handle = i32;

/// LJM error code reported when the device connection was never established
/// or has been lost.
pub const LJME_DEVICE_NOT_OPEN: i32 = 1224;
/// Register name unknown to the library.
pub const LJME_INVALID_NAME: i32 = 1294;
/// Stream read or stop on a device that is not streaming.
pub const STREAM_NOT_RUNNING: i32 = 2620;


/// Error reported by a hardware binding: the vendor error code and its
/// description.
#[derive(Clone, Debug, PartialEq, CopyGetters, Getters)]
pub struct BindingError {
  #[getset(get_copy = "pub")]
  code:    i32,
  #[getset(get = "pub")]
  message: String,
}

impl BindingError {
  pub fn new(code: i32, message: &str) -> Self {
    Self { code,
           message: message.to_string() }
  }

  pub fn is_connection_lost(&self) -> bool {
    self.code == LJME_DEVICE_NOT_OPEN
  }
}

impl fmt::Display for BindingError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{} ({})", self.message, self.code)
  }
}

impl error::Error for BindingError {}


/// One block returned by a stream read: the interleaved samples of
/// `scans_per_read` scans and the two backlog counters.
#[derive(Clone, Debug, Default, PartialEq, CopyGetters, Getters)]
pub struct StreamBlock {
  #[getset(get = "pub")]
  samples:        Vec<f64>,
  #[getset(get_copy = "pub")]
  device_backlog: i32,
  #[getset(get_copy = "pub")]
  driver_backlog: i32,
}

impl StreamBlock {
  pub fn new(samples: Vec<f64>, device_backlog: i32, driver_backlog: i32) -> Self {
    Self { samples,
           device_backlog,
           driver_backlog }
  }

  pub fn into_samples(self) -> Vec<f64> {
    self.samples
  }
}


/// The primitives an acquisition needs from the hardware library.
///
/// Implementations block until the requested operation completes. A lost or
/// never established connection must be reported with the code
/// `LJME_DEVICE_NOT_OPEN`, all other faults with whatever code the library
/// uses.
pub trait Binding {
  /// Opens a device and returns its handle.
  fn open(&mut self,
          device_type: &str,
          connection_type: &str,
          address: &str)
          -> Result<Handle, BindingError>;

  fn close(&mut self, handle: Handle) -> Result<(), BindingError>;

  /// Writes a single named register.
  fn write_setting(&mut self,
                   handle: Handle,
                   name: &str,
                   value: f64)
                   -> Result<(), BindingError>;

  /// Resolves a register name such as `AIN72` to its Modbus address.
  fn name_to_address(&self, name: &str) -> Result<i32, BindingError>;

  /// Starts streaming the given scan list and returns the scan rate the device
  /// actually runs at.
  fn stream_start(&mut self,
                  handle: Handle,
                  scans_per_read: usize,
                  addresses: &[i32],
                  scan_rate: f64)
                  -> Result<f64, BindingError>;

  /// Blocks until the next block of `scans_per_read` scans is available.
  fn stream_read(&mut self, handle: Handle) -> Result<StreamBlock, BindingError>;

  fn stream_stop(&mut self, handle: Handle) -> Result<(), BindingError>;
}

impl<B: Binding + ?Sized> Binding for &mut B {
  fn open(&mut self,
          device_type: &str,
          connection_type: &str,
          address: &str)
          -> Result<Handle, BindingError> {
    (**self).open(device_type, connection_type, address)
  }

  fn close(&mut self, handle: Handle) -> Result<(), BindingError> {
    (**self).close(handle)
  }

  fn write_setting(&mut self,
                   handle: Handle,
                   name: &str,
                   value: f64)
                   -> Result<(), BindingError> {
    (**self).write_setting(handle, name, value)
  }

  fn name_to_address(&self, name: &str) -> Result<i32, BindingError> {
    (**self).name_to_address(name)
  }

  fn stream_start(&mut self,
                  handle: Handle,
                  scans_per_read: usize,
                  addresses: &[i32],
                  scan_rate: f64)
                  -> Result<f64, BindingError> {
    (**self).stream_start(handle, scans_per_read, addresses, scan_rate)
  }

  fn stream_read(&mut self, handle: Handle) -> Result<StreamBlock, BindingError> {
    (**self).stream_read(handle)
  }

  fn stream_stop(&mut self, handle: Handle) -> Result<(), BindingError> {
    (**self).stream_stop(handle)
  }
}
