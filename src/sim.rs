// Copyright 2022 bmc::labs Gmbh. All rights reserved.

//! A deterministic stand-in for a T-series device.
//!
//! Every scan of a simulated stream reads `c + 1` volts on scan list slot `c`,
//! so de-interleaving errors show up as wrong constants. Faults are queued per
//! primitive as vendor error codes and fire in order.

use crate::{binding::{Binding, BindingError, Handle, StreamBlock,
                      LJME_DEVICE_NOT_OPEN, LJME_INVALID_NAME,
                      STREAM_NOT_RUNNING},
            skip::SKIP_VALUE};
use getset::{CopyGetters, Getters};
use std::collections::VecDeque;


/// Stream start on a device that is already streaming.
const STREAM_IS_ACTIVE: i32 = 2605;


#[derive(Clone, Debug)]
struct SimStream {
  scans_per_read: usize,
  n_addresses:    usize,
  blocks:         usize,
}


/// Simulated device implementing `Binding`.
///
/// The counters only count calls that succeeded.
#[derive(Clone, Debug, Default, CopyGetters, Getters)]
pub struct SimulatedDevice {
  #[getset(get_copy = "pub")]
  opens:         usize,
  #[getset(get_copy = "pub")]
  closes:        usize,
  #[getset(get_copy = "pub")]
  stream_starts: usize,
  #[getset(get_copy = "pub")]
  stream_stops:  usize,
  #[getset(get_copy = "pub")]
  stream_reads:  usize,
  /// Every register written, in order.
  #[getset(get = "pub")]
  written:       Vec<(String, f64)>,

  rate_ceiling:  Option<f64>,
  handle:        Option<Handle>,
  next_handle:   Handle,
  stream:        Option<SimStream>,
  pending_skips: usize,

  open_faults:  VecDeque<i32>,
  write_faults: VecDeque<i32>,
  start_faults: VecDeque<i32>,
  read_faults:  VecDeque<(usize, i32)>,
  stop_faults:  VecDeque<i32>,
}

impl SimulatedDevice {
  pub fn new() -> Self {
    Self::default()
  }

  /// Runs streams at no more than `ceiling` Hz, whatever rate is requested.
  pub fn coerce_rate(mut self, ceiling: f64) -> Self {
    self.rate_ceiling = Some(ceiling);
    self
  }

  pub fn fail_open(&mut self, code: i32) {
    self.open_faults.push_back(code);
  }

  pub fn fail_write_setting(&mut self, code: i32) {
    self.write_faults.push_back(code);
  }

  pub fn fail_stream_start(&mut self, code: i32) {
    self.start_faults.push_back(code);
  }

  /// Fails the stream read that follows `after` successful reads of a
  /// stream.
  pub fn fail_stream_read(&mut self, after: usize, code: i32) {
    self.read_faults.push_back((after, code));
  }

  /// Fails the next stream stop; the stream keeps running.
  pub fn fail_stream_stop(&mut self, code: i32) {
    self.stop_faults.push_back(code);
  }

  /// Blanks the first `scans` scans of the next blocks with the skip value,
  /// as the device does after recovering from a buffer overflow.
  pub fn inject_skipped_scans(&mut self, scans: usize) {
    self.pending_skips += scans;
  }

  /// Invalidates the open handle as if the cable had been pulled.
  pub fn drop_connection(&mut self) {
    self.handle = None;
    self.stream = None;
  }

  pub fn settings_written(&self) -> usize {
    self.written.len()
  }

  pub fn is_streaming(&self) -> bool {
    self.stream.is_some()
  }

  fn check(&self, handle: Handle) -> Result<(), BindingError> {
    match self.handle {
      Some(open) if open == handle => Ok(()),
      _ => Err(fault(LJME_DEVICE_NOT_OPEN)),
    }
  }
}

fn fault(code: i32) -> BindingError {
  let name = match code {
    LJME_DEVICE_NOT_OPEN => "LJME_DEVICE_NOT_OPEN",
    LJME_INVALID_NAME => "LJME_INVALID_NAME",
    STREAM_NOT_RUNNING => "STREAM_NOT_RUNNING",
    STREAM_IS_ACTIVE => "STREAM_IS_ACTIVE",
    _ => "simulated fault",
  };
  BindingError::new(code, name)
}

impl Binding for SimulatedDevice {
  fn open(&mut self,
          _device_type: &str,
          _connection_type: &str,
          _address: &str)
          -> Result<Handle, BindingError> {
    if let Some(code) = self.open_faults.pop_front() {
      return Err(fault(code));
    }
    self.next_handle += 1;
    self.handle = Some(self.next_handle);
    self.stream = None;
    self.opens += 1;
    Ok(self.next_handle)
  }

  fn close(&mut self, handle: Handle) -> Result<(), BindingError> {
    self.check(handle)?;
    self.handle = None;
    self.stream = None;
    self.closes += 1;
    Ok(())
  }

  fn write_setting(&mut self,
                   handle: Handle,
                   name: &str,
                   value: f64)
                   -> Result<(), BindingError> {
    self.check(handle)?;
    if let Some(code) = self.write_faults.pop_front() {
      return Err(fault(code));
    }
    self.written.push((name.to_string(), value));
    Ok(())
  }

  /// AIN registers sit two Modbus addresses apart, starting at 0.
  fn name_to_address(&self, name: &str) -> Result<i32, BindingError> {
    name.strip_prefix("AIN")
        .and_then(|channel| channel.parse::<i32>().ok())
        .map(|channel| 2 * channel)
        .ok_or_else(|| fault(LJME_INVALID_NAME))
  }

  fn stream_start(&mut self,
                  handle: Handle,
                  scans_per_read: usize,
                  addresses: &[i32],
                  scan_rate: f64)
                  -> Result<f64, BindingError> {
    self.check(handle)?;
    if let Some(code) = self.start_faults.pop_front() {
      return Err(fault(code));
    }
    if self.stream.is_some() {
      return Err(fault(STREAM_IS_ACTIVE));
    }

    self.stream = Some(SimStream { scans_per_read,
                                   n_addresses: addresses.len(),
                                   blocks: 0 });
    self.stream_starts += 1;
    Ok(match self.rate_ceiling {
      Some(ceiling) => scan_rate.min(ceiling),
      None => scan_rate,
    })
  }

  fn stream_read(&mut self, handle: Handle) -> Result<StreamBlock, BindingError> {
    self.check(handle)?;
    let stream = self.stream.as_mut().ok_or_else(|| fault(STREAM_NOT_RUNNING))?;

    if let Some(&(after, code)) = self.read_faults.front() {
      if after == stream.blocks {
        self.read_faults.pop_front();
        return Err(fault(code));
      }
    }

    let n_addresses = stream.n_addresses;
    let mut samples = (0..stream.scans_per_read).flat_map(|_| {
                                                  (1..=n_addresses).map(|c| c as f64)
                                                })
                                                .collect::<Vec<_>>();

    let skipped = self.pending_skips.min(stream.scans_per_read);
    for sample in samples.iter_mut().take(skipped * n_addresses) {
      *sample = SKIP_VALUE;
    }
    self.pending_skips -= skipped;

    stream.blocks += 1;
    self.stream_reads += 1;
    Ok(StreamBlock::new(samples, 0, 0))
  }

  fn stream_stop(&mut self, handle: Handle) -> Result<(), BindingError> {
    self.check(handle)?;
    if let Some(code) = self.stop_faults.pop_front() {
      return Err(fault(code));
    }
    if self.stream.take().is_none() {
      return Err(fault(STREAM_NOT_RUNNING));
    }
    self.stream_stops += 1;
    Ok(())
  }
}
