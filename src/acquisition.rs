// Copyright 2022 bmc::labs Gmbh. All rights reserved.

use crate::{binding::{Binding, Handle, StreamBlock},
            channel::ChannelMap,
            config::StreamConfig,
            config_err,
            ensure,
            error::{DaqError, Result},
            session::{Capture, Session},
            skip};
use chrono::Local;
use getset::{CopyGetters, Getters, MutGetters};
use lazy_static::lazy_static;
use std::{collections::HashMap,
          time::{Duration, Instant}};
use tracing::{debug, info, warn};


/// Reconnect-and-retry attempts granted to a single `read` call.
const MAX_RECONNECTS: usize = 1;

lazy_static! {
  // aggregate stream sample rate each device type sustains, samples/s
  static ref MAX_SAMPLE_RATES: HashMap<&'static str, f64> =
    [("T4", 40_000.0), ("T7", 100_000.0), ("T8", 40_000.0)].iter()
                                                             .copied()
                                                             .collect();
}


/// Totals of one successful `read` call.
#[derive(Clone, Copy, Debug, PartialEq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct ReadSummary {
  /// Scan rate reported by the device when the stream started, in Hz.
  achieved_scan_rate: f64,
  addresses:          usize,
  blocks:             usize,
  scans:              usize,
  skipped_scans:      usize,
  /// Wall time spent in block reads of the successful attempt.
  elapsed:            Duration,
  /// 1 unless the read had to reconnect.
  attempts:           usize,
}

impl ReadSummary {
  /// Scan rate measured on the host clock, 0 if no time was measured.
  pub fn timed_scan_rate(&self) -> f64 {
    let secs = self.elapsed.as_secs_f64();
    if secs > 0.0 {
      self.scans as f64 / secs
    } else {
      0.0
    }
  }

  pub fn timed_sample_rate(&self) -> f64 {
    self.timed_scan_rate() * self.addresses as f64
  }
}


/// Drives one device through configure, stream start, block reads and
/// stream stop.
///
/// The acquisition owns the binding and the device handle; dropping it closes
/// the handle.
#[derive(Getters, MutGetters, CopyGetters)]
pub struct Acquisition<B: Binding> {
  #[getset(get = "pub", get_mut = "pub")]
  binding:         B,
  #[getset(get = "pub")]
  config:          StreamConfig,
  #[getset(get = "pub")]
  channels:        ChannelMap,
  handle:          Option<Handle>,
  /// Aggregate sample rate ceiling in samples/s.
  #[getset(get_copy = "pub")]
  max_sample_rate: f64,
}

impl<B: Binding> Acquisition<B> {
  /// Sets up an acquisition of a known device type. Nothing is sent to the
  /// device before `connect` or `read`.
  pub fn new(binding: B, config: StreamConfig, channels: ChannelMap) -> Result<Self> {
    let max_sample_rate = match MAX_SAMPLE_RATES.get(config.device_type().as_str()) {
      Some(&rate) => rate,
      None => return config_err!("unknown device type '{}'", config.device_type()),
    };
    Self::with_max_sample_rate(binding, config, channels, max_sample_rate)
  }

  /// Sets up an acquisition with an explicit aggregate sample rate ceiling,
  /// e.g. for devices missing from the capability table.
  pub fn with_max_sample_rate(binding: B,
                              config: StreamConfig,
                              channels: ChannelMap,
                              max_sample_rate: f64)
                              -> Result<Self> {
    ensure!(!channels.is_empty(), config_err!("no channels to acquire"));
    ensure!(!channels.has_duplicate_addresses(),
            config_err!("channel groups {:?} repeat physical addresses",
                        channels.groups()));
    ensure!(max_sample_rate.is_finite() && max_sample_rate > 0.0,
            config_err!("invalid sample rate ceiling {}", max_sample_rate));

    Ok(Self { binding,
              config,
              channels,
              handle: None,
              max_sample_rate })
  }

  /// An empty session labelled with this acquisition's configuration and
  /// channels.
  pub fn new_session(&self) -> Session {
    Session::new(self.config.clone(), self.channels.clone())
  }

  pub fn is_connected(&self) -> bool {
    self.handle.is_some()
  }

  /// Opens the device and writes every stream setting. An already open
  /// handle is closed first.
  pub fn connect(&mut self) -> Result<()> {
    self.config.validate()?;
    self.release();

    let handle = self.binding.open(self.config.device_type(),
                                   self.config.connection_type(),
                                   self.config.address())?;

    for (name, value) in self.config.settings().iter() {
      if let Err(err) = self.binding.write_setting(handle, name, f64::from(value)) {
        if let Err(close_err) = self.binding.close(handle) {
          warn!("failed to close handle {} after setup error: {}", handle, close_err);
        }
        return Err(err.into());
      }
    }

    info!("connected to {} via {} at {} (handle {})",
          self.config.device_type(),
          self.config.connection_type(),
          self.config.address(),
          handle);
    self.handle = Some(handle);
    Ok(())
  }

  pub fn disconnect(&mut self) -> Result<()> {
    if let Some(handle) = self.handle.take() {
      self.binding.close(handle)?;
      info!("disconnected handle {}", handle);
    }
    Ok(())
  }

  fn release(&mut self) {
    if let Some(handle) = self.handle.take() {
      if let Err(err) = self.binding.close(handle) {
        warn!("failed to close handle {}: {}", handle, err);
      }
    }
  }

  /// Streams `nreads` blocks of `scan_length` scans at `scan_rate` Hz and
  /// appends one capture per block to `session`.
  ///
  /// A lost connection is answered by one reconnect and a complete re-run;
  /// whatever the failed attempt gathered is discarded. The session is only
  /// touched once every block has been read.
  pub fn read(&mut self,
              session: &mut Session,
              scan_rate: f64,
              scan_length: usize,
              nreads: usize)
              -> Result<ReadSummary> {
    let n_addresses = self.channels.len();
    let ceiling = self.max_sample_rate / n_addresses as f64;
    ensure!(scan_rate.is_finite() && scan_rate > 0.0,
            config_err!("scan rate must be positive, got {}", scan_rate));
    ensure!(scan_rate <= ceiling,
            config_err!("scan rate {} Hz exceeds {} Hz for {} addresses on {}",
                        scan_rate,
                        ceiling,
                        n_addresses,
                        self.config.device_type()));
    ensure!(scan_length > 0, config_err!("scan length must be at least 1"));
    ensure!(nreads > 0, config_err!("number of reads must be at least 1"));
    ensure!(session.channels().ids() == self.channels.ids(),
            config_err!("session channels do not match the acquisition's"));

    let mut reconnects = 0;
    let mut attempts = 0;
    loop {
      attempts += 1;
      let result = match self.handle {
        Some(handle) => self.read_once(handle, scan_rate, scan_length, nreads),
        None => Err(DaqError::ConnectionLost("device not connected".to_string())),
      };

      match result {
        Ok((captures, summary)) => {
          session.append(captures)?;
          return Ok(ReadSummary { attempts, ..summary });
        }
        Err(err) if err.is_connection_lost() && reconnects < MAX_RECONNECTS => {
          reconnects += 1;
          warn!("{}, reconnecting ({}/{})", err, reconnects, MAX_RECONNECTS);
          self.connect().map_err(DaqError::into_fatal)?;
        }
        Err(err) => return Err(err.into_fatal()),
      }
    }
  }

  fn read_once(&mut self,
               handle: Handle,
               scan_rate: f64,
               scan_length: usize,
               nreads: usize)
               -> Result<(Vec<Capture>, ReadSummary)> {
    let mut addresses = Vec::with_capacity(self.channels.len());
    for name in self.channels.addresses() {
      addresses.push(self.binding.name_to_address(name)?);
    }
    let n_addresses = addresses.len();

    let achieved =
      self.binding.stream_start(handle, scan_length, &addresses, scan_rate)?;
    info!("stream started at {} Hz (requested {} Hz), {} blocks of {} scans",
          achieved,
          scan_rate,
          nreads,
          scan_length);

    let ids = self.channels.ids();
    let mut stream = ActiveStream::new(&mut self.binding, handle);
    let mut captures = Vec::with_capacity(nreads);
    let mut skipped_scans = 0;
    let started_at = Instant::now();

    for block_no in 1..=nreads {
      let started = Local::now().naive_local();
      let block_start = Instant::now();
      let block = stream.read()?;
      let block_time = block_start.elapsed().as_secs_f64();

      let report = skip::inspect(&block, n_addresses);
      debug!("block {}/{}: {:.1} Hz measured, {} scans skipped, backlog \
              device {} driver {}",
             block_no,
             nreads,
             scan_length as f64 / block_time,
             report.skipped_scans(),
             report.device_backlog(),
             report.driver_backlog());
      if !report.is_consistent() {
        warn!("block {}: {} skip sentinels do not divide into {} addresses",
              block_no,
              report.sentinels(),
              n_addresses);
      }
      skipped_scans += report.skipped_scans();

      captures.push(Capture::from_interleaved(started,
                                              achieved,
                                              ids,
                                              block.samples(),
                                              scan_length)?);
    }

    let elapsed = started_at.elapsed();
    stream.finish()?;

    if skipped_scans > 0 {
      warn!("{} scans skipped during read", skipped_scans);
    }
    Ok((captures,
        ReadSummary { achieved_scan_rate: achieved,
                      addresses: n_addresses,
                      blocks: nreads,
                      scans: nreads * scan_length,
                      skipped_scans,
                      elapsed,
                      attempts: 1 }))
  }
}

impl<B: Binding> Drop for Acquisition<B> {
  fn drop(&mut self) {
    self.release();
  }
}


// stops the stream it guards when dropped, unless `finish` stopped it
struct ActiveStream<'a, B: Binding> {
  binding: &'a mut B,
  handle:  Handle,
  running: bool,
}

impl<'a, B: Binding> ActiveStream<'a, B> {
  fn new(binding: &'a mut B, handle: Handle) -> Self {
    Self { binding,
           handle,
           running: true }
  }

  fn read(&mut self) -> Result<StreamBlock> {
    Ok(self.binding.stream_read(self.handle)?)
  }

  fn finish(mut self) -> Result<()> {
    self.running = false;
    self.binding.stream_stop(self.handle)?;
    Ok(())
  }
}

impl<'a, B: Binding> Drop for ActiveStream<'a, B> {
  fn drop(&mut self) {
    if self.running {
      if let Err(err) = self.binding.stream_stop(self.handle) {
        warn!("failed to stop stream on handle {}: {}", self.handle, err);
      }
    }
  }
}
