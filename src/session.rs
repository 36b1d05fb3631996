// Copyright 2022 bmc::labs Gmbh. All rights reserved.

use crate::{channel::{display_ids, ChannelId, ChannelMap},
            config::StreamConfig,
            config_err,
            ensure,
            error::{DaqError, Result},
            stream_file};
use chrono::NaiveDateTime;
use getset::{CopyGetters, Getters};
use std::{fs::File,
          io::{BufReader, BufWriter, Write},
          path::Path};


/// Samples of one channel over the duration of a capture.
#[derive(Clone, Debug, PartialEq, CopyGetters, Getters)]
pub struct ChannelSeries {
  #[getset(get_copy = "pub")]
  id:      ChannelId,
  #[getset(get = "pub")]
  samples: Vec<f64>,
}

impl ChannelSeries {
  pub fn new(id: ChannelId, samples: Vec<f64>) -> Self {
    Self { id, samples }
  }

  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }
}


/// Result of one block read: a table of per-channel samples indexed by the
/// time elapsed since the start of the block.
///
/// Every series holds exactly `scan_length()` samples, and sample `i` was
/// taken at `time()[i]`, i.e. `i / scan_rate` seconds into the capture.
#[derive(Clone, Debug, PartialEq, CopyGetters, Getters)]
pub struct Capture {
  #[getset(get_copy = "pub")]
  started:   NaiveDateTime,
  /// Scan rate the device actually ran at, in Hz.
  #[getset(get_copy = "pub")]
  scan_rate: f64,
  #[getset(get = "pub")]
  time:      Vec<f64>,
  #[getset(get = "pub")]
  channels:  Vec<ChannelSeries>,
}

impl Capture {
  /// De-interleaves a raw round-robin block. The sample of channel `c` at
  /// scan `i` sits at `raw[i * ids.len() + c]`.
  pub fn from_interleaved(started: NaiveDateTime,
                          scan_rate: f64,
                          ids: &[ChannelId],
                          raw: &[f64],
                          scan_length: usize)
                          -> Result<Self> {
    let n_addresses = ids.len();
    ensure!(n_addresses > 0, config_err!("capture needs at least one channel"));
    let expected = match n_addresses.checked_mul(scan_length) {
      Some(expected) => expected,
      None => {
        return config_err!("{} scans of {} channels exceed the addressable size",
                           scan_length,
                           n_addresses)
      }
    };
    if raw.len() != expected {
      return Err(DaqError::BlockSize { expected,
                                       actual: raw.len() });
    }

    let channels = ids.iter()
                      .enumerate()
                      .map(|(c, &id)| {
                        let samples = raw.iter()
                                         .skip(c)
                                         .step_by(n_addresses)
                                         .copied()
                                         .collect();
                        ChannelSeries::new(id, samples)
                      })
                      .collect();

    Self::from_columns(started,
                       scan_rate,
                       time_index(scan_length, scan_rate),
                       channels)
  }

  /// Builds a capture from an already de-interleaved table, e.g. one parsed
  /// from a capture file.
  pub fn from_columns(started: NaiveDateTime,
                      scan_rate: f64,
                      time: Vec<f64>,
                      channels: Vec<ChannelSeries>)
                      -> Result<Self> {
    ensure!(scan_rate.is_finite() && scan_rate > 0.0,
            config_err!("scan rate must be positive, got {}", scan_rate));
    ensure!(!channels.is_empty(),
            config_err!("capture needs at least one channel"));

    for series in &channels {
      if series.len() != time.len() {
        return config_err!("channel {} holds {} samples, time index {}",
                           series.id(),
                           series.len(),
                           time.len());
      }
    }

    Ok(Self { started,
              scan_rate,
              time,
              channels })
  }

  pub fn scan_length(&self) -> usize {
    self.time.len()
  }

  pub fn ids(&self) -> Vec<ChannelId> {
    self.channels.iter().map(ChannelSeries::id).collect()
  }

  pub fn channel(&self, id: ChannelId) -> Option<&ChannelSeries> {
    self.channels.iter().find(|series| series.id() == id)
  }

  /// Row `i` of the table: elapsed time followed by one sample per channel.
  pub fn row(&self, i: usize) -> Option<(f64, Vec<f64>)> {
    let t = *self.time.get(i)?;
    Some((t, self.channels.iter().map(|series| series.samples[i]).collect()))
  }
}

/// Elapsed time of each scan of a block, `[0, 1/rate, ..., (n-1)/rate]`.
pub fn time_index(scan_length: usize, scan_rate: f64) -> Vec<f64> {
  (0..scan_length).map(|i| i as f64 / scan_rate).collect()
}


/// All captures taken with one configuration and channel set, in acquisition
/// order.
#[derive(Clone, Debug, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct Session {
  config:   StreamConfig,
  channels: ChannelMap,
  captures: Vec<Capture>,
}

impl Session {
  pub fn new(config: StreamConfig, channels: ChannelMap) -> Self {
    Self { config,
           channels,
           captures: Vec::new() }
  }

  pub(crate) fn with_captures(config: StreamConfig,
                              channels: ChannelMap,
                              captures: Vec<Capture>)
                              -> Self {
    Self { config,
           channels,
           captures }
  }

  /// Appends captures in acquisition order. Every capture must carry exactly
  /// the session's channels, otherwise nothing is appended.
  pub fn append(&mut self, captures: Vec<Capture>) -> Result<()> {
    for capture in &captures {
      let ids = capture.ids();
      if &ids != self.channels.ids() {
        return config_err!("capture channels {} do not match session channels {}",
                           display_ids(&ids),
                           display_ids(self.channels.ids()));
      }
    }
    self.captures.extend(captures);
    Ok(())
  }

  /// Drops all captures; configuration and channels stay.
  pub fn reset(&mut self) {
    self.captures.clear();
  }

  /// Start time of every capture, parallel to `captures()`.
  pub fn stream_times(&self) -> Vec<NaiveDateTime> {
    self.captures.iter().map(Capture::started).collect()
  }

  pub fn last_scan_rate(&self) -> Option<f64> {
    self.captures.last().map(Capture::scan_rate)
  }

  pub fn capture(&self, idx: usize) -> Option<&Capture> {
    self.captures.get(idx)
  }

  pub fn len(&self) -> usize {
    self.captures.len()
  }

  pub fn is_empty(&self) -> bool {
    self.captures.is_empty()
  }

  /// Writes all captures to a capture file at `path`.
  pub fn save(&self, path: &Path) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    stream_file::write(self, &mut out)?;
    out.flush()?;
    Ok(())
  }

  /// Reads a session back from a capture file.
  pub fn load(path: &Path) -> Result<Self> {
    stream_file::read(BufReader::new(File::open(path)?))
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use chrono::NaiveDate;
  use pretty_assertions::assert_eq;


  fn started() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2022, 7, 14).unwrap()
                                        .and_hms_micro_opt(13, 37, 0, 250)
                                        .unwrap()
  }

  #[test]
  fn from_interleaved_test() {
    let map = ChannelMap::new(&[1, 4]).unwrap();
    let n_addresses = map.len();
    let (scan_length, rate) = (5, 1500.0);

    // channel c reads a constant c * 1.5 - 2.0
    let raw = (0..n_addresses * scan_length).map(|k| {
                                              (k % n_addresses) as f64 * 1.5
                                              - 2.0
                                            })
                                            .collect::<Vec<_>>();

    let capture = Capture::from_interleaved(started(),
                                            rate,
                                            map.ids(),
                                            &raw,
                                            scan_length).unwrap();

    assert_eq!(started(), capture.started());
    assert_eq!(rate, capture.scan_rate());
    assert_eq!(scan_length, capture.scan_length());
    assert_eq!(map.ids(), &capture.ids());
    for (c, series) in capture.channels().iter().enumerate() {
      assert_eq!(&vec![c as f64 * 1.5 - 2.0; scan_length], series.samples());
    }
    assert_eq!(&vec![0.0, 1.0 / rate, 2.0 / rate, 3.0 / rate, 4.0 / rate],
               capture.time());

    let (t, row) = capture.row(2).unwrap();
    assert_eq!(2.0 / rate, t);
    assert_eq!(6, row.len());
    assert_eq!(None, capture.row(scan_length));
  }

  #[test]
  fn from_interleaved_order_test() {
    let map = ChannelMap::new(&[2]).unwrap();
    let raw = vec![0.0, 10.0, 20.0, 1.0, 11.0, 21.0];
    let capture =
      Capture::from_interleaved(started(), 2.0, map.ids(), &raw, 2).unwrap();

    let z = capture.channel(map.ids()[2]).unwrap();
    assert_eq!("CH2z", z.id().to_string());
    assert_eq!(&vec![20.0, 21.0], z.samples());
    assert_eq!(&vec![0.0, 0.5], capture.time());
  }

  #[test]
  fn from_interleaved_error_test() {
    let map = ChannelMap::new(&[2]).unwrap();

    match Capture::from_interleaved(started(), 2.0, map.ids(), &[0.0; 7], 2) {
      Err(DaqError::BlockSize { expected, actual }) => {
        assert_eq!((6, 7), (expected, actual))
      }
      other => panic!("expected block size error, got {:?}", other),
    }
    assert!(Capture::from_interleaved(started(), 0.0, map.ids(), &[0.0; 6], 2)
              .is_err());
    assert!(Capture::from_interleaved(started(), 1.0, &[], &[], 2).is_err());
    assert!(matches!(Capture::from_interleaved(started(), 1.0, map.ids(), &[], usize::MAX),
                     Err(DaqError::Config(_))));
  }

  #[test]
  fn session_test() {
    let map = ChannelMap::new(&[1]).unwrap();
    let mut session = Session::new(StreamConfig::default(), map.clone());
    assert!(session.is_empty());
    assert_eq!(None, session.last_scan_rate());

    let later = started() + chrono::Duration::seconds(1);
    let first =
      Capture::from_interleaved(started(), 100.0, map.ids(), &[1.0; 6], 2)
        .unwrap();
    let second =
      Capture::from_interleaved(later, 200.0, map.ids(), &[2.0; 3], 1).unwrap();
    session.append(vec![first, second.clone()]).unwrap();

    assert_eq!(2, session.len());
    assert_eq!(vec![started(), later], session.stream_times());
    assert_eq!(Some(200.0), session.last_scan_rate());
    assert_eq!(Some(&second), session.capture(1));

    session.reset();
    assert!(session.is_empty());
    assert!(session.stream_times().is_empty());
    assert_eq!(&StreamConfig::default(), session.config());
    assert_eq!(&map, session.channels());
  }

  #[test]
  fn append_mismatch_test() {
    let map = ChannelMap::new(&[1]).unwrap();
    let other = ChannelMap::new(&[2]).unwrap();
    let mut session = Session::new(StreamConfig::default(), map.clone());

    let good = Capture::from_interleaved(started(), 10.0, map.ids(), &[1.0; 3], 1).unwrap();
    let bad = Capture::from_interleaved(started(), 10.0, other.ids(), &[1.0; 3], 1).unwrap();
    assert!(matches!(session.append(vec![good, bad]), Err(DaqError::Config(_))));
    assert!(session.is_empty());

    // a stored session always reloads with the channels it was built with
    let good = Capture::from_interleaved(started(), 10.0, map.ids(), &[1.0; 3], 1).unwrap();
    session.append(vec![good]).unwrap();
    let mut out = Vec::new();
    stream_file::write(&session, &mut out).unwrap();
    let restored = stream_file::read(&out[..]).unwrap();
    assert_eq!(&map, restored.channels());
    assert_eq!(session, restored);
  }
}
