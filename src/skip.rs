// Copyright 2022 bmc::labs Gmbh. All rights reserved.

use crate::binding::StreamBlock;
use getset::CopyGetters;


/// Sample value the device puts in slots it lost after its stream buffer
/// overflowed. Reported once auto-recovery ends.
pub const SKIP_VALUE: f64 = -9999.0;


/// Health of one stream block: how many scans the device skipped and how far
/// behind the device and the host library are.
#[derive(Clone, Copy, Debug, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct SkipReport {
  sentinels:      usize,
  skipped_scans:  usize,
  /// Sentinels left over after dividing by the number of addresses.
  remainder:      usize,
  device_backlog: i32,
  driver_backlog: i32,
}

impl SkipReport {
  /// A skipped scan blanks every address of the scan list, so the sentinel
  /// count must be a multiple of the address count.
  pub fn is_consistent(&self) -> bool {
    self.remainder == 0
  }
}


/// Counts skip sentinels in an interleaved block of `n_addresses` channels.
pub fn inspect(block: &StreamBlock, n_addresses: usize) -> SkipReport {
  let sentinels = count_sentinels(block.samples());
  let (skipped_scans, remainder) = if n_addresses == 0 {
    (0, sentinels)
  } else {
    (sentinels / n_addresses, sentinels % n_addresses)
  };

  SkipReport { sentinels,
               skipped_scans,
               remainder,
               device_backlog: block.device_backlog(),
               driver_backlog: block.driver_backlog() }
}

#[allow(clippy::float_cmp)]
fn count_sentinels(samples: &[f64]) -> usize {
  samples.iter().filter(|&&sample| sample == SKIP_VALUE).count()
}


#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;


  #[test]
  fn skip_test() {
    let n_addresses = 3;
    let mut samples = vec![0.5; n_addresses * 10];
    for &slot in &[0, 1, 2, 7, 13, 29] {
      samples[slot] = SKIP_VALUE;
    }

    let report = inspect(&StreamBlock::new(samples, 12, 345), n_addresses);
    assert_eq!(6, report.sentinels());
    assert_eq!(2, report.skipped_scans());
    assert!(report.is_consistent());
    assert_eq!(12, report.device_backlog());
    assert_eq!(345, report.driver_backlog());
  }

  #[test]
  fn skip_inconsistent_test() {
    let mut samples = vec![1.0; 12];
    samples[3] = SKIP_VALUE;
    samples[4] = SKIP_VALUE;
    samples[11] = SKIP_VALUE;
    samples[5] = SKIP_VALUE;

    let report = inspect(&StreamBlock::new(samples, 0, 0), 3);
    assert_eq!(4, report.sentinels());
    assert_eq!(1, report.skipped_scans());
    assert_eq!(1, report.remainder());
    assert!(!report.is_consistent());
  }

  #[test]
  fn skip_clean_test() {
    let report = inspect(&StreamBlock::new(vec![-9998.9, 0.0, 9999.0], 1, 2), 3);
    assert_eq!(0, report.sentinels());
    assert_eq!(0, report.skipped_scans());
    assert!(report.is_consistent());
  }
}
