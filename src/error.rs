// Copyright 2022 bmc::labs Gmbh. All rights reserved.

use crate::binding::{BindingError, LJME_DEVICE_NOT_OPEN};
use std::{io, result};
use thiserror::Error;


/// muxstream's result type; every fallible operation of the crate returns
/// this with a `DaqError`.
pub type Result<T> = result::Result<T, DaqError>;


/// Errors surfaced by the acquisition, the session store and the capture file
/// reader and writer.
///
/// Construct configuration and file format errors through the `config_err!`
/// and `format_err!` macros, which accept the same parameters as `format!`
/// and return an `Err(DaqError)`.
#[derive(Debug, Error)]
pub enum DaqError {
  #[error("channel group {group} outside supported range 1..={max}")]
  Range { group: u8, max: u8 },

  #[error("configuration error: {0}")]
  Config(String),

  #[error("connection lost: {0}")]
  ConnectionLost(String),

  #[error("hardware error {code}: {message}")]
  Hardware { code: i32, message: String },

  #[error("expected block of {expected} samples, got {actual}")]
  BlockSize { expected: usize, actual: usize },

  #[error("file format error on line {line}: {message}")]
  FileFormat { line: usize, message: String },

  #[error("CSV error: {0}")]
  Csv(#[from] csv::Error),

  #[error("no data saved")]
  NoData,

  #[error("I/O error: {0}")]
  Io(#[from] io::Error),
}

impl DaqError {
  pub fn is_connection_lost(&self) -> bool {
    matches!(self, Self::ConnectionLost(_))
  }

  /// Turns a transient connection loss into a fatal hardware error. Used once
  /// the single reconnect attempt has been spent.
  pub(crate) fn into_fatal(self) -> Self {
    match self {
      Self::ConnectionLost(message) => {
        Self::Hardware { code:    LJME_DEVICE_NOT_OPEN,
                         message: format!("connection lost after reconnect: {}",
                                          message), }
      }
      other => other,
    }
  }
}

impl From<BindingError> for DaqError {
  fn from(error: BindingError) -> Self {
    if error.is_connection_lost() {
      Self::ConnectionLost(error.to_string())
    } else {
      Self::Hardware { code:    error.code(),
                       message: error.message().clone(), }
    }
  }
}


/// Returns `Err(DaqError::Config)` with a message formatted like `format!`.
///
/// ```ignore
/// if scan_rate > ceiling {
///   return config_err!("scan rate {} exceeds {}", scan_rate, ceiling);
/// }
/// ```
#[macro_export]
macro_rules! config_err {
  ($($arg:tt)*) => {
    Err($crate::error::DaqError::Config(format!($($arg)*)))
  }
}


/// Returns `Err(DaqError::FileFormat)` for the given 1-based line number and
/// a message formatted like `format!`.
#[macro_export]
macro_rules! format_err {
  ($line:expr, $($arg:tt)*) => {
    Err($crate::error::DaqError::FileFormat { line:    $line,
                                             message: format!($($arg)*), })
  }
}


/// Makes sure a condition is true and otherwise returns the given `Err`,
/// typically built with `config_err!` or `format_err!`:
///
/// ```ignore
/// ensure!(nreads > 0, config_err!("nreads must be at least 1"));
/// ```
#[macro_export]
macro_rules! ensure {
  ($cond:expr, $err:expr) => {
    if !($cond) { return $err }
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;


  #[test]
  fn macro_test() {
    fn wrapper(cond: bool) -> Result<()> {
      ensure!(cond, config_err!("scan rate {} too high", 1500));
      Ok(())
    }

    assert!(wrapper(true).is_ok());
    assert_eq!("configuration error: scan rate 1500 too high",
               wrapper(false).unwrap_err().to_string());

    let err: Result<()> = format_err!(7, "bad number '{}'", "x1");
    assert_eq!("file format error on line 7: bad number 'x1'",
               err.unwrap_err().to_string());
  }

  #[test]
  fn binding_error_test() {
    let lost = DaqError::from(BindingError::new(LJME_DEVICE_NOT_OPEN,
                                                "LJME_DEVICE_NOT_OPEN"));
    assert!(lost.is_connection_lost());

    match lost.into_fatal() {
      DaqError::Hardware { code, .. } => assert_eq!(LJME_DEVICE_NOT_OPEN, code),
      other => panic!("unexpected error {:?}", other),
    }

    let other = DaqError::from(BindingError::new(2620, "STREAM_NOT_RUNNING"));
    assert!(!other.is_connection_lost());
    assert_eq!("hardware error 2620: STREAM_NOT_RUNNING", other.to_string());
  }
}
