// Copyright 2022 bmc::labs Gmbh. All rights reserved.

//! `Binding` on top of the vendor LJM C library (`libLabJackM`).

use crate::binding::{Binding, BindingError, Handle, StreamBlock,
                     LJME_INVALID_NAME, STREAM_NOT_RUNNING};
use std::{collections::HashMap,
          convert::TryFrom,
          ffi::{CStr, CString},
          os::raw::{c_char, c_double, c_int}};
use tracing::warn;


const LJME_NOERROR: c_int = 0;
// codes in this range report a warning, the call itself went through
const LJME_WARNINGS_BEGIN: c_int = 200;
const LJME_WARNINGS_END: c_int = 399;
/// Buffer size `LJM_ErrorToString` expects.
const LJM_MAX_NAME_SIZE: usize = 256;


#[allow(non_snake_case)]
#[doc(hidden)]
extern "C" {
  // DEVICE FUNCTIONS ------------------------------------------------------ //
  //
  /// Open a device by device type, connection type and identifier strings
  ///
  /// # Arguments
  /// - `device_type`: e.g. `"T7"` or `"ANY"`
  /// - `connection_type`: e.g. `"USB"`, `"ETHERNET"` or `"ANY"`
  /// - `identifier`: serial number, IP address, name or `"ANY"`
  /// - `handle`: output, the handle of the opened device
  ///
  /// # Returns
  /// - `LJME_NOERROR` on success, an error code otherwise
  fn LJM_OpenS(device_type: *const c_char,
               connection_type: *const c_char,
               identifier: *const c_char,
               handle: *mut c_int)
               -> c_int;

  /// Close the device behind `handle`
  fn LJM_Close(handle: c_int) -> c_int;

  /// Write a single register by name
  fn LJM_eWriteName(handle: c_int, name: *const c_char, value: c_double) -> c_int;

  /// Resolve a register name to its Modbus address and data type
  fn LJM_NameToAddress(name: *const c_char,
                       address: *mut c_int,
                       data_type: *mut c_int)
                       -> c_int;
  // ----------------------------------------------------------------------- //

  // STREAM FUNCTIONS ------------------------------------------------------ //
  //
  /// Start streaming
  ///
  /// # Arguments
  /// - `scans_per_read`: number of scans returned by each `LJM_eStreamRead`
  /// - `num_addresses`: length of `scan_list`
  /// - `scan_list`: Modbus addresses to sample in each scan
  /// - `scan_rate`: input, the requested scan rate in Hz; output, the scan
  ///   rate the device actually runs at
  fn LJM_eStreamStart(handle: c_int,
                      scans_per_read: c_int,
                      num_addresses: c_int,
                      scan_list: *const c_int,
                      scan_rate: *mut c_double)
                      -> c_int;

  /// Block until `scans_per_read` scans are available and copy them to
  /// `data`, which must hold `scans_per_read * num_addresses` values
  fn LJM_eStreamRead(handle: c_int,
                     data: *mut c_double,
                     device_scan_backlog: *mut c_int,
                     ljm_scan_backlog: *mut c_int)
                     -> c_int;

  /// Stop streaming
  fn LJM_eStreamStop(handle: c_int) -> c_int;
  // ----------------------------------------------------------------------- //

  /// Write the name of `error_code` to `error_string`, which must hold
  /// `LJM_MAX_NAME_SIZE` bytes
  fn LJM_ErrorToString(error_code: c_int, error_string: *mut c_char);
}


/// The LJM library. Keeps the block size of every running stream so reads
/// can hand LJM a buffer of the right length.
#[derive(Debug, Default)]
pub struct Ljm {
  block_len: HashMap<Handle, usize>,
}

impl Ljm {
  pub fn new() -> Self {
    Self::default()
  }
}

fn error_to_string(code: c_int) -> String {
  let mut buf = [0 as c_char; LJM_MAX_NAME_SIZE];
  unsafe {
    LJM_ErrorToString(code, buf.as_mut_ptr());
  }
  buf[LJM_MAX_NAME_SIZE - 1] = 0;
  unsafe { CStr::from_ptr(buf.as_ptr()) }.to_string_lossy()
                                         .into_owned()
}

fn check(code: c_int) -> Result<(), BindingError> {
  match code {
    LJME_NOERROR => Ok(()),
    LJME_WARNINGS_BEGIN..=LJME_WARNINGS_END => {
      warn!("LJM warning: {} ({})", error_to_string(code), code);
      Ok(())
    }
    _ => Err(BindingError::new(code, &error_to_string(code))),
  }
}

fn cstring(text: &str) -> Result<CString, BindingError> {
  CString::new(text).map_err(|_| {
                      BindingError::new(LJME_INVALID_NAME,
                                        &format!("'{}' contains a nul byte", text))
                    })
}

fn c_len(len: usize) -> Result<c_int, BindingError> {
  c_int::try_from(len).map_err(|_| {
                        BindingError::new(LJME_INVALID_NAME,
                                          &format!("length {} out of range", len))
                      })
}

impl Binding for Ljm {
  fn open(&mut self,
          device_type: &str,
          connection_type: &str,
          address: &str)
          -> Result<Handle, BindingError> {
    let device_type = cstring(device_type)?;
    let connection_type = cstring(connection_type)?;
    let address = cstring(address)?;

    let mut handle: c_int = 0;
    check(unsafe {
      LJM_OpenS(device_type.as_ptr(),
                connection_type.as_ptr(),
                address.as_ptr(),
                &mut handle)
    })?;
    Ok(handle)
  }

  fn close(&mut self, handle: Handle) -> Result<(), BindingError> {
    self.block_len.remove(&handle);
    check(unsafe { LJM_Close(handle) })
  }

  fn write_setting(&mut self,
                   handle: Handle,
                   name: &str,
                   value: f64)
                   -> Result<(), BindingError> {
    let name = cstring(name)?;
    check(unsafe { LJM_eWriteName(handle, name.as_ptr(), value) })
  }

  fn name_to_address(&self, name: &str) -> Result<i32, BindingError> {
    let name = cstring(name)?;
    let (mut address, mut data_type): (c_int, c_int) = (0, 0);
    check(unsafe { LJM_NameToAddress(name.as_ptr(), &mut address, &mut data_type) })?;
    Ok(address)
  }

  fn stream_start(&mut self,
                  handle: Handle,
                  scans_per_read: usize,
                  addresses: &[i32],
                  scan_rate: f64)
                  -> Result<f64, BindingError> {
    let mut achieved: c_double = scan_rate;
    check(unsafe {
      LJM_eStreamStart(handle,
                       c_len(scans_per_read)?,
                       c_len(addresses.len())?,
                       addresses.as_ptr(),
                       &mut achieved)
    })?;
    self.block_len.insert(handle, scans_per_read * addresses.len());
    Ok(achieved)
  }

  fn stream_read(&mut self, handle: Handle) -> Result<StreamBlock, BindingError> {
    let len = match self.block_len.get(&handle) {
      Some(&len) => len,
      None => return Err(BindingError::new(STREAM_NOT_RUNNING, "STREAM_NOT_RUNNING")),
    };

    let mut samples = vec![0.0; len];
    let (mut device_backlog, mut driver_backlog): (c_int, c_int) = (0, 0);
    check(unsafe {
      LJM_eStreamRead(handle,
                      samples.as_mut_ptr(),
                      &mut device_backlog,
                      &mut driver_backlog)
    })?;
    Ok(StreamBlock::new(samples, device_backlog, driver_backlog))
  }

  fn stream_stop(&mut self, handle: Handle) -> Result<(), BindingError> {
    self.block_len.remove(&handle);
    check(unsafe { LJM_eStreamStop(handle) })
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;


  #[test]
  fn cstring_test() {
    assert_eq!("AIN72", cstring("AIN72").unwrap().to_str().unwrap());
    assert_eq!(LJME_INVALID_NAME, cstring("AIN\072").unwrap_err().code());
  }

  #[test]
  fn stream_read_without_start_test() {
    let mut ljm = Ljm::new();
    assert_eq!(STREAM_NOT_RUNNING, ljm.stream_read(1).unwrap_err().code());
  }
}
