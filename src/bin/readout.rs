// Copyright 2022 bmc::labs Gmbh. All rights reserved.

//! Streams channel groups 1 to 3 for 50 blocks and writes the captures to the
//! path given as first argument, `readout.csv` by default.
//!
//! The stream configuration is read from `muxstream.toml` in the working
//! directory if present. Without the `ljm` feature the simulated device
//! stands in for the hardware.

use eyre::{Result, WrapErr};
use muxstream::{Acquisition, ChannelMap, StreamConfig};
use std::{env, path::Path};
use tracing_subscriber::EnvFilter;


const CONFIG_PATH: &str = "muxstream.toml";
const GROUPS: [u8; 3] = [1, 2, 3];
const SCAN_RATE: f64 = 1500.0;
const SCAN_LENGTH: usize = 750;
const NREADS: usize = 50;


#[cfg(feature = "ljm")]
fn binding() -> muxstream::Ljm {
  muxstream::Ljm::new()
}

#[cfg(not(feature = "ljm"))]
fn binding() -> muxstream::SimulatedDevice {
  muxstream::SimulatedDevice::new()
}


fn main() -> Result<()> {
  color_eyre::install()?;
  tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env()
                                              .unwrap_or_else(|_| EnvFilter::new("info")))
                           .init();

  let output = env::args().nth(1)
                          .unwrap_or_else(|| "readout.csv".to_string());

  let config_path = Path::new(CONFIG_PATH);
  let config = if config_path.exists() {
    StreamConfig::load(config_path).wrap_err_with(|| {
                                     format!("unable to load {}", CONFIG_PATH)
                                   })?
  } else {
    StreamConfig::default()
  };

  let channels = ChannelMap::new(&GROUPS)?;
  let mut acquisition = Acquisition::new(binding(), config, channels)?;
  let mut session = acquisition.new_session();

  acquisition.connect().wrap_err("unable to connect")?;
  let summary = acquisition.read(&mut session, SCAN_RATE, SCAN_LENGTH, NREADS)?;
  acquisition.disconnect()?;

  println!("Total scans: {}", summary.scans());
  println!("Time taken: {:.3} s", summary.elapsed().as_secs_f64());
  println!("Scan rate: {} Hz (timed {:.1} Hz)",
           summary.achieved_scan_rate(),
           summary.timed_scan_rate());
  println!("Sample rate: {:.1} samples/s", summary.timed_sample_rate());
  println!("Skipped scans: {}", summary.skipped_scans());

  session.save(Path::new(&output))
         .wrap_err_with(|| format!("unable to write {}", output))?;
  println!("Captures written to {}", output);
  Ok(())
}
