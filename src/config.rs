// Copyright 2022 bmc::labs Gmbh. All rights reserved.

use crate::{config_err, ensure, error::Result};
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};


/// `AIN_ALL_NEGATIVE_CH` value switching every AIN to differential mode.
pub const NEGATIVE_CH_DIFFERENTIAL: i32 = 1;
/// `AIN_ALL_NEGATIVE_CH` value switching every AIN to single-ended mode
/// (negative line tied to GND).
pub const NEGATIVE_CH_SINGLE_ENDED: i32 = 199;


/// Stream-level registers written to the device on connect.
///
/// The key set is fixed; `KEYS` lists the register names in the order they
/// are written to the device and to capture files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, CopyGetters)]
#[serde(default, deny_unknown_fields, rename_all = "SCREAMING_SNAKE_CASE")]
#[getset(get_copy = "pub")]
pub struct StreamSettings {
  /// 0 starts scanning as soon as the stream is enabled.
  stream_trigger_index:    i32,
  /// 0 is the internal crystal, 2 an external clock on CIO3.
  stream_clock_source:     i32,
  stream_resolution_index: i32,
  /// Mux settling time in microseconds, values below 1 select automatic
  /// settling.
  stream_settling_us:      i32,
  ain_all_range:           i32,
  ain_all_negative_ch:     i32,
}

impl Default for StreamSettings {
  fn default() -> Self {
    Self { stream_trigger_index:    0,
           stream_clock_source:     0,
           stream_resolution_index: 0,
           stream_settling_us:      0,
           ain_all_range:           0,
           ain_all_negative_ch:     NEGATIVE_CH_DIFFERENTIAL, }
  }
}

impl StreamSettings {
  pub const KEYS: [&'static str; 6] = ["STREAM_TRIGGER_INDEX",
                                       "STREAM_CLOCK_SOURCE",
                                       "STREAM_RESOLUTION_INDEX",
                                       "STREAM_SETTLING_US",
                                       "AIN_ALL_RANGE",
                                       "AIN_ALL_NEGATIVE_CH"];

  pub fn get(&self, key: &str) -> Option<i32> {
    match key {
      "STREAM_TRIGGER_INDEX" => Some(self.stream_trigger_index),
      "STREAM_CLOCK_SOURCE" => Some(self.stream_clock_source),
      "STREAM_RESOLUTION_INDEX" => Some(self.stream_resolution_index),
      "STREAM_SETTLING_US" => Some(self.stream_settling_us),
      "AIN_ALL_RANGE" => Some(self.ain_all_range),
      "AIN_ALL_NEGATIVE_CH" => Some(self.ain_all_negative_ch),
      _ => None,
    }
  }

  pub fn set(&mut self, key: &str, value: i32) -> Result<()> {
    let slot = match key {
      "STREAM_TRIGGER_INDEX" => &mut self.stream_trigger_index,
      "STREAM_CLOCK_SOURCE" => &mut self.stream_clock_source,
      "STREAM_RESOLUTION_INDEX" => &mut self.stream_resolution_index,
      "STREAM_SETTLING_US" => &mut self.stream_settling_us,
      "AIN_ALL_RANGE" => &mut self.ain_all_range,
      "AIN_ALL_NEGATIVE_CH" => &mut self.ain_all_negative_ch,
      _ => return config_err!("unknown stream setting '{}'", key),
    };
    *slot = value;
    Ok(())
  }

  /// All settings as `(register, value)` pairs in `KEYS` order.
  pub fn iter(&self) -> impl Iterator<Item = (&'static str, i32)> + '_ {
    Self::KEYS.iter().filter_map(move |&key| {
                       self.get(key).map(|value| (key, value))
                     })
  }

  pub fn is_differential(&self) -> bool {
    self.ain_all_negative_ch == NEGATIVE_CH_DIFFERENTIAL
  }
}


/// Which device to open and how to configure its stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Getters)]
#[serde(default, deny_unknown_fields)]
#[getset(get = "pub")]
pub struct StreamConfig {
  device_type:     String,
  connection_type: String,
  address:         String,
  settings:        StreamSettings,
}

impl Default for StreamConfig {
  fn default() -> Self {
    Self { device_type:     "T7".to_string(),
           connection_type: "ETHERNET".to_string(),
           address:         "142.90.151.7".to_string(),
           settings:        StreamSettings::default(), }
  }
}

impl StreamConfig {
  pub fn new(device_type: &str,
             connection_type: &str,
             address: &str,
             settings: StreamSettings)
             -> Self {
    Self { device_type: device_type.to_string(),
           connection_type: connection_type.to_string(),
           address: address.to_string(),
           settings }
  }

  /// Parses a TOML document; missing fields keep their defaults.
  ///
  /// ```text
  /// device_type = "T7"
  /// connection_type = "USB"
  /// address = "ANY"
  ///
  /// [settings]
  /// STREAM_SETTLING_US = 10
  /// ```
  pub fn from_toml_str(text: &str) -> Result<Self> {
    match toml::from_str(text) {
      Ok(config) => Ok(config),
      Err(err) => config_err!("invalid stream configuration: {}", err),
    }
  }

  pub fn load(path: &Path) -> Result<Self> {
    Self::from_toml_str(&fs::read_to_string(path)?)
  }

  /// Checks the configuration can drive the differential MUX80 front end.
  pub fn validate(&self) -> Result<()> {
    ensure!(self.settings.is_differential(),
            config_err!("AIN_ALL_NEGATIVE_CH is {}, differential mode ({}) \
                         is required",
                        self.settings.ain_all_negative_ch(),
                        NEGATIVE_CH_DIFFERENTIAL));
    Ok(())
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;


  #[test]
  fn settings_test() {
    let mut settings = StreamSettings::default();
    assert!(settings.is_differential());
    assert_eq!(StreamSettings::KEYS.to_vec(),
               settings.iter().map(|(key, _)| key).collect::<Vec<_>>());

    settings.set("STREAM_SETTLING_US", 10).unwrap();
    assert_eq!(10, settings.stream_settling_us());
    assert_eq!(Some(10), settings.get("STREAM_SETTLING_US"));
    assert_eq!(None, settings.get("AIN0_RANGE"));
    assert!(settings.set("AIN0_RANGE", 10).is_err());

    settings.set("AIN_ALL_NEGATIVE_CH", NEGATIVE_CH_SINGLE_ENDED).unwrap();
    assert!(!settings.is_differential());
  }

  #[test]
  fn toml_test() {
    let config = StreamConfig::from_toml_str(r#"
      connection_type = "USB"
      address = "ANY"

      [settings]
      STREAM_SETTLING_US = 10
      AIN_ALL_RANGE = 10
    "#).unwrap();

    assert_eq!("T7", config.device_type());
    assert_eq!("USB", config.connection_type());
    assert_eq!("ANY", config.address());
    assert_eq!(10, config.settings().stream_settling_us());
    assert_eq!(10, config.settings().ain_all_range());
    assert_eq!(0, config.settings().stream_clock_source());
    assert!(config.validate().is_ok());

    assert_eq!(StreamConfig::default(), StreamConfig::from_toml_str("").unwrap());
    assert!(StreamConfig::from_toml_str("ip = \"1.2.3.4\"").is_err());
    assert!(StreamConfig::from_toml_str("[settings]\nAIN0_RANGE = 1").is_err());
  }

  #[test]
  fn validate_test() {
    let mut settings = StreamSettings::default();
    settings.set("AIN_ALL_NEGATIVE_CH", NEGATIVE_CH_SINGLE_ENDED).unwrap();
    let config = StreamConfig::new("T7", "USB", "ANY", settings);

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("differential"), "{}", err);
  }
}
