// Copyright 2022 bmc::labs Gmbh. All rights reserved.

use crate::{config_err, error::{DaqError, Result}};
use getset::{CopyGetters, Getters};
use lazy_static::lazy_static;
use std::{collections::{HashMap, HashSet},
          fmt,
          str::FromStr};
use thiserror::Error;


/// Highest channel group wired on the MUX80.
pub const MAX_GROUP: u8 = 9;

// differential AIN pairs per channel group, in x, y, z order. the negative
// line of each pair is implied by the MUX80 layout and never addressed.
const CHANNEL_TABLE: [[&str; 3]; MAX_GROUP as usize] =
  [["AIN72", "AIN74", "AIN76"],
   ["AIN73", "AIN75", "AIN77"],
   ["AIN78", "AIN80", "AIN82"],
   ["AIN79", "AIN81", "AIN83"],
   ["AIN96", "AIN98", "AIN100"],
   ["AIN99", "AIN101", "AIN103"],
   ["AIN102", "AIN104", "AIN106"],
   ["AIN107", "AIN109", "AIN110"],
   ["AIN108", "AIN111", "AIN113"]];

lazy_static! {
  static ref ADDRESS_IDS: HashMap<&'static str, ChannelId> =
    CHANNEL_TABLE.iter()
                 .zip(1..=MAX_GROUP)
                 .flat_map(|(row, group)| {
                   row.iter()
                      .zip(Axis::ALL.iter())
                      .map(move |(&address, &axis)| {
                        (address, ChannelId::new(group, axis))
                      })
                 })
                 .collect();
}


/// Sensor orientation measured by one channel of a group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
  X,
  Y,
  Z,
}

impl Axis {
  pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

  pub fn index(self) -> usize {
    match self {
      Axis::X => 0,
      Axis::Y => 1,
      Axis::Z => 2,
    }
  }

  pub fn from_char(c: char) -> Option<Self> {
    match c {
      'x' => Some(Axis::X),
      'y' => Some(Axis::Y),
      'z' => Some(Axis::Z),
      _ => None,
    }
  }
}

impl fmt::Display for Axis {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let c = match self {
      Axis::X => 'x',
      Axis::Y => 'y',
      Axis::Z => 'z',
    };
    write!(f, "{}", c)
  }
}


#[derive(Clone, Debug, PartialEq, Error)]
#[error("invalid channel id '{0}', expected CH<1-9><x|y|z>")]
pub struct ParseChannelIdError(String);


/// Human-readable channel identifier, displayed as `CH<group><axis>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct ChannelId {
  group: u8,
  axis:  Axis,
}

impl ChannelId {
  pub fn new(group: u8, axis: Axis) -> Self {
    Self { group, axis }
  }

  /// Physical address this id is wired to, `None` for groups outside the
  /// channel table.
  pub fn address(&self) -> Option<&'static str> {
    if self.group == 0 || self.group > MAX_GROUP {
      return None;
    }
    Some(CHANNEL_TABLE[self.group as usize - 1][self.axis.index()])
  }
}

impl fmt::Display for ChannelId {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "CH{}{}", self.group, self.axis)
  }
}

impl FromStr for ChannelId {
  type Err = ParseChannelIdError;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    let invalid = || ParseChannelIdError(s.to_string());

    let rest = s.strip_prefix("CH").ok_or_else(invalid)?;
    let axis = rest.chars()
                   .last()
                   .and_then(Axis::from_char)
                   .ok_or_else(invalid)?;
    let digits = &rest[..rest.len() - 1];
    if digits.is_empty()
       || digits.starts_with('0')
       || !digits.bytes().all(|b| b.is_ascii_digit())
    {
      return Err(invalid());
    }
    let group = digits.parse::<u8>().map_err(|_| invalid())?;

    if group == 0 || group > MAX_GROUP {
      return Err(invalid());
    }
    Ok(Self::new(group, axis))
  }
}


/// Maps requested channel groups onto the physical scan list and the ids
/// used to label the data.
///
/// Each group contributes three channels in x, y, z order. Groups are neither
/// sorted nor deduplicated, so the scan list follows the caller's order.
#[derive(Clone, Debug, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct ChannelMap {
  groups:    Vec<u8>,
  addresses: Vec<&'static str>,
  ids:       Vec<ChannelId>,
}

impl ChannelMap {
  pub fn new(groups: &[u8]) -> Result<Self> {
    let mut addresses = Vec::with_capacity(3 * groups.len());
    for &group in groups {
      if group == 0 || group > MAX_GROUP {
        return Err(DaqError::Range { group,
                                     max: MAX_GROUP });
      }
      addresses.extend_from_slice(&CHANNEL_TABLE[group as usize - 1]);
    }

    let ids = addresses.iter()
                       .filter_map(|address| Self::id_of(address))
                       .collect::<Vec<_>>();
    debug_assert_eq!(addresses.len(), ids.len(), "channel table inconsistent");

    Ok(Self { groups: groups.to_vec(),
              addresses,
              ids })
  }

  /// Rebuilds the map from a list of ids, e.g. the column headers of a
  /// capture file. The ids must come in complete x, y, z triples.
  pub fn from_ids(ids: &[ChannelId]) -> Result<Self> {
    if ids.len() % 3 != 0 {
      return config_err!("{} channel ids do not form complete x, y, z groups",
                         ids.len());
    }

    let groups = ids.chunks(3)
                    .map(|triple| triple[0].group())
                    .collect::<Vec<_>>();
    let map = Self::new(&groups)?;
    if map.ids != ids {
      return config_err!("channel ids {} do not match groups {:?}",
                         display_ids(ids),
                         groups);
    }
    Ok(map)
  }

  /// Reverse table lookup from a physical address to its id.
  pub fn id_of(address: &str) -> Option<ChannelId> {
    ADDRESS_IDS.get(address).copied()
  }

  pub fn len(&self) -> usize {
    self.ids.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ids.is_empty()
  }

  pub fn has_duplicate_addresses(&self) -> bool {
    let mut seen = HashSet::with_capacity(self.addresses.len());
    !self.addresses.iter().all(|address| seen.insert(address))
  }
}


pub(crate) fn display_ids(ids: &[ChannelId]) -> String {
  ids.iter()
     .map(ChannelId::to_string)
     .collect::<Vec<_>>()
     .join(",")
}
