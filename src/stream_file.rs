// Copyright 2022 bmc::labs Gmbh. All rights reserved.

//! Capture files: a commented header with the stream configuration followed by
//! one CSV table per capture.
//!
//! ```text
//! # multiple stream capture
//! # Settings:
//! #   DEVICE_TYPE:              T7
//! #   CONNECTION_TYPE:          ETHERNET
//! #   IP:                       142.90.151.7
//! #   STREAM_TRIGGER_INDEX:     0
//! #   ...
//! # Scan rate of last read:    1500 Hz
//! #
//! # File written at 2022-07-14 13:40:12.52
//! #
//! START stream 2022-07-14 13:37:00.000250
//! # Scan rate: 1500 Hz
//! dt (s),CH1x,CH1y,CH1z
//! 0,0.0123,-0.2,1.5
//! ...
//! ```
//!
//! A file holding a single capture comments out its `START stream` marker.

use crate::{channel::{display_ids, ChannelId, ChannelMap},
            ensure,
            config::{StreamConfig, StreamSettings},
            error::{DaqError, Result},
            format_err,
            session::{Capture, ChannelSeries, Session}};
use chrono::{Local, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Terminator, Trim, WriterBuilder};
use std::{collections::HashSet,
          io::{BufRead, Write},
          iter,
          slice};


const SINGLE: &str = "single stream capture";
const MULTIPLE: &str = "multiple stream capture";
// header phrases of files written before the format was versioned
const LEGACY_SINGLE: &str = "labjack output single read of stream";
const LEGACY_MULTIPLE: &str = "labjack output multiple reads of stream";

const MARKER: &str = "START stream";
const TIME_COLUMN: &str = "dt (s)";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const DEVICE_TYPE: &str = "DEVICE_TYPE";
const CONNECTION_TYPE: &str = "CONNECTION_TYPE";
const IP: &str = "IP";


/// Whether a file holds exactly one capture or any number of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
  Single,
  Multiple,
}


// WRITING ----------------------------------------------------------------- //
/// Writes every capture of `session`. A session with one capture produces a
/// single capture file, anything larger a multiple capture file.
pub fn write<W: Write>(session: &Session, out: W) -> Result<()> {
  let mode = match session.len() {
    0 => return Err(DaqError::NoData),
    1 => Mode::Single,
    _ => Mode::Multiple,
  };
  write_captures(session.config(), session.captures(), mode, out)
}

/// Writes the capture at `idx` as a single capture file.
pub fn write_capture<W: Write>(session: &Session,
                               idx: usize,
                               out: W)
                               -> Result<()> {
  let capture = session.capture(idx).ok_or(DaqError::NoData)?;
  write_captures(session.config(),
                 slice::from_ref(capture),
                 Mode::Single,
                 out)
}

fn write_captures<W: Write>(config: &StreamConfig,
                            captures: &[Capture],
                            mode: Mode,
                            mut out: W)
                            -> Result<()> {
  let last = captures.last().ok_or(DaqError::NoData)?;

  let phrase = match mode {
    Mode::Single => SINGLE,
    Mode::Multiple => MULTIPLE,
  };
  writeln!(out, "# {}", phrase)?;
  writeln!(out, "# Settings:")?;
  write_setting(&mut out, DEVICE_TYPE, config.device_type())?;
  write_setting(&mut out, CONNECTION_TYPE, config.connection_type())?;
  write_setting(&mut out, IP, config.address())?;
  for (key, value) in config.settings().iter() {
    write_setting(&mut out, key, value)?;
  }
  writeln!(out, "# {:<27}{} Hz", "Scan rate of last read:", last.scan_rate())?;
  writeln!(out, "#")?;
  writeln!(out,
           "# File written at {}",
           Local::now().naive_local().format(TIMESTAMP_FORMAT))?;
  writeln!(out, "#")?;

  for capture in captures {
    let started = capture.started().format(TIMESTAMP_FORMAT);
    match mode {
      Mode::Single => writeln!(out, "# {} {}", MARKER, started)?,
      Mode::Multiple => writeln!(out, "{} {}", MARKER, started)?,
    }
    writeln!(out, "# Scan rate: {} Hz", capture.scan_rate())?;
    write_table(&mut out, capture)?;
  }
  Ok(())
}

fn write_setting<W: Write, V: std::fmt::Display>(out: &mut W,
                                                 key: &str,
                                                 value: V)
                                                 -> Result<()> {
  writeln!(out, "#   {:<26}{}", format!("{}:", key), value)?;
  Ok(())
}

fn write_table<W: Write>(out: &mut W, capture: &Capture) -> Result<()> {
  let mut table = WriterBuilder::new().has_headers(false)
                                      .terminator(Terminator::Any(b'\n'))
                                      .from_writer(out);

  let ids = capture.ids();
  table.write_record(iter::once(TIME_COLUMN.to_string())
                       .chain(ids.iter().map(ChannelId::to_string)))?;
  for i in 0..capture.scan_length() {
    let time = capture.time()[i];
    table.write_record(iter::once(time).chain(capture.channels()
                                                     .iter()
                                                     .map(|series| series.samples()[i]))
                                       .map(|value| value.to_string()))?;
  }
  table.flush()?;
  Ok(())
}


// LINE GRAMMAR ------------------------------------------------------------ //
#[derive(Debug, PartialEq)]
enum Line<'a> {
  Blank,
  Mode(Mode),
  SettingsBanner,
  Setting { key: &'a str, value: &'a str },
  LastScanRate(f64),
  WrittenAt,
  Marker(NaiveDateTime),
  CaptureRate(f64),
  /// Column header or data row of a capture table.
  Table(&'a str),
}

fn classify(line: &str, line_no: usize) -> Result<Line> {
  let line = line.trim_end();
  if line.is_empty() {
    return Ok(Line::Blank);
  }

  let comment = match line.strip_prefix('#') {
    Some(comment) => comment,
    None => {
      if let Some(rest) = line.strip_prefix(MARKER) {
        return Ok(Line::Marker(parse_timestamp(rest, line_no)?));
      }
      return Ok(Line::Table(line));
    }
  };

  let body = comment.trim();
  let parsed = match body {
    "" => Line::Blank,
    SINGLE | LEGACY_SINGLE => Line::Mode(Mode::Single),
    MULTIPLE | LEGACY_MULTIPLE => Line::Mode(Mode::Multiple),
    "Settings:" => Line::SettingsBanner,
    _ => {
      if let Some(rest) = body.strip_prefix("Scan rate of last read:") {
        Line::LastScanRate(parse_rate(rest, line_no)?)
      } else if let Some(rest) = body.strip_prefix("Scan rate:") {
        Line::CaptureRate(parse_rate(rest, line_no)?)
      } else if body.starts_with("File written at") {
        Line::WrittenAt
      } else if let Some(rest) = body.strip_prefix(MARKER) {
        Line::Marker(parse_timestamp(rest, line_no)?)
      } else if let (true, Some((key, value))) =
        (comment.starts_with(char::is_whitespace), body.split_once(':'))
      {
        Line::Setting { key:   key.trim(),
                        value: value.trim(), }
      } else {
        return format_err!(line_no, "unrecognized header line '{}'", line);
      }
    }
  };
  Ok(parsed)
}

fn parse_rate(text: &str, line_no: usize) -> Result<f64> {
  let text = text.trim();
  match text.strip_suffix("Hz").map(str::trim).map(str::parse::<f64>) {
    Some(Ok(rate)) => Ok(rate),
    _ => format_err!(line_no, "invalid scan rate '{}'", text),
  }
}

fn parse_timestamp(text: &str, line_no: usize) -> Result<NaiveDateTime> {
  let text = text.trim();
  match NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT) {
    Ok(timestamp) => Ok(timestamp),
    Err(err) => format_err!(line_no, "invalid timestamp '{}': {}", text, err),
  }
}

fn parse_number(text: &str, line_no: usize) -> Result<f64> {
  match text.trim().parse::<f64>() {
    Ok(number) => Ok(number),
    Err(_) => format_err!(line_no, "invalid number '{}'", text),
  }
}

/// Rewraps any error as a file format error at `line_no`.
fn at(line_no: usize) -> impl Fn(DaqError) -> DaqError {
  move |err| DaqError::FileFormat { line:    line_no,
                                    message: err.to_string(), }
}


// READING ----------------------------------------------------------------- //
/// Reads a capture file of either mode back into a `Session`.
///
/// Fails on the first malformed line; no partial session is ever returned.
pub fn read<R: BufRead>(input: R) -> Result<Session> {
  let mut parser = Parser::default();
  for (idx, line) in input.lines().enumerate() {
    parser.feed(idx + 1, &line?)?;
  }
  parser.finish()
}

/// Wraps a CSV error as a file format error at `line_no`.
fn csv_at(line_no: usize) -> impl Fn(csv::Error) -> DaqError {
  move |err| DaqError::FileFormat { line:    line_no,
                                    message: err.to_string(), }
}

fn table_header(record: &StringRecord, line_no: usize) -> Result<Vec<ChannelId>> {
  let mut cells = record.iter();
  ensure!(cells.next() == Some(TIME_COLUMN),
          format_err!(line_no, "expected table header starting with '{}'", TIME_COLUMN));

  let ids = cells.map(|cell| cell.parse::<ChannelId>())
                 .collect::<std::result::Result<Vec<_>, _>>()
                 .map_err(|err| DaqError::FileFormat { line:    line_no,
                                                        message: err.to_string(), })?;
  ensure!(!ids.is_empty(), format_err!(line_no, "table has no channel columns"));
  Ok(ids)
}

/// One capture being read: its marker, scan rate and the raw lines of its
/// table, which are parsed as CSV once the capture is complete.
#[derive(Debug)]
struct PendingCapture {
  line_no:     usize,
  started:     NaiveDateTime,
  scan_rate:   Option<f64>,
  table:       String,
  table_lines: Vec<usize>,
}

impl PendingCapture {
  fn new(line_no: usize, started: NaiveDateTime) -> Self {
    Self { line_no,
           started,
           scan_rate: None,
           table: String::new(),
           table_lines: Vec::new() }
  }

  fn push_line(&mut self, line_no: usize, text: &str) {
    self.table.push_str(text);
    self.table.push('\n');
    self.table_lines.push(line_no);
  }

  fn finish(self, fallback_rate: Option<f64>) -> Result<Capture> {
    let line_no = self.line_no;
    let scan_rate = match self.scan_rate.or(fallback_rate) {
      Some(scan_rate) => scan_rate,
      None => return format_err!(line_no, "no scan rate for capture"),
    };

    let mut reader = ReaderBuilder::new().has_headers(false)
                                         .flexible(true)
                                         .trim(Trim::All)
                                         .from_reader(self.table.as_bytes());
    let mut records = reader.records().zip(&self.table_lines);

    let ids = match records.next() {
      Some((record, &row_line)) => table_header(&record.map_err(csv_at(row_line))?, row_line)?,
      None => return format_err!(line_no, "capture has no table"),
    };

    let mut time = Vec::new();
    let mut columns = vec![Vec::new(); ids.len()];
    for (record, &row_line) in records {
      let record = record.map_err(csv_at(row_line))?;
      if record.len() != ids.len() + 1 {
        return format_err!(row_line,
                           "expected {} columns, found {}",
                           ids.len() + 1,
                           record.len());
      }
      time.push(parse_number(&record[0], row_line)?);
      for (column, cell) in columns.iter_mut().zip(record.iter().skip(1)) {
        column.push(parse_number(cell, row_line)?);
      }
    }
    ensure!(!time.is_empty(), format_err!(line_no, "capture has no samples"));

    let channels = ids.into_iter()
                      .zip(columns)
                      .map(|(id, samples)| ChannelSeries::new(id, samples))
                      .collect();
    Capture::from_columns(self.started, scan_rate, time, channels)
      .map_err(at(line_no))
  }
}

#[derive(Debug, Default)]
struct Parser {
  mode:            Option<Mode>,
  device_type:     Option<String>,
  connection_type: Option<String>,
  address:         Option<String>,
  settings:        StreamSettings,
  seen_settings:   HashSet<String>,
  last_scan_rate:  Option<f64>,
  captures:        Vec<PendingCapture>,
}

impl Parser {
  fn feed(&mut self, line_no: usize, text: &str) -> Result<()> {
    let line = classify(text, line_no)?;

    if line_no == 1 {
      return match line {
        Line::Mode(mode) => {
          self.mode = Some(mode);
          Ok(())
        }
        _ => format_err!(line_no, "expected '# {}' or '# {}'", SINGLE, MULTIPLE),
      };
    }

    match line {
      Line::Blank | Line::SettingsBanner | Line::WrittenAt => Ok(()),
      Line::Mode(_) => format_err!(line_no, "repeated capture mode line"),
      Line::Setting { key, value } => {
        self.header_only(line_no)?;
        self.setting(line_no, key, value)
      }
      Line::LastScanRate(rate) => {
        self.header_only(line_no)?;
        self.last_scan_rate = Some(rate);
        Ok(())
      }
      Line::Marker(started) => {
        self.captures.push(PendingCapture::new(line_no, started));
        Ok(())
      }
      Line::CaptureRate(rate) => {
        let capture = self.current(line_no)?;
        if !capture.table_lines.is_empty() {
          return format_err!(line_no, "scan rate must precede the table");
        }
        capture.scan_rate = Some(rate);
        Ok(())
      }
      Line::Table(text) => {
        self.current(line_no)?.push_line(line_no, text);
        Ok(())
      }
    }
  }

  fn header_only(&self, line_no: usize) -> Result<()> {
    if !self.captures.is_empty() {
      return format_err!(line_no, "header line after first capture");
    }
    Ok(())
  }

  fn current(&mut self, line_no: usize) -> Result<&mut PendingCapture> {
    match self.captures.last_mut() {
      Some(capture) => Ok(capture),
      None => format_err!(line_no, "table before '{}' marker", MARKER),
    }
  }

  fn setting(&mut self, line_no: usize, key: &str, value: &str) -> Result<()> {
    if !self.seen_settings.insert(key.to_string()) {
      return format_err!(line_no, "setting {} given twice", key);
    }

    match key {
      DEVICE_TYPE => self.device_type = Some(value.to_string()),
      CONNECTION_TYPE => self.connection_type = Some(value.to_string()),
      IP => self.address = Some(value.to_string()),
      _ => {
        let value = match value.parse::<i32>() {
          Ok(value) => value,
          Err(_) => {
            return format_err!(line_no,
                               "setting {} is not an integer: '{}'",
                               key,
                               value)
          }
        };
        self.settings.set(key, value).map_err(at(line_no))?;
      }
    }
    Ok(())
  }

  fn finish(self) -> Result<Session> {
    let mode = match self.mode {
      Some(mode) => mode,
      None => return format_err!(1, "empty capture file"),
    };

    let (device_type, connection_type, address) =
      match (self.device_type, self.connection_type, self.address) {
        (Some(device_type), Some(connection_type), Some(address)) => {
          (device_type, connection_type, address)
        }
        _ => return format_err!(1, "header lacks device settings"),
      };
    for key in StreamSettings::KEYS.iter() {
      if !self.seen_settings.contains(*key) {
        return format_err!(1, "header lacks setting {}", key);
      }
    }
    let config =
      StreamConfig::new(&device_type, &connection_type, &address, self.settings);

    if self.captures.is_empty() {
      return format_err!(1, "no '{}' marker found", MARKER);
    }
    if mode == Mode::Single && self.captures.len() != 1 {
      return format_err!(self.captures[1].line_no,
                         "single capture file holds {} captures",
                         self.captures.len());
    }

    // the first table fixes the channel map, every other table must match it
    let mut channels: Option<ChannelMap> = None;
    let mut captures = Vec::with_capacity(self.captures.len());
    for pending in self.captures {
      let line_no = pending.line_no;
      let capture = pending.finish(self.last_scan_rate)?;
      let ids = capture.ids();
      let map = match channels.take() {
        Some(map) => map,
        None => ChannelMap::from_ids(&ids).map_err(at(line_no))?,
      };
      if map.ids() != &ids {
        return format_err!(line_no,
                           "capture channels {} differ from {}",
                           display_ids(&ids),
                           display_ids(map.ids()));
      }
      channels = Some(map);
      captures.push(capture);
    }

    match channels {
      Some(channels) => Ok(Session::with_captures(config, channels, captures)),
      None => format_err!(1, "no '{}' marker found", MARKER),
    }
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use chrono::NaiveDate;
  use pretty_assertions::assert_eq;
  use std::io::Cursor;


  fn timestamp(second: u32, micro: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2022, 7, 14).unwrap()
                                        .and_hms_micro_opt(13, 37, second, micro)
                                        .unwrap()
  }

  fn capture(groups: &[u8],
             started: NaiveDateTime,
             scan_rate: f64,
             scan_length: usize)
             -> Capture {
    let ids = ChannelMap::new(groups).unwrap().ids().clone();
    let raw = (0..ids.len() * scan_length).map(|k| {
                                            (k as f64 * 0.37).sin() * 10.0 / 3.0
                                          })
                                          .collect::<Vec<_>>();
    Capture::from_interleaved(started, scan_rate, &ids, &raw, scan_length)
      .unwrap()
  }

  fn session(groups: &[u8], captures: Vec<Capture>) -> Session {
    let mut settings = StreamSettings::default();
    settings.set("STREAM_SETTLING_US", 12).unwrap();
    settings.set("AIN_ALL_RANGE", 10).unwrap();
    let config = StreamConfig::new("T7", "USB", "470012345", settings);

    let mut session = Session::new(config, ChannelMap::new(groups).unwrap());
    session.append(captures).unwrap();
    session
  }

  fn to_text(session: &Session) -> String {
    let mut out = Vec::new();
    write(session, &mut out).unwrap();
    String::from_utf8(out).unwrap()
  }

  fn from_text(text: &str) -> Result<Session> {
    read(Cursor::new(text))
  }


  #[test]
  fn round_trip_test() {
    for groups in &[vec![1u8, 2], vec![3, 9, 5]] {
      let original =
        session(groups,
                vec![capture(groups, timestamp(0, 250), 1500.0, 20),
                     capture(groups, timestamp(7, 0), 1333.3333333333333, 20)]);

      let text = to_text(&original);
      assert!(text.starts_with("# multiple stream capture\n"));
      assert_eq!(2, text.lines().filter(|l| l.starts_with(MARKER)).count());

      let restored = from_text(&text).unwrap();
      assert_eq!(original, restored);
      assert_eq!(original.stream_times(), restored.stream_times());
      assert_eq!(Some(1333.3333333333333), restored.last_scan_rate());
    }
  }

  #[test]
  fn mixed_channels_test() {
    let text = to_text(&session(&[1],
                                vec![capture(&[1], timestamp(1, 1), 800.0, 4),
                                     capture(&[1], timestamp(2, 2), 400.0, 6)]));

    // relabel the second table only
    let second = text.rfind("dt (s),CH1x,CH1y,CH1z").unwrap();
    let mixed = format!("{}dt (s),CH2x,CH2y,CH2z{}",
                        &text[..second],
                        &text[second + "dt (s),CH1x,CH1y,CH1z".len()..]);
    // the error points at the marker two lines above the header
    let marker_line = mixed[..second].lines().count() - 1;

    match from_text(&mixed) {
      Err(DaqError::FileFormat { line, message }) => {
        assert_eq!(marker_line, line, "{}", message);
        assert!(message.contains("CH2x"), "{}", message);
      }
      other => panic!("expected format error, got {:?}", other),
    }
  }

  #[test]
  fn csv_table_test() {
    let text = to_text(&session(&[1], vec![capture(&[1], timestamp(0, 0), 10.0, 2)]));
    let quoted = text.replace("dt (s),CH1x,CH1y,CH1z", "\"dt (s)\",\"CH1x\",CH1y , CH1z")
                     .replace('\n', "\r\n");

    let restored = from_text(&quoted).unwrap();
    let ids = restored.captures()[0].ids();
    assert_eq!("CH1x,CH1y,CH1z", display_ids(&ids));
    assert_eq!(to_text(&restored).lines().skip(14).collect::<Vec<_>>(),
               text.lines().skip(14).collect::<Vec<_>>());
  }

  #[test]
  fn single_capture_test() {
    let original = session(&[2], vec![capture(&[2], timestamp(3, 0), 250.0, 5)]);
    let text = to_text(&original);

    assert!(text.starts_with("# single stream capture\n"));
    assert!(text.contains("\n# START stream 2022-07-14 13:37:03\n"));
    assert!(!text.lines().any(|l| l.starts_with(MARKER)));
    assert_eq!(original, from_text(&text).unwrap());

    // one capture out of many
    let many = session(&[2],
                       vec![capture(&[2], timestamp(3, 0), 250.0, 5),
                            capture(&[2], timestamp(4, 0), 500.0, 5)]);
    let mut out = Vec::new();
    write_capture(&many, 1, &mut out).unwrap();
    let restored = from_text(&String::from_utf8(out).unwrap()).unwrap();
    assert_eq!(1, restored.len());
    assert_eq!(many.captures()[1], restored.captures()[0]);
  }

  #[test]
  fn header_layout_test() {
    let original = session(&[1], vec![capture(&[1], timestamp(0, 0), 1500.0, 2)]);
    let text = to_text(&original);
    let lines = text.lines().collect::<Vec<_>>();

    assert_eq!(vec!["# single stream capture",
                    "# Settings:",
                    "#   DEVICE_TYPE:              T7",
                    "#   CONNECTION_TYPE:          USB",
                    "#   IP:                       470012345",
                    "#   STREAM_TRIGGER_INDEX:     0",
                    "#   STREAM_CLOCK_SOURCE:      0",
                    "#   STREAM_RESOLUTION_INDEX:  0",
                    "#   STREAM_SETTLING_US:       12",
                    "#   AIN_ALL_RANGE:            10",
                    "#   AIN_ALL_NEGATIVE_CH:      1",
                    "# Scan rate of last read:    1500 Hz",
                    "#"],
               lines[..13].to_vec());
    assert!(lines[13].starts_with("# File written at "));
    assert_eq!(vec!["#",
                    "# START stream 2022-07-14 13:37:00",
                    "# Scan rate: 1500 Hz",
                    "dt (s),CH1x,CH1y,CH1z"],
               lines[14..18].to_vec());
    assert_eq!(20, lines.len());
  }

  #[test]
  fn no_data_test() {
    let empty = session(&[1], Vec::new());
    assert!(matches!(write(&empty, Vec::new()), Err(DaqError::NoData)));
    assert!(matches!(write_capture(&empty, 0, Vec::new()),
                     Err(DaqError::NoData)));
  }

  const LEGACY: &str = "# labjack output multiple reads of stream
# Settings:
#   DEVICE_TYPE:              T7
#   CONNECTION_TYPE:          ETHERNET
#   IP:                       142.90.151.7
#   STREAM_TRIGGER_INDEX:     0
#   STREAM_CLOCK_SOURCE:      0
#   STREAM_RESOLUTION_INDEX:  0
#   STREAM_SETTLING_US:       0
#   AIN_ALL_RANGE:            0
#   AIN_ALL_NEGATIVE_CH:      199
# Scan rate of last read:    1000.0 Hz
#
# File written at 2022-07-14 14:00:00.123456
#
START stream 2022-07-14 13:59:58.000001
dt (s),CH1x,CH1y,CH1z
0.0,0.1,0.2,0.3
0.001,0.4,0.5,0.6
START stream 2022-07-14 13:59:59.5
dt (s),CH1x,CH1y,CH1z
0.0,1.1,1.2,1.3
0.001,1.4,1.5,1.6
";

  #[test]
  fn legacy_file_test() {
    let session = from_text(LEGACY).unwrap();

    assert_eq!(199, session.config().settings().ain_all_negative_ch());
    assert_eq!("142.90.151.7", session.config().address());
    assert_eq!(2, session.len());
    let date = NaiveDate::from_ymd_opt(2022, 7, 14).unwrap();
    assert_eq!(vec![date.and_hms_micro_opt(13, 59, 58, 1).unwrap(),
                    date.and_hms_micro_opt(13, 59, 59, 500_000).unwrap()],
               session.stream_times());

    let second = &session.captures()[1];
    assert_eq!(1000.0, second.scan_rate());
    assert_eq!(&vec![0.0, 0.001], second.time());
    let ch1z = second.channel("CH1z".parse().unwrap()).unwrap();
    assert_eq!(&vec![1.3, 1.6], ch1z.samples());
  }

  #[test]
  fn format_error_test() {
    let good = to_text(&session(&[1],
                                vec![capture(&[1], timestamp(0, 0), 10.0, 3),
                                     capture(&[1], timestamp(1, 0), 10.0, 3)]));

    let broken = vec![
      // (description, text)
      ("empty", String::new()),
      ("no mode", good.replacen("# multiple stream capture", "# capture", 1)),
      ("unknown setting",
       good.replacen("STREAM_CLOCK_SOURCE", "STREAM_CLOCK_SAUCE", 1)),
      ("missing setting",
       good.lines()
           .filter(|line| !line.contains("AIN_ALL_RANGE"))
           .collect::<Vec<_>>()
           .join("\n")),
      ("bad setting",
       good.replacen("STREAM_SETTLING_US:", "STREAM_SETTLING_US: a", 1)),
      ("bad number", good.replacen("\n0.1,", "\n0.1x,", 1)),
      ("short row", good.replacen("\n0.1,", "\n", 1)),
      ("bad id", good.replacen("CH1y", "CH1q", 1)),
      ("incomplete group", good.replacen(",CH1z", "", 2)),
      ("no marker", good.replace("START stream", "RESTART stream")),
      ("bad timestamp", good.replacen("START stream 2022", "START stream 20x2", 1)),
      ("single with two", good.replacen("# multiple", "# single", 1)),
      ("junk comment", good.replacen("# Settings:", "# whatever", 1)),
    ];

    for (description, text) in broken {
      match from_text(&text) {
        Err(DaqError::FileFormat { line, message }) => {
          assert!(line >= 1, "{}: line {}", description, line);
          assert!(!message.is_empty(), "{}", description);
        }
        other => panic!("{}: expected format error, got {:?}", description, other),
      }
    }
  }

  #[test]
  fn save_load_test() {
    let original = session(&[7, 8],
                           vec![capture(&[7, 8], timestamp(9, 99), 100.0, 10)]);
    let path = std::env::temp_dir().join(format!("muxstream-{}.csv",
                                                 std::process::id()));

    original.save(&path).unwrap();
    let restored = Session::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(original, restored);
  }
}
