//! Built-in log parsers.

use serde::Deserialize;
use std::path::Path;

use crate::color::Color;
use crate::ingest::parser::{IngestError, LogParser, SignalSink};
use crate::types::EpochTime;

/// Category given to keys without an explicit `category/` prefix.
const FALLBACK_CATEGORY: &str = "log";

/// Noise-tolerant parser for whitespace-separated `timestamp key=value`
/// lines.
///
/// ```text
/// 1716823000.250 cpu/usage=42.5 sampled by collectd
/// 2024-05-27T14:36:40.500Z job/state=RUNNING
/// 1716823001.000 >job/build compile started
/// 1716823009.000 <job/build all targets built
/// 1716823002.000 #deploy v2 rollout begins
/// ```
///
/// The first token must be a timestamp, either raw epoch seconds or an
/// RFC 3339 datetime; lines that start with anything else are treated as
/// unrelated log output and skipped. `>`/`<` open and close a zone, `#`
/// places a tag, anything else is `key=value` where a numeric value
/// becomes a sample and everything after the pair its description. This
/// parser never fails a file.
pub struct KeyValueParser {
    lines_seen: usize,
}

impl KeyValueParser {
    pub fn new() -> Self {
        Self { lines_seen: 0 }
    }
}

impl Default for KeyValueParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LogParser for KeyValueParser {
    fn compile(&mut self, _path: &Path) -> bool {
        self.lines_seen = 0;
        true
    }

    fn on_start(&mut self, _sink: &mut dyn SignalSink) -> Result<(), IngestError> {
        Ok(())
    }

    fn on_row(&mut self, line: &str, sink: &mut dyn SignalSink) -> Result<(), IngestError> {
        self.lines_seen += 1;
        let line = line.trim();

        let (first, rest) = split_word(line);
        let Some(time) = parse_epoch(first) else {
            // Not one of ours; real logs interleave plenty of other output.
            return Ok(());
        };

        if let Some(spec) = rest.strip_prefix('#') {
            let (name, help) = split_word(spec);
            if !name.is_empty() {
                sink.add_signal_tag(time, Color::WHITE, name, help);
            }
        } else if let Some(spec) = rest.strip_prefix('>') {
            let (key, message) = split_word(spec);
            if let Some((category, name)) = split_key(key) {
                sink.add_signal_start_zone(category, name, time, message);
            }
        } else if let Some(spec) = rest.strip_prefix('<') {
            let (key, message) = split_word(spec);
            if let Some((category, name)) = split_key(key) {
                sink.add_signal_end_zone(category, name, time, message);
            }
        } else {
            let (token, desc) = split_word(rest);
            let Some((key, raw)) = token.split_once('=') else {
                return Ok(());
            };
            if raw.is_empty() {
                return Ok(());
            }
            let Some((category, name)) = split_key(key) else {
                return Ok(());
            };
            match raw.parse::<f64>() {
                Ok(value) => sink.add_signal_value(category, name, time, value, desc),
                Err(_) => sink.add_signal_status(category, name, time, raw),
            }
        }
        Ok(())
    }

    fn on_end(&mut self, _sink: &mut dyn SignalSink) -> Result<(), IngestError> {
        log::debug!("Key-value parser scanned {} lines", self.lines_seen);
        Ok(())
    }
}

/// Epoch seconds from a raw float or an RFC 3339 datetime.
fn parse_epoch(word: &str) -> Option<EpochTime> {
    if let Ok(epoch) = word.parse::<EpochTime>() {
        return Some(epoch);
    }
    chrono::DateTime::parse_from_rfc3339(word)
        .ok()
        .map(|dt| dt.timestamp_micros() as f64 / 1e6)
}

/// First whitespace-delimited word and the trimmed remainder.
fn split_word(s: &str) -> (&str, &str) {
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (s, ""),
    }
}

/// Split `category/name`; a bare key lands under the fallback category.
fn split_key(key: &str) -> Option<(&str, &str)> {
    if key.is_empty() {
        return None;
    }
    match key.split_once('/') {
        Some((category, name)) if !category.is_empty() && !name.is_empty() => {
            Some((category, name))
        }
        Some(_) => None,
        None => Some((FALLBACK_CATEGORY, key)),
    }
}

/// Strict parser for one-JSON-object-per-line files.
///
/// ```text
/// {"time":1000.5,"category":"cpu","name":"usage","value":42.5,"desc":"idle"}
/// {"time":1000.5,"category":"job","name":"state","status":"RUNNING"}
/// {"time":1001.0,"category":"job","name":"build","zone":"start","message":"compiling"}
/// {"time":1009.0,"category":"job","name":"build","zone":"end"}
/// {"time":1002.0,"tag":"deploy","help":"v2 rollout","color":"255;0;0;255"}
/// ```
///
/// Unlike the key-value parser this one treats a malformed line as file
/// corruption: the error aborts the file and rolls its writes back. Blank
/// lines are allowed.
pub struct JsonLinesParser {
    line_no: usize,
}

#[derive(Debug, Deserialize)]
struct JsonRecord {
    time: EpochTime,
    category: Option<String>,
    name: Option<String>,
    value: Option<f64>,
    status: Option<String>,
    zone: Option<String>,
    message: Option<String>,
    desc: Option<String>,
    tag: Option<String>,
    help: Option<String>,
    color: Option<String>,
}

impl JsonLinesParser {
    pub fn new() -> Self {
        Self { line_no: 0 }
    }

    fn fail(&self, message: impl std::fmt::Display) -> IngestError {
        IngestError::Parse(format!("line {}: {}", self.line_no, message))
    }
}

impl Default for JsonLinesParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LogParser for JsonLinesParser {
    fn compile(&mut self, _path: &Path) -> bool {
        self.line_no = 0;
        true
    }

    fn on_start(&mut self, _sink: &mut dyn SignalSink) -> Result<(), IngestError> {
        Ok(())
    }

    fn on_row(&mut self, line: &str, sink: &mut dyn SignalSink) -> Result<(), IngestError> {
        self.line_no += 1;
        if line.trim().is_empty() {
            return Ok(());
        }

        let record: JsonRecord =
            serde_json::from_str(line).map_err(|e| self.fail(e))?;

        if let Some(tag) = record.tag.as_deref() {
            let color = record
                .color
                .as_deref()
                .map(Color::from_rgba_string)
                .unwrap_or(Color::WHITE);
            sink.add_signal_tag(record.time, color, tag, record.help.as_deref().unwrap_or(""));
            return Ok(());
        }

        let (Some(category), Some(name)) = (record.category.as_deref(), record.name.as_deref())
        else {
            return Err(self.fail("record needs category and name"));
        };

        if let Some(zone) = record.zone.as_deref() {
            let message = record.message.as_deref().unwrap_or("");
            match zone {
                "start" => sink.add_signal_start_zone(category, name, record.time, message),
                "end" => sink.add_signal_end_zone(category, name, record.time, message),
                other => return Err(self.fail(format!("unknown zone kind '{}'", other))),
            }
        } else if let Some(value) = record.value {
            sink.add_signal_value(
                category,
                name,
                record.time,
                value,
                record.desc.as_deref().unwrap_or(""),
            );
        } else if let Some(status) = record.status.as_deref() {
            sink.add_signal_status(category, name, record.time, status);
        } else {
            return Err(self.fail("record carries no value, status or zone"));
        }
        Ok(())
    }

    fn on_end(&mut self, _sink: &mut dyn SignalSink) -> Result<(), IngestError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Value(String, String, f64, f64, String),
        Status(String, String, f64, String),
        ZoneStart(String, String, f64, String),
        ZoneEnd(String, String, f64, String),
        Tag(f64, Color, String, String),
    }

    #[derive(Debug, Default)]
    struct RecordingSink {
        events: Vec<Event>,
    }

    impl SignalSink for RecordingSink {
        fn add_signal_value(
            &mut self,
            category: &str,
            name: &str,
            time: EpochTime,
            value: f64,
            desc: &str,
        ) {
            self.events
                .push(Event::Value(category.into(), name.into(), time, value, desc.into()));
        }

        fn add_signal_status(&mut self, category: &str, name: &str, time: EpochTime, status: &str) {
            self.events
                .push(Event::Status(category.into(), name.into(), time, status.into()));
        }

        fn add_signal_start_zone(
            &mut self,
            category: &str,
            name: &str,
            time: EpochTime,
            message: &str,
        ) {
            self.events
                .push(Event::ZoneStart(category.into(), name.into(), time, message.into()));
        }

        fn add_signal_end_zone(
            &mut self,
            category: &str,
            name: &str,
            time: EpochTime,
            message: &str,
        ) {
            self.events
                .push(Event::ZoneEnd(category.into(), name.into(), time, message.into()));
        }

        fn add_signal_tag(&mut self, time: EpochTime, color: Color, name: &str, help: &str) {
            self.events
                .push(Event::Tag(time, color, name.into(), help.into()));
        }
    }

    fn feed(parser: &mut dyn LogParser, lines: &[&str]) -> Result<RecordingSink, IngestError> {
        let mut sink = RecordingSink::default();
        assert!(parser.compile(Path::new("test.log")));
        parser.on_start(&mut sink)?;
        for line in lines {
            parser.on_row(line, &mut sink)?;
        }
        parser.on_end(&mut sink)?;
        Ok(sink)
    }

    #[test]
    fn test_key_value_samples_and_desc() {
        let mut parser = KeyValueParser::new();
        let sink = feed(
            &mut parser,
            &[
                "1000.5 cpu/usage=42.5 sampled by collectd",
                "1001 job/state=RUNNING",
            ],
        )
        .unwrap();

        assert_eq!(
            sink.events,
            vec![
                Event::Value(
                    "cpu".into(),
                    "usage".into(),
                    1000.5,
                    42.5,
                    "sampled by collectd".into()
                ),
                Event::Status("job".into(), "state".into(), 1001.0, "RUNNING".into()),
            ]
        );
    }

    #[test]
    fn test_key_value_zones_and_tags() {
        let mut parser = KeyValueParser::new();
        let sink = feed(
            &mut parser,
            &[
                "1001.0 >job/build compile started",
                "1002.0 #deploy v2 rollout begins",
                "1009.0 <job/build",
            ],
        )
        .unwrap();

        assert_eq!(
            sink.events,
            vec![
                Event::ZoneStart("job".into(), "build".into(), 1001.0, "compile started".into()),
                Event::Tag(1002.0, Color::WHITE, "deploy".into(), "v2 rollout begins".into()),
                Event::ZoneEnd("job".into(), "build".into(), 1009.0, "".into()),
            ]
        );
    }

    #[test]
    fn test_key_value_skips_noise() {
        let mut parser = KeyValueParser::new();
        let sink = feed(
            &mut parser,
            &[
                "starting daemon, pid 4242",
                "",
                "   ",
                "1000 no equals sign here",
                "1000 /orphan=1",
                "1000 orphan/=1",
                "1000 cpu/usage=",
                "# plain comment",
            ],
        )
        .unwrap();
        assert!(sink.events.is_empty());
    }

    #[test]
    fn test_key_value_accepts_rfc3339_timestamps() {
        let mut parser = KeyValueParser::new();
        let sink = feed(
            &mut parser,
            &[
                "1970-01-01T00:16:40.500Z cpu/usage=42.5",
                "1970-01-01T01:33:20+01:00 cpu/usage=84.0",
            ],
        )
        .unwrap();
        assert_eq!(
            sink.events,
            vec![
                Event::Value("cpu".into(), "usage".into(), 1000.5, 42.5, "".into()),
                Event::Value("cpu".into(), "usage".into(), 2000.0, 84.0, "".into()),
            ]
        );
    }

    #[test]
    fn test_key_value_fallback_category() {
        let mut parser = KeyValueParser::new();
        let sink = feed(&mut parser, &["1000 heartbeat=1"]).unwrap();
        assert_eq!(
            sink.events,
            vec![Event::Value("log".into(), "heartbeat".into(), 1000.0, 1.0, "".into())]
        );
    }

    #[test]
    fn test_json_lines_records() {
        let mut parser = JsonLinesParser::new();
        let sink = feed(
            &mut parser,
            &[
                r#"{"time":1000.5,"category":"cpu","name":"usage","value":42.5,"desc":"idle"}"#,
                "",
                r#"{"time":1000.5,"category":"job","name":"state","status":"RUNNING"}"#,
                r#"{"time":1001.0,"category":"job","name":"build","zone":"start","message":"compiling"}"#,
                r#"{"time":1009.0,"category":"job","name":"build","zone":"end"}"#,
                r#"{"time":1002.0,"tag":"deploy","help":"v2 rollout","color":"255;0;0;255"}"#,
            ],
        )
        .unwrap();

        assert_eq!(
            sink.events,
            vec![
                Event::Value("cpu".into(), "usage".into(), 1000.5, 42.5, "idle".into()),
                Event::Status("job".into(), "state".into(), 1000.5, "RUNNING".into()),
                Event::ZoneStart("job".into(), "build".into(), 1001.0, "compiling".into()),
                Event::ZoneEnd("job".into(), "build".into(), 1009.0, "".into()),
                Event::Tag(1002.0, Color::rgba(255, 0, 0, 255), "deploy".into(), "v2 rollout".into()),
            ]
        );
    }

    #[test]
    fn test_json_lines_tag_without_color_is_white() {
        let mut parser = JsonLinesParser::new();
        let sink = feed(&mut parser, &[r#"{"time":1.0,"tag":"boot"}"#]).unwrap();
        assert_eq!(
            sink.events,
            vec![Event::Tag(1.0, Color::WHITE, "boot".into(), "".into())]
        );
    }

    #[test]
    fn test_json_lines_rejects_malformed_line() {
        let mut parser = JsonLinesParser::new();
        let err = feed(
            &mut parser,
            &[
                r#"{"time":1.0,"category":"cpu","name":"usage","value":1.0}"#,
                "not json at all {",
            ],
        )
        .unwrap_err();

        match err {
            IngestError::Parse(message) => assert!(message.starts_with("line 2:"), "{}", message),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_json_lines_rejects_incomplete_records() {
        let mut parser = JsonLinesParser::new();
        assert!(matches!(
            feed(&mut parser, &[r#"{"time":1.0,"value":5.0}"#]),
            Err(IngestError::Parse(_))
        ));
        assert!(matches!(
            feed(&mut parser, &[r#"{"time":1.0,"category":"a","name":"b"}"#]),
            Err(IngestError::Parse(_))
        ));
        assert!(matches!(
            feed(
                &mut parser,
                &[r#"{"time":1.0,"category":"a","name":"b","zone":"sideways"}"#]
            ),
            Err(IngestError::Parse(_))
        ));
    }

    #[test]
    fn test_compile_resets_line_numbers() {
        let mut parser = JsonLinesParser::new();
        let _ = feed(&mut parser, &[r#"{"time":1.0,"tag":"a"}"#]).unwrap();

        // Second file: error reports line 1, not a continuation.
        let err = feed(&mut parser, &["nope"]).unwrap_err();
        match err {
            IngestError::Parse(message) => assert!(message.starts_with("line 1:"), "{}", message),
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
