//! Singer message output.
//!
//! One JSON document per line: `SCHEMA`, `RECORD` and `STATE` messages, in
//! the order they are written. The downstream target reads them from stdout.

use std::io::Write;
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::bookmarks::BookmarkState;
use crate::contract::{Record, RecordWriter, StateWriter};
use crate::error::OutputError;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
enum Message<'a> {
    Schema {
        stream: &'a str,
        schema: &'a Value,
        key_properties: &'a [String],
    },
    Record {
        stream: &'a str,
        record: &'a Record,
        time_extracted: String,
    },
    State {
        value: &'a BookmarkState,
    },
}

/// Writes Singer messages to any [`Write`] sink, one line each, flushed per message.
pub struct SingerWriter<W> {
    out: Mutex<W>,
}

impl<W: Write> SingerWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, message: &Message<'_>) -> Result<(), OutputError> {
        let line = serde_json::to_string(message)?;
        let mut out = self
            .out
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }
}

impl SingerWriter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> RecordWriter for SingerWriter<W> {
    fn write_schema(
        &self,
        stream: &str,
        schema: &Value,
        key_properties: &[String],
    ) -> Result<(), OutputError> {
        self.emit(&Message::Schema {
            stream,
            schema,
            key_properties,
        })
    }

    fn write_record(&self, stream: &str, record: &Record) -> Result<(), OutputError> {
        self.emit(&Message::Record {
            stream,
            record,
            time_extracted: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        })
    }
}

impl<W: Write + Send> StateWriter for SingerWriter<W> {
    fn write_state(&self, state: &BookmarkState) -> Result<(), OutputError> {
        self.emit(&Message::State { value: state })
    }
}
