use std::io::Write;

use crate::record::Record;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Fresh,
    Open { written: usize },
    Closed { written: usize },
}

/// Writes records to a sink as a single JSON array.
///
/// The caller drives the array explicitly: [`open`](Self::open) once, any
/// number of [`write_record`](Self::write_record) calls, then
/// [`close`](Self::close) once when the input is exhausted. Commas are placed
/// from the writer's own count, never from lookahead. Calls made out of that
/// order fail with [`Error::InvalidSerializerState`] and write nothing.
pub struct ArrayWriter<W> {
    sink: W,
    state: WriterState,
}

impl<W: Write> ArrayWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            state: WriterState::Fresh,
        }
    }

    /// Writes the opening bracket.
    pub fn open(&mut self) -> Result<()> {
        match self.state {
            WriterState::Fresh => {
                self.sink.write_all(b"[")?;
                self.state = WriterState::Open { written: 0 };
                Ok(())
            }
            WriterState::Open { .. } => Err(invalid("open called twice")),
            WriterState::Closed { .. } => Err(invalid("open called after close")),
        }
    }

    /// Writes one record, preceded by a comma unless it is the first.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        let written = match self.state {
            WriterState::Open { written } => written,
            WriterState::Fresh => return Err(invalid("write_record called before open")),
            WriterState::Closed { .. } => return Err(invalid("write_record called after close")),
        };
        if written > 0 {
            self.sink.write_all(b",")?;
        }
        serde_json::to_writer(&mut self.sink, record).map_err(std::io::Error::from)?;
        self.state = WriterState::Open {
            written: written + 1,
        };
        Ok(())
    }

    /// Writes the closing bracket and flushes, returning the record count.
    pub fn close(&mut self) -> Result<usize> {
        let written = match self.state {
            WriterState::Open { written } => written,
            WriterState::Fresh => return Err(invalid("close called before open")),
            WriterState::Closed { .. } => return Err(invalid("close called twice")),
        };
        self.sink.write_all(b"]")?;
        self.sink.flush()?;
        self.state = WriterState::Closed { written };
        Ok(written)
    }

    /// Number of records written so far.
    pub fn written(&self) -> usize {
        match self.state {
            WriterState::Fresh => 0,
            WriterState::Open { written } | WriterState::Closed { written } => written,
        }
    }
}

fn invalid(reason: &str) -> Error {
    Error::InvalidSerializerState(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;

    fn record(id: &str) -> Record {
        let mut record = Record::new();
        record.push("id", FieldValue::Text(id.to_string()));
        record
    }

    fn output(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_empty_array() {
        let mut buf = Vec::new();
        let mut writer = ArrayWriter::new(&mut buf);
        writer.open().unwrap();
        assert_eq!(writer.close().unwrap(), 0);
        assert_eq!(output(buf), "[]");
    }

    #[test]
    fn test_commas_between_records_only() {
        let mut buf = Vec::new();
        let mut writer = ArrayWriter::new(&mut buf);
        writer.open().unwrap();
        for id in ["1", "2", "3"] {
            writer.write_record(&record(id)).unwrap();
        }
        assert_eq!(writer.written(), 3);
        assert_eq!(writer.close().unwrap(), 3);
        assert!(matches!(writer.close(), Err(Error::InvalidSerializerState(_))));
        assert_eq!(output(buf), r#"[{"id":"1"},{"id":"2"},{"id":"3"}]"#);
    }

    #[test]
    fn test_single_record() {
        let mut buf = Vec::new();
        let mut writer = ArrayWriter::new(&mut buf);
        writer.open().unwrap();
        writer.write_record(&record("only")).unwrap();
        writer.close().unwrap();
        assert_eq!(output(buf), r#"[{"id":"only"}]"#);
    }

    #[test]
    fn test_write_before_open_rejected_every_time() {
        let mut buf = Vec::new();
        let mut writer = ArrayWriter::new(&mut buf);
        for _ in 0..3 {
            assert!(matches!(
                writer.write_record(&record("1")),
                Err(Error::InvalidSerializerState(_))
            ));
        }
        assert!(matches!(writer.close(), Err(Error::InvalidSerializerState(_))));
        assert_eq!(output(buf), "");
    }

    #[test]
    fn test_double_close_rejected_every_time() {
        let mut buf = Vec::new();
        let mut writer = ArrayWriter::new(&mut buf);
        writer.open().unwrap();
        writer.close().unwrap();
        for _ in 0..3 {
            assert!(matches!(writer.close(), Err(Error::InvalidSerializerState(_))));
        }
        assert!(matches!(
            writer.write_record(&record("late")),
            Err(Error::InvalidSerializerState(_))
        ));
        assert!(matches!(writer.open(), Err(Error::InvalidSerializerState(_))));
        assert_eq!(output(buf), "[]");
    }

    #[test]
    fn test_double_open_rejected() {
        let mut buf = Vec::new();
        let mut writer = ArrayWriter::new(&mut buf);
        writer.open().unwrap();
        assert!(matches!(writer.open(), Err(Error::InvalidSerializerState(_))));
        assert_eq!(output(buf), "[");
    }
}
