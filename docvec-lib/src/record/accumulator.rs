use std::mem;

use tracing::trace;

use crate::json::{Event, EventSink};
use crate::record::{FieldValue, Record};
use crate::{Error, Result};

/// Progress through the object currently being rebuilt.
enum FieldState {
    AwaitingField,
    AwaitingValue(String),
    InList(String, Vec<String>),
}

/// Progress through the top-level array.
enum DocumentState {
    BeforeArray,
    InArray,
    InRecord(Record, FieldState),
    Finished,
}

/// Rebuilds one [`Record`] at a time from parser events.
///
/// Each completed record is handed to `on_record` as soon as its closing
/// brace arrives; only the record under construction is held in memory.
/// Field values may be strings, arrays of strings, or non-string scalars.
/// Anything nested deeper is rejected.
pub struct RecordAccumulator<F> {
    on_record: F,
    state: DocumentState,
    records: usize,
}

impl<F: FnMut(Record) -> Result<()>> RecordAccumulator<F> {
    pub fn new(on_record: F) -> Self {
        Self {
            on_record,
            state: DocumentState::BeforeArray,
            records: 0,
        }
    }

    /// Records completed so far.
    pub fn records(&self) -> usize {
        self.records
    }

    fn field_event(
        &mut self,
        mut record: Record,
        state: FieldState,
        event: Event,
        offset: u64,
    ) -> Result<DocumentState> {
        let next = match (state, event) {
            (FieldState::AwaitingField, Event::ObjectEnd) => {
                self.records += 1;
                trace!(record = self.records, fields = record.len(), offset, "record complete");
                (self.on_record)(record)?;
                return Ok(DocumentState::InArray);
            }
            (FieldState::AwaitingField, Event::FieldName(name)) => {
                if record.contains(&name) {
                    return Err(Error::malformed(offset, format!("duplicate field `{name}`")));
                }
                FieldState::AwaitingValue(name)
            }
            (FieldState::AwaitingValue(name), Event::StringValue(text)) => {
                record.push(name, FieldValue::Text(text));
                FieldState::AwaitingField
            }
            (FieldState::AwaitingValue(name), Event::Literal(literal)) => {
                record.push(name, FieldValue::Literal(literal));
                FieldState::AwaitingField
            }
            (FieldState::AwaitingValue(name), Event::ArrayStart) => {
                FieldState::InList(name, Vec::new())
            }
            (FieldState::InList(name, mut items), Event::StringValue(text)) => {
                items.push(text);
                FieldState::InList(name, items)
            }
            (FieldState::InList(name, items), Event::ArrayEnd) => {
                record.push(name, FieldValue::TextList(items));
                FieldState::AwaitingField
            }
            (FieldState::AwaitingValue(name), Event::ObjectStart) => {
                return Err(Error::unsupported(name, "nested objects are not supported"));
            }
            (FieldState::InList(name, _), other) => {
                return Err(Error::unsupported(
                    name,
                    format!("lists may only contain strings, found {}", other.kind()),
                ));
            }
            (_, other) => {
                return Err(Error::malformed(
                    offset,
                    format!("unexpected {} inside an object", other.kind()),
                ));
            }
        };
        Ok(DocumentState::InRecord(record, next))
    }
}

impl<F: FnMut(Record) -> Result<()>> EventSink for RecordAccumulator<F> {
    fn event(&mut self, event: Event, offset: u64) -> Result<()> {
        // a failed transition leaves the accumulator finished
        let state = mem::replace(&mut self.state, DocumentState::Finished);
        self.state = match (state, event) {
            (DocumentState::BeforeArray, Event::ArrayStart) => DocumentState::InArray,
            (DocumentState::BeforeArray, other) => {
                return Err(Error::malformed(
                    offset,
                    format!("top-level value must be an array, found {}", other.kind()),
                ));
            }
            (DocumentState::InArray, Event::ObjectStart) => {
                DocumentState::InRecord(Record::new(), FieldState::AwaitingField)
            }
            (DocumentState::InArray, Event::ArrayEnd) => DocumentState::Finished,
            (DocumentState::InArray, other) => {
                return Err(Error::malformed(
                    offset,
                    format!("array elements must be objects, found {}", other.kind()),
                ));
            }
            (DocumentState::InRecord(record, field), event) => {
                self.field_event(record, field, event, offset)?
            }
            (DocumentState::Finished, other) => {
                return Err(Error::malformed(
                    offset,
                    format!("unexpected {} after the end of the array", other.kind()),
                ));
            }
        };
        Ok(())
    }
}
