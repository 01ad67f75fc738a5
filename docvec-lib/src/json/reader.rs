use std::cell::Cell;
use std::fmt;
use std::io::{self, Read};
use std::rc::Rc;

use serde::de::{self, DeserializeSeed, Deserializer as _, MapAccess, SeqAccess, Visitor};
use serde_json::error::Category;
use serde_json::Value;

use crate::json::{Event, Literal};
use crate::Error;

/// Receives structural events as the parser produces them.
pub trait EventSink {
    /// `offset` is the number of input bytes consumed when `event` was produced.
    fn event(&mut self, event: Event, offset: u64) -> crate::Result<()>;
}

/// Turns a JSON array of objects into a sequence of [`Event`]s.
///
/// Decoding is done by `serde_json` reading straight from `reader`, one
/// array element at a time. Each object's field values are decoded whole
/// before their events are emitted, so memory is bounded by the largest
/// single field rather than the document.
pub struct StreamParser<R> {
    reader: CountingReader<R>,
    consumed: Rc<Cell<u64>>,
}

impl<R: Read> StreamParser<R> {
    pub fn new(reader: R) -> Self {
        let consumed = Rc::new(Cell::new(0));
        Self {
            reader: CountingReader {
                inner: reader,
                consumed: Rc::clone(&consumed),
            },
            consumed,
        }
    }

    /// Parses the whole document, feeding every event to `sink`.
    ///
    /// Stops at the first error, whether it comes from the input or from the
    /// sink. Content after the closing bracket other than whitespace is
    /// rejected.
    pub fn parse<S: EventSink>(self, sink: &mut S) -> crate::Result<()> {
        let mut de = serde_json::Deserializer::from_reader(self.reader);
        let mut driver = Driver {
            sink,
            consumed: self.consumed,
            position: Position::Start,
            failure: None,
        };

        let outcome = (&mut de)
            .deserialize_seq(DocumentVisitor {
                driver: &mut driver,
            })
            .and_then(|()| de.end());

        if let Some(err) = driver.failure.take() {
            return Err(err);
        }
        outcome.map_err(|err| driver.convert(err))
    }
}

/// Where the parser was when the input ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Start,
    Array,
    Record,
    Done,
}

struct Driver<'a> {
    sink: &'a mut dyn EventSink,
    consumed: Rc<Cell<u64>>,
    position: Position,
    failure: Option<Error>,
}

impl Driver<'_> {
    /// Forwards `event` to the sink. A sink error is kept aside and replaced
    /// by a placeholder that unwinds the deserializer.
    fn emit<E: de::Error>(&mut self, event: Event) -> Result<(), E> {
        match self.sink.event(event, self.consumed.get()) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.failure = Some(err);
                Err(E::custom("stopped by event sink"))
            }
        }
    }

    fn emit_value<E: de::Error>(&mut self, value: Value) -> Result<(), E> {
        match value {
            Value::Null => self.emit(Event::Literal(Literal::Null)),
            Value::Bool(b) => self.emit(Event::Literal(Literal::Bool(b))),
            Value::Number(n) => self.emit(Event::Literal(Literal::Number(n))),
            Value::String(s) => self.emit(Event::StringValue(s)),
            Value::Array(items) => {
                self.emit::<E>(Event::ArrayStart)?;
                for item in items {
                    self.emit_value::<E>(item)?;
                }
                self.emit(Event::ArrayEnd)
            }
            Value::Object(fields) => {
                self.emit::<E>(Event::ObjectStart)?;
                for (name, item) in fields {
                    self.emit::<E>(Event::FieldName(name))?;
                    self.emit_value::<E>(item)?;
                }
                self.emit(Event::ObjectEnd)
            }
        }
    }

    fn convert(&self, err: serde_json::Error) -> Error {
        let offset = self.consumed.get();
        match err.classify() {
            Category::Io => Error::Io(io::Error::from(err)),
            Category::Eof => match self.position {
                Position::Start => Error::malformed(offset, "empty input"),
                Position::Array => Error::IncompleteRecord {
                    offset,
                    context: "the top-level array",
                },
                Position::Record => Error::IncompleteRecord {
                    offset,
                    context: "an object",
                },
                Position::Done => Error::IncompleteRecord {
                    offset,
                    context: "a value",
                },
            },
            Category::Syntax | Category::Data => Error::malformed(offset, err.to_string()),
        }
    }
}

struct DocumentVisitor<'d, 'a> {
    driver: &'d mut Driver<'a>,
}

impl<'de> Visitor<'de> for DocumentVisitor<'_, '_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a top-level array of objects")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        let driver = self.driver;
        driver.position = Position::Array;
        driver.emit::<A::Error>(Event::ArrayStart)?;
        while seq
            .next_element_seed(RecordSeed {
                driver: &mut *driver,
            })?
            .is_some()
        {}
        driver.position = Position::Done;
        driver.emit(Event::ArrayEnd)
    }
}

struct RecordSeed<'d, 'a> {
    driver: &'d mut Driver<'a>,
}

impl<'de> DeserializeSeed<'de> for RecordSeed<'_, '_> {
    type Value = ();

    fn deserialize<D: de::Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for RecordSeed<'_, '_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let driver = self.driver;
        driver.position = Position::Record;
        driver.emit::<A::Error>(Event::ObjectStart)?;
        while let Some(name) = map.next_key::<String>()? {
            driver.emit::<A::Error>(Event::FieldName(name))?;
            let value: Value = map.next_value()?;
            driver.emit_value::<A::Error>(value)?;
        }
        driver.position = Position::Array;
        driver.emit(Event::ObjectEnd)
    }
}

/// Tracks how many bytes the deserializer has pulled from the input.
struct CountingReader<R> {
    inner: R,
    consumed: Rc<Cell<u64>>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.consumed.set(self.consumed.get() + n as u64);
        Ok(n)
    }
}
