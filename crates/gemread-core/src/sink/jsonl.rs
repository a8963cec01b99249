use std::io::Write;

use serde::Serialize;

use super::{FrameSink, SinkError};
use crate::frames::StreamEnd;
use crate::stream::Event;

#[derive(Serialize)]
struct EventRecord<'a, F> {
    event: u64,
    frame: &'a F,
}

#[derive(Serialize)]
struct EndRecord {
    stream_end: StreamEnd,
    events: u64,
}

/// Writes one JSON object per event, then a closing `stream_end` record.
///
/// ```text
/// {"event":0,"frame":{...}}
/// {"stream_end":"clean","events":1}
/// ```
pub struct JsonLinesWriter<W: Write> {
    out: W,
    events: u64,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, events: 0 }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<F: Event, W: Write> FrameSink<F> for JsonLinesWriter<W> {
    fn on_frame_decoded(&mut self, frame: &F) -> Result<(), SinkError> {
        let record = EventRecord {
            event: self.events,
            frame,
        };
        serde_json::to_writer(&mut self.out, &record)?;
        self.out.write_all(b"\n")?;
        self.events += 1;
        Ok(())
    }

    fn on_stream_end(&mut self, end: StreamEnd) -> Result<(), SinkError> {
        let record = EndRecord {
            stream_end: end,
            events: self.events,
        };
        serde_json::to_writer(&mut self.out, &record)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::JsonLinesWriter;
    use crate::frames::{GebFrame, StreamEnd, decode_geb};
    use crate::sink::FrameSink;
    use crate::source::TokenReader;

    #[test]
    fn one_line_per_event_and_an_end_record() {
        let input = "0000001230000001 a001 c012 e0ab 5 8000000000000000 5a5a 0";
        let mut tokens = TokenReader::new(input.as_bytes());
        let frame = decode_geb(&mut tokens, 24).unwrap();

        let mut writer = JsonLinesWriter::new(Vec::new());
        writer.on_frame_decoded(&frame).unwrap();
        FrameSink::<GebFrame>::on_stream_end(&mut writer, StreamEnd::Clean).unwrap();

        let text = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], 0);
        assert_eq!(lines[0]["frame"]["header"]["chamber_id"], 0x123);
        let vfat = &lines[0]["frame"]["vfats"][0];
        assert_eq!(vfat["channels"]["hits"], serde_json::json!([0, 2, 127]));
        assert_eq!(vfat["control_mismatch"], false);
        assert_eq!(lines[1]["stream_end"], "clean");
        assert_eq!(lines[1]["events"], 1);
    }
}
