use std::io::Write;

use super::{FrameSink, SinkError};
use crate::frames::StreamEnd;
use crate::stream::Event;

/// Writes the first `limit` events in human-readable form.
pub struct EventPrinter<W> {
    out: W,
    limit: u64,
    seen: u64,
}

impl<W: Write> EventPrinter<W> {
    pub fn new(out: W, limit: u64) -> Self {
        Self {
            out,
            limit,
            seen: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<F: Event, W: Write> FrameSink<F> for EventPrinter<W> {
    fn on_frame_decoded(&mut self, frame: &F) -> Result<(), SinkError> {
        let index = self.seen;
        self.seen += 1;
        if index >= self.limit {
            return Ok(());
        }
        writeln!(self.out, "event {index}")?;
        writeln!(self.out, "{frame}")?;
        Ok(())
    }

    fn on_stream_end(&mut self, end: StreamEnd) -> Result<(), SinkError> {
        if self.limit > 0 && end != StreamEnd::Clean {
            writeln!(self.out, "stream ended: {end}")?;
        }
        self.out.flush()?;
        Ok(())
    }
}
