//! Consumers of decoded frames.
//!
//! A sink sees every top-level frame in stream order through
//! `on_frame_decoded`, then exactly one `on_stream_end`. Sinks are
//! independent of each other; fan out with a `Vec<Box<dyn FrameSink<F>>>`.

use thiserror::Error;

use crate::frames::StreamEnd;

mod channels;
mod jsonl;
mod printer;
mod threshold;

pub use channels::ChannelHits;
pub use jsonl::JsonLinesWriter;
pub use printer::EventPrinter;
pub use threshold::{ThresholdBin, ThresholdCurve};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait FrameSink<F> {
    fn on_frame_decoded(&mut self, frame: &F) -> Result<(), SinkError>;

    fn on_stream_end(&mut self, _end: StreamEnd) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<F, S: FrameSink<F> + ?Sized> FrameSink<F> for &mut S {
    fn on_frame_decoded(&mut self, frame: &F) -> Result<(), SinkError> {
        (**self).on_frame_decoded(frame)
    }

    fn on_stream_end(&mut self, end: StreamEnd) -> Result<(), SinkError> {
        (**self).on_stream_end(end)
    }
}

impl<'a, F> FrameSink<F> for Vec<Box<dyn FrameSink<F> + 'a>> {
    fn on_frame_decoded(&mut self, frame: &F) -> Result<(), SinkError> {
        for sink in self.iter_mut() {
            sink.on_frame_decoded(frame)?;
        }
        Ok(())
    }

    /// Every sink is closed even if an earlier one fails; the first failure
    /// is returned.
    fn on_stream_end(&mut self, end: StreamEnd) -> Result<(), SinkError> {
        let mut first_err = None;
        for sink in self.iter_mut() {
            if let Err(err) = sink.on_stream_end(end) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
