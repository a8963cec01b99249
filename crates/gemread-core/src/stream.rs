//! Pull-based event stream over a token source.
//!
//! An `EventStream` owns its `TokenReader` and a `FrameDecoder` for the
//! top-level frame of one file family. Each `decode_next` call decodes
//! exactly one top-level frame; `Ok(None)` is the clean end of stream.
//! `run` drives a stream into a `FrameSink` and reports how it ended.

use std::fmt;
use std::io::{self, BufRead};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::DecoderConfig;
use crate::frames::{
    DecodeError, GebFrame, GemFrame, ScanHeader, StreamEnd, VfatFrame, VfatVariant, decode_amc,
    decode_geb, decode_scan_header, decode_vfat,
};
use crate::sink::{FrameSink, SinkError};
use crate::source::{TokenError, TokenReader};

/// Decodes one top-level frame from the token stream.
pub trait FrameDecoder {
    type Frame;

    fn decode<R: BufRead>(&self, tokens: &mut TokenReader<R>) -> Result<Self::Frame, DecodeError>;
}

/// Readout files: a sequence of GEB frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GebDecoder {
    pub max_vfats: u32,
}

impl GebDecoder {
    pub fn from_config(config: &DecoderConfig) -> Self {
        Self {
            max_vfats: config.max_vfats_per_geb,
        }
    }
}

impl FrameDecoder for GebDecoder {
    type Frame = GebFrame;

    fn decode<R: BufRead>(&self, tokens: &mut TokenReader<R>) -> Result<GebFrame, DecodeError> {
        decode_geb(tokens, self.max_vfats)
    }
}

/// Threshold-scan files: a sequence of scan-layout VFAT frames after the
/// scan header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VfatDecoder;

impl FrameDecoder for VfatDecoder {
    type Frame = VfatFrame;

    fn decode<R: BufRead>(&self, tokens: &mut TokenReader<R>) -> Result<VfatFrame, DecodeError> {
        decode_vfat(tokens, VfatVariant::ThresholdScan)
    }
}

/// AMC files: a sequence of full readout frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmcDecoder {
    pub max_gebs: u32,
    pub max_vfats: u32,
}

impl AmcDecoder {
    pub fn from_config(config: &DecoderConfig) -> Self {
        Self {
            max_gebs: config.max_gebs_per_amc,
            max_vfats: config.max_vfats_per_geb,
        }
    }
}

impl FrameDecoder for AmcDecoder {
    type Frame = GemFrame;

    fn decode<R: BufRead>(&self, tokens: &mut TokenReader<R>) -> Result<GemFrame, DecodeError> {
        decode_amc(tokens, self.max_gebs, self.max_vfats)
    }
}

/// A decoded top-level frame, as seen by sinks.
pub trait Event: fmt::Display + Serialize {
    /// Chip sub-frames carried by this event, in wire order.
    fn chips(&self) -> impl Iterator<Item = &VfatFrame>;

    /// Whether any control nibble or marker in this event was off.
    fn has_control_mismatch(&self) -> bool {
        self.chips().any(|chip| chip.control_mismatch)
    }
}

impl Event for VfatFrame {
    fn chips(&self) -> impl Iterator<Item = &VfatFrame> {
        std::iter::once(self)
    }
}

impl Event for GebFrame {
    fn chips(&self) -> impl Iterator<Item = &VfatFrame> {
        self.vfats.iter()
    }
}

impl Event for GemFrame {
    fn chips(&self) -> impl Iterator<Item = &VfatFrame> {
        self.gebs.iter().flat_map(|geb| geb.vfats.iter())
    }

    fn has_control_mismatch(&self) -> bool {
        self.control_mismatch || self.chips().any(|chip| chip.control_mismatch)
    }
}

/// Pull decoder yielding one top-level frame per `decode_next` call.
pub struct EventStream<R, D> {
    tokens: TokenReader<R>,
    decoder: D,
    events: u64,
}

pub type ReadoutStream<R> = EventStream<R, GebDecoder>;
pub type ScanStream<R> = EventStream<R, VfatDecoder>;
pub type AmcStream<R> = EventStream<R, AmcDecoder>;

impl<R: BufRead, D: FrameDecoder> EventStream<R, D> {
    pub fn new(reader: R, decoder: D) -> Self {
        Self::from_tokens(TokenReader::new(reader), decoder)
    }

    /// Continue from a reader that already consumed a file header.
    pub fn from_tokens(tokens: TokenReader<R>, decoder: D) -> Self {
        Self {
            tokens,
            decoder,
            events: 0,
        }
    }

    /// Decode the next top-level frame.
    ///
    /// Returns `Ok(None)` when only whitespace remains. A stream whose reader
    /// has faulted keeps failing with `StreamFault`.
    ///
    /// # Examples
    /// ```
    /// use gemread_core::stream::{EventStream, GebDecoder};
    ///
    /// let input = "0000000000000001  a001 c012 e0ab 0 0 0  0\n";
    /// let mut stream = EventStream::new(input.as_bytes(), GebDecoder { max_vfats: 24 });
    /// let geb = stream.decode_next()?.expect("one frame");
    /// assert_eq!(geb.vfats[0].chip_id(), 0xab);
    /// assert!(stream.decode_next()?.is_none());
    /// # Ok::<(), gemread_core::DecodeError>(())
    /// ```
    pub fn decode_next(&mut self) -> Result<Option<D::Frame>, DecodeError> {
        match self.tokens.at_end() {
            Ok(true) => return Ok(None),
            Ok(false) => {}
            Err(TokenError::Io(err)) => return Err(DecodeError::StreamFault(err)),
            Err(err) => return Err(DecodeError::StreamFault(io::Error::other(err.to_string()))),
        }
        let frame = self.decoder.decode(&mut self.tokens)?;
        self.events += 1;
        Ok(Some(frame))
    }

    /// Top-level frames decoded so far.
    pub fn events_decoded(&self) -> u64 {
        self.events
    }

    pub fn tokens_read(&self) -> u64 {
        self.tokens.tokens_read()
    }

    pub fn into_inner(self) -> R {
        self.tokens.into_inner()
    }
}

impl<R: BufRead> ReadoutStream<R> {
    pub fn readout(reader: R, config: &DecoderConfig) -> Self {
        Self::new(reader, GebDecoder::from_config(config))
    }
}

impl<R: BufRead> AmcStream<R> {
    pub fn amc(reader: R, config: &DecoderConfig) -> Self {
        Self::new(reader, AmcDecoder::from_config(config))
    }
}

/// Read the scan header, then hand back the stream of scan events behind it.
///
/// # Errors
/// `MalformedHeader` for inconsistent scan parameters, `TruncatedFrame` when
/// the header itself is cut short.
pub fn open_scan<R: BufRead>(reader: R) -> Result<(ScanHeader, ScanStream<R>), DecodeError> {
    let mut tokens = TokenReader::new(reader);
    let header = decode_scan_header(&mut tokens)?;
    Ok((header, EventStream::from_tokens(tokens, VfatDecoder)))
}

/// Outcome of a `run` over an event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Top-level frames delivered to the sink.
    pub events: u64,
    /// Chip sub-frames inside those frames.
    pub chips: u64,
    /// Frames carrying at least one control mismatch.
    pub control_mismatches: u64,
    pub end: StreamEnd,
    /// Set when `max_events` stopped the run before end of stream.
    pub stopped_early: bool,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            events: 0,
            chips: 0,
            control_mismatches: 0,
            end: StreamEnd::Clean,
            stopped_early: false,
        }
    }

    fn record<F: Event>(&mut self, frame: &F) {
        self.events += 1;
        self.chips += frame.chips().count() as u64;
        if frame.has_control_mismatch() {
            self.control_mismatches += 1;
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    /// Decoding stopped; `summary` covers the frames delivered before it.
    #[error("{source} (after {} events)", .summary.events)]
    Decode {
        source: DecodeError,
        summary: RunSummary,
    },
    #[error("sink failed: {0}")]
    Sink(#[from] SinkError),
}

impl RunError {
    /// Summary of the frames delivered before a decode error, if any.
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            RunError::Decode { summary, .. } => Some(summary),
            RunError::Sink(_) => None,
        }
    }
}

/// Pull frames from `stream` into `sink` until the stream ends, a decode
/// error occurs, or `max_events` frames were delivered.
///
/// `on_stream_end` is called exactly once on every path, including after a
/// sink failure.
pub fn run<R, D, S>(
    stream: &mut EventStream<R, D>,
    sink: &mut S,
    max_events: Option<u64>,
) -> Result<RunSummary, RunError>
where
    R: BufRead,
    D: FrameDecoder,
    D::Frame: Event,
    S: FrameSink<D::Frame> + ?Sized,
{
    let mut summary = RunSummary::new();
    loop {
        if max_events.is_some_and(|max| summary.events >= max) {
            summary.stopped_early = true;
            break;
        }
        let frame = match stream.decode_next() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(source) => {
                summary.end = source.stream_end();
                warn!(
                    events = summary.events,
                    tokens = stream.tokens_read(),
                    end = %summary.end,
                    error = %source,
                    "Event stream stopped"
                );
                if let Err(err) = sink.on_stream_end(summary.end) {
                    warn!(error = %err, "Sink failed while closing the stream");
                }
                return Err(RunError::Decode { source, summary });
            }
        };
        summary.record(&frame);
        if let Err(err) = sink.on_frame_decoded(&frame) {
            summary.end = StreamEnd::Fault;
            if let Err(close_err) = sink.on_stream_end(StreamEnd::Fault) {
                warn!(error = %close_err, "Sink failed while closing the stream");
            }
            return Err(err.into());
        }
    }

    sink.on_stream_end(summary.end)?;
    info!(
        events = summary.events,
        chips = summary.chips,
        control_mismatches = summary.control_mismatches,
        stopped_early = summary.stopped_early,
        "Event stream finished"
    );
    Ok(summary)
}
