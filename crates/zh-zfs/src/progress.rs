// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Incremental parsing of the diagnostic stream of `zfs send -P -v`.
//!
//! The stream starts with a header (`<kind> <source> <size>` followed by
//! `size <estimate>`) and then carries one report line per second
//! (`<time> <bytes sent> <snapshot>`) until the send finishes. Each line is
//! awaited as it arrives; nothing is buffered beyond the current line.

use crate::error::{ParseContext, ParseError, ZfsResult};
use futures::Stream;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{trace, warn};

/// Snapshot of an in-flight send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferProgress {
    /// `full` or `incremental`.
    pub kind: String,
    pub source_name: String,
    /// Base snapshot, when the header names one (incremental sends).
    pub base_name: Option<String>,
    pub source_size: i64,
    /// How many bytes `zfs` expects to put on the wire.
    pub estimated_send_size: i64,
    /// False only on the first (header) event.
    pub has_report: bool,
    /// Parsed report line; `None` on the header event and when the line was
    /// malformed.
    pub report: Option<ProgressReport>,
    /// Set when a report line could not be parsed.
    pub error: Option<ParseError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressReport {
    /// Wall-clock time on the sending host, verbatim.
    pub timestamp: String,
    pub bytes_sent: i64,
    /// Snapshot currently being transferred.
    pub current_unit: String,
}

/// Callback receiving events as they are parsed. Must return quickly: the
/// subprocess stalls while its diagnostic pipe is not being read.
pub type ProgressCallback<'a> = &'a mut (dyn FnMut(TransferProgress) + Send);

/// Terminal status of a fully consumed progress stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressOutcome {
    pub events: usize,
    /// Lines that were not progress (usually error text from `zfs`).
    pub unparsed: Vec<String>,
}

enum Phase {
    Header,
    Reports(TransferProgress),
    Finished,
}

/// Pull-based parser over a diagnostic stream. One stream, one pass.
pub struct ProgressStream<R> {
    reader: R,
    buffer: Vec<u8>,
    phase: Phase,
    unparsed: Vec<String>,
}

impl<R> ProgressStream<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(128),
            phase: Phase::Header,
            unparsed: Vec::new(),
        }
    }

    /// Next event, `Ok(None)` at end of stream. A malformed header is an error
    /// and ends the stream; a malformed report line is delivered as an event
    /// with `error` set.
    pub async fn next_event(&mut self) -> ZfsResult<Option<TransferProgress>> {
        let header = match &self.phase {
            Phase::Finished => return Ok(None),
            Phase::Header => return self.read_header().await,
            Phase::Reports(header) => header.clone(),
        };

        let Some(line) = self.next_line().await? else {
            self.phase = Phase::Finished;
            return Ok(None);
        };

        let mut event = header;
        event.has_report = true;
        match parse_report(&line) {
            Ok(report) => {
                trace!(operation = "send_progress", bytes_sent = report.bytes_sent, unit = %report.current_unit, "progress report");
                event.report = Some(report);
            }
            Err(err) => {
                warn!(operation = "send_progress", line = %line, "unparsable progress line");
                self.unparsed.push(line);
                event.error = Some(err);
            }
        }
        Ok(Some(event))
    }

    /// Drain whatever is left and return every line not consumed as progress.
    /// Blank lines carry no diagnostic and are dropped here.
    pub async fn finish(mut self) -> ZfsResult<Vec<String>> {
        while let Some(line) = self.next_line().await? {
            if !line.trim().is_empty() {
                self.unparsed.push(line);
            }
        }
        Ok(self.unparsed)
    }

    /// Adapt into a `futures::Stream` of events.
    pub fn into_stream(self) -> impl Stream<Item = ZfsResult<TransferProgress>> {
        futures::stream::unfold(self, |mut stream| async move {
            match stream.next_event().await {
                Ok(Some(event)) => Some((Ok(event), stream)),
                Ok(None) => None,
                Err(err) => Some((Err(err), stream)),
            }
        })
    }

    async fn read_header(&mut self) -> ZfsResult<Option<TransferProgress>> {
        let Some(first) = self.next_line().await? else {
            self.phase = Phase::Finished;
            return Ok(None);
        };

        let parsed = match parse_header(&first) {
            Ok(header) => match self.next_line().await? {
                Some(size_line) => match parse_size_line(&size_line) {
                    Ok(estimate) => Ok(TransferProgress {
                        estimated_send_size: estimate,
                        ..header
                    }),
                    Err(err) => {
                        self.unparsed.push(first.clone());
                        self.unparsed.push(size_line);
                        Err(err)
                    }
                },
                None => {
                    self.unparsed.push(first.clone());
                    Err(ParseError::new(
                        ParseContext::ProgressHeader,
                        &first,
                        "stream ended before the `size` line",
                    ))
                }
            },
            Err(err) => {
                self.unparsed.push(first);
                Err(err)
            }
        };

        match parsed {
            Ok(header) => {
                trace!(operation = "send_progress", kind = %header.kind, source = %header.source_name, estimate = header.estimated_send_size, "progress header");
                self.phase = Phase::Reports(header.clone());
                Ok(Some(header))
            }
            Err(err) => {
                self.phase = Phase::Finished;
                Err(err.into())
            }
        }
    }

    /// Next line without its terminator; `None` at end of stream. Blank lines
    /// are returned like any other and fail to parse as header or report.
    async fn next_line(&mut self) -> ZfsResult<Option<String>> {
        self.buffer.clear();
        let read = match self.reader.read_until(b'\n', &mut self.buffer).await {
            Ok(read) => read,
            Err(err) => {
                self.phase = Phase::Finished;
                return Err(err.into());
            }
        };
        if read == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.buffer);
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }
}

/// Feed a diagnostic stream to `callback`, one event per parsed line, in
/// stream order. Without a callback the stream is only drained.
pub async fn parse_progress_stream<R>(
    reader: R,
    callback: Option<ProgressCallback<'_>>,
) -> ZfsResult<ProgressOutcome>
where
    R: AsyncRead + Unpin,
{
    let Some(callback) = callback else {
        let mut reader = reader;
        tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;
        return Ok(ProgressOutcome::default());
    };

    let mut stream = ProgressStream::new(BufReader::new(reader));
    let mut events = 0;
    while let Some(event) = stream.next_event().await? {
        events += 1;
        callback(event);
    }

    Ok(ProgressOutcome {
        events,
        unparsed: stream.unparsed,
    })
}

fn parse_header(line: &str) -> Result<TransferProgress, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let (kind, base_name, source_name, size) = match fields.as_slice() {
        [kind, source, size] => (*kind, None, *source, *size),
        [kind, base, source, size] => (*kind, Some(base.to_string()), *source, *size),
        _ => {
            return Err(ParseError::new(
                ParseContext::ProgressHeader,
                line,
                "expected `<kind> <source> <size>`",
            ));
        }
    };

    let source_size = size.parse::<i64>().map_err(|_| {
        ParseError::new(
            ParseContext::ProgressHeader,
            line,
            format!("source size `{size}` is not an integer"),
        )
    })?;

    Ok(TransferProgress {
        kind: kind.to_string(),
        source_name: source_name.to_string(),
        base_name,
        source_size,
        estimated_send_size: 0,
        has_report: false,
        report: None,
        error: None,
    })
}

fn parse_size_line(line: &str) -> Result<i64, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let ["size", estimate] = fields.as_slice() else {
        return Err(ParseError::new(
            ParseContext::ProgressHeader,
            line,
            "expected `size <bytes>`",
        ));
    };
    estimate.parse::<i64>().map_err(|_| {
        ParseError::new(
            ParseContext::ProgressHeader,
            line,
            format!("estimated size `{estimate}` is not an integer"),
        )
    })
}

fn parse_report(line: &str) -> Result<ProgressReport, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [timestamp, bytes_sent, unit] = fields.as_slice() else {
        return Err(ParseError::new(
            ParseContext::ProgressReport,
            line,
            "expected `<time> <bytes> <snapshot>`",
        ));
    };
    let bytes_sent = bytes_sent.parse::<i64>().map_err(|_| {
        ParseError::new(
            ParseContext::ProgressReport,
            line,
            format!("sent bytes `{bytes_sent}` is not an integer"),
        )
    })?;
    Ok(ProgressReport {
        timestamp: timestamp.to_string(),
        bytes_sent,
        current_unit: unit.to_string(),
    })
}
