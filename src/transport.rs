//! Event sources feeding the dispatcher.
//!
//! Every transport turns its input into [`Inbound::Event`] messages on the
//! relay's channel. The Streamlabs socket client lives in
//! [`socketio`](crate::socketio); this module holds the line-oriented
//! source used for replays and external bridges.

use crate::relay::Inbound;
use crossbeam_channel::Sender;
use log::warn;
use serde_json::Value;
use std::io::{self, BufRead};

/// Forward newline-delimited JSON events from `reader`.
///
/// Blank lines are skipped; lines that are not JSON are logged and skipped.
/// Stops early if the relay has gone away. Returns the number of events
/// forwarded.
pub fn forward_ndjson<R: BufRead>(reader: R, sink: &Sender<Inbound>) -> io::Result<usize> {
    let mut forwarded = 0;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: Value = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!("skipping line {}: not JSON ({e})", index + 1);
                continue;
            }
        };

        if sink.send(Inbound::Event(event)).is_err() {
            break;
        }
        forwarded += 1;
    }

    Ok(forwarded)
}
