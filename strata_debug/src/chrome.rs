// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Assignment events carry no wall-clock time, so each event is stamped with
//! its position in the recording (one microsecond per event). Each pass
//! becomes a duration slice with its transitions as instant events inside it.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();

    for (seq, recorded) in decode(bytes).enumerate() {
        let ts = seq as f64;
        match recorded {
            RecordedEvent::AssignBegin {
                pass,
                root,
                squashing_enabled,
            } => {
                events.push(json!({
                    "ph": "B",
                    "name": format!("Assign #{pass}"),
                    "cat": "Assign",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "root": root.index,
                        "squashing_enabled": squashing_enabled,
                    }
                }));
            }
            RecordedEvent::Transition {
                pass,
                layer,
                transition,
                backing_changed,
            } => {
                events.push(json!({
                    "ph": "i",
                    "name": format!("{transition:?}"),
                    "cat": "Transition",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "pass": pass,
                        "layer": layer.index,
                        "backing_changed": backing_changed,
                    }
                }));
            }
            RecordedEvent::SquashingDisallowed {
                pass,
                layer,
                owner,
                reasons,
            } => {
                events.push(json!({
                    "ph": "i",
                    "name": "SquashingDisallowed",
                    "cat": "Squashing",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "pass": pass,
                        "layer": layer.index,
                        "owner": owner.map(|o| o.index),
                        "reasons": reasons.to_string(),
                    }
                }));
            }
            RecordedEvent::SquashingFinished {
                pass,
                backing,
                owner,
                member_count,
            } => {
                events.push(json!({
                    "ph": "i",
                    "name": "SquashingFinished",
                    "cat": "Squashing",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "pass": pass,
                        "backing": backing.index,
                        "owner": owner.index,
                        "member_count": member_count,
                    }
                }));
            }
            RecordedEvent::SquashBounds {
                backing,
                bounding_rect,
                total_area,
                ..
            } => {
                events.push(json!({
                    "ph": "C",
                    "name": format!("Squashing B{}", backing.index),
                    "cat": "Squashing",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "bounding_area": bounding_rect.area(),
                        "total_area": total_area,
                    }
                }));
            }
            RecordedEvent::AssignEnd(s) => {
                events.push(json!({
                    "ph": "E",
                    "name": format!("Assign #{}", s.pass),
                    "cat": "Assign",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "visited": s.visited,
                        "allocated": s.allocated,
                        "removed": s.removed,
                        "squashed": s.squashed,
                        "unsquashed": s.unsquashed,
                        "disallowed": s.disallowed,
                        "invalidations": s.invalidations,
                        "layers_changed": s.layers_changed,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}
