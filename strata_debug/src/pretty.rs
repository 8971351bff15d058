// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr).

use std::io::Write;

use strata_core::trace::{
    AssignBeginEvent, AssignSummary, SquashBoundsEvent, SquashingDisallowedEvent,
    SquashingFinishedEvent, TraceSink, TransitionEvent,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    squash_bounds: bool,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("squash_bounds", &self.squash_bounds)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self::with_writer(writer)
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer,
            squash_bounds: false,
        }
    }

    /// Also prints a line for every squashed layer's accumulated bounds.
    #[must_use]
    pub fn with_squash_bounds(mut self, enabled: bool) -> Self {
        self.squash_bounds = enabled;
        self
    }

    /// Consumes the sink and returns the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_assign_begin(&mut self, e: &AssignBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[assign:begin] pass={} root={} squashing={}",
            e.pass,
            e.root,
            if e.squashing_enabled { "on" } else { "off" },
        );
    }

    fn on_transition(&mut self, e: &TransitionEvent) {
        let _ = writeln!(
            self.writer,
            "[transition] pass={} {} {:?}{}",
            e.pass,
            e.layer,
            e.transition,
            if e.backing_changed {
                " (backing changed)"
            } else {
                ""
            },
        );
    }

    fn on_squashing_disallowed(&mut self, e: &SquashingDisallowedEvent) {
        match e.owner {
            Some(owner) => {
                let _ = writeln!(
                    self.writer,
                    "[squash:reject] pass={} {} owner={owner} reasons={}",
                    e.pass, e.layer, e.reasons,
                );
            }
            None => {
                let _ = writeln!(
                    self.writer,
                    "[squash:reject] pass={} {} owner=- reasons={}",
                    e.pass, e.layer, e.reasons,
                );
            }
        }
    }

    fn on_squashing_finished(&mut self, e: &SquashingFinishedEvent) {
        let _ = writeln!(
            self.writer,
            "[squash:finish] pass={} backing=B{} owner={} members={}",
            e.pass,
            e.backing.index(),
            e.owner,
            e.member_count,
        );
    }

    fn on_assign_end(&mut self, s: &AssignSummary) {
        let _ = writeln!(
            self.writer,
            "[summary] pass={} visited={} allocated={} removed={} squashed={} \
             unsquashed={} disallowed={} invalidations={} changed={}",
            s.pass,
            s.visited,
            s.allocated,
            s.removed,
            s.squashed,
            s.unsquashed,
            s.disallowed,
            s.invalidations,
            s.layers_changed,
        );
    }

    fn on_squash_bounds(&mut self, e: &SquashBoundsEvent) {
        if !self.squash_bounds {
            return;
        }
        let r = e.bounding_rect;
        let _ = writeln!(
            self.writer,
            "[squash:bounds] pass={} backing=B{} index={} rect=({}, {}, {}, {}) area={}",
            e.pass,
            e.backing.index(),
            e.index,
            r.x0,
            r.y0,
            r.x1,
            r.y1,
            e.total_area,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{record_pass, squashing_scene};

    fn print_pass(sink: PrettyPrintSink<Vec<u8>>, video: Option<usize>) -> String {
        let mut scene = squashing_scene();
        if let Some(i) = video {
            scene.make_video(i);
        }
        let mut sink = sink;
        record_pass(&mut scene, &mut sink);
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn one_line_per_event() {
        let output = print_pass(PrettyPrintSink::with_writer(Vec::new()), None);
        let lines: Vec<&str> = output.lines().collect();
        // begin, 2 allocations, 3 squashes, 2 finishes, summary
        assert_eq!(lines.len(), 9, "got: {output}");
        assert!(lines[0].starts_with("[assign:begin] pass=0"), "got: {output}");
        assert!(lines[0].contains("squashing=on"), "got: {output}");
        assert!(lines[8].starts_with("[summary]"), "got: {output}");
        assert!(lines[8].contains("squashed=3"), "got: {output}");
    }

    #[test]
    fn transitions_name_the_layer() {
        let output = print_pass(PrettyPrintSink::with_writer(Vec::new()), None);
        assert!(
            output.contains("AllocateOwnBacking (backing changed)"),
            "got: {output}"
        );
        assert!(output.contains("PutInSquashingLayer\n"), "got: {output}");
        assert!(output.contains("members=3"), "got: {output}");
    }

    #[test]
    fn rejections_list_reasons() {
        let output = print_pass(PrettyPrintSink::with_writer(Vec::new()), Some(0));
        let line = output
            .lines()
            .find(|l| l.starts_with("[squash:reject]"))
            .unwrap_or_else(|| panic!("no rejection in: {output}"));
        assert!(line.ends_with("reasons=VIDEO"), "got: {line}");
    }

    #[test]
    fn squash_bounds_are_opt_in() {
        let quiet = print_pass(PrettyPrintSink::with_writer(Vec::new()), None);
        assert!(!quiet.contains("[squash:bounds]"), "got: {quiet}");

        let verbose = print_pass(
            PrettyPrintSink::with_writer(Vec::new()).with_squash_bounds(true),
            None,
        );
        assert_eq!(verbose.matches("[squash:bounds]").count(), 3, "got: {verbose}");
        assert!(
            verbose.contains("rect=(0, 0, 30, 10) area=300"),
            "got: {verbose}"
        );
    }
}
