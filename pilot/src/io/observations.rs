//! Observation sources and input sinks for the control loop.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use crate::core::observation::Observation;
use crate::core::types::Action;

/// Produces one observation per step; `None` ends the loop.
pub trait ObservationSource {
    fn next_observation(&mut self) -> Result<Option<Observation>>;
}

/// Executes committed actions against the game.
pub trait InputSink {
    fn press(&mut self, action: Action) -> Result<()>;
}

/// Reads one JSON observation per line. Blank lines are ignored and lines
/// that are not an observation object are skipped with a warning.
pub struct JsonlObservations<R> {
    reader: R,
    line_no: usize,
}

impl JsonlObservations<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> JsonlObservations<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, line_no: 0 }
    }
}

impl<R: BufRead> ObservationSource for JsonlObservations<R> {
    fn next_observation(&mut self) -> Result<Option<Observation>> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .with_context(|| format!("read observation line {}", self.line_no + 1))?;
            if read == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Observation>(&line) {
                Ok(obs) => return Ok(Some(obs)),
                Err(err) => warn!(line = self.line_no, err = %err, "skipping malformed observation"),
            }
        }
    }
}

/// Writes one token per line.
pub struct StdoutSink<W> {
    out: W,
}

impl StdoutSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl<W: Write> StdoutSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> InputSink for StdoutSink<W> {
    fn press(&mut self, action: Action) -> Result<()> {
        writeln!(self.out, "{}", action.as_str()).context("write action")?;
        self.out.flush().context("flush action")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Button, Position};

    #[test]
    fn reads_observations_and_skips_bad_lines() {
        let input = "{\"state\":{\"player\":{\"position\":{\"x\":1,\"y\":2}}}}\n\n42\n{\"flags\":{\"in_battle\":true}}\n";
        let mut source = JsonlObservations::new(input.as_bytes());
        let first = source.next_observation().expect("read").expect("obs");
        assert_eq!(first.position(), Some(Position::new(1, 2)));
        let second = source.next_observation().expect("read").expect("obs");
        assert!(second.flags.battle);
        assert!(source.next_observation().expect("read").is_none());
    }

    #[test]
    fn sink_prints_tokens() {
        let mut sink = StdoutSink::new(Vec::new());
        sink.press(Action::Press(Button::Up)).expect("press");
        sink.press(Action::Wait).expect("press");
        assert_eq!(String::from_utf8(sink.into_inner()).expect("utf8"), "UP\nWAIT\n");
    }
}
