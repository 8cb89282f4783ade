use super::command::LedgerCommand;
use crate::error::{LedgerError, Result};
use std::io::Read;

/// Reads ledger commands from a CSV source.
///
/// Wraps `csv::Reader`, trimming whitespace and accepting rows that omit
/// trailing columns they do not use.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    /// Creates a new `CommandReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes commands, one `Result` per row, so a malformed row
    /// does not stop the stream.
    pub fn commands(self) -> impl Iterator<Item = Result<LedgerCommand>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}
