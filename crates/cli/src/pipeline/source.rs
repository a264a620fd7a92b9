//! Newline-delimited JSON event reader

use std::path::Path;

use contracts::KubeEvent;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use crate::error::CliError;

/// Reads one [`KubeEvent`] per input line
///
/// Blank lines are skipped. A line that does not decode is reported as
/// [`CliError::MalformedEvent`] and the reader stays usable.
pub struct EventReader<R> {
    lines: Lines<R>,
    line: u64,
}

impl EventReader<BufReader<Box<dyn tokio::io::AsyncRead + Send + Unpin>>> {
    /// Read from `path`, or stdin when `None`
    pub async fn open(path: Option<&Path>) -> Result<Self, CliError> {
        let input: Box<dyn tokio::io::AsyncRead + Send + Unpin> = match path {
            Some(path) => Box::new(tokio::fs::File::open(path).await?),
            None => Box::new(tokio::io::stdin()),
        };
        Ok(Self::new(BufReader::new(input)))
    }
}

impl<R: AsyncBufRead + Unpin> EventReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }

    /// Next event, `Ok(None)` at end of input
    pub async fn next_event(&mut self) -> Result<Option<KubeEvent>, CliError> {
        while let Some(line) = self.lines.next_line().await? {
            self.line += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return serde_json::from_str(trimmed)
                .map(Some)
                .map_err(|source| CliError::MalformedEvent {
                    line: self.line,
                    source,
                });
        }
        Ok(None)
    }

    /// Lines consumed so far
    pub fn lines_read(&self) -> u64 {
        self.line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_events_and_skips_blank_lines() {
        let input: &[u8] = b"{\"reason\":\"Pulled\",\"type\":\"Normal\"}\n\n   \n{\"reason\":\"BackOff\",\"type\":\"Warning\",\"count\":3}\n";
        let mut reader = EventReader::new(input);

        let first = reader.next_event().await.unwrap().unwrap();
        assert_eq!(first.reason, "Pulled");

        let second = reader.next_event().await.unwrap().unwrap();
        assert_eq!(second.event_type, "Warning");
        assert_eq!(second.count, 3);

        assert!(reader.next_event().await.unwrap().is_none());
        assert_eq!(reader.lines_read(), 4);
    }

    #[tokio::test]
    async fn test_malformed_line_is_recoverable() {
        let input: &[u8] = b"{\"reason\":\"A\"}\nnot json\n{\"reason\":\"B\"}";
        let mut reader = EventReader::new(input);

        assert_eq!(reader.next_event().await.unwrap().unwrap().reason, "A");

        let err = reader.next_event().await.unwrap_err();
        assert!(err.is_recoverable());
        assert!(matches!(err, CliError::MalformedEvent { line: 2, .. }));

        // Last line has no trailing newline
        assert_eq!(reader.next_event().await.unwrap().unwrap().reason, "B");
        assert!(reader.next_event().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let err = EventReader::open(Some(Path::new("/nonexistent/events.jsonl")))
            .await
            .err()
            .unwrap();
        assert!(!err.is_recoverable());
    }
}
