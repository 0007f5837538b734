//! JSONL replay source
//!
//! Reads one swap event per line, for dry runs against captured feeds or
//! events piped in on stdin by a transport collaborator.

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

use super::SwapEventSource;
use crate::error::{Error, Result};
use crate::market::SwapEvent;

#[derive(Debug)]
pub struct ReplaySource<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl ReplaySource<BufReader<File>> {
    pub async fn open(path: &str) -> Result<Self> {
        let file = File::open(path)
            .await
            .map_err(|e| Error::Io(format!("cannot open feed {path}: {e}")))?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }
}

impl ReplaySource<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            line_no: 0,
        }
    }
}

#[async_trait]
impl<R> SwapEventSource for ReplaySource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_event(&mut self) -> Result<Option<SwapEvent>> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| Error::Io(e.to_string()))?;
            self.line_no += 1;

            match line {
                None => return Ok(None),
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => {
                    return serde_json::from_str(line.trim()).map(Some).map_err(|e| {
                        Error::FeedDecode {
                            line: self.line_no,
                            reason: e.to_string(),
                        }
                    });
                }
            }
        }
    }
}
