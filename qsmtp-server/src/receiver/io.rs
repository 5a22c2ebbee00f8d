/*
 * qSMTP submission server
 * Copyright (C) 2022 viridIT SAS
 *
 * This program is free software: you can redistribute it and/or modify it under
 * the terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or any later version.
 *
 * This program is distributed in the hope that it will be useful, but WITHOUT
 * ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
 * FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * this program. If not, see https://www.gnu.org/licenses/.
 *
*/
use qsmtp_common::event::TEXT_LINE_MAX_LENGTH;

/// Longest line kept in memory, CRLF included. Longer lines are truncated to
/// this length (and thus rejected by the parser) and the rest is discarded.
const LINE_MAX_LENGTH: usize = TEXT_LINE_MAX_LENGTH + 4;
const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(500);

/// Line oriented reader over a bidirectional stream
///
/// Writes go directly to the underlying stream.
#[derive(Debug)]
pub struct AbstractIO<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin,
{
    ///
    pub inner: tokio::io::BufReader<S>,
}

impl<S> AbstractIO<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin,
{
    ///
    pub fn new(stream: S) -> Self {
        Self {
            inner: tokio::io::BufReader::new(stream),
        }
    }

    /// Give back the stream, the bytes already buffered are dropped
    pub fn into_inner(self) -> S {
        self.inner.into_inner()
    }

    /// Read the next line, without its CRLF (or LF)
    ///
    /// Return `None` when the peer closed the stream.
    ///
    /// # Errors
    ///
    /// * the timeout elapsed (with [std::io::ErrorKind::TimedOut])
    /// * stream's error
    pub async fn next_line(
        &mut self,
        timeout: Option<std::time::Duration>,
    ) -> std::io::Result<Option<Vec<u8>>> {
        tokio::time::timeout(timeout.unwrap_or(DEFAULT_TIMEOUT), self.read_line())
            .await
            .map_err(|t| std::io::Error::new(std::io::ErrorKind::TimedOut, t))?
    }

    async fn read_line(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        let mut line = Vec::with_capacity(128);

        let read = tokio::io::AsyncBufReadExt::read_until(
            &mut tokio::io::AsyncReadExt::take(&mut self.inner, LINE_MAX_LENGTH as u64),
            b'\n',
            &mut line,
        )
        .await?;

        if read == 0 {
            return Ok(None);
        }

        match line.last() {
            Some(b'\n') => {
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                Ok(Some(line))
            }
            _ if read == LINE_MAX_LENGTH => {
                self.discard_until_eol().await?;
                Ok(Some(line))
            }
            // stream closed in the middle of a line
            _ => Ok(None),
        }
    }

    async fn discard_until_eol(&mut self) -> std::io::Result<()> {
        loop {
            let available = tokio::io::AsyncBufReadExt::fill_buf(&mut self.inner).await?;
            if available.is_empty() {
                return Ok(());
            }
            match available.iter().position(|b| *b == b'\n') {
                Some(i) => {
                    tokio::io::AsyncBufReadExt::consume(&mut self.inner, i + 1);
                    return Ok(());
                }
                None => {
                    let len = available.len();
                    tokio::io::AsyncBufReadExt::consume(&mut self.inner, len);
                }
            }
        }
    }
}
