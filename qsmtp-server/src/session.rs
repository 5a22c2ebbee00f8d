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
use crate::queue::MailQueue;
use qsmtp_common::re::{anyhow, log};
use qsmtp_config::log_channel::TRANSACTION;

/// Per-message callbacks of an authenticated client
///
/// The receiver calls [`Session::mail`] once, [`Session::rcpt`] at least once
/// and then [`Session::data`] exactly once for each transaction. Several
/// transactions may happen on the same session.
#[async_trait::async_trait]
pub trait Session: Send {
    /// The client opened a transaction with `MAIL FROM:<address>`
    ///
    /// # Errors
    ///
    /// * the sender is refused
    async fn mail(&mut self, address: &str) -> anyhow::Result<()>;

    /// The client added a recipient with `RCPT TO:<address>`
    ///
    /// # Errors
    ///
    /// * the recipient is refused
    async fn rcpt(&mut self, address: &str) -> anyhow::Result<()>;

    /// The message content, dot-stuffing removed, lines ended by CRLF
    ///
    /// # Errors
    ///
    /// * the message cannot be read or stored
    async fn data(
        &mut self,
        body: &mut (dyn tokio::io::AsyncRead + Send + Unpin),
    ) -> anyhow::Result<()>;

    /// Forget the current transaction, the client stays authenticated
    async fn reset(&mut self);

    /// The connection is closing
    ///
    /// # Errors
    ///
    /// * implementation defined
    async fn logout(&mut self) -> anyhow::Result<()>;
}

/// Remove the whitespaces and angle brackets surrounding an address.
fn clean_address(address: &str) -> String {
    address
        .trim_matches(|c: char| c == ' ' || c == '<' || c == '>')
        .to_string()
}

/// [`Session`] storing every message in a [`MailQueue`]
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct QueueSession {
    queue: MailQueue,
    /// sender of the current transaction
    pub from: Option<String>,
    /// recipients of the current transaction, in the order received
    pub rcpt: Vec<String>,
}

impl QueueSession {
    ///
    #[must_use]
    pub const fn new(queue: MailQueue) -> Self {
        Self {
            queue,
            from: None,
            rcpt: Vec::new(),
        }
    }
}

#[async_trait::async_trait]
impl Session for QueueSession {
    async fn mail(&mut self, address: &str) -> anyhow::Result<()> {
        let from = clean_address(address);
        log::info!(target: TRANSACTION, "mail from: '{from}'");

        self.from = Some(from);
        self.rcpt.clear();
        Ok(())
    }

    async fn rcpt(&mut self, address: &str) -> anyhow::Result<()> {
        let rcpt = clean_address(address);
        log::info!(target: TRANSACTION, "rcpt to: '{rcpt}'");

        self.rcpt.push(rcpt);
        Ok(())
    }

    async fn data(
        &mut self,
        body: &mut (dyn tokio::io::AsyncRead + Send + Unpin),
    ) -> anyhow::Result<()> {
        let mut buffer = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(body, &mut buffer).await?;

        let filepath = self.queue.write(&buffer)?;
        log::info!(
            target: TRANSACTION,
            "message from '{}' to {:?} saved at '{}'",
            self.from.as_deref().unwrap_or_default(),
            self.rcpt,
            filepath.display()
        );

        Ok(())
    }

    async fn reset(&mut self) {
        self.from = None;
        self.rcpt.clear();
    }

    async fn logout(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
