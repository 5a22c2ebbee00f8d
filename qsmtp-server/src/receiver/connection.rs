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
use super::io::AbstractIO;
use qsmtp_common::{
    code::SMTPReplyCode,
    re::{anyhow, log},
};
use qsmtp_config::{log_channel::RECEIVER, re::rustls, Config};

/// Interface a client connected to
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionKind {
    /// `addr_submission`, clear until STARTTLS
    Submission,
    /// `addr_submissions`, TLS from the first byte
    Tunneled,
}

/// A client of the receiver
///
/// The error and AUTH attempt counters belong to the client, not to the
/// stream: they are carried over by [Connection::upgrade_tls].
pub struct Connection<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin,
{
    ///
    pub kind: ConnectionKind,
    ///
    pub config: std::sync::Arc<Config>,
    ///
    pub client_addr: std::net::SocketAddr,
    /// false once QUIT is received or the stream is over
    pub is_alive: bool,
    ///
    pub is_secured: bool,
    /// a login of the backend succeeded on this stream
    pub is_authenticated: bool,
    /// error replies sent so far
    pub error_count: i64,
    /// AUTH exchanges which failed or were canceled
    pub authentication_attempt: i64,
    ///
    pub inner: AbstractIO<S>,
}

impl<S> Connection<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin,
{
    /// Wrap a stream just accepted
    pub fn new(
        kind: ConnectionKind,
        client_addr: std::net::SocketAddr,
        config: std::sync::Arc<Config>,
        inner: S,
    ) -> Self {
        Self {
            kind,
            config,
            client_addr,
            is_alive: true,
            is_secured: false,
            is_authenticated: false,
            error_count: 0,
            authentication_attempt: 0,
            inner: AbstractIO::new(inner),
        }
    }

    /// Run the server side of the TLS handshake on the stream, bounded by
    /// `server.tls.handshake_timeout`
    ///
    /// The connection comes back secured and not authenticated.
    ///
    /// # Errors
    ///
    /// * the handshake failed
    /// * the handshake timed out ([std::io::ErrorKind::TimedOut])
    pub async fn upgrade_tls(
        self,
        tls_config: std::sync::Arc<rustls::ServerConfig>,
    ) -> std::io::Result<Connection<tokio_rustls::server::TlsStream<S>>> {
        let acceptor = tokio_rustls::TlsAcceptor::from(tls_config);
        let stream = tokio::time::timeout(
            self.config.server.tls.handshake_timeout,
            acceptor.accept(self.inner.into_inner()),
        )
        .await
        .map_err(|elapsed| std::io::Error::new(std::io::ErrorKind::TimedOut, elapsed))??;

        log::debug!(
            target: RECEIVER,
            "tls handshake completed with '{}'",
            self.client_addr
        );

        Ok(Connection {
            kind: self.kind,
            config: self.config,
            client_addr: self.client_addr,
            is_alive: true,
            is_secured: true,
            is_authenticated: false,
            error_count: self.error_count,
            authentication_attempt: self.authentication_attempt,
            inner: AbstractIO::new(stream),
        })
    }

    fn reply_text(&self, code: SMTPReplyCode) -> String {
        self.config
            .server
            .smtp
            .codes
            .get(code)
            .replace("{domain}", &self.config.server.domain)
    }

    /// Send the reply configured for `code`
    ///
    /// Error replies are counted. From `smtp.error.soft_count` on, each one is
    /// followed by `smtp.error.delay`. At `smtp.error.hard_count` the reply is
    /// sent as a continuation of the 451 closing line and an error is returned.
    ///
    /// # Errors
    ///
    /// * the stream cannot be written
    /// * `smtp.error.hard_count` is reached
    pub async fn send_code(&mut self, code: SMTPReplyCode) -> anyhow::Result<()> {
        log::info!(target: RECEIVER, "sending code=\"{code:?}\"");

        let mut reply = self.reply_text(code);
        if !code.is_error() {
            return self.send(&reply).await;
        }

        self.error_count += 1;
        let limits = &self.config.server.smtp.error;
        let soft_reached = limits.soft_count != -1 && self.error_count >= limits.soft_count;
        let hard_reached = limits.hard_count != -1 && self.error_count >= limits.hard_count;
        let delay = limits.delay;

        if hard_reached {
            // "NNN text" becomes "NNN-text", the 451 line ends the reply
            if reply.is_char_boundary(3) && reply.is_char_boundary(4) {
                reply.replace_range(3..4, "-");
            }
            reply.push_str(&self.reply_text(SMTPReplyCode::Code451TooManyError));
            self.send(&reply).await?;

            anyhow::bail!(
                "{} errors from '{}', closing the connection",
                self.error_count,
                self.client_addr
            )
        }

        self.send(&reply).await?;
        if soft_reached {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    /// Write `reply` as is and flush
    ///
    /// # Errors
    ///
    /// * the stream cannot be written
    pub async fn send(&mut self, reply: &str) -> anyhow::Result<()> {
        log::trace!(target: RECEIVER, "send=\"{:?}\"", reply);
        let stream = self.inner.inner.get_mut();
        tokio::io::AsyncWriteExt::write_all(&mut *stream, reply.as_bytes()).await?;
        tokio::io::AsyncWriteExt::flush(&mut *stream).await?;
        Ok(())
    }

    /// Next line sent by the client, CRLF removed, `None` once the stream is over
    ///
    /// # Errors
    ///
    /// * nothing received within `timeout` ([std::io::ErrorKind::TimedOut])
    /// * the stream cannot be read
    pub async fn read(
        &mut self,
        timeout: std::time::Duration,
    ) -> std::io::Result<Option<Vec<u8>>> {
        self.inner.next_line(Some(timeout)).await
    }
}
