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
use self::{
    auth_exchange::{on_authentication, AuthExchangeError},
    transaction::{Transaction, TransactionResult},
};
use crate::{auth::Backend, session::Session};
use qsmtp_common::{
    code::SMTPReplyCode,
    re::{anyhow, log},
};
use qsmtp_config::{log_channel, re::rustls};

mod auth_exchange;
mod connection;
mod io;
mod transaction;

pub use connection::{Connection, ConnectionKind};
pub use io::AbstractIO;

#[cfg(test)]
mod tests;

/// boilerplate for the tests
#[cfg(test)]
pub mod test_helpers;

/// Why the command loop stopped
enum Outcome {
    Closed,
    TlsUpgrade,
}

/// Receives the incoming mails of a connection
///
/// A [ConnectionKind::Tunneled] connection starts with the TLS handshake,
/// the other ones may be upgraded with STARTTLS.
///
/// # Errors
///
/// * server failed to send a message
/// * the client timed-out or made too many errors
/// * the TLS handshake failed
pub async fn handle_connection<S, B>(
    mut conn: Connection<S>,
    tls_config: Option<std::sync::Arc<rustls::ServerConfig>>,
    backend: std::sync::Arc<B>,
) -> anyhow::Result<()>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Sync + Unpin,
    B: Backend,
{
    if let ConnectionKind::Tunneled = conn.kind {
        return handle_connection_secured(conn, tls_config, backend).await;
    }

    conn.send_code(SMTPReplyCode::Greetings).await?;

    match serve(&mut conn, tls_config.is_some(), backend.as_ref()).await? {
        Outcome::Closed => Ok(()),
        Outcome::TlsUpgrade => handle_connection_secured(conn, tls_config, backend).await,
    }
}

async fn handle_connection_secured<S, B>(
    conn: Connection<S>,
    tls_config: Option<std::sync::Arc<rustls::ServerConfig>>,
    backend: std::sync::Arc<B>,
) -> anyhow::Result<()>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Sync + Unpin,
    B: Backend,
{
    let tls_config = tls_config.ok_or_else(|| {
        anyhow::anyhow!("server accepted tls encrypted transaction, but no tls config provided")
    })?;

    let mut secured_conn = conn.upgrade_tls(tls_config).await?;

    if let ConnectionKind::Tunneled = secured_conn.kind {
        secured_conn.send_code(SMTPReplyCode::Greetings).await?;
    }

    match serve(&mut secured_conn, true, backend.as_ref()).await? {
        Outcome::Closed => Ok(()),
        Outcome::TlsUpgrade => anyhow::bail!("tls upgrade requested on a secured connection"),
    }
}

/// Command loop shared by the connections in clear and under TLS
///
/// The session opened by AUTH lives as long as this loop, it is closed
/// with [Session::logout] when the client leaves.
async fn serve<S, B>(
    conn: &mut Connection<S>,
    tls_available: bool,
    backend: &B,
) -> anyhow::Result<Outcome>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Sync + Unpin,
    B: Backend,
{
    let mut helo_domain = None;
    let mut session: Option<B::Session> = None;

    let result = serve_inner(conn, tls_available, backend, &mut helo_domain, &mut session).await;

    if let Some(mut session) = session {
        if let Err(e) = session.logout().await {
            log::warn!(target: log_channel::TRANSACTION, "logout failed: {e}");
        }
    }

    result
}

async fn serve_inner<S, B>(
    conn: &mut Connection<S>,
    tls_available: bool,
    backend: &B,
    helo_domain: &mut Option<String>,
    session: &mut Option<B::Session>,
) -> anyhow::Result<Outcome>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Sync + Unpin,
    B: Backend,
{
    while conn.is_alive {
        match Transaction::receive(conn, helo_domain, backend, session, tls_available).await? {
            TransactionResult::Nothing => {}
            TransactionResult::Mail(body) => on_mail(conn, session, body).await?,
            TransactionResult::TlsUpgrade => return Ok(Outcome::TlsUpgrade),
            TransactionResult::Authentication(mechanism, initial_response) => {
                match on_authentication(conn, backend, mechanism, initial_response).await {
                    Ok(authenticated) => {
                        conn.is_authenticated = true;
                        *session = Some(authenticated);
                    }
                    Err(AuthExchangeError::Timeout(e)) => {
                        conn.send_code(SMTPReplyCode::Code451Timeout).await?;
                        anyhow::bail!(e);
                    }
                    Err(AuthExchangeError::Other(e)) => anyhow::bail!(e),
                    Err(AuthExchangeError::MustBeEncrypted) => {
                        conn.send_code(SMTPReplyCode::AuthMechanismMustBeEncrypted)
                            .await?;
                    }
                    Err(AuthExchangeError::ClientMustNotStart) => {
                        conn.send_code(SMTPReplyCode::AuthClientMustNotStart)
                            .await?;
                    }
                    Err(error) => {
                        conn.authentication_attempt += 1;

                        let retries_max = conn.config.server.smtp.auth.attempt_count_max;
                        if retries_max != -1 && conn.authentication_attempt > retries_max {
                            conn.send_code(SMTPReplyCode::AuthRequired).await?;
                            anyhow::bail!("Auth: Attempt max {} reached", retries_max);
                        }

                        log::warn!(
                            target: log_channel::AUTH,
                            "authentication of '{}' did not succeed: {error:?}",
                            conn.client_addr
                        );

                        conn.send_code(match error {
                            AuthExchangeError::Canceled => SMTPReplyCode::AuthClientCanceled,
                            AuthExchangeError::InvalidBase64 => SMTPReplyCode::AuthErrorDecode64,
                            _ => SMTPReplyCode::AuthInvalidCredentials,
                        })
                        .await?;
                    }
                }
            }
        }
    }

    Ok(Outcome::Closed)
}

/// Hand the message to the session and reply
///
/// A failure of the session is reported to the client, the connection stays open.
async fn on_mail<S, T>(
    conn: &mut Connection<S>,
    session: &mut Option<T>,
    body: Vec<u8>,
) -> anyhow::Result<()>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Sync + Unpin,
    T: Session,
{
    let result = match session.as_mut() {
        Some(session) => {
            let mut reader = body.as_slice();
            session.data(&mut reader).await
        }
        None => Err(anyhow::anyhow!("message received without session")),
    };

    match result {
        Ok(()) => conn.send_code(SMTPReplyCode::Code250).await,
        Err(e) => {
            log::error!(
                target: log_channel::TRANSACTION,
                "message from '{}' not stored: {e:#}",
                conn.client_addr
            );
            conn.send_code(SMTPReplyCode::Code451).await
        }
    }
}
