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
use super::connection::Connection;
use crate::auth::Backend;
use qsmtp_common::{
    code::SMTPReplyCode,
    mechanism::Mechanism,
    re::{anyhow, base64, log},
};
use qsmtp_config::log_channel;

/// Result of the AUTH exchange
#[derive(Debug)]
pub enum AuthExchangeError {
    /// authentication invalid
    Failed,
    /// the client stopped the exchange
    Canceled,
    /// timeout of the server
    Timeout(std::io::Error),
    /// the client sent a response which is not base64
    InvalidBase64,
    /// the mechanism cannot be used on a connection in clear
    MustBeEncrypted,
    /// the mechanism does not accept an initial response
    ClientMustNotStart,
    /// the connection failed
    Other(anyhow::Error),
}

/// `Username:` and `Password:` challenges of the LOGIN mechanism
const LOGIN_USERNAME: &str = "334 VXNlcm5hbWU6\r\n";
const LOGIN_PASSWORD: &str = "334 UGFzc3dvcmQ6\r\n";

fn decode(buffer: &[u8]) -> Result<Vec<u8>, AuthExchangeError> {
    match buffer {
        b"*" => Err(AuthExchangeError::Canceled),
        // https://datatracker.ietf.org/doc/html/rfc4954#section-4
        b"=" => Ok(vec![]),
        _ => base64::decode(buffer).map_err(|_| AuthExchangeError::InvalidBase64),
    }
}

async fn read_response<S>(conn: &mut Connection<S>) -> Result<Vec<u8>, AuthExchangeError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin,
{
    let timeout = conn.config.server.smtp.timeout_client.auth;
    match conn.read(timeout).await {
        Ok(Some(buffer)) => decode(&buffer),
        Ok(None) => Err(AuthExchangeError::Other(anyhow::anyhow!("eof"))),
        Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Err(AuthExchangeError::Timeout(e)),
        Err(e) => Err(AuthExchangeError::Other(anyhow::Error::new(e))),
    }
}

async fn challenge<S>(conn: &mut Connection<S>, reply: &str) -> Result<Vec<u8>, AuthExchangeError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin,
{
    conn.send(reply).await.map_err(AuthExchangeError::Other)?;
    read_response(conn).await
}

/// `[authzid] NUL authcid NUL passwd`, see https://datatracker.ietf.org/doc/html/rfc4616
fn parse_plain(message: &[u8]) -> Option<(String, String)> {
    let mut parts = message.split(|b| *b == 0);
    let (authzid, authcid, passwd) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || authcid.is_empty() {
        return None;
    }
    // acting on behalf of another identity is not supported
    if !authzid.is_empty() && authzid != authcid {
        return None;
    }

    Some((
        String::from_utf8(authcid.to_vec()).ok()?,
        String::from_utf8(passwd.to_vec()).ok()?,
    ))
}

async fn get_credentials<S>(
    conn: &mut Connection<S>,
    mechanism: Mechanism,
    initial_response: Option<Vec<u8>>,
) -> Result<(String, String), AuthExchangeError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin,
{
    match mechanism {
        Mechanism::Plain => {
            let message = match initial_response {
                Some(initial_response) => decode(&initial_response)?,
                None => challenge(conn, "334 \r\n").await?,
            };
            parse_plain(&message).ok_or(AuthExchangeError::Failed)
        }
        Mechanism::Login => {
            let username = challenge(conn, LOGIN_USERNAME).await?;
            let password = challenge(conn, LOGIN_PASSWORD).await?;
            Ok((
                String::from_utf8(username).map_err(|_| AuthExchangeError::Failed)?,
                String::from_utf8(password).map_err(|_| AuthExchangeError::Failed)?,
            ))
        }
    }
}

/// Run the SASL exchange and open a session with the credentials received
///
/// Reply `235` on success, the other replies are left to the caller.
///
/// # Errors
///
/// see [AuthExchangeError]
pub async fn on_authentication<S, B>(
    conn: &mut Connection<S>,
    backend: &B,
    mechanism: Mechanism,
    initial_response: Option<Vec<u8>>,
) -> Result<B::Session, AuthExchangeError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin,
    B: Backend,
{
    if mechanism.must_be_under_tls() && !conn.is_secured {
        if conn.config.server.smtp.auth.enable_dangerous_mechanism_in_clair {
            log::warn!(
                target: log_channel::AUTH,
                "An unsecured AUTH mechanism ({mechanism}) is used on a non-encrypted connection!"
            );
        } else {
            return Err(AuthExchangeError::MustBeEncrypted);
        }
    }

    if !mechanism.client_first() && initial_response.is_some() {
        return Err(AuthExchangeError::ClientMustNotStart);
    }

    let (username, password) = get_credentials(conn, mechanism, initial_response).await?;

    let session = backend
        .login(&username, &password)
        .await
        .map_err(|_| AuthExchangeError::Failed)?;

    conn.send_code(SMTPReplyCode::AuthSucceeded)
        .await
        .map_err(AuthExchangeError::Other)?;

    Ok(session)
}
