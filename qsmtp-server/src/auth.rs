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
use crate::{credentials::CredentialStore, queue::MailQueue, session::QueueSession};
use qsmtp_common::re::log;
use qsmtp_config::{log_channel::AUTH, Config};

/// Reason why no session was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// the client must (successfully) authenticate before sending mail
    AuthRequired,
}

impl std::error::Error for AuthError {}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthRequired => write!(f, "authentication required"),
        }
    }
}

/// Open sessions for the clients
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Session handed to the receiver once the client is identified
    type Session: crate::session::Session + 'static;

    /// The client completed an AUTH exchange with those credentials
    ///
    /// # Errors
    ///
    /// * the credentials are not valid
    async fn login(&self, username: &str, password: &str) -> Result<Self::Session, AuthError>;

    /// The client started a transaction without authenticating
    ///
    /// # Errors
    ///
    /// * anonymous submission is not allowed
    async fn anonymous_login(&self) -> Result<Self::Session, AuthError> {
        Err(AuthError::AuthRequired)
    }
}

/// [`Backend`] checking a [`CredentialStore`] and producing [`QueueSession`]
#[derive(Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct QueueBackend {
    credentials: CredentialStore,
    queue: MailQueue,
}

impl QueueBackend {
    ///
    #[must_use]
    pub const fn new(credentials: CredentialStore, queue: MailQueue) -> Self {
        Self { credentials, queue }
    }

    /// Use the credentials file and the queue directory of the configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            CredentialStore::new(&config.server.smtp.auth.credentials),
            MailQueue::new(&config.server.queue.dirpath),
        )
    }

    ///
    #[must_use]
    pub const fn queue(&self) -> &MailQueue {
        &self.queue
    }
}

#[async_trait::async_trait]
impl Backend for QueueBackend {
    type Session = QueueSession;

    async fn login(&self, username: &str, password: &str) -> Result<Self::Session, AuthError> {
        if self.credentials.verify(username, password) {
            log::info!(target: AUTH, "authentication succeeded for '{username}'");
            Ok(QueueSession::new(self.queue.clone()))
        } else {
            log::warn!(target: AUTH, "authentication failed for '{username}'");
            Err(AuthError::AuthRequired)
        }
    }

    async fn anonymous_login(&self) -> Result<Self::Session, AuthError> {
        log::warn!(target: AUTH, "anonymous submission refused");
        Err(AuthError::AuthRequired)
    }
}
