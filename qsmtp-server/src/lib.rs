//! qSMTP server

#![doc(html_no_source)]
#![deny(missing_docs)]
//
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
//
#![allow(clippy::doc_markdown)]

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

mod receiver;
mod runtime;
mod server;

/// SMTP auth extension implementation
pub mod auth;
/// flat file of users
pub mod credentials;
/// storage of the messages received
pub mod queue;
/// envelope of the authenticated clients
pub mod session;

pub use auth::{AuthError, Backend, QueueBackend};
pub use receiver::{handle_connection, AbstractIO, Connection, ConnectionKind};
pub use runtime::{bind_sockets, start_runtime};
pub use server::Server;
pub use session::{QueueSession, Session};

/// re-exported module
pub mod re {
    pub use tokio;
    pub use tokio_rustls;
}
