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
use crate::mechanism::Mechanism;

/// Where a connection stands in the command sequence
///
/// The display form is the name used in the logs of the receiver.
#[derive(Debug, Eq, PartialEq, Clone, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[allow(clippy::module_name_repetitions)]
pub enum StateSMTP {
    /// Greeting sent, no HELO yet
    Connect,
    /// Client identified, no transaction open
    Helo,
    /// STARTTLS accepted, the handshake comes next
    #[strum(serialize = "starttls")]
    NegotiationTLS,
    /// SASL exchange to run, with the initial response if any
    #[strum(serialize = "auth")]
    Authentication(Mechanism, Option<Vec<u8>>),
    /// Sender accepted
    #[strum(serialize = "mail")]
    MailFrom,
    /// At least one recipient accepted
    #[strum(serialize = "rcpt")]
    RcptTo,
    /// Reading the message content
    Data,
    /// QUIT received or the connection must close
    Stop,
}
