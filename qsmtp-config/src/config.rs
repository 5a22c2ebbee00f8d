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
#![allow(clippy::module_name_repetitions)]
#![allow(missing_docs)]
use qsmtp_common::{code::SMTPReplyCode, re::log};

///
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ConfigServer,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigServer {
    /// name announced in the greeting and the EHLO reply
    #[serde(default = "ConfigServer::hostname")]
    pub domain: String,
    /// -1 for unlimited
    #[serde(default = "ConfigServer::default_client_count_max")]
    pub client_count_max: i64,
    #[serde(default)]
    pub interfaces: ConfigServerInterfaces,
    #[serde(default)]
    pub logs: ConfigServerLogs,
    #[serde(default)]
    pub queue: ConfigServerQueue,
    #[serde(default)]
    pub tls: ConfigServerTls,
    #[serde(default)]
    pub smtp: ConfigServerSMTP,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigServerInterfaces {
    /// plain text listeners, upgraded with STARTTLS
    #[serde(
        default = "ConfigServerInterfaces::default_addr_submission",
        deserialize_with = "crate::parser::socket_addr::deserialize"
    )]
    pub addr_submission: Vec<std::net::SocketAddr>,
    /// implicit TLS listeners
    #[serde(default, deserialize_with = "crate::parser::socket_addr::deserialize")]
    pub addr_submissions: Vec<std::net::SocketAddr>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigServerLogs {
    /// when not set, the logs are only written to the console
    #[serde(default)]
    pub filepath: Option<std::path::PathBuf>,
    #[serde(default = "ConfigServerLogs::default_format")]
    pub format: String,
    #[serde(default = "ConfigServerLogs::default_level")]
    pub level: std::collections::BTreeMap<String, log::LevelFilter>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigServerQueue {
    #[serde(default = "ConfigServerQueue::default_dirpath")]
    pub dirpath: std::path::PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigServerTls {
    #[serde(default)]
    pub preempt_cipherlist: bool,
    #[serde(
        default = "ConfigServerTls::default_handshake_timeout",
        with = "humantime_serde"
    )]
    pub handshake_timeout: std::time::Duration,
    #[serde(
        default = "ConfigServerTls::default_protocol_version",
        serialize_with = "crate::parser::tls_protocol_version::serialize",
        deserialize_with = "crate::parser::tls_protocol_version::deserialize"
    )]
    pub protocol_version: Vec<rustls::ProtocolVersion>,
    /// PEM file, the first certificate is the leaf and the rest its chain
    #[serde(default = "ConfigServerTls::default_certificate")]
    pub certificate: std::path::PathBuf,
    /// PEM file
    #[serde(default = "ConfigServerTls::default_private_key")]
    pub private_key: std::path::PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigServerSMTPError {
    /// -1 for unlimited
    pub soft_count: i64,
    /// -1 for unlimited
    pub hard_count: i64,
    #[serde(with = "humantime_serde")]
    pub delay: std::time::Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigServerSMTPTimeoutClient {
    #[serde(with = "humantime_serde")]
    pub connect: std::time::Duration,
    #[serde(with = "humantime_serde")]
    pub helo: std::time::Duration,
    #[serde(with = "humantime_serde")]
    pub auth: std::time::Duration,
    #[serde(with = "humantime_serde")]
    pub mail_from: std::time::Duration,
    #[serde(with = "humantime_serde")]
    pub rcpt_to: std::time::Duration,
    #[serde(with = "humantime_serde")]
    pub data: std::time::Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigServerSMTPAuth {
    /// flat file of `username:password` lines
    #[serde(default = "ConfigServerSMTPAuth::default_credentials")]
    pub credentials: std::path::PathBuf,
    /// allow PLAIN and LOGIN on a connection without TLS
    #[serde(default = "ConfigServerSMTPAuth::default_enable_dangerous_mechanism_in_clair")]
    pub enable_dangerous_mechanism_in_clair: bool,
    /// -1 for unlimited
    #[serde(default = "ConfigServerSMTPAuth::default_attempt_count_max")]
    pub attempt_count_max: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigServerSMTP {
    #[serde(default = "ConfigServerSMTP::default_rcpt_count_max")]
    pub rcpt_count_max: usize,
    /// bytes of message content accepted, dot-stuffing removed
    #[serde(default = "ConfigServerSMTP::default_message_size_max")]
    pub message_size_max: usize,
    #[serde(default)]
    pub error: ConfigServerSMTPError,
    #[serde(default)]
    pub timeout_client: ConfigServerSMTPTimeoutClient,
    #[serde(default)]
    pub codes: Codes,
    #[serde(default)]
    pub auth: ConfigServerSMTPAuth,
}

/// Text of every reply sent by the receiver
///
/// Entries provided by the configuration override the default ones,
/// `{domain}` is replaced by `server.domain` when the reply is sent.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(from = "std::collections::BTreeMap<SMTPReplyCode, String>")]
#[serde(into = "std::collections::BTreeMap<SMTPReplyCode, String>")]
pub struct Codes {
    pub(crate) codes: std::collections::BTreeMap<SMTPReplyCode, String>,
}

impl Codes {
    /// return the message associated with a [SMTPReplyCode].
    #[must_use]
    pub fn get(&self, code: SMTPReplyCode) -> &str {
        self.codes
            .get(&code)
            .map_or_else(|| Self::default_text(code), String::as_str)
    }
}

impl From<std::collections::BTreeMap<SMTPReplyCode, String>> for Codes {
    fn from(overridden: std::collections::BTreeMap<SMTPReplyCode, String>) -> Self {
        let mut out = Self::default();
        out.codes.extend(overridden);
        out
    }
}

impl From<Codes> for std::collections::BTreeMap<SMTPReplyCode, String> {
    fn from(this: Codes) -> Self {
        this.codes
    }
}
