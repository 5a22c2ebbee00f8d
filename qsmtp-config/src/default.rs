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
use qsmtp_common::{code::SMTPReplyCode, re::log, re::strum, SUBMISSION_PORT};

use crate::config::{
    Codes, ConfigServer, ConfigServerInterfaces, ConfigServerLogs, ConfigServerQueue,
    ConfigServerSMTP, ConfigServerSMTPAuth, ConfigServerSMTPError, ConfigServerSMTPTimeoutClient,
    ConfigServerTls,
};

impl Default for ConfigServer {
    fn default() -> Self {
        Self {
            domain: Self::hostname(),
            client_count_max: Self::default_client_count_max(),
            interfaces: ConfigServerInterfaces::default(),
            logs: ConfigServerLogs::default(),
            queue: ConfigServerQueue::default(),
            tls: ConfigServerTls::default(),
            smtp: ConfigServerSMTP::default(),
        }
    }
}

impl ConfigServer {
    pub(crate) fn hostname() -> String {
        hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "localhost".to_string())
    }

    pub(crate) const fn default_client_count_max() -> i64 {
        16
    }
}

impl Default for ConfigServerInterfaces {
    fn default() -> Self {
        Self {
            addr_submission: Self::default_addr_submission(),
            addr_submissions: vec![],
        }
    }
}

impl ConfigServerInterfaces {
    pub(crate) fn default_addr_submission() -> Vec<std::net::SocketAddr> {
        vec![std::net::SocketAddr::new(
            std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
            SUBMISSION_PORT,
        )]
    }
}

impl Default for ConfigServerLogs {
    fn default() -> Self {
        Self {
            filepath: None,
            format: Self::default_format(),
            level: Self::default_level(),
        }
    }
}

impl ConfigServerLogs {
    pub(crate) fn default_format() -> String {
        "{d(%Y-%m-%d %H:%M:%S%.f)} {h({l:<5})} {t:<12} $ {m}{n}".to_string()
    }

    pub(crate) fn default_level() -> std::collections::BTreeMap<String, log::LevelFilter> {
        [("default".to_string(), log::LevelFilter::Info)]
            .into_iter()
            .collect()
    }
}

impl Default for ConfigServerQueue {
    fn default() -> Self {
        Self {
            dirpath: Self::default_dirpath(),
        }
    }
}

impl ConfigServerQueue {
    pub(crate) fn default_dirpath() -> std::path::PathBuf {
        "/var/mailqueue".into()
    }
}

impl Default for ConfigServerTls {
    fn default() -> Self {
        Self {
            preempt_cipherlist: false,
            handshake_timeout: Self::default_handshake_timeout(),
            protocol_version: Self::default_protocol_version(),
            certificate: Self::default_certificate(),
            private_key: Self::default_private_key(),
        }
    }
}

impl ConfigServerTls {
    pub(crate) const fn default_handshake_timeout() -> std::time::Duration {
        std::time::Duration::from_secs(1)
    }

    pub(crate) fn default_protocol_version() -> Vec<rustls::ProtocolVersion> {
        vec![
            rustls::ProtocolVersion::TLSv1_2,
            rustls::ProtocolVersion::TLSv1_3,
        ]
    }

    pub(crate) fn default_certificate() -> std::path::PathBuf {
        "/root/cert.pem".into()
    }

    pub(crate) fn default_private_key() -> std::path::PathBuf {
        "/root/key.pem".into()
    }
}

impl Default for ConfigServerSMTPError {
    fn default() -> Self {
        Self {
            soft_count: 10,
            hard_count: 20,
            delay: std::time::Duration::from_millis(5000),
        }
    }
}

impl Default for ConfigServerSMTPTimeoutClient {
    fn default() -> Self {
        Self {
            connect: std::time::Duration::from_secs(5 * 60),
            helo: std::time::Duration::from_secs(5 * 60),
            auth: std::time::Duration::from_secs(60),
            mail_from: std::time::Duration::from_secs(5 * 60),
            rcpt_to: std::time::Duration::from_secs(5 * 60),
            data: std::time::Duration::from_secs(10 * 60),
        }
    }
}

impl Default for ConfigServerSMTPAuth {
    fn default() -> Self {
        Self {
            credentials: Self::default_credentials(),
            enable_dangerous_mechanism_in_clair: Self::default_enable_dangerous_mechanism_in_clair(
            ),
            attempt_count_max: Self::default_attempt_count_max(),
        }
    }
}

impl ConfigServerSMTPAuth {
    pub(crate) fn default_credentials() -> std::path::PathBuf {
        "/root/users.txt".into()
    }

    pub(crate) const fn default_enable_dangerous_mechanism_in_clair() -> bool {
        false
    }

    pub(crate) const fn default_attempt_count_max() -> i64 {
        -1
    }
}

impl Default for ConfigServerSMTP {
    fn default() -> Self {
        Self {
            rcpt_count_max: Self::default_rcpt_count_max(),
            message_size_max: Self::default_message_size_max(),
            error: ConfigServerSMTPError::default(),
            timeout_client: ConfigServerSMTPTimeoutClient::default(),
            codes: Codes::default(),
            auth: ConfigServerSMTPAuth::default(),
        }
    }
}

impl ConfigServerSMTP {
    pub(crate) const fn default_rcpt_count_max() -> usize {
        1000
    }

    pub(crate) const fn default_message_size_max() -> usize {
        20 * 1024 * 1024
    }
}

impl Default for Codes {
    fn default() -> Self {
        Self {
            codes: <SMTPReplyCode as strum::IntoEnumIterator>::iter()
                .map(|code| (code, Self::default_text(code).to_string()))
                .collect(),
        }
    }
}

impl Codes {
    pub(crate) const fn default_text(code: SMTPReplyCode) -> &'static str {
        match code {
            SMTPReplyCode::Help => {
                "214 Commands: HELO EHLO STARTTLS AUTH MAIL RCPT DATA RSET NOOP QUIT\r\n"
            }
            SMTPReplyCode::Greetings => "220 {domain} Service ready\r\n",
            SMTPReplyCode::Code221 => "221 Service closing transmission channel\r\n",
            SMTPReplyCode::Code250 => "250 Ok\r\n",
            SMTPReplyCode::Code250PlainEsmtp => {
                "250-{domain}\r\n250-8BITMIME\r\n250-SMTPUTF8\r\n250 STARTTLS\r\n"
            }
            SMTPReplyCode::Code250SecuredEsmtp => {
                "250-{domain}\r\n250-8BITMIME\r\n250-SMTPUTF8\r\n250 AUTH PLAIN LOGIN\r\n"
            }
            SMTPReplyCode::Code354 => "354 Start mail input; end with <CRLF>.<CRLF>\r\n",
            SMTPReplyCode::Code451 => {
                "451 Requested action aborted: local error in processing\r\n"
            }
            SMTPReplyCode::Code451Timeout => "451 Timeout - closing connection.\r\n",
            SMTPReplyCode::Code451TooManyError => "451 Too many errors from the client\r\n",
            SMTPReplyCode::Code452TooManyRecipients => {
                "452 Requested action not taken: too many recipients\r\n"
            }
            SMTPReplyCode::Code454 => "454 TLS not available due to temporary reason\r\n",
            SMTPReplyCode::Code552MessageSizeExceeded => {
                "552 5.3.4 Message size exceeds fixed maximum message size\r\n"
            }
            SMTPReplyCode::Code500 => "500 Syntax error command unrecognized\r\n",
            SMTPReplyCode::Code501 => "501 Syntax error in parameters or arguments\r\n",
            SMTPReplyCode::Code502unimplemented => "502 Command not implemented\r\n",
            SMTPReplyCode::BadSequence => "503 Bad sequence of commands\r\n",
            SMTPReplyCode::Code504 => "504 Command parameter not implemented\r\n",
            SMTPReplyCode::TlsAlreadyUnderTls => "554 5.5.1 Error: TLS already active\r\n",
            SMTPReplyCode::ConnectionMaxReached => "554 Cannot process connection, closing.\r\n",
            SMTPReplyCode::AuthMechanismNotSupported => "504 5.5.4 Mechanism is not supported\r\n",
            SMTPReplyCode::AuthSucceeded => "235 2.7.0 Authentication succeeded\r\n",
            SMTPReplyCode::AuthMechanismMustBeEncrypted => {
                "538 5.7.11 Encryption required for requested authentication mechanism\r\n"
            }
            SMTPReplyCode::AuthClientMustNotStart => {
                "501 5.7.0 Client must not start with this mechanism\r\n"
            }
            SMTPReplyCode::AuthErrorDecode64 => "501 5.5.2 Invalid, not base64\r\n",
            SMTPReplyCode::AuthInvalidCredentials => {
                "535 5.7.8 Authentication credentials invalid\r\n"
            }
            SMTPReplyCode::AuthClientCanceled => "501 Authentication canceled by client\r\n",
            SMTPReplyCode::AuthRequired => "530 5.7.0 Authentication required\r\n",
        }
    }
}
