//! qSMTP configuration

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

/// targets for log! macro
pub mod log_channel {
    /// receiver system
    pub const RECEIVER: &str = "receiver";
    /// SASL exchange and credential checks
    pub const AUTH: &str = "auth";
    /// envelope and message of a session
    pub const TRANSACTION: &str = "transaction";
    /// writing of the messages on disk
    pub const QUEUE: &str = "queue";
}

#[cfg(test)]
mod tests;

mod parser {
    pub mod socket_addr;
    pub mod tls_protocol_version;
}

mod log4rs_helper;
mod rustls_helper;

mod config;
mod default;

pub use config::*;
pub use log4rs_helper::get_log4rs_config;
pub use rustls_helper::get_rustls_config;

/// Re-exported dependencies
pub mod re {
    pub use log4rs;
    pub use rustls;
    // NOTE: this one should not be re-exported (because tests only)
    pub use rustls_pemfile;
}

use qsmtp_common::re::anyhow;

impl Config {
    /// Parse a [Config] with [TOML] format
    ///
    /// Every field is optional, a missing one takes its default value.
    ///
    /// # Errors
    ///
    /// * data is not a valid [TOML]
    /// * one field is unknown
    /// * the error counters are inconsistent (soft > hard)
    /// * a reply text does not start with `xyz ` or `xyz-`, or does not end with CRLF
    ///
    /// [TOML]: https://github.com/toml-lang/toml
    pub fn from_toml(input: &str) -> anyhow::Result<Self> {
        toml::from_str::<Self>(input)
            .map_err(anyhow::Error::new)
            .and_then(Self::ensure)
    }

    /// Read and parse the configuration file at `path`
    ///
    /// # Errors
    ///
    /// * the file cannot be read
    /// * see [Config::from_toml]
    pub fn from_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        use anyhow::Context;

        let path = path.as_ref();
        let input = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read file '{}'", path.display()))?;

        Self::from_toml(&input)
            .with_context(|| format!("File contains format error '{}'", path.display()))
    }

    fn ensure(self) -> anyhow::Result<Self> {
        let error = &self.server.smtp.error;
        anyhow::ensure!(
            error.hard_count == -1 || error.soft_count <= error.hard_count,
            "'server.smtp.error.soft_count' ({}) is greater than 'hard_count' ({})",
            error.soft_count,
            error.hard_count
        );
        anyhow::ensure!(
            !self.server.domain.is_empty(),
            "'server.domain' cannot be empty"
        );
        for (code, text) in &self.server.smtp.codes.codes {
            anyhow::ensure!(
                is_valid_reply(text),
                "'server.smtp.codes.{code}' must start with a 3 digit code followed by ' ' or '-' and end with CRLF, got {text:?}"
            );
        }
        Ok(self)
    }
}

fn is_valid_reply(text: &str) -> bool {
    match text.as_bytes() {
        [a, b, c, b' ' | b'-', ..] => {
            [a, b, c].iter().all(|d| d.is_ascii_digit()) && text.ends_with("\r\n")
        }
        _ => false,
    }
}
