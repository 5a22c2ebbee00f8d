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
use qsmtp_common::re::log;
use qsmtp_config::log_channel;

/// Flat file of `username:password` lines, read again on every check
///
/// Empty lines and lines starting with `#` are ignored, as are lines without
/// a `:` and lines which are not valid UTF-8. Only the first `:` separates the username from the password, both
/// sides are trimmed.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    filepath: std::path::PathBuf,
}

impl CredentialStore {
    ///
    #[must_use]
    pub fn new(filepath: impl Into<std::path::PathBuf>) -> Self {
        Self {
            filepath: filepath.into(),
        }
    }

    /// Path of the underlying file
    #[must_use]
    pub fn filepath(&self) -> &std::path::Path {
        &self.filepath
    }

    /// Is there a line matching exactly `username` and `password`
    ///
    /// The file is opened for each call so edits are visible without a restart.
    /// A file that cannot be read never grants access.
    #[must_use]
    pub fn verify(&self, username: &str, password: &str) -> bool {
        match self.lookup(username, password) {
            Ok(true) => {
                log::debug!(target: log_channel::AUTH, "credentials of '{username}' matched");
                true
            }
            Ok(false) => {
                log::debug!(target: log_channel::AUTH, "no credentials matched for '{username}'");
                false
            }
            Err(error) => {
                log::error!(
                    target: log_channel::AUTH,
                    "cannot read credentials file '{}': {}",
                    self.filepath.display(),
                    error
                );
                false
            }
        }
    }

    fn lookup(&self, username: &str, password: &str) -> std::io::Result<bool> {
        let file = std::fs::File::open(&self.filepath)?;

        for line in std::io::BufRead::split(std::io::BufReader::new(file), b'\n') {
            let line = line?;
            let line = match std::str::from_utf8(&line) {
                Ok(line) => line.trim(),
                Err(_) => continue,
            };
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((user, pass)) = line.split_once(':') {
                if user.trim() == username && pass.trim() == password {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }
}
