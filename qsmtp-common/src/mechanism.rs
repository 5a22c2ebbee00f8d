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

/// SASL mechanism named by the AUTH command
///
/// Only the two password mechanisms are offered, both send the secret as is
/// and are refused on a clear channel unless
/// `smtp.auth.enable_dangerous_mechanism_in_clair` is set.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Copy,
    Clone,
    Hash,
    PartialOrd,
    Ord,
    strum::EnumIter,
    strum::EnumString,
    strum::Display,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Mechanism {
    /// RFC 4616, `authzid NUL authcid NUL passwd` in a single response
    Plain,
    /// Username then password, each asked with a `334` challenge
    Login,
}

impl Mechanism {
    /// The client may append an initial response to the AUTH command
    #[must_use]
    pub const fn client_first(self) -> bool {
        matches!(self, Self::Plain)
    }

    /// The password travels in clear inside the exchange
    #[must_use]
    pub const fn must_be_under_tls(self) -> bool {
        true
    }
}
