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

/// Identifier of a reply sent by the server
///
/// The identifier is also the key of the reply in `server.smtp.codes`, the
/// text itself (number, enhanced status and wording) is taken from the
/// configuration when the reply is sent.
#[allow(clippy::module_name_repetitions)]
#[derive(
    Debug,
    Ord,
    PartialOrd,
    PartialEq,
    Eq,
    Hash,
    Copy,
    Clone,
    serde::Serialize,
    serde::Deserialize,
    strum::EnumIter,
    strum::EnumString,
    strum::Display,
    strum::IntoStaticStr,
)]
#[serde(into = "String")]
#[serde(try_from = "String")]
pub enum SMTPReplyCode {
    /// 214, answer to HELP
    Help,
    /// 220, first line of a connection
    Greetings,
    /// 221, answer to QUIT
    Code221,
    /// 250
    Code250,
    /// 250, EHLO capabilities on a clear channel
    Code250PlainEsmtp,
    /// 250, EHLO capabilities once TLS is up
    Code250SecuredEsmtp,
    /// 354, the client can send the message
    Code354,
    /// 451, the message could not be stored
    Code451,
    /// 451, the client stayed silent too long
    Code451Timeout,
    /// 451, last reply before the error limit closes the connection
    Code451TooManyError,
    /// 452, `smtp.rcpt_count_max` reached
    Code452TooManyRecipients,
    /// 454, STARTTLS without TLS material
    Code454,
    /// 552, the message went past `smtp.message_size_max`
    Code552MessageSizeExceeded,
    /// 500, unknown verb or line too long
    Code500,
    /// 501, the arguments do not parse
    Code501,
    /// 502, VRFY and EXPN
    Code502unimplemented,
    /// 503, the command is not expected in this state
    BadSequence,
    /// 504, unknown MAIL or RCPT parameter
    Code504,
    /// 554, STARTTLS on a channel already encrypted
    TlsAlreadyUnderTls,
    /// 554, `server.client_count_max` reached
    ConnectionMaxReached,

    /// 504, AUTH with a mechanism other than PLAIN or LOGIN
    AuthMechanismNotSupported,
    /// 235
    AuthSucceeded,
    /// 538, AUTH on a clear channel
    AuthMechanismMustBeEncrypted,
    /// 501, initial response given to a server-first mechanism
    AuthClientMustNotStart,
    /// 501, the client response is not base64
    AuthErrorDecode64,
    /// 535
    AuthInvalidCredentials,
    /// 501, the client answered `*`
    AuthClientCanceled,
    /// 530, MAIL without a successful AUTH
    AuthRequired,
}

impl SMTPReplyCode {
    /// Replies counted against `smtp.error.soft_count` and `hard_count`
    #[must_use]
    pub const fn is_error(self) -> bool {
        !matches!(
            self,
            Self::Help
                | Self::Greetings
                | Self::Code221
                | Self::Code250
                | Self::Code250PlainEsmtp
                | Self::Code250SecuredEsmtp
                | Self::Code354
                | Self::AuthSucceeded
        )
    }
}

impl From<SMTPReplyCode> for String {
    fn from(code: SMTPReplyCode) -> Self {
        <&'static str>::from(code).to_owned()
    }
}

impl TryFrom<String> for SMTPReplyCode {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
