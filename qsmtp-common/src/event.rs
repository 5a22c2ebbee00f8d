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
use crate::{code::SMTPReplyCode, mechanism::Mechanism};

/// Longest command line accepted, CRLF excluded (RFC 5321 4.5.3.1.4)
pub const COMMAND_LINE_MAX_LENGTH: usize = 510;
/// Longest line of message content accepted, CRLF excluded (RFC 5321 4.5.3.1.6)
pub const TEXT_LINE_MAX_LENGTH: usize = 998;

/// `BODY=` parameter of MAIL (RFC 6152)
#[derive(Debug, PartialEq, Eq, Clone, strum::EnumString)]
pub enum MimeBodyType {
    /// `BODY=7BIT`
    #[strum(serialize = "7BIT")]
    SevenBit,
    /// `BODY=8BITMIME`
    #[strum(serialize = "8BITMIME")]
    EightBitMime,
}

/// A line received from the client, either a command or a line of the
/// message content
///
/// Paths are kept as written by the client, angle brackets included.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Event {
    /// `HELO <domain or [address]>`
    HeloCmd(String),
    /// `EHLO <domain or [address]>`
    EhloCmd(String),
    /// `MAIL FROM:<path> [BODY=...] [SMTPUTF8] [AUTH=...]`, the last field is
    /// the xtext of the `AUTH=` parameter
    MailCmd(String, Option<MimeBodyType>, Option<String>),
    /// `RCPT TO:<path>`
    RcptCmd(String),
    /// `DATA`
    DataCmd,
    /// One line of content, without its CRLF and with dot-stuffing removed
    DataLine(Vec<u8>),
    /// The lone `.` closing the content
    DataEnd,
    /// `RSET`
    RsetCmd,
    /// `VRFY <string>`
    VrfyCmd(String),
    /// `EXPN <string>`
    ExpnCmd(String),
    /// `HELP [topic]`
    HelpCmd(Option<String>),
    /// `NOOP`, any argument ignored
    NoopCmd,
    /// `QUIT`
    QuitCmd,
    /// `STARTTLS` (RFC 3207)
    StartTls,
    /// `AUTH <mechanism> [initial-response]` (RFC 4954), the response is
    /// still base64 encoded
    Auth(Mechanism, Option<Vec<u8>>),
}

impl Event {
    /// Parse a command line, CRLF already removed
    ///
    /// Verbs are case insensitive, arguments are separated by any amount of
    /// whitespace but the line must not start with one.
    ///
    /// # Errors
    ///
    /// * 500 for an empty or too long line
    /// * 501 for an unknown verb or ill-formed arguments
    /// * 504 for an unknown MAIL or RCPT parameter
    /// * [SMTPReplyCode::AuthMechanismNotSupported] for AUTH with another mechanism
    pub fn parse_cmd(input: &str) -> Result<Self, SMTPReplyCode> {
        if input.len() > COMMAND_LINE_MAX_LENGTH {
            return Err(SMTPReplyCode::Code500);
        }

        let mut words = input.split_whitespace();
        let verb = words.next().ok_or(SMTPReplyCode::Code500)?;
        if input.starts_with(char::is_whitespace) {
            return Err(SMTPReplyCode::Code501);
        }
        let args = words.collect::<Vec<_>>();

        match (verb.to_ascii_uppercase().as_str(), args.as_slice()) {
            ("HELO", args) => hello_argument(args).map(Self::HeloCmd),
            ("EHLO", args) => hello_argument(args).map(Self::EhloCmd),
            ("MAIL", args) => {
                let (path, params) = split_path("FROM:", args)?;
                let (body, auth) = mail_parameters(params)?;
                Ok(Self::MailCmd(path.to_string(), body, auth))
            }
            ("RCPT", args) => match split_path("TO:", args)? {
                (path, _) if path.trim_matches(|c| c == '<' || c == '>').is_empty() => {
                    Err(SMTPReplyCode::Code501)
                }
                (path, []) => Ok(Self::RcptCmd(path.to_string())),
                (_, _unsupported) => Err(SMTPReplyCode::Code504),
            },

            ("VRFY", [string] | [string, "SMTPUTF8"]) => Ok(Self::VrfyCmd((*string).to_string())),
            ("EXPN", [string] | [string, "SMTPUTF8"]) => Ok(Self::ExpnCmd((*string).to_string())),
            ("HELP", []) => Ok(Self::HelpCmd(None)),
            ("HELP", [topic]) => Ok(Self::HelpCmd(Some((*topic).to_string()))),
            ("NOOP", _) => Ok(Self::NoopCmd),
            ("DATA", []) => Ok(Self::DataCmd),
            ("RSET", []) => Ok(Self::RsetCmd),
            ("QUIT", []) => Ok(Self::QuitCmd),
            ("STARTTLS", []) => Ok(Self::StartTls),

            ("AUTH", [mechanism, initial_response @ ..]) if initial_response.len() <= 1 => {
                Ok(Self::Auth(
                    mechanism
                        .parse::<Mechanism>()
                        .map_err(|_| SMTPReplyCode::AuthMechanismNotSupported)?,
                    initial_response.first().map(|r| r.as_bytes().to_vec()),
                ))
            }

            _ => Err(SMTPReplyCode::Code501),
        }
    }

    /// Parse a line received after DATA, CRLF already removed
    ///
    /// # Errors
    ///
    /// * 500 if the line is longer than [TEXT_LINE_MAX_LENGTH]
    pub fn parse_data(input: &[u8]) -> Result<Self, SMTPReplyCode> {
        if input == b"." {
            return Ok(Self::DataEnd);
        }
        if input.len() > TEXT_LINE_MAX_LENGTH {
            return Err(SMTPReplyCode::Code500);
        }
        // RFC 5321 4.5.2, a leading dot was doubled by the client
        Ok(Self::DataLine(
            input.strip_prefix(b".").unwrap_or(input).to_vec(),
        ))
    }
}

/// The single argument of HELO and EHLO: a domain name or an IP address
/// between brackets, which is returned without them
fn hello_argument(args: &[&str]) -> Result<String, SMTPReplyCode> {
    match args {
        [literal] if literal.starts_with('[') && literal.ends_with(']') => {
            let ip = &literal[1..literal.len() - 1];
            ip.parse::<std::net::IpAddr>()
                .map(|ip| ip.to_string())
                .map_err(|_| SMTPReplyCode::Code501)
        }
        [domain] => addr::parse_domain_name(domain)
            .map(|name| name.to_string())
            .map_err(|_| SMTPReplyCode::Code501),
        _ => Err(SMTPReplyCode::Code501),
    }
}

/// Split the arguments of MAIL or RCPT into the path and its parameters
///
/// The path may be glued to `keyword` (`FROM:<a@b>`) or be the next word
/// (`FROM: <a@b>`), `keyword` is compared ignoring case.
fn split_path<'a, 'b>(
    keyword: &str,
    args: &'b [&'a str],
) -> Result<(&'a str, &'b [&'a str]), SMTPReplyCode> {
    let (first, rest) = args.split_first().ok_or(SMTPReplyCode::Code501)?;
    if !first
        .get(..keyword.len())
        .map_or(false, |head| head.eq_ignore_ascii_case(keyword))
    {
        return Err(SMTPReplyCode::Code501);
    }

    match (&first[keyword.len()..], rest) {
        ("", [path, params @ ..]) => Ok((*path, params)),
        ("", []) => Err(SMTPReplyCode::Code501),
        (path, params) => Ok((path, params)),
    }
}

/// Parameters of MAIL accepted by the receiver, each at most once
fn mail_parameters(
    params: &[&str],
) -> Result<(Option<MimeBodyType>, Option<String>), SMTPReplyCode> {
    let mut body = None;
    let mut auth = None;

    for param in params {
        match param.split_once('=') {
            Some(("BODY", value)) if body.is_none() => {
                body = Some(
                    value
                        .parse::<MimeBodyType>()
                        .map_err(|_| SMTPReplyCode::Code501)?,
                );
            }
            Some(("AUTH", value)) if auth.is_none() => auth = Some(value.to_string()),
            Some(("BODY" | "AUTH", _)) => return Err(SMTPReplyCode::Code501),
            // the queue stores raw bytes, nothing to remember
            None if *param == "SMTPUTF8" => {}
            _ => return Err(SMTPReplyCode::Code504),
        }
    }

    Ok((body, auth))
}
