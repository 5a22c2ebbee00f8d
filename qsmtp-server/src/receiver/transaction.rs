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
use super::connection::Connection;
use crate::{auth::Backend, session::Session};
use qsmtp_common::{
    code::SMTPReplyCode,
    event::Event,
    mechanism::Mechanism,
    re::{anyhow, log},
    state::StateSMTP,
};
use qsmtp_config::{log_channel, Config};

const TIMEOUT_DEFAULT: u64 = 5 * 60 * 1000; // 5min

/// Envelope and content of the message being received
pub struct Transaction {
    state: StateSMTP,
    rcpt_count: usize,
    body: Vec<u8>,
    /// first error met while reading the content, replied at the end of DATA
    data_error: Option<SMTPReplyCode>,
    tls_available: bool,
}

#[allow(clippy::module_name_repetitions)]
#[derive(Debug)]
pub enum TransactionResult {
    Nothing,
    /// the message content, ready to be handed to the session
    Mail(Vec<u8>),
    TlsUpgrade,
    Authentication(Mechanism, Option<Vec<u8>>),
}

// Generated from a string received
enum ProcessedEvent {
    Nothing,
    Reply(SMTPReplyCode),
    ChangeState(StateSMTP),
    ReplyChangeState(StateSMTP, SMTPReplyCode),
    TransactionCompleted(Vec<u8>),
}

impl Transaction {
    async fn parse_and_apply_and_get_reply<S, B>(
        &mut self,
        conn: &Connection<S>,
        helo_domain: &mut Option<String>,
        backend: &B,
        session: &mut Option<B::Session>,
        client_message: &[u8],
    ) -> ProcessedEvent
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin,
        B: Backend,
    {
        log::trace!(
            target: log_channel::TRANSACTION,
            "buffer=\"{}\"",
            String::from_utf8_lossy(client_message)
        );

        let command_or_code = if self.state == StateSMTP::Data {
            Event::parse_data(client_message)
        } else {
            std::str::from_utf8(client_message)
                .map_err(|_| SMTPReplyCode::Code500)
                .and_then(Event::parse_cmd)
        };

        log::trace!(
            target: log_channel::TRANSACTION,
            "parsed=\"{:?}\"",
            command_or_code
        );

        match command_or_code {
            Ok(command) => {
                self.process_event(conn, helo_domain, backend, session, command)
                    .await
            }
            // the client does not read replies while sending the content
            Err(code) if self.state == StateSMTP::Data => {
                self.data_error.get_or_insert(code);
                ProcessedEvent::Nothing
            }
            Err(code) => ProcessedEvent::Reply(code),
        }
    }

    #[allow(clippy::too_many_lines)]
    async fn process_event<S, B>(
        &mut self,
        conn: &Connection<S>,
        helo_domain: &mut Option<String>,
        backend: &B,
        session: &mut Option<B::Session>,
        event: Event,
    ) -> ProcessedEvent
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin,
        B: Backend,
    {
        match (&self.state, event) {
            (StateSMTP::Data, Event::DataLine(line)) => {
                if self.data_error.is_some() {
                    return ProcessedEvent::Nothing;
                }
                if self.body.len() + line.len() + 2 > conn.config.server.smtp.message_size_max {
                    log::warn!(
                        target: log_channel::TRANSACTION,
                        "message exceeds {} bytes, discarding its content",
                        conn.config.server.smtp.message_size_max
                    );
                    self.body.clear();
                    self.data_error = Some(SMTPReplyCode::Code552MessageSizeExceeded);
                    return ProcessedEvent::Nothing;
                }
                self.body.extend_from_slice(&line);
                self.body.extend_from_slice(b"\r\n");
                ProcessedEvent::Nothing
            }

            (StateSMTP::Data, Event::DataEnd) => match self.data_error.take() {
                Some(code) => {
                    self.body.clear();
                    ProcessedEvent::ReplyChangeState(StateSMTP::Helo, code)
                }
                None => ProcessedEvent::TransactionCompleted(std::mem::take(&mut self.body)),
            },

            (_, Event::NoopCmd) => ProcessedEvent::Reply(SMTPReplyCode::Code250),

            (_, Event::HelpCmd(_)) => ProcessedEvent::Reply(SMTPReplyCode::Help),

            (_, Event::RsetCmd) => {
                self.reset(session).await;
                ProcessedEvent::ReplyChangeState(
                    if helo_domain.is_some() {
                        StateSMTP::Helo
                    } else {
                        StateSMTP::Connect
                    },
                    SMTPReplyCode::Code250,
                )
            }

            (_, Event::ExpnCmd(_) | Event::VrfyCmd(_)) => {
                ProcessedEvent::Reply(SMTPReplyCode::Code502unimplemented)
            }

            (_, Event::QuitCmd) => {
                ProcessedEvent::ReplyChangeState(StateSMTP::Stop, SMTPReplyCode::Code221)
            }

            (_, Event::HeloCmd(helo)) => {
                self.reset(session).await;
                *helo_domain = Some(helo);

                ProcessedEvent::ReplyChangeState(StateSMTP::Helo, SMTPReplyCode::Code250)
            }

            (_, Event::EhloCmd(helo)) => {
                self.reset(session).await;
                *helo_domain = Some(helo);

                ProcessedEvent::ReplyChangeState(
                    StateSMTP::Helo,
                    if conn.is_secured {
                        SMTPReplyCode::Code250SecuredEsmtp
                    } else {
                        SMTPReplyCode::Code250PlainEsmtp
                    },
                )
            }

            (_, Event::StartTls) if conn.is_secured => {
                ProcessedEvent::Reply(SMTPReplyCode::TlsAlreadyUnderTls)
            }

            (StateSMTP::Helo | StateSMTP::Connect, Event::StartTls) if !self.tls_available => {
                ProcessedEvent::Reply(SMTPReplyCode::Code454)
            }

            (StateSMTP::Helo | StateSMTP::Connect, Event::StartTls) if !conn.is_authenticated => {
                ProcessedEvent::ReplyChangeState(
                    StateSMTP::NegotiationTLS,
                    SMTPReplyCode::Greetings,
                )
            }

            (StateSMTP::Helo, Event::Auth(mechanism, initial_response))
                if !conn.is_authenticated =>
            {
                ProcessedEvent::ChangeState(StateSMTP::Authentication(mechanism, initial_response))
            }

            (StateSMTP::Helo, Event::MailCmd(mail_from, _body_bit_mime, _auth_mailbox)) => {
                if session.is_none() {
                    match backend.anonymous_login().await {
                        Ok(anonymous) => *session = Some(anonymous),
                        Err(e) => {
                            log::warn!(
                                target: log_channel::TRANSACTION,
                                "MAIL FROM refused for '{}': {e}",
                                conn.client_addr
                            );
                            return ProcessedEvent::Reply(SMTPReplyCode::AuthRequired);
                        }
                    }
                }

                let result = match session.as_mut() {
                    Some(session) => session.mail(&mail_from).await,
                    None => return ProcessedEvent::Reply(SMTPReplyCode::AuthRequired),
                };

                match result {
                    Ok(()) => {
                        self.rcpt_count = 0;
                        self.body.clear();
                        ProcessedEvent::ReplyChangeState(StateSMTP::MailFrom, SMTPReplyCode::Code250)
                    }
                    Err(e) => {
                        log::warn!(target: log_channel::TRANSACTION, "sender refused: {e}");
                        ProcessedEvent::Reply(SMTPReplyCode::Code451)
                    }
                }
            }

            (StateSMTP::MailFrom | StateSMTP::RcptTo, Event::RcptCmd(_))
                if self.rcpt_count >= conn.config.server.smtp.rcpt_count_max =>
            {
                ProcessedEvent::Reply(SMTPReplyCode::Code452TooManyRecipients)
            }

            (StateSMTP::MailFrom | StateSMTP::RcptTo, Event::RcptCmd(rcpt_to)) => {
                let result = match session.as_mut() {
                    Some(session) => session.rcpt(&rcpt_to).await,
                    None => return ProcessedEvent::Reply(SMTPReplyCode::BadSequence),
                };

                match result {
                    Ok(()) => {
                        self.rcpt_count += 1;
                        ProcessedEvent::ReplyChangeState(StateSMTP::RcptTo, SMTPReplyCode::Code250)
                    }
                    Err(e) => {
                        log::warn!(target: log_channel::TRANSACTION, "recipient refused: {e}");
                        ProcessedEvent::Reply(SMTPReplyCode::Code451)
                    }
                }
            }

            (StateSMTP::RcptTo, Event::DataCmd) => {
                self.body.clear();
                self.data_error = None;
                ProcessedEvent::ReplyChangeState(StateSMTP::Data, SMTPReplyCode::Code354)
            }

            _ => ProcessedEvent::Reply(SMTPReplyCode::BadSequence),
        }
    }

    async fn reset<S: Session>(&mut self, session: &mut Option<S>) {
        self.rcpt_count = 0;
        self.body.clear();
        self.data_error = None;
        if let Some(session) = session.as_mut() {
            session.reset().await;
        }
    }
}

impl Transaction {
    /// Read and process the commands of the client until a message is
    /// received, the connection must change (TLS, AUTH) or is closed.
    ///
    /// `helo_domain` is updated by HELO/EHLO and kept between calls.
    ///
    /// # Errors
    ///
    /// * the client timed-out
    /// * the connection failed
    pub async fn receive<S, B>(
        conn: &mut Connection<S>,
        helo_domain: &mut Option<String>,
        backend: &B,
        session: &mut Option<B::Session>,
        tls_available: bool,
    ) -> anyhow::Result<TransactionResult>
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin,
        B: Backend,
    {
        let mut transaction = Self {
            state: if helo_domain.is_none() {
                StateSMTP::Connect
            } else {
                StateSMTP::Helo
            },
            rcpt_count: 0,
            body: Vec::new(),
            data_error: None,
            tls_available,
        };

        let mut read_timeout = get_timeout_for_state(&conn.config, &transaction.state);

        loop {
            match transaction.state {
                StateSMTP::NegotiationTLS => return Ok(TransactionResult::TlsUpgrade),
                StateSMTP::Authentication(mechanism, initial_response) => {
                    return Ok(TransactionResult::Authentication(
                        mechanism,
                        initial_response,
                    ));
                }
                StateSMTP::Stop => {
                    conn.is_alive = false;
                    return Ok(TransactionResult::Nothing);
                }
                _ => match conn.read(read_timeout).await {
                    Ok(Some(client_message)) => {
                        match transaction
                            .parse_and_apply_and_get_reply(
                                conn,
                                helo_domain,
                                backend,
                                session,
                                &client_message,
                            )
                            .await
                        {
                            ProcessedEvent::Nothing => {}
                            ProcessedEvent::Reply(reply_to_send) => {
                                conn.send_code(reply_to_send).await?;
                            }
                            ProcessedEvent::ChangeState(new_state) => {
                                log::info!(
                                    target: log_channel::TRANSACTION,
                                    "================ STATE: /{:?}/ => /{:?}/",
                                    transaction.state,
                                    new_state
                                );
                                transaction.state = new_state;
                                read_timeout =
                                    get_timeout_for_state(&conn.config, &transaction.state);
                            }
                            ProcessedEvent::ReplyChangeState(new_state, reply_to_send) => {
                                log::info!(
                                    target: log_channel::TRANSACTION,
                                    "================ STATE: /{:?}/ => /{:?}/",
                                    transaction.state,
                                    new_state
                                );
                                transaction.state = new_state;
                                read_timeout =
                                    get_timeout_for_state(&conn.config, &transaction.state);
                                conn.send_code(reply_to_send).await?;
                            }
                            ProcessedEvent::TransactionCompleted(body) => {
                                return Ok(TransactionResult::Mail(body));
                            }
                        }
                    }
                    Ok(None) => {
                        log::info!(target: log_channel::TRANSACTION, "eof");
                        transaction.state = StateSMTP::Stop;
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                        conn.send_code(SMTPReplyCode::Code451Timeout).await?;
                        anyhow::bail!(e)
                    }
                    Err(e) => {
                        anyhow::bail!(e)
                    }
                },
            }
        }
    }
}

pub fn get_timeout_for_state(
    config: &std::sync::Arc<Config>,
    state: &StateSMTP,
) -> std::time::Duration {
    match state {
        StateSMTP::Connect => config.server.smtp.timeout_client.connect,
        StateSMTP::Helo => config.server.smtp.timeout_client.helo,
        StateSMTP::Authentication(..) => config.server.smtp.timeout_client.auth,
        StateSMTP::MailFrom => config.server.smtp.timeout_client.mail_from,
        StateSMTP::RcptTo => config.server.smtp.timeout_client.rcpt_to,
        StateSMTP::Data => config.server.smtp.timeout_client.data,
        StateSMTP::NegotiationTLS | StateSMTP::Stop => {
            std::time::Duration::from_millis(TIMEOUT_DEFAULT)
        }
    }
}
