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
use crate::{
    auth::{Backend, QueueBackend},
    queue::MailQueue,
    receiver::{handle_connection, Connection, ConnectionKind},
};
use qsmtp_common::{
    code::SMTPReplyCode,
    re::{anyhow, log},
};
use qsmtp_config::{get_rustls_config, log_channel::RECEIVER, re::rustls, Config};

/// TCP/IP server
pub struct Server<B: Backend = QueueBackend> {
    config: std::sync::Arc<Config>,
    listener_submission: Vec<tokio::net::TcpListener>,
    listener_submissions: Vec<tokio::net::TcpListener>,
    tls_config: Option<std::sync::Arc<rustls::ServerConfig>>,
    backend: std::sync::Arc<B>,
}

impl Server<QueueBackend> {
    /// Create a server with the configuration provided, and the sockets already bound
    ///
    /// `sockets` are the listeners of the submission (STARTTLS) interface and
    /// of the submissions (implicit TLS) interface.
    ///
    /// # Errors
    ///
    /// * the mail queue directory does not exist and failed to be created
    /// * cannot convert sockets to [tokio::net::TcpListener]
    /// * cannot initialize [rustls] config
    pub fn new(
        config: std::sync::Arc<Config>,
        sockets: (Vec<std::net::TcpListener>, Vec<std::net::TcpListener>),
    ) -> anyhow::Result<Self> {
        let backend = QueueBackend::from_config(&config);
        Self::with_backend(config, sockets, backend)
    }
}

impl<B: Backend + 'static> Server<B> {
    /// Same as [Server::new] with another [Backend]
    ///
    /// # Errors
    ///
    /// see [Server::new]
    pub fn with_backend(
        config: std::sync::Arc<Config>,
        sockets: (Vec<std::net::TcpListener>, Vec<std::net::TcpListener>),
        backend: B,
    ) -> anyhow::Result<Self> {
        anyhow::Context::with_context(
            MailQueue::new(&config.server.queue.dirpath).create_dir_if_missing(),
            || {
                format!(
                    "cannot create mail queue '{}'",
                    config.server.queue.dirpath.display()
                )
            },
        )?;

        let tls_config = std::sync::Arc::new(get_rustls_config(&config.server.tls)?);

        let to_tokio = |sockets: Vec<std::net::TcpListener>| {
            sockets
                .into_iter()
                .map(|socket| {
                    socket.set_nonblocking(true)?;
                    tokio::net::TcpListener::from_std(socket)
                })
                .collect::<std::io::Result<Vec<_>>>()
        };

        Ok(Self {
            listener_submission: to_tokio(sockets.0)?,
            listener_submissions: to_tokio(sockets.1)?,
            tls_config: Some(tls_config),
            backend: std::sync::Arc::new(backend),
            config,
        })
    }

    /// Get the local address of the tcp listeners, submission first
    ///
    /// # Errors
    ///
    /// * cannot retrieve the address of a listener
    pub fn addr(&self) -> std::io::Result<Vec<std::net::SocketAddr>> {
        self.listener_submission
            .iter()
            .chain(self.listener_submissions.iter())
            .map(tokio::net::TcpListener::local_addr)
            .collect()
    }

    /// Main loop of qSMTP's server
    ///
    /// # Errors
    ///
    /// * there is no listener
    pub async fn listen_and_serve(self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.listener_submission.is_empty() || !self.listener_submissions.is_empty(),
            "no interface to listen on"
        );

        let (sender, mut receiver) =
            tokio::sync::mpsc::channel::<(tokio::net::TcpStream, std::net::SocketAddr, ConnectionKind)>(
                64,
            );

        for (listener, kind) in self
            .listener_submission
            .into_iter()
            .map(|l| (l, ConnectionKind::Submission))
            .chain(
                self.listener_submissions
                    .into_iter()
                    .map(|l| (l, ConnectionKind::Tunneled)),
            )
        {
            let sender = sender.clone();
            tokio::spawn(async move {
                loop {
                    match listener.accept().await {
                        Ok((stream, client_addr)) => {
                            if sender.send((stream, client_addr, kind)).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => log::error!(target: RECEIVER, "accept failed: {e}"),
                    }
                }
            });
        }
        drop(sender);

        let client_counter = std::sync::Arc::new(std::sync::atomic::AtomicI64::new(0));

        while let Some((mut stream, client_addr, kind)) = receiver.recv().await {
            log::info!(target: RECEIVER, "Connection from: {:?}, {}", kind, client_addr);

            if self.config.server.client_count_max != -1
                && client_counter.load(std::sync::atomic::Ordering::SeqCst)
                    >= self.config.server.client_count_max
            {
                log::warn!(
                    target: RECEIVER,
                    "Connection count max reached, rejecting connection from {client_addr}"
                );

                if let Err(e) = tokio::io::AsyncWriteExt::write_all(
                    &mut stream,
                    self.config
                        .server
                        .smtp
                        .codes
                        .get(SMTPReplyCode::ConnectionMaxReached)
                        .as_bytes(),
                )
                .await
                {
                    log::warn!(target: RECEIVER, "{}", e);
                }

                if let Err(e) = tokio::io::AsyncWriteExt::shutdown(&mut stream).await {
                    log::warn!(target: RECEIVER, "{}", e);
                }
                continue;
            }

            client_counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

            let session = Self::run_session(
                stream,
                client_addr,
                kind,
                self.config.clone(),
                self.tls_config.clone(),
                self.backend.clone(),
            );
            let client_counter_copy = client_counter.clone();
            tokio::spawn(async move {
                if let Err(e) = session.await {
                    log::warn!(target: RECEIVER, "{}", e);
                }

                client_counter_copy.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
            });
        }

        Ok(())
    }

    /// Serve one client until it leaves
    ///
    /// # Errors
    ///
    /// * see [handle_connection]
    pub async fn run_session(
        stream: tokio::net::TcpStream,
        client_addr: std::net::SocketAddr,
        kind: ConnectionKind,
        config: std::sync::Arc<Config>,
        tls_config: Option<std::sync::Arc<rustls::ServerConfig>>,
        backend: std::sync::Arc<B>,
    ) -> anyhow::Result<()> {
        let begin = std::time::SystemTime::now();
        log::info!(target: RECEIVER, "Handling client: {}", client_addr);

        let conn = Connection::new(kind, client_addr, config, stream);

        handle_connection(conn, tls_config, backend)
            .await
            .map(|_| {
                log::info!(
                    target: RECEIVER,
                    "{{ elapsed: {:?} }} Connection {} closed cleanly",
                    begin.elapsed(),
                    client_addr,
                );
            })
            .map_err(|error| {
                log::error!(
                    target: RECEIVER,
                    "{{ elapsed: {:?} }} Connection {} closed with an error {}",
                    begin.elapsed(),
                    client_addr,
                    error,
                );
                error
            })
    }
}
