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
use crate::{queue::MailQueue, server::Server};
use qsmtp_common::re::{anyhow, log};
use qsmtp_config::{get_rustls_config, log_channel::RECEIVER, Config};

const RUNTIME_NAME: &str = "qsmtp-receiver";

fn socket_bind_anyhow<A: std::net::ToSocketAddrs + std::fmt::Debug>(
    addr: A,
) -> anyhow::Result<std::net::TcpListener> {
    anyhow::Context::with_context(std::net::TcpListener::bind(&addr), || {
        format!("Failed to bind socket on addr: '{:?}'", addr)
    })
}

/// Ensure the mail queue exists and the TLS material is usable, then bind the
/// submission and submissions interfaces of the configuration
///
/// # Errors
///
/// * the queue directory cannot be created
/// * the certificate or private key cannot be loaded
/// * an address cannot be bound
pub fn bind_sockets(
    config: &Config,
) -> anyhow::Result<(Vec<std::net::TcpListener>, Vec<std::net::TcpListener>)> {
    anyhow::Context::with_context(
        MailQueue::new(&config.server.queue.dirpath).create_dir_if_missing(),
        || {
            format!(
                "cannot create mail queue '{}'",
                config.server.queue.dirpath.display()
            )
        },
    )?;

    anyhow::Context::context(
        get_rustls_config(&config.server.tls),
        "TLS configuration is not usable",
    )?;

    let bind_all = |addrs: &[std::net::SocketAddr]| {
        addrs
            .iter()
            .map(socket_bind_anyhow)
            .collect::<anyhow::Result<Vec<_>>>()
    };

    Ok((
        bind_all(&config.server.interfaces.addr_submission)?,
        bind_all(&config.server.interfaces.addr_submissions)?,
    ))
}

/// Start the qSMTP server's runtime, blocks until the server stops
///
/// # Errors
///
/// * the runtime cannot be built
/// * see [Server::new] and [Server::listen_and_serve]
#[allow(clippy::module_name_repetitions)]
pub fn start_runtime(
    config: std::sync::Arc<Config>,
    sockets: (Vec<std::net::TcpListener>, Vec<std::net::TcpListener>),
) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name(RUNTIME_NAME)
        .build()?;

    anyhow::Context::context(
        runtime.block_on(async move {
            let server = Server::new(config, sockets)?;
            log::info!(
                target: RECEIVER,
                "Runtime '{RUNTIME_NAME}' started, listening on: {:?}",
                server.addr()?
            );
            server.listen_and_serve().await
        }),
        format!("An error terminated the '{RUNTIME_NAME}' runtime"),
    )
}
