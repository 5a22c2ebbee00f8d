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
mod starttls;

use super::{test_helpers::TEST_ROOT_CA, AbstractIO, ConnectionKind};
use crate::{auth::Backend, server::Server};
use qsmtp_common::re::anyhow;
use qsmtp_config::{
    get_rustls_config,
    re::{rustls, rustls_pemfile},
    Config,
};

fn get_tls_connector() -> tokio_rustls::TlsConnector {
    let mut reader = std::io::BufReader::new(std::fs::File::open(TEST_ROOT_CA).unwrap());

    let mut root_store = rustls::RootCertStore::empty();
    for i in rustls_pemfile::certs(&mut reader).unwrap() {
        root_store.add(&rustls::Certificate(i)).unwrap();
    }

    let config = rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    tokio_rustls::TlsConnector::from(std::sync::Arc::new(config))
}

/// read the replies until the last line of a multi-line reply
async fn read_reply<S>(stream: &mut AbstractIO<S>, output: &mut Vec<String>) -> anyhow::Result<()>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin,
{
    loop {
        let line = stream
            .next_line(Some(std::time::Duration::from_secs(5)))
            .await?
            .ok_or_else(|| anyhow::anyhow!("connection closed by the server"))?;
        let line = String::from_utf8(line)?;
        let is_last = line.chars().nth(3) != Some('-');
        output.push(line);
        if is_last {
            return Ok(());
        }
    }
}

/// send each line of `input` and record the replies, after reading the one
/// already pending
async fn exchange<S>(
    stream: &mut AbstractIO<S>,
    input: &[&str],
    output: &mut Vec<String>,
) -> anyhow::Result<()>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin,
{
    for line in input {
        tokio::io::AsyncWriteExt::write_all(&mut stream.inner, line.as_bytes()).await?;
        read_reply(stream, output).await?;
    }
    Ok(())
}

/// Server side of a single connection on a random port
async fn spawn_server<B: Backend + 'static>(
    kind: ConnectionKind,
    config: Config,
    backend: B,
) -> (
    std::net::SocketAddr,
    tokio::task::JoinHandle<anyhow::Result<()>>,
) {
    let socket_server = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server_addr = socket_server.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let tls_config = get_rustls_config(&config.server.tls).unwrap();
        let (client_stream, client_addr) = socket_server.accept().await.unwrap();

        Server::run_session(
            client_stream,
            client_addr,
            kind,
            std::sync::Arc::new(config),
            Some(std::sync::Arc::new(tls_config)),
            std::sync::Arc::new(backend),
        )
        .await
    });

    (server_addr, server)
}

// using sockets on 2 thread to make the handshake concurrently
async fn test_starttls<B: Backend + 'static>(
    config: Config,
    backend: B,
    clair_smtp_input: &[&str],
    secured_smtp_input: &[&str],
    expected_output: &[&str],
) -> anyhow::Result<()> {
    let (server_addr, server) = spawn_server(ConnectionKind::Submission, config, backend).await;

    let mut output = vec![];

    let mut stream = AbstractIO::new(tokio::net::TcpStream::connect(server_addr).await?);
    read_reply(&mut stream, &mut output).await?;
    exchange(&mut stream, clair_smtp_input, &mut output).await?;

    let mut stream = AbstractIO::new(
        get_tls_connector()
            .connect(
                rustls::ServerName::try_from("testserver.com").unwrap(),
                stream.into_inner(),
            )
            .await?,
    );
    exchange(&mut stream, secured_smtp_input, &mut output).await?;

    pretty_assertions::assert_eq!(expected_output, output);

    server.await?
}

async fn test_tls_tunneled<B: Backend + 'static>(
    config: Config,
    backend: B,
    smtp_input: &[&str],
    expected_output: &[&str],
) -> anyhow::Result<()> {
    let (server_addr, server) = spawn_server(ConnectionKind::Tunneled, config, backend).await;

    let mut output = vec![];

    let mut stream = AbstractIO::new(
        get_tls_connector()
            .connect(
                rustls::ServerName::try_from("testserver.com").unwrap(),
                tokio::net::TcpStream::connect(server_addr).await?,
            )
            .await?,
    );
    read_reply(&mut stream, &mut output).await?;
    exchange(&mut stream, smtp_input, &mut output).await?;

    pretty_assertions::assert_eq!(expected_output, output);

    server.await?
}
