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
use super::{handle_connection, Connection, ConnectionKind};
use crate::{auth::Backend, credentials::CredentialStore, queue::MailQueue, QueueBackend};
use qsmtp_common::re::anyhow;
use qsmtp_config::Config;

/// A type implementing AsyncRead+AsyncWrite to emulate sockets
pub struct Mock<'a> {
    read_cursor: std::io::Cursor<Vec<u8>>,
    write_cursor: std::io::Cursor<&'a mut Vec<u8>>,
}

impl<'a> Mock<'a> {
    /// Create an new instance
    pub fn new(read: Vec<u8>, write: &'a mut Vec<u8>) -> Self {
        Self {
            read_cursor: std::io::Cursor::new(read),
            write_cursor: std::io::Cursor::new(write),
        }
    }
}

impl tokio::io::AsyncRead for Mock<'_> {
    fn poll_read(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        tokio::io::AsyncRead::poll_read(std::pin::Pin::new(&mut self.read_cursor), cx, buf)
    }
}

impl tokio::io::AsyncWrite for Mock<'_> {
    fn poll_write(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        tokio::io::AsyncWrite::poll_write(std::pin::Pin::new(&mut self.write_cursor), cx, buf)
    }

    fn poll_flush(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        tokio::io::AsyncWrite::poll_flush(std::pin::Pin::new(&mut self.write_cursor), cx)
    }

    fn poll_shutdown(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        tokio::io::AsyncWrite::poll_shutdown(std::pin::Pin::new(&mut self.write_cursor), cx)
    }
}

pub const TEST_SERVER_CERT: &str = "./src/receiver/tests/certs/certificate.crt";
pub const TEST_SERVER_KEY: &str = "./src/receiver/tests/certs/privateKey.key";
pub const TEST_ROOT_CA: &str = "./src/receiver/tests/certs/rootCA.crt";

/// server's configuration for the tests, no AUTH without TLS
pub fn get_regular_config() -> Config {
    let mut config = Config::default();
    config.server.domain = "testserver.com".to_string();
    config.server.queue.dirpath = "./tmp/receiver/queue".into();
    config.server.tls.certificate = TEST_SERVER_CERT.into();
    config.server.tls.private_key = TEST_SERVER_KEY.into();
    config.server.smtp.auth.credentials = "./tmp/receiver/users.txt".into();
    config
}

/// [get_regular_config] with AUTH allowed in clear, the mock is never encrypted
pub fn get_auth_config() -> Config {
    let mut config = get_regular_config();
    config.server.smtp.auth.enable_dangerous_mechanism_in_clair = true;
    config
}

/// Backend without any valid user nor queue directory
pub fn get_empty_backend() -> QueueBackend {
    QueueBackend::new(
        CredentialStore::new("./tmp/receiver/empty/users.txt"),
        MailQueue::new("./tmp/receiver/empty/queue"),
    )
}

/// Backend with the user `hello:world` and an empty queue, files under `./tmp/receiver/<name>`
pub fn get_backend(name: &str) -> QueueBackend {
    let dirpath = std::path::PathBuf::from("./tmp/receiver").join(name);
    let queue = dirpath.join("queue");

    if queue.exists() {
        std::fs::remove_dir_all(&queue).unwrap();
    }
    std::fs::create_dir_all(&queue).unwrap();
    std::fs::write(dirpath.join("users.txt"), "# test users\nhello:world\n").unwrap();

    QueueBackend::new(
        CredentialStore::new(dirpath.join("users.txt")),
        MailQueue::new(queue),
    )
}

/// Content of the messages stored by `backend`, in the order received
pub fn stored_messages(backend: &QueueBackend) -> Vec<String> {
    let mut files = std::fs::read_dir(backend.queue().dirpath())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect::<Vec<_>>();
    files.sort();

    files
        .into_iter()
        .map(|path| std::fs::read_to_string(path).unwrap())
        .collect()
}

/// run a connection and assert output produced by the receiver and @expected_output
///
/// # Errors
///
/// * the outcome of [`handle_connection`]
pub async fn test_receiver_inner<B: Backend>(
    address: &str,
    backend: std::sync::Arc<B>,
    smtp_input: &[u8],
    expected_output: &[u8],
    config: std::sync::Arc<Config>,
) -> anyhow::Result<()> {
    let mut written_data = Vec::new();
    let mock = Mock::new(smtp_input.to_vec(), &mut written_data);
    let conn = Connection::new(
        ConnectionKind::Submission,
        address.parse().unwrap(),
        config,
        mock,
    );

    let result = handle_connection(conn, None, backend).await;

    pretty_assertions::assert_eq!(
        std::str::from_utf8(expected_output),
        std::str::from_utf8(&written_data),
    );

    result
}

/// Call test_receiver_inner
#[macro_export]
macro_rules! test_receiver {
    ($input:expr, $output:expr) => {
        test_receiver! {
            with_config => $crate::receiver::test_helpers::get_regular_config(),
            $input,
            $output
        }
    };
    (with_config => $config:expr, $input:expr, $output:expr) => {
        test_receiver! {
            with_backend => $crate::receiver::test_helpers::get_empty_backend(),
            with_config => $config,
            $input,
            $output
        }
    };
    (with_backend => $backend:expr, $input:expr, $output:expr) => {
        test_receiver! {
            with_backend => $backend,
            with_config => $crate::receiver::test_helpers::get_auth_config(),
            $input,
            $output
        }
    };
    (with_backend => $backend:expr, with_config => $config:expr, $input:expr, $output:expr) => {
        $crate::receiver::test_helpers::test_receiver_inner(
            "127.0.0.1:0",
            std::sync::Arc::new($backend),
            $input.as_bytes(),
            $output.as_bytes(),
            std::sync::Arc::new($config),
        )
        .await
    };
}
