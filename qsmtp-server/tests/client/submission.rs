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
use lettre::transport::smtp::{
    authentication::{Credentials, Mechanism},
    client::{Tls, TlsParameters},
    extension::ClientId,
};
use qsmtp_common::re::anyhow;
use qsmtp_config::Config;
use qsmtp_server::{re::tokio, Server};

const CERTIFICATE: &str = "./src/receiver/tests/certs/certificate.crt";
const PRIVATE_KEY: &str = "./src/receiver/tests/certs/privateKey.key";

fn get_config(name: &str) -> Config {
    let dirpath = std::path::PathBuf::from("./tmp/client").join(name);
    let queue = dirpath.join("queue");
    if queue.exists() {
        std::fs::remove_dir_all(&queue).unwrap();
    }
    std::fs::create_dir_all(&dirpath).unwrap();
    std::fs::write(dirpath.join("users.txt"), "hello:world\njohn:doe\n").unwrap();

    let mut config = Config::default();
    config.server.domain = "testserver.com".to_string();
    config.server.queue.dirpath = queue;
    config.server.tls.certificate = CERTIFICATE.into();
    config.server.tls.private_key = PRIVATE_KEY.into();
    config.server.smtp.auth.credentials = dirpath.join("users.txt");
    config
}

/// Start a server on random ports, return the submission and submissions ports
fn start_server(config: Config) -> (u16, u16) {
    let sockets = (
        vec![std::net::TcpListener::bind("127.0.0.1:0").unwrap()],
        vec![std::net::TcpListener::bind("127.0.0.1:0").unwrap()],
    );

    let server = Server::new(std::sync::Arc::new(config), sockets).unwrap();
    let addr = server.addr().unwrap();

    tokio::spawn(async move {
        if let Err(e) = server.listen_and_serve().await {
            panic!("{e}");
        }
    });

    (addr[0].port(), addr[1].port())
}

fn get_mail() -> lettre::Message {
    lettre::Message::builder()
        .from("Hello <hello@client.com>".parse().unwrap())
        .to("John <john@doe.com>".parse().unwrap())
        .subject("Happy new year")
        .body(String::from("Be happy!\r\n.leading dot\r\n"))
        .unwrap()
}

async fn send(
    port: u16,
    tls: Tls,
    credentials: (&str, &str),
    mechanism: Mechanism,
) -> anyhow::Result<()> {
    let mailer =
        lettre::AsyncSmtpTransport::<lettre::Tokio1Executor>::builder_dangerous("127.0.0.1")
            .port(port)
            .hello_name(ClientId::Domain("client.com".to_string()))
            .tls(tls)
            .authentication(vec![mechanism])
            .credentials(Credentials::from(credentials))
            .build();

    lettre::AsyncTransport::send(&mailer, get_mail()).await?;
    Ok(())
}

fn tls_parameters() -> TlsParameters {
    TlsParameters::builder("testserver.com".to_string())
        .dangerous_accept_invalid_certs(true)
        .build()
        .unwrap()
}

fn stored_messages(config: &Config) -> Vec<String> {
    std::fs::read_dir(&config.server.queue.dirpath)
        .unwrap()
        .map(|entry| {
            let path = entry.unwrap().path();
            let name = path.file_name().unwrap().to_str().unwrap().to_string();
            assert!(name.starts_with("mail-") && name.ends_with(".eml"), "{name}");
            std::fs::read_to_string(path).unwrap()
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn starttls_plain() {
    let config = get_config("starttls_plain");
    let (submission, _) = start_server(config.clone());

    send(
        submission,
        Tls::Required(tls_parameters()),
        ("hello", "world"),
        Mechanism::Plain,
    )
    .await
    .unwrap();

    let messages = stored_messages(&config);
    pretty_assertions::assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("Subject: Happy new year\r\n"));
    assert!(messages[0].contains("\r\n.leading dot\r\n"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn starttls_login() {
    let config = get_config("starttls_login");
    let (submission, _) = start_server(config.clone());

    send(
        submission,
        Tls::Required(tls_parameters()),
        ("john", "doe"),
        Mechanism::Login,
    )
    .await
    .unwrap();

    pretty_assertions::assert_eq!(stored_messages(&config).len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn implicit_tls() {
    let config = get_config("implicit_tls");
    let (_, submissions) = start_server(config.clone());

    send(
        submissions,
        Tls::Wrapper(tls_parameters()),
        ("hello", "world"),
        Mechanism::Plain,
    )
    .await
    .unwrap();

    pretty_assertions::assert_eq!(stored_messages(&config).len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_credentials() {
    let config = get_config("invalid_credentials");
    let (submission, _) = start_server(config.clone());

    assert!(send(
        submission,
        Tls::Required(tls_parameters()),
        ("hello", "wrong"),
        Mechanism::Plain,
    )
    .await
    .is_err());

    assert!(stored_messages(&config).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn several_messages() {
    let config = get_config("several_messages");
    let (submission, submissions) = start_server(config.clone());

    for _ in 0..3 {
        send(
            submission,
            Tls::Required(tls_parameters()),
            ("hello", "world"),
            Mechanism::Plain,
        )
        .await
        .unwrap();
        send(
            submissions,
            Tls::Wrapper(tls_parameters()),
            ("john", "doe"),
            Mechanism::Login,
        )
        .await
        .unwrap();
    }

    pretty_assertions::assert_eq!(stored_messages(&config).len(), 6);
}
