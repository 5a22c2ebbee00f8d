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
use pretty_assertions::assert_eq;
use qsmtp_common::{code::SMTPReplyCode, re::log};

use crate::{Codes, Config};

#[test]
fn empty_is_default() {
    let config = Config::from_toml("").unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn default_values() {
    let config = Config::from_toml(include_str!("../../../config/minimal.toml")).unwrap();

    assert_eq!(config.server.domain, "mail.example.com");
    assert_eq!(
        config.server.interfaces.addr_submission,
        vec!["0.0.0.0:587".parse().unwrap()]
    );
    assert!(config.server.interfaces.addr_submissions.is_empty());
    assert_eq!(
        config.server.queue.dirpath,
        std::path::PathBuf::from("/var/mailqueue")
    );
    assert_eq!(
        config.server.smtp.auth.credentials,
        std::path::PathBuf::from("/root/users.txt")
    );
    assert_eq!(
        config.server.tls.certificate,
        std::path::PathBuf::from("/root/cert.pem")
    );
    assert_eq!(
        config.server.tls.private_key,
        std::path::PathBuf::from("/root/key.pem")
    );
    assert!(!config.server.smtp.auth.enable_dangerous_mechanism_in_clair);
    assert_eq!(config.server.smtp.auth.attempt_count_max, -1);
    assert_eq!(config.server.smtp.message_size_max, 20 * 1024 * 1024);
    assert_eq!(config.server.logs.filepath, None);
}

#[test]
fn complete() {
    let config = Config::from_toml(include_str!("../../../config/qsmtp.toml")).unwrap();

    let mut expected = Config::default();
    expected.server.domain = "mail.example.com".to_string();
    expected.server.client_count_max = 32;
    expected.server.interfaces.addr_submissions = vec!["0.0.0.0:465".parse().unwrap()];
    expected.server.logs.filepath = Some("/var/log/qsmtp/qsmtp.log".into());
    expected.server.logs.format = "{d} {l} {t} - {m}{n}".to_string();
    expected.server.logs.level = [
        ("default", log::LevelFilter::Warn),
        ("receiver", log::LevelFilter::Info),
        ("auth", log::LevelFilter::Info),
        ("transaction", log::LevelFilter::Info),
        ("queue", log::LevelFilter::Info),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    expected.server.tls.preempt_cipherlist = true;
    expected.server.tls.handshake_timeout = std::time::Duration::from_millis(200);
    expected.server.smtp.rcpt_count_max = 25;
    expected.server.smtp.message_size_max = 10 * 1024 * 1024;
    expected.server.smtp.error.soft_count = 5;
    expected.server.smtp.error.hard_count = 10;
    expected.server.smtp.error.delay = std::time::Duration::from_secs(1);
    expected.server.smtp.timeout_client.connect = std::time::Duration::from_secs(60);
    expected.server.smtp.timeout_client.helo = std::time::Duration::from_secs(60);
    expected.server.smtp.timeout_client.auth = std::time::Duration::from_secs(30);
    expected.server.smtp.timeout_client.mail_from = std::time::Duration::from_secs(60);
    expected.server.smtp.timeout_client.rcpt_to = std::time::Duration::from_secs(60);
    expected.server.smtp.timeout_client.data = std::time::Duration::from_secs(300);
    expected.server.smtp.codes = Codes::from(
        [(
            SMTPReplyCode::Greetings,
            "220 {domain} ESMTP qSMTP ready\r\n".to_string(),
        )]
        .into_iter()
        .collect::<std::collections::BTreeMap<_, _>>(),
    );
    expected.server.smtp.auth.attempt_count_max = 3;

    assert_eq!(config, expected);
}

#[test]
fn overridden_codes_keep_defaults() {
    let config = Config::from_toml(
        r#"
[server.smtp.codes]
Code250 = "250 2.0.0 Ok\r\n"
"#,
    )
    .unwrap();

    assert_eq!(
        config.server.smtp.codes.get(SMTPReplyCode::Code250),
        "250 2.0.0 Ok\r\n"
    );
    assert_eq!(
        config.server.smtp.codes.get(SMTPReplyCode::AuthRequired),
        "530 5.7.0 Authentication required\r\n"
    );
}

#[test]
fn every_code_has_a_default() {
    let codes = Codes::default();
    for code in <SMTPReplyCode as qsmtp_common::re::strum::IntoEnumIterator>::iter() {
        let text = codes.get(code);
        assert!(text.ends_with("\r\n"), "{code}: {text:?}");
        assert_eq!(
            code.is_error(),
            text.starts_with('4') || text.starts_with('5'),
            "{code}"
        );
    }
}

#[test]
fn unknown_field() {
    assert!(Config::from_toml("[server]\nfoo = 1").is_err());
    assert!(Config::from_toml("[server.smtp.codes]\nCode999 = \"999\"").is_err());
}

#[test]
fn ill_formed_codes() {
    for text in [
        "",
        "250",
        "250\r\n",
        "2é0 Ok\r\n",
        "Ok 250\r\n",
        "250_Ok\r\n",
        "250 Ok",
    ] {
        // debug format of a str is a valid toml basic string here
        let input = format!("[server.smtp.codes]\nCode250 = {text:?}\n");
        assert!(Config::from_toml(&input).is_err(), "{text:?}");
    }

    assert!(Config::from_toml("[server.smtp.codes]\nCode250 = \"250-Ok\\r\\n\"").is_ok());
}

#[test]
fn inconsistent_error_counters() {
    assert!(Config::from_toml(
        r#"
[server.smtp.error]
soft_count = 10
hard_count = 5
delay = "1s"
"#
    )
    .is_err());
}

#[test]
fn show_as_json() {
    let config = Config::from_toml(include_str!("../../../config/minimal.toml")).unwrap();
    let json = serde_json::to_string_pretty(&config).unwrap();
    assert!(json.contains("\"domain\": \"mail.example.com\""));
    assert!(json.contains("\"AuthRequired\": \"530 5.7.0 Authentication required\\r\\n\""));
}

#[test]
fn from_path() {
    assert!(Config::from_path("../config/qsmtp.toml").is_ok());
    assert!(Config::from_path("./tmp/not_a_file.toml").is_err());
}
