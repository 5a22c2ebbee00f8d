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
use super::test_starttls;
use crate::{
    receiver::test_helpers::{get_backend, get_regular_config, stored_messages},
    test_receiver,
};

// see https://datatracker.ietf.org/doc/html/rfc3207

const PLAIN_ESMTP: [&str; 4] = [
    "250-testserver.com",
    "250-8BITMIME",
    "250-SMTPUTF8",
    "250 STARTTLS",
];

const SECURED_ESMTP: [&str; 4] = [
    "250-testserver.com",
    "250-8BITMIME",
    "250-SMTPUTF8",
    "250 AUTH PLAIN LOGIN",
];

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn simple() {
    let backend = get_backend("starttls_simple");

    test_starttls(
        get_regular_config(),
        backend.clone(),
        &["EHLO client.com\r\n", "STARTTLS\r\n"],
        &[
            "EHLO client.com\r\n",
            "AUTH PLAIN AGhlbGxvAHdvcmxk\r\n",
            "MAIL FROM:<hello@client.com>\r\n",
            "RCPT TO:<john@doe>\r\n",
            "DATA\r\n",
            "Subject: hi\r\n\r\nhello\r\n.\r\n",
            "QUIT\r\n",
        ],
        &[
            &["220 testserver.com Service ready"][..],
            &PLAIN_ESMTP,
            &["220 testserver.com Service ready"],
            &SECURED_ESMTP,
            &[
                "235 2.7.0 Authentication succeeded",
                "250 Ok",
                "250 Ok",
                "354 Start mail input; end with <CRLF>.<CRLF>",
                "250 Ok",
                "221 Service closing transmission channel",
            ],
        ]
        .concat(),
    )
    .await
    .unwrap();

    pretty_assertions::assert_eq!(
        stored_messages(&backend),
        vec!["Subject: hi\r\n\r\nhello\r\n".to_string()]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn starttls_before_helo() {
    test_starttls(
        get_regular_config(),
        get_backend("starttls_before_helo"),
        &["STARTTLS\r\n"],
        &["EHLO client.com\r\n", "QUIT\r\n"],
        &[
            &[
                "220 testserver.com Service ready",
                "220 testserver.com Service ready",
            ][..],
            &SECURED_ESMTP,
            &["221 Service closing transmission channel"],
        ]
        .concat(),
    )
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn helo_must_be_sent_again() {
    test_starttls(
        get_regular_config(),
        get_backend("starttls_helo_again"),
        &["EHLO client.com\r\n", "STARTTLS\r\n"],
        &[
            "AUTH PLAIN AGhlbGxvAHdvcmxk\r\n",
            "MAIL FROM:<hello@client.com>\r\n",
            "QUIT\r\n",
        ],
        &[
            &["220 testserver.com Service ready"][..],
            &PLAIN_ESMTP,
            &[
                "220 testserver.com Service ready",
                "503 Bad sequence of commands",
                "503 Bad sequence of commands",
                "221 Service closing transmission channel",
            ],
        ]
        .concat(),
    )
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn double_starttls() {
    test_starttls(
        get_regular_config(),
        get_backend("starttls_double"),
        &["EHLO client.com\r\n", "STARTTLS\r\n"],
        &["EHLO client.com\r\n", "STARTTLS\r\n", "QUIT\r\n"],
        &[
            &["220 testserver.com Service ready"][..],
            &PLAIN_ESMTP,
            &["220 testserver.com Service ready"],
            &SECURED_ESMTP,
            &[
                "554 5.5.1 Error: TLS already active",
                "221 Service closing transmission channel",
            ],
        ]
        .concat(),
    )
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn authentication_failed_under_tls() {
    let backend = get_backend("starttls_auth_failed");

    test_starttls(
        get_regular_config(),
        backend.clone(),
        &["EHLO client.com\r\n", "STARTTLS\r\n"],
        &[
            "EHLO client.com\r\n",
            "AUTH LOGIN\r\n",
            "aGVsbG8=\r\n",
            "aGVsbG8=\r\n",
            "MAIL FROM:<hello@client.com>\r\n",
            "QUIT\r\n",
        ],
        &[
            &["220 testserver.com Service ready"][..],
            &PLAIN_ESMTP,
            &["220 testserver.com Service ready"],
            &SECURED_ESMTP,
            &[
                "334 VXNlcm5hbWU6",
                "334 UGFzc3dvcmQ6",
                "535 5.7.8 Authentication credentials invalid",
                "530 5.7.0 Authentication required",
                "221 Service closing transmission channel",
            ],
        ]
        .concat(),
    )
    .await
    .unwrap();

    assert!(stored_messages(&backend).is_empty());
}

#[tokio::test]
async fn tls_not_configured() {
    assert!(test_receiver! {
        ["EHLO client.com\r\n", "STARTTLS\r\n", "QUIT\r\n"].concat(),
        [
            "220 testserver.com Service ready\r\n",
            "250-testserver.com\r\n250-8BITMIME\r\n250-SMTPUTF8\r\n250 STARTTLS\r\n",
            "454 TLS not available due to temporary reason\r\n",
            "221 Service closing transmission channel\r\n",
        ]
        .concat()
    }
    .is_ok());
}
