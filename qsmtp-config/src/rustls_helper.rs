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
use qsmtp_common::re::{anyhow, log};

use crate::config::ConfigServerTls;

struct TlsLogger;
impl rustls::KeyLog for TlsLogger {
    fn log(&self, label: &str, client_random: &[u8], secret: &[u8]) {
        log::trace!("{} {:?} {:?}", label, client_random, secret);
    }
}

fn to_supported_protocol_version(
    protocol_version: &[rustls::ProtocolVersion],
) -> anyhow::Result<Vec<&'static rustls::SupportedProtocolVersion>> {
    let out = rustls::ALL_VERSIONS
        .iter()
        .filter(|i| protocol_version.contains(&i.version))
        .copied()
        .collect::<Vec<_>>();

    anyhow::ensure!(!out.is_empty(), "requested version is not supported");
    Ok(out)
}

/// Read every certificate of a PEM file, the leaf first
///
/// # Errors
///
/// * the file cannot be read
/// * the file does not contain any certificate
pub fn load_certificates(path: &std::path::Path) -> anyhow::Result<Vec<rustls::Certificate>> {
    use anyhow::Context;

    let mut reader = std::io::BufReader::new(
        std::fs::File::open(path)
            .with_context(|| format!("cannot open certificate: '{}'", path.display()))?,
    );

    let certs = rustls_pemfile::certs(&mut reader)
        .with_context(|| format!("cannot parse certificate: '{}'", path.display()))?
        .into_iter()
        .map(rustls::Certificate)
        .collect::<Vec<_>>();

    anyhow::ensure!(
        !certs.is_empty(),
        "certificate path is valid but empty: '{}'",
        path.display()
    );
    Ok(certs)
}

/// Read the first private key (PKCS8, RSA or EC) of a PEM file
///
/// # Errors
///
/// * the file cannot be read
/// * the file does not contain any private key
pub fn load_private_key(path: &std::path::Path) -> anyhow::Result<rustls::PrivateKey> {
    use anyhow::Context;

    let mut reader = std::io::BufReader::new(
        std::fs::File::open(path)
            .with_context(|| format!("cannot open private key: '{}'", path.display()))?,
    );

    rustls_pemfile::read_all(&mut reader)
        .with_context(|| format!("cannot parse private key: '{}'", path.display()))?
        .into_iter()
        .find_map(|i| match i {
            rustls_pemfile::Item::RSAKey(i)
            | rustls_pemfile::Item::PKCS8Key(i)
            | rustls_pemfile::Item::ECKey(i) => Some(rustls::PrivateKey(i)),
            _ => None,
        })
        .ok_or_else(|| {
            anyhow::anyhow!(
                "private key path is valid but empty: '{}'",
                path.display()
            )
        })
}

/// Build the server side TLS configuration from the certificate and the
/// private key located at the configured paths.
///
/// # Errors
///
/// * certificate or private key cannot be loaded
/// * the private key does not match a supported signature scheme
/// * no requested protocol version is supported
pub fn get_rustls_config(config: &ConfigServerTls) -> anyhow::Result<rustls::ServerConfig> {
    let certificates = load_certificates(&config.certificate)?;
    let private_key = load_private_key(&config.private_key)?;

    let mut out = rustls::ServerConfig::builder()
        .with_safe_default_cipher_suites()
        .with_safe_default_kx_groups()
        .with_protocol_versions(&to_supported_protocol_version(&config.protocol_version)?)
        .map_err(|e| anyhow::anyhow!("cannot initialize tls config: '{e}'"))?
        .with_no_client_auth()
        .with_single_cert(certificates, private_key)
        .map_err(|e| anyhow::anyhow!("cannot use certificate and private key: '{e}'"))?;

    out.ignore_client_order = config.preempt_cipherlist;

    out.key_log = std::sync::Arc::new(TlsLogger {});

    Ok(out)
}
