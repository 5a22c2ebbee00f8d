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
use qsmtp_common::re::anyhow;

/// Versions accepted by the server, oldest first
const SUPPORTED: [rustls::ProtocolVersion; 2] = [
    rustls::ProtocolVersion::TLSv1_2,
    rustls::ProtocolVersion::TLSv1_3,
];

fn from_str(s: &str) -> anyhow::Result<rustls::ProtocolVersion> {
    match s {
        "TLSv1.2" | "0x0303" => Ok(rustls::ProtocolVersion::TLSv1_2),
        "TLSv1.3" | "0x0304" => Ok(rustls::ProtocolVersion::TLSv1_3),
        _ => anyhow::bail!("not a valid protocol version: '{}'", s),
    }
}

const fn as_str(version: rustls::ProtocolVersion) -> Option<&'static str> {
    match version {
        rustls::ProtocolVersion::TLSv1_2 => Some("TLSv1.2"),
        rustls::ProtocolVersion::TLSv1_3 => Some("TLSv1.3"),
        _ => None,
    }
}

/// Accept a version (`"TLSv1.3"`), a minimal version (`">=TLSv1.2"` or
/// `"^TLSv1.2"`) or an array of versions.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<rustls::ProtocolVersion>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct ProtocolVersionVisitor;

    impl<'de> serde::de::Visitor<'de> for ProtocolVersionVisitor {
        type Value = Vec<rustls::ProtocolVersion>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a TLS version, a minimal TLS version or an array of TLS versions")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            match v.strip_prefix(">=").or_else(|| v.strip_prefix('^')) {
                Some(min) => {
                    let min = from_str(min).map_err(E::custom)?;
                    let idx = SUPPORTED
                        .iter()
                        .position(|i| *i == min)
                        .ok_or_else(|| E::custom(format!("not supported version: {:?}", min)))?;

                    Ok(SUPPORTED[idx..].to_vec())
                }
                None => Ok(vec![from_str(v).map_err(E::custom)?]),
            }
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: serde::de::SeqAccess<'de>,
        {
            let mut out = vec![];
            while let Some(i) = seq.next_element::<String>()? {
                out.push(from_str(&i).map_err(serde::de::Error::custom)?);
            }
            Ok(out)
        }
    }

    deserializer.deserialize_any(ProtocolVersionVisitor)
}

pub fn serialize<S>(this: &[rustls::ProtocolVersion], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(
        this.iter()
            .map(|i| {
                as_str(*i).ok_or_else(|| {
                    serde::ser::Error::custom(format!("not a supported protocol version: {:?}", i))
                })
            })
            .collect::<Result<Vec<_>, S::Error>>()?,
    )
}
