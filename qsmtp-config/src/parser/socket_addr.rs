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

/// Accept either one address or an array of addresses
pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<std::net::SocketAddr>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct SocketAddrVisitor;

    impl<'de> serde::de::Visitor<'de> for SocketAddrVisitor {
        type Value = Vec<std::net::SocketAddr>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a socket address or an array of socket addresses")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse(v).map(|addr| vec![addr]).map_err(E::custom)
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: serde::de::SeqAccess<'de>,
        {
            let mut out = vec![];
            while let Some(i) = seq.next_element::<String>()? {
                out.push(parse(&i).map_err(serde::de::Error::custom)?);
            }
            Ok(out)
        }
    }

    deserializer.deserialize_any(SocketAddrVisitor)
}

fn parse(input: &str) -> anyhow::Result<std::net::SocketAddr> {
    <std::net::SocketAddr as std::str::FromStr>::from_str(input)
        .map_err(|e| anyhow::anyhow!("not a valid socket address: '{input}' ({e})"))
}
