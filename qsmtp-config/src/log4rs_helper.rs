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
use crate::Config;
use qsmtp_common::re::{anyhow, log};

const CONSOLE_FORMAT: &str = "{d(%Y-%m-%d %H:%M:%S)} {h({l:<5})} {t:<12} $ {m}{n}";

/// Build the logging configuration: a console appender, plus a file appender
/// when `server.logs.filepath` is set.
///
/// The entry `default` of `server.logs.level` is the level of the root
/// logger, the other entries are levels of targets (see [crate::log_channel]).
///
/// # Errors
///
/// * the log file cannot be created
/// * a logger is ill-formed
pub fn get_log4rs_config(config: &Config) -> anyhow::Result<log4rs::Config> {
    use anyhow::Context;
    use log4rs::{append, config, encode};

    let mut builder = log4rs::Config::builder().appender(config::Appender::builder().build(
        "stdout",
        Box::new(
            append::console::ConsoleAppender::builder()
                .encoder(Box::new(encode::pattern::PatternEncoder::new(
                    CONSOLE_FORMAT,
                )))
                .build(),
        ),
    ));
    let mut root = config::Root::builder().appender("stdout");

    if let Some(filepath) = &config.server.logs.filepath {
        let server = append::file::FileAppender::builder()
            .encoder(Box::new(encode::pattern::PatternEncoder::new(
                &config.server.logs.format,
            )))
            .build(filepath)
            .with_context(|| format!("For filepath: '{}'", filepath.display()))?;

        builder = builder.appender(config::Appender::builder().build("server", Box::new(server)));
        root = root.appender("server");
    }

    builder
        .loggers(
            config
                .server
                .logs
                .level
                .iter()
                .filter(|(name, _)| name.as_str() != "default")
                .map(|(name, level)| config::Logger::builder().build(name, *level)),
        )
        .build(
            root.build(
                *config
                    .server
                    .logs
                    .level
                    .get("default")
                    .unwrap_or(&log::LevelFilter::Info),
            ),
        )
        .map_err(|e| {
            e.errors().iter().for_each(|e| log::error!("{}", e));
            anyhow::anyhow!(e)
        })
}
