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
use qsmtp::{Args, Commands};
use qsmtp_common::re::{
    anyhow::{self, Context},
    log,
};
use qsmtp_config::{get_log4rs_config, re::log4rs, Config};
use qsmtp_server::{bind_sockets, start_runtime};

fn main() -> anyhow::Result<()> {
    let args = <Args as clap::StructOpt>::parse();

    let config = match args.config {
        Some(config) => Config::from_path(&config).context("Cannot parse the configuration")?,
        None => Config::default(),
    };

    if let Some(command) = args.command {
        match command {
            Commands::ConfigShow => {
                let stringified = serde_json::to_string_pretty(&config)?;
                println!("Loaded configuration: {}", stringified);
                return Ok(());
            }
        }
    }

    get_log4rs_config(&config)
        .context("Logs configuration contain error")
        .map(log4rs::init_config)
        .context("Cannot initialize logs")??;

    let sockets = bind_sockets(&config)?;

    log::info!(
        "qSMTP {} serving '{}'",
        env!("CARGO_PKG_VERSION"),
        config.server.domain
    );

    start_runtime(std::sync::Arc::new(config), sockets)
}
