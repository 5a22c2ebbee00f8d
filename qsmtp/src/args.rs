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
/// Command line of the qSMTP server
#[derive(Debug, clap::Parser, PartialEq, Eq)]
#[clap(about, version, author)]
pub struct Args {
    /// TOML configuration file, built-in defaults when absent
    #[clap(short, long, parse(from_os_str))]
    pub config: Option<std::path::PathBuf>,

    /// Run a command and exit instead of serving
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

/// Commands which do not start the server
#[derive(Debug, clap::Subcommand, PartialEq, Eq)]
pub enum Commands {
    /// Print the configuration in effect, defaults included, as JSON
    ConfigShow,
}
