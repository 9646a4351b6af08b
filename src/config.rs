/*
 * This file is a part of glintdb
 * glintdb is an in-memory key-value server speaking a partial
 * implementation of RESP3 over TCP.
 *
 * Copyright (c) glintdb contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! Startup configuration: CLI flags with environment-variable fallback.

use crate::util::error::{Error, SkyResult};
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "glintd", about = "An in-memory key-value server speaking RESP")]
pub struct Config {
    /// TCP port to listen on
    #[arg(long, env = "GLINTDB_PORT", default_value_t = 6379)]
    pub port: u16,

    /// Seconds between maintenance sweeps
    #[arg(long, env = "GLINTDB_CLEANUP_INTERVAL_SECONDS", default_value_t = 1024)]
    pub cleanup_interval_seconds: u32,

    /// Number of databases (stores) to allocate
    #[arg(long, env = "GLINTDB_NUM_DATABASES", default_value_t = 1)]
    pub num_databases: u8,

    /// Log level filter, passed straight through to env_logger
    #[arg(long, env = "GLINTDB_LOG", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn validate(&self) -> SkyResult<()> {
        if self.num_databases == 0 {
            return Err(Error::config("num_databases must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::parse_from(["glintd"]);
        assert_eq!(config.port, 6379);
        assert_eq!(config.cleanup_interval_seconds, 1024);
        assert_eq!(config.num_databases, 1);
    }

    #[test]
    fn cli_flags_override_defaults() {
        let config = Config::parse_from(["glintd", "--port", "7878", "--num-databases", "4"]);
        assert_eq!(config.port, 7878);
        assert_eq!(config.num_databases, 4);
    }
}
