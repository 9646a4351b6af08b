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

use clap::Parser;
use glintdb::config::Config;
use std::process;

#[cfg(not(target_env = "msvc"))]
use jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn main() {
    let config = Config::parse();
    env_logger::Builder::new()
        .parse_filters(&config.log_level)
        .init();

    if let Err(e) = config.validate() {
        log::error!("[critical] invalid configuration: {e}");
        // the teacher's own `process::exit(0x100)` convention truncates to a
        // zero exit status on Unix (the kernel masks exit codes to 8 bits);
        // this spec requires a non-zero code on startup failure, so use 1
        process::exit(1);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime");

    let result = runtime.block_on(glintdb::arbiter::run(config));
    drop(runtime);

    match result {
        Ok(()) => {
            log::info!("goodbye");
        }
        Err(e) => {
            log::error!("[critical] startup failure: {e}");
            process::exit(1);
        }
    }
}
