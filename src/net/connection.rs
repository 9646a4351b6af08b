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

//! Per-connection read/decode/dispatch/write loop.

use crate::dispatch::Session;
use crate::net::terminator::Terminator;
use crate::pool::{BufferPool, PooledBuffer};
use crate::resp::{decode, responses};
use crate::server::Server;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Buffers are requested at this size from the pool; the codec only ever
/// needs to see one request per read (fragmentation across reads is out of
/// scope, see the maintenance/orchestration design notes).
pub const CONNECTION_BUFFER_SIZE: usize = 4096;

pub struct ConnectionHandler {
    server: Arc<Server>,
    stream: TcpStream,
    buffer: PooledBuffer,
    terminator: Terminator,
}

impl ConnectionHandler {
    /// Acquires one buffer from `pool` for the lifetime of this connection.
    /// Returns `None` if the pool is exhausted; the caller is expected to log
    /// and close the socket in that case.
    pub fn new(
        server: Arc<Server>,
        stream: TcpStream,
        pool: &Arc<BufferPool>,
        terminator: Terminator,
    ) -> Option<Self> {
        let buffer = pool.acquire(CONNECTION_BUFFER_SIZE)?;
        Some(Self {
            server,
            stream,
            buffer,
            terminator,
        })
    }

    pub async fn run(mut self) {
        let mut session = Session::new(&self.server);
        loop {
            let n = tokio::select! {
                result = self.stream.read(&mut self.buffer) => result,
                _ = self.terminator.receive_signal() => {
                    log::info!("connection exiting on shutdown signal");
                    return;
                }
            };
            let n = match n {
                Ok(0) => {
                    // clean EOF
                    return;
                }
                Ok(n) => n,
                Err(e) => {
                    log::error!("read error on connection: {e}");
                    return;
                }
            };

            let reply = match decode(&self.buffer[..n]) {
                Ok((view, _consumed)) => session.process(&view),
                Err(e) => responses::simple_error(e.message()),
            };

            if let Err(e) = self.stream.write_all(&reply).await {
                log::error!("write error on connection: {e}");
                // per the error-handling design, a write failure does not
                // close the connection outright: the next read will likely
                // surface the same failure and exit cleanly from there
                continue;
            }
        }
    }
}
