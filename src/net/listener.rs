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

//! The acceptor: one listener, one connection task spawned per accepted
//! socket.

use crate::net::connection::ConnectionHandler;
use crate::net::terminator::Terminator;
use crate::pool::BufferPool;
use crate::server::Server;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::sleep;

/// Exponential backoff applied between failed `accept` calls, mirroring the
/// teacher's accept-loop backoff so a storm of transient accept errors
/// doesn't spin the executor.
struct AcceptBackoff {
    current: u8,
}

const MAX_BACKOFF_MS: u8 = 64;

impl AcceptBackoff {
    fn new() -> Self {
        Self { current: 1 }
    }

    async fn spin(&mut self) {
        sleep(Duration::from_millis(self.current as u64)).await;
        if self.current < MAX_BACKOFF_MS {
            self.current *= 2;
        }
    }
}

pub struct BaseListener {
    server: Arc<Server>,
    listener: TcpListener,
    pool: Arc<BufferPool>,
    signal: broadcast::Sender<()>,
}

impl BaseListener {
    pub async fn bind(
        server: Arc<Server>,
        pool: Arc<BufferPool>,
        port: u16,
        signal: broadcast::Sender<()>,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        Ok(Self {
            server,
            listener,
            pool,
            signal,
        })
    }

    /// The address actually bound, e.g. to discover the ephemeral port
    /// assigned when `bind` was called with port 0.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop until a shutdown signal arrives.
    pub async fn run(&self) {
        let mut backoff = AcceptBackoff::new();
        let mut terminator = Terminator::new(self.signal.subscribe());
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            backoff = AcceptBackoff::new();
                            self.spawn_connection(stream);
                        }
                        Err(e) => {
                            log::error!("accept error: {e}");
                            backoff.spin().await;
                        }
                    }
                }
                _ = terminator.receive_signal() => {
                    log::info!("acceptor exiting on shutdown signal");
                    return;
                }
            }
        }
    }

    fn spawn_connection(&self, stream: tokio::net::TcpStream) {
        let server = Arc::clone(&self.server);
        let pool = Arc::clone(&self.pool);
        let terminator = Terminator::new(self.signal.subscribe());
        match ConnectionHandler::new(server, stream, &pool, terminator) {
            Some(handler) => {
                tokio::task::spawn(async move {
                    handler.run().await;
                });
            }
            None => {
                log::error!("buffer pool exhausted; dropping connection");
            }
        }
    }
}
