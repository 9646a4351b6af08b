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

//! Top-level wiring: binds the listener, spawns the maintenance worker, and
//! races the accept loop against shutdown signals.

use crate::config::Config;
use crate::maintenance;
use crate::net::listener::BaseListener;
use crate::net::terminator::Terminator;
use crate::pool::BufferPool;
use crate::server::Server;
use crate::util::error::SkyResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

#[cfg(unix)]
use core::{future::Future, pin::Pin, task::Context, task::Poll};
#[cfg(unix)]
use tokio::signal::unix::{signal as fnsignal, Signal, SignalKind};

#[cfg(unix)]
/// Binds a single future to whichever of SIGHUP/SIGQUIT/SIGTERM arrives first.
struct UnixTerminationSignal {
    hup: Signal,
    quit: Signal,
    term: Signal,
}

#[cfg(unix)]
impl UnixTerminationSignal {
    fn init() -> std::io::Result<Self> {
        Ok(Self {
            hup: fnsignal(SignalKind::hangup())?,
            quit: fnsignal(SignalKind::quit())?,
            term: fnsignal(SignalKind::terminate())?,
        })
    }
}

#[cfg(unix)]
impl Future for UnixTerminationSignal {
    type Output = Option<()>;
    fn poll(mut self: Pin<&mut Self>, ctx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.hup.poll_recv(ctx).is_ready()
            || self.quit.poll_recv(ctx).is_ready()
            || self.term.poll_recv(ctx).is_ready()
        {
            return Poll::Ready(Some(()));
        }
        Poll::Pending
    }
}

/// Buffer pool sizing: a handful of power-of-two buckets starting at the
/// default connection buffer size, each with a modest fixed capacity.
const POOL_BASE_SIZE: usize = crate::net::connection::CONNECTION_BUFFER_SIZE;
const POOL_NUM_BUCKETS: usize = 4;
const POOL_CAPACITY_PER_BUCKET: usize = 256;

/// Runs the server until a shutdown signal arrives. Returns `Ok(())` on clean
/// shutdown; an `Err` here is always a startup failure (bind, etc).
pub async fn run(config: Config) -> SkyResult<()> {
    let server = Arc::new(Server::new(config.num_databases));
    let pool = Arc::new(BufferPool::new(
        POOL_BASE_SIZE,
        POOL_NUM_BUCKETS,
        POOL_CAPACITY_PER_BUCKET,
    ));

    let (signal, _) = broadcast::channel(1);

    let listener = BaseListener::bind(
        Arc::clone(&server),
        Arc::clone(&pool),
        config.port,
        signal.clone(),
    )
    .await
    .map_err(|e| crate::util::error::Error::ioerror_extra(e, "binding the listener"))?;

    let maintenance_handle = tokio::task::spawn(maintenance::scheduler(
        Arc::clone(&server),
        Duration::from_secs(config.cleanup_interval_seconds as u64),
        Terminator::new(signal.subscribe()),
    ));

    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = listener.run() => {}
            _ = ctrl_c => {}
        }
    }
    #[cfg(unix)]
    {
        let term = UnixTerminationSignal::init()
            .map_err(|e| crate::util::error::Error::ioerror_extra(e, "binding unix signals"))?;
        tokio::select! {
            _ = listener.run() => {}
            _ = ctrl_c => {}
            _ = term => {}
        }
    }

    log::info!("signalling all workers to shut down");
    drop(signal);
    let _ = maintenance_handle.await;
    Ok(())
}
