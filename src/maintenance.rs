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

//! The maintenance worker: periodic sweeps that drain each store's
//! pending-delete queue and sample random keys for expiry.

use crate::net::terminator::Terminator;
use crate::server::Server;
use crate::store::DEFAULT_SWEEP_SAMPLES;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio::time;

/// One full sweep over every store. Runs on a blocking-pool thread since it
/// takes each store's exclusive lock for the duration of its pass.
pub fn do_work(server: &Server, now: SystemTime) {
    for store in server.iter() {
        store.handle_deletes(now, DEFAULT_SWEEP_SAMPLES);
    }
}

/// Dispatches [`do_work`] onto a blocking-pool thread and returns a handle to
/// it immediately; the sweep itself runs with `now` captured at the moment
/// the blocking thread actually starts.
pub fn do_work_async(server: Arc<Server>) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        do_work(&server, SystemTime::now());
    })
}

/// Drives the maintenance schedule: at most one sweep in flight at a time.
/// On each tick, the previous sweep is polled with a bounded ~500us wait; if
/// it already finished, a new one is launched immediately, otherwise the
/// existing one is left running and re-polled on the next tick instead of
/// being cancelled.
pub async fn scheduler(
    server: Arc<Server>,
    cleanup_interval: Duration,
    mut terminator: Terminator,
) {
    let mut inflight: Option<JoinHandle<()>> = None;
    loop {
        tokio::select! {
            _ = time::sleep(cleanup_interval) => {
                inflight = match inflight.take() {
                    Some(mut handle) => {
                        match time::timeout(Duration::from_micros(500), &mut handle).await {
                            Ok(_) => Some(do_work_async(server.clone())),
                            Err(_) => Some(handle),
                        }
                    }
                    None => Some(do_work_async(server.clone())),
                };
            }
            _ = terminator.receive_signal() => {
                log::info!("maintenance worker exiting on shutdown signal");
                break;
            }
        }
    }
}
