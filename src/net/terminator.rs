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

use tokio::sync::broadcast;

/// Wraps the shutdown broadcast channel's receiving half so call sites read
/// as "wait for a termination signal" rather than juggling `broadcast::Receiver`
/// directly.
pub struct Terminator {
    receiver: broadcast::Receiver<()>,
}

impl Terminator {
    pub fn new(receiver: broadcast::Receiver<()>) -> Self {
        Self { receiver }
    }

    /// Resolves once a shutdown signal has been broadcast. A lagged receiver
    /// (missed signals) is treated the same as a fresh one — the only signal
    /// ever sent is "shut down", so any delivery is enough.
    pub async fn receive_signal(&mut self) {
        let _ = self.receiver.recv().await;
    }
}

impl Clone for Terminator {
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.resubscribe(),
        }
    }
}
