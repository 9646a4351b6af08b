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

//! # glintdb
//!
//! An in-memory key-value server speaking a partial RESP3 over TCP. See the
//! module tree for the codec, store, dispatch and orchestration layers.

pub mod arbiter;
pub mod config;
pub mod dispatch;
pub mod maintenance;
pub mod net;
pub mod pool;
pub mod resp;
pub mod server;
pub mod store;
pub mod util;
