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

//! The top-level collection of databases. Immutable once built: only the
//! entries inside each store change afterwards.

use crate::store::Store;

pub struct Server {
    stores: Vec<Store>,
}

impl Server {
    pub fn new(num_databases: u8) -> Self {
        let n = num_databases.max(1) as usize;
        let stores = (0..n).map(|_| Store::new()).collect();
        Self { stores }
    }

    pub fn get(&self, index: usize) -> Option<&Store> {
        self.stores.get(index)
    }

    pub fn is_valid(&self, index: usize) -> bool {
        index < self.stores.len()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Store> {
        self.stores.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_requested_number_of_stores() {
        let server = Server::new(3);
        assert_eq!(server.len(), 3);
        assert!(server.is_valid(2));
        assert!(!server.is_valid(3));
    }

    #[test]
    fn select_isolation_across_independent_sessions() {
        let server = Server::new(2);
        server.get(0).unwrap().set(b"k", b"db0".to_vec(), None);
        server.get(1).unwrap().set(b"k", b"db1".to_vec(), None);
        assert_eq!(
            server.get(0).unwrap().get(b"k", std::time::SystemTime::now()),
            Some(b"db0".to_vec())
        );
        assert_eq!(
            server.get(1).unwrap().get(b"k", std::time::SystemTime::now()),
            Some(b"db1".to_vec())
        );
    }
}
