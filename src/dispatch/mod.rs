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

//! Command dispatch: resolves a decoded request array to one of the five
//! supported commands and runs it against the session's selected store.

use crate::resp::responses;
use crate::resp::{DataKind, DataView};
use crate::server::Server;
use crate::store::entry::{deadline_from, TtlUnit};
use crate::util::compiler::unlikely;
use std::time::SystemTime;

mod tags {
    pub const PING: &[u8] = b"PING";
    pub const ECHO: &[u8] = b"ECHO";
    pub const GET: &[u8] = b"GET";
    pub const SET: &[u8] = b"SET";
    pub const SELECT: &[u8] = b"SELECT";
    pub const EX: &[u8] = b"EX";
    pub const PX: &[u8] = b"PX";
}

/// Per-connection dispatch state: which database this session currently
/// targets. Not shared across connections.
pub struct Session<'a> {
    server: &'a Server,
    selected_db: usize,
}

impl<'a> Session<'a> {
    pub fn new(server: &'a Server) -> Self {
        Self {
            server,
            selected_db: 0,
        }
    }

    pub fn process(&mut self, request: &DataView<'_>) -> Vec<u8> {
        let Some(args) = request.as_array() else {
            return responses::PARSE_ERR.to_vec();
        };
        // the command name must be a BulkString specifically; a SimpleString
        // in first position is wire-legal but not a valid request per §4.4
        let Some(name) = args
            .first()
            .filter(|v| v.kind() == DataKind::BulkString)
            .and_then(|v| v.as_bytes())
        else {
            return responses::PARSE_ERR.to_vec();
        };

        let is_known = matches!(
            name,
            tags::PING | tags::ECHO | tags::GET | tags::SET | tags::SELECT
        );
        if unlikely(!is_known) {
            return unknown_command(name);
        }

        match name {
            tags::PING => self.cmd_ping(args),
            tags::ECHO => self.cmd_echo(args),
            tags::GET => self.cmd_get(args),
            tags::SET => self.cmd_set(args),
            tags::SELECT => self.cmd_select(args),
            _ => unreachable!("is_known was checked above"),
        }
    }

    fn cmd_ping(&self, args: &[DataView<'_>]) -> Vec<u8> {
        if args.len() != 1 {
            return responses::simple_error("wrong number of arguments for PING");
        }
        responses::PONG.to_vec()
    }

    fn cmd_echo(&self, args: &[DataView<'_>]) -> Vec<u8> {
        if args.len() != 2 {
            return responses::simple_error("wrong number of arguments for ECHO");
        }
        match args[1].as_bytes() {
            Some(payload) => responses::bulk_string(payload),
            None => responses::simple_error("ECHO argument must be a bulk string"),
        }
    }

    fn cmd_get(&self, args: &[DataView<'_>]) -> Vec<u8> {
        if args.len() != 2 {
            return responses::simple_error("wrong number of arguments for GET");
        }
        let Some(key) = args[1].as_bytes() else {
            return responses::simple_error("GET argument must be a bulk string");
        };
        let store = self
            .server
            .get(self.selected_db)
            .expect("selected_db was validated by SELECT");
        match store.get(key, SystemTime::now()) {
            Some(value) => responses::bulk_string(&value),
            None => responses::NULL.to_vec(),
        }
    }

    fn cmd_set(&self, args: &[DataView<'_>]) -> Vec<u8> {
        if args.len() != 3 && args.len() != 5 {
            return responses::simple_error("wrong number of arguments for SET");
        }
        let (Some(key), Some(value)) = (args[1].as_bytes(), args[2].as_bytes()) else {
            return responses::simple_error("SET key and value must be bulk strings");
        };

        let now = SystemTime::now();
        let ttl = if args.len() == 5 {
            let (Some(unit_tag), Some(amount_bytes)) = (args[3].as_bytes(), args[4].as_bytes())
            else {
                return responses::simple_error("SET TTL arguments must be bulk strings");
            };
            let unit = match unit_tag {
                tags::EX => TtlUnit::Seconds,
                tags::PX => TtlUnit::Millis,
                _ => return responses::simple_error("SET TTL unit must be EX or PX"),
            };
            let Some(amount) = std::str::from_utf8(amount_bytes)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
            else {
                return responses::simple_error("SET TTL amount must be an integer");
            };
            match deadline_from(now, amount, unit) {
                Some(deadline) => Some(deadline),
                None => return responses::simple_error("SET TTL must be positive"),
            }
        } else {
            None
        };

        let store = self
            .server
            .get(self.selected_db)
            .expect("selected_db was validated by SELECT");
        store.set(key, value.to_vec(), ttl);
        responses::OKAY.to_vec()
    }

    fn cmd_select(&mut self, args: &[DataView<'_>]) -> Vec<u8> {
        if args.len() != 2 {
            return responses::simple_error("wrong number of arguments for SELECT");
        }
        let Some(index_bytes) = args[1].as_bytes() else {
            return responses::INVALID_DB_INDEX.to_vec();
        };
        let parsed = std::str::from_utf8(index_bytes)
            .ok()
            .and_then(|s| s.parse::<usize>().ok());
        match parsed {
            Some(index) if self.server.is_valid(index) => {
                self.selected_db = index;
                responses::OKAY.to_vec()
            }
            _ => responses::INVALID_DB_INDEX.to_vec(),
        }
    }
}

/// The dispatcher's cold path: a live client sends one of the five known
/// commands far more often than an unrecognized one.
#[cold]
#[inline(never)]
fn unknown_command(name: &[u8]) -> Vec<u8> {
    let mut msg = String::from("Unknown command: ");
    msg.push_str(&String::from_utf8_lossy(name));
    responses::simple_error(&msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resp::decode;

    fn server() -> Server {
        Server::new(2)
    }

    #[test]
    fn ping() {
        let srv = server();
        let mut session = Session::new(&srv);
        let (req, _) = decode(b"*1\r\n$4\r\nPING\r\n").unwrap();
        assert_eq!(session.process(&req), b"+PONG\r\n".to_vec());
    }

    #[test]
    fn echo() {
        let srv = server();
        let mut session = Session::new(&srv);
        let (req, _) = decode(b"*2\r\n$4\r\nECHO\r\n$5\r\nhello\r\n").unwrap();
        assert_eq!(session.process(&req), b"$5\r\nhello\r\n".to_vec());
    }

    #[test]
    fn set_then_get() {
        let srv = server();
        let mut session = Session::new(&srv);
        let (set_req, _) = decode(b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n").unwrap();
        assert_eq!(session.process(&set_req), b"+OK\r\n".to_vec());
        let (get_req, _) = decode(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n").unwrap();
        assert_eq!(session.process(&get_req), b"$3\r\nbar\r\n".to_vec());
    }

    #[test]
    fn set_with_px_then_expired_get() {
        let srv = server();
        let mut session = Session::new(&srv);
        let (set_req, _) =
            decode(b"*5\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nPX\r\n$2\r\n50\r\n").unwrap();
        assert_eq!(session.process(&set_req), b"+OK\r\n".to_vec());
        std::thread::sleep(std::time::Duration::from_millis(100));
        let (get_req, _) = decode(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n").unwrap();
        assert_eq!(session.process(&get_req), b"_\r\n".to_vec());
    }

    #[test]
    fn select_out_of_range() {
        let srv = Server::new(1);
        let mut session = Session::new(&srv);
        let (req, _) = decode(b"*2\r\n$6\r\nSELECT\r\n$1\r\n9\r\n").unwrap();
        assert_eq!(session.process(&req), b"-Invalid database index\r\n".to_vec());
    }

    #[test]
    fn select_isolation_between_sessions() {
        let srv = Server::new(3);
        let mut a = Session::new(&srv);
        let mut b = Session::new(&srv);
        let (select_a, _) = decode(b"*2\r\n$6\r\nSELECT\r\n$1\r\n1\r\n").unwrap();
        a.process(&select_a);
        assert_eq!(a.selected_db, 1);
        assert_eq!(b.selected_db, 0);
    }

    #[test]
    fn unknown_command_reports_name() {
        let srv = server();
        let mut session = Session::new(&srv);
        let (req, _) = decode(b"*1\r\n$4\r\nNOPE\r\n").unwrap();
        assert_eq!(session.process(&req), b"-Unknown command: NOPE\r\n".to_vec());
    }

    #[test]
    fn malformed_request_not_an_array() {
        let srv = server();
        let mut session = Session::new(&srv);
        let (req, _) = decode(b"+PING\r\n").unwrap();
        assert_eq!(session.process(&req), responses::PARSE_ERR.to_vec());
    }

    #[test]
    fn array_with_simple_string_command_name_is_rejected() {
        // wire-legal per the decoder, but §4.4 requires the command name to
        // be a BulkString specifically, not merely bytes-convertible
        let srv = server();
        let mut session = Session::new(&srv);
        let (req, _) = decode(b"*1\r\n+PING\r\n").unwrap();
        assert_eq!(session.process(&req), responses::PARSE_ERR.to_vec());
    }
}
