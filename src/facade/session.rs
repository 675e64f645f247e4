// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;

use global::{SocketType, Domain};
use core::registry;
use facade::socket::Socket;
use io_error::*;

/// Handle to the process-wide machinery. The first session boots the
/// worker pool; sockets are created through it and stay usable on their
/// own afterwards. Dropping the last session terminates the library:
/// every open socket turns into a zombie whose blocked and future calls
/// fail, and only closing them remains meaningful.
pub struct Session {
    id: usize
}

impl Session {
    pub fn new() -> io::Result<Session> {
        Session::with_workers(2)
    }

    /// Sizes the worker pool the sockets get bound to, round-robin.
    /// Only the pool of the first live session takes effect.
    pub fn with_workers(count: usize) -> io::Result<Session> {
        if count == 0 {
            return Err(invalid_input_io_error("at least one worker is required"));
        }

        let id = registry::open_session(count)?;

        Ok(Session { id: id })
    }

    /// Creates a socket speaking the pattern on its cooked surface:
    /// the routing headers stay inside the library.
    pub fn create_socket(&self, socket_type: SocketType) -> io::Result<Socket> {
        self.create(Domain::Cooked, socket_type)
    }

    /// Creates a socket exposing the raw surface of the pattern, with
    /// the routing headers visible, for devices and forwarders.
    pub fn create_raw_socket(&self, socket_type: SocketType) -> io::Result<Socket> {
        self.create(Domain::Raw, socket_type)
    }

    fn create(&self, domain: Domain, socket_type: SocketType) -> io::Result<Socket> {
        let (fd, socket) = registry::create_socket(domain, socket_type, self.id)?;

        Ok(Socket::new(fd, socket_type, socket))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        registry::close_session(self.id);
    }
}
