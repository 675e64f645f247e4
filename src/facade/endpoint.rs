// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::fmt;
use std::io;
use std::sync::Arc;

use global::EndpointId;
use core::sock;

/// One local or remote attachment point of a socket, as returned by
/// [bind](struct.Socket.html#method.bind) and
/// [connect](struct.Socket.html#method.connect).
pub struct Endpoint {
    socket: Arc<sock::Socket>,
    eid: EndpointId
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Endpoint").field("eid", &self.eid).finish()
    }
}

impl Endpoint {

    #[doc(hidden)]
    pub fn new(socket: Arc<sock::Socket>, eid: EndpointId) -> Endpoint {
        Endpoint {
            socket: socket,
            eid: eid
        }
    }

    /// Removes the endpoint from its socket. Traffic in flight on the
    /// socket's other endpoints is unaffected; the transport side of this
    /// endpoint may finish draining asynchronously.
    pub fn shutdown(self) -> io::Result<()> {
        self.socket.shutdown_endpoint(self.eid)
    }
}
