// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};

use mio::tcp::{TcpListener, TcpStream};

use io_error::*;

pub fn resolve(addr: &str) -> io::Result<SocketAddr> {
    addr.to_socket_addrs()?.
        next().
        ok_or_else(|| invalid_input_io_error("address did not resolve"))
}

pub fn bind(addr: &str) -> io::Result<TcpListener> {
    let sockaddr = resolve(addr)?;

    TcpListener::bind(&sockaddr)
}

pub fn connect(addr: &SocketAddr, no_delay: bool) -> io::Result<TcpStream> {
    let stream = TcpStream::connect(addr)?;

    stream.set_nodelay(no_delay)?;
    Ok(stream)
}
