// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

//! The transports and the registry that maps address schemes onto them.
//! A transport's job ends at the pipe contract: parse its addresses,
//! produce connections, and move whole messages in FIFO order per pipe.

pub mod inproc;
pub mod stream;
pub mod tcp;
pub mod ipc;

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use mio;
use mio_uds;

use global::*;
use reactor::{WorkerHandle, Request};
use io_error::*;

/// Max size of an address, including the terminator byte the wire
/// representation reserves for it.
pub const ADDR_MAX: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Inproc,
    Tcp,
    Ipc
}

struct TransportEntry {
    name: &'static str,
    scheme: Scheme
}

static TRANSPORTS: &'static [TransportEntry] = &[
    TransportEntry { name: "inproc", scheme: Scheme::Inproc },
    TransportEntry { name: "tcp",    scheme: Scheme::Tcp },
    TransportEntry { name: "ipc",    scheme: Scheme::Ipc }
];

/// Everything a transport needs to know about the endpoint it serves:
/// whose pipe it will create, how to validate the peer, where to deliver
/// notifications, and the buffer and reconnection settings in effect.
#[derive(Clone)]
pub struct EndpointContext {
    pub sid: SocketId,
    pub eid: EndpointId,
    pub protocol: u16,
    pub ispeer: fn(u16) -> bool,
    pub worker: WorkerHandle,
    pub sndbuf: usize,
    pub rcvbuf: usize,
    pub reconnect_ivl: Duration,
    pub reconnect_ivl_max: Duration,
    pub tcp_no_delay: bool
}

/// A listening stream socket, created synchronously so that bind errors
/// surface to the caller, then shipped to the worker for registration.
pub enum Listener {
    Tcp(mio::tcp::TcpListener),
    Ipc(mio_uds::UnixListener)
}

impl Listener {
    pub fn evented(&self) -> &dyn mio::Evented {
        match *self {
            Listener::Tcp(ref listener) => listener,
            Listener::Ipc(ref listener) => listener
        }
    }

    pub fn accept(&self, no_delay: bool) -> io::Result<Option<Box<dyn stream::StepStream>>> {
        match *self {
            Listener::Tcp(ref listener) => {
                match listener.accept() {
                    Ok((stream, _)) => {
                        stream.set_nodelay(no_delay)?;
                        Ok(Some(Box::new(stream)))
                    },
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
                    Err(e) => Err(e)
                }
            },
            Listener::Ipc(ref listener) => {
                match listener.accept() {
                    Ok(Some((stream, _))) => Ok(Some(Box::new(stream))),
                    Ok(None) => Ok(None),
                    Err(e) => Err(e)
                }
            }
        }
    }
}

pub struct BindSpec {
    pub listener: Listener,
    pub ctx: EndpointContext
}

#[derive(Clone)]
pub enum ConnectTarget {
    Tcp(SocketAddr),
    Ipc(PathBuf)
}

pub struct ConnectSpec {
    pub target: ConnectTarget,
    pub ctx: EndpointContext
}

pub fn parse(addr: &str) -> io::Result<Scheme> {
    if addr.len() + 1 > ADDR_MAX {
        return Err(addr_too_long_io_error());
    }

    let separator = match addr.find("://") {
        Some(position) => position,
        None => return Err(invalid_input_io_error("malformed address"))
    };
    let (scheme, rest) = addr.split_at(separator);

    if rest.len() <= 3 {
        return Err(invalid_input_io_error("malformed address"));
    }

    TRANSPORTS.iter().
        find(|entry| entry.name == scheme).
        map(|entry| entry.scheme).
        ok_or_else(proto_not_supported_io_error)
}

fn specific(addr: &str) -> &str {
    match addr.find("://") {
        Some(position) => &addr[position + 3..],
        None => addr
    }
}

pub fn bind(addr: &str, ctx: EndpointContext) -> io::Result<()> {
    match parse(addr)? {
        Scheme::Inproc => inproc::bind(addr, ctx),
        Scheme::Tcp => {
            let listener = tcp::bind(specific(addr))?;
            let worker = ctx.worker.clone();

            worker.send(Request::Bind(BindSpec {
                listener: Listener::Tcp(listener),
                ctx: ctx
            }));
            Ok(())
        },
        Scheme::Ipc => {
            let listener = ipc::bind(specific(addr))?;
            let worker = ctx.worker.clone();

            worker.send(Request::Bind(BindSpec {
                listener: Listener::Ipc(listener),
                ctx: ctx
            }));
            Ok(())
        }
    }
}

pub fn connect(addr: &str, ctx: EndpointContext) -> io::Result<()> {
    let target = match parse(addr)? {
        Scheme::Inproc => return inproc::connect(addr, ctx),
        Scheme::Tcp => ConnectTarget::Tcp(tcp::resolve(specific(addr))?),
        Scheme::Ipc => ConnectTarget::Ipc(PathBuf::from(specific(addr)))
    };
    let worker = ctx.worker.clone();

    worker.send(Request::Connect(ConnectSpec {
        target: target,
        ctx: ctx
    }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_the_known_schemes() {
        assert_eq!(Scheme::Inproc, parse("inproc://name").unwrap());
        assert_eq!(Scheme::Tcp, parse("tcp://127.0.0.1:5454").unwrap());
        assert_eq!(Scheme::Ipc, parse("ipc:///tmp/sock.ipc").unwrap());
    }

    #[test]
    fn parse_rejects_bad_addresses() {
        assert!(parse("udp://127.0.0.1:5454").is_err());
        assert!(parse("no-separator").is_err());
        assert!(parse("tcp://").is_err());

        let long = format!("inproc://{}", "x".repeat(150));
        assert!(parse(&long).is_err());
    }
}
