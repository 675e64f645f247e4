// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

//! Filament is a brokerless messaging library.
//! It provides a family of scalability protocols: each socket type implements
//! one messaging pattern (request/reply, publish/subscribe, pipeline, survey,
//! pair, bus, fan-in, state replication) on top of pluggable transports.
//!
//! A [Session](struct.Session.html) owns the process-wide machinery.
//! Sockets are created through it, then attached to one or more endpoints
//! via [bind](struct.Socket.html#method.bind) and
//! [connect](struct.Socket.html#method.connect), and exchange whole messages
//! with the semantics of their pattern, across however many peers are
//! currently connected.
//!
//! ```no_run
//! use filament::{Session, SocketType};
//!
//! let session = Session::new().unwrap();
//! let mut pull = session.create_socket(SocketType::Pull).unwrap();
//! let mut push = session.create_socket(SocketType::Push).unwrap();
//!
//! pull.bind("inproc://doc").unwrap();
//! push.connect("inproc://doc").unwrap();
//!
//! push.send(vec![65, 66, 67]).unwrap();
//! let received = pull.recv().unwrap();
//! # drop(received);
//! ```

#[macro_use]
extern crate log;
extern crate byteorder;
extern crate time;
extern crate mio;
extern crate mio_uds;
extern crate iovec;

mod global;
mod io_error;
mod message;
mod core;
mod proto;
mod reactor;
mod transport;
mod facade;

pub use global::{SocketType, Domain};
pub use message::{Chunk, Message};
pub use core::options::{SocketOption, OptionName};
pub use facade::session::Session;
pub use facade::socket::Socket;
pub use facade::endpoint::Endpoint;
