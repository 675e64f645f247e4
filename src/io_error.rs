// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

//! Constructors for the errors the library reports.
//! Everything is a `std::io::Error`; the kinds used are:
//!
//! - `WouldBlock`: non-blocking operation would block
//! - `TimedOut`: send/recv timeout or handshake deadline expired
//! - `InvalidInput`: bad option value, malformed or over-long address
//! - `InvalidData`: malformed wire data (bad handshake, bad framing)
//! - `AddrInUse`: bind target already bound
//! - `AlreadyExists`: second connection on an exclusive socket
//! - `NotFound`: operation on an unknown socket or endpoint
//! - `Interrupted`: the wait was interrupted
//! - `Other`: state machine violation, unsupported operation, unknown
//!   option, unknown transport, socket table full, library termination

use std::io::{Error, ErrorKind};

pub fn other_io_error(msg: &'static str) -> Error {
    Error::new(ErrorKind::Other, msg)
}

pub fn invalid_data_io_error(msg: &'static str) -> Error {
    Error::new(ErrorKind::InvalidData, msg)
}

pub fn would_block_io_error(msg: &'static str) -> Error {
    Error::new(ErrorKind::WouldBlock, msg)
}

pub fn invalid_input_io_error(msg: &'static str) -> Error {
    Error::new(ErrorKind::InvalidInput, msg)
}

pub fn timed_out_io_error(msg: &'static str) -> Error {
    Error::new(ErrorKind::TimedOut, msg)
}

/// The operation is illegal in the current state of the protocol,
/// for example receiving on a req socket that has no request in flight.
pub fn fsm_io_error(msg: &'static str) -> Error {
    Error::new(ErrorKind::Other, msg)
}

pub fn terminated_io_error() -> Error {
    Error::new(ErrorKind::Other, "library termination in progress")
}

pub fn not_supported_io_error(msg: &'static str) -> Error {
    Error::new(ErrorKind::Other, msg)
}

pub fn no_option_io_error() -> Error {
    Error::new(ErrorKind::Other, "option not supported at this level")
}

pub fn proto_not_supported_io_error() -> Error {
    Error::new(ErrorKind::Other, "transport protocol not supported")
}

pub fn too_many_sockets_io_error() -> Error {
    Error::new(ErrorKind::Other, "socket table is full")
}

pub fn bad_descriptor_io_error() -> Error {
    Error::new(ErrorKind::NotFound, "no such socket")
}

pub fn already_connected_io_error() -> Error {
    Error::new(ErrorKind::AlreadyExists, "socket already has a peer")
}

pub fn addr_in_use_io_error() -> Error {
    Error::new(ErrorKind::AddrInUse, "address already bound")
}

pub fn addr_too_long_io_error() -> Error {
    Error::new(ErrorKind::InvalidInput, "address exceeds 128 bytes")
}
