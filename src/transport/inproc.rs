// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

//! The in-process transport. There is no wire: the two pipes of a
//! connection share a pair of bounded queues and messages transfer by
//! ownership, header/body split preserved. Rendezvous goes through the
//! global board: a bind claims its name and adopts every parked connect
//! whose protocol is a valid peer, a connect pairs with the live bind or
//! parks, and a connect whose pipe dies parks again until the name is
//! re-bound.

use std::io;
use std::sync::{Arc, Mutex};

use global::{SocketId, EndpointId};
use core::registry;
use core::pipe::{Pipe, MsgQueue};
use super::EndpointContext;
use io_error::*;

pub fn bind(addr: &str, ctx: EndpointContext) -> io::Result<()> {
    let parked = registry::inproc_bind(addr, ctx.clone())?;

    // adopt every connect that was waiting for this name
    for peer in parked {
        if let Err(e) = pair(&ctx, &peer) {
            debug!("inproc '{}': parked connect not paired: '{}'", addr, e);
        }
    }

    Ok(())
}

pub fn connect(addr: &str, ctx: EndpointContext) -> io::Result<()> {
    match registry::inproc_connect(addr, ctx.clone()) {
        Some(bind_ctx) => pair(&bind_ctx, &ctx),
        None => Ok(())
    }
}

/// Puts a connect endpoint back on the board after its pipe was lost,
/// pairing right away when the name is already bound again.
pub fn park(addr: &str, ctx: EndpointContext) {
    if let Err(e) = connect(addr, ctx) {
        debug!("inproc '{}': lost connect not re-paired: '{}'", addr, e);
    }
}

pub fn unbind(addr: &str, sid: SocketId, eid: EndpointId) {
    registry::inproc_unbind(addr, sid, eid);
}

pub fn unpark(addr: &str, sid: SocketId, eid: EndpointId) {
    registry::inproc_unpark(addr, sid, eid);
}

/// Builds the two pipes of an in-process connection and attaches them to
/// their sockets. The queue bound in each direction is the sum of the
/// sender's send buffer and the receiver's receive buffer.
fn pair(bind: &EndpointContext, conn: &EndpointContext) -> io::Result<()> {
    let bind_sock = registry::find_socket(bind.sid).ok_or_else(bad_descriptor_io_error)?;
    let conn_sock = registry::find_socket(conn.sid).ok_or_else(bad_descriptor_io_error)?;

    let to_bind = Arc::new(Mutex::new(MsgQueue::new(conn.sndbuf + bind.rcvbuf, true)));
    let to_conn = Arc::new(Mutex::new(MsgQueue::new(bind.sndbuf + conn.rcvbuf, true)));

    let bind_pipe = Pipe::new_inproc(
        registry::next_pipe_id(), bind.eid, bind.sid, bind.worker.clone(), conn.protocol, to_bind);
    let conn_pipe = Pipe::new_inproc(
        registry::next_pipe_id(), conn.eid, conn.sid, conn.worker.clone(), bind.protocol, to_conn);

    bind_pipe.link_inproc(&conn_pipe);
    conn_pipe.link_inproc(&bind_pipe);

    bind_sock.attach_pipe(bind_pipe.clone())?;

    match conn_sock.attach_pipe(conn_pipe.clone()) {
        Ok(()) => {
            debug!("inproc pipes [{:?}]/[{:?}] paired", bind_pipe.id(), conn_pipe.id());
            Ok(())
        },
        Err(e) => {
            // the bind side learns about it through a Closed notification
            conn_pipe.close(true);
            Err(e)
        }
    }
}
