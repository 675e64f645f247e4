// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;

use global::PipeId;
use message::{Chunk, Message};
use core::pipe::Pipe;
use super::{Protocol, Context, Events, REP};
use super::xrep::Xrep;
use io_error::*;

/// Cooked reply side: the routing stack of the received request is kept
/// as a backtrace and stamped onto the next reply, which therefore must
/// follow a receive. Receiving again abandons the unanswered request.
pub struct Rep {
    xrep: Xrep,
    backtrace: Option<Chunk>
}

impl Rep {
    pub fn new() -> Rep {
        Rep {
            xrep: Xrep::new(),
            backtrace: None
        }
    }
}

impl Protocol for Rep {
    fn id(&self) -> u16 {
        REP
    }

    fn add_pipe(&mut self, ctx: &mut Context, pipe: Pipe) -> io::Result<()> {
        self.xrep.add_pipe(ctx, pipe)
    }

    fn remove_pipe(&mut self, ctx: &mut Context, pid: PipeId) {
        self.xrep.remove_pipe(ctx, pid);
    }

    fn on_recv_ready(&mut self, ctx: &mut Context, pid: PipeId) {
        self.xrep.on_recv_ready(ctx, pid);
    }

    fn on_send_ready(&mut self, ctx: &mut Context, pid: PipeId) {
        self.xrep.on_send_ready(ctx, pid);
    }

    fn events(&self) -> Events {
        self.xrep.events()
    }

    fn send(&mut self, ctx: &mut Context, msg: Message) -> io::Result<Option<Message>> {
        let backtrace = match self.backtrace.take() {
            Some(backtrace) => backtrace,
            None => return Err(fsm_io_error("no request to reply to"))
        };

        let reply = Message {
            header: backtrace,
            body: msg.body
        };

        // pushback is dropped silently by the raw layer
        self.xrep.send(ctx, reply)
    }

    fn recv(&mut self, ctx: &mut Context) -> io::Result<Option<Message>> {
        // an unanswered request is abandoned
        self.backtrace = None;

        let mut msg = match self.xrep.recv(ctx)? {
            Some(msg) => msg,
            None => return Ok(None)
        };

        self.backtrace = Some(msg.header);
        msg.header = Chunk::empty();

        Ok(Some(msg))
    }
}
