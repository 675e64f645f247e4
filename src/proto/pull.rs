// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;

use global::PipeId;
use message::Message;
use core::pipe::Pipe;
use super::{Protocol, Context, Events, PULL};
use super::fq::FairQueue;

/// Pipeline downstream: fair-queued receiving from every upstream peer.
pub struct Pull {
    fq: FairQueue
}

impl Pull {
    pub fn new() -> Pull {
        Pull { fq: FairQueue::new() }
    }
}

impl Protocol for Pull {
    fn id(&self) -> u16 {
        PULL
    }

    fn add_pipe(&mut self, ctx: &mut Context, pipe: Pipe) -> io::Result<()> {
        self.fq.add(pipe, ctx.rcvprio);
        Ok(())
    }

    fn remove_pipe(&mut self, _: &mut Context, pid: PipeId) {
        self.fq.remove(pid);
    }

    fn on_recv_ready(&mut self, _: &mut Context, pid: PipeId) {
        self.fq.on_recv_ready(pid);
    }

    fn on_send_ready(&mut self, _: &mut Context, _: PipeId) {
    }

    fn events(&self) -> Events {
        Events {
            recv: self.fq.can_recv(),
            send: false
        }
    }

    fn recv(&mut self, _: &mut Context) -> io::Result<Option<Message>> {
        Ok(self.fq.recv().map(|(_, recv)| recv.msg))
    }
}
