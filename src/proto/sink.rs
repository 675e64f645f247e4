// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;

use global::PipeId;
use message::Message;
use core::pipe::Pipe;
use super::{Protocol, Context, Events, SINK};
use super::fq::FairQueue;

/// The aggregation end of the fan-in pipeline: fair-queued receiving
/// from every attached source.
pub struct Sink {
    fq: FairQueue
}

impl Sink {
    pub fn new() -> Sink {
        Sink { fq: FairQueue::new() }
    }
}

impl Protocol for Sink {
    fn id(&self) -> u16 {
        SINK
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
