// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;

use global::PipeId;
use message::Message;
use core::pipe::Pipe;
use super::{Protocol, Context, Events, SURVEYOR};
use super::dist::Dist;
use super::fq::FairQueue;
use super::xreq::split_header;

/// Raw survey side: broadcasts to every respondent, fair-queues the
/// responses, and leaves the survey id header visible to the caller.
pub struct Xsurveyor {
    dist: Dist,
    fq: FairQueue
}

impl Xsurveyor {
    pub fn new() -> Xsurveyor {
        Xsurveyor {
            dist: Dist::new(),
            fq: FairQueue::new()
        }
    }
}

impl Protocol for Xsurveyor {
    fn id(&self) -> u16 {
        SURVEYOR
    }

    fn add_pipe(&mut self, ctx: &mut Context, pipe: Pipe) -> io::Result<()> {
        self.dist.add(pipe.clone());
        self.fq.add(pipe, ctx.rcvprio);
        Ok(())
    }

    fn remove_pipe(&mut self, _: &mut Context, pid: PipeId) {
        self.dist.remove(pid);
        self.fq.remove(pid);
    }

    fn on_recv_ready(&mut self, _: &mut Context, pid: PipeId) {
        self.fq.on_recv_ready(pid);
    }

    fn on_send_ready(&mut self, _: &mut Context, pid: PipeId) {
        self.dist.on_send_ready(pid);
    }

    fn events(&self) -> Events {
        Events {
            recv: self.fq.can_recv(),
            // broadcasting drops instead of blocking
            send: true
        }
    }

    fn send(&mut self, _: &mut Context, msg: Message) -> io::Result<Option<Message>> {
        self.dist.send(msg, None);
        Ok(None)
    }

    fn recv(&mut self, _: &mut Context) -> io::Result<Option<Message>> {
        let (_, recv) = match self.fq.recv() {
            Some(result) => result,
            None => return Ok(None)
        };

        if recv.parsed {
            return Ok(Some(recv.msg));
        }

        // a response too short for a survey id is dropped
        Ok(split_header(recv.msg))
    }
}
