// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;

use global::PipeId;
use message::Message;
use core::pipe::Pipe;
use super::{Protocol, Context, Events, REQ};
use super::lb::LoadBalancer;
use super::fq::FairQueue;

/// Raw request side: load-balances outgoing messages across the peers,
/// fair-queues the incoming replies, and leaves the request id header
/// visible to the caller.
pub struct Xreq {
    lb: LoadBalancer,
    fq: FairQueue
}

impl Xreq {
    pub fn new() -> Xreq {
        Xreq {
            lb: LoadBalancer::new(),
            fq: FairQueue::new()
        }
    }
}

/// Moves the leading 4 header bytes of a wire message out of the body.
/// Returns None when the message is too short to carry them.
pub fn split_header(msg: Message) -> Option<Message> {
    if msg.body.len() < 4 {
        return None;
    }

    let mut body = msg.body;
    let header = body.as_slice()[..4].to_vec();

    body.trim(4);
    Some(Message::with_header_and_body(header, body))
}

impl Protocol for Xreq {
    fn id(&self) -> u16 {
        REQ
    }

    fn add_pipe(&mut self, ctx: &mut Context, pipe: Pipe) -> io::Result<()> {
        self.lb.add(pipe.clone(), ctx.sndprio);
        self.fq.add(pipe, ctx.rcvprio);
        Ok(())
    }

    fn remove_pipe(&mut self, _: &mut Context, pid: PipeId) {
        self.lb.remove(pid);
        self.fq.remove(pid);
    }

    fn on_recv_ready(&mut self, _: &mut Context, pid: PipeId) {
        self.fq.on_recv_ready(pid);
    }

    fn on_send_ready(&mut self, _: &mut Context, pid: PipeId) {
        self.lb.on_send_ready(pid);
    }

    fn events(&self) -> Events {
        Events {
            recv: self.fq.can_recv(),
            send: self.lb.can_send()
        }
    }

    fn send(&mut self, _: &mut Context, msg: Message) -> io::Result<Option<Message>> {
        Ok(self.lb.send(msg))
    }

    fn recv(&mut self, _: &mut Context) -> io::Result<Option<Message>> {
        let (_, recv) = match self.fq.recv() {
            Some(result) => result,
            None => return Ok(None)
        };

        if recv.parsed {
            return Ok(Some(recv.msg));
        }

        // a reply too short for a request id is dropped
        Ok(split_header(recv.msg))
    }
}
