// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;

use global::PipeId;
use message::Message;
use core::pipe::Pipe;
use super::{Protocol, Context, Events, PAIR};
use super::excl::Excl;

/// One-to-one messaging: exactly one peer at a time, both directions.
pub struct Pair {
    excl: Excl
}

impl Pair {
    pub fn new() -> Pair {
        Pair { excl: Excl::new() }
    }
}

impl Protocol for Pair {
    fn id(&self) -> u16 {
        PAIR
    }

    fn add_pipe(&mut self, _: &mut Context, pipe: Pipe) -> io::Result<()> {
        self.excl.add(pipe)
    }

    fn remove_pipe(&mut self, _: &mut Context, pid: PipeId) {
        self.excl.remove(pid);
    }

    fn on_recv_ready(&mut self, _: &mut Context, pid: PipeId) {
        self.excl.on_recv_ready(pid);
    }

    fn on_send_ready(&mut self, _: &mut Context, pid: PipeId) {
        self.excl.on_send_ready(pid);
    }

    fn events(&self) -> Events {
        Events {
            recv: self.excl.can_recv(),
            send: self.excl.can_send()
        }
    }

    fn send(&mut self, _: &mut Context, msg: Message) -> io::Result<Option<Message>> {
        Ok(self.excl.send(msg))
    }

    fn recv(&mut self, _: &mut Context) -> io::Result<Option<Message>> {
        Ok(self.excl.recv().map(|recv| recv.msg))
    }
}
