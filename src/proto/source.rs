// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;

use global::PipeId;
use message::Message;
use core::pipe::Pipe;
use super::{Protocol, Context, Events, SOURCE};
use super::excl::Excl;

/// The emitting end of the fan-in pipeline: sends towards its single
/// downstream aggregator; the upstream owns the topology.
pub struct Source {
    excl: Excl
}

impl Source {
    pub fn new() -> Source {
        Source { excl: Excl::new() }
    }
}

impl Protocol for Source {
    fn id(&self) -> u16 {
        SOURCE
    }

    fn add_pipe(&mut self, _: &mut Context, pipe: Pipe) -> io::Result<()> {
        self.excl.add(pipe)
    }

    fn remove_pipe(&mut self, _: &mut Context, pid: PipeId) {
        self.excl.remove(pid);
    }

    fn on_recv_ready(&mut self, _: &mut Context, _: PipeId) {
    }

    fn on_send_ready(&mut self, _: &mut Context, pid: PipeId) {
        self.excl.on_send_ready(pid);
    }

    fn events(&self) -> Events {
        Events {
            recv: false,
            send: self.excl.can_send()
        }
    }

    fn send(&mut self, _: &mut Context, msg: Message) -> io::Result<Option<Message>> {
        Ok(self.excl.send(msg))
    }
}
