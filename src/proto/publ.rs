// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;

use global::PipeId;
use message::Message;
use core::pipe::Pipe;
use super::{Protocol, Context, Events, PUB};
use super::dist::Dist;

/// Broadcast to every subscriber that can take the message right now.
/// Filtering happens on the subscriber side; sending never blocks.
pub struct Pub {
    dist: Dist
}

impl Pub {
    pub fn new() -> Pub {
        Pub { dist: Dist::new() }
    }
}

impl Protocol for Pub {
    fn id(&self) -> u16 {
        PUB
    }

    fn add_pipe(&mut self, _: &mut Context, pipe: Pipe) -> io::Result<()> {
        self.dist.add(pipe);
        Ok(())
    }

    fn remove_pipe(&mut self, _: &mut Context, pid: PipeId) {
        self.dist.remove(pid);
    }

    fn on_recv_ready(&mut self, _: &mut Context, pid: PipeId) {
        // subscribers never talk back
        debug_assert!(false, "pub pipe [{:?}] signalled incoming data", pid);
        error!("pub pipe [{:?}] signalled incoming data, ignored", pid);
    }

    fn on_send_ready(&mut self, _: &mut Context, pid: PipeId) {
        self.dist.on_send_ready(pid);
    }

    fn events(&self) -> Events {
        Events {
            recv: false,
            send: true
        }
    }

    fn send(&mut self, _: &mut Context, msg: Message) -> io::Result<Option<Message>> {
        self.dist.send(msg, None);
        Ok(None)
    }
}
