// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;

use global::PipeId;
use message::Message;
use core::pipe::Pipe;
use core::options::SocketOption;
use super::{Protocol, Context, Events, SUB};
use super::excl::Excl;
use super::trie::Trie;

/// Receives from one publisher at a time and filters by subscribed topic.
/// The raw flavour skips the filter and delivers everything.
pub struct Sub {
    excl: Excl,
    trie: Trie,
    raw: bool
}

impl Sub {
    pub fn new(raw: bool) -> Sub {
        Sub {
            excl: Excl::new(),
            trie: Trie::new(),
            raw: raw
        }
    }
}

impl Protocol for Sub {
    fn id(&self) -> u16 {
        SUB
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
            send: false
        }
    }

    fn recv(&mut self, _: &mut Context) -> io::Result<Option<Message>> {
        // non-matching messages are dropped and the next one is tried
        loop {
            let recv = match self.excl.recv() {
                Some(recv) => recv,
                None => return Ok(None)
            };

            if self.raw || self.trie.matches(recv.msg.body.as_slice()) {
                return Ok(Some(recv.msg));
            }
        }
    }

    fn set_option(&mut self, option: &SocketOption) -> io::Result<()> {
        match *option {
            SocketOption::Subscribe(ref topic) => {
                self.trie.subscribe(topic);
                Ok(())
            },
            SocketOption::Unsubscribe(ref topic) => {
                self.trie.unsubscribe(topic).map(|_| ())
            },
            _ => Err(::io_error::no_option_io_error())
        }
    }
}
