// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;

use global::PipeId;
use message::Message;
use core::pipe::Pipe;
use super::{Protocol, Context, Events, RESPONDENT};
use super::excl::Excl;
use super::xreq::split_header;

/// Raw respondent side: one upstream surveyor at a time, the survey id
/// header stays visible to the caller.
pub struct Xrespondent {
    excl: Excl
}

impl Xrespondent {
    pub fn new() -> Xrespondent {
        Xrespondent { excl: Excl::new() }
    }
}

impl Protocol for Xrespondent {
    fn id(&self) -> u16 {
        RESPONDENT
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
        let recv = match self.excl.recv() {
            Some(recv) => recv,
            None => return Ok(None)
        };

        if recv.parsed {
            return Ok(Some(recv.msg));
        }

        // a survey too short for its id is dropped
        Ok(split_header(recv.msg))
    }
}
