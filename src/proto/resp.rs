// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;

use byteorder::{BigEndian, ByteOrder};

use global::PipeId;
use message::{Chunk, Message};
use core::pipe::Pipe;
use super::{Protocol, Context, Events, RESPONDENT};
use super::xresp::Xrespondent;
use io_error::*;

/// Cooked respondent side: remembers the id of the survey being processed
/// and stamps it onto the response, which therefore must follow a receive.
pub struct Respondent {
    xrespondent: Xrespondent,
    surveyid: u32,
    inprogress: bool
}

impl Respondent {
    pub fn new() -> Respondent {
        Respondent {
            xrespondent: Xrespondent::new(),
            surveyid: 0,
            inprogress: false
        }
    }
}

impl Protocol for Respondent {
    fn id(&self) -> u16 {
        RESPONDENT
    }

    fn add_pipe(&mut self, ctx: &mut Context, pipe: Pipe) -> io::Result<()> {
        self.xrespondent.add_pipe(ctx, pipe)
    }

    fn remove_pipe(&mut self, ctx: &mut Context, pid: PipeId) {
        self.xrespondent.remove_pipe(ctx, pid);
    }

    fn on_recv_ready(&mut self, ctx: &mut Context, pid: PipeId) {
        self.xrespondent.on_recv_ready(ctx, pid);
    }

    fn on_send_ready(&mut self, ctx: &mut Context, pid: PipeId) {
        self.xrespondent.on_send_ready(ctx, pid);
    }

    fn events(&self) -> Events {
        self.xrespondent.events()
    }

    fn send(&mut self, ctx: &mut Context, msg: Message) -> io::Result<Option<Message>> {
        if !self.inprogress {
            return Err(fsm_io_error("no survey to respond to"));
        }

        let mut header = vec![0u8; 4];
        BigEndian::write_u32(&mut header, self.surveyid);
        let msg = Message::with_header_and_body(header, msg.body);

        // pushback drops the response silently
        let _ = self.xrespondent.send(ctx, msg)?;

        self.inprogress = false;
        Ok(None)
    }

    fn recv(&mut self, ctx: &mut Context) -> io::Result<Option<Message>> {
        // an unanswered survey is abandoned
        self.inprogress = false;

        let mut msg = match self.xrespondent.recv(ctx)? {
            Some(msg) => msg,
            None => return Ok(None)
        };

        if msg.header.len() != 4 {
            return Ok(None);
        }

        self.surveyid = BigEndian::read_u32(msg.header.as_slice());
        self.inprogress = true;
        msg.header = Chunk::empty();

        Ok(Some(msg))
    }
}
