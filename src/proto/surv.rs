// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;
use std::time::Duration;

use byteorder::{BigEndian, ByteOrder};
use time;

use global::PipeId;
use message::{Chunk, Message};
use core::pipe::Pipe;
use core::options::{SocketOption, OptionName};
use super::{Protocol, Context, Events, ProtoTimer, SURVEYOR};
use super::xsurv::Xsurveyor;
use io_error::*;

/// Cooked survey side. Each survey carries a fresh 32-bit id; responses
/// are accepted until the deadline expires, then the survey is over and
/// receiving reports a state violation. Stale responses are discarded.
pub struct Surveyor {
    xsurveyor: Xsurveyor,
    surveyid: u32,
    deadline: Duration,
    inprogress: bool,
    deadline_timer: Option<u64>
}

impl Surveyor {
    pub fn new() -> Surveyor {
        Surveyor {
            xsurveyor: Xsurveyor::new(),
            // seeded per socket so ids do not clash across restarts
            surveyid: time::precise_time_ns() as u32,
            deadline: Duration::from_millis(1000),
            inprogress: false,
            deadline_timer: None
        }
    }
}

impl Protocol for Surveyor {
    fn id(&self) -> u16 {
        SURVEYOR
    }

    fn add_pipe(&mut self, ctx: &mut Context, pipe: Pipe) -> io::Result<()> {
        self.xsurveyor.add_pipe(ctx, pipe)
    }

    fn remove_pipe(&mut self, ctx: &mut Context, pid: PipeId) {
        self.xsurveyor.remove_pipe(ctx, pid);
    }

    fn on_recv_ready(&mut self, ctx: &mut Context, pid: PipeId) {
        self.xsurveyor.on_recv_ready(ctx, pid);
    }

    fn on_send_ready(&mut self, ctx: &mut Context, pid: PipeId) {
        self.xsurveyor.on_send_ready(ctx, pid);
    }

    fn events(&self) -> Events {
        self.xsurveyor.events()
    }

    fn send(&mut self, ctx: &mut Context, msg: Message) -> io::Result<Option<Message>> {
        // cancel any survey still going on
        self.inprogress = false;
        self.deadline_timer = None;

        self.surveyid = self.surveyid.wrapping_add(1);

        let mut header = vec![0u8; 4];
        BigEndian::write_u32(&mut header, self.surveyid);
        let msg = Message::with_header_and_body(header, msg.body);

        self.xsurveyor.send(ctx, msg)?;

        self.inprogress = true;
        self.deadline_timer = Some(ctx.schedule(self.deadline, ProtoTimer::SurveyDeadline));

        Ok(None)
    }

    fn recv(&mut self, ctx: &mut Context) -> io::Result<Option<Message>> {
        if !self.inprogress {
            return Err(fsm_io_error("no survey is in progress"));
        }

        loop {
            let mut msg = match self.xsurveyor.recv(ctx)? {
                Some(msg) => msg,
                None => return Ok(None)
            };

            // responses to an earlier survey are discarded
            if msg.header.len() != 4 {
                continue;
            }
            if BigEndian::read_u32(msg.header.as_slice()) != self.surveyid {
                continue;
            }

            msg.header = Chunk::empty();
            return Ok(Some(msg));
        }
    }

    fn set_option(&mut self, option: &SocketOption) -> io::Result<()> {
        match *option {
            SocketOption::SurveyDeadline(value) => {
                self.deadline = value;
                Ok(())
            },
            _ => Err(no_option_io_error())
        }
    }

    fn get_option(&self, name: OptionName) -> io::Result<SocketOption> {
        match name {
            OptionName::SurveyDeadline => Ok(SocketOption::SurveyDeadline(self.deadline)),
            _ => Err(no_option_io_error())
        }
    }

    fn on_timer(&mut self, ctx: &mut Context, timer: ProtoTimer, seq: u64) {
        if timer != ProtoTimer::SurveyDeadline || self.deadline_timer != Some(seq) {
            return;
        }

        debug!("survey {:#x} expired", self.surveyid);
        self.inprogress = false;
        self.deadline_timer = None;

        // a receiver blocked on the expired survey must observe the change
        ctx.unblock_recv();
    }
}
