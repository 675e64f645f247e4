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
use super::{Protocol, Context, Events, ProtoTimer, REQ};
use super::xreq::Xreq;
use io_error::*;

/// Cooked request side. At most one request is outstanding: sending a new
/// one abandons the previous exchange. The request is tagged with a 31-bit
/// id (the set top bit marks the bottom of the backtrace stack), kept
/// around, and re-sent on a timer until the matching reply arrives.
pub struct Req {
    xreq: Xreq,
    reqid: u32,
    request: Option<Message>,
    resend_ivl: Duration,
    resend_timer: Option<u64>
}

impl Req {
    pub fn new() -> Req {
        Req {
            xreq: Xreq::new(),
            // seeded per socket so ids do not clash across restarts
            reqid: (time::precise_time_ns() as u32) & 0x7fffffff,
            request: None,
            resend_ivl: Duration::from_secs(60),
            resend_timer: None
        }
    }

    fn tag_request(&self, msg: Message) -> Message {
        let mut header = vec![0u8; 4];

        BigEndian::write_u32(&mut header, self.reqid | 0x80000000);
        Message::with_header_and_body(header, msg.body)
    }

    fn arm_resend(&mut self, ctx: &mut Context) {
        self.resend_timer = Some(ctx.schedule(self.resend_ivl, ProtoTimer::Resend));
    }
}

impl Protocol for Req {
    fn id(&self) -> u16 {
        REQ
    }

    fn add_pipe(&mut self, ctx: &mut Context, pipe: Pipe) -> io::Result<()> {
        self.xreq.add_pipe(ctx, pipe)
    }

    fn remove_pipe(&mut self, ctx: &mut Context, pid: PipeId) {
        self.xreq.remove_pipe(ctx, pid);
    }

    fn on_recv_ready(&mut self, ctx: &mut Context, pid: PipeId) {
        self.xreq.on_recv_ready(ctx, pid);
    }

    fn on_send_ready(&mut self, ctx: &mut Context, pid: PipeId) {
        self.xreq.on_send_ready(ctx, pid);
    }

    fn events(&self) -> Events {
        self.xreq.events()
    }

    fn send(&mut self, ctx: &mut Context, msg: Message) -> io::Result<Option<Message>> {
        // a request in progress is abandoned by the new one
        self.request = None;
        self.resend_timer = None;

        self.reqid = self.reqid.wrapping_add(1) & 0x7fffffff;

        let msg = self.tag_request(msg);

        self.request = Some(msg.clone());

        // pushback is fine: the re-send timer takes care of delivery
        let _ = self.xreq.send(ctx, msg)?;

        self.arm_resend(ctx);
        Ok(None)
    }

    fn recv(&mut self, ctx: &mut Context) -> io::Result<Option<Message>> {
        if self.request.is_none() {
            return Err(fsm_io_error("no request is in flight"));
        }

        let mut msg = match self.xreq.recv(ctx)? {
            Some(msg) => msg,
            None => return Ok(None)
        };

        // stale or malformed replies are discarded
        if msg.header.len() != 4 {
            return Ok(None);
        }
        let reqid = BigEndian::read_u32(msg.header.as_slice());
        if reqid != (self.reqid | 0x80000000) {
            return Ok(None);
        }

        self.request = None;
        self.resend_timer = None;
        msg.header = Chunk::empty();

        Ok(Some(msg))
    }

    fn set_option(&mut self, option: &SocketOption) -> io::Result<()> {
        match *option {
            SocketOption::ResendInterval(value) => {
                self.resend_ivl = value;
                Ok(())
            },
            _ => Err(no_option_io_error())
        }
    }

    fn get_option(&self, name: OptionName) -> io::Result<SocketOption> {
        match name {
            OptionName::ResendInterval => Ok(SocketOption::ResendInterval(self.resend_ivl)),
            _ => Err(no_option_io_error())
        }
    }

    fn on_timer(&mut self, ctx: &mut Context, timer: ProtoTimer, seq: u64) {
        if timer != ProtoTimer::Resend || self.resend_timer != Some(seq) {
            return;
        }

        if let Some(request) = self.request.clone() {
            debug!("re-sending request {:#x}", self.reqid);
            let _ = self.xreq.send(ctx, request);
        }

        self.arm_resend(ctx);
    }
}
