// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;
use std::collections::HashMap;

use byteorder::{BigEndian, ByteOrder};
use time;

use global::PipeId;
use message::Message;
use core::pipe::Pipe;
use super::{Protocol, Context, Events, BUS};
use super::dist::Dist;
use super::fq::FairQueue;

/// Many-to-many broadcast: every send is distributed to all peers,
/// receives are fair-queued, nothing is filtered.
///
/// The raw flavour supports forwarding devices: on receive the key of the
/// originating pipe is prepended as the message header, and a send whose
/// header carries a key skips that pipe, so a device echoing a message
/// back onto the bus never returns it to its origin.
pub struct Bus {
    raw: bool,
    dist: Dist,
    fq: FairQueue,
    keys: HashMap<PipeId, u32>,
    by_key: HashMap<u32, PipeId>,
    next_key: u32
}

impl Bus {
    pub fn new(raw: bool) -> Bus {
        Bus {
            raw: raw,
            dist: Dist::new(),
            fq: FairQueue::new(),
            keys: HashMap::new(),
            by_key: HashMap::new(),
            next_key: time::precise_time_ns() as u32
        }
    }
}

impl Protocol for Bus {
    fn id(&self) -> u16 {
        BUS
    }

    fn add_pipe(&mut self, ctx: &mut Context, pipe: Pipe) -> io::Result<()> {
        let key = self.next_key & 0x7fffffff;

        self.next_key = self.next_key.wrapping_add(1);
        self.keys.insert(pipe.id(), key);
        self.by_key.insert(key, pipe.id());
        self.dist.add(pipe.clone());
        self.fq.add(pipe, ctx.rcvprio);
        Ok(())
    }

    fn remove_pipe(&mut self, _: &mut Context, pid: PipeId) {
        if let Some(key) = self.keys.remove(&pid) {
            self.by_key.remove(&key);
        }
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
        let mut msg = msg;
        let mut exclude = None;

        if self.raw && msg.header.len() >= 4 {
            let key = BigEndian::read_u32(msg.header.as_slice());

            msg.header.trim(4);
            exclude = self.by_key.get(&key).cloned();
        }

        self.dist.send(msg, exclude);
        Ok(None)
    }

    fn recv(&mut self, _: &mut Context) -> io::Result<Option<Message>> {
        let (pid, recv) = match self.fq.recv() {
            Some(result) => result,
            None => return Ok(None)
        };

        if !self.raw {
            return Ok(Some(recv.msg));
        }

        // tag the message with the origin so a device can exclude it
        let key = match self.keys.get(&pid) {
            Some(key) => *key,
            None => return Ok(Some(recv.msg))
        };
        let mut header = vec![0u8; 4];

        BigEndian::write_u32(&mut header, key);
        Ok(Some(Message::with_header_and_body(header, recv.msg.body)))
    }
}
