// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;
use std::collections::{HashMap, VecDeque};

use byteorder::{BigEndian, ByteOrder};
use time;

use global::PipeId;
use message::Message;
use core::pipe::{Pipe, SendStatus, RecvStatus, RecvMsg};
use super::{Protocol, Context, Events, REP};

struct XrepPipe {
    pipe: Pipe,
    out_ready: bool
}

/// Raw reply side. Every pipe gets a 31-bit key; on receive the key is
/// pushed on top of the request's backtrace stack and the whole stack
/// moves into the message header, so a reply carrying that header finds
/// its way back through the same pipe. Replies to peers that are gone or
/// pushing back are silently dropped.
pub struct Xrep {
    pipes: HashMap<u32, XrepPipe>,
    keys: HashMap<PipeId, u32>,
    next_key: u32,
    inpipes: VecDeque<u32>
}

impl Xrep {
    pub fn new() -> Xrep {
        Xrep {
            pipes: HashMap::new(),
            keys: HashMap::new(),
            // seeded per socket so keys do not clash across restarts
            next_key: time::precise_time_ns() as u32,
            inpipes: VecDeque::new()
        }
    }

    /// Builds the header of an incoming request: the pipe key on top of
    /// the backtrace found in the message. Returns None for requests
    /// without a bottom-of-stack marker.
    fn route_request(&self, key: u32, recv: RecvMsg) -> Option<Message> {
        let msg = recv.msg;

        if recv.parsed {
            // the transport preserved the header: it already is the backtrace
            let stack = msg.header.as_slice();
            if stack.len() < 4 || stack.len() % 4 != 0 {
                return None;
            }

            let mut header = vec![0u8; 4];
            BigEndian::write_u32(&mut header, key);
            header.extend_from_slice(stack);

            return Some(Message::with_header_and_body(header, msg.body));
        }

        // scan the body for the bottom-of-stack word, the first one
        // with the top bit set
        let mut words = 0;
        {
            let body = msg.body.as_slice();
            loop {
                if (words + 1) * 4 > body.len() {
                    return None;
                }

                let word = BigEndian::read_u32(&body[words * 4..]);
                words += 1;
                if word & 0x80000000 != 0 {
                    break;
                }
            }
        }

        let mut header = vec![0u8; 4];
        BigEndian::write_u32(&mut header, key);
        header.extend_from_slice(&msg.body.as_slice()[..words * 4]);

        let mut body = msg.body;
        body.trim(words * 4);

        Some(Message::with_header_and_body(header, body))
    }
}

impl Protocol for Xrep {
    fn id(&self) -> u16 {
        REP
    }

    fn add_pipe(&mut self, _: &mut Context, pipe: Pipe) -> io::Result<()> {
        let key = self.next_key & 0x7fffffff;

        self.next_key = self.next_key.wrapping_add(1);
        self.keys.insert(pipe.id(), key);
        self.pipes.insert(key, XrepPipe {
            pipe: pipe,
            out_ready: false
        });
        Ok(())
    }

    fn remove_pipe(&mut self, _: &mut Context, pid: PipeId) {
        if let Some(key) = self.keys.remove(&pid) {
            self.pipes.remove(&key);
            self.inpipes.retain(|other| *other != key);
        }
    }

    fn on_recv_ready(&mut self, _: &mut Context, pid: PipeId) {
        if let Some(key) = self.keys.get(&pid) {
            if !self.inpipes.contains(key) {
                self.inpipes.push_back(*key);
            }
        }
    }

    fn on_send_ready(&mut self, _: &mut Context, pid: PipeId) {
        if let Some(key) = self.keys.get(&pid) {
            if let Some(entry) = self.pipes.get_mut(key) {
                entry.out_ready = true;
            }
        }
    }

    fn events(&self) -> Events {
        Events {
            recv: !self.inpipes.is_empty(),
            // sending drops instead of blocking
            send: true
        }
    }

    fn send(&mut self, _: &mut Context, msg: Message) -> io::Result<Option<Message>> {
        // an unroutable reply is treated as successfully sent
        if msg.header.len() < 4 {
            return Ok(None);
        }

        let key = BigEndian::read_u32(msg.header.as_slice());
        let mut msg = msg;
        msg.header.trim(4);

        if let Some(entry) = self.pipes.get_mut(&key) {
            if entry.out_ready {
                match entry.pipe.send(msg) {
                    SendStatus::Sent => (),
                    SendStatus::Release | SendStatus::Full(_) | SendStatus::Closed(_) => {
                        entry.out_ready = false;
                    }
                }
            }
        }

        Ok(None)
    }

    fn recv(&mut self, _: &mut Context) -> io::Result<Option<Message>> {
        loop {
            let key = match self.inpipes.front() {
                Some(key) => *key,
                None => return Ok(None)
            };
            let status = match self.pipes.get(&key) {
                Some(entry) => entry.pipe.recv(),
                None => {
                    self.inpipes.pop_front();
                    continue;
                }
            };

            match status {
                RecvStatus::Got(recv) => {
                    if recv.release {
                        self.inpipes.pop_front();
                    } else {
                        self.inpipes.pop_front();
                        self.inpipes.push_back(key);
                    }

                    // malformed requests are dropped
                    return Ok(self.route_request(key, recv));
                },
                RecvStatus::Empty | RecvStatus::Closed => {
                    self.inpipes.pop_front();
                }
            }
        }
    }
}
