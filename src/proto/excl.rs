// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;

use global::PipeId;
use message::Message;
use core::pipe::{Pipe, SendStatus, RecvStatus, RecvMsg};
use io_error::*;

/// Accepts at most one pipe at a time; a second connection attempt is
/// rejected. Used by the patterns where fan-in/fan-out is not wanted.
pub struct Excl {
    pipe: Option<Pipe>,
    can_send: bool,
    can_recv: bool
}

impl Excl {
    pub fn new() -> Excl {
        Excl {
            pipe: None,
            can_send: false,
            can_recv: false
        }
    }

    pub fn add(&mut self, pipe: Pipe) -> io::Result<()> {
        if self.pipe.is_some() {
            return Err(already_connected_io_error());
        }

        self.pipe = Some(pipe);
        Ok(())
    }

    pub fn remove(&mut self, pid: PipeId) {
        let matches = match self.pipe {
            Some(ref pipe) => pipe.id() == pid,
            None => false
        };

        if matches {
            self.pipe = None;
            self.can_send = false;
            self.can_recv = false;
        }
    }

    pub fn on_send_ready(&mut self, pid: PipeId) {
        if let Some(ref pipe) = self.pipe {
            if pipe.id() == pid {
                self.can_send = true;
            }
        }
    }

    pub fn on_recv_ready(&mut self, pid: PipeId) {
        if let Some(ref pipe) = self.pipe {
            if pipe.id() == pid {
                self.can_recv = true;
            }
        }
    }

    pub fn can_send(&self) -> bool {
        self.can_send
    }

    pub fn can_recv(&self) -> bool {
        self.can_recv
    }

    /// Hands the message to the attached pipe.
    /// Returns the message when it cannot be sent right now.
    pub fn send(&mut self, msg: Message) -> Option<Message> {
        if !self.can_send {
            return Some(msg);
        }

        let status = match self.pipe {
            Some(ref pipe) => pipe.send(msg),
            None => return None // unreachable: can_send implies a pipe
        };

        match status {
            SendStatus::Sent => None,
            SendStatus::Release => {
                self.can_send = false;
                None
            },
            SendStatus::Full(msg) => {
                self.can_send = false;
                Some(msg)
            },
            SendStatus::Closed(msg) => {
                self.can_send = false;
                Some(msg)
            }
        }
    }

    pub fn recv(&mut self) -> Option<RecvMsg> {
        if !self.can_recv {
            return None;
        }

        let status = match self.pipe {
            Some(ref pipe) => pipe.recv(),
            None => return None
        };

        match status {
            RecvStatus::Got(recv) => {
                if recv.release {
                    self.can_recv = false;
                }
                Some(recv)
            },
            RecvStatus::Empty | RecvStatus::Closed => {
                self.can_recv = false;
                None
            }
        }
    }
}
