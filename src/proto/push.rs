// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;
use std::collections::{HashMap, VecDeque};

use global::PipeId;
use message::Message;
use core::pipe::{Pipe, SendStatus};
use super::{Protocol, Context, Events, PUSH};

/// Pipeline upstream: each message goes to one of the writable peers,
/// plain round-robin, no priority tie-breaking.
pub struct Push {
    pipes: HashMap<PipeId, Pipe>,
    ready: VecDeque<PipeId>
}

impl Push {
    pub fn new() -> Push {
        Push {
            pipes: HashMap::new(),
            ready: VecDeque::new()
        }
    }
}

impl Protocol for Push {
    fn id(&self) -> u16 {
        PUSH
    }

    fn add_pipe(&mut self, _: &mut Context, pipe: Pipe) -> io::Result<()> {
        self.pipes.insert(pipe.id(), pipe);
        Ok(())
    }

    fn remove_pipe(&mut self, _: &mut Context, pid: PipeId) {
        self.ready.retain(|other| *other != pid);
        self.pipes.remove(&pid);
    }

    fn on_recv_ready(&mut self, _: &mut Context, _: PipeId) {
    }

    fn on_send_ready(&mut self, _: &mut Context, pid: PipeId) {
        if self.pipes.contains_key(&pid) && !self.ready.contains(&pid) {
            self.ready.push_back(pid);
        }
    }

    fn events(&self) -> Events {
        Events {
            recv: false,
            send: !self.ready.is_empty()
        }
    }

    fn send(&mut self, _: &mut Context, msg: Message) -> io::Result<Option<Message>> {
        let mut msg = msg;

        loop {
            let pid = match self.ready.front() {
                Some(pid) => *pid,
                None => return Ok(Some(msg))
            };
            let pipe = match self.pipes.get(&pid) {
                Some(pipe) => pipe.clone(),
                None => {
                    self.ready.pop_front();
                    continue;
                }
            };

            match pipe.send(msg) {
                SendStatus::Sent => {
                    // advance the rotation
                    self.ready.pop_front();
                    self.ready.push_back(pid);
                    return Ok(None);
                },
                SendStatus::Release => {
                    self.ready.pop_front();
                    return Ok(None);
                },
                SendStatus::Full(returned) => {
                    self.ready.pop_front();
                    msg = returned;
                },
                SendStatus::Closed(returned) => {
                    self.ready.pop_front();
                    msg = returned;
                }
            }
        }
    }
}
