// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::collections::HashMap;

use global::PipeId;
use message::Message;
use core::pipe::{Pipe, SendStatus};
use super::priolist::Priolist;

/// Load-balanced sending: the message goes to the current pipe of the
/// highest ready priority, equals take turns. The priority of a pipe is
/// the socket's send priority at the time the pipe was added.
pub struct LoadBalancer {
    pipes: HashMap<PipeId, (Pipe, u8)>,
    active: Priolist
}

impl LoadBalancer {
    pub fn new() -> LoadBalancer {
        LoadBalancer {
            pipes: HashMap::new(),
            active: Priolist::new()
        }
    }

    pub fn add(&mut self, pipe: Pipe, priority: u8) {
        self.pipes.insert(pipe.id(), (pipe, priority));
    }

    pub fn remove(&mut self, pid: PipeId) {
        self.active.remove(pid);
        self.pipes.remove(&pid);
    }

    pub fn on_send_ready(&mut self, pid: PipeId) {
        if let Some(&(_, priority)) = self.pipes.get(&pid) {
            self.active.activate(pid, priority);
        }
    }

    pub fn can_send(&self) -> bool {
        !self.active.is_empty()
    }

    /// Returns the message back when no pipe can take it right now.
    pub fn send(&mut self, msg: Message) -> Option<Message> {
        let mut msg = msg;

        loop {
            let pid = match self.active.front() {
                Some(pid) => pid,
                None => return Some(msg)
            };
            let pipe = match self.pipes.get(&pid) {
                Some(&(ref pipe, _)) => pipe.clone(),
                None => {
                    self.active.pop();
                    continue;
                }
            };

            match pipe.send(msg) {
                SendStatus::Sent => {
                    self.active.rotate();
                    return None;
                },
                SendStatus::Release => {
                    self.active.pop();
                    return None;
                },
                SendStatus::Full(returned) => {
                    // stale readiness, try the next pipe
                    self.active.pop();
                    msg = returned;
                },
                SendStatus::Closed(returned) => {
                    self.active.pop();
                    msg = returned;
                }
            }
        }
    }
}
