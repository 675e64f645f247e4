// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::collections::HashMap;

use global::PipeId;
use core::pipe::{Pipe, RecvStatus, RecvMsg};
use super::priolist::Priolist;

/// Fair-queued receiving: messages are taken from the ready pipes in
/// priority order, round-robin among equals. A pipe that signals release
/// leaves the rotation until its next `RecvReady`.
pub struct FairQueue {
    pipes: HashMap<PipeId, (Pipe, u8)>,
    active: Priolist
}

impl FairQueue {
    pub fn new() -> FairQueue {
        FairQueue {
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

    pub fn on_recv_ready(&mut self, pid: PipeId) {
        if let Some(&(_, priority)) = self.pipes.get(&pid) {
            self.active.activate(pid, priority);
        }
    }

    pub fn can_recv(&self) -> bool {
        !self.active.is_empty()
    }

    /// The id of the pipe the message came from is reported so that raw
    /// protocols can remember the origin for routing or exclusion.
    pub fn recv(&mut self) -> Option<(PipeId, RecvMsg)> {
        loop {
            let pid = match self.active.front() {
                Some(pid) => pid,
                None => return None
            };
            let status = match self.pipes.get(&pid) {
                Some(&(ref pipe, _)) => pipe.recv(),
                None => {
                    self.active.pop();
                    continue;
                }
            };

            match status {
                RecvStatus::Got(recv) => {
                    if recv.release {
                        self.active.pop();
                    } else {
                        self.active.rotate();
                    }
                    return Some((pid, recv));
                },
                RecvStatus::Empty | RecvStatus::Closed => {
                    // stale readiness, try the next pipe
                    self.active.pop();
                }
            }
        }
    }
}
