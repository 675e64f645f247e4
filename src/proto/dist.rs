// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::collections::{HashMap, HashSet};

use global::PipeId;
use message::Message;
use core::pipe::{Pipe, SendStatus};

/// Best-effort multicast: the message is cloned into every writable pipe.
/// A pipe that pushes back just misses this message and leaves the writable
/// set until its next `SendReady`; the other pipes are unaffected and the
/// send as a whole never blocks.
pub struct Dist {
    pipes: HashMap<PipeId, Pipe>,
    active: HashSet<PipeId>
}

impl Dist {
    pub fn new() -> Dist {
        Dist {
            pipes: HashMap::new(),
            active: HashSet::new()
        }
    }

    pub fn add(&mut self, pipe: Pipe) {
        self.pipes.insert(pipe.id(), pipe);
    }

    pub fn remove(&mut self, pid: PipeId) {
        self.active.remove(&pid);
        self.pipes.remove(&pid);
    }

    pub fn on_send_ready(&mut self, pid: PipeId) {
        if self.pipes.contains_key(&pid) {
            self.active.insert(pid);
        }
    }

    pub fn is_active(&self, pid: PipeId) -> bool {
        self.active.contains(&pid)
    }

    pub fn get(&self, pid: PipeId) -> Option<&Pipe> {
        self.pipes.get(&pid)
    }

    pub fn send(&mut self, msg: Message, exclude: Option<PipeId>) {
        let targets: Vec<PipeId> = self.active.iter().
            filter(|pid| Some(**pid) != exclude).
            cloned().
            collect();

        for pid in targets {
            let status = match self.pipes.get(&pid) {
                Some(pipe) => pipe.send(msg.clone()),
                None => continue
            };

            match status {
                SendStatus::Sent => (),
                SendStatus::Release | SendStatus::Full(_) | SendStatus::Closed(_) => {
                    // dropped for this pipe only
                    self.active.remove(&pid);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use global::*;
    use message::Message;
    use reactor::WorkerHandle;
    use core::pipe::{Pipe, MsgQueue, RecvStatus};
    use super::Dist;

    fn pipe_to(sink_capacity: usize, pid: usize) -> (Pipe, Pipe) {
        // the receiver side of the handle is dropped: raised notifications
        // are irrelevant to these tests and land nowhere
        let (handle, _) = WorkerHandle::test_pair();
        let q_in = Arc::new(Mutex::new(MsgQueue::new(sink_capacity, true)));
        let q_out = Arc::new(Mutex::new(MsgQueue::new(sink_capacity, true)));
        let local = Pipe::new_inproc(
            PipeId(pid), EndpointId(0), SocketId(0), handle.clone(), 33, q_out);
        let remote = Pipe::new_inproc(
            PipeId(pid + 100), EndpointId(0), SocketId(1), handle, 32, q_in);

        local.link_inproc(&remote);
        remote.link_inproc(&local);
        local.activate();
        remote.activate();

        (local, remote)
    }

    #[test]
    fn pushback_on_one_pipe_does_not_block_the_others() {
        let mut dist = Dist::new();
        let (wide, wide_peer) = pipe_to(1024, 1);
        let (narrow, narrow_peer) = pipe_to(4, 2);

        dist.add(wide.clone());
        dist.add(narrow.clone());
        dist.on_send_ready(wide.id());
        dist.on_send_ready(narrow.id());

        // first send fills the narrow pipe up and releases it
        dist.send(Message::with_body(vec![0u8; 4]), None);
        // second send only reaches the wide pipe
        dist.send(Message::with_body(vec![1u8; 4]), None);

        let mut wide_count = 0;
        while let RecvStatus::Got(_) = wide_peer.recv() {
            wide_count += 1;
        }
        let mut narrow_count = 0;
        while let RecvStatus::Got(_) = narrow_peer.recv() {
            narrow_count += 1;
        }

        assert_eq!(2, wide_count);
        assert_eq!(1, narrow_count);
        assert!(!dist.is_active(narrow.id()));
        assert!(dist.is_active(wide.id()));
    }

    #[test]
    fn excluded_pipe_is_skipped() {
        let mut dist = Dist::new();
        let (local, peer) = pipe_to(1024, 7);

        dist.add(local.clone());
        dist.on_send_ready(local.id());
        dist.send(Message::with_body(vec![1]), Some(local.id()));

        match peer.recv() {
            RecvStatus::Empty => (),
            _ => panic!("the excluded pipe should not have received")
        }
    }
}
