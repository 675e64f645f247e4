// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;
use std::collections::HashSet;

use global::PipeId;
use message::Message;
use core::pipe::{Pipe, SendStatus};
use super::{Protocol, Context, Events, MASTER};
use super::dist::Dist;

/// State replication source. The latest state is cached; re-sending an
/// unchanged state does nothing, and a mirror that becomes writable for
/// the first time is brought up to date before joining the broadcast set.
pub struct Master {
    dist: Dist,
    cache: Message,
    fresh: HashSet<PipeId>
}

impl Master {
    pub fn new() -> Master {
        Master {
            dist: Dist::new(),
            cache: Message::new(),
            fresh: HashSet::new()
        }
    }
}

impl Protocol for Master {
    fn id(&self) -> u16 {
        MASTER
    }

    fn add_pipe(&mut self, _: &mut Context, pipe: Pipe) -> io::Result<()> {
        self.fresh.insert(pipe.id());
        self.dist.add(pipe);
        Ok(())
    }

    fn remove_pipe(&mut self, _: &mut Context, pid: PipeId) {
        self.fresh.remove(&pid);
        self.dist.remove(pid);
    }

    fn on_recv_ready(&mut self, _: &mut Context, pid: PipeId) {
        // mirrors never talk back
        debug_assert!(false, "master pipe [{:?}] signalled incoming data", pid);
        error!("master pipe [{:?}] signalled incoming data, ignored", pid);
    }

    fn on_send_ready(&mut self, _: &mut Context, pid: PipeId) {
        // catch a late mirror up before it joins the broadcast set
        if self.fresh.remove(&pid) {
            let released = match self.dist.get(pid) {
                Some(pipe) => match pipe.send(self.cache.clone()) {
                    SendStatus::Sent => false,
                    SendStatus::Release | SendStatus::Full(_) | SendStatus::Closed(_) => true
                },
                None => return
            };

            if released {
                return;
            }
        }

        self.dist.on_send_ready(pid);
    }

    fn events(&self) -> Events {
        Events {
            recv: false,
            send: true
        }
    }

    fn send(&mut self, _: &mut Context, msg: Message) -> io::Result<Option<Message>> {
        // unchanged state is not broadcast again
        if self.cache.body.as_slice() == msg.body.as_slice() {
            return Ok(None);
        }

        self.cache = msg.clone();
        self.dist.send(msg, None);
        Ok(None)
    }
}
