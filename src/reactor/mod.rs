// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

//! The worker pool. Each socket is bound to one worker thread at creation;
//! the worker runs that socket's transport I/O, its timers, and delivers its
//! pipe notifications, so no two callbacks for one socket ever execute
//! concurrently with each other.

pub mod timer;
pub mod worker;

use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use mio;

use global::*;
use proto::ProtoTimer;
use transport::{BindSpec, ConnectSpec};

/// Notifications delivered to a socket about one of its pipes.
pub enum PipeEvt {
    /// The pipe has buffered messages again: receiving may resume.
    RecvReady(PipeId),
    /// The pipe accepts messages again after having released the sender.
    SendReady(PipeId),
    /// The pipe is gone; the socket must detach it.
    Closed(PipeId)
}

/// Requests travelling over a worker's channel.
pub enum Request {
    /// Deliver a pipe notification to a socket, on the worker thread.
    Raise(SocketId, PipeEvt),
    /// Arm a timer.
    Schedule { at: Instant, entry: TimerEntry },
    /// Register a freshly created stream listener.
    Bind(BindSpec),
    /// Create a connecting stream endpoint.
    Connect(ConnectSpec),
    /// Tear down every stream entity of an endpoint.
    CloseEndpoint { sid: SocketId, eid: EndpointId },
    /// Tear down a single stream connection.
    ClosePipe(usize),
    /// Make progress on a stream connection: drain its send queue,
    /// resume reading if its receive queue had filled up.
    Flush(usize),
    /// Stop the worker thread.
    Shutdown
}

pub enum TimerEntry {
    /// A protocol timer (request re-send, survey deadline).
    Proto { sid: SocketId, timer: ProtoTimer, seq: u64 },
    /// Retry a lost stream connection.
    Reconnect { sid: SocketId, eid: EndpointId },
    /// Bound on the protocol header exchange of a fresh stream connection.
    Handshake(usize)
}

#[derive(Clone)]
pub struct WorkerHandle {
    tx: Arc<Mutex<mio::channel::Sender<Request>>>
}

impl WorkerHandle {
    pub fn send(&self, request: Request) {
        if lock(&self.tx).send(request).is_err() {
            debug!("worker channel closed, request dropped");
        }
    }

    pub fn raise(&self, sid: SocketId, evt: PipeEvt) {
        self.send(Request::Raise(sid, evt));
    }

    pub fn schedule(&self, at: Instant, entry: TimerEntry) {
        self.send(Request::Schedule { at: at, entry: entry });
    }
}

#[cfg(test)]
impl WorkerHandle {
    /// A handle whose requests land in the returned receiver instead of a
    /// live worker, so unit tests can observe raised notifications.
    pub fn test_pair() -> (WorkerHandle, mio::channel::Receiver<Request>) {
        let (tx, rx) = mio::channel::channel();

        (WorkerHandle { tx: Arc::new(Mutex::new(tx)) }, rx)
    }
}

pub struct WorkerPool {
    handles: Vec<WorkerHandle>,
    joins: Vec<thread::JoinHandle<()>>,
    next: usize
}

impl WorkerPool {
    pub fn new(count: usize) -> io::Result<WorkerPool> {
        let mut handles = Vec::with_capacity(count);
        let mut joins = Vec::with_capacity(count);

        for i in 0..count {
            let (tx, rx) = mio::channel::channel();
            let worker = worker::Worker::new(rx)?;
            let join = thread::Builder::new().
                name(format!("filament-worker-{}", i)).
                spawn(move || worker.run())?;

            handles.push(WorkerHandle { tx: Arc::new(Mutex::new(tx)) });
            joins.push(join);
        }

        Ok(WorkerPool {
            handles: handles,
            joins: joins,
            next: 0
        })
    }

    /// Picks the worker the next socket will be bound to.
    pub fn assign(&mut self) -> WorkerHandle {
        let handle = self.handles[self.next % self.handles.len()].clone();

        self.next += 1;
        handle
    }

    pub fn shutdown(&mut self) {
        for handle in self.handles.iter() {
            handle.send(Request::Shutdown);
        }
        for join in self.joins.drain(..) {
            let _ = join.join();
        }
        self.handles.clear();
    }
}
