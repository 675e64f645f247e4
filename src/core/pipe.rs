// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

//! The pipe is the message-granular channel between one protocol instance
//! and one transport endpoint. A protocol may only send on a pipe that was
//! offered to it (at attach time and on every `SendReady` notification) and
//! must stop after a `Release`, until the next offer. Receiving follows the
//! same discipline with `RecvReady`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use global::*;
use message::Message;
use reactor::{WorkerHandle, Request, PipeEvt};

/// Directional state of the receiving side of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InState {
    /// The pipe exists but was not activated yet.
    Deactivated,
    /// Nothing buffered; the reader was told so.
    Idle,
    /// The transport is in the middle of transferring a message.
    Receiving,
    /// Messages are buffered; the reader has been offered the pipe.
    Received,
    /// A notification to the reader is in flight.
    Async
}

/// Directional state of the sending side of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutState {
    Deactivated,
    /// The writer may submit a message.
    Idle,
    /// The transport is in the middle of transferring a message.
    Sending,
    /// The last message was accepted and there is room for more.
    Sent,
    /// The writer was released and waits for a `SendReady` offer.
    Async
}

/// Outcome of handing a message to a pipe.
pub enum SendStatus {
    /// Accepted; the pipe can take more.
    Sent,
    /// Accepted, but the pipe must not be used for sending again
    /// until it raises `SendReady`.
    Release,
    /// Not accepted, no room; ownership returns to the caller.
    Full(Message),
    /// Not accepted, the pipe is dead; ownership returns to the caller.
    Closed(Message)
}

pub struct RecvMsg {
    pub msg: Message,
    /// Header and body were already split by the transport
    /// (the in-process transport preserves the split; stream transports
    /// deliver everything in the body).
    pub parsed: bool,
    /// The pipe must not be used for receiving again until it raises `RecvReady`.
    pub release: bool
}

pub enum RecvStatus {
    Got(RecvMsg),
    Empty,
    Closed
}

/// A bounded FIFO of whole messages, one direction of one pipe.
/// All state transitions of the direction happen under the queue lock.
pub struct MsgQueue {
    msgs: VecDeque<Message>,
    bytes: usize,
    capacity: usize,
    parsed: bool,
    pub instate: InState,
    pub outstate: OutState,
    closed: bool
}

pub enum PushOutcome {
    Sent { wake_reader: bool },
    Release { wake_reader: bool },
    Full(Message),
    Closed(Message)
}

pub enum PopOutcome {
    Got { msg: Message, parsed: bool, release: bool, wake_writer: bool },
    Empty,
    Closed
}

impl MsgQueue {
    pub fn new(capacity: usize, parsed: bool) -> MsgQueue {
        MsgQueue {
            msgs: VecDeque::new(),
            bytes: 0,
            capacity: capacity,
            parsed: parsed,
            instate: InState::Deactivated,
            outstate: OutState::Deactivated,
            closed: false
        }
    }

    /// Messages may already be buffered when the other end attached first
    /// and started sending; activation must not erase that.
    pub fn activate(&mut self) {
        self.instate = if self.msgs.is_empty() { InState::Idle } else { InState::Received };
        if self.outstate == OutState::Deactivated {
            self.outstate = OutState::Idle;
        }
    }

    /// An oversized message is accepted when the queue is empty,
    /// otherwise a message never fitting the capacity could wedge the pipe.
    pub fn push(&mut self, msg: Message) -> PushOutcome {
        if self.closed {
            return PushOutcome::Closed(msg);
        }
        if self.bytes >= self.capacity && !self.msgs.is_empty() {
            self.outstate = OutState::Async;
            return PushOutcome::Full(msg);
        }

        let wake_reader = self.msgs.is_empty();

        self.bytes += msg.len();
        self.msgs.push_back(msg);
        // Async while the offer to the reader is still in flight
        self.instate = if wake_reader { InState::Async } else { InState::Received };

        if self.bytes >= self.capacity {
            self.outstate = OutState::Async;
            PushOutcome::Release { wake_reader: wake_reader }
        } else {
            self.outstate = OutState::Sent;
            PushOutcome::Sent { wake_reader: wake_reader }
        }
    }

    pub fn pop(&mut self) -> PopOutcome {
        match self.msgs.pop_front() {
            None => {
                if self.closed {
                    PopOutcome::Closed
                } else {
                    PopOutcome::Empty
                }
            },
            Some(msg) => {
                self.bytes -= msg.len();

                let release = self.msgs.is_empty();
                self.instate = if release { InState::Idle } else { InState::Received };

                let wake_writer = self.outstate == OutState::Async && self.bytes < self.capacity;
                if wake_writer {
                    self.outstate = OutState::Idle;
                }

                PopOutcome::Got {
                    msg: msg,
                    parsed: self.parsed,
                    release: release,
                    wake_writer: wake_writer
                }
            }
        }
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_empty(&self) -> bool {
        self.msgs.is_empty()
    }
}

enum Link {
    /// The peer pipe of the in-process connection; sending pushes straight
    /// into the peer's receive queue. Cleared on close to break the cycle.
    Inproc { peer: Mutex<Option<Arc<PipeCore>>> },
    /// A stream connection owned by the worker; sending feeds the send
    /// queue the worker drains, identified by its poll token.
    Stream { send_q: Arc<Mutex<MsgQueue>>, token: usize }
}

pub struct PipeCore {
    id: PipeId,
    eid: EndpointId,
    sid: SocketId,
    worker: WorkerHandle,
    peer_protocol: u16,
    recv_q: Arc<Mutex<MsgQueue>>,
    link: Link
}

/// Handle to one pipe; clones share the pipe.
#[derive(Clone)]
pub struct Pipe(Arc<PipeCore>);

impl Pipe {
    pub fn new_inproc(
        id: PipeId,
        eid: EndpointId,
        sid: SocketId,
        worker: WorkerHandle,
        peer_protocol: u16,
        recv_q: Arc<Mutex<MsgQueue>>) -> Pipe {

        Pipe(Arc::new(PipeCore {
            id: id,
            eid: eid,
            sid: sid,
            worker: worker,
            peer_protocol: peer_protocol,
            recv_q: recv_q,
            link: Link::Inproc { peer: Mutex::new(None) }
        }))
    }

    pub fn new_stream(
        id: PipeId,
        eid: EndpointId,
        sid: SocketId,
        worker: WorkerHandle,
        peer_protocol: u16,
        recv_q: Arc<Mutex<MsgQueue>>,
        send_q: Arc<Mutex<MsgQueue>>,
        token: usize) -> Pipe {

        Pipe(Arc::new(PipeCore {
            id: id,
            eid: eid,
            sid: sid,
            worker: worker,
            peer_protocol: peer_protocol,
            recv_q: recv_q,
            link: Link::Stream { send_q: send_q, token: token }
        }))
    }

    /// Ties the two ends of an in-process connection together.
    pub fn link_inproc(&self, other: &Pipe) {
        if let Link::Inproc { ref peer } = self.0.link {
            *lock(peer) = Some(other.0.clone());
        }
    }

    pub fn id(&self) -> PipeId {
        self.0.id
    }

    pub fn eid(&self) -> EndpointId {
        self.0.eid
    }

    pub fn peer_protocol(&self) -> u16 {
        self.0.peer_protocol
    }

    /// Both directions become usable. Called once the protocol header
    /// exchange has succeeded, just before the pipe is given to a protocol.
    pub fn activate(&self) {
        lock(&self.0.recv_q).activate();
        match self.0.link {
            Link::Inproc { .. } => (),
            Link::Stream { ref send_q, .. } => lock(send_q).activate()
        }
    }

    /// True when messages arrived before the protocol had the pipe;
    /// the readiness notification for those was sent to nobody.
    pub fn has_buffered_input(&self) -> bool {
        !lock(&self.0.recv_q).is_empty()
    }

    pub fn send(&self, msg: Message) -> SendStatus {
        match self.0.link {
            Link::Inproc { ref peer } => {
                let target = lock(peer).clone();

                match target {
                    None => SendStatus::Closed(msg),
                    Some(other) => {
                        let outcome = lock(&other.recv_q).push(msg);

                        match outcome {
                            PushOutcome::Sent { wake_reader } => {
                                if wake_reader {
                                    other.worker.raise(other.sid, PipeEvt::RecvReady(other.id));
                                }
                                SendStatus::Sent
                            },
                            PushOutcome::Release { wake_reader } => {
                                if wake_reader {
                                    other.worker.raise(other.sid, PipeEvt::RecvReady(other.id));
                                }
                                SendStatus::Release
                            },
                            PushOutcome::Full(msg) => SendStatus::Full(msg),
                            PushOutcome::Closed(msg) => SendStatus::Closed(msg)
                        }
                    }
                }
            },
            Link::Stream { ref send_q, token } => {
                let outcome = lock(send_q).push(msg);

                match outcome {
                    PushOutcome::Sent { wake_reader } => {
                        if wake_reader {
                            self.0.worker.send(Request::Flush(token));
                        }
                        SendStatus::Sent
                    },
                    PushOutcome::Release { wake_reader } => {
                        if wake_reader {
                            self.0.worker.send(Request::Flush(token));
                        }
                        SendStatus::Release
                    },
                    PushOutcome::Full(msg) => SendStatus::Full(msg),
                    PushOutcome::Closed(msg) => SendStatus::Closed(msg)
                }
            }
        }
    }

    pub fn recv(&self) -> RecvStatus {
        let outcome = lock(&self.0.recv_q).pop();

        match outcome {
            PopOutcome::Got { msg, parsed, release, wake_writer } => {
                if wake_writer {
                    self.wake_writer();
                }
                RecvStatus::Got(RecvMsg {
                    msg: msg,
                    parsed: parsed,
                    release: release
                })
            },
            PopOutcome::Empty => RecvStatus::Empty,
            PopOutcome::Closed => RecvStatus::Closed
        }
    }

    fn wake_writer(&self) {
        match self.0.link {
            Link::Inproc { ref peer } => {
                if let Some(ref other) = *lock(peer) {
                    other.worker.raise(other.sid, PipeEvt::SendReady(other.id));
                }
            },
            Link::Stream { token, .. } => {
                // the stream stopped reading when the queue filled up
                self.0.worker.send(Request::Flush(token));
            }
        }
    }

    /// Shuts the pipe down. With `notify_peer`, the other end of an
    /// in-process connection learns about it through a `Closed` event;
    /// a stream connection is handed back to its worker for teardown.
    pub fn close(&self, notify_peer: bool) {
        lock(&self.0.recv_q).close();

        match self.0.link {
            Link::Inproc { ref peer } => {
                let other = lock(peer).take();

                if let Some(other) = other {
                    lock(&other.recv_q).close();
                    if let Link::Inproc { ref peer } = other.link {
                        *lock(peer) = None;
                    }
                    if notify_peer {
                        other.worker.raise(other.sid, PipeEvt::Closed(other.id));
                    }
                }
            },
            Link::Stream { ref send_q, token } => {
                lock(send_q).close();
                if notify_peer {
                    self.0.worker.send(Request::ClosePipe(token));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use mio;

    use global::*;
    use message::Message;
    use reactor::{WorkerHandle, Request, PipeEvt};
    use super::*;

    fn inproc_pair(capacity: usize) -> (Pipe, Pipe, mio::channel::Receiver<Request>) {
        let (handle, rx) = WorkerHandle::test_pair();
        let q_ab = Arc::new(Mutex::new(MsgQueue::new(capacity, true)));
        let q_ba = Arc::new(Mutex::new(MsgQueue::new(capacity, true)));
        let a = Pipe::new_inproc(
            PipeId(1), EndpointId(1), SocketId(1), handle.clone(), 17, q_ba);
        let b = Pipe::new_inproc(
            PipeId(2), EndpointId(2), SocketId(2), handle, 16, q_ab);

        a.link_inproc(&b);
        b.link_inproc(&a);
        a.activate();
        b.activate();

        (a, b, rx)
    }

    #[test]
    fn messages_flow_between_the_two_ends() {
        let (a, b, rx) = inproc_pair(1024);

        match a.send(Message::with_body(vec![1, 2, 3])) {
            SendStatus::Sent => (),
            _ => panic!("send should succeed")
        }

        // the first message wakes the reader
        match rx.try_recv() {
            Ok(Request::Raise(sid, PipeEvt::RecvReady(pid))) => {
                assert_eq!(SocketId(2), sid);
                assert_eq!(PipeId(2), pid);
            },
            _ => panic!("expected a RecvReady raise")
        }

        match b.recv() {
            RecvStatus::Got(recv) => {
                assert_eq!(&[1, 2, 3], recv.msg.body.as_slice());
                assert!(recv.parsed);
                assert!(recv.release);
            },
            _ => panic!("recv should succeed")
        }

        match b.recv() {
            RecvStatus::Empty => (),
            _ => panic!("queue should be empty")
        }
    }

    #[test]
    fn filling_the_queue_releases_the_sender() {
        let (a, b, rx) = inproc_pair(8);

        match a.send(Message::with_body(vec![0u8; 8])) {
            SendStatus::Release => (),
            _ => panic!("hitting the capacity should release")
        }
        match a.send(Message::with_body(vec![9])) {
            SendStatus::Full(_) => (),
            _ => panic!("a full queue should refuse the message")
        }

        let _ = rx.try_recv();

        // draining frees the writer again
        match b.recv() {
            RecvStatus::Got(_) => (),
            _ => panic!("recv should succeed")
        }
        match rx.try_recv() {
            Ok(Request::Raise(sid, PipeEvt::SendReady(pid))) => {
                assert_eq!(SocketId(1), sid);
                assert_eq!(PipeId(1), pid);
            },
            _ => panic!("expected a SendReady raise")
        }
    }

    #[test]
    fn closing_notifies_the_peer_once() {
        let (a, b, rx) = inproc_pair(1024);

        a.close(true);

        match rx.try_recv() {
            Ok(Request::Raise(sid, PipeEvt::Closed(pid))) => {
                assert_eq!(SocketId(2), sid);
                assert_eq!(PipeId(2), pid);
            },
            _ => panic!("expected a Closed raise")
        }

        match b.recv() {
            RecvStatus::Closed => (),
            _ => panic!("the peer queue should be closed")
        }
        match a.send(Message::with_body(vec![1])) {
            SendStatus::Closed(_) => (),
            _ => panic!("sending on a closed pipe should fail")
        }
    }
}
