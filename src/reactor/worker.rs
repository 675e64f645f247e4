// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

//! One worker thread: a poll loop over its request channel, its timers,
//! and the stream entities of the sockets bound to it. Every stream
//! connection walks the same states: Connecting, HandshakeTx,
//! HandshakeRx, Active, Dead. A connection created by `connect` that
//! dies in any state is retried on the reconnection schedule.

use std::collections::HashMap;
use std::io;
use std::io::{Read, Write};
use std::mem;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mio::{Poll, Events, Token, Ready, PollOpt};
use mio::channel::Receiver;

use global::*;
use message::Message;
use core::registry;
use core::pipe::{Pipe, MsgQueue, PushOutcome, PopOutcome, InState, OutState};
use transport::{self, BindSpec, ConnectSpec, ConnectTarget, Listener, EndpointContext};
use transport::stream::{StepStream, SendOperation, RecvOperation, create_handshake, parse_handshake};
use super::{Request, PipeEvt, TimerEntry};
use super::timer::TimerHeap;
use io_error::*;

const CHANNEL_TOKEN: Token = Token(0);
const HANDSHAKE_TIMEOUT_MS: u64 = 1000;

pub struct Worker {
    poll: Poll,
    rx: Receiver<Request>
}

impl Worker {
    pub fn new(rx: Receiver<Request>) -> io::Result<Worker> {
        let poll = Poll::new()?;

        poll.register(&rx, CHANNEL_TOKEN, Ready::readable(), PollOpt::edge())?;
        Ok(Worker {
            poll: poll,
            rx: rx
        })
    }

    pub fn run(self) {
        let mut driver = Driver {
            poll: self.poll,
            rx: self.rx,
            timers: TimerHeap::new(),
            entities: HashMap::new(),
            connects: HashMap::new(),
            tok_seq: 1,
            running: true
        };

        driver.run();
    }
}

type ConnKey = (SocketId, EndpointId);

struct Driver {
    poll: Poll,
    rx: Receiver<Request>,
    timers: TimerHeap,
    entities: HashMap<usize, Entity>,
    connects: HashMap<ConnKey, ConnectState>,
    tok_seq: usize,
    running: bool
}

enum Entity {
    Acceptor(Acceptor),
    Conn(Conn)
}

struct Acceptor {
    listener: Listener,
    ctx: EndpointContext
}

struct ConnectState {
    spec: ConnectSpec,
    ivl: Duration,
    attempt: Option<usize>
}

struct Conn {
    token: usize,
    stream: Box<dyn StepStream>,
    ctx: EndpointContext,
    /// Created by connect: reconnects when lost.
    connected: bool,
    state: ConnState
}

enum ConnState {
    Connecting,
    HandshakeTx { handshake: [u8; 8], written: usize },
    HandshakeRx { handshake: [u8; 8], read: usize },
    Active(ActivePipe),
    Dead
}

struct ActivePipe {
    pipe: Pipe,
    send_q: Arc<Mutex<MsgQueue>>,
    recv_q: Arc<Mutex<MsgQueue>>,
    send_op: Option<SendOperation>,
    recv_op: RecvOperation,
    /// A parsed message the receive queue had no room for.
    pending_in: Option<Message>,
    read_paused: bool
}

impl Driver {
    fn run(&mut self) {
        let mut events = Events::with_capacity(256);

        while self.running {
            let timeout = self.timers.next_timeout(Instant::now());

            if let Err(e) = self.poll.poll(&mut events, timeout) {
                error!("worker poll failed: '{}'", e);
                break;
            }

            for event in events.iter() {
                if event.token() == CHANNEL_TOKEN {
                    self.drain_channel();
                } else {
                    self.drive_entity(event.token().0, event.readiness());
                }
            }

            let now = Instant::now();
            while let Some(entry) = self.timers.pop_due(now) {
                self.fire_timer(entry);
            }
        }

        self.cleanup();
    }

    fn next_token(&mut self) -> usize {
        self.tok_seq += 1;
        self.tok_seq
    }

    fn drain_channel(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(request) => self.handle_request(request),
                Err(_) => break
            }
        }
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::Raise(sid, evt) => {
                if let Some(socket) = registry::find_socket(sid) {
                    socket.on_pipe_evt(evt);
                }
            },
            Request::Schedule { at, entry } => self.timers.schedule(at, entry),
            Request::Bind(spec) => self.add_acceptor(spec),
            Request::Connect(spec) => self.add_connect(spec),
            Request::CloseEndpoint { sid, eid } => self.close_endpoint(sid, eid),
            Request::ClosePipe(token) => self.kill_conn(token, false),
            Request::Flush(token) => self.flush_conn(token),
            Request::Shutdown => self.running = false
        }
    }

    /*************************************************************************/
    /* endpoints                                                             */
    /*************************************************************************/

    fn add_acceptor(&mut self, spec: BindSpec) {
        let token = self.next_token();
        let registered = self.poll.register(
            spec.listener.evented(), Token(token), Ready::readable(), PollOpt::level());

        if let Err(e) = registered {
            error!("acceptor [{:?}] not registered: '{}'", spec.ctx.eid, e);
            return;
        }

        debug!("[{:?}] acceptor [{:?}] listening", spec.ctx.sid, spec.ctx.eid);
        self.entities.insert(token, Entity::Acceptor(Acceptor {
            listener: spec.listener,
            ctx: spec.ctx
        }));
    }

    fn add_connect(&mut self, spec: ConnectSpec) {
        let key = (spec.ctx.sid, spec.ctx.eid);
        let ivl = spec.ctx.reconnect_ivl;

        self.connects.insert(key, ConnectState {
            spec: spec,
            ivl: ivl,
            attempt: None
        });
        self.start_connect(key);
    }

    fn start_connect(&mut self, key: ConnKey) {
        let (target, ctx) = match self.connects.get(&key) {
            Some(state) => (state.spec.target.clone(), state.spec.ctx.clone()),
            None => return
        };

        let stream: io::Result<Box<dyn StepStream>> = match target {
            ConnectTarget::Tcp(addr) => {
                transport::tcp::connect(&addr, ctx.tcp_no_delay).
                    map(|stream| Box::new(stream) as Box<dyn StepStream>)
            },
            ConnectTarget::Ipc(path) => {
                transport::ipc::connect(&path).
                    map(|stream| Box::new(stream) as Box<dyn StepStream>)
            }
        };

        match stream {
            Ok(stream) => {
                let token = self.next_token();
                let conn = Conn {
                    token: token,
                    stream: stream,
                    ctx: ctx,
                    connected: true,
                    state: ConnState::Connecting
                };
                let registered = self.poll.register(
                    conn.stream.evented(), Token(token),
                    Ready::writable(), PollOpt::edge() | PollOpt::oneshot());

                if registered.is_err() {
                    self.schedule_reconnect(key);
                    return;
                }

                self.arm_handshake_timer(token);
                if let Some(state) = self.connects.get_mut(&key) {
                    state.attempt = Some(token);
                }
                self.entities.insert(token, Entity::Conn(conn));
            },
            Err(e) => {
                debug!("[{:?}] connect attempt failed: '{}'", key.0, e);
                self.schedule_reconnect(key);
            }
        }
    }

    fn schedule_reconnect(&mut self, key: ConnKey) {
        let mut at = None;

        if let Some(state) = self.connects.get_mut(&key) {
            state.attempt = None;
            at = Some(Instant::now() + state.ivl);

            // exponential backoff, bounded; zero max disables the growth
            let max = state.spec.ctx.reconnect_ivl_max;
            if max > Duration::from_millis(0) {
                let next = state.ivl * 2;
                state.ivl = if next > max { max } else { next };
            }
        }

        if let Some(at) = at {
            self.timers.schedule(at, TimerEntry::Reconnect { sid: key.0, eid: key.1 });
        }
    }

    fn arm_handshake_timer(&mut self, token: usize) {
        let at = Instant::now() + Duration::from_millis(HANDSHAKE_TIMEOUT_MS);

        self.timers.schedule(at, TimerEntry::Handshake(token));
    }

    fn close_endpoint(&mut self, sid: SocketId, eid: EndpointId) {
        let key = (sid, eid);

        self.connects.remove(&key);

        let tokens: Vec<usize> = self.entities.iter().
            filter(|&(_, entity)| {
                let ctx = match *entity {
                    Entity::Acceptor(ref acceptor) => &acceptor.ctx,
                    Entity::Conn(ref conn) => &conn.ctx
                };
                ctx.sid == sid && ctx.eid == eid
            }).
            map(|(token, _)| *token).
            collect();

        for token in tokens {
            match self.entities.remove(&token) {
                Some(Entity::Acceptor(acceptor)) => {
                    let _ = self.poll.deregister(acceptor.listener.evented());
                },
                Some(Entity::Conn(conn)) => self.conn_died(conn, false),
                None => ()
            }
        }

        if let Some(socket) = registry::find_socket(sid) {
            socket.on_endpoint_closed(eid);
        }
    }

    /*************************************************************************/
    /* timers                                                                */
    /*************************************************************************/

    fn fire_timer(&mut self, entry: TimerEntry) {
        match entry {
            TimerEntry::Proto { sid, timer, seq } => {
                if let Some(socket) = registry::find_socket(sid) {
                    socket.on_timer(timer, seq);
                }
            },
            TimerEntry::Reconnect { sid, eid } => {
                let key = (sid, eid);
                let due = self.connects.get(&key).map_or(false, |state| state.attempt.is_none());

                if due {
                    self.start_connect(key);
                }
            },
            TimerEntry::Handshake(token) => {
                let handshaking = match self.entities.get(&token) {
                    Some(&Entity::Conn(ref conn)) => match conn.state {
                        ConnState::Connecting |
                        ConnState::HandshakeTx { .. } |
                        ConnState::HandshakeRx { .. } => true,
                        _ => false
                    },
                    _ => false
                };

                if handshaking {
                    debug!("pipe [{}] handshake timed out", token);
                    self.kill_conn(token, true);
                }
            }
        }
    }

    /*************************************************************************/
    /* connections                                                           */
    /*************************************************************************/

    fn drive_entity(&mut self, token: usize, ready: Ready) {
        match self.entities.remove(&token) {
            Some(Entity::Acceptor(acceptor)) => {
                self.accept_all(&acceptor);
                self.entities.insert(token, Entity::Acceptor(acceptor));
            },
            Some(Entity::Conn(conn)) => self.drive_conn(token, conn, ready),
            None => ()
        }
    }

    fn flush_conn(&mut self, token: usize) {
        match self.entities.remove(&token) {
            Some(Entity::Conn(mut conn)) => {
                if let ConnState::Active(ref mut active) = conn.state {
                    active.read_paused = false;
                }
                self.drive_conn(token, conn, Ready::empty());
            },
            Some(other) => {
                self.entities.insert(token, other);
            },
            None => ()
        }
    }

    fn drive_conn(&mut self, token: usize, mut conn: Conn, ready: Ready) {
        match self.progress_conn(&mut conn, ready) {
            Ok(()) => {
                self.reregister(&conn);
                self.entities.insert(token, Entity::Conn(conn));
            },
            Err(e) => {
                debug!("[{:?}] pipe [{}] error: '{}'", conn.ctx.sid, token, e);
                self.conn_died(conn, true);
            }
        }
    }

    fn progress_conn(&mut self, conn: &mut Conn, ready: Ready) -> io::Result<()> {
        loop {
            let state = mem::replace(&mut conn.state, ConnState::Dead);

            match state {
                ConnState::Connecting => {
                    if !ready.is_writable() {
                        conn.state = ConnState::Connecting;
                        return Ok(());
                    }
                    conn.state = ConnState::HandshakeTx {
                        handshake: create_handshake(conn.ctx.protocol),
                        written: 0
                    };
                },
                ConnState::HandshakeTx { handshake, mut written } => {
                    while written < handshake.len() {
                        match conn.stream.write(&handshake[written..]) {
                            Ok(0) => return Err(io::Error::new(io::ErrorKind::WriteZero, "connection closed")),
                            Ok(count) => written += count,
                            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                                conn.state = ConnState::HandshakeTx {
                                    handshake: handshake,
                                    written: written
                                };
                                return Ok(());
                            },
                            Err(e) => return Err(e)
                        }
                    }
                    debug!("[{:?}] pipe [{}] handshake sent", conn.ctx.sid, conn.token);
                    conn.state = ConnState::HandshakeRx {
                        handshake: [0u8; 8],
                        read: 0
                    };
                },
                ConnState::HandshakeRx { mut handshake, mut read } => {
                    while read < handshake.len() {
                        match conn.stream.read(&mut handshake[read..]) {
                            Ok(0) => return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed")),
                            Ok(count) => read += count,
                            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                                conn.state = ConnState::HandshakeRx {
                                    handshake: handshake,
                                    read: read
                                };
                                return Ok(());
                            },
                            Err(e) => return Err(e)
                        }
                    }

                    let peer_protocol = parse_handshake(&handshake)?;
                    if !(conn.ctx.ispeer)(peer_protocol) {
                        return Err(invalid_data_io_error("peer protocol rejected"));
                    }
                    debug!("[{:?}] pipe [{}] handshake received", conn.ctx.sid, conn.token);

                    conn.state = ConnState::Active(self.activate_conn(conn, peer_protocol)?);
                },
                ConnState::Active(mut active) => {
                    let result = write_side(&mut conn.stream, &mut active, &conn.ctx).
                        and_then(|_| read_side(&mut conn.stream, &mut active, &conn.ctx));

                    conn.state = ConnState::Active(active);
                    return result;
                },
                ConnState::Dead => return Ok(())
            }
        }
    }

    /// The handshake went through: create the pipe and hand it to the
    /// socket. From here on the connection moves whole messages.
    fn activate_conn(&mut self, conn: &Conn, peer_protocol: u16) -> io::Result<ActivePipe> {
        let send_q = Arc::new(Mutex::new(MsgQueue::new(conn.ctx.sndbuf, false)));
        let recv_q = Arc::new(Mutex::new(MsgQueue::new(conn.ctx.rcvbuf, false)));
        let pipe = Pipe::new_stream(
            registry::next_pipe_id(), conn.ctx.eid, conn.ctx.sid, conn.ctx.worker.clone(),
            peer_protocol, recv_q.clone(), send_q.clone(), conn.token);

        let socket = registry::find_socket(conn.ctx.sid).ok_or_else(bad_descriptor_io_error)?;
        socket.attach_pipe(pipe.clone())?;

        // a fresh connection starts the backoff over
        if conn.connected {
            if let Some(state) = self.connects.get_mut(&(conn.ctx.sid, conn.ctx.eid)) {
                state.ivl = state.spec.ctx.reconnect_ivl;
            }
        }

        Ok(ActivePipe {
            pipe: pipe,
            send_q: send_q,
            recv_q: recv_q,
            send_op: None,
            recv_op: RecvOperation::new(),
            pending_in: None,
            read_paused: false
        })
    }

    fn reregister(&self, conn: &Conn) {
        let interest = match conn.state {
            ConnState::Connecting => Ready::writable(),
            ConnState::HandshakeTx { .. } => Ready::writable(),
            ConnState::HandshakeRx { .. } => Ready::readable(),
            ConnState::Active(ref active) => {
                let mut interest = if active.read_paused {
                    Ready::empty()
                } else {
                    Ready::readable()
                };
                if active.send_op.is_some() || !lock(&active.send_q).is_empty() {
                    interest = interest | Ready::writable();
                }
                interest
            },
            ConnState::Dead => Ready::empty()
        };

        let _ = self.poll.reregister(
            conn.stream.evented(), Token(conn.token),
            interest, PollOpt::edge() | PollOpt::oneshot());
    }

    fn accept_all(&mut self, acceptor: &Acceptor) {
        loop {
            match acceptor.listener.accept(acceptor.ctx.tcp_no_delay) {
                Ok(Some(stream)) => self.add_accepted(stream, acceptor.ctx.clone()),
                Ok(None) => break,
                Err(e) => {
                    error!("[{:?}] accept failed: '{}'", acceptor.ctx.sid, e);
                    break;
                }
            }
        }
    }

    fn add_accepted(&mut self, stream: Box<dyn StepStream>, ctx: EndpointContext) {
        let token = self.next_token();
        let handshake = create_handshake(ctx.protocol);
        let conn = Conn {
            token: token,
            stream: stream,
            ctx: ctx,
            connected: false,
            state: ConnState::HandshakeTx {
                handshake: handshake,
                written: 0
            }
        };

        let registered = self.poll.register(
            conn.stream.evented(), Token(token),
            Ready::writable(), PollOpt::edge() | PollOpt::oneshot());

        if registered.is_err() {
            return;
        }

        debug!("[{:?}] pipe [{}] accepted", conn.ctx.sid, token);
        self.arm_handshake_timer(token);
        self.entities.insert(token, Entity::Conn(conn));
    }

    fn kill_conn(&mut self, token: usize, reconnect: bool) {
        if let Some(Entity::Conn(conn)) = self.entities.remove(&token) {
            self.conn_died(conn, reconnect);
        }
    }

    fn conn_died(&mut self, conn: Conn, reconnect: bool) {
        let _ = self.poll.deregister(conn.stream.evented());

        if let ConnState::Active(active) = conn.state {
            lock(&active.send_q).close();
            lock(&active.recv_q).close();
            // the socket detaches the pipe when it sees the notification
            conn.ctx.worker.raise(conn.ctx.sid, PipeEvt::Closed(active.pipe.id()));
        }

        let key = (conn.ctx.sid, conn.ctx.eid);
        if conn.connected {
            if reconnect {
                self.schedule_reconnect(key);
            } else if let Some(state) = self.connects.get_mut(&key) {
                state.attempt = None;
            }
        }
    }

    fn cleanup(&mut self) {
        for (_, entity) in self.entities.drain() {
            match entity {
                Entity::Acceptor(acceptor) => {
                    let _ = self.poll.deregister(acceptor.listener.evented());
                },
                Entity::Conn(conn) => {
                    let _ = self.poll.deregister(conn.stream.evented());
                    if let ConnState::Active(active) = conn.state {
                        lock(&active.send_q).close();
                        lock(&active.recv_q).close();
                    }
                }
            }
        }
        self.connects.clear();
        debug!("worker stopped");
    }
}

/*****************************************************************************/
/* active pipe progress                                                      */
/*****************************************************************************/

fn write_side(stream: &mut Box<dyn StepStream>, active: &mut ActivePipe, ctx: &EndpointContext) -> io::Result<()> {
    loop {
        if active.send_op.is_none() {
            let outcome = {
                let mut queue = lock(&active.send_q);
                let outcome = queue.pop();
                if let PopOutcome::Got { .. } = outcome {
                    if queue.outstate == OutState::Sent {
                        queue.outstate = OutState::Sending;
                    }
                }
                outcome
            };

            match outcome {
                PopOutcome::Got { msg, wake_writer, .. } => {
                    if wake_writer {
                        // the protocol was released on this pipe earlier
                        ctx.worker.raise(ctx.sid, PipeEvt::SendReady(active.pipe.id()));
                    }
                    active.send_op = Some(SendOperation::new(msg));
                },
                PopOutcome::Empty => return Ok(()),
                // a close request for this pipe is already on its way
                PopOutcome::Closed => return Ok(())
            }
        }

        let complete = match active.send_op {
            Some(ref mut op) => op.run(&mut **stream)?,
            None => true
        };

        if !complete {
            return Ok(());
        }
        active.send_op = None;
    }
}

fn read_side(stream: &mut Box<dyn StepStream>, active: &mut ActivePipe, ctx: &EndpointContext) -> io::Result<()> {
    loop {
        if active.read_paused {
            return Ok(());
        }

        let msg = match active.pending_in.take() {
            Some(msg) => msg,
            None => {
                match active.recv_op.run(&mut **stream)? {
                    Some(msg) => {
                        active.recv_op = RecvOperation::new();
                        msg
                    },
                    None => {
                        // mid-message; remember that for the state watchers
                        let mut queue = lock(&active.recv_q);
                        if queue.is_empty() && queue.instate == InState::Idle {
                            queue.instate = InState::Receiving;
                        }
                        return Ok(());
                    }
                }
            }
        };

        let outcome = lock(&active.recv_q).push(msg);
        match outcome {
            PushOutcome::Sent { wake_reader } => {
                if wake_reader {
                    ctx.worker.raise(ctx.sid, PipeEvt::RecvReady(active.pipe.id()));
                }
            },
            PushOutcome::Release { wake_reader } => {
                if wake_reader {
                    ctx.worker.raise(ctx.sid, PipeEvt::RecvReady(active.pipe.id()));
                }
                active.read_paused = true;
            },
            PushOutcome::Full(msg) => {
                active.pending_in = Some(msg);
                active.read_paused = true;
            },
            PushOutcome::Closed(_) => return Ok(())
        }
    }
}
