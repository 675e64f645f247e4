// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

//! The socket base. User threads enter here under the socket lock and,
//! when the protocol pushes back, wait for readiness with the configured
//! timeout. The socket's worker enters through the `on_*` notifications.
//! After every call that can change protocol state, the event adjuster
//! reconciles the readiness flags, the externally pollable efds and the
//! blocked waiters.

use std::collections::HashMap;
use std::io;
use std::os::unix::io::RawFd;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use global::*;
use message::Message;
use proto::{Protocol, Context, ProtoTimer, SockType};
use reactor::{WorkerHandle, Request, PipeEvt};
use transport;
use transport::EndpointContext;
use super::efd::Efd;
use super::options::{Options, TcpOptions, SocketOption, OptionName};
use super::pipe::Pipe;
use io_error::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndpointKind {
    InprocBind,
    InprocConnect,
    Stream
}

struct Endpoint {
    addr: String,
    kind: EndpointKind,
    pipes: HashMap<PipeId, Pipe>,
    closing: bool
}

struct State {
    proto: Box<dyn Protocol>,
    options: Options,
    tcp_options: Option<TcpOptions>,
    endpoints: HashMap<EndpointId, Endpoint>,
    eid_seq: usize,
    zombie: bool,
    closing: bool,
    in_signaled: bool,
    out_signaled: bool
}

pub struct Socket {
    id: SocketId,
    protocol_id: u16,
    no_send: bool,
    no_recv: bool,
    ispeer: fn(u16) -> bool,
    worker: WorkerHandle,
    sndfd: Option<Efd>,
    rcvfd: Option<Efd>,
    state: Mutex<State>,
    send_cv: Condvar,
    recv_cv: Condvar,
    term_cv: Condvar
}

impl Socket {
    pub fn new(id: SocketId, socktype: &'static SockType, worker: WorkerHandle) -> io::Result<Socket> {
        // the efds exist only for the directions the protocol supports
        let sndfd = if socktype.no_send { None } else { Some(Efd::new()?) };
        let rcvfd = if socktype.no_recv { None } else { Some(Efd::new()?) };

        Ok(Socket {
            id: id,
            protocol_id: socktype.protocol,
            no_send: socktype.no_send,
            no_recv: socktype.no_recv,
            ispeer: socktype.ispeer,
            worker: worker,
            sndfd: sndfd,
            rcvfd: rcvfd,
            state: Mutex::new(State {
                proto: (socktype.create)(),
                options: Options::new(),
                tcp_options: None,
                endpoints: HashMap::new(),
                eid_seq: 1,
                zombie: false,
                closing: false,
                in_signaled: false,
                out_signaled: false
            }),
            send_cv: Condvar::new(),
            recv_cv: Condvar::new(),
            term_cv: Condvar::new()
        })
    }

    pub fn id(&self) -> SocketId {
        self.id
    }

    /*************************************************************************/
    /* readiness                                                             */
    /*************************************************************************/

    /// The only place the efds change during normal operation. A zombified
    /// socket keeps both efds signalled so every waiter keeps waking up.
    fn adjust_events(&self, state: &mut State) {
        if state.zombie {
            return;
        }

        let events = state.proto.events();

        if events.recv && !state.in_signaled {
            state.in_signaled = true;
            if let Some(ref efd) = self.rcvfd {
                let _ = efd.signal();
            }
            self.recv_cv.notify_all();
        } else if !events.recv && state.in_signaled {
            state.in_signaled = false;
            if let Some(ref efd) = self.rcvfd {
                let _ = efd.unsignal();
            }
        }

        if events.send && !state.out_signaled {
            state.out_signaled = true;
            if let Some(ref efd) = self.sndfd {
                let _ = efd.signal();
            }
            self.send_cv.notify_all();
        } else if !events.send && state.out_signaled {
            state.out_signaled = false;
            if let Some(ref efd) = self.sndfd {
                let _ = efd.unsignal();
            }
        }
    }

    fn wait_on<'a>(&self, cv: &Condvar, guard: MutexGuard<'a, State>) -> MutexGuard<'a, State> {
        match cv.wait(guard) {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner()
        }
    }

    fn wait_on_timeout<'a>(&self, cv: &Condvar, guard: MutexGuard<'a, State>, timeout: Duration) -> MutexGuard<'a, State> {
        match cv.wait_timeout(guard, timeout) {
            Ok((guard, _)) => guard,
            Err(poisoned) => poisoned.into_inner().0
        }
    }

    pub fn send_fd(&self) -> io::Result<RawFd> {
        self.sndfd.as_ref().map(|efd| efd.as_raw_fd()).ok_or_else(no_option_io_error)
    }

    pub fn recv_fd(&self) -> io::Result<RawFd> {
        self.rcvfd.as_ref().map(|efd| efd.as_raw_fd()).ok_or_else(no_option_io_error)
    }

    /*************************************************************************/
    /* send / recv                                                           */
    /*************************************************************************/

    pub fn send_msg(&self, msg: Message, dontwait: bool) -> io::Result<()> {
        if self.no_send {
            return Err(not_supported_io_error("send not supported by protocol"));
        }

        let mut state = lock(&self.state);
        let deadline = state.options.sndtimeo.map(|timeout| Instant::now() + timeout);
        let mut msg = msg;

        loop {
            if state.zombie || state.closing {
                return Err(terminated_io_error());
            }

            let (result, unblock) = {
                let mut ctx = Context::new(self.id, &self.worker, state.options.sndprio, state.options.rcvprio);
                let result = state.proto.send(&mut ctx, msg);
                (result, ctx.take_unblock_recv())
            };

            self.adjust_events(&mut state);
            if unblock {
                self.recv_cv.notify_all();
            }

            match result {
                Ok(None) => return Ok(()),
                Ok(Some(returned)) => msg = returned,
                Err(e) => return Err(e)
            }

            if dontwait {
                return Err(would_block_io_error("send would block"));
            }

            // still signalled: the protocol made progress without taking the
            // message, retry instead of sleeping past a level-triggered state
            if state.out_signaled {
                continue;
            }

            state = match deadline {
                None => self.wait_on(&self.send_cv, state),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(timed_out_io_error("send timed out"));
                    }
                    self.wait_on_timeout(&self.send_cv, state, deadline - now)
                }
            };
        }
    }

    pub fn recv_msg(&self, dontwait: bool) -> io::Result<Message> {
        if self.no_recv {
            return Err(not_supported_io_error("recv not supported by protocol"));
        }

        let mut state = lock(&self.state);
        let deadline = state.options.rcvtimeo.map(|timeout| Instant::now() + timeout);

        loop {
            if state.zombie || state.closing {
                return Err(terminated_io_error());
            }

            let result = {
                let mut ctx = Context::new(self.id, &self.worker, state.options.sndprio, state.options.rcvprio);
                state.proto.recv(&mut ctx)
            };

            self.adjust_events(&mut state);

            match result {
                Ok(Some(msg)) => return Ok(msg),
                Ok(None) => (),
                Err(e) => return Err(e)
            }

            if dontwait {
                return Err(would_block_io_error("recv would block"));
            }

            // still signalled: something was fetched and discarded, retry
            // instead of sleeping past a level-triggered state
            if state.in_signaled {
                continue;
            }

            state = match deadline {
                None => self.wait_on(&self.recv_cv, state),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(timed_out_io_error("recv timed out"));
                    }
                    self.wait_on_timeout(&self.recv_cv, state, deadline - now)
                }
            };
        }
    }

    /*************************************************************************/
    /* options                                                               */
    /*************************************************************************/

    pub fn set_option(&self, option: SocketOption) -> io::Result<()> {
        let mut state = lock(&self.state);

        if state.zombie {
            return Err(terminated_io_error());
        }

        match option {
            SocketOption::TcpNoDelay(value) => {
                if state.tcp_options.is_none() {
                    state.tcp_options = Some(TcpOptions::new());
                }
                if let Some(ref mut tcp_options) = state.tcp_options {
                    tcp_options.no_delay = value;
                }
                Ok(())
            },
            option => {
                if !state.options.set(&option)? {
                    state.proto.set_option(&option)?;
                    // a new subscription can make buffered messages relevant
                    self.adjust_events(&mut state);
                }
                Ok(())
            }
        }
    }

    pub fn get_option(&self, name: OptionName) -> io::Result<SocketOption> {
        let state = lock(&self.state);

        if state.zombie {
            return Err(terminated_io_error());
        }

        match name {
            OptionName::TcpNoDelay => {
                let no_delay = state.tcp_options.as_ref().map_or(true, |tcp| tcp.no_delay);
                Ok(SocketOption::TcpNoDelay(no_delay))
            },
            name => match state.options.get(name) {
                Some(option) => Ok(option),
                None => state.proto.get_option(name)
            }
        }
    }

    /*************************************************************************/
    /* endpoints                                                             */
    /*************************************************************************/

    pub fn bind(&self, addr: &str) -> io::Result<EndpointId> {
        debug!("[{:?}] bind: '{}'", self.id, addr);
        self.add_endpoint(addr, true)
    }

    pub fn connect(&self, addr: &str) -> io::Result<EndpointId> {
        debug!("[{:?}] connect: '{}'", self.id, addr);
        self.add_endpoint(addr, false)
    }

    fn add_endpoint(&self, addr: &str, bind: bool) -> io::Result<EndpointId> {
        let scheme = transport::parse(addr)?;
        let kind = match (scheme, bind) {
            (transport::Scheme::Inproc, true) => EndpointKind::InprocBind,
            (transport::Scheme::Inproc, false) => EndpointKind::InprocConnect,
            _ => EndpointKind::Stream
        };

        let (eid, ctx) = {
            let mut state = lock(&self.state);

            if state.zombie || state.closing {
                return Err(terminated_io_error());
            }

            let eid = EndpointId(state.eid_seq);
            state.eid_seq += 1;
            state.endpoints.insert(eid, Endpoint {
                addr: addr.to_owned(),
                kind: kind,
                pipes: HashMap::new(),
                closing: false
            });

            (eid, self.endpoint_context(&state, eid))
        };

        let result = if bind {
            transport::bind(addr, ctx)
        } else {
            transport::connect(addr, ctx)
        };

        if let Err(e) = result {
            let mut state = lock(&self.state);
            state.endpoints.remove(&eid);
            return Err(e);
        }

        Ok(eid)
    }

    fn endpoint_context(&self, state: &State, eid: EndpointId) -> EndpointContext {
        EndpointContext {
            sid: self.id,
            eid: eid,
            protocol: self.protocol_id,
            ispeer: self.ispeer,
            worker: self.worker.clone(),
            sndbuf: state.options.sndbuf,
            rcvbuf: state.options.rcvbuf,
            reconnect_ivl: state.options.reconnect_ivl,
            reconnect_ivl_max: state.options.reconnect_ivl_max,
            tcp_no_delay: state.tcp_options.as_ref().map_or(true, |tcp| tcp.no_delay)
        }
    }

    pub fn shutdown_endpoint(&self, eid: EndpointId) -> io::Result<()> {
        debug!("[{:?}] endpoint [{:?}] shutdown", self.id, eid);

        let mut state = lock(&self.state);
        let (kind, addr) = match state.endpoints.get_mut(&eid) {
            Some(endpoint) => {
                endpoint.closing = true;
                (endpoint.kind, endpoint.addr.clone())
            },
            None => return Err(bad_descriptor_io_error())
        };

        if kind == EndpointKind::Stream {
            drop(state);
            // the worker confirms with an EndpointClosed notification
            self.worker.send(Request::CloseEndpoint { sid: self.id, eid: eid });
            return Ok(());
        }

        // inproc endpoints close synchronously
        let pipes: Vec<Pipe> = match state.endpoints.remove(&eid) {
            Some(endpoint) => endpoint.pipes.into_iter().map(|(_, pipe)| pipe).collect(),
            None => Vec::new()
        };

        for pipe in pipes.iter() {
            let mut ctx = Context::new(self.id, &self.worker, state.options.sndprio, state.options.rcvprio);
            state.proto.remove_pipe(&mut ctx, pipe.id());
        }
        self.adjust_events(&mut state);
        drop(state);

        for pipe in pipes {
            pipe.close(true);
        }
        if kind == EndpointKind::InprocBind {
            transport::inproc::unbind(&addr, self.id, eid);
        } else {
            transport::inproc::unpark(&addr, self.id, eid);
        }
        self.term_cv.notify_all();
        Ok(())
    }

    /*************************************************************************/
    /* transport facing                                                      */
    /*************************************************************************/

    /// Registers a freshly handshaken pipe with the protocol. The peer
    /// protocol is re-validated here; exclusive protocols may still refuse.
    pub fn attach_pipe(&self, pipe: Pipe) -> io::Result<()> {
        let mut state = lock(&self.state);

        if state.zombie || state.closing {
            return Err(terminated_io_error());
        }
        if !(self.ispeer)(pipe.peer_protocol()) {
            return Err(invalid_data_io_error("peer protocol rejected"));
        }

        match state.endpoints.get_mut(&pipe.eid()) {
            Some(endpoint) => {
                if endpoint.closing {
                    return Err(terminated_io_error());
                }
                endpoint.pipes.insert(pipe.id(), pipe.clone());
            },
            None => return Err(bad_descriptor_io_error())
        }

        pipe.activate();

        let result = {
            let mut ctx = Context::new(self.id, &self.worker, state.options.sndprio, state.options.rcvprio);
            state.proto.add_pipe(&mut ctx, pipe.clone())
        };

        match result {
            Ok(()) => {
                debug!("[{:?}] pipe [{:?}] attached", self.id, pipe.id());
                // a fresh pipe accepts messages right away
                let mut ctx = Context::new(self.id, &self.worker, state.options.sndprio, state.options.rcvprio);
                state.proto.on_send_ready(&mut ctx, pipe.id());
                // the peer may have sent before this side was attached;
                // the readiness raised back then reached nobody
                if pipe.has_buffered_input() {
                    let mut ctx = Context::new(self.id, &self.worker, state.options.sndprio, state.options.rcvprio);
                    state.proto.on_recv_ready(&mut ctx, pipe.id());
                }
                self.adjust_events(&mut state);
                Ok(())
            },
            Err(e) => {
                debug!("[{:?}] pipe [{:?}] refused: '{}'", self.id, pipe.id(), e);
                if let Some(endpoint) = state.endpoints.get_mut(&pipe.eid()) {
                    endpoint.pipes.remove(&pipe.id());
                }
                drop(state);
                pipe.close(true);
                Err(e)
            }
        }
    }

    /*************************************************************************/
    /* worker facing                                                         */
    /*************************************************************************/

    pub fn on_pipe_evt(&self, evt: PipeEvt) {
        let mut state = lock(&self.state);
        let mut repark = None;

        let unblock = {
            let mut ctx = Context::new(self.id, &self.worker, state.options.sndprio, state.options.rcvprio);

            match evt {
                PipeEvt::RecvReady(pid) => state.proto.on_recv_ready(&mut ctx, pid),
                PipeEvt::SendReady(pid) => state.proto.on_send_ready(&mut ctx, pid),
                PipeEvt::Closed(pid) => {
                    debug!("[{:?}] pipe [{:?}] closed", self.id, pid);
                    state.proto.remove_pipe(&mut ctx, pid);
                }
            }
            ctx.take_unblock_recv()
        };

        if let PipeEvt::Closed(pid) = evt {
            let socket_closing = state.closing;
            let mut removed_ep = None;

            for (eid, endpoint) in state.endpoints.iter_mut() {
                if endpoint.pipes.remove(&pid).is_some() {
                    let lost = endpoint.kind == EndpointKind::InprocConnect
                        && !endpoint.closing
                        && !socket_closing;
                    if lost {
                        // a lost inproc connection goes back to waiting
                        // for a new bind of the same name
                        repark = Some((*eid, endpoint.addr.clone()));
                    }
                    if endpoint.closing && endpoint.pipes.is_empty() {
                        removed_ep = Some(*eid);
                    }
                    break;
                }
            }

            if let Some(eid) = removed_ep {
                state.endpoints.remove(&eid);
                self.term_cv.notify_all();
            }
        }

        self.adjust_events(&mut state);
        if unblock {
            self.recv_cv.notify_all();
        }

        if let Some((eid, addr)) = repark {
            let ctx = self.endpoint_context(&state, eid);
            drop(state);
            transport::inproc::park(&addr, ctx);
        }
    }

    pub fn on_timer(&self, timer: ProtoTimer, seq: u64) {
        let mut state = lock(&self.state);

        if state.zombie {
            return;
        }

        let unblock = {
            let mut ctx = Context::new(self.id, &self.worker, state.options.sndprio, state.options.rcvprio);
            state.proto.on_timer(&mut ctx, timer, seq);
            ctx.take_unblock_recv()
        };

        self.adjust_events(&mut state);
        if unblock {
            self.recv_cv.notify_all();
        }
    }

    /// The worker finished tearing down a stream endpoint.
    pub fn on_endpoint_closed(&self, eid: EndpointId) {
        let mut state = lock(&self.state);

        if let Some(endpoint) = state.endpoints.remove(&eid) {
            for (pid, _) in endpoint.pipes {
                let mut ctx = Context::new(self.id, &self.worker, state.options.sndprio, state.options.rcvprio);
                state.proto.remove_pipe(&mut ctx, pid);
            }
        }

        self.adjust_events(&mut state);
        self.term_cv.notify_all();
    }

    /*************************************************************************/
    /* lifecycle                                                             */
    /*************************************************************************/

    /// Library termination: every pending and future blocking call wakes
    /// with the termination error; only closing remains legal.
    pub fn zombify(&self) {
        let mut state = lock(&self.state);

        if state.zombie {
            return;
        }

        debug!("[{:?}] zombified", self.id);
        state.zombie = true;

        // both efds stay signalled so external pollers wake as well
        if !state.in_signaled {
            state.in_signaled = true;
            if let Some(ref efd) = self.rcvfd {
                let _ = efd.signal();
            }
        }
        if !state.out_signaled {
            state.out_signaled = true;
            if let Some(ref efd) = self.sndfd {
                let _ = efd.signal();
            }
        }

        self.send_cv.notify_all();
        self.recv_cv.notify_all();
        self.term_cv.notify_all();
    }

    /// Closes every endpoint and waits, bounded by the linger option,
    /// until the transports have drained.
    pub fn close(&self) {
        let eids: Vec<EndpointId> = {
            let mut state = lock(&self.state);

            if state.closing {
                return;
            }
            state.closing = true;
            self.send_cv.notify_all();
            self.recv_cv.notify_all();
            state.endpoints.keys().cloned().collect()
        };

        for eid in eids {
            let _ = self.shutdown_endpoint(eid);
        }

        let mut state = lock(&self.state);
        let deadline = Instant::now() + state.options.linger;

        while !state.endpoints.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                warn!("[{:?}] closing with {} endpoint(s) still draining", self.id, state.endpoints.len());
                break;
            }
            state = self.wait_on_timeout(&self.term_cv, state, deadline - now);
        }

        let mut ctx = Context::new(self.id, &self.worker, state.options.sndprio, state.options.rcvprio);
        state.proto.close(&mut ctx);
        debug!("[{:?}] closed", self.id);
    }
}
