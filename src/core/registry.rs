// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

//! The process-wide registry: the socket table with its free-descriptor
//! stack, the worker pool, and the in-process rendezvous board. Public
//! entry points take the global lock briefly and resolve to a per-socket
//! code path; the global lock and a socket lock are never held together.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, Once};
use std::sync::atomic::{AtomicUsize, Ordering};

use global::*;
use proto;
use reactor::WorkerPool;
use transport::EndpointContext;
use super::sock::Socket;
use io_error::*;

pub const MAX_SOCKETS: usize = 512;

struct SocketEntry {
    socket: Arc<Socket>,
    session: usize
}

struct Registry {
    sessions: usize,
    session_seq: usize,
    sockets: HashMap<SocketId, SocketEntry>,
    fds: Vec<Option<SocketId>>,
    free_fds: Vec<usize>,
    sid_seq: usize,
    workers: Option<WorkerPool>,
    inproc_binds: HashMap<String, EndpointContext>,
    inproc_parked: Vec<(String, EndpointContext)>
}

impl Registry {
    fn new() -> Registry {
        Registry {
            sessions: 0,
            session_seq: 0,
            sockets: HashMap::new(),
            fds: Vec::new(),
            free_fds: Vec::new(),
            sid_seq: 0,
            workers: None,
            inproc_binds: HashMap::new(),
            inproc_parked: Vec::new()
        }
    }
}

fn instance() -> &'static Mutex<Registry> {
    static INIT: Once = Once::new();
    static mut REGISTRY: Option<Mutex<Registry>> = None;

    unsafe {
        INIT.call_once(|| REGISTRY = Some(Mutex::new(Registry::new())));
        match REGISTRY {
            Some(ref mutex) => mutex,
            None => unreachable!()
        }
    }
}

static PIPE_SEQ: AtomicUsize = AtomicUsize::new(1);

pub fn next_pipe_id() -> PipeId {
    PipeId(PIPE_SEQ.fetch_add(1, Ordering::Relaxed))
}

/*****************************************************************************/
/* sessions                                                                  */
/*****************************************************************************/

pub fn open_session(workers: usize) -> io::Result<usize> {
    let mut registry = lock(instance());

    if registry.workers.is_none() {
        registry.workers = Some(WorkerPool::new(workers)?);
    }
    registry.sessions += 1;
    registry.session_seq += 1;

    Ok(registry.session_seq)
}

/// Terminates a session: every socket it created becomes a zombie, so
/// pending and future blocking calls on them wake with the termination
/// error and only closing remains meaningful. The worker pool stops once
/// the last session is gone and the socket table is empty again.
pub fn close_session(session: usize) {
    let victims: Vec<Arc<Socket>> = {
        let mut registry = lock(instance());

        registry.sessions -= 1;
        registry.sockets.values().
            filter(|entry| entry.session == session).
            map(|entry| entry.socket.clone()).
            collect()
    };

    for socket in victims {
        socket.zombify();
    }

    maybe_teardown();
}

fn maybe_teardown() {
    let pool = {
        let mut registry = lock(instance());

        if registry.sessions == 0 && registry.sockets.is_empty() {
            registry.inproc_binds.clear();
            registry.inproc_parked.clear();
            registry.workers.take()
        } else {
            None
        }
    };

    // joined without the global lock held: the workers look sockets up
    if let Some(mut pool) = pool {
        pool.shutdown();
    }
}

/*****************************************************************************/
/* socket table                                                              */
/*****************************************************************************/

pub fn create_socket(domain: Domain, socket_type: SocketType, session: usize) -> io::Result<(usize, Arc<Socket>)> {
    let socktype = proto::lookup(domain, socket_type.id())?;
    let mut registry = lock(instance());

    if registry.sessions == 0 {
        return Err(terminated_io_error());
    }

    let fd = match registry.free_fds.pop() {
        Some(fd) => fd,
        None => {
            if registry.fds.len() >= MAX_SOCKETS {
                return Err(too_many_sockets_io_error());
            }
            registry.fds.push(None);
            registry.fds.len() - 1
        }
    };

    let sid = SocketId(registry.sid_seq);
    registry.sid_seq += 1;

    let worker = match registry.workers {
        Some(ref mut pool) => pool.assign(),
        None => unreachable!()
    };

    let socket = match Socket::new(sid, socktype, worker) {
        Ok(socket) => Arc::new(socket),
        Err(e) => {
            registry.free_fds.push(fd);
            return Err(e);
        }
    };

    registry.fds[fd] = Some(sid);
    registry.sockets.insert(sid, SocketEntry {
        socket: socket.clone(),
        session: session
    });
    debug!("socket [{:?}] created as {:?}/{:?} fd {}", sid, domain, socket_type, fd);

    Ok((fd, socket))
}

pub fn close_socket(fd: usize) {
    let socket = {
        let registry = lock(instance());

        match registry.fds.get(fd).and_then(|slot| *slot) {
            Some(sid) => registry.sockets.get(&sid).map(|entry| entry.socket.clone()),
            None => None
        }
    };

    let socket = match socket {
        Some(socket) => socket,
        None => return
    };

    // the socket stays in the table while closing so its worker can
    // still deliver the teardown notifications
    socket.close();

    {
        let mut registry = lock(instance());

        registry.sockets.remove(&socket.id());
        if let Some(slot) = registry.fds.get_mut(fd) {
            *slot = None;
        }
        registry.free_fds.push(fd);
    }

    maybe_teardown();
}

pub fn find_socket(sid: SocketId) -> Option<Arc<Socket>> {
    lock(instance()).sockets.get(&sid).map(|entry| entry.socket.clone())
}

/*****************************************************************************/
/* inproc rendezvous board                                                   */
/*****************************************************************************/

fn ispeer_both(a: &EndpointContext, b: &EndpointContext) -> bool {
    (a.ispeer)(b.protocol) && (b.ispeer)(a.protocol)
}

/// Claims a name and hands back every parked connect it can pair with.
pub fn inproc_bind(addr: &str, ctx: EndpointContext) -> io::Result<Vec<EndpointContext>> {
    let mut registry = lock(instance());

    if registry.inproc_binds.contains_key(addr) {
        return Err(addr_in_use_io_error());
    }

    let mut matched = Vec::new();
    let mut index = 0;
    while index < registry.inproc_parked.len() {
        let matches = registry.inproc_parked[index].0 == addr
            && ispeer_both(&ctx, &registry.inproc_parked[index].1);

        if matches {
            matched.push(registry.inproc_parked.remove(index).1);
        } else {
            index += 1;
        }
    }

    registry.inproc_binds.insert(addr.to_owned(), ctx);
    Ok(matched)
}

/// Finds the live bind to pair with, or parks the connect until one shows up.
pub fn inproc_connect(addr: &str, ctx: EndpointContext) -> Option<EndpointContext> {
    let mut registry = lock(instance());

    if let Some(bind) = registry.inproc_binds.get(addr) {
        if ispeer_both(bind, &ctx) {
            return Some(bind.clone());
        }
    }

    registry.inproc_parked.push((addr.to_owned(), ctx));
    None
}

pub fn inproc_unbind(addr: &str, sid: SocketId, eid: EndpointId) {
    let mut registry = lock(instance());

    let owned = registry.inproc_binds.get(addr).
        map_or(false, |ctx| ctx.sid == sid && ctx.eid == eid);

    if owned {
        registry.inproc_binds.remove(addr);
    }
}

pub fn inproc_unpark(addr: &str, sid: SocketId, eid: EndpointId) {
    let mut registry = lock(instance());

    registry.inproc_parked.retain(|&(ref parked_addr, ref ctx)| {
        !(parked_addr == addr && ctx.sid == sid && ctx.eid == eid)
    });
}
