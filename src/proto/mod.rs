// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

//! The scalability protocol implementations and the contract the socket
//! base calls them through.

pub mod priolist;
pub mod excl;
pub mod fq;
pub mod lb;
pub mod dist;
pub mod trie;

pub mod pair;
pub mod publ;
pub mod sub;
pub mod xreq;
pub mod req;
pub mod xrep;
pub mod rep;
pub mod push;
pub mod pull;
pub mod xsurv;
pub mod surv;
pub mod xresp;
pub mod resp;
pub mod bus;
pub mod sink;
pub mod source;
pub mod master;
pub mod mirror;

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use global::*;
use message::Message;
use core::pipe::Pipe;
use core::options::{SocketOption, OptionName};
use reactor::{WorkerHandle, TimerEntry};
use io_error::*;

pub const PAIR:       u16 = 16;
pub const PUB:        u16 = 2 * 16;
pub const SUB:        u16 = 2 * 16 + 1;
pub const REP:        u16 = 3 * 16;
pub const REQ:        u16 = 3 * 16 + 1;
pub const SOURCE:     u16 = 4 * 16;
pub const SINK:       u16 = 4 * 16 + 1;
pub const PUSH:       u16 = 5 * 16;
pub const PULL:       u16 = 5 * 16 + 1;
pub const SURVEYOR:   u16 = 6 * 16 + 2;
pub const RESPONDENT: u16 = 6 * 16 + 3;
pub const BUS:        u16 = 7 * 16;
pub const MASTER:     u16 = 8 * 16;
pub const MIRROR:     u16 = 8 * 16 + 1;

/// Readiness reported by a protocol after any state change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Events {
    pub recv: bool,
    pub send: bool
}

/// Timers a protocol can arm through its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtoTimer {
    /// Re-send the pending request (req sockets).
    Resend,
    /// The survey deadline expired (surveyor sockets).
    SurveyDeadline
}

static TIMER_SEQ: AtomicUsize = AtomicUsize::new(0);

/// What the socket base hands a protocol on every call: the identity of the
/// socket, the pipe priorities in effect, and the means to arm timers and
/// wake a blocked receiver.
pub struct Context<'a> {
    sid: SocketId,
    worker: &'a WorkerHandle,
    pub sndprio: u8,
    pub rcvprio: u8,
    unblock_recv: bool
}

impl<'a> Context<'a> {
    pub fn new(sid: SocketId, worker: &'a WorkerHandle, sndprio: u8, rcvprio: u8) -> Context<'a> {
        Context {
            sid: sid,
            worker: worker,
            sndprio: sndprio,
            rcvprio: rcvprio,
            unblock_recv: false
        }
    }

    /// Arms a timer and returns its sequence number. There is no cancel:
    /// the owner forgets the sequence number and ignores the stale firing.
    pub fn schedule(&mut self, delay: Duration, timer: ProtoTimer) -> u64 {
        let seq = TIMER_SEQ.fetch_add(1, Ordering::Relaxed) as u64;

        self.worker.schedule(Instant::now() + delay, TimerEntry::Proto {
            sid: self.sid,
            timer: timer,
            seq: seq
        });
        seq
    }

    /// Asks the base to wake a receiver blocked on this socket even though
    /// no message became available, so it can observe a protocol state
    /// change such as an expired survey.
    pub fn unblock_recv(&mut self) {
        self.unblock_recv = true;
    }

    pub fn take_unblock_recv(&mut self) -> bool {
        let value = self.unblock_recv;

        self.unblock_recv = false;
        value
    }
}

/// The operations every socket type implements; the socket base calls into
/// them under the socket lock, from user threads and from the socket's
/// worker, never concurrently.
///
/// `send` and `recv` report pushback by returning `Ok(Some(msg))` /
/// `Ok(None)` respectively: ownership of an unsent message stays with the
/// caller, which blocks or bails out depending on its flags.
pub trait Protocol : Send {
    fn id(&self) -> u16;

    /// Registers a pipe. The peer protocol was already validated by the
    /// core; exclusive protocols may still refuse with AlreadyExists.
    fn add_pipe(&mut self, ctx: &mut Context, pipe: Pipe) -> io::Result<()>;

    /// Unregisters a pipe; it must not be used afterwards.
    fn remove_pipe(&mut self, ctx: &mut Context, pid: PipeId);

    /// The pipe has messages buffered again.
    fn on_recv_ready(&mut self, ctx: &mut Context, pid: PipeId);

    /// The pipe accepts messages again.
    fn on_send_ready(&mut self, ctx: &mut Context, pid: PipeId);

    fn events(&self) -> Events;

    fn send(&mut self, _ctx: &mut Context, _msg: Message) -> io::Result<Option<Message>> {
        Err(not_supported_io_error("send not supported by protocol"))
    }

    fn recv(&mut self, _ctx: &mut Context) -> io::Result<Option<Message>> {
        Err(not_supported_io_error("recv not supported by protocol"))
    }

    fn set_option(&mut self, _option: &SocketOption) -> io::Result<()> {
        Err(no_option_io_error())
    }

    fn get_option(&self, _name: OptionName) -> io::Result<SocketOption> {
        Err(no_option_io_error())
    }

    fn on_timer(&mut self, _ctx: &mut Context, _timer: ProtoTimer, _seq: u64) {
    }

    /// Last call before the socket is deallocated; pipes are already gone.
    fn close(&mut self, _ctx: &mut Context) {
    }
}

/// One entry per creatable socket type: the factory and the peer gate.
pub struct SockType {
    pub domain: Domain,
    pub protocol: u16,
    pub no_send: bool,
    pub no_recv: bool,
    pub create: fn() -> Box<dyn Protocol>,
    pub ispeer: fn(u16) -> bool
}

fn pair_ispeer(peer: u16) -> bool { peer == PAIR }
fn pub_ispeer(peer: u16) -> bool { peer == SUB }
fn sub_ispeer(peer: u16) -> bool { peer == PUB }
fn rep_ispeer(peer: u16) -> bool { peer == REQ }
fn req_ispeer(peer: u16) -> bool { peer == REP }
fn source_ispeer(peer: u16) -> bool { peer == SINK }
fn sink_ispeer(peer: u16) -> bool { peer == SOURCE }
fn push_ispeer(peer: u16) -> bool { peer == PULL }
fn pull_ispeer(peer: u16) -> bool { peer == PUSH }
fn surveyor_ispeer(peer: u16) -> bool { peer == RESPONDENT }
fn respondent_ispeer(peer: u16) -> bool { peer == SURVEYOR }
fn bus_ispeer(peer: u16) -> bool { peer == BUS }
fn master_ispeer(peer: u16) -> bool { peer == MIRROR }
fn mirror_ispeer(peer: u16) -> bool { peer == MASTER }

fn create_pair() -> Box<dyn Protocol> { Box::new(pair::Pair::new()) }
fn create_pub() -> Box<dyn Protocol> { Box::new(publ::Pub::new()) }
fn create_sub() -> Box<dyn Protocol> { Box::new(sub::Sub::new(false)) }
fn create_xsub() -> Box<dyn Protocol> { Box::new(sub::Sub::new(true)) }
fn create_rep() -> Box<dyn Protocol> { Box::new(rep::Rep::new()) }
fn create_xrep() -> Box<dyn Protocol> { Box::new(xrep::Xrep::new()) }
fn create_req() -> Box<dyn Protocol> { Box::new(req::Req::new()) }
fn create_xreq() -> Box<dyn Protocol> { Box::new(xreq::Xreq::new()) }
fn create_source() -> Box<dyn Protocol> { Box::new(source::Source::new()) }
fn create_sink() -> Box<dyn Protocol> { Box::new(sink::Sink::new()) }
fn create_push() -> Box<dyn Protocol> { Box::new(push::Push::new()) }
fn create_pull() -> Box<dyn Protocol> { Box::new(pull::Pull::new()) }
fn create_surveyor() -> Box<dyn Protocol> { Box::new(surv::Surveyor::new()) }
fn create_xsurveyor() -> Box<dyn Protocol> { Box::new(xsurv::Xsurveyor::new()) }
fn create_respondent() -> Box<dyn Protocol> { Box::new(resp::Respondent::new()) }
fn create_xrespondent() -> Box<dyn Protocol> { Box::new(xresp::Xrespondent::new()) }
fn create_bus() -> Box<dyn Protocol> { Box::new(bus::Bus::new(false)) }
fn create_xbus() -> Box<dyn Protocol> { Box::new(bus::Bus::new(true)) }
fn create_master() -> Box<dyn Protocol> { Box::new(master::Master::new()) }
fn create_mirror() -> Box<dyn Protocol> { Box::new(mirror::Mirror::new()) }

macro_rules! socktype {
    ($domain:expr, $proto:expr, $create:expr, $ispeer:expr, $no_send:expr, $no_recv:expr) => {
        SockType {
            domain: $domain,
            protocol: $proto,
            no_send: $no_send,
            no_recv: $no_recv,
            create: $create,
            ispeer: $ispeer
        }
    }
}

pub static SOCK_TYPES: &'static [SockType] = &[
    socktype!(Domain::Cooked, PAIR,       create_pair,        pair_ispeer,       false, false),
    socktype!(Domain::Raw,    PAIR,       create_pair,        pair_ispeer,       false, false),
    socktype!(Domain::Cooked, PUB,        create_pub,         pub_ispeer,        false, true ),
    socktype!(Domain::Raw,    PUB,        create_pub,         pub_ispeer,        false, true ),
    socktype!(Domain::Cooked, SUB,        create_sub,         sub_ispeer,        true,  false),
    socktype!(Domain::Raw,    SUB,        create_xsub,        sub_ispeer,        true,  false),
    socktype!(Domain::Cooked, REP,        create_rep,         rep_ispeer,        false, false),
    socktype!(Domain::Raw,    REP,        create_xrep,        rep_ispeer,        false, false),
    socktype!(Domain::Cooked, REQ,        create_req,         req_ispeer,        false, false),
    socktype!(Domain::Raw,    REQ,        create_xreq,        req_ispeer,        false, false),
    socktype!(Domain::Cooked, SOURCE,     create_source,      source_ispeer,     false, true ),
    socktype!(Domain::Raw,    SOURCE,     create_source,      source_ispeer,     false, true ),
    socktype!(Domain::Cooked, SINK,       create_sink,        sink_ispeer,       true,  false),
    socktype!(Domain::Raw,    SINK,       create_sink,        sink_ispeer,       true,  false),
    socktype!(Domain::Cooked, PUSH,       create_push,        push_ispeer,       false, true ),
    socktype!(Domain::Raw,    PUSH,       create_push,        push_ispeer,       false, true ),
    socktype!(Domain::Cooked, PULL,       create_pull,        pull_ispeer,       true,  false),
    socktype!(Domain::Raw,    PULL,       create_pull,        pull_ispeer,       true,  false),
    socktype!(Domain::Cooked, SURVEYOR,   create_surveyor,    surveyor_ispeer,   false, false),
    socktype!(Domain::Raw,    SURVEYOR,   create_xsurveyor,   surveyor_ispeer,   false, false),
    socktype!(Domain::Cooked, RESPONDENT, create_respondent,  respondent_ispeer, false, false),
    socktype!(Domain::Raw,    RESPONDENT, create_xrespondent, respondent_ispeer, false, false),
    socktype!(Domain::Cooked, BUS,        create_bus,         bus_ispeer,        false, false),
    socktype!(Domain::Raw,    BUS,        create_xbus,        bus_ispeer,        false, false),
    socktype!(Domain::Cooked, MASTER,     create_master,      master_ispeer,     false, true ),
    socktype!(Domain::Raw,    MASTER,     create_master,      master_ispeer,     false, true ),
    socktype!(Domain::Cooked, MIRROR,     create_mirror,      mirror_ispeer,     true,  false),
    socktype!(Domain::Raw,    MIRROR,     create_mirror,      mirror_ispeer,     true,  false)
];

pub fn lookup(domain: Domain, protocol: u16) -> io::Result<&'static SockType> {
    SOCK_TYPES.iter().
        find(|socktype| socktype.domain == domain && socktype.protocol == protocol).
        ok_or_else(proto_not_supported_io_error)
}

#[cfg(test)]
mod tests {
    use global::Domain;
    use super::*;

    #[test]
    fn peers_always_share_the_family_bits() {
        for socktype in SOCK_TYPES.iter() {
            for other in SOCK_TYPES.iter() {
                if (socktype.ispeer)(other.protocol) {
                    assert_eq!(socktype.protocol & 0xFFF0, other.protocol & 0xFFF0);
                }
            }
        }
    }

    #[test]
    fn lookup_rejects_unknown_types() {
        assert!(lookup(Domain::Cooked, PAIR).is_ok());
        assert!(lookup(Domain::Raw, REQ).is_ok());
        assert!(lookup(Domain::Cooked, 7777).is_err());
    }
}
