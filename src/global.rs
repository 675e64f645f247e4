// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Defines the socket types, which in turn determines the exact semantics of the socket.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SocketType {

    /// **One-to-one protocol**
    /// Socket for communication with exactly one peer.
    /// Each party can send messages at any time.
    /// If the peer is not available or its buffers are full,
    /// subsequent calls to [send](struct.Socket.html#method.send) will block
    /// until it is possible to send the message.
    Pair       = (    16),

    /// **Publish/subscribe protocol**
    /// Broadcasts messages to multiple destinations.
    /// Messages are sent from `Pub` sockets and will only be received
    /// by `Sub` sockets that have subscribed to a matching topic.
    /// A topic is an arbitrary sequence of bytes compared against the initial
    /// bytes of the message body; the zero-length topic matches everything.
    /// Filtering is performed on the subscriber side, so every message travels
    /// over the transport regardless of the subscriptions.
    /// Receive operation is not defined on this socket.
    Pub        = (2 * 16),

    /// Receives messages from publishers.
    /// Only messages matching a subscribed topic are delivered; a freshly
    /// created socket has no subscriptions and receives nothing.
    /// Send operation is not defined on this socket.
    Sub        = (2 * 16) + 1,

    /// Used to implement the stateless worker that receives requests and sends replies.
    Rep        = (3 * 16),

    /// **Request/reply protocol**
    /// Distributes a workload among stateless workers: a request is
    /// load-balanced to one connected peer and the matching reply is routed
    /// back to the requester. Requests are re-sent after a configurable
    /// interval until a reply arrives, so a worker restart does not lose
    /// the exchange.
    ///
    /// Used to implement the client that sends requests and receives replies.
    Req        = (3 * 16) + 1,

    /// **Fan-in protocol**
    /// Sends messages towards a single aggregation point.
    /// Receive operation is not defined on this socket.
    Source     = (4 * 16),

    /// Aggregates messages from all connected `Source` sockets, fair-queued.
    /// Send operation is not defined on this socket.
    Sink       = (4 * 16) + 1,

    /// **Pipeline protocol**
    /// This socket is used to send messages to a cluster of load-balanced nodes.
    /// Receive operation is not defined on this socket.
    Push       = (5 * 16),

    /// This socket is used to receive messages from a cluster of nodes, fair-queued.
    /// Send operation is not defined on this socket.
    Pull       = (5 * 16) + 1,

    /// **Survey protocol**
    /// Broadcasts a survey to all connected respondents and gathers the
    /// responses until the survey deadline expires. Responses arriving after
    /// the deadline, or answering an earlier survey, are discarded.
    Surveyor   = (6 * 16) + 2,

    /// Used to answer surveys: the survey is received, the response is sent.
    Respondent = (6 * 16) + 3,

    /// **Message bus protocol**
    /// Broadcasts messages from any node to all other nodes in the topology.
    /// The socket never receives messages that it sent itself.
    Bus        = (7 * 16),

    /// **State replication protocol**
    /// Distributes the latest state to every connected `Mirror`.
    /// Re-sending an unchanged state is suppressed, and a mirror connecting
    /// late immediately receives the current state.
    /// Receive operation is not defined on this socket.
    Master     = (8 * 16),

    /// Receives state updates from a `Master`.
    /// Send operation is not defined on this socket.
    Mirror     = (8 * 16) + 1
}

impl SocketType {
    pub fn id(&self) -> u16 {
        *self as u16
    }

    pub fn peer(&self) -> SocketType {
        match *self {
            SocketType::Pair       => SocketType::Pair,
            SocketType::Pub        => SocketType::Sub,
            SocketType::Sub        => SocketType::Pub,
            SocketType::Req        => SocketType::Rep,
            SocketType::Rep        => SocketType::Req,
            SocketType::Source     => SocketType::Sink,
            SocketType::Sink       => SocketType::Source,
            SocketType::Push       => SocketType::Pull,
            SocketType::Pull       => SocketType::Push,
            SocketType::Surveyor   => SocketType::Respondent,
            SocketType::Respondent => SocketType::Surveyor,
            SocketType::Bus        => SocketType::Bus,
            SocketType::Master     => SocketType::Mirror,
            SocketType::Mirror     => SocketType::Master
        }
    }

    pub fn matches(&self, other: SocketType) -> bool {
        self.peer() == other && other.peer() == *self
    }
}

/// The address family a socket was created in.
/// Cooked sockets hide the routing headers of their pattern,
/// raw sockets expose them so that devices and forwarders can be built.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Domain {
    Cooked,
    Raw
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct SocketId(pub usize);

impl fmt::Debug for SocketId {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(formatter)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct EndpointId(pub usize);

impl fmt::Debug for EndpointId {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(formatter)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct PipeId(pub usize);

impl fmt::Debug for PipeId {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(formatter)
    }
}

#[derive(Clone)]
pub struct IdSequence {
    value: Arc<AtomicUsize>
}

impl IdSequence {
    pub fn new() -> IdSequence {
        IdSequence { value: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn next(&self) -> usize {
        self.value.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdSequence {
    fn default() -> Self {
        IdSequence::new()
    }
}

/// Acquires a mutex, recovering the guard when a holder panicked.
/// The state protected by the socket and registry locks stays consistent
/// across unwinding, so poisoning is not propagated to the caller.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::{IdSequence, SocketType};

    #[test]
    fn id_sequence_can_be_cloned() {
        let seq = IdSequence::new();
        let other = seq.clone();

        assert_eq!(0, other.next());
        assert_eq!(1, seq.next());
        assert_eq!(2, seq.next());
        assert_eq!(3, other.next());
    }

    #[test]
    fn socket_types_match_their_peer() {
        assert!(SocketType::Req.matches(SocketType::Rep));
        assert!(SocketType::Pair.matches(SocketType::Pair));
        assert!(SocketType::Master.matches(SocketType::Mirror));
        assert!(!SocketType::Push.matches(SocketType::Sub));
        assert!(!SocketType::Surveyor.matches(SocketType::Surveyor));
    }

    #[test]
    fn socket_types_share_the_family_bits_with_their_peer() {
        let all = [
            SocketType::Pair, SocketType::Pub, SocketType::Sub,
            SocketType::Req, SocketType::Rep,
            SocketType::Source, SocketType::Sink,
            SocketType::Push, SocketType::Pull,
            SocketType::Surveyor, SocketType::Respondent,
            SocketType::Bus, SocketType::Master, SocketType::Mirror];

        for socket_type in all.iter() {
            assert_eq!(socket_type.id() & 0xFFF0, socket_type.peer().id() & 0xFFF0);
        }
    }
}
