// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;
use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::time;

use global::SocketType;
use message::Message;
use core::registry;
use core::sock;
use core::options::{SocketOption, OptionName};
use facade::endpoint::Endpoint;

pub struct Socket {
    fd: usize,
    socket_type: SocketType,
    inner: Arc<sock::Socket>
}

impl Socket {

    #[doc(hidden)]
    pub fn new(fd: usize, socket_type: SocketType, inner: Arc<sock::Socket>) -> Socket {
        Socket {
            fd: fd,
            socket_type: socket_type,
            inner: inner
        }
    }

    #[doc(hidden)]
    pub fn get_socket_type(&self) -> SocketType {
        self.socket_type
    }

    /// Adds a remote endpoint to the socket.
    /// The library would then try to connect to the specified remote endpoint.
    /// Note that bind and connect may be called multiple times on the same socket,
    /// thus allowing the socket to communicate with multiple heterogeneous endpoints.
    /// On success, returns an [Endpoint](struct.Endpoint.html) that can be later used
    /// to remove the endpoint from the socket.
    pub fn connect(&mut self, addr: &str) -> io::Result<Endpoint> {
        self.inner.connect(addr).map(|eid| Endpoint::new(self.inner.clone(), eid))
    }

    /// Adds a local endpoint to the socket.
    /// The endpoint can be then used by other applications to connect to.
    /// The addr argument consists of two parts as follows: transport://address.
    /// Note that bind and connect may be called multiple times on the same socket,
    /// thus allowing the socket to communicate with multiple heterogeneous endpoints.
    /// On success, returns an [Endpoint](struct.Endpoint.html) that can be later used
    /// to remove the endpoint from the socket.
    pub fn bind(&mut self, addr: &str) -> io::Result<Endpoint> {
        self.inner.bind(addr).map(|eid| Endpoint::new(self.inner.clone(), eid))
    }

    /// Sends the buffer with the semantics of the socket's pattern,
    /// blocking until it can be handed over or the send timeout expires.
    pub fn send(&mut self, buffer: Vec<u8>) -> io::Result<()> {
        self.send_msg(Message::with_body(buffer))
    }

    pub fn send_msg(&mut self, msg: Message) -> io::Result<()> {
        self.inner.send_msg(msg, false)
    }

    /// Like [send](struct.Socket.html#method.send), except that the
    /// operation fails straight away instead of blocking.
    pub fn try_send(&mut self, buffer: Vec<u8>) -> io::Result<()> {
        self.try_send_msg(Message::with_body(buffer))
    }

    pub fn try_send_msg(&mut self, msg: Message) -> io::Result<()> {
        self.inner.send_msg(msg, true)
    }

    /// Receives the next message the socket's pattern delivers,
    /// blocking until one arrives or the receive timeout expires.
    pub fn recv(&mut self) -> io::Result<Vec<u8>> {
        self.recv_msg().map(|msg| msg.to_buffer())
    }

    pub fn recv_msg(&mut self) -> io::Result<Message> {
        self.inner.recv_msg(false)
    }

    /// Like [recv](struct.Socket.html#method.recv), except that the
    /// operation fails straight away instead of blocking.
    pub fn try_recv(&mut self) -> io::Result<Vec<u8>> {
        self.try_recv_msg().map(|msg| msg.to_buffer())
    }

    pub fn try_recv_msg(&mut self) -> io::Result<Message> {
        self.inner.recv_msg(true)
    }

    /// Set a socket option.
    /// See [SocketOption](enum.SocketOption.html) to get the list of options.
    pub fn set_option(&mut self, option: SocketOption) -> io::Result<()> {
        self.inner.set_option(option)
    }

    /// Read back a socket option.
    /// See [OptionName](enum.OptionName.html) to get the list of options.
    pub fn get_option(&self, name: OptionName) -> io::Result<SocketOption> {
        self.inner.get_option(name)
    }

    pub fn set_send_timeout(&mut self, timeout: time::Duration) -> io::Result<()> {
        self.set_option(SocketOption::SendTimeout(Some(timeout)))
    }

    pub fn set_recv_timeout(&mut self, timeout: time::Duration) -> io::Result<()> {
        self.set_option(SocketOption::RecvTimeout(Some(timeout)))
    }

    pub fn set_send_priority(&mut self, priority: u8) -> io::Result<()> {
        self.set_option(SocketOption::SendPriority(priority))
    }

    pub fn set_recv_priority(&mut self, priority: u8) -> io::Result<()> {
        self.set_option(SocketOption::RecvPriority(priority))
    }

    /// The descriptor readable exactly while a non-blocking send would
    /// succeed, suitable for select/poll/epoll. Fails on patterns that
    /// cannot send.
    pub fn send_fd(&self) -> io::Result<RawFd> {
        self.inner.send_fd()
    }

    /// The descriptor readable exactly while a non-blocking receive
    /// would succeed. Fails on patterns that cannot receive.
    pub fn recv_fd(&self) -> io::Result<RawFd> {
        self.inner.recv_fd()
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        registry::close_socket(self.fd);
    }
}
