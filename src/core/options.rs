// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;
use std::time::Duration;

use io_error::*;

/// Options settable through [Socket::set_option](struct.Socket.html#method.set_option).
/// Generic options are handled by the socket base, pattern options
/// (`ResendInterval`, `SurveyDeadline`, `Subscribe`, `Unsubscribe`) are
/// delegated to the protocol, transport options (`TcpNoDelay`) to the
/// lazily created per-transport option set.
pub enum SocketOption {
    /// How long a closing socket keeps trying to flush pending messages. Default 1 s.
    Linger(Duration),
    /// Send buffer size in bytes. Default 128 KiB.
    SendBuffer(usize),
    /// Receive buffer size in bytes. Default 128 KiB.
    RecvBuffer(usize),
    /// Timeout applied to send operations, `None` blocks forever. Default `None`.
    SendTimeout(Option<Duration>),
    /// Timeout applied to receive operations, `None` blocks forever. Default `None`.
    RecvTimeout(Option<Duration>),
    /// Delay before the first reconnection attempt after a connection loss. Default 100 ms.
    ReconnectInterval(Duration),
    /// Upper bound of the exponential reconnection backoff, zero disables the growth. Default zero.
    ReconnectIntervalMax(Duration),
    /// Priority, from 1 (highest) to 16, given to pipes added from now on when sending.
    SendPriority(u8),
    /// Priority, from 1 (highest) to 16, given to pipes added from now on when receiving.
    RecvPriority(u8),
    /// How long a req socket waits for a reply before re-sending the request. Default 60 s.
    ResendInterval(Duration),
    /// How long a surveyor socket accepts responses after sending a survey. Default 1 s.
    SurveyDeadline(Duration),
    /// Adds a topic to a sub socket: messages starting with these bytes are delivered.
    Subscribe(Vec<u8>),
    /// Removes a previously subscribed topic from a sub socket.
    Unsubscribe(Vec<u8>),
    /// Disables Nagle's algorithm on tcp connections made from now on. Default true.
    TcpNoDelay(bool)
}

/// Names the readable options for [Socket::get_option](struct.Socket.html#method.get_option).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionName {
    Linger,
    SendBuffer,
    RecvBuffer,
    SendTimeout,
    RecvTimeout,
    ReconnectInterval,
    ReconnectIntervalMax,
    SendPriority,
    RecvPriority,
    ResendInterval,
    SurveyDeadline,
    TcpNoDelay
}

/// The generic option set every socket carries.
pub struct Options {
    pub linger: Duration,
    pub sndbuf: usize,
    pub rcvbuf: usize,
    pub sndtimeo: Option<Duration>,
    pub rcvtimeo: Option<Duration>,
    pub reconnect_ivl: Duration,
    pub reconnect_ivl_max: Duration,
    pub sndprio: u8,
    pub rcvprio: u8
}

impl Options {
    pub fn new() -> Options {
        Options {
            linger: Duration::from_millis(1000),
            sndbuf: 128 * 1024,
            rcvbuf: 128 * 1024,
            sndtimeo: None,
            rcvtimeo: None,
            reconnect_ivl: Duration::from_millis(100),
            reconnect_ivl_max: Duration::from_millis(0),
            sndprio: 8,
            rcvprio: 8
        }
    }

    /// Applies a generic option, with range checks.
    /// Returns `Ok(false)` when the option is not a generic one, so the
    /// caller can delegate it to the protocol or transport level.
    pub fn set(&mut self, option: &SocketOption) -> io::Result<bool> {
        match *option {
            SocketOption::Linger(value) => self.linger = value,
            SocketOption::SendBuffer(value) => {
                if value == 0 {
                    return Err(invalid_input_io_error("send buffer must be positive"));
                }
                self.sndbuf = value;
            },
            SocketOption::RecvBuffer(value) => {
                if value == 0 {
                    return Err(invalid_input_io_error("recv buffer must be positive"));
                }
                self.rcvbuf = value;
            },
            SocketOption::SendTimeout(value) => self.sndtimeo = value,
            SocketOption::RecvTimeout(value) => self.rcvtimeo = value,
            SocketOption::ReconnectInterval(value) => self.reconnect_ivl = value,
            SocketOption::ReconnectIntervalMax(value) => self.reconnect_ivl_max = value,
            SocketOption::SendPriority(value) => {
                self.sndprio = check_priority(value)?;
            },
            SocketOption::RecvPriority(value) => {
                self.rcvprio = check_priority(value)?;
            },
            _ => return Ok(false)
        }

        Ok(true)
    }

    pub fn get(&self, name: OptionName) -> Option<SocketOption> {
        match name {
            OptionName::Linger => Some(SocketOption::Linger(self.linger)),
            OptionName::SendBuffer => Some(SocketOption::SendBuffer(self.sndbuf)),
            OptionName::RecvBuffer => Some(SocketOption::RecvBuffer(self.rcvbuf)),
            OptionName::SendTimeout => Some(SocketOption::SendTimeout(self.sndtimeo)),
            OptionName::RecvTimeout => Some(SocketOption::RecvTimeout(self.rcvtimeo)),
            OptionName::ReconnectInterval => Some(SocketOption::ReconnectInterval(self.reconnect_ivl)),
            OptionName::ReconnectIntervalMax => Some(SocketOption::ReconnectIntervalMax(self.reconnect_ivl_max)),
            OptionName::SendPriority => Some(SocketOption::SendPriority(self.sndprio)),
            OptionName::RecvPriority => Some(SocketOption::RecvPriority(self.rcvprio)),
            _ => None
        }
    }
}

/// The tcp transport option set, allocated the first time a tcp option is touched.
pub struct TcpOptions {
    pub no_delay: bool
}

impl TcpOptions {
    pub fn new() -> TcpOptions {
        TcpOptions { no_delay: true }
    }
}

fn check_priority(value: u8) -> io::Result<u8> {
    if value >= 1 && value <= 16 {
        Ok(value)
    } else {
        Err(invalid_input_io_error("priority must be between 1 and 16"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_options_are_range_checked() {
        let mut options = Options::new();

        assert!(options.set(&SocketOption::SendBuffer(0)).is_err());
        assert!(options.set(&SocketOption::SendPriority(0)).is_err());
        assert!(options.set(&SocketOption::RecvPriority(17)).is_err());
        assert_eq!(8, options.sndprio);

        assert!(options.set(&SocketOption::SendPriority(1)).unwrap());
        assert_eq!(1, options.sndprio);
    }

    #[test]
    fn pattern_options_are_not_handled_here() {
        let mut options = Options::new();
        let handled = options.set(&SocketOption::Subscribe(b"topic".to_vec())).unwrap();

        assert!(!handled);
    }
}
