// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

//! Building blocks shared by the stream transports: the protocol header
//! exchanged right after connecting, and the step-wise operations that
//! move one message at a time over a non-blocking stream.
//!
//! On the wire every message is a big-endian 64-bit length prefix
//! followed by the protocol header concatenated with the body.

use std::io;
use std::io::{Read, Write};

use byteorder::{BigEndian, ByteOrder};
use iovec::IoVec;

use mio;

use message::Message;
use io_error::*;

/// The connection types the stream machinery drives: a readable/writable
/// non-blocking byte stream that can be registered with a poll instance.
/// Gather-writes fall back to plain writes where the stream has no
/// vectored support.
pub trait StepStream : io::Read + io::Write + Send {
    fn evented(&self) -> &dyn mio::Evented;

    fn writev(&mut self, bufs: &[&IoVec]) -> io::Result<usize> {
        match bufs.first() {
            Some(buf) => self.write(buf),
            None => Ok(0)
        }
    }
}

impl StepStream for mio::tcp::TcpStream {
    fn evented(&self) -> &dyn mio::Evented {
        self
    }

    fn writev(&mut self, bufs: &[&IoVec]) -> io::Result<usize> {
        mio::tcp::TcpStream::write_bufs(self, bufs)
    }
}

impl StepStream for ::mio_uds::UnixStream {
    fn evented(&self) -> &dyn mio::Evented {
        self
    }
}

/*****************************************************************************/
/* handshake                                                                 */
/*****************************************************************************/

/// The header both sides send on connect:
/// Zero, 'S', 'P', Version, Proto[2], Rsvd[2].
pub fn create_handshake(protocol: u16) -> [u8; 8] {
    let mut handshake = [0, 83, 80, 0, 0, 0, 0, 0];

    BigEndian::write_u16(&mut handshake[4..6], protocol);
    handshake
}

/// Validates the peer's header and extracts its protocol id.
/// The caller still has to run the peer id past its `ispeer` gate.
pub fn parse_handshake(handshake: &[u8; 8]) -> io::Result<u16> {
    if handshake[0] != 0 || handshake[1] != 83 || handshake[2] != 80 || handshake[3] != 0 {
        return Err(invalid_data_io_error("received bad handshake"));
    }
    if handshake[6] != 0 || handshake[7] != 0 {
        return Err(invalid_data_io_error("received bad handshake"));
    }

    Ok(BigEndian::read_u16(&handshake[4..6]))
}

/*****************************************************************************/
/* send operation                                                            */
/*****************************************************************************/

/// Writes one message: length prefix, then header and body, with a
/// gather-write whenever more than one piece is still pending.
pub struct SendOperation {
    prefix: [u8; 8],
    msg: Message,
    written: usize
}

impl SendOperation {
    pub fn new(msg: Message) -> SendOperation {
        let mut prefix = [0u8; 8];

        BigEndian::write_u64(&mut prefix, msg.len() as u64);
        SendOperation {
            prefix: prefix,
            msg: msg,
            written: 0
        }
    }

    /// Makes progress; true means the whole message is out.
    pub fn run(&mut self, stream: &mut dyn StepStream) -> io::Result<bool> {
        let total = self.prefix.len() + self.msg.len();

        while self.written < total {
            let mut pieces: Vec<&[u8]> = Vec::with_capacity(3);
            let mut skip = self.written;

            for piece in &[&self.prefix[..], self.msg.header.as_slice(), self.msg.body.as_slice()] {
                if skip >= piece.len() {
                    skip -= piece.len();
                    continue;
                }
                pieces.push(&piece[skip..]);
                skip = 0;
            }

            let bufs: Vec<&IoVec> = pieces.iter().map(|piece| From::from(*piece)).collect();
            let written = match stream.writev(&bufs) {
                Ok(0) => return Err(io::Error::new(io::ErrorKind::WriteZero, "connection closed")),
                Ok(written) => written,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) => return Err(e)
            };

            self.written += written;
        }

        Ok(true)
    }
}

/*****************************************************************************/
/* recv operation                                                            */
/*****************************************************************************/

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum RecvOperationStep {
    Prefix,
    Payload,
    Done
}

impl RecvOperationStep {
    fn next(&self) -> RecvOperationStep {
        match *self {
            RecvOperationStep::Prefix  => RecvOperationStep::Payload,
            RecvOperationStep::Payload => RecvOperationStep::Done,
            RecvOperationStep::Done    => RecvOperationStep::Done
        }
    }
}

/// Reads one message: the 8-byte length prefix, then the payload.
/// The header/body split is unknown at this level, everything lands in
/// the body and the protocol splits it later.
pub struct RecvOperation {
    step: RecvOperationStep,
    read: usize,
    prefix: [u8; 8],
    msg_len: u64,
    buffer: Option<Vec<u8>>
}

impl RecvOperation {
    pub fn new() -> RecvOperation {
        RecvOperation {
            step: RecvOperationStep::Prefix,
            read: 0,
            prefix: [0u8; 8],
            msg_len: 0,
            buffer: None
        }
    }

    fn step_forward(&mut self) {
        self.step = self.step.next();
        self.read = 0;
    }

    /// Makes progress; the message is returned once it is complete.
    pub fn run(&mut self, stream: &mut dyn StepStream) -> io::Result<Option<Message>> {
        if self.step == RecvOperationStep::Prefix {
            self.read += RecvOperation::recv_buffer(stream, &mut self.prefix[self.read..])?;

            if self.read == self.prefix.len() {
                self.msg_len = BigEndian::read_u64(&self.prefix);
                self.buffer = Some(vec![0u8; self.msg_len as usize]);
                self.step_forward();
            } else {
                return Ok(None);
            }
        }

        if self.step == RecvOperationStep::Payload {
            let mut buffer = match self.buffer.take() {
                Some(buffer) => buffer,
                None => return Err(other_io_error("recv operation has no buffer"))
            };

            self.read += RecvOperation::recv_buffer(stream, &mut buffer[self.read..])?;

            if self.read as u64 == self.msg_len {
                self.step_forward();
                return Ok(Some(Message::with_body(buffer)));
            } else {
                self.buffer = Some(buffer);
                return Ok(None);
            }
        }

        Err(other_io_error("recv operation already completed"))
    }

    fn recv_buffer(stream: &mut dyn StepStream, buffer: &mut [u8]) -> io::Result<usize> {
        if buffer.is_empty() {
            return Ok(0);
        }

        match stream.read(buffer) {
            Ok(0) => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed")),
            Ok(read) => Ok(read),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::io::{Read, Write};
    use std::collections::VecDeque;

    use iovec::IoVec;
    use mio;

    use message::Message;
    use super::*;

    /// A loopback stream fed by the test, with a configurable choke on
    /// how many bytes each read or write may move.
    struct TestStream {
        data: VecDeque<u8>,
        choke: usize
    }

    impl TestStream {
        fn new(choke: usize) -> TestStream {
            TestStream {
                data: VecDeque::new(),
                choke: choke
            }
        }
    }

    impl Read for TestStream {
        fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
            if self.data.is_empty() {
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "drained"));
            }

            let count = self.choke.min(buffer.len()).min(self.data.len());
            for slot in buffer.iter_mut().take(count) {
                *slot = self.data.pop_front().unwrap_or(0);
            }
            Ok(count)
        }
    }

    impl Write for TestStream {
        fn write(&mut self, buffer: &[u8]) -> io::Result<usize> {
            let count = self.choke.min(buffer.len());

            self.data.extend(buffer.iter().take(count));
            Ok(count)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl StepStream for TestStream {
        fn evented(&self) -> &dyn mio::Evented {
            unimplemented!()
        }

        fn writev(&mut self, bufs: &[&IoVec]) -> io::Result<usize> {
            match bufs.first() {
                Some(buf) => self.write(buf),
                None => Ok(0)
            }
        }
    }

    #[test]
    fn handshake_round_trip() {
        let handshake = create_handshake(49);

        assert_eq!([0, 83, 80, 0, 0, 49, 0, 0], handshake);
        assert_eq!(49, parse_handshake(&handshake).unwrap());
    }

    #[test]
    fn bad_handshake_is_rejected() {
        let mut handshake = create_handshake(49);

        handshake[1] = 84;
        assert!(parse_handshake(&handshake).is_err());
    }

    #[test]
    fn message_survives_a_choked_stream() {
        let mut stream = TestStream::new(3);
        let msg = Message::with_header_and_body(
            vec![128, 0, 0, 1],
            ::message::Chunk::from_vec(b"hello world".to_vec()));
        let mut send = SendOperation::new(msg);

        // the choke forces several partial writes
        while !send.run(&mut stream).unwrap() {}

        let mut recv = RecvOperation::new();
        let received = loop {
            if let Some(msg) = recv.run(&mut stream).unwrap() {
                break msg;
            }
        };

        // the split is gone: everything is in the body
        assert!(received.header.is_empty());
        assert_eq!(15, received.body.len());
        assert_eq!(&[128, 0, 0, 1], &received.body.as_slice()[..4]);
        assert_eq!(b"hello world", &received.body.as_slice()[4..]);
    }
}
