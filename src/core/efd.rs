// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;
use std::io::{Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;

/// A level-triggered readiness signal backed by a socket pair, so that the
/// signalled state is observable from the outside world: the read end is
/// readable exactly while the signal is raised, and its descriptor can be
/// handed to select/poll/epoll alongside foreign file descriptors.
///
/// `signal` and `unsignal` must be paired by the caller; the socket base
/// tracks the signalled state and never signals twice in a row.
pub struct Efd {
    reader: UnixStream,
    writer: UnixStream
}

impl Efd {
    pub fn new() -> io::Result<Efd> {
        let (reader, writer) = UnixStream::pair()?;

        Ok(Efd {
            reader: reader,
            writer: writer
        })
    }

    pub fn signal(&self) -> io::Result<()> {
        (&self.writer).write_all(&[1u8])
    }

    pub fn unsignal(&self) -> io::Result<()> {
        let mut buffer = [0u8; 1];

        (&self.reader).read_exact(&mut buffer)
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.reader.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::time;

    use super::Efd;

    #[test]
    fn signal_makes_the_descriptor_readable() {
        let efd = Efd::new().unwrap();
        let probe_timeout = time::Duration::from_millis(10);
        let mut buffer = [0u8; 1];

        efd.reader.set_read_timeout(Some(probe_timeout)).unwrap();

        // nothing signalled: the probe read runs into its timeout
        assert!((&efd.reader).read(&mut buffer).is_err());

        efd.signal().unwrap();
        assert_eq!(1, (&efd.reader).read(&mut buffer).unwrap());

        // the probe consumed the signal, like unsignal would
        assert!((&efd.reader).read(&mut buffer).is_err());
    }
}
