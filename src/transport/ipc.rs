// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::fs;
use std::io;
use std::path::Path;

use mio_uds::{UnixListener, UnixStream};

pub fn bind(addr: &str) -> io::Result<UnixListener> {
    // a previous run may have left the socket file behind
    let _ = fs::remove_file(addr);

    UnixListener::bind(addr)
}

pub fn connect(path: &Path) -> io::Result<UnixStream> {
    UnixStream::connect(path)
}
