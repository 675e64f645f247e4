// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

//! The socket base engine: readiness signalling, the pipe contract between
//! protocols and transports, the blocking socket operations, and the
//! process-wide socket table.

pub mod efd;
pub mod options;
pub mod pipe;
pub mod sock;
pub mod registry;
