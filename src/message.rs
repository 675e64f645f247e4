// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::fmt;
use std::sync::Arc;

/// A refcounted byte buffer with a movable start offset.
/// Cloning shares the underlying storage, `trim` strips a fixed-size
/// routing prefix without copying. Chunks are never mutated once built,
/// so sharing is safe; a chunk with new content is always a new chunk.
#[derive(Clone)]
pub struct Chunk {
    data: Arc<Vec<u8>>,
    offset: usize
}

impl Chunk {
    pub fn empty() -> Chunk {
        Chunk {
            data: Arc::new(Vec::new()),
            offset: 0
        }
    }

    pub fn from_vec(data: Vec<u8>) -> Chunk {
        Chunk {
            data: Arc::new(data),
            offset: 0
        }
    }

    pub fn len(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Advances the start offset by `count` bytes.
    /// `count` must not exceed the remaining length.
    pub fn trim(&mut self, count: usize) {
        debug_assert!(count <= self.len());
        self.offset += count;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.offset..]
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "Chunk[{}]", self.len())
    }
}

/// The unit transferred across pipes: a protocol header holding routing
/// or backtrace bytes, and an opaque body holding the payload.
/// Moving a message transfers ownership of both chunks, cloning is the
/// shallow refcounted copy the distributor relies on.
#[derive(Clone)]
pub struct Message {
    pub header: Chunk,
    pub body: Chunk
}

impl Message {
    pub fn new() -> Message {
        Message {
            header: Chunk::empty(),
            body: Chunk::empty()
        }
    }

    pub fn with_body(body: Vec<u8>) -> Message {
        Message {
            header: Chunk::empty(),
            body: Chunk::from_vec(body)
        }
    }

    pub fn with_header_and_body(header: Vec<u8>, body: Chunk) -> Message {
        Message {
            header: Chunk::from_vec(header),
            body: body
        }
    }

    /// Number of bytes the message occupies on the wire,
    /// excluding the length prefix itself.
    pub fn len(&self) -> usize {
        self.header.len() + self.body.len()
    }

    pub fn to_buffer(self) -> Vec<u8> {
        self.body.to_vec()
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "Message[{}+{}]", self.header.len(), self.body.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_advances_without_copying() {
        let mut chunk = Chunk::from_vec(vec![1, 2, 3, 4, 5]);
        let shared = chunk.clone();

        chunk.trim(2);

        assert_eq!(&[3, 4, 5], chunk.as_slice());
        assert_eq!(&[1, 2, 3, 4, 5], shared.as_slice());
        assert_eq!(3, chunk.len());
    }

    #[test]
    fn clone_is_shallow() {
        let body = vec![0u8; 1024];
        let msg = Message::with_body(body);
        let copy = msg.clone();

        assert_eq!(msg.body.as_slice().as_ptr(), copy.body.as_slice().as_ptr());
    }

    #[test]
    fn header_starts_empty() {
        let msg = Message::with_body(vec![65, 66, 67]);

        assert!(msg.header.is_empty());
        assert_eq!(3, msg.len());
        assert_eq!(vec![65, 66, 67], msg.to_buffer());
    }
}
