use crate::error::{PatternMatchingError, Result};

/// Rank that loads input, broadcasts the problem and writes the output.
pub const COORDINATOR: usize = 0;

/// Exit code used when the coordinator cannot load its input.
pub const INPUT_FAILURE_CODE: i32 = 2;

pub type Tag = u32;

pub const BROADCAST_TAG: Tag = 1;
pub const RESULT_COUNT_TAG: Tag = 100;
pub const RESULT_RECORDS_TAG: Tag = 101;
pub const ABORT_TAG: Tag = u32::MAX;

/// A fixed-size group of ranks exchanging tagged byte messages.
///
/// Messages between one ordered pair of ranks arrive in send order. Receives
/// block until a message arrives, the peer disappears, or an abort notice is
/// delivered; there are no timeouts.
pub trait Communicator {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn send_bytes(&self, dest: usize, tag: Tag, payload: &[u8]) -> Result<()>;

    /// Receive the next message from `source`. An abort notice surfaces as
    /// `GroupAborted`; any other tag than `tag` is a protocol error.
    fn recv_bytes(&self, source: usize, tag: Tag) -> Result<Vec<u8>>;

    /// Tell every reachable peer to give up with `code`. Best effort.
    fn abort(&self, code: i32);

    fn is_coordinator(&self) -> bool {
        self.rank() == COORDINATOR
    }

    /// Collective broadcast from `root`. Every rank must call it in the same
    /// order. The root sends `outgoing` and gets `None`; every other rank
    /// ignores `outgoing` and gets the root's payload.
    fn broadcast_bytes(&self, root: usize, outgoing: &[u8]) -> Result<Option<Vec<u8>>> {
        if self.rank() == root {
            for dest in (0..self.size()).filter(|&dest| dest != root) {
                self.send_bytes(dest, BROADCAST_TAG, outgoing)?;
            }
            Ok(None)
        } else {
            self.recv_bytes(root, BROADCAST_TAG).map(Some)
        }
    }
}

/// Turn a received frame into its payload, surfacing abort notices and tag
/// mismatches as errors.
pub(crate) fn decode_frame(source: usize, expected: Tag, tag: Tag, payload: Vec<u8>) -> Result<Vec<u8>> {
    if tag == ABORT_TAG {
        let code = payload
            .get(..4)
            .and_then(|bytes| bytes.try_into().ok())
            .map(i32::from_ne_bytes)
            .unwrap_or(1);
        return Err(PatternMatchingError::GroupAborted { code });
    }
    if tag != expected {
        return Err(PatternMatchingError::Protocol(format!(
            "expected tag {expected} from rank {source}, got {tag}"
        )));
    }
    Ok(payload)
}
