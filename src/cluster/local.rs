//! In-process process group: every rank is a thread, every ordered pair of
//! ranks has its own channel.

use crate::cluster::comm::{ABORT_TAG, Communicator, Tag, decode_frame};
use crate::error::{PatternMatchingError, Result};
use crossbeam_channel::{Receiver, Sender, unbounded};
use log::debug;

struct Frame {
    tag: Tag,
    payload: Vec<u8>,
}

pub struct LocalEndpoint {
    rank: usize,
    // Indexed by peer rank; the slot for `rank` itself is unused.
    outboxes: Vec<Sender<Frame>>,
    inboxes: Vec<Receiver<Frame>>,
}

pub struct LocalCluster;

impl LocalCluster {
    /// Fully connected endpoints for a group of `size` ranks, in rank order.
    pub fn endpoints(size: usize) -> Vec<LocalEndpoint> {
        let mut outboxes: Vec<Vec<Sender<Frame>>> = (0..size).map(|_| Vec::with_capacity(size)).collect();
        let mut inboxes: Vec<Vec<Receiver<Frame>>> = (0..size).map(|_| Vec::with_capacity(size)).collect();
        for sender_outboxes in outboxes.iter_mut() {
            // Visiting senders in rank order leaves inboxes[dst][src].
            for receiver_inboxes in inboxes.iter_mut() {
                let (tx, rx) = unbounded();
                sender_outboxes.push(tx);
                receiver_inboxes.push(rx);
            }
        }

        outboxes
            .into_iter()
            .zip(inboxes)
            .enumerate()
            .map(|(rank, (outboxes, inboxes))| LocalEndpoint {
                rank,
                outboxes,
                inboxes,
            })
            .collect()
    }

    /// Run `body` once per rank on its own thread and collect the results in
    /// rank order. A rank that panics yields a transport error.
    pub fn run<T, F>(size: usize, body: F) -> Vec<Result<T>>
    where
        T: Send,
        F: Fn(LocalEndpoint) -> Result<T> + Sync,
    {
        let body = &body;
        std::thread::scope(|scope| {
            let handles: Vec<_> = Self::endpoints(size)
                .into_iter()
                .map(|endpoint| {
                    let rank = endpoint.rank;
                    let handle = std::thread::Builder::new()
                        .name(format!("rank-{rank}"))
                        .spawn_scoped(scope, move || body(endpoint));
                    (rank, handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(rank, handle)| match handle {
                    Ok(handle) => handle
                        .join()
                        .unwrap_or_else(|_| Err(PatternMatchingError::Transport(format!("rank {rank} panicked")))),
                    Err(e) => Err(PatternMatchingError::Transport(format!("failed to spawn rank {rank}: {e}"))),
                })
                .collect()
        })
    }
}

impl LocalEndpoint {
    fn check_peer(&self, peer: usize) -> Result<()> {
        if peer >= self.outboxes.len() || peer == self.rank {
            return Err(PatternMatchingError::Transport(format!(
                "rank {} cannot address peer {} in a group of {}",
                self.rank,
                peer,
                self.outboxes.len()
            )));
        }
        Ok(())
    }
}

impl Communicator for LocalEndpoint {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.outboxes.len()
    }

    fn send_bytes(&self, dest: usize, tag: Tag, payload: &[u8]) -> Result<()> {
        self.check_peer(dest)?;
        self.outboxes[dest]
            .send(Frame {
                tag,
                payload: payload.to_vec(),
            })
            .map_err(|_| PatternMatchingError::Transport(format!("rank {dest} has left the group")))
    }

    fn recv_bytes(&self, source: usize, tag: Tag) -> Result<Vec<u8>> {
        self.check_peer(source)?;
        let frame = self.inboxes[source]
            .recv()
            .map_err(|_| PatternMatchingError::Transport(format!("rank {source} has left the group")))?;
        decode_frame(source, tag, frame.tag, frame.payload)
    }

    fn abort(&self, code: i32) {
        debug!("Rank {} aborting group with code {}", self.rank, code);
        for (peer, outbox) in self.outboxes.iter().enumerate() {
            if peer != self.rank {
                let _ = outbox.send(Frame {
                    tag: ABORT_TAG,
                    payload: code.to_ne_bytes().to_vec(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::comm::BROADCAST_TAG;

    #[test]
    fn test_point_to_point_preserves_order() {
        let results = LocalCluster::run(2, |comm| {
            if comm.rank() == 1 {
                comm.send_bytes(0, 7, b"first")?;
                comm.send_bytes(0, 7, b"second")?;
                Ok(vec![])
            } else {
                Ok(vec![comm.recv_bytes(1, 7)?, comm.recv_bytes(1, 7)?])
            }
        });
        let coordinator = results.into_iter().next().unwrap().unwrap();
        assert_eq!(coordinator, vec![b"first".to_vec(), b"second".to_vec()]);
    }

    #[test]
    fn test_broadcast_reaches_every_rank() {
        let results = LocalCluster::run(4, |comm| {
            let received = comm.broadcast_bytes(0, if comm.rank() == 0 { &b"hello"[..] } else { &[] })?;
            Ok(received)
        });
        let results: Vec<_> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(results[0], None);
        for received in &results[1..] {
            assert_eq!(received.as_deref(), Some(&b"hello"[..]));
        }
    }

    #[test]
    fn test_abort_unblocks_waiting_ranks() {
        let results = LocalCluster::run(3, |comm| {
            if comm.rank() == 0 {
                comm.abort(2);
                Ok(())
            } else {
                comm.recv_bytes(0, BROADCAST_TAG).map(|_| ())
            }
        });
        assert!(results[0].is_ok());
        for result in &results[1..] {
            assert!(matches!(result, Err(PatternMatchingError::GroupAborted { code: 2 })));
        }
    }

    #[test]
    fn test_unexpected_tag_is_protocol_error() {
        let results = LocalCluster::run(2, |comm| {
            if comm.rank() == 1 {
                comm.send_bytes(0, 5, b"x")
            } else {
                comm.recv_bytes(1, 6).map(|_| ())
            }
        });
        assert!(matches!(results[0], Err(PatternMatchingError::Protocol(_))));
    }

    #[test]
    fn test_departed_peer_is_transport_error() {
        let results = LocalCluster::run(2, |comm| {
            if comm.rank() == 1 {
                Ok(())
            } else {
                comm.recv_bytes(1, 5).map(|_| ())
            }
        });
        assert!(matches!(results[0], Err(PatternMatchingError::Transport(_))));
    }
}
