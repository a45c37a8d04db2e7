//! Process group over TCP in a star topology: every worker holds one
//! connection to the coordinator and nothing else. All protocol steps in this
//! crate are coordinator-to-worker or worker-to-coordinator, so that is
//! enough.

use crate::cluster::comm::{ABORT_TAG, COORDINATOR, Communicator, Tag, decode_frame};
use crate::error::{PatternMatchingError, Result};
use bytemuck::{Pod, Zeroable};
use log::{debug, info};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

const HELLO_TAG: Tag = 0;
const CONNECT_ATTEMPTS: usize = 50;
const CONNECT_BACKOFF: Duration = Duration::from_millis(100);
/// Largest payload a frame may announce.
const MAX_FRAME_LEN: u64 = 1 << 30;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct FrameHeader {
    tag: u32,
    _pad: u32,
    len: u64,
}

pub struct TcpCommunicator {
    rank: usize,
    size: usize,
    // Indexed by peer rank. The coordinator holds a stream per worker; a
    // worker only holds slot 0.
    peers: Vec<Option<TcpStream>>,
}

impl TcpCommunicator {
    /// Join a group of `size` ranks. Rank 0 listens on `addr`, every other
    /// rank connects to it.
    pub fn join(rank: usize, size: usize, addr: &str) -> Result<Self> {
        check_group(rank, size)?;
        if rank == COORDINATOR {
            let listener = TcpListener::bind(addr)?;
            Self::coordinator(listener, size)
        } else {
            Self::worker(rank, size, addr)
        }
    }

    /// Accept `size - 1` workers on `listener`. Workers may connect in any
    /// order; each announces its rank first.
    pub fn coordinator(listener: TcpListener, size: usize) -> Result<Self> {
        check_group(COORDINATOR, size)?;
        info!(
            "Coordinator waiting for {} worker(s) on {}",
            size - 1,
            listener.local_addr()?
        );
        let mut peers: Vec<Option<TcpStream>> = (0..size).map(|_| None).collect();
        for _ in 1..size {
            let (stream, remote) = listener.accept()?;
            stream.set_nodelay(true)?;
            let (tag, payload) = read_frame(&stream)
                .map_err(|e| PatternMatchingError::Transport(format!("handshake with {remote} failed: {e}")))?;
            if tag != HELLO_TAG || payload.len() != 8 {
                return Err(PatternMatchingError::Protocol(format!(
                    "{remote} did not open with a rank announcement"
                )));
            }
            let announced = bytemuck::pod_read_unaligned::<u64>(&payload);
            let slot = usize::try_from(announced)
                .ok()
                .filter(|&rank| rank != COORDINATOR && rank < size)
                .and_then(|rank| peers.get_mut(rank))
                .filter(|slot| slot.is_none())
                .ok_or_else(|| {
                    PatternMatchingError::Protocol(format!("{remote} announced invalid or duplicate rank {announced}"))
                })?;
            debug!("Rank {} connected from {}", announced, remote);
            *slot = Some(stream);
        }
        Ok(Self {
            rank: COORDINATOR,
            size,
            peers,
        })
    }

    /// Connect to the coordinator at `addr`, retrying while it comes up.
    pub fn worker(rank: usize, size: usize, addr: &str) -> Result<Self> {
        check_group(rank, size)?;
        if rank == COORDINATOR {
            return Err(PatternMatchingError::Transport("rank 0 must be the coordinator".to_string()));
        }

        let mut attempt = 0;
        let stream = loop {
            attempt += 1;
            match TcpStream::connect(addr) {
                Ok(stream) => break stream,
                Err(e) if attempt < CONNECT_ATTEMPTS => {
                    debug!("Rank {} connect attempt {} to {} failed: {}", rank, attempt, addr, e);
                    thread::sleep(CONNECT_BACKOFF);
                }
                Err(e) => {
                    return Err(PatternMatchingError::Transport(format!(
                        "rank {rank} could not reach coordinator at {addr}: {e}"
                    )));
                }
            }
        };
        stream.set_nodelay(true)?;
        write_frame(&stream, HELLO_TAG, bytemuck::bytes_of(&(rank as u64)))?;

        let mut peers: Vec<Option<TcpStream>> = (0..size).map(|_| None).collect();
        peers[COORDINATOR] = Some(stream);
        Ok(Self { rank, size, peers })
    }

    fn stream(&self, peer: usize) -> Result<&TcpStream> {
        if peer == self.rank {
            return Err(PatternMatchingError::Transport(format!("rank {peer} cannot message itself")));
        }
        self.peers.get(peer).and_then(Option::as_ref).ok_or_else(|| {
            PatternMatchingError::Transport(format!("rank {} has no connection to rank {}", self.rank, peer))
        })
    }
}

fn check_group(rank: usize, size: usize) -> Result<()> {
    if size == 0 || rank >= size {
        return Err(PatternMatchingError::Transport(format!(
            "rank {rank} is outside a group of {size}"
        )));
    }
    Ok(())
}

fn write_frame(mut stream: &TcpStream, tag: Tag, payload: &[u8]) -> std::io::Result<()> {
    if payload.len() as u64 > MAX_FRAME_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("payload of {} bytes exceeds the frame limit", payload.len()),
        ));
    }
    let header = FrameHeader {
        tag,
        _pad: 0,
        len: payload.len() as u64,
    };
    stream.write_all(bytemuck::bytes_of(&header))?;
    stream.write_all(payload)?;
    stream.flush()
}

fn read_frame(mut stream: &TcpStream) -> std::io::Result<(Tag, Vec<u8>)> {
    let mut raw = [0u8; std::mem::size_of::<FrameHeader>()];
    stream.read_exact(&mut raw)?;
    let header: FrameHeader = bytemuck::pod_read_unaligned(&raw);
    if header.len > MAX_FRAME_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame announces {} bytes, limit is {}", header.len, MAX_FRAME_LEN),
        ));
    }
    // The buffer grows with the bytes that actually arrive.
    let mut payload = Vec::new();
    stream.take(header.len).read_to_end(&mut payload)?;
    if payload.len() as u64 != header.len {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("frame ended after {} of {} bytes", payload.len(), header.len),
        ));
    }
    Ok((header.tag, payload))
}

impl Communicator for TcpCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send_bytes(&self, dest: usize, tag: Tag, payload: &[u8]) -> Result<()> {
        write_frame(self.stream(dest)?, tag, payload)
            .map_err(|e| PatternMatchingError::Transport(format!("send to rank {dest} failed: {e}")))
    }

    fn recv_bytes(&self, source: usize, tag: Tag) -> Result<Vec<u8>> {
        let (received, payload) = read_frame(self.stream(source)?)
            .map_err(|e| PatternMatchingError::Transport(format!("receive from rank {source} failed: {e}")))?;
        decode_frame(source, tag, received, payload)
    }

    fn abort(&self, code: i32) {
        debug!("Rank {} aborting group with code {}", self.rank, code);
        for stream in self.peers.iter().flatten() {
            let _ = write_frame(stream, ABORT_TAG, &code.to_ne_bytes());
        }
    }
}
