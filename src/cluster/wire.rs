//! Fixed-layout records exchanged between ranks.
//!
//! Everything is plain old data cast with bytemuck, in native byte order;
//! all ranks of a group are expected to share one architecture.

use crate::cluster::comm::{COORDINATOR, Communicator};
use crate::error::{PatternMatchingError, Result};
use crate::problem::{MatchResult, Position};
use bytemuck::{AnyBitPattern, NoUninit, Pod, Zeroable};

/// Identifier and dimension sent ahead of each grid.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct GridHeader {
    pub id: i32,
    pub _pad: u32,
    pub dim: u64,
}

/// One flattened match result: picture id, found flag, object id, row, col.
/// Unused fields of a not-found result are -1.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct WireResult {
    pub picture_id: i32,
    pub found: i32,
    pub object_id: i32,
    pub row: i32,
    pub col: i32,
}

impl WireResult {
    pub fn encode(result: &MatchResult) -> Result<Self> {
        Ok(match result.found {
            Some(found) => Self {
                picture_id: result.picture_id,
                found: 1,
                object_id: found.object_id,
                row: to_i32(found.position.row)?,
                col: to_i32(found.position.col)?,
            },
            None => Self {
                picture_id: result.picture_id,
                found: 0,
                object_id: -1,
                row: -1,
                col: -1,
            },
        })
    }

    pub fn decode(self) -> Result<MatchResult> {
        if self.found == 0 {
            return Ok(MatchResult::not_found(self.picture_id));
        }
        let (Ok(row), Ok(col)) = (usize::try_from(self.row), usize::try_from(self.col)) else {
            return Err(PatternMatchingError::Protocol(format!(
                "picture {} reported found at negative position ({}, {})",
                self.picture_id, self.row, self.col
            )));
        };
        Ok(MatchResult::found(self.picture_id, self.object_id, Position::new(row, col)))
    }
}

fn to_i32(value: usize) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| PatternMatchingError::Protocol(format!("position {value} does not fit the wire format")))
}

/// Decode a byte payload into a vector of `T`, whatever its alignment.
pub fn decode_pod<T: AnyBitPattern>(bytes: &[u8]) -> Result<Vec<T>> {
    let size = std::mem::size_of::<T>();
    if size == 0 || bytes.len() % size != 0 {
        return Err(PatternMatchingError::Protocol(format!(
            "payload of {} bytes is not a whole number of {}-byte records",
            bytes.len(),
            size
        )));
    }
    Ok(bytes.chunks_exact(size).map(bytemuck::pod_read_unaligned).collect())
}

pub fn decode_one<T: AnyBitPattern>(bytes: &[u8]) -> Result<T> {
    if bytes.len() != std::mem::size_of::<T>() {
        return Err(PatternMatchingError::Protocol(format!(
            "expected a {}-byte value, got {} bytes",
            std::mem::size_of::<T>(),
            bytes.len()
        )));
    }
    Ok(bytemuck::pod_read_unaligned(bytes))
}

/// Broadcast a slice from the coordinator. The coordinator gets `None`, every
/// other rank gets the coordinator's values.
pub fn broadcast_slice<T: NoUninit + AnyBitPattern>(comm: &dyn Communicator, outgoing: &[T]) -> Result<Option<Vec<T>>> {
    comm.broadcast_bytes(COORDINATOR, bytemuck::cast_slice(outgoing))?
        .map(|bytes| decode_pod(&bytes))
        .transpose()
}

/// Broadcast one value from the coordinator; non-coordinators' `value` is
/// ignored and replaced by the coordinator's.
pub fn broadcast_value<T: Pod>(comm: &dyn Communicator, value: T) -> Result<T> {
    match comm.broadcast_bytes(COORDINATOR, bytemuck::bytes_of(&value))? {
        Some(bytes) => decode_one(&bytes),
        None => Ok(value),
    }
}
