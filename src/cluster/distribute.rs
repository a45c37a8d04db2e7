use crate::cluster::comm::Communicator;
use crate::cluster::wire::{GridHeader, broadcast_slice, broadcast_value};
use crate::error::{PatternMatchingError, Result};
use crate::problem::{PatternObject, Picture, Problem};
use bytemuck::Zeroable;
use log::debug;
use std::borrow::Cow;

/// Replicate the coordinator's problem on every rank.
///
/// Collective: every rank must call this, the coordinator with `Some`, workers
/// with `None`. Steps run in a fixed order on all ranks: threshold, picture
/// count, object count, then each picture's header and cells, then each
/// object's. The coordinator keeps borrowing its own copy; workers receive an
/// owned, revalidated one.
pub fn distribute<'a>(comm: &dyn Communicator, root: Option<&'a Problem>) -> Result<Cow<'a, Problem>> {
    if comm.is_coordinator() {
        let problem = root
            .ok_or_else(|| PatternMatchingError::Protocol("coordinator has no problem to distribute".to_string()))?;
        broadcast_value(comm, problem.threshold())?;
        broadcast_value(comm, problem.pictures().len() as u64)?;
        broadcast_value(comm, problem.objects().len() as u64)?;
        for picture in problem.pictures() {
            send_grid(comm, picture.id(), picture.dim(), picture.cells())?;
        }
        for object in problem.objects() {
            send_grid(comm, object.id(), object.dim(), object.cells())?;
        }
        debug!(
            "Distributed {} pictures and {} objects to {} worker(s)",
            problem.pictures().len(),
            problem.objects().len(),
            comm.size() - 1
        );
        return Ok(Cow::Borrowed(problem));
    }

    let threshold: f64 = broadcast_value(comm, 0.0)?;
    let picture_count = receive_count(comm)?;
    let object_count = receive_count(comm)?;
    let pictures = (0..picture_count)
        .map(|_| {
            let (id, dim, cells) = receive_grid(comm)?;
            Picture::new(id, dim, cells)
        })
        .collect::<Result<Vec<_>>>()?;
    let objects = (0..object_count)
        .map(|_| {
            let (id, dim, cells) = receive_grid(comm)?;
            PatternObject::new(id, dim, cells)
        })
        .collect::<Result<Vec<_>>>()?;
    debug!(
        "Rank {} received {} pictures and {} objects",
        comm.rank(),
        pictures.len(),
        objects.len()
    );
    Problem::new(threshold, pictures, objects).map(Cow::Owned)
}

fn send_grid(comm: &dyn Communicator, id: i32, dim: usize, cells: &[i32]) -> Result<()> {
    let header = GridHeader {
        id,
        _pad: 0,
        dim: dim as u64,
    };
    broadcast_value(comm, header)?;
    broadcast_slice(comm, cells)?;
    Ok(())
}

fn receive_grid(comm: &dyn Communicator) -> Result<(i32, usize, Vec<i32>)> {
    let header = broadcast_value(comm, GridHeader::zeroed())?;
    let dim = usize::try_from(header.dim)
        .map_err(|_| PatternMatchingError::Protocol(format!("grid {} has dimension {}", header.id, header.dim)))?;
    let cells = broadcast_slice::<i32>(comm, &[])?
        .ok_or_else(|| PatternMatchingError::Protocol("coordinator received its own broadcast".to_string()))?;
    Ok((header.id, dim, cells))
}

fn receive_count(comm: &dyn Communicator) -> Result<usize> {
    let count: u64 = broadcast_value(comm, 0)?;
    usize::try_from(count).map_err(|_| PatternMatchingError::Protocol(format!("count {count} overflows usize")))
}
