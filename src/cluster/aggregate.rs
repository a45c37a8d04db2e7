use crate::cluster::comm::{COORDINATOR, Communicator, RESULT_COUNT_TAG, RESULT_RECORDS_TAG};
use crate::cluster::partition::assigned_indices;
use crate::cluster::wire::{WireResult, decode_one, decode_pod};
use crate::error::{PatternMatchingError, Result};
use crate::problem::{MatchResult, Problem};
use log::{debug, warn};
use std::collections::HashMap;

/// Gather every rank's results on the coordinator, in picture order.
///
/// Workers send their result count and then all their records in one message,
/// and get `None` back. The coordinator places its own results by partitioner
/// position, then drains ranks `1..size` in rank order and places each record
/// at the first picture carrying its id.
pub fn aggregate(
    comm: &dyn Communicator,
    problem: &Problem,
    local: &[MatchResult],
) -> Result<Option<Vec<MatchResult>>> {
    if !comm.is_coordinator() {
        let records = local.iter().map(WireResult::encode).collect::<Result<Vec<_>>>()?;
        comm.send_bytes(COORDINATOR, RESULT_COUNT_TAG, bytemuck::bytes_of(&(records.len() as u64)))?;
        comm.send_bytes(COORDINATOR, RESULT_RECORDS_TAG, bytemuck::cast_slice(&records))?;
        debug!("Rank {} sent {} results", comm.rank(), records.len());
        return Ok(None);
    }

    let pictures = problem.pictures();
    let mut slots: Vec<Option<MatchResult>> = vec![None; pictures.len()];
    let own = assigned_indices(COORDINATOR, comm.size(), pictures.len());
    for (index, result) in own.zip(local) {
        slots[index] = Some(*result);
    }

    let mut roster = HashMap::with_capacity(pictures.len());
    for (index, picture) in pictures.iter().enumerate() {
        roster.entry(picture.id()).or_insert(index);
    }

    for source in (0..comm.size()).filter(|&rank| rank != COORDINATOR) {
        let count: u64 = decode_one(&comm.recv_bytes(source, RESULT_COUNT_TAG)?)?;
        let records: Vec<WireResult> = decode_pod(&comm.recv_bytes(source, RESULT_RECORDS_TAG)?)?;
        if records.len() as u64 != count {
            return Err(PatternMatchingError::Protocol(format!(
                "rank {source} announced {count} results but sent {}",
                records.len()
            )));
        }
        for record in records {
            let result = record.decode()?;
            match roster.get(&result.picture_id) {
                Some(&index) => slots[index] = Some(result),
                None => warn!("Rank {} reported unknown picture {}", source, result.picture_id),
            }
        }
        debug!("Collected {} results from rank {}", count, source);
    }

    let results = slots
        .into_iter()
        .zip(pictures)
        .map(|(slot, picture)| {
            slot.unwrap_or_else(|| {
                warn!("No rank reported picture {}; treating it as not found", picture.id());
                MatchResult::not_found(picture.id())
            })
        })
        .collect();
    Ok(Some(results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::local::LocalCluster;
    use crate::problem::{Picture, Position};

    fn problem(ids: &[i32]) -> Problem {
        let pictures = ids.iter().map(|&id| Picture::new(id, 1, vec![1]).unwrap()).collect();
        Problem::new(0.5, pictures, vec![]).unwrap()
    }

    // Found for odd ids, not found for even ones.
    fn result_for(id: i32) -> MatchResult {
        if id % 2 != 0 {
            MatchResult::found(id, id * 10, Position::new(id as usize, 0))
        } else {
            MatchResult::not_found(id)
        }
    }

    #[test]
    fn test_results_are_reassembled_in_picture_order() {
        let ids = [5, 8, 13, 2, 21, 34, 1];
        let problem = problem(&ids);
        let results = LocalCluster::run(3, |comm| {
            let local: Vec<_> = assigned_indices(comm.rank(), comm.size(), ids.len())
                .map(|index| result_for(ids[index]))
                .collect();
            aggregate(&comm, &problem, &local)
        });
        let gathered = results[0].as_ref().unwrap().clone().unwrap();
        assert_eq!(gathered, ids.iter().map(|&id| result_for(id)).collect::<Vec<_>>());
        assert!(results[1..].iter().all(|r| matches!(r, Ok(None))));
    }

    #[test]
    fn test_unknown_ids_are_ignored_and_missing_pictures_are_not_found() {
        let problem = problem(&[4, 9]);
        let results = LocalCluster::run(2, |comm| {
            if comm.is_coordinator() {
                aggregate(&comm, &problem, &[MatchResult::found(4, 1, Position::new(0, 0))])
            } else {
                // Rank 1 owns picture 9 but reports an unknown id instead.
                aggregate(&comm, &problem, &[MatchResult::found(77, 1, Position::new(0, 0))])
            }
        });
        let gathered = results[0].as_ref().unwrap().clone().unwrap();
        assert_eq!(
            gathered,
            vec![MatchResult::found(4, 1, Position::new(0, 0)), MatchResult::not_found(9)]
        );
    }

    #[test]
    fn test_count_mismatch_is_protocol_error() {
        let problem = problem(&[1, 2]);
        let results = LocalCluster::run(2, |comm| {
            if comm.is_coordinator() {
                aggregate(&comm, &problem, &[]).map(|_| ())
            } else {
                comm.send_bytes(COORDINATOR, RESULT_COUNT_TAG, bytemuck::bytes_of(&3u64))?;
                let record = WireResult::encode(&MatchResult::not_found(2))?;
                comm.send_bytes(COORDINATOR, RESULT_RECORDS_TAG, bytemuck::bytes_of(&record))
            }
        });
        assert!(matches!(results[0], Err(PatternMatchingError::Protocol(_))));
    }
}
