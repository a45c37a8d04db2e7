//! One rank's part of a full run: load (coordinator only), distribute, search
//! the assigned pictures, aggregate, write the report (coordinator only).

use crate::cluster::{COORDINATOR, Communicator, INPUT_FAILURE_CODE, aggregate, assigned_indices, distribute};
use crate::config::EngineConfig;
use crate::error::{PatternMatchingError, Result};
use crate::problem::loader::load_problem;
use crate::problem::report::write_report;
use crate::problem::{MatchResult, Problem};
use crate::search::SearchEngine;
use log::{debug, error, info};
use std::path::Path;

/// Run the whole pipeline as `comm.rank()`.
///
/// Every rank of the group must call this. The coordinator returns the full
/// ordered result list after writing it to `output`; workers return `None`.
/// If the coordinator cannot load `input` it aborts the group with
/// [`INPUT_FAILURE_CODE`] so workers do not wait forever; any later failure
/// aborts the group as well.
pub fn run_rank(
    comm: &dyn Communicator,
    input: &Path,
    output: &Path,
    config: &EngineConfig,
) -> Result<Option<Vec<MatchResult>>> {
    let loaded = if comm.is_coordinator() {
        match load_problem(input) {
            Ok(problem) => {
                info!(
                    "Loaded {} pictures and {} objects from {} (threshold {})",
                    problem.pictures().len(),
                    problem.objects().len(),
                    input.display(),
                    problem.threshold()
                );
                Some(problem)
            }
            Err(e) => {
                error!("Failed to load {}: {}", input.display(), e);
                comm.abort(INPUT_FAILURE_CODE);
                return Err(e);
            }
        }
    } else {
        None
    };

    let outcome = run_protocol(comm, loaded.as_ref(), config);
    if let Err(e) = &outcome {
        if !matches!(e, PatternMatchingError::GroupAborted { .. }) {
            error!("Rank {} failed: {}", comm.rank(), e);
            comm.abort(e.exit_code());
        }
    }

    let results = outcome?;
    if let Some(results) = &results {
        write_report(output, results)?;
        info!("Wrote {} results to {}", results.len(), output.display());
    }
    Ok(results)
}

fn run_protocol(
    comm: &dyn Communicator,
    loaded: Option<&Problem>,
    config: &EngineConfig,
) -> Result<Option<Vec<MatchResult>>> {
    let problem = distribute(comm, loaded)?;
    if comm.rank() == COORDINATOR {
        info!("Problem distributed to {} rank(s)", comm.size());
    }

    let engine = SearchEngine::new(config)?;
    debug!("Rank {} search chain: {:?}", comm.rank(), engine.backend_names());
    let local = search_assigned(&engine, comm.rank(), comm.size(), &problem);
    aggregate(comm, &problem, &local)
}

/// Search this rank's share of the pictures one after another, in roster
/// order.
pub fn search_assigned(engine: &SearchEngine, rank: usize, size: usize, problem: &Problem) -> Vec<MatchResult> {
    let pictures = problem.pictures();
    let results: Vec<MatchResult> = assigned_indices(rank, size, pictures.len())
        .map(|index| engine.find_match(&pictures[index], problem.objects(), problem.threshold()))
        .collect();
    debug!(
        "Rank {} searched {} pictures, {} found",
        rank,
        results.len(),
        results.iter().filter(|r| r.is_found()).count()
    );
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{PatternObject, Picture, Position};

    #[test]
    fn test_search_assigned_covers_only_owned_pictures() {
        let pictures = (0..5).map(|id| Picture::new(id, 1, vec![id + 1]).unwrap()).collect();
        let objects = vec![PatternObject::new(9, 1, vec![3]).unwrap()];
        let problem = Problem::new(0.01, pictures, objects).unwrap();
        let engine = SearchEngine::new(&EngineConfig::cpu_only()).unwrap();

        let results = search_assigned(&engine, 0, 2, &problem);
        assert_eq!(
            results,
            vec![
                MatchResult::not_found(0),
                MatchResult::found(2, 9, Position::new(0, 0)),
                MatchResult::not_found(4),
            ]
        );
    }
}
