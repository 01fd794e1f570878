mod config;
use log::{debug, info, warn};

use std::collections::{BTreeMap, BTreeSet, HashMap};

use ndarray::{Array2, ArrayView1};

pub use crate::config::*;

/// Default seed for [cluster_rows], used by [run_partisanship_stats].
pub const DEFAULT_SEED: u64 = 1213;

const MAX_ITERATIONS: usize = 300;

// **** The voting matrix ****

/// Dense indicator matrix of shape `(V, 4 * B)` for `V` voters and `B`
/// roll calls.
///
/// Row `i` describes the voter `row_to_voter[i]`. Columns
/// `[4b, 4b + 4)` are the (yea, nay, not-voting, present) indicator cells
/// of the roll call whose block starts at `vote_to_col_block[vote_id]`.
/// At most one cell of a block is set per row; a row with four zero cells
/// in a block means the voter has no recorded position for that roll call.
///
/// The index tables are built together in one pass and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct VotingMatrix {
    data: Array2<f64>,
    row_to_voter: Vec<VoterId>,
    voter_to_row: HashMap<VoterId, usize>,
    vote_to_col_block: HashMap<String, usize>,
}

impl VotingMatrix {
    /// Builds the matrix from the roll calls and the set of all voter ids.
    ///
    /// `voter_ids` is expected to cover every id referenced by the votes.
    /// An id outside the set does not fail the build: the entry is dropped
    /// with a warning and the corresponding cell stays zero.
    pub fn build(votes: &BTreeMap<String, RollCall>, voter_ids: &BTreeSet<VoterId>) -> VotingMatrix {
        let row_to_voter: Vec<VoterId> = voter_ids.iter().copied().collect();
        let voter_to_row: HashMap<VoterId, usize> = row_to_voter
            .iter()
            .enumerate()
            .map(|(row, &voter_id)| (voter_id, row))
            .collect();

        let mut vote_to_col_block: HashMap<String, usize> = HashMap::new();
        let mut data = Array2::<f64>::zeros((row_to_voter.len(), 4 * votes.len()));
        for (block, (vote_id, roll_call)) in votes.iter().enumerate() {
            let start_col = 4 * block;
            vote_to_col_block.insert(vote_id.clone(), start_col);
            for (offset, voters) in roll_call.categories().iter().enumerate() {
                for voter_id in voters.iter() {
                    match voter_to_row.get(voter_id) {
                        Some(&row) => data[[row, start_col + offset]] = 1.0,
                        None => warn!(
                            "Vote {}: voter id {} is not part of the voter id set, dropping entry",
                            vote_id, voter_id
                        ),
                    }
                }
            }
        }
        debug!(
            "VotingMatrix::build: {} voters x {} roll calls",
            row_to_voter.len(),
            votes.len()
        );
        VotingMatrix {
            data,
            row_to_voter,
            voter_to_row,
            vote_to_col_block,
        }
    }

    pub fn from_record(record: &VotingRecord) -> VotingMatrix {
        VotingMatrix::build(&record.votes, &record.voter_ids)
    }

    pub fn num_voters(&self) -> usize {
        self.data.nrows()
    }

    pub fn num_votes(&self) -> usize {
        self.data.ncols() / 4
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// The voter id of every row, in row order.
    pub fn row_to_voter(&self) -> &[VoterId] {
        &self.row_to_voter
    }

    pub fn row_of_voter(&self, voter_id: VoterId) -> Option<usize> {
        self.voter_to_row.get(&voter_id).copied()
    }

    /// The first column of the 4-cell block of a roll call.
    pub fn col_block_of_vote(&self, vote_id: &str) -> Option<usize> {
        self.vote_to_col_block.get(vote_id).copied()
    }
}

// **** Clustering ****

/// Partitions the matrix rows into `num_clusters` behavioral clusters and
/// returns one label in `[0, num_clusters)` per row.
///
/// This is Lloyd's algorithm with a farthest-first initialization: the
/// starting row is derived from the seed and every further center is the
/// row farthest from the centers chosen so far. The whole procedure is a
/// pure function of (matrix, num_clusters, seed), so results are exactly
/// reproducible.
///
/// Fails with [ClusteringError::InvalidParameter] when `num_clusters` is
/// zero or exceeds the number of rows. A local optimum is acceptable, as
/// with any k-means variant.
pub fn cluster_rows(
    matrix: &VotingMatrix,
    num_clusters: usize,
    seed: u64,
) -> Result<Vec<usize>, ClusteringError> {
    let num_voters = matrix.num_voters();
    if num_clusters == 0 || num_clusters > num_voters {
        return Err(ClusteringError::InvalidParameter {
            num_clusters,
            num_voters,
        });
    }
    if num_clusters == 1 {
        return Ok(vec![0; num_voters]);
    }

    let data = matrix.data();
    let mut centers = initial_centers(data, num_clusters, seed);
    let mut labels = vec![0usize; num_voters];
    for iteration in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (row_idx, row) in data.rows().into_iter().enumerate() {
            let label = nearest_center(&centers, row);
            if labels[row_idx] != label {
                labels[row_idx] = label;
                changed = true;
            }
        }
        if !changed && iteration > 0 {
            debug!("cluster_rows: converged after {} iterations", iteration);
            break;
        }

        // Recompute each center as the mean of its rows. A cluster that
        // lost all its rows keeps its previous center.
        let mut sums = Array2::<f64>::zeros((num_clusters, data.ncols()));
        let mut counts = vec![0usize; num_clusters];
        for (row_idx, row) in data.rows().into_iter().enumerate() {
            let mut sum = sums.row_mut(labels[row_idx]);
            sum += &row;
            counts[labels[row_idx]] += 1;
        }
        for cluster in 0..num_clusters {
            if counts[cluster] > 0 {
                centers
                    .row_mut(cluster)
                    .assign(&(&sums.row(cluster) / counts[cluster] as f64));
            }
        }
    }
    Ok(labels)
}

/// Farthest-first center selection (the Gonzalez heuristic). The seed picks
/// the starting row; ties go to the lowest row index not already chosen.
fn initial_centers(data: &Array2<f64>, num_clusters: usize, seed: u64) -> Array2<f64> {
    let num_rows = data.nrows();
    let first = (seed % num_rows as u64) as usize;
    let mut chosen: Vec<usize> = vec![first];
    let mut min_dist: Vec<f64> = data
        .rows()
        .into_iter()
        .map(|row| squared_distance(row, data.row(first)))
        .collect();

    while chosen.len() < num_clusters {
        let mut best: Option<(usize, f64)> = None;
        for (row_idx, &dist) in min_dist.iter().enumerate() {
            if chosen.contains(&row_idx) {
                continue;
            }
            match best {
                Some((_, best_dist)) if dist <= best_dist => {}
                _ => best = Some((row_idx, dist)),
            }
        }
        // num_clusters <= num_rows, so a free row always exists.
        let (next, _) = best.unwrap();
        chosen.push(next);
        for (row_idx, row) in data.rows().into_iter().enumerate() {
            let dist = squared_distance(row, data.row(next));
            if dist < min_dist[row_idx] {
                min_dist[row_idx] = dist;
            }
        }
    }

    let mut centers = Array2::<f64>::zeros((num_clusters, data.ncols()));
    for (cluster, &row_idx) in chosen.iter().enumerate() {
        centers.row_mut(cluster).assign(&data.row(row_idx));
    }
    centers
}

/// Ties go to the lowest center index.
fn nearest_center(centers: &Array2<f64>, row: ArrayView1<f64>) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (cluster, center) in centers.rows().into_iter().enumerate() {
        let dist = squared_distance(center, row);
        if dist < best_dist {
            best_dist = dist;
            best = cluster;
        }
    }
    best
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

// **** Scoring ****

/// Joins the cluster assignment with the member metadata and tallies the
/// party composition of every cluster.
///
/// A row whose voter id has no metadata entry is skipped with a warning:
/// the voter was clustered on its voting behavior, it just cannot
/// contribute to the party tallies. Clusters with zero resolved members
/// are omitted from the output.
pub fn cluster_party_stats(
    assignments: &[usize],
    row_to_voter: &[VoterId],
    members: &HashMap<VoterId, Member>,
) -> Vec<ClusterStats> {
    let num_clusters = assignments.iter().max().map_or(0, |&label| label + 1);
    let mut tallies: Vec<HashMap<String, usize>> = vec![HashMap::new(); num_clusters];
    for (row_idx, &cluster) in assignments.iter().enumerate() {
        let voter_id = row_to_voter[row_idx];
        match members.get(&voter_id) {
            Some(member) => {
                *tallies[cluster].entry(member.party.clone()).or_insert(0) += 1;
            }
            None => warn!(
                "Voter id {} encountered in voting record but representative not found",
                voter_id
            ),
        }
    }

    let mut res: Vec<ClusterStats> = Vec::new();
    for (cluster, tally) in tallies.iter().enumerate() {
        let resolved_members: usize = tally.values().sum();
        if resolved_members == 0 {
            continue;
        }
        let mut party_tally: Vec<(String, usize)> = tally
            .iter()
            .map(|(party, &count)| (party.clone(), count))
            .collect();
        party_tally.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let purity = party_tally[0].1 as f64 / resolved_members as f64;
        res.push(ClusterStats {
            cluster,
            resolved_members,
            party_tally,
            purity,
        });
    }
    res
}

/// Computes the partisanship score of a cluster assignment: the unweighted
/// mean of the per-cluster purities over the clusters with at least one
/// resolved member.
///
/// Fails with [ClusteringError::EmptyClustering] when no voter of any
/// cluster resolved to a metadata entry.
pub fn partisanship_score(
    assignments: &[usize],
    row_to_voter: &[VoterId],
    members: &HashMap<VoterId, Member>,
) -> Result<f64, ClusteringError> {
    mean_purity(&cluster_party_stats(assignments, row_to_voter, members))
}

fn mean_purity(clusters: &[ClusterStats]) -> Result<f64, ClusteringError> {
    if clusters.is_empty() {
        return Err(ClusteringError::EmptyClustering);
    }
    Ok(clusters.iter().map(|c| c.purity).sum::<f64>() / clusters.len() as f64)
}

/// Runs the full core pipeline for one dataset: matrix construction,
/// clustering with [DEFAULT_SEED], metadata join and scoring.
pub fn run_partisanship_stats(
    record: &VotingRecord,
    members: &HashMap<VoterId, Member>,
    num_clusters: usize,
) -> Result<PartisanshipResult, ClusteringError> {
    info!(
        "Processing {} roll calls for {} voters, k = {}",
        record.votes.len(),
        record.voter_ids.len(),
        num_clusters
    );
    let matrix = VotingMatrix::from_record(record);
    let assignments = cluster_rows(&matrix, num_clusters, DEFAULT_SEED)?;
    let clusters = cluster_party_stats(&assignments, matrix.row_to_voter(), members);
    let score = mean_purity(&clusters)?;
    debug!(
        "run_partisanship_stats: score {} over {} non-empty clusters",
        score,
        clusters.len()
    );
    Ok(PartisanshipResult {
        score,
        assignments,
        clusters,
    })
}
