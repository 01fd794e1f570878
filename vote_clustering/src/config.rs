// ********* Input data structures ***********

use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::Display;

use chrono::NaiveDate;

/// The stable integer identifier of a legislator, shared between the
/// roll-call records and the metadata files.
pub type VoterId = u32;

/// One roll-call event: the four disjoint lists of voter ids.
///
/// A voter id appears in at most one of the four lists. A voter missing
/// from all four lists simply has no recorded position for this roll call
/// (typically because the seat was not filled yet).
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct RollCall {
    pub yeas: Vec<VoterId>,
    pub nays: Vec<VoterId>,
    pub not_voting: Vec<VoterId>,
    pub present: Vec<VoterId>,
}

impl RollCall {
    /// The four lists in matrix column-block order.
    pub(crate) fn categories(&self) -> [&Vec<VoterId>; 4] {
        [&self.yeas, &self.nays, &self.not_voting, &self.present]
    }
}

/// The full voting record of one dataset (one chamber over one period):
/// all roll calls keyed by vote id, plus the set of every voter id seen
/// in any of them.
///
/// Ordered collections are used so that row and column assignment in the
/// derived matrix is reproducible.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct VotingRecord {
    pub votes: BTreeMap<String, RollCall>,
    pub voter_ids: BTreeSet<VoterId>,
}

impl VotingRecord {
    pub fn new() -> VotingRecord {
        VotingRecord::default()
    }

    /// Adds one roll call and accumulates its voter ids.
    pub fn insert(&mut self, vote_id: String, roll_call: RollCall) {
        for list in roll_call.categories() {
            self.voter_ids.extend(list.iter().copied());
        }
        self.votes.insert(vote_id, roll_call);
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }
}

/// Legislator metadata, keyed by [VoterId] in the metadata map.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Member {
    pub id: VoterId,
    pub first_name: String,
    pub last_name: String,
    /// Free-text party code, e.g. "Democrat", "Republican", "Independent".
    pub party: String,
    pub state: String,
    pub district: Option<u32>,
    pub gender: String,
    pub birthday: Option<NaiveDate>,
}

// ******** Output data structures *********

/// Party composition of one cluster after the metadata join.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterStats {
    pub cluster: usize,
    /// The number of members of the cluster that resolved to a metadata entry.
    pub resolved_members: usize,
    /// Party name and member count, largest first.
    pub party_tally: Vec<(String, usize)>,
    /// Fraction of resolved members belonging to the largest party.
    pub purity: f64,
}

/// The outcome of clustering and scoring one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct PartisanshipResult {
    /// Unweighted mean of cluster purities over the non-empty clusters,
    /// in [0, 1]. Higher means more party-homogeneous clusters.
    pub score: f64,
    /// One cluster label per matrix row.
    pub assignments: Vec<usize>,
    /// Statistics for the clusters with at least one resolved member.
    pub clusters: Vec<ClusterStats>,
}

/// Errors that prevent the clustering pipeline from completing.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ClusteringError {
    /// The requested cluster count is zero or exceeds the number of voters.
    InvalidParameter {
        num_clusters: usize,
        num_voters: usize,
    },
    /// No cluster contains a single voter with a metadata entry, so there
    /// is nothing to average.
    EmptyClustering,
}

impl Error for ClusteringError {}

impl Display for ClusteringError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusteringError::InvalidParameter {
                num_clusters,
                num_voters,
            } => write!(
                f,
                "invalid cluster count {} for {} voters (must be in [1, {}])",
                num_clusters, num_voters, num_voters
            ),
            ClusteringError::EmptyClustering => {
                write!(f, "no cluster with a resolved member, cannot compute a score")
            }
        }
    }
}
