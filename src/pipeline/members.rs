// Reader for the legislator metadata files.
//
// The files are plain CSV with one header row and fixed column positions.
// The govtrack id lives in a late column and is the join key with the
// roll-call records.

use log::{info, warn};

use std::collections::HashMap;

use chrono::NaiveDate;

use vote_clustering::{Member, VoterId};

use crate::pipeline::*;

const COL_LAST_NAME: usize = 0;
const COL_FIRST_NAME: usize = 1;
const COL_BIRTHDAY: usize = 2;
const COL_GENDER: usize = 3;
const COL_STATE: usize = 4;
const COL_DISTRICT: usize = 5;
const COL_PARTY: usize = 6;
const COL_GOVTRACK_ID: usize = 22;

/// Reads and merges all the metadata files into a single map keyed by
/// voter id. Later files take precedence on id collisions, so the current
/// snapshot should be listed after the historic one.
pub fn read_member_files(paths: &[String]) -> PipelineResult<HashMap<VoterId, Member>> {
    let mut members: HashMap<VoterId, Member> = HashMap::new();
    for path in paths.iter() {
        let before = members.len();
        read_member_file(path, &mut members)?;
        info!(
            "Read {}: {} new member records",
            path,
            members.len() - before
        );
    }
    Ok(members)
}

fn read_member_file(path: &str, members: &mut HashMap<VoterId, Member>) -> PipelineResult<()> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    for (idx, line_r) in rdr.records().enumerate() {
        // The header row was consumed already.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineSnafu { path })?;
        let voter_id = match line.get(COL_GOVTRACK_ID).and_then(|s| s.parse::<u32>().ok()) {
            Some(voter_id) => voter_id,
            None => {
                warn!(
                    "{}: line {}: missing or invalid legislator id, skipping row",
                    path, lineno
                );
                continue;
            }
        };
        let field = |col: usize| line.get(col).unwrap_or("").to_string();
        let member = Member {
            id: voter_id,
            first_name: field(COL_FIRST_NAME),
            last_name: field(COL_LAST_NAME),
            party: field(COL_PARTY),
            state: field(COL_STATE),
            district: line.get(COL_DISTRICT).and_then(|s| s.parse::<u32>().ok()),
            gender: field(COL_GENDER),
            birthday: line
                .get(COL_BIRTHDAY)
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()),
        };
        members.insert(voter_id, member);
    }
    Ok(())
}
