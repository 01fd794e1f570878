use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Serialize;

use vote_clustering::{run_partisanship_stats, Member, VoterId, VotingRecord};

use crate::args::Args;

pub mod discover;
pub mod members;
pub mod vote_xml;

#[derive(Debug, Snafu)]
pub enum PipelineError {
    #[snafu(display("Error accessing file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Malformed vote file {path}: {reason}"))]
    MalformedVoteFile { path: String, reason: String },
    #[snafu(display("Error parsing vote file {path}"))]
    XmlParse {
        source: quick_xml::Error,
        path: String,
    },
    #[snafu(display("Error opening metadata file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading a row of metadata file {path}"))]
    CsvLine { source: csv::Error, path: String },
    #[snafu(display("{name} is not a valid chamber name. Use either \"house\" or \"senate\""))]
    InvalidChamber { name: String },
    #[snafu(display("Error writing report {path}"))]
    WritingReport { source: csv::Error, path: String },
    #[snafu(display("Clustering failed: {source}"))]
    Clustering {
        source: vote_clustering::ClusteringError,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// The chamber being analyzed. The two chambers are always processed
/// independently.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Chamber {
    House,
    Senate,
}

impl Chamber {
    pub fn from_name(name: &str) -> PipelineResult<Chamber> {
        match name.to_ascii_lowercase().as_str() {
            "house" => Ok(Chamber::House),
            "senate" => Ok(Chamber::Senate),
            _ => InvalidChamberSnafu { name }.fail(),
        }
    }

    /// The first character of the leaf directories holding this chamber's
    /// vote files (h1, h2, ... for the house, s1, s2, ... for the senate).
    pub fn prefix(&self) -> char {
        match self {
            Chamber::House => 'h',
            Chamber::Senate => 's',
        }
    }
}

/// One row of the batch report.
#[derive(Debug, Clone, Serialize)]
struct ReportRow {
    congress: u32,
    partisanship: f64,
}

/// Entry point of the binary: analyzes either a single congress or every
/// congress found under the data directory.
pub fn run_analysis(args: &Args) -> PipelineResult<()> {
    let chamber = Chamber::from_name(&args.chamber)?;
    let root = Path::new(&args.datadir);

    let member_paths: Vec<String> = if args.members.is_empty() {
        default_member_paths(root)
    } else {
        args.members.clone()
    };
    let members = members::read_member_files(&member_paths)?;
    info!("Loaded metadata for {} members", members.len());

    if discover::is_single_dataset(root) {
        let score = run_dataset(root, chamber, &members, args.num_clusters)?;
        println!("{}", score);
        let congress = dataset_id(root).unwrap_or(0);
        let rows = [ReportRow {
            congress,
            partisanship: score,
        }];
        write_report(&args.outputfile, &rows)
    } else {
        run_batch(root, chamber, &members, args.num_clusters, &args.outputfile)
    }
}

/// Default legislator metadata files, relative to the data directory.
///
/// The historic snapshot comes first so that the current one wins when the
/// same id appears in both (later files take precedence on read).
fn default_member_paths(root: &Path) -> Vec<String> {
    ["legislators-historic.csv", "legislators-current.csv"]
        .iter()
        .map(|f| root.join(f).display().to_string())
        .collect()
}

/// Runs the core pipeline for the vote files of one congress.
fn run_dataset(
    dir: &Path,
    chamber: Chamber,
    members: &HashMap<VoterId, Member>,
    num_clusters: usize,
) -> PipelineResult<f64> {
    let record = parse_votes(dir, chamber)?;
    if record.is_empty() {
        whatever!(
            "No vote files found under {} for the requested chamber",
            dir.display()
        );
    }
    let res = run_partisanship_stats(&record, members, num_clusters).context(ClusteringSnafu {})?;
    for cluster in res.clusters.iter() {
        debug!(
            "Cluster {}: {} members, purity {:.3}, parties {:?}",
            cluster.cluster, cluster.resolved_members, cluster.purity, cluster.party_tally
        );
    }
    for line in cluster_member_lines(&record, &res.assignments, members) {
        debug!("{}", line);
    }
    Ok(res.score)
}

/// One line per resolved voter, naming the cluster it landed in. Rows are
/// assigned labels in ascending voter id order.
fn cluster_member_lines(
    record: &VotingRecord,
    assignments: &[usize],
    members: &HashMap<VoterId, Member>,
) -> Vec<String> {
    record
        .voter_ids
        .iter()
        .zip(assignments.iter())
        .filter_map(|(voter_id, cluster)| {
            members.get(voter_id).map(|m| {
                format!(
                    "Cluster {}: {} {} ({}, {})",
                    cluster, m.first_name, m.last_name, m.party, m.state
                )
            })
        })
        .collect()
}

/// Assembles the voting record of one congress from all its vote files for
/// the given chamber.
pub fn parse_votes(dir: &Path, chamber: Chamber) -> PipelineResult<VotingRecord> {
    let paths = discover::collect_vote_files(dir, chamber);
    info!("Found {} vote files under {}", paths.len(), dir.display());
    let mut record = VotingRecord::new();
    for path in paths.iter() {
        let p = path.display().to_string();
        let contents = fs::read_to_string(path).context(OpeningFileSnafu { path: p.clone() })?;
        let (vote_id, roll_call) = vote_xml::parse_roll_call(&contents, &p)?;
        record.insert(vote_id, roll_call);
    }
    Ok(record)
}

/// Analyzes every numbered congress directory under the root, ordered by
/// ascending congress number.
///
/// A congress that fails to parse or score is skipped with a warning and
/// its row is omitted from the report; the rest of the batch still runs.
fn run_batch(
    root: &Path,
    chamber: Chamber,
    members: &HashMap<VoterId, Member>,
    num_clusters: usize,
    outputfile: &str,
) -> PipelineResult<()> {
    let datasets = discover::congress_dirs(root)?;
    if datasets.is_empty() {
        whatever!(
            "{} contains neither a votes directory nor numbered congress directories",
            root.display()
        );
    }

    let mut rows: Vec<ReportRow> = Vec::new();
    for (congress, dir) in datasets {
        info!("Clustering congress {}", congress);
        match run_dataset(&dir, chamber, members, num_clusters) {
            Ok(score) => rows.push(ReportRow {
                congress,
                partisanship: score,
            }),
            Err(e) => warn!("Skipping congress {}: {}", congress, e),
        }
    }
    write_report(outputfile, &rows)
}

fn write_report(path: &str, rows: &[ReportRow]) -> PipelineResult<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .context(WritingReportSnafu { path })?;
    for row in rows {
        wtr.serialize(row).context(WritingReportSnafu { path })?;
    }
    wtr.flush().context(OpeningFileSnafu { path })?;
    info!("Wrote {} report rows to {}", rows.len(), path);
    Ok(())
}

fn dataset_id(root: &Path) -> Option<u32> {
    root.file_name()?.to_str()?.parse::<u32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use vote_clustering::RollCall;

    fn write_vote_file(dir: &Path, contents: &str) {
        fs::create_dir_all(dir).unwrap();
        let mut f = fs::File::create(dir.join("data.xml")).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    fn roll_xml(chamber: &str, session: u32, roll: u32, votes: &[(u32, &str)]) -> String {
        let mut s = format!(
            "<roll where=\"{}\" session=\"{}\" roll=\"{}\">\n",
            chamber, session, roll
        );
        for (id, code) in votes {
            s.push_str(&format!("  <voter id=\"{}\" vote=\"{}\"/>\n", id, code));
        }
        s.push_str("</roll>\n");
        s
    }

    // 23 columns, id in the last position.
    fn member_row(last: &str, first: &str, party: &str, id: u32) -> String {
        let filler: Vec<&str> = vec![""; 15];
        format!(
            "{},{},1950-01-01,M,CA,1,{},{},{}\n",
            last,
            first,
            party,
            filler.join(","),
            id
        )
    }

    fn write_members_file(path: &Path) {
        let mut f = fs::File::create(path).unwrap();
        let header: Vec<&str> = vec!["x"; 23];
        writeln!(f, "{}", header.join(",")).unwrap();
        f.write_all(member_row("Adams", "Alice", "Democrat", 1).as_bytes())
            .unwrap();
        f.write_all(member_row("Baker", "Beth", "Democrat", 2).as_bytes())
            .unwrap();
        f.write_all(member_row("Clark", "Carl", "Republican", 3).as_bytes())
            .unwrap();
    }

    /// Lays out two congresses with a divergent and a unanimous voting
    /// pattern, plus senate files that must be filtered out.
    fn write_tree(root: &Path) {
        let c101 = root.join("101").join("votes").join("1990");
        write_vote_file(
            &c101.join("h1"),
            &roll_xml("house", 101, 1, &[(1, "+"), (2, "+"), (3, "-")]),
        );
        write_vote_file(
            &c101.join("h2"),
            &roll_xml("house", 101, 2, &[(1, "+"), (2, "-"), (3, "-")]),
        );
        write_vote_file(
            &c101.join("s1"),
            &roll_xml("senate", 101, 1, &[(1, "+"), (2, "-"), (3, "-")]),
        );

        let c102 = root.join("102").join("votes").join("1992");
        write_vote_file(
            &c102.join("h1"),
            &roll_xml("house", 102, 1, &[(1, "+"), (2, "+"), (3, "+")]),
        );
        write_vote_file(
            &c102.join("h2"),
            &roll_xml("house", 102, 2, &[(1, "-"), (2, "-"), (3, "-")]),
        );

        write_members_file(&root.join("legislators-current.csv"));
    }

    #[test]
    fn chamber_names_are_validated() {
        assert_eq!(Chamber::from_name("house").unwrap(), Chamber::House);
        assert_eq!(Chamber::from_name("SENATE").unwrap(), Chamber::Senate);
        let err = Chamber::from_name("parliament").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidChamber { .. }));
    }

    #[test]
    fn parse_votes_filters_by_chamber() {
        let tmp = tempfile::tempdir().unwrap();
        write_tree(tmp.path());
        let c101 = tmp.path().join("101");

        let house = parse_votes(&c101, Chamber::House).unwrap();
        assert_eq!(house.votes.len(), 2);
        assert!(house.votes.contains_key("h-101.1"));
        assert!(house.votes.contains_key("h-101.2"));

        let senate = parse_votes(&c101, Chamber::Senate).unwrap();
        assert_eq!(senate.votes.len(), 1);
        assert!(senate.votes.contains_key("s-101.1"));
    }

    #[test]
    fn batch_report_is_ordered_by_congress() {
        let tmp = tempfile::tempdir().unwrap();
        write_tree(tmp.path());
        let members = members::read_member_files(&[tmp
            .path()
            .join("legislators-current.csv")
            .display()
            .to_string()])
        .unwrap();

        let out = tmp.path().join("report.csv");
        run_batch(
            tmp.path(),
            Chamber::House,
            &members,
            2,
            &out.display().to_string(),
        )
        .unwrap();

        let report = fs::read_to_string(&out).unwrap();
        let rows: Vec<&str> = report.lines().collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("101,"), "unexpected row {:?}", rows[0]);
        assert!(rows[1].starts_with("102,"), "unexpected row {:?}", rows[1]);
        // Congress 102 voted unanimously: a single occupied cluster of two
        // Democrats and one Republican.
        let score_102: f64 = rows[1].split(',').nth(1).unwrap().parse().unwrap();
        assert!((score_102 - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn default_member_files_prefer_the_current_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let header: Vec<&str> = vec!["x"; 23];
        let mut historic =
            fs::File::create(tmp.path().join("legislators-historic.csv")).unwrap();
        writeln!(historic, "{}", header.join(",")).unwrap();
        historic
            .write_all(member_row("Adams", "Alice", "Whig", 1).as_bytes())
            .unwrap();
        let mut current = fs::File::create(tmp.path().join("legislators-current.csv")).unwrap();
        writeln!(current, "{}", header.join(",")).unwrap();
        current
            .write_all(member_row("Adams", "Alice", "Republican", 1).as_bytes())
            .unwrap();

        // Same id in both snapshots: the current one must win.
        let members = members::read_member_files(&default_member_paths(tmp.path())).unwrap();
        assert_eq!(members[&1].party, "Republican");
    }

    #[test]
    fn member_lines_follow_voter_id_order() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("members.csv");
        write_members_file(&path);
        let members = members::read_member_files(&[path.display().to_string()]).unwrap();

        let mut record = VotingRecord::new();
        record.insert(
            "h-101.1".to_string(),
            RollCall {
                yeas: vec![1, 2],
                nays: vec![3, 4],
                ..Default::default()
            },
        );

        // Voter 4 has no metadata row and is left out of the listing.
        let lines = cluster_member_lines(&record, &[0, 0, 1, 1], &members);
        assert_eq!(
            lines,
            vec![
                "Cluster 0: Alice Adams (Democrat, CA)",
                "Cluster 0: Beth Baker (Democrat, CA)",
                "Cluster 1: Carl Clark (Republican, CA)",
            ]
        );
    }

    #[test]
    fn single_dataset_mode_is_detected() {
        let tmp = tempfile::tempdir().unwrap();
        write_tree(tmp.path());
        assert!(!discover::is_single_dataset(tmp.path()));
        assert!(discover::is_single_dataset(&tmp.path().join("101")));
    }

    #[test]
    fn batch_continues_past_a_failing_congress() {
        let tmp = tempfile::tempdir().unwrap();
        write_tree(tmp.path());
        // An empty congress directory cannot be scored and must be skipped.
        fs::create_dir_all(tmp.path().join("100")).unwrap();

        let members = members::read_member_files(&[tmp
            .path()
            .join("legislators-current.csv")
            .display()
            .to_string()])
        .unwrap();
        let out = tmp.path().join("report.csv");
        run_batch(
            tmp.path(),
            Chamber::House,
            &members,
            2,
            &out.display().to_string(),
        )
        .unwrap();

        let report = fs::read_to_string(&out).unwrap();
        assert_eq!(report.lines().count(), 2);
    }
}
