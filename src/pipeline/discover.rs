// Dataset discovery.
//
// A congress directory is laid out like votes/<year>/<h12|s12>/data.xml,
// where the leaf directory names the chamber and the roll number. A root
// directory holding several congresses has one subdirectory per congress,
// named by the congress number.

use log::debug;

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::pipeline::*;

/// A root directory holds a single congress when it directly contains the
/// votes marker directory.
pub fn is_single_dataset(root: &Path) -> bool {
    root.join("votes").is_dir()
}

/// Collects every vote file of one congress for the given chamber, sorted
/// by path so the assembly order is reproducible.
pub fn collect_vote_files(root: &Path, chamber: Chamber) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.extension().map_or(false, |ext| ext == "xml") {
            continue;
        }
        let leaf = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str());
        match leaf {
            Some(leaf) if leaf.starts_with(chamber.prefix()) => paths.push(path.to_path_buf()),
            _ => debug!("collect_vote_files: skipping {}", path.display()),
        }
    }
    paths.sort();
    paths
}

/// Lists the numbered congress directories under the root, in ascending
/// numeric order. Subdirectories that are not plain integers are ignored.
pub fn congress_dirs(root: &Path) -> PipelineResult<Vec<(u32, PathBuf)>> {
    let root_s = root.display().to_string();
    let mut res: Vec<(u32, PathBuf)> = Vec::new();
    let entries = fs::read_dir(root).context(OpeningFileSnafu {
        path: root_s.clone(),
    })?;
    for entry in entries {
        let entry = entry.context(OpeningFileSnafu {
            path: root_s.clone(),
        })?;
        if !entry.path().is_dir() {
            continue;
        }
        match entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) {
            Some(congress) => res.push((congress, entry.path())),
            None => debug!(
                "congress_dirs: ignoring non-numeric directory {}",
                entry.path().display()
            ),
        }
    }
    res.sort_by_key(|(congress, _)| *congress);
    Ok(res)
}
