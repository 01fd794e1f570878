use clap::Parser;

/// Clusters congressional voting records and scores how partisan each
/// congress was.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Chamber of Congress, either "house" or "senate" (case-insensitive).
    #[clap(short, long, value_parser)]
    pub chamber: String,

    /// Data directory with the voting records. It either holds a single
    /// congress (marked by a "votes" subdirectory) or one numbered
    /// subdirectory per congress.
    #[clap(short, long, value_parser)]
    pub datadir: String,

    /// File in which to save the CSV report of (congress, score) rows.
    #[clap(short, long, value_parser)]
    pub outputfile: String,

    /// Number of clusters into which to place each congress.
    #[clap(short = 'k', long, value_parser)]
    pub num_clusters: usize,

    /// (file paths, repeatable) Legislator metadata files. Later files take
    /// precedence on id collisions. When not specified, the
    /// legislators-historic.csv and legislators-current.csv files of the
    /// data directory are used, in that order.
    #[clap(short, long, value_parser)]
    pub members: Vec<String>,

    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
