use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::model::{AssemblyOptions, SampleLabeling, ZoneTieBreak};

#[derive(Parser, Debug)]
#[command(name = "plexos-solution")]
#[command(version, about = "Rebuild PLEXOS solution archives and export them to SQLite")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Knobs for the derivation steps
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct AssemblyArgs {
    /// Pick a generator's zone by the smallest numeric region id instead of
    /// the lexicographically smallest one
    #[arg(long)]
    pub numeric_zone_tie_break: bool,

    /// Map sample codes only when they exactly match a known code
    #[arg(long)]
    pub exact_sample_labels: bool,
}

impl AssemblyArgs {
    pub fn options(&self) -> AssemblyOptions {
        AssemblyOptions {
            zone_tie_break: if self.numeric_zone_tie_break {
                ZoneTieBreak::Numeric
            } else {
                ZoneTieBreak::Lexicographic
            },
            sample_labels: if self.exact_sample_labels {
                SampleLabeling::Exact
            } else {
                SampleLabeling::Substring
            },
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a solution archive to a SQLite database
    Convert {
        /// Solution zip archive
        archive: PathBuf,

        /// Output SQLite database path
        output_db: PathBuf,

        /// Only include these tables (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        include: Option<Vec<String>>,

        /// Exclude these tables (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        exclude: Option<Vec<String>>,

        /// Show a full-screen progress display
        #[arg(long)]
        tui: bool,

        #[command(flatten)]
        assembly: AssemblyArgs,
    },

    /// List the tables a solution archive yields
    ListTables {
        /// Solution zip archive
        archive: PathBuf,

        #[command(flatten)]
        assembly: AssemblyArgs,
    },

    /// Build the model and report skipped steps and warnings
    Check {
        /// Solution zip archive
        archive: PathBuf,

        #[command(flatten)]
        assembly: AssemblyArgs,
    },

    /// Print the rows of one table as JSON lines
    Dump {
        /// Solution zip archive
        archive: PathBuf,

        /// Table name as shown by list-tables
        table: String,

        /// Stop after this many rows
        #[arg(short, long)]
        limit: Option<usize>,

        #[command(flatten)]
        assembly: AssemblyArgs,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_flags() {
        let cli = Cli::parse_from([
            "plexos-solution",
            "-vv",
            "convert",
            "model.zip",
            "out.db",
            "--include",
            "key,phase_4",
            "--numeric-zone-tie-break",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Convert {
                include, assembly, ..
            } => {
                assert_eq!(include, Some(vec!["key".to_string(), "phase_4".to_string()]));
                let options = assembly.options();
                assert_eq!(options.zone_tie_break, ZoneTieBreak::Numeric);
                assert_eq!(options.sample_labels, SampleLabeling::Substring);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_dump_limit() {
        let cli = Cli::parse_from(["plexos-solution", "dump", "model.zip", "key", "--limit", "3"]);
        match cli.command {
            Commands::Dump { table, limit, .. } => {
                assert_eq!(table, "key");
                assert_eq!(limit, Some(3));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
