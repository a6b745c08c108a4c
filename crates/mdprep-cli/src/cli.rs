use clap::Parser;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "mdprep - A command-line pipeline for preparing and running molecular dynamics of protein structures, from raw structure to analyzed production trajectory.",
    help_template = HELP_TEMPLATE,
)]
pub struct Cli {
    /// Input structure: a local file path or a tagged archive identifier
    /// (e.g. 'pdb:1ABC').
    #[arg(short, long, required = true, value_name = "PATH_OR_ID")]
    pub input: String,

    /// Path for the final converted structure file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Path to the pipeline configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Extent of the pipeline to execute: repair, minimization,
    /// thermal-equilibration, pressure-equilibration, or full-production.
    /// Unrecognized or absent values run the full pipeline.
    #[arg(short, long, value_name = "EXTENT")]
    pub extent: Option<String>,

    /// Point mutations to apply to the input structure,
    /// e.g. 'A:V45W,B:T87A' or 'A|B:V45W'.
    #[arg(short, long, value_name = "LIST")]
    pub mutations: Option<String>,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Vec<&'static str> {
        vec![
            "mdprep",
            "-i",
            "pdb:1ABC",
            "-o",
            "final.pdb",
            "-c",
            "pipeline.toml",
        ]
    }

    #[test]
    fn minimal_invocation_parses() {
        let cli = Cli::parse_from(base_args());
        assert_eq!(cli.input, "pdb:1ABC");
        assert_eq!(cli.output, PathBuf::from("final.pdb"));
        assert_eq!(cli.config, PathBuf::from("pipeline.toml"));
        assert!(cli.extent.is_none());
        assert!(cli.mutations.is_none());
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
    }

    #[test]
    fn extent_and_mutations_are_plain_strings() {
        let mut args = base_args();
        args.extend_from_slice(&["-e", "minimization", "-m", "A:V45W"]);
        let cli = Cli::parse_from(args);
        assert_eq!(cli.extent.as_deref(), Some("minimization"));
        assert_eq!(cli.mutations.as_deref(), Some("A:V45W"));
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        let mut args = base_args();
        args.extend_from_slice(&["-v", "-q"]);
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn missing_required_arguments_fail() {
        assert!(Cli::try_parse_from(["mdprep", "-i", "in.pdb"]).is_err());
    }
}
