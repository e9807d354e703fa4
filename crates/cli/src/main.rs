use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use class_matcher::{
    classifiers_command, hash_input_command, init_logging, inspect_command, match_command,
    plugins_command, MatchOptions,
};

/// Structural matcher for obfuscated JVM class files across two builds.
///
/// The CLI is a thin wrapper around `matcher-core`; all matching logic
/// lives in the library.
#[derive(Parser, Debug)]
#[command(name = "class-matcher", version, about = "Match classes, methods and fields across two builds", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Match side A against side B and print a summary.
    Match {
        /// Side A inputs (jar, class file or JSON records). Repeatable.
        #[arg(long = "a", value_name = "PATH")]
        a: Vec<PathBuf>,

        /// Side B inputs. Repeatable.
        #[arg(long = "b", value_name = "PATH")]
        b: Vec<PathBuf>,

        /// Inputs available to both sides (libraries). Repeatable.
        #[arg(long, value_name = "PATH")]
        shared: Vec<PathBuf>,

        /// Input sets file with hashed descriptors (JSON or YAML).
        #[arg(long)]
        inputs: Option<PathBuf>,

        /// Extra directory to search for described inputs. Repeatable.
        #[arg(long = "input-dir", value_name = "DIR")]
        input_dirs: Vec<PathBuf>,

        /// Matcher configuration file (JSON or YAML).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Plugin to load: a built-in name or a manifest path. Repeatable.
        #[arg(long = "plugin", visible_alias = "additional-plugins", value_name = "PLUGIN")]
        plugins: Vec<String>,

        /// Directory under which downloads are cached for the run.
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Maximum time per download, in seconds.
        #[arg(long)]
        max_time: Option<u64>,

        /// Write the full report as JSON to this path.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Print the report as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Load inputs as one side and show the resulting structure.
    Inspect {
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// List classifiers and their effective weights.
    Classifiers {
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long = "plugin", value_name = "PLUGIN")]
        plugins: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Show built-in plugins and try loading the given ones.
    Plugins {
        #[arg(long = "plugin", value_name = "PLUGIN")]
        plugins: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Print input descriptors (name, size, hash) for files.
    HashInput {
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,

        /// Hash algorithm: sha256 or sha1.
        #[arg(long, default_value = "sha256")]
        algorithm: String,

        /// Download URL to record in the descriptors.
        #[arg(long)]
        url: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Match {
            a,
            b,
            shared,
            inputs,
            input_dirs,
            config,
            plugins,
            cache_dir,
            max_time,
            report,
            json,
        } => {
            let options = MatchOptions {
                a,
                b,
                shared,
                inputs,
                input_dirs,
                config,
                plugins,
                cache_dir,
                max_time,
                report,
                json,
            };
            match_command(&options)?;
        }
        Command::Inspect { paths, json } => {
            inspect_command(&paths, json)?;
        }
        Command::Classifiers { config, plugins, json } => {
            classifiers_command(config.as_deref(), &plugins, json)?;
        }
        Command::Plugins { plugins, json } => {
            plugins_command(&plugins, json)?;
        }
        Command::HashInput { paths, algorithm, url } => {
            hash_input_command(&paths, &algorithm, url)?;
        }
    }

    Ok(())
}
