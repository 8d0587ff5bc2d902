//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--repo <path>` / `-r`: Repository to operate on (`QYT_REPO_PATH`)
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output
//!
//! # Precedence
//!
//! Options that can also be configured resolve as: flag, then environment
//! variable, then repository config, then global config, then built-in
//! default. The flag and environment layers are handled by clap here; the
//! config layers by [`crate::core::config::Config`].

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::core::pattern::FilterSyntax;
use crate::query::OutputFormat;

/// qyt - Query and transform YAML files across git branches
#[derive(Parser, Debug)]
#[command(name = "qyt")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the git repository (any directory inside it works)
    #[arg(short = 'r', long = "repo", global = true, env = "QYT_REPO_PATH")]
    pub repo: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Branch and file selection shared by query and apply.
#[derive(Args, Debug, Clone, Default)]
pub struct Selection {
    /// Regular expression matched against short branch names
    #[arg(short = 'b', long = "branches", env = "QYT_BRANCH_FILTER")]
    pub branch_filter: Option<String>,

    /// Pattern matched against file paths relative to the repository root
    #[arg(short = 'f', long = "files", env = "QYT_FILE_NAME_FILTER")]
    pub file_filter: Option<String>,

    /// How to interpret the file pattern
    #[arg(long = "syntax", value_enum)]
    pub file_filter_syntax: Option<SyntaxArg>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a query on every matching file of every matching branch
    #[command(
        name = "query",
        long_about = "Run a yq expression on every matching file of every matching branch.\n\n\
            Files are read straight from the object database; nothing is checked out \
            and nothing is written. Results are printed in branch order, files depth-first.",
        after_help = "\
EXAMPLES:
    # Print the name field of every YAML file on every branch
    qyt query '.name'

    # Only release branches, only files under deploy/
    qyt query '.image.tag' -b '^rel/' -f '^deploy/'

    # Same selection with a glob
    qyt query '.image.tag' -f 'deploy/**/*.yaml' --syntax glob

    # Show which branch and file each result came from
    qyt query '{\"branch\": $branch, \"file\": $filename, \"tag\": .image.tag}' --json"
    )]
    Query {
        /// The yq expression
        query: String,

        /// File pattern (same as --files)
        #[arg(value_name = "FILE_FILTER")]
        file_pattern: Option<String>,

        #[command(flatten)]
        selection: Selection,

        /// Output format
        #[arg(short = 'o', long = "output", value_enum, conflicts_with = "json")]
        output: Option<FormatArg>,

        /// Shorthand for --output json
        #[arg(long)]
        json: bool,

        /// Interleave progress comments into the output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Commit the results of a query to new branches
    #[command(
        name = "apply",
        long_about = "Run a yq expression on every matching file and commit the changed files.\n\n\
            For each matching branch with at least one changed file, a commit is created on \
            top of the branch and registered as <prefix><branch>. Source branches are never \
            moved. Every branch is evaluated and every destination checked before anything \
            is written, so a failure leaves the repository untouched.",
        after_help = "\
EXAMPLES:
    # Bump a version on every release branch, creating qyt/rel/...
    qyt apply '.version = \"2.0\"' -b '^rel/'

    # Choose the destination prefix and message
    qyt apply '.replicas = 3' -p 'scale/' -m 'scale {{.Branch}}'

    # Move existing destination branches
    qyt apply '.replicas = 3' --allow-override"
    )]
    Apply {
        /// The yq expression
        query: String,

        /// File pattern (same as --files)
        #[arg(value_name = "FILE_FILTER")]
        file_pattern: Option<String>,

        #[command(flatten)]
        selection: Selection,

        /// Prefix for created branches
        #[arg(short = 'p', long = "prefix", env = "QYT_NEW_BRANCH_PREFIX")]
        prefix: Option<String>,

        /// Commit message template ({{.Branch}}, {{.Query}})
        #[arg(short = 'm', long = "message", env = "QYT_COMMIT_TEMPLATE")]
        message: Option<String>,

        /// Allow moving destination branches that already exist
        #[arg(short = 'c', long = "allow-override")]
        allow_override: bool,
    },

    /// List branches matching a pattern
    #[command(name = "branches")]
    Branches {
        /// Regular expression matched against short branch names
        #[arg(env = "QYT_BRANCH_FILTER")]
        pattern: Option<String>,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
EXAMPLES:
    # Bash
    qyt completion bash > ~/.local/share/bash-completion/completions/qyt

    # Zsh
    qyt completion zsh > \"${fpath[1]}/_qyt\"

    # Fish
    qyt completion fish > ~/.config/fish/completions/qyt.fish

    # PowerShell
    qyt completion powershell >> $PROFILE"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Output format flag values.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    Yaml,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Yaml => OutputFormat::Yaml,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

/// File pattern syntax flag values.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxArg {
    Regex,
    Glob,
}

impl From<SyntaxArg> for FilterSyntax {
    fn from(arg: SyntaxArg) -> Self {
        match arg {
            SyntaxArg::Regex => FilterSyntax::Regex,
            SyntaxArg::Glob => FilterSyntax::Glob,
        }
    }
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("qyt").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn query_with_positional_file_filter() {
        let cli = parse(&["query", ".name", "^conf/", "-b", "main", "--json"]);
        let Command::Query {
            query,
            file_pattern,
            selection,
            json,
            ..
        } = cli.command
        else {
            panic!("expected query");
        };
        assert_eq!(query, ".name");
        assert_eq!(file_pattern.as_deref(), Some("^conf/"));
        assert_eq!(selection.branch_filter.as_deref(), Some("main"));
        assert!(json);
    }

    #[test]
    fn apply_flags() {
        let cli = parse(&[
            "-r", "/tmp/repo", "apply", ".a = 1", "-p", "out-", "-m", "msg", "-c", "--syntax",
            "glob",
        ]);
        assert_eq!(cli.repo, Some(PathBuf::from("/tmp/repo")));
        let Command::Apply {
            prefix,
            message,
            allow_override,
            selection,
            ..
        } = cli.command
        else {
            panic!("expected apply");
        };
        assert_eq!(prefix.as_deref(), Some("out-"));
        assert_eq!(message.as_deref(), Some("msg"));
        assert!(allow_override);
        assert_eq!(selection.file_filter_syntax, Some(SyntaxArg::Glob));
    }

    #[test]
    fn output_conflicts_with_json() {
        assert!(Cli::try_parse_from(["qyt", "query", ".", "-o", "yaml", "--json"]).is_err());
    }

    #[test]
    fn query_is_required() {
        assert!(Cli::try_parse_from(["qyt", "apply"]).is_err());
    }
}
