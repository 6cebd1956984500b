//! CLI module - Command-line interface definitions and handlers

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use log::warn;
use std::path::PathBuf;

use crate::core::config::Config;
use crate::core::render::{OutputFormat, RenderConfig};
use crate::core::session::Session;
use crate::markers::rewrite::EditReason;
use crate::store::api::BodySource;
use crate::summary::api::SummaryFormat;

/// codemeta - link in-code comment markers to stored annotation fragments.
#[derive(Parser, Debug)]
#[command(name = "codemeta")]
#[command(
    author,
    version,
    about,
    long_about = r#"codemeta links short comment markers in source files to annotation
fragments stored under the workspace's cms folder.

A marker is a comment opener followed by the keyword `codemeta` and a bound ID:

    // codemeta[42]      # codemeta[42]      <!-- codemeta[42] -->

The legacy forms `//cm 5664210353` and `#cm 5664210353` are still read.

Each command prints a ResultSet in the selected format (default: jsonl).

Output formats:
- jsonl: one JSON object per line (best for editor integrations and tools)
- json: a single JSON array
- md: human-friendly Markdown
- raw: excerpts only

Examples:
    codemeta markers src/main.rs
    codemeta bind src/main.rs --line 12
    codemeta refs 42
    codemeta summary --toml
    codemeta upgrade --dry-run
"#
)]
pub struct Cli {
    /// Workspace root.
    #[arg(
        long,
        global = true,
        default_value = ".",
        value_name = "ROOT",
        long_help = "Workspace root (defaults to the current directory).\n\n\
The cms folder, codemeta.toml and every reported path are relative to this root.\n\
FILE arguments are interpreted relative to it unless absolute."
    )]
    pub root: PathBuf,

    /// Output format (jsonl/json/md/raw).
    #[arg(
        long,
        global = true,
        default_value = "jsonl",
        value_name = "FORMAT",
        long_help = "Select the output format for ResultSet.\n\n\
Supported values:\n\
- jsonl (default)\n\
- json\n\
- md (markdown)\n\
- raw"
    )]
    pub format: String,

    /// Pretty-print JSON/JSONL output with indentation.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Override the cms folder name from codemeta.toml.
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        env = "CODEMETA_CMS_FOLDER",
        long_help = "Folder under ROOT that holds fragments and allocator state.\n\n\
Defaults to the `cms_folder` key of codemeta.toml, or `.cms`."
    )]
    pub cms_folder: Option<String>,

    /// Use this set instead of the remembered active set.
    #[arg(
        long,
        global = true,
        value_name = "NAME",
        long_help = "Use NAME as the active set for this invocation only.\n\n\
The remembered active set (see `codemeta set switch`) is left unchanged."
    )]
    pub set: Option<String>,

    /// Quiet mode (errors only on stderr).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Verbose mode (debug diagnostics on stderr).
    #[arg(
        short,
        long,
        global = true,
        long_help = "Enable debug diagnostics on stderr. RUST_LOG, when set, takes precedence."
    )]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the markers of one file with their fragment previews.
    #[command(
        long_about = "Emit one marker result per marker line of FILE: the marker span, its\n\
bound ID, the fragment category, inline and hover previews, and the configured\n\
category style.\n\n\
This is the feed an editor uses to draw decorations.\n\n\
Example:\n\
  codemeta markers src/main.rs\n"
    )]
    Markers {
        /// File to inspect (relative to ROOT unless absolute).
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Bind the marker on a line to a new fragment, or open its fragment.
    #[command(
        long_about = "Rewrite the unbound marker on --line to its canonical bound form with a\n\
fresh sequential ID and create the fragment in the active set.\n\n\
If the marker already carries an ID, nothing is rewritten and its fragment is\n\
located (or created when missing). Lines without a marker produce no output.\n\n\
Example:\n\
  codemeta bind src/main.rs --line 12\n"
    )]
    Bind {
        /// File containing the marker.
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// 1-based line number.
        #[arg(long, value_name = "N")]
        line: usize,
    },

    /// Type text into a file and react like the editor integration would.
    #[command(
        long_about = "Insert TEXT at --line/--column (both 1-based, column in characters) and\n\
deliver the change to the edit-observation path.\n\n\
Typing a single space or underscore right after an unbound marker binds it.\n\
Changes flagged with --undo or --redo never bind anything.\n\n\
Example:\n\
  codemeta type notes.py --line 3 --column 5 --text ' '\n"
    )]
    Type {
        /// File to edit.
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// 1-based line number.
        #[arg(long, value_name = "N")]
        line: usize,

        /// 1-based character column where TEXT is inserted.
        #[arg(long, value_name = "C")]
        column: usize,

        /// Inserted text.
        #[arg(long, value_name = "TEXT", allow_hyphen_values = true)]
        text: String,

        /// Mark the change as an undo.
        #[arg(long, conflicts_with = "redo")]
        undo: bool,

        /// Mark the change as a redo.
        #[arg(long)]
        redo: bool,
    },

    /// Replay a stream of typed edits from stdin against a file.
    #[command(
        long_about = "Read one JSON object per stdin line and apply each as a typed edit to FILE:\n\n\
  {\"line\": 3, \"column\": 12, \"text\": \" \", \"reason\": \"typing\"}\n\n\
line and column are 1-based (column in characters); reason is typing (default),\n\
undo or redo. Markers bound along the way are reported as they happen, and the\n\
file's decorations are re-emitted once per burst of edits (150ms refresh delay).\n\
The file is written once, at the end of the stream.\n\n\
Example:\n\
  printf '%s\\n' '{\"line\":1,\"column\":11,\"text\":\" \"}' | codemeta feed notes.py\n"
    )]
    Feed {
        /// File to edit.
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Create, locate, show or write fragments.
    Fragment {
        #[command(subcommand)]
        action: FragmentCommands,
    },

    /// List the fragments of the active set.
    #[command(
        long_about = "List the fragments of the active set in numeric ID order, with category,\n\
title (first body line) and cached reference count."
    )]
    List,

    /// Find the occurrences of a fragment ID.
    #[command(
        long_about = "Report every (file, line) where a marker is bound to ID.\n\n\
By default the whole workspace is scanned (confidence: high). With --cached only\n\
the files named in the fragment's refs block are rescanned (confidence: low).\n\n\
Examples:\n\
  codemeta refs 42\n\
  codemeta refs 42 --cached\n"
    )]
    Refs {
        #[arg(value_name = "ID")]
        id: String,

        /// Resolve from the cached refs block instead of a full scan.
        #[arg(long)]
        cached: bool,
    },

    /// Rewrite a fragment's refs block from a full scan.
    RefsSync {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Merge one (path, count) observation into a fragment's refs block.
    #[command(
        long_about = "Update the cached reference count of PATH in the fragment's refs block.\n\n\
A positive COUNT sets the entry; zero or a negative COUNT removes it.\n\n\
Example:\n\
  codemeta refs-update 42 src/a.ts 3\n"
    )]
    RefsUpdate {
        #[arg(value_name = "ID")]
        id: String,

        /// Workspace-relative path.
        #[arg(value_name = "PATH")]
        path: String,

        #[arg(value_name = "COUNT", allow_negative_numbers = true)]
        count: i64,
    },

    /// Manage fragment sets.
    Set {
        #[command(subcommand)]
        action: SetCommands,
    },

    /// Mint identifiers.
    Id {
        #[command(subcommand)]
        action: IdCommands,
    },

    /// Render a summary of the active set.
    #[command(
        long_about = "Collect every fragment of the active set with its occurrences (full scan)\n\
and render SUMMARY.md, or SUMMARY.toml with --toml, into the set directory.\n\n\
The rendered document is also emitted as a summary result item.\n\n\
Examples:\n\
  codemeta summary\n\
  codemeta summary --toml --no-write --format raw\n"
    )]
    Summary(SummaryArgs),

    /// Rewrite legacy markers to the canonical form.
    #[command(
        long_about = "Rewrite bound legacy markers across the workspace:\n\
  //cm 5664210353 note   ->   //codemeta[5664210353] note\n\n\
Text after the marker is kept verbatim. Unbound `cm` tokens are left alone.\n\n\
Example:\n\
  codemeta upgrade --dry-run\n"
    )]
    Upgrade {
        /// Report the edits without writing files.
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Args, Debug)]
pub struct SummaryArgs {
    /// Render TOML instead of Markdown.
    #[arg(long)]
    pub toml: bool,

    /// Print only; do not write the summary file.
    #[arg(long)]
    pub no_write: bool,
}

#[derive(Subcommand, Debug)]
pub enum FragmentCommands {
    /// Return the fragment for ID, creating it in the active set if absent.
    Ensure {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Resolve ID to its fragment file in any set.
    Locate {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Print a fragment's header fields and body.
    Show {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Replace a fragment's body, keeping its header.
    Write {
        #[arg(value_name = "ID")]
        id: String,

        /// New body text.
        #[arg(long, value_name = "TEXT", conflicts_with = "stdin", allow_hyphen_values = true)]
        body: Option<String>,

        /// Read the new body from stdin.
        #[arg(long)]
        stdin: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum SetCommands {
    /// List sets, active first.
    List,

    /// Print the active set.
    Current,

    /// Create a set and make it active.
    #[command(
        long_about = "Create NAME under the cms folder and make it the active set.\n\n\
Whitespace runs become '-'; empty names and names with slashes are rejected.\n\n\
Example:\n\
  codemeta set new \"sprint 12\"\n"
    )]
    New {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Make an existing set active.
    Switch {
        #[arg(value_name = "NAME")]
        name: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum IdCommands {
    /// Allocate the next sequential ID.
    Next,

    /// Generate a legacy fixed-length random ID.
    #[command(
        long_about = "Generate a random digit string that is not used by any fragment.\n\n\
New markers always get sequential IDs; this exists for tooling and migration."
    )]
    Random {
        /// ID length, clamped to 6..=32 (default: id_length from codemeta.toml).
        #[arg(long, value_name = "N")]
        length: Option<usize>,
    },
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    let format: OutputFormat = cli.format.parse().unwrap_or_default();
    let render_config = RenderConfig::with_pretty(format, cli.pretty);

    let root = match cli.root.canonicalize() {
        Ok(root) => Some(root),
        Err(e) => {
            warn!("workspace root {} is unavailable: {}", cli.root.display(), e);
            None
        }
    };

    let mut config = match &root {
        Some(root) => Config::load_from_root(root)?,
        None => Config::default(),
    };
    if let Some(folder) = &cli.cms_folder {
        config = config.with_cms_folder(folder);
    }
    let mut session = Session::open(root, config, cli.set.as_deref())?;

    match cli.command {
        Commands::Markers { file } => crate::markers::api::run_markers(&session, &file, render_config),

        Commands::Bind { file, line } => {
            crate::markers::api::run_bind(&session, &file, line, render_config)
        }

        Commands::Type {
            file,
            line,
            column,
            text,
            undo,
            redo,
        } => {
            let reason = if undo {
                EditReason::Undo
            } else if redo {
                EditReason::Redo
            } else {
                EditReason::Typing
            };
            crate::markers::api::run_type(&session, &file, line, column, &text, reason, render_config)
        }

        Commands::Feed { file } => crate::markers::api::run_feed(&session, &file, render_config),

        Commands::Fragment { action } => match action {
            FragmentCommands::Ensure { id } => crate::store::api::run_ensure(&session, &id, render_config),
            FragmentCommands::Locate { id } => crate::store::api::run_locate(&session, &id, render_config),
            FragmentCommands::Show { id } => crate::store::api::run_show(&session, &id, render_config),
            FragmentCommands::Write { id, body, stdin } => {
                let source = match (body, stdin) {
                    (Some(text), _) => BodySource::Text(text),
                    (None, true) => BodySource::Stdin,
                    (None, false) => bail!("Provide the fragment body with --body or --stdin"),
                };
                crate::store::api::run_write(&session, &id, source, render_config)
            }
        },

        Commands::List => crate::store::api::run_list(&session, render_config),

        Commands::Refs { id, cached } => crate::index::api::run_refs(&session, &id, cached, render_config),

        Commands::RefsSync { id } => crate::index::api::run_sync(&session, &id, render_config),

        Commands::RefsUpdate { id, path, count } => {
            crate::index::api::run_update(&session, &id, &path, count, render_config)
        }

        Commands::Set { action } => match action {
            SetCommands::List => crate::store::api::run_set_list(&session, render_config),
            SetCommands::Current => crate::store::api::run_set_current(&session, render_config),
            SetCommands::New { name } => {
                crate::store::api::run_set_switch(&mut session, &name, false, render_config)
            }
            SetCommands::Switch { name } => {
                crate::store::api::run_set_switch(&mut session, &name, true, render_config)
            }
        },

        Commands::Id { action } => match action {
            IdCommands::Next => crate::ids::api::run_next(&session, render_config),
            IdCommands::Random { length } => crate::ids::api::run_random(&session, length, render_config),
        },

        Commands::Summary(args) => {
            let format = if args.toml {
                SummaryFormat::Toml
            } else {
                SummaryFormat::Markdown
            };
            crate::summary::api::run_summary(&session, format, !args.no_write, render_config)
        }

        Commands::Upgrade { dry_run } => crate::markers::api::run_upgrade(&session, dry_run, render_config),
    }
}
