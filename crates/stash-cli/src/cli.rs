use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "stash")]
#[command(about = "Keep text snippets offline and sync them when signed in")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the client config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Never contact the remote store, even when signed in
    #[arg(long, global = true)]
    pub offline: bool,

    /// Quick capture: stash "my snippet here"
    #[arg(trailing_var_arg = true)]
    pub snippet: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new snippet
    #[command(alias = "new")]
    Add {
        /// Snippet body
        body: Vec<String>,
        /// Tag to attach (repeatable)
        #[arg(short, long = "tag", value_name = "TAG")]
        tags: Vec<String>,
        /// Folder id to file the snippet under
        #[arg(long, value_name = "ID")]
        folder: Option<String>,
    },
    /// List snippets
    List {
        /// Number of snippets to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Case-insensitive text filter
        #[arg(short, long)]
        query: Option<String>,
        /// Filter snippets by tag name
        #[arg(long)]
        tag: Option<String>,
        /// Filter snippets by folder id
        #[arg(long, value_name = "ID")]
        folder: Option<String>,
        /// Sort key
        #[arg(long, value_enum, default_value_t = SortKey::Updated)]
        sort: SortKey,
        /// Oldest or alphabetically first entries first
        #[arg(long)]
        asc: bool,
        /// Continue a previous listing from its printed cursor
        #[arg(long)]
        cursor: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one snippet
    Show {
        /// Snippet ID or unique ID prefix
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an existing snippet in $EDITOR
    Edit {
        /// Snippet ID or unique ID prefix
        id: String,
        /// Replace the tag set (repeatable)
        #[arg(short, long = "tag", value_name = "TAG")]
        tags: Option<Vec<String>>,
        /// Move into this folder id
        #[arg(long, value_name = "ID", conflicts_with = "no_folder")]
        folder: Option<String>,
        /// Remove the snippet from its folder
        #[arg(long)]
        no_folder: bool,
    },
    /// Delete an existing snippet
    Delete {
        /// Snippet ID or unique ID prefix
        id: String,
    },
    /// Manage folders
    Folder {
        #[command(subcommand)]
        command: FolderCommands,
    },
    /// Push pending local changes to the remote store
    Sync {
        /// Output the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export snippets
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Import snippets from a JSON export document
    Import {
        /// Path to the export document
        path: PathBuf,
    },
    /// Show sync mode, account, and pending changes
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the stored session
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: clap_complete::Shell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Markdown,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SortKey {
    Updated,
    Created,
    Title,
}

#[derive(Subcommand)]
pub enum FolderCommands {
    /// Create a folder
    Add {
        /// Folder name
        name: String,
        /// Parent folder id
        #[arg(long, value_name = "ID")]
        parent: Option<String>,
        /// Display color
        #[arg(long)]
        color: Option<String>,
        /// Display icon
        #[arg(long)]
        icon: Option<String>,
        /// Sibling ordering position
        #[arg(long, default_value = "0")]
        position: i64,
    },
    /// List folders
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rename or move a folder
    Edit {
        /// Folder ID or unique ID prefix
        id: String,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New parent folder id
        #[arg(long, value_name = "ID", conflicts_with = "root")]
        parent: Option<String>,
        /// Move to the top level
        #[arg(long)]
        root: bool,
        /// New sibling ordering position
        #[arg(long)]
        position: Option<i64>,
    },
    /// Delete a folder; its snippets and subfolders move to the top level
    Delete {
        /// Folder ID or unique ID prefix
        id: String,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Store a session issued by the Stash account service in the keychain
    Login {
        /// Account user id
        #[arg(long, value_name = "ID")]
        user_id: String,
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: Option<String>,
        /// Access token (falls back to STASH_ACCESS_TOKEN)
        #[arg(long, value_name = "TOKEN")]
        access_token: Option<String>,
        /// Refresh token
        #[arg(long, value_name = "TOKEN", default_value = "")]
        refresh_token: String,
        /// Seconds until the access token expires
        #[arg(long, default_value = "3600")]
        expires_in: i64,
    },
    /// Show whether a session is stored
    Status,
    /// Clear the stored session
    Logout,
}
