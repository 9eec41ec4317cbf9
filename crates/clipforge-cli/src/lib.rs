//! ClipForge CLI — run and inspect video-creation workflows from a terminal.
//!
//! Reuses the same core domain logic (clipforge-core) and server bootstrap
//! (clipforge-server) as the HTTP API.

pub mod commands;

use clap::{Parser, Subcommand};

/// ClipForge CLI — multi-agent video creation
#[derive(Parser, Debug)]
#[command(name = "clipforge", version, about = "ClipForge CLI — multi-agent video creation")]
pub struct Cli {
    /// Path to the SQLite database file
    #[arg(long, env = "CLIPFORGE_DB_PATH", default_value = "clipforge.db")]
    pub db: String,

    /// Path to the YAML config file (providers, agents, social accounts)
    #[arg(long, env = "CLIPFORGE_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the ClipForge HTTP backend server
    Server {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(long, default_value_t = 3210)]
        port: u16,
    },

    /// Run a workflow to completion and print the result
    Create {
        /// Creative prompt for the video
        #[arg(long, short = 'p')]
        prompt: String,
        /// Execution mode: sequential, parallel or hybrid
        #[arg(long)]
        mode: Option<String>,
        /// Target platform (repeatable): tiktok, instagram, youtube
        #[arg(long = "platform", required = true)]
        platforms: Vec<String>,
        /// Task parameter as key=value (repeatable); values parse as JSON when possible
        #[arg(long = "param")]
        params: Vec<String>,
    },

    /// Show the stage layout for a request without calling any agent
    Plan {
        /// Creative prompt for the video
        #[arg(long, short = 'p')]
        prompt: String,
        /// Execution mode: sequential, parallel or hybrid
        #[arg(long)]
        mode: Option<String>,
        /// Target platform (repeatable)
        #[arg(long = "platform", required = true)]
        platforms: Vec<String>,
    },

    /// List registered agents with their dispatch policy and run stats
    Agents,

    /// Inspect stored workflows
    Workflow {
        #[command(subcommand)]
        action: WorkflowAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum WorkflowAction {
    /// Show a workflow result by ID
    Get {
        /// Workflow ID
        #[arg(long)]
        id: String,
    },
    /// List recent workflows, newest first
    List {
        /// Maximum number of rows
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Delete a stored workflow
    Delete {
        /// Workflow ID
        #[arg(long)]
        id: String,
    },
}
