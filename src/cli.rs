use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args, Parser, Subcommand};

fn cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightGreen.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::BrightMagenta.on_default())
}

#[derive(Debug, Parser)]
#[command(name = "tasksync")]
#[command(bin_name = "tasksync")]
#[command(version)]
#[command(about = "A local-first task list that syncs to a shared remote store")]
#[command(styles = cli_styles())]
pub struct Cli {
    #[arg(
        short = 'c',
        long,
        env = "TASKSYNC_CONFIG",
        default_value = ".tasksync/config.toml",
        help = "Path to an optional TOML config file."
    )]
    pub config: PathBuf,

    #[arg(
        short = 'd',
        long,
        env = "TASKSYNC_DB_PATH",
        help = "Path to the local SQLite task store."
    )]
    pub db: Option<String>,

    #[arg(
        short = 'r',
        long,
        env = "TASKSYNC_REMOTE_PATH",
        help = "Path to the shared remote SQLite database."
    )]
    pub remote: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Create a task locally and push it in the background.")]
    Add(AddArgs),
    #[command(about = "List local tasks, newest first.")]
    Ls(ListArgs),
    #[command(about = "Show one task by id.")]
    Show(ShowArgs),
    #[command(about = "Edit a task's title and/or description.")]
    Edit(EditArgs),
    #[command(about = "Mark a task completed.")]
    Done(IdArgs),
    #[command(about = "Delete a task locally and remotely.")]
    Rm(IdArgs),
    #[command(about = "Replace local tasks with the signed-in user's remote tasks.")]
    Refresh(JsonArgs),
    #[command(about = "Sign in, clear local tasks, and pull this user's tasks.")]
    Login(CredentialArgs),
    #[command(about = "Create a remote account.")]
    Register(CredentialArgs),
    #[command(about = "Sign out of the remote store.")]
    Logout,
    #[command(about = "Print the signed-in user, if any.")]
    Whoami(JsonArgs),
}

#[derive(Debug, Args)]
pub struct AddArgs {
    #[arg(help = "Task title.")]
    pub title: String,

    #[arg(short = 'd', long = "desc", help = "Optional description text.")]
    pub desc: Option<String>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long, help = "Emit JSON output.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    #[arg(help = "Task id.")]
    pub id: String,

    #[arg(long, help = "Emit JSON output.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    #[arg(help = "Task id.")]
    pub id: String,

    #[arg(short = 't', long, help = "New title.")]
    pub title: Option<String>,

    #[arg(short = 'd', long = "desc", help = "New description (empty clears it).")]
    pub desc: Option<String>,
}

#[derive(Debug, Args)]
pub struct IdArgs {
    #[arg(help = "Task id.")]
    pub id: String,
}

#[derive(Debug, Args)]
pub struct JsonArgs {
    #[arg(long, help = "Emit JSON output.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct CredentialArgs {
    #[arg(help = "Account email.")]
    pub email: String,

    #[arg(help = "Account password.", env = "TASKSYNC_PASSWORD", hide_env_values = true)]
    pub password: String,
}
