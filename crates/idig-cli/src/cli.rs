use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "idig-server",
    about = "Synchronization server for the iDig field archaeology app",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the iDig server
    Start(StartArgs),
    /// Create a new project
    Create(ProjectArgs),
    /// Add a user to a project (or update their password)
    Adduser(UserPasswordArgs),
    /// Delete a user from a project
    Deluser(UserArgs),
    /// List all users in a project
    Listusers(ProjectArgs),
}

#[derive(Args)]
pub struct StartArgs {
    /// Root directory holding the projects
    #[arg(short = 'r', long, default_value = ".")]
    pub root: String,
    /// Port to listen on
    #[arg(short = 'p', long, default_value = "9000")]
    pub port: u16,
    /// Address to listen on
    #[arg(short = 'A', long, default_value = "0.0.0.0")]
    pub addr: String,
}

#[derive(Args)]
pub struct ProjectArgs {
    pub project: String,
    #[arg(short = 'r', long, default_value = ".")]
    pub root: String,
}

#[derive(Args)]
pub struct UserArgs {
    pub project: String,
    pub user: String,
    #[arg(short = 'r', long, default_value = ".")]
    pub root: String,
}

#[derive(Args)]
pub struct UserPasswordArgs {
    pub project: String,
    pub user: String,
    pub password: String,
    #[arg(short = 'r', long, default_value = ".")]
    pub root: String,
}
