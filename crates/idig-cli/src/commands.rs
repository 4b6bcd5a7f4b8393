use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

use idig_server::{IdigServer, ServerConfig};

use crate::cli::{Cli, Command, ProjectArgs, StartArgs, UserArgs, UserPasswordArgs};

const USERS_FILE: &str = "users.txt";
const USERS_HEADER: &str = "# Lines starting with # are ignored\n\
                            # Format is:\n\
                            #   USER:PASSWORD[:TRENCH,TRENCH,...]\n";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Start(args) => start(args),
        Command::Create(args) => create(args),
        Command::Adduser(args) => add_user(args),
        Command::Deluser(args) => del_user(args),
        Command::Listusers(args) => list_users(args),
    }
}

fn start(args: StartArgs) -> anyhow::Result<()> {
    let root_dir = PathBuf::from(&args.root);
    warn_about_empty_projects(&root_dir)?;

    let bind_addr: SocketAddr = format!("{}:{}", args.addr, args.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", args.addr, args.port))?;
    let server = IdigServer::new(ServerConfig {
        bind_addr,
        root_dir,
    });

    println!("iDig can connect to this server at: http://{bind_addr}");
    tokio::runtime::Runtime::new()?.block_on(server.serve())?;
    Ok(())
}

/// Point out projects that cannot be synced to yet.
fn warn_about_empty_projects(root: &Path) -> anyhow::Result<()> {
    let entries =
        fs::read_dir(root).with_context(|| format!("failed to read root directory {root:?}"))?;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let users_file = entry.path().join(USERS_FILE);
        if !users_file.is_file() {
            continue;
        }
        let project = entry.file_name().to_string_lossy().to_string();
        let text = fs::read_to_string(&users_file)
            .with_context(|| format!("failed to read users file for project '{project}'"))?;
        let has_users = text
            .lines()
            .any(|line| !line.starts_with('#') && line.contains(':'));
        if !has_users {
            eprintln!("Warning: Project '{project}' does not have any users defined.");
            eprintln!("Add a new user with: idig-server adduser {project} <USER> <PASSWORD>");
        }
    }
    Ok(())
}

fn create(args: ProjectArgs) -> anyhow::Result<()> {
    let project_dir = Path::new(&args.root).join(&args.project);
    let users_file = project_dir.join(USERS_FILE);
    if users_file.is_file() {
        bail!("project '{}' already exists", args.project);
    }
    fs::create_dir_all(&project_dir)?;
    fs::write(&users_file, USERS_HEADER)
        .with_context(|| format!("error creating project '{}'", args.project))?;
    Ok(())
}

fn add_user(args: UserPasswordArgs) -> anyhow::Result<()> {
    let project_dir = Path::new(&args.root).join(&args.project);
    fs::create_dir_all(&project_dir)?;
    let users_file = project_dir.join(USERS_FILE);
    if !users_file.is_file() {
        fs::write(&users_file, USERS_HEADER).context("error creating users file")?;
    }

    let text = fs::read_to_string(&users_file).context("error reading users file")?;
    let mut out = Vec::new();
    let mut exists = false;
    for line in text.lines() {
        if line.starts_with('#') {
            out.push(line.to_string());
            continue;
        }
        let (user, rest) = line.split_once(':').unwrap_or((line, ""));
        if user == args.user {
            exists = true;
            let password = rest.split(':').next().unwrap_or("");
            if password == args.password {
                bail!("user '{}' already exists with this password", args.user);
            }
            // Preserve the access list, replace the password.
            let access = rest.split_once(':').map(|(_, access)| access);
            match access {
                Some(access) => out.push(format!("{}:{}:{access}", args.user, args.password)),
                None => out.push(format!("{}:{}", args.user, args.password)),
            }
        } else {
            out.push(line.to_string());
        }
    }
    if !exists {
        out.push(format!("{}:{}", args.user, args.password));
    }

    fs::write(&users_file, out.join("\n") + "\n").context("failed to write users file")?;
    if exists {
        println!("Updated password of user '{}'", args.user);
    } else {
        println!("Added user '{}'", args.user);
    }
    Ok(())
}

fn del_user(args: UserArgs) -> anyhow::Result<()> {
    let users_file = Path::new(&args.root).join(&args.project).join(USERS_FILE);
    let text = fs::read_to_string(&users_file).context("error reading users file")?;

    let mut out = Vec::new();
    let mut exists = false;
    for line in text.lines() {
        if line.starts_with('#') {
            out.push(line.to_string());
            continue;
        }
        let user = line.split(':').next().unwrap_or(line);
        if user == args.user {
            exists = true;
        } else {
            out.push(line.to_string());
        }
    }
    if !exists {
        bail!("user '{}' does not exist", args.user);
    }

    fs::write(&users_file, out.join("\n") + "\n").context("failed to write users file")?;
    Ok(())
}

fn list_users(args: ProjectArgs) -> anyhow::Result<()> {
    let users_file = Path::new(&args.root).join(&args.project).join(USERS_FILE);
    let text = fs::read_to_string(&users_file).context("error reading users file")?;
    for line in text.lines() {
        if line.starts_with('#') || !line.contains(':') {
            continue;
        }
        let mut fields = line.splitn(3, ':');
        let user = fields.next().unwrap_or("");
        let _password = fields.next().unwrap_or("");
        let access = fields.next().unwrap_or("*");
        println!("{user:<12} {access}");
    }
    Ok(())
}
