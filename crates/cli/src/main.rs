//! Operator CLI for TagFS.

mod client;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use client::Client;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tagfs_core::{Endpoints, idlist};

#[derive(Parser, Debug)]
#[command(name = "tagfsctl")]
#[command(version, about = "Operator CLI for TagFS")]
#[command(group(ArgGroup::new("command").required(true).args([
    "init", "shutdown", "tag", "untag", "nest", "unnest", "stats",
    "create_tag", "delete_tag", "get_tags", "search_tags",
])))]
struct Cli {
    /// Launch the daemon, mounting at MOUNT_POINT with files stored under
    /// ROOT_DIRECTORY
    #[arg(long, num_args = 2, value_names = ["MOUNT_POINT", "ROOT_DIRECTORY"])]
    init: Option<Vec<PathBuf>>,

    /// Unmount the filesystem and shut the daemon down
    #[arg(long)]
    shutdown: bool,

    /// Tag the file at PATH (not in tag view) with TAG, creating the tag if
    /// needed; a folder PATH tags every file directly inside it
    #[arg(long, num_args = 2, value_names = ["PATH", "TAG"])]
    tag: Option<Vec<String>>,

    /// Untag the file at PATH (not in tag view) from TAG; a folder PATH
    /// untags every file directly inside it
    #[arg(long, num_args = 2, value_names = ["PATH", "TAG"])]
    untag: Option<Vec<String>>,

    /// Nest TAG under PARENT_TAG
    #[arg(long, num_args = 2, value_names = ["TAG", "PARENT_TAG"])]
    nest: Option<Vec<String>>,

    /// Unnest TAG from PARENT_TAG
    #[arg(long, num_args = 2, value_names = ["TAG", "PARENT_TAG"])]
    unnest: Option<Vec<String>>,

    /// Display file and tag counts
    #[arg(long)]
    stats: bool,

    /// Create a tag with no children
    #[arg(long = "create-tag", value_name = "TAG")]
    create_tag: Option<String>,

    /// Delete a tag if it has no children or tagged files
    #[arg(long = "delete-tag", value_name = "TAG")]
    delete_tag: Option<String>,

    /// Display every tag on the file at PATH
    #[arg(long = "get-tags", value_name = "PATH")]
    get_tags: Option<String>,

    /// Search for files tagged with any of the tags, or all of them with
    /// --strict
    #[arg(long = "search-tags", num_args = 1.., value_name = "TAG")]
    search_tags: Option<Vec<String>>,

    /// Restrict --search-tags to files carrying every listed tag
    #[arg(long)]
    strict: bool,

    /// Daemon option: log to ROOT_DIRECTORY/metadata/log.txt
    #[arg(long)]
    log: bool,

    /// Daemon option: mount read-only, browsing tags instead of folders
    #[arg(long = "tag-view")]
    tag_view: bool,

    /// Runtime directory for the transport endpoints
    #[arg(long, env = "TAGFS_RUNTIME_DIR")]
    runtime_dir: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("ERROR: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let endpoints = Endpoints::in_dir(
        cli.runtime_dir
            .clone()
            .unwrap_or_else(Endpoints::default_runtime_dir),
    );

    if let Some(paths) = &cli.init {
        return init_daemon(paths, &cli, endpoints).await;
    }

    let client = Client::connect(endpoints).await?;

    if cli.shutdown {
        return shutdown_daemon(&client).await;
    }

    if let Some(args) = &cli.tag {
        let response = client
            .query(&format!("OP_TAG {},{}", args[0], args[1]))
            .await?;
        return Ok(print_response(&response));
    }
    if let Some(args) = &cli.untag {
        let response = client
            .query(&format!("OP_UNTAG {},{}", args[0], args[1]))
            .await?;
        return Ok(print_response(&response));
    }
    if let Some(args) = &cli.nest {
        let response = client
            .query(&format!("OP_NEST {},{}", args[0], args[1]))
            .await?;
        return Ok(print_response(&response));
    }
    if let Some(args) = &cli.unnest {
        let response = client
            .query(&format!("OP_UNNEST {},{}", args[0], args[1]))
            .await?;
        return Ok(print_response(&response));
    }
    if cli.stats {
        let response = client.query("OP_STATS").await?;
        return Ok(print_response(&response));
    }
    if let Some(tag) = &cli.create_tag {
        let response = client.query(&format!("OP_CREATE_TAG {tag}")).await?;
        return Ok(print_response(&response));
    }
    if let Some(tag) = &cli.delete_tag {
        let response = client.query(&format!("OP_DELETE_TAG {tag}")).await?;
        return Ok(print_response(&response));
    }
    if let Some(path) = &cli.get_tags {
        let response = client.query(&format!("OP_GET_TAGS {path}")).await?;
        let first = response.first().map(String::as_str).unwrap_or_default();
        if first == "Invalid" {
            eprintln!("ERROR: Invalid path given.");
            return Ok(1);
        }
        let tags = idlist::split(first);
        println!("TAGS:");
        if tags.is_empty() {
            println!("No tags found");
        } else {
            for tag in tags {
                println!("{tag}");
            }
        }
        return Ok(0);
    }
    if let Some(tags) = &cli.search_tags {
        let strict = if cli.strict { "1" } else { "0" };
        let response = client
            .query(&format!("OP_SEARCH {strict},{}", idlist::join(tags)))
            .await?;
        println!(
            "SEARCH RESULTS (Strict Search: {}):",
            if cli.strict { "ON" } else { "OFF" }
        );
        if response.iter().all(String::is_empty) {
            println!("No files found");
        } else {
            for line in &response {
                println!("{line}");
            }
        }
        return Ok(0);
    }

    unreachable!("clap enforces exactly one command");
}

/// Print a single-line daemon response; remote-reported failures exit 1.
fn print_response(response: &[String]) -> i32 {
    let first = response.first().map(String::as_str).unwrap_or_default();
    println!("RESPONSE: {first}");
    if first.starts_with("Failed") { 1 } else { 0 }
}

/// Spawn the daemon and wait for it to answer the health handshake.
async fn init_daemon(paths: &[PathBuf], cli: &Cli, endpoints: Endpoints) -> Result<i32> {
    let client = Client::connect(endpoints.clone()).await?;
    if client.responding {
        eprintln!("ERROR: TagFS is already running.");
        return Ok(1);
    }
    if client.sockets_exist {
        eprintln!("ERROR: TagFS not shut down properly, or running but not responsive.");
        return Ok(1);
    }

    let mount = std::fs::canonicalize(&paths[0]).context("invalid mount point")?;
    let root = std::fs::canonicalize(&paths[1]).context("invalid root directory")?;

    println!("Initializing TagFS...");
    let mut command = std::process::Command::new(daemon_binary());
    command
        .arg("--mount")
        .arg(&mount)
        .arg("--root")
        .arg(&root)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    if cli.log {
        command.arg("--log");
    }
    if cli.tag_view {
        command.arg("--tag-view");
    }
    if let Some(dir) = &cli.runtime_dir {
        command.arg("--runtime-dir").arg(dir);
    }
    command.spawn().context("failed to spawn tagfsd")?;

    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let probe = Client::connect(endpoints.clone()).await?;
        if probe.responding {
            println!("TagFS initialized.");
            return Ok(0);
        }
    }
    eprintln!("ERROR: TagFS could not be initialized.");
    Ok(1)
}

/// Prefer a `tagfsd` sitting next to this binary, fall back to `$PATH`.
fn daemon_binary() -> PathBuf {
    if let Ok(exe) = std::env::current_exe()
        && let Some(dir) = exe.parent()
    {
        let sibling = dir.join("tagfsd");
        if sibling.exists() {
            return sibling;
        }
    }
    PathBuf::from("tagfsd")
}

async fn shutdown_daemon(client: &Client) -> Result<i32> {
    if !client.sockets_exist {
        eprintln!("ERROR: Endpoints don't exist.");
        println!("TagFS might have already been shut down.");
        return Ok(0);
    }
    if client.responding && client.send_oneway("OP_EXIT").await.is_ok() {
        println!("Request to shutdown sent.");
        return Ok(0);
    }
    println!("TagFS hanging or not shut down properly.");
    client.remove_stale_endpoints();
    println!("Cleaned up endpoints.");
    Ok(1)
}
