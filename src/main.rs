//! Demo: open a project tree, print its events until Ctrl+C, then dump the
//! expansion state.
//!
//! Usage: `project-tree [PATH] [CONFIG.json]`

use anyhow::{Context, Result};
use project_tree::prelude::*;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("project_tree=debug".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let root = match args.next() {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir().context("No path given and no working directory")?,
    };
    let config = match args.next() {
        Some(path) => TreeConfig::from_json_file(Path::new(&path))?,
        None => TreeConfig::default(),
    };

    println!("Watching: {}\n", root.display());
    let mut tree = FileTree::builder(&root).config(config).build();
    print_children(tree.root());

    let mut events = tree.root().subscribe();
    println!("\nPress Ctrl+C to exit\n---");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                println!("\nShutting down...");
                break;
            }
            applied = tree.next_batch() => {
                tracing::debug!("Applied {} messages", applied);
                for event in events.drain() {
                    print_event(&event);
                }
            }
        }
    }

    let state = tree.serialize_expansion_state();
    tree.destroy();
    println!("{}", state.to_json()?);

    Ok(())
}

fn print_children(dir: &DirectoryNode) {
    for entry in dir.children() {
        let marker = match entry.kind() {
            EntryKind::Directory => "/",
            EntryKind::File => "",
        };
        println!("  {}{}", entry.name(), marker);
    }
}

fn print_event(event: &NodeEvent) {
    match event {
        NodeEvent::EntriesAdded { entries } => {
            for entry in entries {
                println!("[+] {} at {}", entry.name, entry.index);
            }
        }
        NodeEvent::EntriesRemoved { entries } => {
            for name in entries.keys() {
                println!("[-] {}", name);
            }
        }
        NodeEvent::StatusChanged { status } => println!("[status] {}", status),
        other => println!("[{:?}]", other.kind()),
    }
}
