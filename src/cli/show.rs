//! Show command implementation

use crate::config::Config;
use crate::error::{Error, Result};

pub fn run(config: &Config, session_id: &str) -> Result<()> {
    let store = super::open_store(config)?;
    let session = store.get_session(session_id)?.ok_or_else(|| Error::NotFound {
        kind: "session",
        id: session_id.to_string(),
    })?;

    println!("Session:  {}", session.id);
    if let Some(title) = &session.title {
        println!("Title:    {title}");
    }
    println!(
        "Project:  {}",
        session
            .project_path
            .as_deref()
            .unwrap_or(&session.project_dir)
    );
    if let Some(started) = &session.started_at {
        println!("Started:  {started}");
    }
    if let Some(ended) = &session.ended_at {
        println!("Ended:    {ended}");
    }
    println!("Messages: {}", session.message_count);
    println!("Source:   {}", session.source_path);
    println!();

    for message in store.thread(&session.id)? {
        let timestamp = message.timestamp.as_deref().unwrap_or("-");
        println!("[{timestamp}] {}:", message.role);
        for line in message.content.lines() {
            println!("  {line}");
        }
        println!();
    }

    Ok(())
}
