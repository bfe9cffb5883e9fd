//! List command implementation

use crate::config::Config;
use crate::error::Result;

pub fn run(config: &Config, project: Option<String>) -> Result<()> {
    let store = super::open_store(config)?;
    let sessions = store.list_sessions(project.as_deref())?;

    if sessions.is_empty() {
        println!("No sessions found. Run 'recollect sync' first.");
        return Ok(());
    }

    println!(
        "{:<12} {:<38} {:<16} {:>6}  {}",
        "Ended", "ID", "Project", "Msgs", "Title"
    );
    println!("{}", "-".repeat(100));

    for session in sessions {
        let ended = session
            .ended_at
            .as_ref()
            .map(|ts| {
                if ts.len() >= 16 {
                    format!("{} {}", &ts[5..10], &ts[11..16])
                } else {
                    ts.clone()
                }
            })
            .unwrap_or_else(|| "-".to_string());

        let project = session
            .project_name
            .as_deref()
            .unwrap_or(&session.project_dir);

        let title = session
            .title
            .as_ref()
            .map(|t| {
                let t = t.lines().next().unwrap_or(t);
                if t.chars().count() > 35 {
                    let prefix: String = t.chars().take(32).collect();
                    format!("{prefix}...")
                } else {
                    t.to_string()
                }
            })
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<12} {:<38} {:<16} {:>6}  {}",
            ended, session.id, project, session.message_count, title
        );
    }

    Ok(())
}
