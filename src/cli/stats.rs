//! Stats command implementation

use crate::config::Config;
use crate::error::Result;

pub fn run(config: &Config, check: bool) -> Result<()> {
    let store = super::open_store(config)?;

    if check {
        store.integrity_check()?;
        println!("Integrity: ok");
    }

    let stats = store.stats()?;

    println!("Sessions:   {}", stats.session_count);
    println!("Messages:   {}", stats.message_count);
    println!("Tool uses:  {}", stats.tool_use_count);
    println!("Storage:    {}", human_bytes(stats.storage_size_bytes));

    if !stats.projects.is_empty() {
        println!();
        println!("{:<24} {:>10} {:>10}", "Project", "Sessions", "Messages");
        for project in &stats.projects {
            println!(
                "{:<24} {:>10} {:>10}",
                project.project, project.session_count, project.message_count
            );
        }
    }
    Ok(())
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::human_bytes;

    #[test]
    fn formats_byte_sizes() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(2048), "2.0 KiB");
        assert_eq!(human_bytes(5 * 1024 * 1024), "5.0 MiB");
    }
}
