//! Related command implementation

use crate::config::Config;
use crate::error::Result;

pub fn run(config: &Config, source_type: &str, source_id: &str) -> Result<()> {
    let store = super::open_store(config)?;
    let hits = store.related(source_type, source_id)?;

    if hits.is_empty() {
        println!("No related sessions.");
        return Ok(());
    }

    println!("{:<8} {:<6} {}", "Weight", "Hops", "Session");
    for hit in hits {
        println!("{:<8.3} {:<6} {}", hit.weight, hit.hops, hit.session_id);
    }
    Ok(())
}
