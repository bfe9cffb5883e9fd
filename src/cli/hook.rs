//! Hook command implementation

use crate::config::Config;
use crate::error::Result;
use crate::hook;

pub fn run(config: &Config, session_id: Option<String>, background: bool) -> Result<()> {
    // The hook contract: never fail the invoking host tool.
    hook::handle(config, session_id, background);
    Ok(())
}
