//! read command - Print a node

use anyhow::Result;

use super::print_json;
use crate::service::MemoryService;

/// Print the node as JSON, or only its content with `raw`.
pub fn read(service: &MemoryService, path: &str, raw: bool) -> Result<()> {
    let node = service.read(path)?;
    if raw {
        print!("{}", node.content);
        return Ok(());
    }
    print_json(&node)
}
