//! list command - List nodes under a prefix

use anyhow::Result;

use super::print_json;
use crate::service::{ListOptions, MemoryService};

pub fn list(
    service: &MemoryService,
    prefix: String,
    recursive: bool,
    include_content: bool,
    offset: usize,
    limit: Option<usize>,
) -> Result<()> {
    let listing = service.list(&ListOptions {
        prefix,
        recursive,
        include_content,
        offset,
        limit,
    })?;
    print_json(&listing)
}
