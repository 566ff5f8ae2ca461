//! delete command - Remove a node

use anyhow::Result;

use super::{parse_expected, print_json};
use crate::service::MemoryService;

pub fn delete(service: &MemoryService, path: &str, expect: Option<&str>) -> Result<()> {
    let expected = parse_expected(expect)?;
    let ack = service.delete(path, expected.as_ref())?;
    print_json(&ack)
}
