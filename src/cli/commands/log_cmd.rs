//! log command - Show recent commits

use anyhow::Result;

use super::print_json;
use crate::service::MemoryService;

pub fn log(service: &MemoryService, limit: usize) -> Result<()> {
    print_json(&service.history(limit)?)
}
