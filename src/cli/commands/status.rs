//! status command - Show mode, head and push state

use anyhow::Result;

use super::print_json;
use crate::service::MemoryService;

pub fn status(service: &MemoryService) -> Result<()> {
    print_json(&service.status())
}
