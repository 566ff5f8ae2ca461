//! push command - Push HEAD to the remote now

use anyhow::Result;
use serde_json::json;

use super::print_json;
use crate::service::MemoryService;

pub fn push(service: &MemoryService) -> Result<()> {
    service.push_now()?;
    print_json(&json!({
        "pushed": service.current_head_version(),
        "remote": service.status().remote_url,
    }))
}
