//! batch command - Apply a JSON batch as one commit

use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context as _, Result};

use super::print_json;
use crate::core::types::BatchRequest;
use crate::service::MemoryService;

/// Apply the batch in `file` (`-` for stdin).
pub fn batch(service: &MemoryService, file: &Path) -> Result<()> {
    let raw = if file == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read batch from stdin")?;
        buf
    } else {
        fs::read_to_string(file)
            .with_context(|| format!("failed to read batch file '{}'", file.display()))?
    };

    let request: BatchRequest =
        serde_json::from_str(&raw).context("batch is not a valid batch request")?;
    let outcomes = service.apply_batch(&request.operations, &request.message)?;
    print_json(&outcomes)
}
