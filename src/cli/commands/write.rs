//! write command - Create or overwrite a node

use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context as _, Result};

use super::{parse_expected, print_json};
use crate::service::MemoryService;

/// Write a node from `--content`, `--file` or stdin.
pub fn write(
    service: &MemoryService,
    path: &str,
    content: Option<String>,
    file: Option<&Path>,
    expect: Option<&str>,
) -> Result<()> {
    let expected = parse_expected(expect)?;
    let content = match (content, file) {
        (Some(content), _) => content,
        (None, Some(file)) => fs::read_to_string(file)
            .with_context(|| format!("failed to read '{}'", file.display()))?,
        (None, None) => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read content from stdin")?;
            buf
        }
    };

    let node = service.write(path, &content, expected.as_ref())?;
    print_json(&node)
}
