use super::block_between;
use crate::sbom_generation::domain::FilePosition;

/// Blocks of every `[[table]]` array entry, in document order.
///
/// A block starts at its header and ends on the last non-blank line before
/// the next table header (or the end of the file). Sub-tables such as
/// `[package.dependencies]` stay inside the entry they belong to.
pub fn in_toml<S: AsRef<str>>(lines: &[S], table: &str) -> Vec<FilePosition> {
    let header = format!("[[{}]]", table);
    let sub_table = format!("[{}.", table);
    let sub_array = format!("[[{}.", table);
    let mut blocks = Vec::new();
    let mut open: Option<usize> = None;

    let close = |start: usize, end_exclusive: usize, blocks: &mut Vec<FilePosition>| {
        let last = (start..end_exclusive)
            .rev()
            .find(|&i| !lines[i].as_ref().trim().is_empty())
            .unwrap_or(start);
        if let Some(block) = block_between(lines, start, last) {
            crate::trace_position!("[TOML] [[{}]] block {}", table, block);
            blocks.push(block);
        }
    };

    for (index, line) in lines.iter().enumerate() {
        let trimmed = line.as_ref().trim();
        let is_own_sub_table = trimmed.starts_with(&sub_table) || trimmed.starts_with(&sub_array);
        if trimmed.starts_with('[') && !is_own_sub_table {
            if let Some(start) = open.take() {
                close(start, index, &mut blocks);
            }
            if trimmed == header {
                open = Some(index);
            }
        }
    }
    if let Some(start) = open {
        close(start, lines.len(), &mut blocks);
    }

    blocks
}
