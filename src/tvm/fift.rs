//! Fift hex notation
//!
//! One cell per line as `x{HEX}`, or `x{HEX_}` when the data is not a
//! multiple of four bits (the trailing nibble carries an augmentation
//! marker). Deeper indentation nests a line under the previous shallower
//! one as its next reference. This is the format produced by
//! [`Cell::to_fift_hex`].

use crate::tvm::bits::Bits;
use crate::tvm::builder::CellBuilder;
use crate::tvm::cell::Cell;
use crate::tvm::error::{Result, TvmError};
use std::sync::Arc;

/// Parses fift hex text into its top-level cells
pub fn deserialize_fift(text: &str) -> Result<Vec<Arc<Cell>>> {
    let mut roots = Vec::new();
    let mut stack: Vec<(usize, CellBuilder)> = Vec::new();

    for (number, line) in text.lines().enumerate() {
        let content = line.trim_start();
        if content.trim_end().is_empty() {
            continue;
        }
        let indent = line.len() - content.len();
        let bits = parse_fift_hex(content.trim_end())
            .map_err(|e| TvmError::InvalidFift(format!("line {}: {e}", number + 1)))?;

        while stack.last().is_some_and(|(top, _)| *top >= indent) {
            close_top(&mut stack, &mut roots)?;
        }
        let mut builder = CellBuilder::new();
        builder.store_bits(&bits)?;
        stack.push((indent, builder));
    }
    while !stack.is_empty() {
        close_top(&mut stack, &mut roots)?;
    }

    if roots.is_empty() {
        return Err(TvmError::InvalidFift("no cells found".to_string()));
    }
    Ok(roots)
}

/// Builds the innermost open cell and attaches it to its parent
fn close_top(stack: &mut Vec<(usize, CellBuilder)>, roots: &mut Vec<Arc<Cell>>) -> Result<()> {
    if let Some((_, builder)) = stack.pop() {
        let cell = builder.build()?;
        match stack.last_mut() {
            Some((_, parent)) => {
                parent.store_ref(cell)?;
            }
            None => roots.push(cell),
        }
    }
    Ok(())
}

/// Decodes a single `x{...}` group
pub fn parse_fift_hex(group: &str) -> Result<Bits> {
    let hex = group
        .strip_prefix("x{")
        .or_else(|| group.strip_prefix("X{"))
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| TvmError::InvalidFift(format!("{group:?} is not an x{{...}} group")))?;

    match hex.strip_suffix('_') {
        Some("") => Ok(Bits::new()),
        Some(body) => Bits::from_hex(body)?.rollback(),
        None => Bits::from_hex(hex),
    }
}
