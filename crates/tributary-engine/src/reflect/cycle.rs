//! Guard against nested members that lead back to a type being emitted

use rustc_hash::FxHashSet;

use crate::error::GenerateError;
use crate::reflect::classify::{classify_field, MemberClass};
use crate::reflect::resolver::TypeIndex;

/// Walk the nested-member graph from `root`.
///
/// Types outside the index end the walk along their edge. A path that
/// reaches a type already in progress fails with the cycle, first and last
/// entries naming the same type.
pub fn check_nested_cycles(root: &str, index: &TypeIndex<'_>) -> Result<(), GenerateError> {
    let mut in_progress: Vec<String> = Vec::new();
    let mut finished: FxHashSet<String> = FxHashSet::default();

    visit(root, index, &mut in_progress, &mut finished).map_err(|path| {
        GenerateError::CyclicReflection {
            type_name: root.to_string(),
            path,
        }
    })
}

fn visit(
    name: &str,
    index: &TypeIndex<'_>,
    in_progress: &mut Vec<String>,
    finished: &mut FxHashSet<String>,
) -> Result<(), Vec<String>> {
    if let Some(start) = in_progress.iter().position(|n| n == name) {
        let mut path = in_progress[start..].to_vec();
        path.push(name.to_string());
        return Err(path);
    }
    if finished.contains(name) {
        return Ok(());
    }
    let Some(decl) = index.decl(name) else {
        return Ok(());
    };

    in_progress.push(name.to_string());
    for field in &decl.fields {
        if let MemberClass::Nested { qualified_name } = classify_field(field) {
            visit(&qualified_name, index, in_progress, finished)?;
        }
    }
    in_progress.pop();
    finished.insert(name.to_string());
    Ok(())
}
