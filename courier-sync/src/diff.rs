//! Unified diffs for `courier diff`.

use similar::TextDiff;

use crate::planner::{FilePlan, TargetPreview};

/// A single file diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub path: String,
    pub unified_diff: String,
}

/// Unified diff of one planned file, `None` when nothing changes.
pub fn file_diff(plan: &FilePlan) -> Option<FileDiff> {
    if !plan.is_changed() {
        return None;
    }
    let old_header = format!("a/{}", plan.path);
    let new_header = if plan.deleted {
        "/dev/null".to_string()
    } else {
        format!("b/{}", plan.path)
    };
    let unified = TextDiff::from_lines(&plan.before, &plan.after)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();
    Some(FileDiff {
        path: plan.path.clone(),
        unified_diff: unified,
    })
}

/// Diffs of every changed file in a preview, in path order.
pub fn preview_diffs(preview: &TargetPreview) -> Vec<FileDiff> {
    preview.files.iter().filter_map(file_diff).collect()
}
