// SPDX-License-Identifier: MIT

//! Recursive folder tree, rooted per team. Each analysis appears exactly
//! once across the whole tree.

use crate::analysis::AnalysisId;
use crate::define_id;
use serde::{Deserialize, Serialize};

define_id! {
    pub struct FolderId("fl-");
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeItem {
    Folder(Folder),
    Analysis { id: AnalysisId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
    pub items: Vec<TreeItem>,
}

impl Folder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { id: FolderId::new(), name: name.into(), items: Vec::new() }
    }

    /// Remove an analysis leaf from this subtree, wherever it is nested.
    /// Returns true if found and removed.
    pub fn remove_analysis(&mut self, analysis_id: &AnalysisId) -> bool {
        if let Some(pos) = self.items.iter().position(|item| {
            matches!(item, TreeItem::Analysis { id } if id == analysis_id)
        }) {
            self.items.remove(pos);
            return true;
        }
        for item in &mut self.items {
            if let TreeItem::Folder(f) = item {
                if f.remove_analysis(analysis_id) {
                    return true;
                }
            }
        }
        false
    }

    pub fn contains_analysis(&self, analysis_id: &AnalysisId) -> bool {
        self.items.iter().any(|item| match item {
            TreeItem::Analysis { id } => id == analysis_id,
            TreeItem::Folder(f) => f.contains_analysis(analysis_id),
        })
    }
}
