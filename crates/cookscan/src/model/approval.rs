//! Payloads a reviewer sends to resume a suspended workflow instance.
//!
//! Each suspend point expects exactly one shape; the step consuming the
//! payload rejects the others. The engine itself does not check payload
//! shape against the record's current status.

use serde::{Deserialize, Serialize};

use super::page::{PageRef, SegmentationOutcome};
use super::recipe::RecipeDraft;

fn default_approved() -> bool {
    true
}

/// Reviewer decision for the grouping suspend point. `new_group` carries
/// the edited page list; absent or identical means "approved as proposed".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupApproval {
    #[serde(default = "default_approved")]
    pub approved: bool,
    #[serde(default)]
    pub new_group: Option<Vec<PageRef>>,
}

/// Reviewer decision for the recipe-field suspend point. `recipe` carries
/// edits; absent means "approved as validated".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeApproval {
    #[serde(default = "default_approved")]
    pub approved: bool,
    #[serde(default)]
    pub recipe: Option<RecipeDraft>,
}

/// Reviewer-confirmed categories and tags, applied verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyApproval {
    #[serde(default = "default_approved")]
    pub approved: bool,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub source: Option<String>,
}

/// Reviewer decision for the zone-approval suspend point of segmentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationApproval {
    #[serde(default = "default_approved")]
    pub approved: bool,
    #[serde(default)]
    pub segmentation: Option<SegmentationOutcome>,
}

/// The classification resume payload, discriminated by `phase`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum ApprovalBody {
    Group(GroupApproval),
    Recipe(RecipeApproval),
    Taxonomy(TaxonomyApproval),
}

impl ApprovalBody {
    pub fn phase(&self) -> &'static str {
        match self {
            ApprovalBody::Group(_) => "group",
            ApprovalBody::Recipe(_) => "recipe",
            ApprovalBody::Taxonomy(_) => "taxonomy",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_body_round_trip() {
        let body = ApprovalBody::Group(GroupApproval {
            approved: false,
            new_group: None,
        });
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["phase"], "group");
        let back: ApprovalBody = serde_json::from_value(value).unwrap();
        assert_eq!(back.phase(), "group");
    }

    #[test]
    fn test_approved_defaults_to_true() {
        let body: ApprovalBody =
            serde_json::from_str(r#"{"phase": "taxonomy", "categories": ["Dinner"]}"#).unwrap();
        match body {
            ApprovalBody::Taxonomy(t) => {
                assert!(t.approved);
                assert_eq!(t.categories.as_deref(), Some(&["Dinner".to_string()][..]));
            }
            other => panic!("unexpected variant: {}", other.phase()),
        }
    }
}
