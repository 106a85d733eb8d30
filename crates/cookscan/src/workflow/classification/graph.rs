//! Wiring of the classification graph.

use super::nodes;
use super::state::{ClassificationContext, ClassificationState};
use crate::workflow::engine::{Graph, GraphBuilder};

pub const NAMESPACE: &str = "classification";

pub fn classification_graph() -> Graph<ClassificationState, ClassificationContext> {
    GraphBuilder::new("check_grouping")
        .step("check_grouping", |s, c, r| {
            Box::pin(nodes::check_grouping(s, c, r))
        })
        .step("thumbnail", |s, c, r| Box::pin(nodes::thumbnail(s, c, r)))
        .step("start_classification", |s, c, r| {
            Box::pin(nodes::start_classification(s, c, r))
        })
        .step("validate", |s, c, r| Box::pin(nodes::validate(s, c, r)))
        .step("interrupt_classification", |s, c, r| {
            Box::pin(nodes::interrupt_classification(s, c, r))
        })
        .step("enrich_categories_tags", |s, c, r| {
            Box::pin(nodes::enrich_categories_tags(s, c, r))
        })
        .step("interrupt_taxonomy", |s, c, r| {
            Box::pin(nodes::interrupt_taxonomy(s, c, r))
        })
        .step("merge_taxonomy", |s, c, r| {
            Box::pin(nodes::merge_taxonomy(s, c, r))
        })
        .step("approve_classification", |s, c, r| {
            Box::pin(nodes::approve_classification(s, c, r))
        })
        .edge("check_grouping", "thumbnail")
        .edge("thumbnail", "start_classification")
        .edge("start_classification", "validate")
        .route("validate", nodes::route_after_validate)
        // First pass loops through the reviewer and back into validation.
        .edge("interrupt_classification", "validate")
        .edge("enrich_categories_tags", "interrupt_taxonomy")
        .edge("interrupt_taxonomy", "merge_taxonomy")
        .edge("merge_taxonomy", "approve_classification")
        .terminal("approve_classification")
        .build()
}
