//! The classification graph's steps.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::state::{ClassificationContext, ClassificationPatch, ClassificationState};
use crate::broadcast::StatusEvent;
use crate::error::{CollaboratorError, WorkflowError};
use crate::model::{ApprovalBody, InputPage, PageType, RecordStatus, RecordUpdate};
use crate::ports::ImageKind;
use crate::workflow::engine::StepOutcome;

/// Vocabulary offered to the reviewer as the default suggestion. Human
/// input is applied verbatim and is not restricted to this set.
pub const SUGGESTED_CATEGORIES: &[&str] = &[
    "BBQ",
    "Baking",
    "Bread",
    "Breakfast",
    "Dessert",
    "Dinner",
    "Drink",
    "Gluten-Free",
    "Lunch",
    "Meat",
    "One-Pot",
    "Pasta",
    "Poultry",
    "Quick",
    "Salad",
    "Sauce",
    "Seafood",
    "Side",
    "Snack",
    "Soup",
    "Vegan",
    "Vegetarian",
];

pub fn default_category() -> &'static str {
    if SUGGESTED_CATEGORIES.contains(&"Dinner") {
        "Dinner"
    } else {
        SUGGESTED_CATEGORIES.first().copied().unwrap_or("Dinner")
    }
}

type StepResult = Result<StepOutcome<ClassificationState>, WorkflowError>;

fn parse_body(payload: Value) -> Result<ApprovalBody, WorkflowError> {
    serde_json::from_value(payload).map_err(|e| WorkflowError::PayloadMismatch(e.to_string()))
}

/// Suspend point #1: the reviewer confirms or edits which pages form this
/// recipe. Rejection ends the run with no recipe.
pub async fn check_grouping(
    state: ClassificationState,
    ctx: Arc<ClassificationContext>,
    resume: Option<Value>,
) -> StepResult {
    let Some(payload) = resume else {
        return Ok(StepOutcome::Suspend(json!({
            "awaiting": "grouping_approval",
            "record_id": state.record_id,
            "pages": state.input_pages.iter().map(InputPage::to_ref).collect::<Vec<_>>(),
        })));
    };

    let approval = match parse_body(payload)? {
        ApprovalBody::Group(approval) => approval,
        other => {
            return Err(WorkflowError::PayloadMismatch(format!(
                "expected group approval, got '{}'",
                other.phase()
            )))
        }
    };

    if !approval.approved {
        info!("grouping rejected for record {}", state.record_id);
        return Ok(StepOutcome::Halt(ClassificationPatch::clear_recipe()));
    }

    let old: Vec<(String, Option<u32>)> = state
        .input_pages
        .iter()
        .map(|p| (p.page_id.clone(), Some(p.page_number)))
        .collect();
    let new_refs = approval.new_group.unwrap_or_default();
    let new: Vec<(String, Option<u32>)> = new_refs
        .iter()
        .map(|r| (r.id.clone(), r.page_number))
        .collect();

    if new.is_empty() || new == old {
        info!("grouping approved without changes");
        return Ok(StepOutcome::Advance(ClassificationPatch::default()));
    }

    info!("grouping edited, reconciling input pages");

    // Drop pages no longer in the group.
    let keep: HashSet<&str> = new_refs.iter().map(|r| r.id.as_str()).collect();
    let mut input_pages: Vec<InputPage> = state
        .input_pages
        .iter()
        .filter(|p| keep.contains(p.page_id.as_str()))
        .cloned()
        .collect();

    // Fetch newly introduced pages; one input page each, no segment info.
    let existing: HashSet<String> = input_pages.iter().map(|p| p.page_id.clone()).collect();
    for page_ref in &new_refs {
        if existing.contains(&page_ref.id) {
            continue;
        }
        match ctx.pages.find_owned(&page_ref.id, &ctx.owner_id).await {
            Ok(Some(page)) => {
                input_pages.push(InputPage {
                    page_id: page.id.clone(),
                    page_number: page.page_number,
                    page_type: page.page_type.unwrap_or(PageType::Text),
                    ocr_ref: page.ocr_ref.clone(),
                    relevant_segment: None,
                    segmentation_done: page.segmentation_done,
                });
                info!("added page {} to the group", page.id);
            }
            Ok(None) => warn!("page {} not found, leaving it out", page_ref.id),
            Err(e) => warn!("could not fetch page {}: {e}", page_ref.id),
        }
    }

    // Final order follows the edited list.
    let order: HashMap<&str, usize> = new_refs
        .iter()
        .enumerate()
        .map(|(i, r)| (r.id.as_str(), i))
        .collect();
    input_pages.sort_by_key(|p| order.get(p.page_id.as_str()).copied().unwrap_or(usize::MAX));

    Ok(StepOutcome::Advance(ClassificationPatch {
        input_pages: Some(input_pages),
        ..Default::default()
    }))
}

/// Renders a thumbnail from the first image page of the group, if any.
pub async fn thumbnail(
    state: ClassificationState,
    ctx: Arc<ClassificationContext>,
    _resume: Option<Value>,
) -> StepResult {
    let image_id = state
        .input_pages
        .iter()
        .find(|p| p.page_type == PageType::Image)
        .map(|p| p.page_id.clone());

    let Some(image_id) = image_id else {
        debug!("no image pages available, skipping thumbnail");
        return Ok(StepOutcome::Advance(ClassificationPatch {
            thumbnail_path: Some(None),
            ..Default::default()
        }));
    };

    let src = ctx.storage.image_path(&image_id, ImageKind::Scanner).await?;
    let bytes = ctx.thumbnails.generate(&src).await?;
    let filename = format!("{image_id}_thumb.jpg");
    ctx.storage
        .save_image_bytes(&bytes, &filename, ImageKind::Scanner)
        .await?;

    Ok(StepOutcome::Advance(ClassificationPatch {
        thumbnail_path: Some(Some(filename)),
        ..Default::default()
    }))
}

/// Collects the OCR text of every text page and asks the classification
/// collaborator for a recipe candidate.
pub async fn start_classification(
    state: ClassificationState,
    ctx: Arc<ClassificationContext>,
    _resume: Option<Value>,
) -> StepResult {
    let mut blocks: Vec<Value> = Vec::new();
    let mut parts: Vec<String> = Vec::new();

    for page in state
        .input_pages
        .iter()
        .filter(|p| p.page_type == PageType::Text)
    {
        // Every block of the page is read, even when a segment narrows the
        // relevant region.
        let ocr = ctx.storage.read_ocr(&page.page_id).await?;
        blocks.extend(ocr.blocks);
        parts.push(ocr.full_text);
    }

    let candidate = ctx
        .classification
        .classify(&blocks, &parts.join("\n\n"))
        .await?;

    Ok(StepOutcome::Advance(ClassificationPatch {
        candidate: Some(candidate),
        ..Default::default()
    }))
}

/// Validates the raw candidate on the first pass, the reviewer-edited
/// recipe on later passes.
pub async fn validate(
    state: ClassificationState,
    ctx: Arc<ClassificationContext>,
    _resume: Option<Value>,
) -> StepResult {
    let first_pass = state.recipe.is_none();
    let candidate = match &state.recipe {
        Some(recipe) => serde_json::to_value(recipe)?,
        None => state.candidate.clone().unwrap_or(Value::Null),
    };

    if first_pass {
        info!("validating classification candidate");
    } else {
        info!("validating reviewer edits");
    }

    let draft = ctx
        .validation
        .validate(&candidate, state.thumbnail_path.as_deref())
        .await?;

    Ok(StepOutcome::Advance(ClassificationPatch {
        recipe: Some(Some(draft)),
        first_pass_validation: Some(first_pass),
        ..Default::default()
    }))
}

pub fn route_after_validate(state: &ClassificationState) -> &'static str {
    if state.first_pass_validation {
        "interrupt_classification"
    } else {
        "enrich_categories_tags"
    }
}

/// Suspend point #2: the reviewer approves, edits, or rejects the recipe
/// fields. Approvals and edits loop back through validation.
pub async fn interrupt_classification(
    state: ClassificationState,
    _ctx: Arc<ClassificationContext>,
    resume: Option<Value>,
) -> StepResult {
    let Some(payload) = resume else {
        return Ok(StepOutcome::Suspend(json!({
            "awaiting": "recipe_approval",
            "record_id": state.record_id,
        })));
    };

    let approval = match parse_body(payload)? {
        ApprovalBody::Recipe(approval) => approval,
        other => {
            return Err(WorkflowError::PayloadMismatch(format!(
                "expected recipe approval, got '{}'",
                other.phase()
            )))
        }
    };

    if !approval.approved {
        info!("recipe rejected for record {}", state.record_id);
        return Ok(StepOutcome::Halt(ClassificationPatch::clear_recipe()));
    }

    let recipe = approval.recipe.or_else(|| state.recipe.clone());
    Ok(StepOutcome::Advance(ClassificationPatch {
        recipe: Some(recipe),
        ..Default::default()
    }))
}

/// Seeds the taxonomy suggestion and stamps the source book title.
pub async fn enrich_categories_tags(
    state: ClassificationState,
    ctx: Arc<ClassificationContext>,
    _resume: Option<Value>,
) -> StepResult {
    let Some(mut recipe) = state.recipe.clone() else {
        return Err(WorkflowError::MissingState {
            step: "enrich_categories_tags",
            what: "a validated recipe",
        });
    };

    recipe.categories = vec![default_category().to_string()];
    recipe.tags = vec!["scanned".to_string()];

    let book = ctx
        .books
        .find_owned(&state.book_scan_id, &ctx.owner_id)
        .await?
        .ok_or_else(|| CollaboratorError::NotFound(format!("book scan {}", state.book_scan_id)))?;
    recipe.source = Some(book.title);

    Ok(StepOutcome::Advance(ClassificationPatch {
        recipe: Some(Some(recipe)),
        ..Default::default()
    }))
}

/// Suspend point #3: the reviewer confirms categories and tags.
pub async fn interrupt_taxonomy(
    state: ClassificationState,
    _ctx: Arc<ClassificationContext>,
    resume: Option<Value>,
) -> StepResult {
    let Some(payload) = resume else {
        return Ok(StepOutcome::Suspend(json!({
            "awaiting": "taxonomy_approval",
            "record_id": state.record_id,
        })));
    };

    let approval = match parse_body(payload)? {
        ApprovalBody::Taxonomy(approval) => approval,
        other => {
            return Err(WorkflowError::PayloadMismatch(format!(
                "expected taxonomy approval, got '{}'",
                other.phase()
            )))
        }
    };

    Ok(StepOutcome::Advance(ClassificationPatch {
        taxonomy: Some(crate::model::TaxonomyChoice {
            categories: approval.categories.unwrap_or_default(),
            tags: approval.tags.unwrap_or_default(),
        }),
        ..Default::default()
    }))
}

/// Applies the reviewer's taxonomy to the recipe, verbatim.
pub async fn merge_taxonomy(
    state: ClassificationState,
    _ctx: Arc<ClassificationContext>,
    _resume: Option<Value>,
) -> StepResult {
    let Some(mut recipe) = state.recipe.clone() else {
        return Err(WorkflowError::MissingState {
            step: "merge_taxonomy",
            what: "a validated recipe",
        });
    };
    let taxonomy = state.taxonomy.clone().unwrap_or_default();

    recipe.categories = taxonomy.categories;
    recipe.tags = taxonomy.tags;

    Ok(StepOutcome::Advance(ClassificationPatch {
        recipe: Some(Some(recipe)),
        ..Default::default()
    }))
}

/// Terminal step: persists the recipe image and the recipe, marks the
/// record approved, and tells subscribers.
pub async fn approve_classification(
    state: ClassificationState,
    ctx: Arc<ClassificationContext>,
    _resume: Option<Value>,
) -> StepResult {
    let Some(recipe) = state.recipe.clone() else {
        return Err(WorkflowError::MissingState {
            step: "approve_classification",
            what: "a validated recipe",
        });
    };

    if let Some(image) = recipe.image_url.as_deref() {
        ctx.storage.copy_to_recipe(image).await?;
    }

    let stored = ctx.recipes.add(&recipe, &ctx.owner_id).await?;
    info!(
        "created recipe {} for record {}",
        stored.id, state.record_id
    );

    let mut update = RecordUpdate::with_status(&state.record_id, RecordStatus::Approved);
    update.recipe_id = Some(stored.id);
    ctx.records.update(update, Some(&ctx.owner_id)).await?;

    ctx.status
        .publish(StatusEvent::record(&state.record_id, RecordStatus::Approved));

    Ok(StepOutcome::Advance(ClassificationPatch::default()))
}
