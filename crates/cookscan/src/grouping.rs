//! Partitioning of a book scan's pages into candidate recipe groups.
//!
//! A "motif" is the dominant page-type transition pattern of the scan:
//! cookbooks that photograph the dish before the recipe text produce
//! IMAGE→TEXT transitions, books that print text first produce the
//! opposite. The motif decides where a new recipe starts; a segment titled
//! `previous_page` overrides it and glues content to the preceding group.

use std::collections::HashSet;

use tracing::debug;

use crate::model::{InputPage, PageType, ScannedPage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motif {
    ImageThenText,
    TextThenImage,
    Undecided,
}

/// Infers the dominant transition pattern of an ordered page sequence.
///
/// Counts adjacent IMAGE→TEXT vs TEXT→IMAGE transitions; the more frequent
/// wins. A tie falls back to the first page's type (an IMAGE first page
/// picks `ImageThenText`). A single-page scan defaults to `TextThenImage`.
pub fn infer_motif(pages: &[ScannedPage]) -> Motif {
    if pages.is_empty() {
        return Motif::Undecided;
    }
    if pages.len() == 1 {
        return Motif::TextThenImage;
    }

    let mut image_then_text = 0usize;
    let mut text_then_image = 0usize;
    for pair in pages.windows(2) {
        match (pair[0].page_type, pair[1].page_type) {
            (Some(PageType::Image), Some(PageType::Text)) => image_then_text += 1,
            (Some(PageType::Text), Some(PageType::Image)) => text_then_image += 1,
            _ => {}
        }
    }

    if image_then_text == text_then_image {
        return match pages[0].page_type {
            Some(PageType::Image) => Motif::ImageThenText,
            _ => Motif::TextThenImage,
        };
    }
    if image_then_text > text_then_image {
        Motif::ImageThenText
    } else {
        Motif::TextThenImage
    }
}

/// Whether a page of `page_type` opens a new group under `motif`, given the
/// previous visible page's type.
fn starts_new_group(motif: Motif, page_type: PageType, prev: Option<PageType>) -> bool {
    match motif {
        Motif::ImageThenText => page_type == PageType::Image,
        Motif::TextThenImage => page_type == PageType::Text,
        Motif::Undecided => match prev {
            None => true,
            Some(prev) => prev == PageType::Image && page_type == PageType::Text,
        },
    }
}

/// Splits `pages` (page-number order, one book scan) into ordered groups of
/// classification input, skipping pages whose ids appear in `used`.
///
/// Pages that already went through segmentation are exploded into one input
/// page per segment, and a segment titled `previous_page` extends the
/// current group even mid-page. Every returned group is non-empty, and the
/// concatenation of all groups preserves the input order.
pub fn group_pages(
    pages: &[ScannedPage],
    motif: Motif,
    used: &HashSet<String>,
) -> Vec<Vec<InputPage>> {
    let mut groups: Vec<Vec<InputPage>> = Vec::new();
    let mut current: Vec<InputPage> = Vec::new();
    let mut prev: Option<PageType> = None;

    for page in pages {
        if used.contains(&page.id) {
            debug!("skipping page {} (already used)", page.id);
            continue;
        }
        let Some(page_type) = page.page_type else {
            debug!("skipping page {} (type not yet inferred)", page.id);
            continue;
        };

        match page_type {
            PageType::Image => {
                let input = InputPage {
                    page_id: page.id.clone(),
                    page_number: page.page_number,
                    page_type: PageType::Image,
                    ocr_ref: None,
                    relevant_segment: None,
                    segmentation_done: false,
                };
                if starts_new_group(motif, page_type, prev) {
                    finalize(&mut groups, &mut current);
                }
                current.push(input);
            }
            PageType::Text if !page.segmentation_done => {
                let continuation = page
                    .segments
                    .first()
                    .map(|s| s.is_continuation())
                    .unwrap_or(false);
                let input = InputPage {
                    page_id: page.id.clone(),
                    page_number: page.page_number,
                    page_type: PageType::Text,
                    ocr_ref: page.ocr_ref.clone(),
                    relevant_segment: None,
                    segmentation_done: false,
                };
                if !continuation && starts_new_group(motif, page_type, prev) {
                    finalize(&mut groups, &mut current);
                }
                current.push(input);
            }
            PageType::Text => {
                // Segmented page: one input per segment, boundaries decided
                // per segment title even mid-page.
                for segment in &page.segments {
                    let input = InputPage {
                        page_id: page.id.clone(),
                        page_number: page.page_number,
                        page_type: PageType::Text,
                        ocr_ref: page.ocr_ref.clone(),
                        relevant_segment: Some(segment.clone()),
                        segmentation_done: true,
                    };
                    if !segment.is_continuation() {
                        finalize(&mut groups, &mut current);
                    }
                    current.push(input);
                }
            }
        }

        prev = Some(page_type);
    }

    finalize(&mut groups, &mut current);
    groups
}

fn finalize(groups: &mut Vec<Vec<InputPage>>, current: &mut Vec<InputPage>) {
    if !current.is_empty() {
        groups.push(std::mem::take(current));
    }
}
