//! Projects one expanded row into a [`Record`].
//!
//! The row markup and its detail panel are captured separately from the live
//! page, wrapped in a single container and parsed with `scraper`. Parsing is
//! synchronous so the non-`Send` document never crosses an await point.

use scraper::{ElementRef, Html, Selector};

use super::layout::{
    DisciplineLayout, COUNTRY_FLAG_SELECTOR, DESIGNATION_LABEL, DISCIPLINES, DIV_RANK_LABEL,
    FOOTER, GENDER_RANK_LABEL, LABELED_VALUE_SELECTOR, NAME_SPAN_INDEX, NAME_SPAN_SELECTOR,
    OVERALL_RANK_LABEL, OVERALL_TIME_SELECTOR, TRANSITIONS,
};
use super::ExtractError;
use crate::models::{Record, SplitFields};

/// Container of one captured row, as written by [`wrap_row`].
pub const CAPTURE_SELECTOR: &str = "div.extraction_dummy";

/// Wrap captured row and panel markup so both parse as one subtree.
///
/// The wrapper records whether the panel was complete, so a saved capture
/// reparses to the same `Degraded` flag.
pub fn wrap_row(row_html: &str, panel_html: &str, degraded: bool) -> String {
    format!(
        "<div class=\"extraction_dummy\" data-degraded=\"{}\"><table><tbody>{}</tbody></table>{}</div>",
        degraded, row_html, panel_html
    )
}

/// Parse a captured row into a record for `job_id`.
///
/// Rank fields stay empty for DNF-class designations. Containers missing from
/// the markup yield empty fields; containers that are present but too short
/// for the layout are reported as [`ExtractError::LayoutMismatch`].
pub fn parse_row(job_id: &str, row_html: &str, panel_html: &str) -> Result<Record, ExtractError> {
    let fragment = Html::parse_fragment(&wrap_row(row_html, panel_html, false));
    project(job_id, fragment.root_element())
}

/// Parse every wrapped row of a saved capture, in document order.
pub fn parse_capture(job_id: &str, html: &str) -> Result<Vec<Record>, ExtractError> {
    let document = Html::parse_fragment(html);
    select_all(document.root_element(), CAPTURE_SELECTOR)?
        .into_iter()
        .map(|row| {
            let mut record = project(job_id, row)?;
            record.degraded = row.value().attr("data-degraded") == Some("true");
            Ok(record)
        })
        .collect()
}

fn project(job_id: &str, root: ElementRef<'_>) -> Result<Record, ExtractError> {
    let mut record = Record::for_job(job_id);

    let spans = select_all(root, NAME_SPAN_SELECTOR)?;
    let name = spans
        .get(NAME_SPAN_INDEX)
        .ok_or_else(|| ExtractError::LayoutMismatch {
            container: "row spans".to_string(),
            expected: NAME_SPAN_INDEX + 1,
            found: spans.len(),
        })?;
    record.name = own_text(name);

    let labeled = select_all(root, LABELED_VALUE_SELECTOR)?;
    record.designation = labeled_value(&labeled, DESIGNATION_LABEL);
    let ranked = !record.is_dnf();

    if ranked {
        record.div_rank = labeled_value(&labeled, DIV_RANK_LABEL);
        record.gender_rank = labeled_value(&labeled, GENDER_RANK_LABEL);
        record.overall_rank = labeled_value(&labeled, OVERALL_RANK_LABEL);
    }

    if let Some(cells) = cells(root, FOOTER.cell_selector, FOOTER.min_cells())? {
        record.bib = own_text(&cells[FOOTER.bib]);
        record.division = own_text(&cells[FOOTER.division]);
        record.points = own_text(&cells[FOOTER.points]);
    }

    record.country = select_all(root, COUNTRY_FLAG_SELECTOR)?
        .first()
        .and_then(|img| img.value().attr("alt"))
        .map(|alt| alt.trim().to_string())
        .unwrap_or_default();

    for layout in DISCIPLINES {
        if let Some(split) = discipline_split(root, &layout, ranked)? {
            record.set_split(layout.discipline, split);
        }
    }

    if let Some(cells) = cells(root, TRANSITIONS.cell_selector, TRANSITIONS.min_cells())? {
        record.transition_1 = own_text(&cells[TRANSITIONS.t1]);
        record.transition_2 = own_text(&cells[TRANSITIONS.t2]);
    }

    record.overall_time = select_all(root, OVERALL_TIME_SELECTOR)?
        .first()
        .map(own_text)
        .unwrap_or_default();

    Ok(record)
}

fn discipline_split(
    root: ElementRef<'_>,
    layout: &DisciplineLayout,
    ranked: bool,
) -> Result<Option<SplitFields>, ExtractError> {
    let Some(cells) = cells(root, layout.cell_selector, layout.min_cells())? else {
        return Ok(None);
    };

    let mut split = SplitFields {
        time: own_text(&cells[layout.time]),
        ..SplitFields::default()
    };
    if ranked {
        split.div_rank = own_text(&cells[layout.div_rank]);
        split.gender_rank = own_text(&cells[layout.gender_rank]);
        split.overall_rank = own_text(&cells[layout.overall_rank]);
    }
    Ok(Some(split))
}

fn parse_selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::Selector(format!("{}: {:?}", css, e)))
}

fn select_all<'a>(root: ElementRef<'a>, css: &str) -> Result<Vec<ElementRef<'a>>, ExtractError> {
    let selector = parse_selector(css)?;
    Ok(root.select(&selector).collect())
}

/// Cells of a positional container. `None` when the container is absent.
fn cells<'a>(
    root: ElementRef<'a>,
    css: &str,
    required: usize,
) -> Result<Option<Vec<ElementRef<'a>>>, ExtractError> {
    let found = select_all(root, css)?;
    if found.is_empty() {
        return Ok(None);
    }
    if found.len() < required {
        return Err(ExtractError::LayoutMismatch {
            container: css.to_string(),
            expected: required,
            found: found.len(),
        });
    }
    Ok(Some(found))
}

/// Text placed directly inside an element, ignoring nested elements.
fn own_text(element: &ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|node| node.value().as_text())
        .map(|text| &**text)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Value of a `<p>value</p><p>Label</p>` pair, or empty if the label is absent.
///
/// The value is the first `p` sibling that precedes the label in document order.
fn labeled_value(paragraphs: &[ElementRef<'_>], label: &str) -> String {
    paragraphs
        .iter()
        .find(|p| own_text(p) == label)
        .and_then(|label_el| {
            label_el
                .prev_siblings()
                .filter_map(ElementRef::wrap)
                .filter(|sibling| sibling.value().name() == "p")
                .last()
        })
        .map(|value| own_text(&value))
        .unwrap_or_default()
}
