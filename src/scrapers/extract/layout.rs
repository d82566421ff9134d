//! Provider markup contract.
//!
//! Everything the extractor knows about the results page lives here: the
//! selectors it waits on and the positional offsets it reads fields from.
//! These offsets mirror the provider's fixed result-panel layout. When the
//! provider changes its markup, this table is the one place to update, and
//! [`super::parse`] reports a `LayoutMismatch` instead of shifting values
//! into the wrong columns.

use crate::models::Discipline;

/// Any table row. Its presence means the results table rendered.
pub const TABLE_READY_SELECTOR: &str = "tr";

/// Participant rows, in render order.
pub const ROW_SELECTOR: &str = "tbody > tr";

/// Detail panel shown under an expanded row.
pub const EXPANDED_PANEL_SELECTOR: &str = ".RaDatagrid-expandedPanel";

/// Numbered page buttons plus a trailing "next" button.
pub const PAGINATION_BUTTON_SELECTOR: &str = "ul.MuiPagination-ul > li > button";

pub const COUNTRY_FLAG_SELECTOR: &str = "div.text.countryFlag > img";

/// Disappears once an expanded row has collapsed again.
pub const COLLAPSE_MARKER_SELECTOR: &str = "#swimDetails";

/// Row spans; the participant name is the second.
pub const NAME_SPAN_SELECTOR: &str = "span";
pub const NAME_SPAN_INDEX: usize = 1;

/// Values rendered as `<p>value</p><p>Label</p>` pairs.
pub const LABELED_VALUE_SELECTOR: &str = "p";
pub const DESIGNATION_LABEL: &str = "Designation";
pub const DIV_RANK_LABEL: &str = "Div Rank";
pub const GENDER_RANK_LABEL: &str = "Gender Rank";
pub const OVERALL_RANK_LABEL: &str = "Overall Rank";

pub const OVERALL_TIME_SELECTOR: &str = "div.summaryRow.overallRow > p.summaryTime";

/// Cell offsets inside the footer row of the detail panel.
#[derive(Debug, Clone, Copy)]
pub struct FooterLayout {
    pub cell_selector: &'static str,
    pub bib: usize,
    pub division: usize,
    pub points: usize,
}

pub const FOOTER: FooterLayout = FooterLayout {
    cell_selector: "div.tableRow.tableFooter > div > div",
    bib: 0,
    division: 1,
    points: 3,
};

/// Cell offsets inside one discipline's detail container.
#[derive(Debug, Clone, Copy)]
pub struct DisciplineLayout {
    pub discipline: Discipline,
    /// Must be present before the row counts as fully rendered.
    pub ready_selector: &'static str,
    pub cell_selector: &'static str,
    pub time: usize,
    pub div_rank: usize,
    pub gender_rank: usize,
    pub overall_rank: usize,
}

pub const DISCIPLINES: [DisciplineLayout; 3] = [
    DisciplineLayout {
        discipline: Discipline::Swim,
        ready_selector: "#swimDetails",
        cell_selector: "div[id*='swimDetails'] > div > div > div > div",
        time: 4,
        div_rank: 5,
        gender_rank: 6,
        overall_rank: 7,
    },
    DisciplineLayout {
        discipline: Discipline::Bike,
        ready_selector: "#bikeDetails",
        cell_selector: "div[id*='bikeDetails'] > div > div > div > div",
        time: 4,
        div_rank: 5,
        gender_rank: 6,
        overall_rank: 7,
    },
    DisciplineLayout {
        discipline: Discipline::Run,
        ready_selector: "#runDetails",
        cell_selector: "div[id*='runDetails'] > div > div > div > div",
        time: 4,
        div_rank: 5,
        gender_rank: 6,
        overall_rank: 7,
    },
];

#[derive(Debug, Clone, Copy)]
pub struct TransitionLayout {
    pub cell_selector: &'static str,
    pub t1: usize,
    pub t2: usize,
}

pub const TRANSITIONS: TransitionLayout = TransitionLayout {
    cell_selector: "div[id*='transitions'] > div > div > div > div",
    t1: 2,
    t2: 3,
};

impl FooterLayout {
    pub fn min_cells(&self) -> usize {
        self.bib.max(self.division).max(self.points) + 1
    }
}

impl DisciplineLayout {
    pub fn min_cells(&self) -> usize {
        self.time
            .max(self.div_rank)
            .max(self.gender_rank)
            .max(self.overall_rank)
            + 1
    }
}

impl TransitionLayout {
    pub fn min_cells(&self) -> usize {
        self.t1.max(self.t2) + 1
    }
}

/// Selectors that must all match before an expanded row's fields are read.
pub fn detail_ready_selectors() -> Vec<&'static str> {
    DISCIPLINES
        .iter()
        .map(|d| d.ready_selector)
        .chain(std::iter::once(COUNTRY_FLAG_SELECTOR))
        .collect()
}
