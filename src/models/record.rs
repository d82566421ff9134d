//! The flat, fixed-schema participant record.

use serde::{Deserialize, Serialize};

/// Designations for participants without a ranked finish.
pub const DNF_DESIGNATIONS: &[&str] = &["DNS", "DNF", "DQ", "Not Classified"];

/// Whether a designation belongs to the did-not-finish class.
pub fn is_dnf_designation(designation: &str) -> bool {
    DNF_DESIGNATIONS.contains(&designation.trim())
}

/// Race disciplines with a time and three rank dimensions each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    Swim,
    Bike,
    Run,
}

impl Discipline {
    pub const ALL: [Discipline; 3] = [Discipline::Swim, Discipline::Bike, Discipline::Run];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Swim => "swim",
            Self::Bike => "bike",
            Self::Run => "run",
        }
    }
}

impl std::fmt::Display for Discipline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time and ranks for one discipline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitFields {
    pub time: String,
    pub div_rank: String,
    pub gender_rank: String,
    pub overall_rank: String,
}

/// One participant's result row.
///
/// Field order is the column order of every output table. Missing values are
/// empty strings so all records of a run share the same shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "data_source_id")]
    pub data_source_id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Designation")]
    pub designation: String,
    #[serde(rename = "Div Rank")]
    pub div_rank: String,
    #[serde(rename = "Gender Rank")]
    pub gender_rank: String,
    #[serde(rename = "Overall Rank")]
    pub overall_rank: String,
    #[serde(rename = "Bib")]
    pub bib: String,
    #[serde(rename = "Division")]
    pub division: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Points")]
    pub points: String,
    #[serde(rename = "Swim Time")]
    pub swim_time: String,
    #[serde(rename = "Swim Div Rank")]
    pub swim_div_rank: String,
    #[serde(rename = "Swim Gender Rank")]
    pub swim_gender_rank: String,
    #[serde(rename = "Swim Overall Rank")]
    pub swim_overall_rank: String,
    #[serde(rename = "Bike Time")]
    pub bike_time: String,
    #[serde(rename = "Bike Div Rank")]
    pub bike_div_rank: String,
    #[serde(rename = "Bike Gender Rank")]
    pub bike_gender_rank: String,
    #[serde(rename = "Bike Overall Rank")]
    pub bike_overall_rank: String,
    #[serde(rename = "Run Time")]
    pub run_time: String,
    #[serde(rename = "Run Div Rank")]
    pub run_div_rank: String,
    #[serde(rename = "Run Gender Rank")]
    pub run_gender_rank: String,
    #[serde(rename = "Run Overall Rank")]
    pub run_overall_rank: String,
    #[serde(rename = "Transition 1")]
    pub transition_1: String,
    #[serde(rename = "Transition 2")]
    pub transition_2: String,
    #[serde(rename = "Overall Time")]
    pub overall_time: String,
    /// The detail panel did not fully render before the field wait expired.
    #[serde(rename = "Degraded")]
    pub degraded: bool,
    /// Wrapped row and panel markup, kept when the record came from the
    /// rendered view. Never part of the table.
    #[serde(skip)]
    pub raw_html: Option<String>,
}

impl Record {
    /// Output column names, in serialization order.
    pub const COLUMNS: [&'static str; 26] = [
        "data_source_id",
        "Name",
        "Designation",
        "Div Rank",
        "Gender Rank",
        "Overall Rank",
        "Bib",
        "Division",
        "Country",
        "Points",
        "Swim Time",
        "Swim Div Rank",
        "Swim Gender Rank",
        "Swim Overall Rank",
        "Bike Time",
        "Bike Div Rank",
        "Bike Gender Rank",
        "Bike Overall Rank",
        "Run Time",
        "Run Div Rank",
        "Run Gender Rank",
        "Run Overall Rank",
        "Transition 1",
        "Transition 2",
        "Overall Time",
        "Degraded",
    ];

    /// Empty record stamped with its originating job.
    pub fn for_job(job_id: &str) -> Self {
        Self {
            data_source_id: job_id.to_string(),
            ..Self::default()
        }
    }

    pub fn is_dnf(&self) -> bool {
        is_dnf_designation(&self.designation)
    }

    pub fn set_split(&mut self, discipline: Discipline, split: SplitFields) {
        let (time, div, gender, overall) = self.split_slots(discipline);
        *time = split.time;
        *div = split.div_rank;
        *gender = split.gender_rank;
        *overall = split.overall_rank;
    }

    pub fn split(&self, discipline: Discipline) -> SplitFields {
        let (time, div, gender, overall) = match discipline {
            Discipline::Swim => (
                &self.swim_time,
                &self.swim_div_rank,
                &self.swim_gender_rank,
                &self.swim_overall_rank,
            ),
            Discipline::Bike => (
                &self.bike_time,
                &self.bike_div_rank,
                &self.bike_gender_rank,
                &self.bike_overall_rank,
            ),
            Discipline::Run => (
                &self.run_time,
                &self.run_div_rank,
                &self.run_gender_rank,
                &self.run_overall_rank,
            ),
        };
        SplitFields {
            time: time.clone(),
            div_rank: div.clone(),
            gender_rank: gender.clone(),
            overall_rank: overall.clone(),
        }
    }

    fn split_slots(
        &mut self,
        discipline: Discipline,
    ) -> (&mut String, &mut String, &mut String, &mut String) {
        match discipline {
            Discipline::Swim => (
                &mut self.swim_time,
                &mut self.swim_div_rank,
                &mut self.swim_gender_rank,
                &mut self.swim_overall_rank,
            ),
            Discipline::Bike => (
                &mut self.bike_time,
                &mut self.bike_div_rank,
                &mut self.bike_gender_rank,
                &mut self.bike_overall_rank,
            ),
            Discipline::Run => (
                &mut self.run_time,
                &mut self.run_div_rank,
                &mut self.run_gender_rank,
                &mut self.run_overall_rank,
            ),
        }
    }

    /// Set a text column by its output name. Returns false for unknown or
    /// non-text columns.
    pub fn set_column(&mut self, column: &str, value: String) -> bool {
        let slot = match column {
            "data_source_id" => &mut self.data_source_id,
            "Name" => &mut self.name,
            "Designation" => &mut self.designation,
            "Div Rank" => &mut self.div_rank,
            "Gender Rank" => &mut self.gender_rank,
            "Overall Rank" => &mut self.overall_rank,
            "Bib" => &mut self.bib,
            "Division" => &mut self.division,
            "Country" => &mut self.country,
            "Points" => &mut self.points,
            "Swim Time" => &mut self.swim_time,
            "Swim Div Rank" => &mut self.swim_div_rank,
            "Swim Gender Rank" => &mut self.swim_gender_rank,
            "Swim Overall Rank" => &mut self.swim_overall_rank,
            "Bike Time" => &mut self.bike_time,
            "Bike Div Rank" => &mut self.bike_div_rank,
            "Bike Gender Rank" => &mut self.bike_gender_rank,
            "Bike Overall Rank" => &mut self.bike_overall_rank,
            "Run Time" => &mut self.run_time,
            "Run Div Rank" => &mut self.run_div_rank,
            "Run Gender Rank" => &mut self.run_gender_rank,
            "Run Overall Rank" => &mut self.run_overall_rank,
            "Transition 1" => &mut self.transition_1,
            "Transition 2" => &mut self.transition_2,
            "Overall Time" => &mut self.overall_time,
            _ => return false,
        };
        *slot = value;
        true
    }

    /// Blank every rank field: row-level and per-discipline.
    pub fn clear_ranks(&mut self) {
        self.div_rank.clear();
        self.gender_rank.clear();
        self.overall_rank.clear();
        for discipline in Discipline::ALL {
            let (_, div, gender, overall) = self.split_slots(discipline);
            div.clear();
            gender.clear();
            overall.clear();
        }
    }

    /// Apply the non-finisher rule: DNF-class rows carry no ranks.
    pub fn suppress_dnf_ranks(&mut self) {
        if self.is_dnf() {
            self.clear_ranks();
        }
    }

    /// True when every rank column is empty.
    pub fn ranks_are_empty(&self) -> bool {
        [&self.div_rank, &self.gender_rank, &self.overall_rank]
            .into_iter()
            .all(String::is_empty)
            && Discipline::ALL.iter().all(|d| {
                let split = self.split(*d);
                split.div_rank.is_empty()
                    && split.gender_rank.is_empty()
                    && split.overall_rank.is_empty()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked() -> Record {
        let mut record = Record::for_job("abc123");
        record.designation = "DNF".to_string();
        record.div_rank = "4".to_string();
        record.gender_rank = "10".to_string();
        record.overall_rank = "12".to_string();
        for d in Discipline::ALL {
            record.set_split(
                d,
                SplitFields {
                    time: "01:00:00".to_string(),
                    div_rank: "1".to_string(),
                    gender_rank: "2".to_string(),
                    overall_rank: "3".to_string(),
                },
            );
        }
        record
    }

    #[test]
    fn dnf_class_is_exact() {
        for d in ["DNS", "DNF", "DQ", "Not Classified", " DNF "] {
            assert!(is_dnf_designation(d), "{d}");
        }
        for d in ["Finisher", "", "dnf", "Not"] {
            assert!(!is_dnf_designation(d), "{d}");
        }
    }

    #[test]
    fn suppress_clears_ranks_but_keeps_times() {
        let mut record = ranked();
        record.suppress_dnf_ranks();

        assert!(record.ranks_are_empty());
        assert_eq!(record.swim_time, "01:00:00");
        assert_eq!(record.run_time, "01:00:00");
    }

    #[test]
    fn suppress_leaves_finishers_alone() {
        let mut record = ranked();
        record.designation = "Finisher".to_string();
        record.suppress_dnf_ranks();

        assert_eq!(record.overall_rank, "12");
        assert_eq!(record.split(Discipline::Bike).gender_rank, "2");
    }

    #[test]
    fn set_column_covers_every_text_column() {
        let mut record = Record::default();
        for column in &Record::COLUMNS[..Record::COLUMNS.len() - 1] {
            assert!(record.set_column(column, "v".to_string()), "{column}");
        }
        assert!(!record.set_column("Degraded", "true".to_string()));
        assert!(!record.set_column("Nickname", "x".to_string()));
        assert_eq!(record.run_gender_rank, "v");
    }

    #[test]
    fn csv_header_matches_columns() {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(Record::for_job("x")).unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let header = out.lines().next().unwrap();

        assert_eq!(header, Record::COLUMNS.join(","));
    }
}
