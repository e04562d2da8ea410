use crate::db_types::CandidateRecord;
use crate::scoring::{ResumeScore, STATUS_INTERVIEW_SCHEDULED};

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::{Deserialize, Serialize};

const RECENT_CANDIDATES: usize = 10;
pub const REPORT_SHEET: &str = "Candidate Report";
const REPORT_COLUMNS: [&str; 11] = [
    "id",
    "name",
    "skills",
    "education",
    "certifications",
    "experience",
    "email",
    "phone_number",
    "linkedin",
    "score",
    "status",
];

/// Render candidate rows as CSV with a header line.
pub fn candidates_csv(candidates: &[CandidateRecord]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(vec![]);
    for candidate in candidates {
        writer.serialize(candidate)?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

/// Render candidate rows as a single-sheet workbook with a bold header row.
pub fn candidates_xlsx(candidates: &[CandidateRecord]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(REPORT_SHEET)?;
    for (col, title) in REPORT_COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &header)?;
    }
    for (i, c) in candidates.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_number(row, 0, c.id as f64)?;
        let text = [
            &c.name,
            &c.skills,
            &c.education,
            &c.certifications,
            &c.experience,
            &c.email,
            &c.phone_number,
            &c.linkedin,
        ];
        for (offset, value) in text.iter().enumerate() {
            sheet.write_string(row, offset as u16 + 1, value.as_str())?;
        }
        sheet.write_number(row, 9, f64::from(c.score))?;
        sheet.write_string(row, 10, c.status.as_str())?;
    }
    workbook.save_to_buffer()
}

pub fn qualified_count(candidates: &[CandidateRecord]) -> usize {
    candidates
        .iter()
        .filter(|c| c.score >= ResumeScore::PASS as i32)
        .count()
}

/// Query-string filters of the candidate listing. Every present filter must match.
#[derive(Debug, Default, Deserialize)]
pub struct CandidateFilter {
    /// Case-insensitive substring of name or email.
    pub q: Option<String>,
    /// Comma-separated skills; the candidate must list all of them.
    pub skills: Option<String>,
    pub min_score: Option<i32>,
    pub max_score: Option<i32>,
    pub status: Option<String>,
}

impl CandidateFilter {
    pub fn matches(&self, candidate: &CandidateRecord) -> bool {
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let q = q.to_lowercase();
            if !candidate.name.to_lowercase().contains(&q)
                && !candidate.email.to_lowercase().contains(&q)
            {
                return false;
            }
        }
        if let Some(skills) = &self.skills {
            let have = candidate.skills.to_lowercase();
            let all_present = skills
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .all(|s| have.contains(&s));
            if !all_present {
                return false;
            }
        }
        if self.min_score.map_or(false, |min| candidate.score < min) {
            return false;
        }
        if self.max_score.map_or(false, |max| candidate.score > max) {
            return false;
        }
        if let Some(status) = self.status.as_deref().filter(|s| !s.is_empty()) {
            if candidate.status != status {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, candidates: Vec<CandidateRecord>) -> Vec<CandidateRecord> {
        candidates.into_iter().filter(|c| self.matches(c)).collect()
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_candidates: usize,
    pub qualified_candidates: usize,
    pub scheduled_interviews: usize,
    pub total_job_descriptions: usize,
    pub recent_candidates: Vec<CandidateRecord>,
}

impl DashboardStats {
    pub fn compute(candidates: &[CandidateRecord], total_job_descriptions: usize) -> Self {
        let mut recent = candidates.to_vec();
        recent.sort_by(|a, b| b.id.cmp(&a.id));
        recent.truncate(RECENT_CANDIDATES);
        Self {
            total_candidates: candidates.len(),
            qualified_candidates: qualified_count(candidates),
            scheduled_interviews: candidates
                .iter()
                .filter(|c| c.status == STATUS_INTERVIEW_SCHEDULED)
                .count(),
            total_job_descriptions,
            recent_candidates: recent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, name: &str, skills: &str, score: i32, status: &str) -> CandidateRecord {
        CandidateRecord {
            id,
            name: name.to_string(),
            skills: skills.to_string(),
            education: String::new(),
            certifications: String::new(),
            experience: String::new(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone_number: String::new(),
            linkedin: String::new(),
            score,
            status: status.to_string(),
        }
    }

    fn roster() -> Vec<CandidateRecord> {
        vec![
            record(1, "Jane", "Rust, SQL, Docker", 82, "Interview Scheduled"),
            record(2, "Sam", "Python, SQL", 55, "Not Scheduled"),
            record(3, "Ada", "rust, haskell", 70, "New"),
        ]
    }

    #[test]
    fn csv_has_header_and_one_line_per_candidate() {
        let csv = String::from_utf8(candidates_csv(&roster()).unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("id,name,skills,education,certifications,experience,email,phone_number,linkedin,score,status")
        );
        assert_eq!(lines.count(), 3);
        assert!(csv.contains("\"Rust, SQL, Docker\""));
    }

    #[test]
    fn workbook_holds_one_sheet_of_candidates() {
        use std::io::{Cursor, Read};

        let bytes = candidates_xlsx(&roster()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut part = |name: &str| {
            let mut xml = String::new();
            archive
                .by_name(name)
                .unwrap()
                .read_to_string(&mut xml)
                .unwrap();
            xml
        };
        assert!(part("xl/workbook.xml").contains(REPORT_SHEET));
        let strings = part("xl/sharedStrings.xml");
        for expected in ["phone_number", "Jane", "Rust, SQL, Docker", "Not Scheduled"] {
            assert!(strings.contains(expected), "missing {expected}");
        }
        assert!(part("xl/worksheets/sheet1.xml").contains("<v>82</v>"));
    }

    #[test]
    fn skills_filter_requires_every_skill() {
        let filter = CandidateFilter {
            skills: Some("rust, SQL".to_string()),
            ..Default::default()
        };
        let ids: Vec<i64> = filter.apply(roster()).iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn filters_combine() {
        let filter = CandidateFilter {
            q: Some("A".to_string()),
            min_score: Some(60),
            max_score: Some(75),
            ..Default::default()
        };
        let ids: Vec<i64> = filter.apply(roster()).iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![3]);

        let by_status = CandidateFilter {
            status: Some("Not Scheduled".to_string()),
            ..Default::default()
        };
        assert_eq!(by_status.apply(roster()).len(), 1);
        assert_eq!(CandidateFilter::default().apply(roster()).len(), 3);
    }

    #[test]
    fn dashboard_counts_and_orders_recent() {
        let stats = DashboardStats::compute(&roster(), 2);
        assert_eq!(stats.total_candidates, 3);
        assert_eq!(stats.qualified_candidates, 2);
        assert_eq!(stats.scheduled_interviews, 1);
        assert_eq!(stats.total_job_descriptions, 2);
        let ids: Vec<i64> = stats.recent_candidates.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }
}
