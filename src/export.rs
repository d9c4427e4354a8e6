// src/export.rs

//! CSV export of hearings.

use crate::models::HearingWithSubject;

pub const CSV_HEADERS: [&str; 11] = [
    "Date",
    "Time",
    "Court",
    "Case No.",
    "Title",
    "Judge",
    "Subject-matter",
    "Case type",
    "Hearing type",
    "Outcome",
    "Subject name",
];

const BOM: char = '\u{feff}';

/// Quote a field, doubling inner quotes.
fn quoted(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn push_row<'a>(out: &mut String, cells: impl IntoIterator<Item = &'a str>) {
    let row: Vec<String> = cells.into_iter().map(quoted).collect();
    out.push_str(&row.join(","));
    out.push('\n');
}

/// Render hearings as CSV: UTF-8 BOM, every field quoted, `\n` line endings.
pub fn hearings_csv(hearings: &[HearingWithSubject]) -> String {
    let mut out = String::new();
    out.push(BOM);
    push_row(&mut out, CSV_HEADERS);
    for item in hearings {
        let h = &item.hearing;
        push_row(
            &mut out,
            [
                h.date.as_str(),
                h.time.as_str(),
                h.court_name.as_str(),
                h.case_number.as_str(),
                h.title.as_str(),
                h.judge.as_str(),
                h.subject_matter.as_str(),
                h.case_type.as_str(),
                h.hearing_type.as_str(),
                h.outcome.as_str(),
                item.subject_name.as_str(),
            ],
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HearingRecord;
    use chrono::Utc;

    #[test]
    fn test_header_only_when_empty() {
        let csv = hearings_csv(&[]);
        assert!(csv.starts_with('\u{feff}'));
        assert_eq!(
            csv.trim_start_matches('\u{feff}'),
            "\"Date\",\"Time\",\"Court\",\"Case No.\",\"Title\",\"Judge\",\"Subject-matter\",\"Case type\",\"Hearing type\",\"Outcome\",\"Subject name\"\n"
        );
    }

    #[test]
    fn test_inner_quotes_are_doubled() {
        let item = HearingWithSubject {
            hearing: HearingRecord {
                id: 1,
                identity_hash: "h".into(),
                subject_id: 1,
                court_code: "jc".into(),
                court_name: "JC".into(),
                case_number: "2-1/2025".into(),
                judge: String::new(),
                date: "20.05.2025".into(),
                date_iso: "2025-05-20".into(),
                time: "09:00".into(),
                room: String::new(),
                title: "SRL \"Alfa\" vs Popescu".into(),
                subject_matter: String::new(),
                case_type: String::new(),
                hearing_type: String::new(),
                outcome: String::new(),
                document_url: String::new(),
                first_seen_at: Utc::now(),
                last_checked_at: Utc::now(),
            },
            subject_name: "Popescu Ion".into(),
        };
        let csv = hearings_csv(&[item]);
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("\"SRL \"\"Alfa\"\" vs Popescu\""));
        assert!(lines[1].ends_with("\"Popescu Ion\""));
        assert!(!csv.contains('\r'));
    }
}
