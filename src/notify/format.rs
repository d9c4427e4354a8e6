// src/notify/format.rs

//! Message texts for the bot channel (Telegram HTML parse mode).

use std::fmt::Write as _;

use crate::models::{ChangeNotice, HearingWithSubject, RulingKind, RulingWithSubject};
use crate::utils::truncate_graphemes;

/// Telegram rejects messages longer than this many characters.
pub const MESSAGE_LIMIT: usize = 4096;

/// Escape text for HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() { "—" } else { value }
}

/// Push `<b>label:</b> value` when the value is non-empty.
fn push_field(out: &mut String, label: &str, value: &str) {
    if !value.trim().is_empty() {
        let _ = writeln!(out, "<b>{label}:</b> {}", escape_html(value));
    }
}

fn push_link(out: &mut String, label: &str, url: &str) {
    if !url.is_empty() {
        let _ = writeln!(out, "<a href=\"{}\">{label}</a>", escape_html(url));
    }
}

pub fn new_hearing(item: &HearingWithSubject) -> String {
    let h = &item.hearing;
    let mut out = String::from("🔔 <b>New hearing detected</b>\n\n");
    let _ = writeln!(out, "<b>Subject:</b> {}", escape_html(&item.subject_name));
    push_field(&mut out, "Case", &h.case_number);
    push_field(&mut out, "Parties", &truncate_graphemes(&h.title, 100));
    let _ = writeln!(
        out,
        "<b>Date:</b> {} at {}",
        escape_html(&h.date),
        escape_html(or_dash(&h.time))
    );
    push_field(&mut out, "Court", &h.court_name);
    push_field(&mut out, "Judge", &h.judge);
    push_field(&mut out, "Room", &h.room);
    push_field(&mut out, "Subject-matter", &h.subject_matter);
    let kind = [h.case_type.as_str(), h.hearing_type.as_str()]
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" | ");
    push_field(&mut out, "Type", &kind);
    push_link(&mut out, "📄 Summons (PDF)", &h.document_url);
    out.trim_end().to_string()
}

pub fn new_hearings_summary(items: &[HearingWithSubject]) -> String {
    let mut out = format!("🔔 <b>{} new hearings detected</b>\n\n", items.len());
    for (i, item) in items.iter().enumerate() {
        let h = &item.hearing;
        let _ = writeln!(
            out,
            "{}. {} {} — {} — {}",
            i + 1,
            escape_html(&h.date),
            escape_html(&h.time),
            escape_html(&truncate_graphemes(&h.title, 50)),
            escape_html(&h.court_name)
        );
    }
    out.trim_end().to_string()
}

pub fn change(notice: &ChangeNotice) -> String {
    let mut out = String::from("⚠️ <b>Change detected</b>\n\n");
    let _ = writeln!(out, "<b>Subject:</b> {}", escape_html(&notice.subject_name));
    push_field(&mut out, "Case", &notice.case_number);
    let _ = writeln!(
        out,
        "<b>{}:</b> {} → {}",
        escape_html(notice.field_label()),
        escape_html(or_dash(&notice.change.old_value)),
        escape_html(or_dash(&notice.change.new_value))
    );
    let _ = writeln!(
        out,
        "Hearing of {} at {}",
        escape_html(&notice.date),
        escape_html(or_dash(&notice.time))
    );
    push_field(&mut out, "Court", &notice.court_name);
    out.trim_end().to_string()
}

pub fn changes_summary(notices: &[ChangeNotice]) -> String {
    let mut out = format!("⚠️ <b>{} changes detected</b>\n\n", notices.len());
    for (i, notice) in notices.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} — {}: {} → {} — {}",
            i + 1,
            escape_html(&notice.case_number),
            escape_html(notice.field_label()),
            escape_html(or_dash(&notice.change.old_value)),
            escape_html(or_dash(&notice.change.new_value)),
            escape_html(&notice.court_name)
        );
    }
    out.trim_end().to_string()
}

pub fn new_ruling(item: &RulingWithSubject) -> String {
    let r = &item.ruling;
    let mut out = format!("📜 <b>New {} detected</b>\n\n", kind_label(item));
    let _ = writeln!(out, "<b>Subject:</b> {}", escape_html(&item.subject_name));
    push_field(&mut out, "Case", &r.case_number);
    push_field(&mut out, "Court", &r.court_name);
    push_field(&mut out, "Pronounced on", &r.pronounced_on);
    push_field(&mut out, "Judge", &r.judge);
    push_field(&mut out, "Disposition", &r.disposition);
    push_link(&mut out, "📄 Document (PDF)", &r.document_url);
    out.trim_end().to_string()
}

pub fn new_rulings_summary(items: &[RulingWithSubject]) -> String {
    let mut out = format!("📜 <b>{} new rulings</b>\n\n", items.len());
    for (i, item) in items.iter().enumerate() {
        let r = &item.ruling;
        let _ = writeln!(
            out,
            "{}. {} | {} | {} | {}",
            i + 1,
            kind_label(item),
            escape_html(or_dash(&r.pronounced_on)),
            escape_html(&r.court_name),
            escape_html(&r.case_number)
        );
    }
    out.trim_end().to_string()
}

fn kind_label(item: &RulingWithSubject) -> &'static str {
    match item.ruling.kind {
        RulingKind::Decision => "decision",
        RulingKind::Interlocutory => "interlocutory ruling",
    }
}

/// Split a message into chunks of at most `limit` characters, breaking on
/// line boundaries where possible.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.lines() {
        let line_len = line.chars().count();
        if current_len > 0 && current_len + 1 + line_len > limit {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > limit {
            chunks.extend(cut_line(line, limit));
            continue;
        }
        if current_len > 0 {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Longest `&...;` treated as one entity.
const MAX_ENTITY_LEN: usize = 10;

/// Split a line into tags, entities and single characters. A tag longer
/// than `limit` characters falls apart into single characters.
fn markup_atoms(line: &str, limit: usize) -> Vec<&str> {
    let mut atoms = Vec::new();
    let mut rest = line;
    while let Some(c) = rest.chars().next() {
        let len = match c {
            '<' => rest
                .find('>')
                .map(|end| end + 1)
                .filter(|&len| rest[..len].chars().count() <= limit),
            '&' => rest
                .find(';')
                .filter(|&end| {
                    end <= MAX_ENTITY_LEN.min(limit.saturating_sub(1))
                        && rest[1..end]
                            .chars()
                            .all(|c| c.is_ascii_alphanumeric() || c == '#')
                })
                .map(|end| end + 1),
            _ => None,
        }
        .unwrap_or(c.len_utf8());
        let (atom, tail) = rest.split_at(len);
        atoms.push(atom);
        rest = tail;
    }
    atoms
}

/// Cut an overlong line into pieces of at most `limit` characters, never
/// inside a tag or an entity.
fn cut_line(line: &str, limit: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut piece_len = 0;
    for atom in markup_atoms(line, limit) {
        let atom_len = atom.chars().count();
        if piece_len > 0 && piece_len + atom_len > limit {
            pieces.push(std::mem::take(&mut piece));
            piece_len = 0;
        }
        piece.push_str(atom);
        piece_len += atom_len;
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HearingChange, HearingRecord};
    use chrono::Utc;

    fn hearing(title: &str) -> HearingWithSubject {
        HearingWithSubject {
            hearing: HearingRecord {
                id: 1,
                identity_hash: "h".into(),
                subject_id: 1,
                court_code: "jc".into(),
                court_name: "Judecătoria Chișinău".into(),
                case_number: "2-123/2025".into(),
                judge: "Ionescu M.".into(),
                date: "20.05.2025".into(),
                date_iso: "2025-05-20".into(),
                time: "09:00".into(),
                room: "12".into(),
                title: title.into(),
                subject_matter: String::new(),
                case_type: "Civil".into(),
                hearing_type: String::new(),
                outcome: String::new(),
                document_url: String::new(),
                first_seen_at: Utc::now(),
                last_checked_at: Utc::now(),
            },
            subject_name: "Popescu Ion".into(),
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a<b> & \"c\""), "a&lt;b&gt; &amp; &quot;c&quot;");
    }

    #[test]
    fn test_new_hearing_escapes_and_skips_empty_fields() {
        let text = new_hearing(&hearing("Popescu <Ion> vs Stat"));
        assert!(text.contains("Popescu &lt;Ion&gt; vs Stat"));
        assert!(text.contains("<b>Judge:</b> Ionescu M."));
        assert!(text.contains("<b>Type:</b> Civil"));
        assert!(!text.contains("Subject-matter"));
        assert!(!text.contains("PDF"));
    }

    #[test]
    fn test_summary_numbers_every_item() {
        let items: Vec<_> = (0..5).map(|i| hearing(&format!("Dosar {i}"))).collect();
        let text = new_hearings_summary(&items);
        assert!(text.starts_with("🔔 <b>5 new hearings detected</b>"));
        assert!(text.contains("\n5. 20.05.2025 09:00 — Dosar 4 — Judecătoria Chișinău"));
    }

    #[test]
    fn test_change_shows_dash_for_empty_old_value() {
        let notice = ChangeNotice {
            change: HearingChange {
                id: 1,
                hearing_id: 1,
                field: "room".into(),
                old_value: String::new(),
                new_value: "5".into(),
                detected_at: Utc::now(),
            },
            case_number: "2-1/2025".into(),
            court_name: "JC".into(),
            date: "20.05.2025".into(),
            time: "09:00".into(),
            subject_name: "Popescu Ion".into(),
        };
        let text = change(&notice);
        assert!(text.contains("— → 5"));
    }

    #[test]
    fn test_split_message_on_lines() {
        let text = "aaaa\nbbbb\ncccc";
        assert_eq!(split_message(text, 100), vec![text.to_string()]);
        assert_eq!(split_message(text, 9), vec!["aaaa\nbbbb", "cccc"]);
        assert_eq!(split_message("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_split_never_cuts_inside_entities_or_tags() {
        let line = format!("x{}", "&amp;".repeat(10));
        let chunks = split_message(&line, 8);
        assert_eq!(chunks.concat(), line);
        assert_eq!(chunks[0], "x&amp;");
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 8);
            assert_eq!(chunk.matches('&').count(), chunk.matches("&amp;").count());
        }

        let line = format!("<b>{}</b> &#39;ok&#39;", "y".repeat(10));
        let chunks = split_message(&line, 6);
        assert_eq!(chunks.concat(), line);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 6);
            assert_eq!(chunk.matches('<').count(), chunk.matches('>').count());
            assert_eq!(chunk.matches('&').count(), chunk.matches(';').count());
        }
        assert_eq!(chunks, vec!["<b>yyy", "yyyyyy", "y</b> ", "&#39;o", "k&#39;"]);
    }
}
