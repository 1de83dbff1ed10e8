//! Status/date normalization and the five-view classification engine.
//!
//! Everything here is pure and total: pipeline data is hand-entered and
//! noisy, so malformed input degrades to "does not match" or "sorts last",
//! never to an error. The backend stays the source of truth; these
//! functions only decide what the dashboard shows and in what order.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime};
use cpt_core::{is_truthy, CandidateRow, ViewKind};
use serde_json::Value;

pub const CRATE_NAME: &str = "cpt-views";

const EDGE_QUOTES: [char; 6] = ['"', '\'', '\u{201c}', '\u{201d}', '\u{2018}', '\u{2019}'];

/// Canonical form of a free-text stage label: non-breaking spaces become
/// spaces, the result is trimmed, lowercased, internal whitespace runs
/// collapse to one space, edge quotes (straight and curly) are stripped,
/// and trailing `.` `,` `;` `:` runs are dropped.
pub fn normalize_status(raw: &str) -> String {
    let spaced = raw.replace('\u{a0}', " ");
    let collapsed = spaced
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    collapsed
        .trim_matches(|c| EDGE_QUOTES.contains(&c))
        .trim_end_matches(['.', ',', ';', ':'])
        .to_string()
}

/// Parse a stored date that may be a machine timestamp or a human phrase.
/// Direct formats are tried first; on failure a cleanup pass drops a
/// leading weekday name, strips ordinal suffixes ("3rd" -> "3"), collapses
/// whitespace and retries. `None` when nothing parses.
pub fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(date) = parse_date_formats(trimmed) {
        return Some(date);
    }
    let cleaned = strip_ordinal_suffixes(strip_leading_weekday(trimmed));
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return None;
    }
    parse_date_formats(&cleaned)
}

fn parse_date_formats(input: &str) -> Option<NaiveDate> {
    if let Ok(stamp) = DateTime::parse_from_rfc3339(input) {
        return Some(stamp.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(input, format) {
            return Some(stamp.date());
        }
    }
    for format in [
        "%Y-%m-%d",
        "%m/%d/%Y",
        "%B %d, %Y",
        "%b %d, %Y",
        "%B %d %Y",
        "%b %d %Y",
        "%d %B %Y",
        "%d %b %Y",
    ] {
        if let Ok(date) = NaiveDate::parse_from_str(input, format) {
            return Some(date);
        }
    }
    None
}

/// "Tuesday, March 3" -> "March 3". Any leading word followed by a comma
/// is dropped, matching how people prefix dates in a text column.
fn strip_leading_weekday(input: &str) -> &str {
    let alpha_len = input
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .count();
    if alpha_len == 0 {
        return input;
    }
    match input[alpha_len..].strip_prefix(',') {
        Some(rest) => rest.trim_start(),
        None => input,
    }
}

/// "3rd" -> "3", "21st," -> "21," (case-insensitive).
fn strip_ordinal_suffixes(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < chars.len() {
        out.push(chars[i]);
        if chars[i].is_ascii_digit() && i + 2 < chars.len() {
            let suffix: String = chars[i + 1..=i + 2]
                .iter()
                .collect::<String>()
                .to_ascii_lowercase();
            if matches!(suffix.as_str(), "st" | "nd" | "rd" | "th") {
                i += 2;
            }
        }
        i += 1;
    }
    out
}

/// An ordered allow-list of canonical stage labels. Entries are normalized
/// once at construction; the set answers exact membership while the list
/// keeps rank order for the Active view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusList {
    entries: Vec<String>,
    set: HashSet<String>,
}

impl StatusList {
    pub fn new<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries: Vec<String> = raw
            .into_iter()
            .map(|s| normalize_status(s.as_ref()))
            .filter(|s| !s.is_empty())
            .collect();
        let set = entries.iter().cloned().collect();
        Self { entries, set }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn contains(&self, normalized: &str) -> bool {
        self.set.contains(normalized)
    }
}

/// Tolerant membership of a noisy status value in a configured list.
/// An empty list is an open list: everything matches. Otherwise three
/// tiers, strongest first: exact set membership of the normalized or
/// quote-stripped form, a list entry as prefix of either form, and a list
/// entry anywhere inside the quote-stripped form. The weak tiers exist
/// because stage labels drift ("cold - revisit q3" still means "cold").
pub fn matches_status_list(status_value: &str, list: &StatusList) -> bool {
    if list.is_empty() {
        return true;
    }
    let normalized = normalize_status(status_value);
    let clean: String = normalized
        .chars()
        .filter(|c| !EDGE_QUOTES.contains(c))
        .collect();
    if list.contains(&normalized) || list.contains(&clean) {
        return true;
    }
    list.entries()
        .iter()
        .any(|entry| normalized.starts_with(entry.as_str()) || clean.starts_with(entry.as_str()) || clean.contains(entry.as_str()))
}

/// The four configured lists, one per classified view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusLists {
    pub active: StatusList,
    pub review: StatusList,
    pub checkin: StatusList,
    pub tenure: StatusList,
}

/// Eligibility window for the Check-in view: a day range around today, or
/// an exact calendar month when the debug override is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckinWindow {
    AroundToday { days: i64 },
    Month { year: i32, month: u32 },
}

impl CheckinWindow {
    /// A configured `YYYY-MM` override takes precedence over the day
    /// window. An override that does not parse admits nothing rather than
    /// falling back to the window, so bad debug config is visible as an
    /// empty view instead of a silently different one.
    pub fn from_config(window_days: u32, debug_month: Option<&str>) -> CheckinWindow {
        match debug_month.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Self::parse_month(raw).unwrap_or(CheckinWindow::Month { year: 0, month: 0 }),
            None => CheckinWindow::AroundToday {
                days: i64::from(window_days),
            },
        }
    }

    fn parse_month(raw: &str) -> Option<CheckinWindow> {
        let (year, month) = raw.split_once('-')?;
        let year: i32 = year.parse().ok()?;
        let month: u32 = month.parse().ok()?;
        if year == 0 || month == 0 {
            return None;
        }
        Some(CheckinWindow::Month { year, month })
    }

    fn admits(&self, date: NaiveDate, today: NaiveDate) -> bool {
        match *self {
            CheckinWindow::Month { year, month } => {
                date.year() == year && date.month() == month
            }
            CheckinWindow::AroundToday { days } => {
                let start = today - Duration::days(days);
                let end = today + Duration::days(days);
                date >= start && date <= end
            }
        }
    }
}

/// Decides which of the classified views a row belongs to. `today` is
/// injected so the date logic is deterministic under test; production
/// builds one per render from the current local day.
#[derive(Debug, Clone)]
pub struct Classifier {
    lists: StatusLists,
    snooze_field: String,
    window: CheckinWindow,
    today: NaiveDate,
}

impl Classifier {
    pub fn new(
        lists: StatusLists,
        snooze_field: impl Into<String>,
        window: CheckinWindow,
        today: NaiveDate,
    ) -> Self {
        Self {
            lists,
            snooze_field: snooze_field.into(),
            window,
            today,
        }
    }

    pub fn for_today(
        lists: StatusLists,
        snooze_field: impl Into<String>,
        window: CheckinWindow,
    ) -> Self {
        Self::new(lists, snooze_field, window, Local::now().date_naive())
    }

    pub fn lists(&self) -> &StatusLists {
        &self.lists
    }

    pub fn snooze_field(&self) -> &str {
        &self.snooze_field
    }

    /// Status in the active list. No date condition, and deliberately no
    /// empty-list guard: emptying the active list admits every row, unlike
    /// the three guarded views below.
    pub fn is_active(&self, row: &CandidateRow) -> bool {
        matches_status_list(&row.status, &self.lists.active)
    }

    /// Status in the review list and anything at all entered in the
    /// check-in column. No date validity required.
    pub fn is_review(&self, row: &CandidateRow) -> bool {
        if self.lists.review.is_empty() {
            return false;
        }
        let has_checkin = row
            .snooze_value(&self.snooze_field)
            .map(is_truthy)
            .unwrap_or(false);
        has_checkin && matches_status_list(&row.status, &self.lists.review)
    }

    /// Status in the check-in list and a parseable check-in date inside
    /// the active window.
    pub fn is_checkin(&self, row: &CandidateRow) -> bool {
        if self.lists.checkin.is_empty() {
            return false;
        }
        if !matches_status_list(&row.status, &self.lists.checkin) {
            return false;
        }
        match self.snooze_date(row) {
            Some(date) => self.window.admits(date, self.today),
            None => false,
        }
    }

    /// Status in the tenure list, a start date on record, and a check-in
    /// that is absent, unparseable, or already past. Unparseable fails
    /// open: a row with a garbled snooze should resurface, not vanish.
    pub fn is_tenure(&self, row: &CandidateRow) -> bool {
        if self.lists.tenure.is_empty() {
            return false;
        }
        if !matches_status_list(&row.status, &self.lists.tenure) {
            return false;
        }
        if row.start_date.as_deref().unwrap_or("").is_empty() {
            return false;
        }
        let Some(value) = row.snooze_value(&self.snooze_field) else {
            return true;
        };
        if !is_truthy(value) {
            return true;
        }
        match value_to_date(value) {
            Some(date) => date < self.today,
            None => true,
        }
    }

    /// The row's check-in column as a calendar date, when it parses.
    pub fn snooze_date(&self, row: &CandidateRow) -> Option<NaiveDate> {
        row.snooze_value(&self.snooze_field).and_then(value_to_date)
    }
}

fn value_to_date(value: &Value) -> Option<NaiveDate> {
    value.as_str().and_then(parse_flexible_date)
}

/// Comparator for the Review and Check-in views: parseable check-in dates
/// ascending, dated rows before dateless ones, dateless rows equal so a
/// stable sort preserves their fetch order.
pub fn sort_by_checkin_ascending(
    a: &CandidateRow,
    b: &CandidateRow,
    snooze_field: &str,
) -> Ordering {
    let a_date = a.snooze_value(snooze_field).and_then(value_to_date);
    let b_date = b.snooze_value(snooze_field).and_then(value_to_date);
    match (a_date, b_date) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Rank of a status within the active list: its exact position, else the
/// position of the first entry it extends as a prefix, else unranked.
pub fn active_rank(status: &str, active: &StatusList) -> usize {
    let normalized = normalize_status(status);
    if let Some(position) = active.entries().iter().position(|e| *e == normalized) {
        return position;
    }
    active
        .entries()
        .iter()
        .position(|e| normalized.starts_with(e.as_str()))
        .unwrap_or(usize::MAX)
}

/// Active-view ordering: status rank first, then name, case-insensitive
/// with a raw tiebreak. Unranked statuses sort last.
pub fn compare_active(a: &CandidateRow, b: &CandidateRow, active: &StatusList) -> Ordering {
    active_rank(&a.status, active)
        .cmp(&active_rank(&b.status, active))
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}

/// Search results live beside the main row set. An empty `term` means
/// "never searched", which projects to an empty table; that is distinct
/// from a search that ran and found nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub term: String,
    pub rows: Vec<CandidateRow>,
}

impl SearchState {
    pub fn clear(&mut self) {
        self.term.clear();
        self.rows.clear();
    }
}

/// One assembled view: the ordered rows to show and the column names to
/// show them under.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection<'a> {
    pub rows: Vec<&'a CandidateRow>,
    pub columns: Vec<String>,
}

const PIPELINE_COLUMNS: [&str; 8] = [
    "name",
    "status",
    "link",
    "current_company",
    "current_role",
    "roles",
    "loc",
    "notes",
];

const TENURE_COLUMNS: [&str; 7] = [
    "name",
    "current_company",
    "current_role",
    "start_date",
    "started_at",
    "loc",
    "link",
];

/// Assemble one of the five views from the full fetched row set. Column
/// presence is judged against the full set, not the filtered view, so a
/// column shows whenever the backend schema currently provides it.
pub fn project<'a>(
    rows: &'a [CandidateRow],
    search: &'a SearchState,
    view: ViewKind,
    classifier: &Classifier,
) -> Projection<'a> {
    let columns = match view {
        ViewKind::Search if search.term.is_empty() => Vec::new(),
        ViewKind::Tenure => present_columns(rows, &TENURE_COLUMNS, classifier.snooze_field()),
        _ => present_columns(rows, &PIPELINE_COLUMNS, classifier.snooze_field()),
    };

    let projected: Vec<&CandidateRow> = match view {
        ViewKind::Active => {
            let mut out: Vec<&CandidateRow> =
                rows.iter().filter(|row| classifier.is_active(row)).collect();
            out.sort_by(|a, b| compare_active(a, b, &classifier.lists().active));
            out
        }
        ViewKind::Review => {
            let mut out: Vec<&CandidateRow> =
                rows.iter().filter(|row| classifier.is_review(row)).collect();
            out.sort_by(|a, b| sort_by_checkin_ascending(a, b, classifier.snooze_field()));
            out
        }
        ViewKind::Checkin => {
            let mut out: Vec<&CandidateRow> =
                rows.iter().filter(|row| classifier.is_checkin(row)).collect();
            out.sort_by(|a, b| sort_by_checkin_ascending(a, b, classifier.snooze_field()));
            out
        }
        // Natural fetch order; no explicit sort.
        ViewKind::Tenure => rows.iter().filter(|row| classifier.is_tenure(row)).collect(),
        ViewKind::Search => {
            if search.term.is_empty() {
                Vec::new()
            } else {
                search.rows.iter().collect()
            }
        }
    };

    Projection {
        rows: projected,
        columns,
    }
}

fn present_columns(rows: &[CandidateRow], preferred: &[&str], snooze_field: &str) -> Vec<String> {
    preferred
        .iter()
        .copied()
        .chain(std::iter::once(snooze_field))
        .filter(|column| rows.iter().any(|row| row.has_column(column)))
        .map(ToString::to_string)
        .collect()
}

/// Group already-sorted Active rows under their status key for the grouped
/// display, emitted in active-list order. A row's key is the first list
/// entry its normalized status extends as a prefix; rows admitted only by
/// the substring tier fall outside every group and are not displayed.
pub fn active_groups<'a>(
    sorted: &[&'a CandidateRow],
    active: &StatusList,
) -> Vec<(String, Vec<&'a CandidateRow>)> {
    active
        .entries()
        .iter()
        .filter_map(|entry| {
            let members: Vec<&CandidateRow> = sorted
                .iter()
                .copied()
                .filter(|row| {
                    let normalized = normalize_status(&row.status);
                    active
                        .entries()
                        .iter()
                        .find(|e| normalized.starts_with(e.as_str()))
                        .is_some_and(|key| key == entry)
                })
                .collect();
            if members.is_empty() {
                None
            } else {
                Some((entry.clone(), members))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpt_core::RowPatch;
    use serde_json::json;

    const SNOOZE: &str = "check_in";

    fn row(status: &str, checkin: Option<&str>, start_date: Option<&str>) -> CandidateRow {
        let mut row = CandidateRow {
            name: "Ada".into(),
            link: "https://example.com/ada".into(),
            status: status.into(),
            start_date: start_date.map(ToString::to_string),
            ..Default::default()
        };
        if let Some(value) = checkin {
            row.apply_patch(&RowPatch::new(SNOOZE, value));
        }
        row
    }

    fn named(name: &str, status: &str) -> CandidateRow {
        CandidateRow {
            name: name.into(),
            status: status.into(),
            ..Default::default()
        }
    }

    fn lists() -> StatusLists {
        StatusLists {
            active: StatusList::new([
                "connecting",
                "connected",
                "developing",
                "interviewing",
                "work trial",
                "closing",
            ]),
            review: StatusList::new(["backburner", "cold"]),
            checkin: StatusList::new(["backburner", "cold"]),
            tenure: StatusList::new(["backburner", "cold"]),
        }
    }

    fn classifier_at(today: &str) -> Classifier {
        Classifier::new(
            lists(),
            SNOOZE,
            CheckinWindow::AroundToday { days: 30 },
            NaiveDate::parse_from_str(today, "%Y-%m-%d").unwrap(),
        )
    }

    #[test]
    fn normalize_handles_data_entry_noise() {
        assert_eq!(normalize_status("  Cold\u{a0}\u{a0}Revisit  "), "cold revisit");
        assert_eq!(normalize_status("\u{201c}Interviewing\u{201d}"), "interviewing");
        assert_eq!(normalize_status("'work trial'"), "work trial");
        assert_eq!(normalize_status("Developing;"), "developing");
        assert_eq!(normalize_status(""), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in [
            "  Cold\u{a0}- revisit Q3. ",
            "\u{2018}Connecting\u{2019}",
            "WORK   TRIAL,",
            "done",
            "",
        ] {
            let once = normalize_status(raw);
            assert_eq!(normalize_status(&once), once, "input {raw:?}");
        }
    }

    #[test]
    fn flexible_dates_accept_human_phrases() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        assert_eq!(parse_flexible_date("2025-03-03"), Some(expected));
        assert_eq!(parse_flexible_date("Tuesday, March 3rd, 2025"), Some(expected));
        assert_eq!(parse_flexible_date("March 3, 2025"), Some(expected));
        assert_eq!(parse_flexible_date("2025-03-03T08:30:00Z"), Some(expected));
        assert_eq!(parse_flexible_date("03/03/2025"), Some(expected));
        assert_eq!(parse_flexible_date("soonish"), None);
        assert_eq!(parse_flexible_date(""), None);
    }

    #[test]
    fn status_matching_has_three_tiers() {
        let cold = StatusList::new(["cold"]);
        // exact
        assert!(matches_status_list("Cold", &cold));
        // prefix
        assert!(matches_status_list("cold outreach", &cold));
        // substring over the cleaned form
        assert!(matches_status_list("Cold - revisit Q3.", &cold));
        assert!(matches_status_list("\"very cold\"", &cold));
        assert!(!matches_status_list("warm", &cold));
    }

    #[test]
    fn empty_list_is_an_open_list() {
        let open = StatusList::new(Vec::<String>::new());
        assert!(matches_status_list("anything at all", &open));
        assert!(matches_status_list("", &open));
    }

    #[test]
    fn guarded_views_go_dark_when_their_list_empties() {
        let mut lists = lists();
        lists.review = StatusList::default();
        lists.checkin = StatusList::default();
        lists.tenure = StatusList::default();
        let classifier = Classifier::new(
            lists,
            SNOOZE,
            CheckinWindow::AroundToday { days: 30 },
            NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
        );
        let candidate = row("cold", Some("2025-06-20"), Some("2024-01-01"));
        assert!(!classifier.is_review(&candidate));
        assert!(!classifier.is_checkin(&candidate));
        assert!(!classifier.is_tenure(&candidate));
        // the one unguarded view: an empty active list admits everything
        let open_active = Classifier::new(
            StatusLists::default(),
            SNOOZE,
            CheckinWindow::AroundToday { days: 30 },
            NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
        );
        assert!(open_active.is_active(&candidate));
    }

    #[test]
    fn review_needs_any_checkin_value_but_no_valid_date() {
        let classifier = classifier_at("2025-06-15");
        assert!(classifier.is_review(&row("cold", Some("whenever"), None)));
        assert!(!classifier.is_review(&row("cold", None, None)));
        assert!(!classifier.is_review(&row("cold", Some(""), None)));
        assert!(!classifier.is_review(&row("interviewing", Some("2025-06-20"), None)));
    }

    #[test]
    fn checkin_window_is_inclusive_around_today() {
        let classifier = classifier_at("2025-06-15");
        assert!(classifier.is_checkin(&row("cold", Some("2025-06-20"), None)));
        assert!(classifier.is_checkin(&row("cold", Some("2025-05-16"), None)));
        assert!(classifier.is_checkin(&row("cold", Some("2025-07-15"), None)));
        assert!(!classifier.is_checkin(&row("cold", Some("2025-07-20"), None)));
        assert!(!classifier.is_checkin(&row("cold", Some("2025-05-15"), None)));
        assert!(!classifier.is_checkin(&row("cold", Some("not a date"), None)));
        assert!(!classifier.is_checkin(&row("cold", None, None)));
    }

    #[test]
    fn debug_month_overrides_the_window() {
        let window = CheckinWindow::from_config(30, Some("2025-03"));
        let classifier = Classifier::new(
            lists(),
            SNOOZE,
            window,
            NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
        );
        assert!(classifier.is_checkin(&row("cold", Some("2025-03-31"), None)));
        assert!(!classifier.is_checkin(&row("cold", Some("2025-04-01"), None)));

        // a malformed override admits nothing instead of falling back
        let broken = CheckinWindow::from_config(30, Some("march"));
        let classifier = Classifier::new(
            lists(),
            SNOOZE,
            broken,
            NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
        );
        assert!(!classifier.is_checkin(&row("cold", Some("2025-06-15"), None)));
    }

    #[test]
    fn tenure_surfaces_expired_snoozes_and_fails_open() {
        let classifier = classifier_at("2025-06-15");
        // past snooze: surfaced
        assert!(classifier.is_tenure(&row("cold", Some("2025-01-01"), Some("2024-01-01"))));
        // future snooze: still sleeping
        assert!(!classifier.is_tenure(&row("cold", Some("2026-01-01"), Some("2024-01-01"))));
        // no snooze at all: surfaced
        assert!(classifier.is_tenure(&row("cold", None, Some("2024-01-01"))));
        // unparseable snooze: fail open, surfaced
        assert!(classifier.is_tenure(&row("cold", Some("ask again later"), Some("2024-01-01"))));
        // no start date: never tenure
        assert!(!classifier.is_tenure(&row("cold", Some("2025-01-01"), None)));
    }

    #[test]
    fn membership_overlap_follows_the_configured_lists() {
        let classifier = classifier_at("2025-06-15");
        // active list is disjoint from the others: an active row is nothing else
        let active = row("interviewing", Some("2025-06-20"), Some("2024-01-01"));
        assert!(classifier.is_active(&active));
        assert!(!classifier.is_review(&active));
        assert!(!classifier.is_checkin(&active));
        assert!(!classifier.is_tenure(&active));
        // review and checkin share their lists, so both may hold at once
        let snoozed = row("cold", Some("2025-06-20"), None);
        assert!(classifier.is_review(&snoozed));
        assert!(classifier.is_checkin(&snoozed));
        assert!(!classifier.is_active(&snoozed));
    }

    #[test]
    fn checkin_sort_is_ascending_with_dateless_rows_last() {
        let mut rows = vec![
            row("cold", None, None),
            row("cold", Some("2025-07-01"), None),
            row("cold", Some("2025-06-01"), None),
        ];
        rows.sort_by(|a, b| sort_by_checkin_ascending(a, b, SNOOZE));
        let dates: Vec<Option<&Value>> = rows.iter().map(|r| r.snooze_value(SNOOZE)).collect();
        assert_eq!(dates[0], Some(&json!("2025-06-01")));
        assert_eq!(dates[1], Some(&json!("2025-07-01")));
        assert_eq!(dates[2], None);
    }

    #[test]
    fn checkin_sort_is_stable_for_dateless_rows() {
        let mut first = row("cold", Some("not a date"), None);
        first.name = "First".into();
        let mut second = row("cold", None, None);
        second.name = "Second".into();
        let mut rows = vec![first, second];
        rows.sort_by(|a, b| sort_by_checkin_ascending(a, b, SNOOZE));
        assert_eq!(rows[0].name, "First");
        assert_eq!(rows[1].name, "Second");
    }

    #[test]
    fn active_ordering_ranks_by_list_position_then_name() {
        let active = lists().active;
        let mut rows = vec![
            named("Zo", "closing"),
            named("Ada", "interviewing"),
            named("bea", "Interviewing"),
            named("Max", "on sabbatical"),
            // prefix fallback: ranks with "connecting"
            named("Kim", "connecting - warm intro"),
        ];
        rows.sort_by(|a, b| compare_active(a, b, &active));
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Kim", "Ada", "bea", "Zo", "Max"]);
    }

    #[test]
    fn projection_filters_columns_to_schema_presence() {
        let classifier = classifier_at("2025-06-15");
        let rows = vec![
            row("interviewing", Some("2025-06-20"), None),
            named("Bea", "connecting"),
        ];
        let search = SearchState::default();
        let projection = project(&rows, &search, ViewKind::Active, &classifier);
        // current_company etc. never appeared in a fetched row
        assert_eq!(
            projection.columns,
            ["name", "status", "link", "check_in"]
        );
        assert_eq!(projection.rows.len(), 2);
    }

    #[test]
    fn tenure_projection_uses_its_own_column_order() {
        let classifier = classifier_at("2025-06-15");
        let rows = vec![row("cold", Some("2025-01-01"), Some("2024-01-01"))];
        let search = SearchState::default();
        let projection = project(&rows, &search, ViewKind::Tenure, &classifier);
        assert_eq!(
            projection.columns,
            ["name", "start_date", "link", "check_in"]
        );
        assert_eq!(projection.rows.len(), 1);
    }

    #[test]
    fn search_projection_distinguishes_never_searched_from_no_hits() {
        let classifier = classifier_at("2025-06-15");
        let rows = vec![named("Ada", "interviewing")];

        let never = SearchState::default();
        let projection = project(&rows, &never, ViewKind::Search, &classifier);
        assert!(projection.rows.is_empty());
        assert!(projection.columns.is_empty());

        let no_hits = SearchState {
            term: "nobody".into(),
            rows: Vec::new(),
        };
        let projection = project(&rows, &no_hits, ViewKind::Search, &classifier);
        assert!(projection.rows.is_empty());
        assert!(!projection.columns.is_empty());

        let hits = SearchState {
            term: "ada".into(),
            rows: vec![named("Ada", "interviewing")],
        };
        let projection = project(&rows, &hits, ViewKind::Search, &classifier);
        assert_eq!(projection.rows.len(), 1);
    }

    #[test]
    fn active_groups_follow_list_order_and_skip_empty_groups() {
        let classifier = classifier_at("2025-06-15");
        let rows = vec![
            named("Zo", "closing"),
            named("Ada", "interviewing"),
            named("Kim", "connecting - warm intro"),
        ];
        let search = SearchState::default();
        let projection = project(&rows, &search, ViewKind::Active, &classifier);
        let groups = active_groups(&projection.rows, &classifier.lists().active);
        let keys: Vec<&str> = groups.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["connecting", "interviewing", "closing"]);
        assert_eq!(groups[0].1[0].name, "Kim");
    }
}
