//! Complaint analytics: monthly and weekly buckets, status and type breakdowns

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::*;
use crate::timestamp::parse_timestamp;

pub const RANGE_ERROR: &str = "Start date must be on or before end date";

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const WEEKS_PER_MONTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportView {
    Monthly,
    Weekly,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsQuery {
    /// Restrict the monthly view to one calendar year.
    pub year: Option<i32>,
    /// Inclusive range for the monthly view. The weekly view ignores it.
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Any day of the month the weekly view covers.
    pub reference: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketReport {
    pub view: ReportView,
    pub labels: Vec<String>,
    pub counts: Vec<usize>,
    pub error: Option<String>,
}

impl BucketReport {
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

pub fn validate_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
    match (start, end) {
        (Some(s), Some(e)) if s > e => Err(Error::InvalidRange(RANGE_ERROR.to_string())),
        _ => Ok(()),
    }
}

/// Week 1..=4 of the month; days 29-31 fold into week 4.
pub fn week_of_month(day: u32) -> usize {
    (((day.max(1) - 1) / 7) as usize + 1).min(WEEKS_PER_MONTH)
}

fn complaint_dates(complaints: &[Complaint]) -> impl Iterator<Item = NaiveDate> + '_ {
    complaints.iter().filter_map(|c| match parse_timestamp(&c.timestamp) {
        Some(at) => Some(at.date()),
        None => {
            log::debug!("Complaint {} has unparseable timestamp {:?}", c.id, c.timestamp);
            None
        }
    })
}

/// Twelve month buckets, optionally restricted to a year and clipped to an
/// inclusive date range.
pub fn monthly_counts(complaints: &[Complaint], query: &AnalyticsQuery) -> Result<[usize; 12]> {
    validate_range(query.start, query.end)?;

    let mut counts = [0usize; 12];
    for date in complaint_dates(complaints) {
        if query.year.is_some_and(|y| date.year() != y) {
            continue;
        }
        if query.start.is_some_and(|s| date < s) || query.end.is_some_and(|e| date > e) {
            continue;
        }
        counts[date.month0() as usize] += 1;
    }
    Ok(counts)
}

/// Four week-of-month buckets for the month containing `reference`.
pub fn weekly_counts(complaints: &[Complaint], reference: NaiveDate) -> [usize; WEEKS_PER_MONTH] {
    let mut counts = [0usize; WEEKS_PER_MONTH];
    for date in complaint_dates(complaints) {
        if date.year() == reference.year() && date.month() == reference.month() {
            counts[week_of_month(date.day()) - 1] += 1;
        }
    }
    counts
}

pub fn monthly_report(complaints: &[Complaint], query: &AnalyticsQuery) -> BucketReport {
    let labels = MONTH_LABELS.iter().map(|l| l.to_string()).collect();
    match monthly_counts(complaints, query) {
        Ok(counts) => BucketReport {
            view: ReportView::Monthly,
            labels,
            counts: counts.to_vec(),
            error: None,
        },
        Err(e) => {
            log::debug!("Monthly report rejected: {}", e);
            BucketReport {
                view: ReportView::Monthly,
                labels,
                counts: vec![0; 12],
                error: Some(RANGE_ERROR.to_string()),
            }
        }
    }
}

pub fn weekly_report(complaints: &[Complaint], reference: NaiveDate) -> BucketReport {
    BucketReport {
        view: ReportView::Weekly,
        labels: (1..=WEEKS_PER_MONTH).map(|w| format!("Week {}", w)).collect(),
        counts: weekly_counts(complaints, reference).to_vec(),
        error: None,
    }
}

/// Report for the selected view. `today` supplies the year of a monthly
/// report given neither a year nor a range, and a missing weekly reference.
pub fn report(
    view: ReportView,
    complaints: &[Complaint],
    query: &AnalyticsQuery,
    today: NaiveDate,
) -> BucketReport {
    match view {
        ReportView::Monthly => {
            let mut query = query.clone();
            if query.year.is_none() && query.start.is_none() && query.end.is_none() {
                query.year = Some(today.year());
            }
            monthly_report(complaints, &query)
        }
        ReportView::Weekly => weekly_report(complaints, query.reference.unwrap_or(today)),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBreakdown {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub resolved: usize,
    pub urgent: usize,
}

pub fn status_breakdown(complaints: &[Complaint]) -> StatusBreakdown {
    let mut breakdown = StatusBreakdown::default();
    for complaint in complaints {
        breakdown.total += 1;
        match complaint.status {
            ComplaintStatus::Pending => breakdown.pending += 1,
            ComplaintStatus::InProgress => breakdown.in_progress += 1,
            ComplaintStatus::Resolved => breakdown.resolved += 1,
        }
        if complaint.urgency == Urgency::Urgent {
            breakdown.urgent += 1;
        }
    }
    breakdown
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub complaint_type: String,
    pub count: usize,
}

/// Complaint counts per type, most frequent first.
pub fn type_breakdown(complaints: &[Complaint]) -> Vec<TypeCount> {
    let mut counts: Vec<TypeCount> = Vec::new();
    for complaint in complaints {
        let label = complaint.complaint_type.trim();
        let label = if label.is_empty() { "Other" } else { label };
        match counts.iter_mut().find(|t| t.complaint_type.eq_ignore_ascii_case(label)) {
            Some(entry) => entry.count += 1,
            None => counts.push(TypeCount {
                complaint_type: label.to_string(),
                count: 1,
            }),
        }
    }
    counts.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.complaint_type.cmp(&b.complaint_type))
    });
    counts
}
