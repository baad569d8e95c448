use crate::model::{BookingRecord, BookingStats};

use super::filter::fold;

/// Policy knobs for what the summary figures count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsPolicy {
    /// Leave cancelled bookings out of `pending_payments`. Off by default.
    pub exclude_cancelled_from_pending: bool,
}

/// Display class of a booking status. Unknown values render as `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Pending,
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

impl StatusKind {
    pub fn classify(raw: Option<&str>) -> Self {
        match raw.map(fold).as_deref() {
            Some("confirmed") => StatusKind::Confirmed,
            Some("checked-in") => StatusKind::CheckedIn,
            Some("checked-out") => StatusKind::CheckedOut,
            Some("cancelled") => StatusKind::Cancelled,
            _ => StatusKind::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentKind {
    Paid,
    Pending,
    Partial,
    Overdue,
}

impl PaymentKind {
    pub fn classify(raw: Option<&str>) -> Self {
        match payment_status_or_pending(raw).as_str() {
            "paid" => PaymentKind::Paid,
            "partial" => PaymentKind::Partial,
            "overdue" => PaymentKind::Overdue,
            _ => PaymentKind::Pending,
        }
    }
}

/// A decimal-as-text amount. Missing, unreadable and non-finite values are 0.
pub fn amount_or_zero(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Lower-cased payment status; missing or blank means `pending`.
pub fn payment_status_or_pending(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(s) if !s.is_empty() => fold(s),
        _ => "pending".to_string(),
    }
}

/// What is still owed: `amount_due` when given, else `total_amount`, else 0.
pub fn outstanding_amount(record: &BookingRecord) -> f64 {
    fn present(v: &Option<String>) -> Option<&str> {
        v.as_deref().filter(|s| !s.trim().is_empty())
    }
    amount_or_zero(present(&record.amount_due).or_else(|| present(&record.total_amount)))
}

/// Leading letter upper-cased, the rest untouched.
pub fn display_label(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn status_label(raw: Option<&str>) -> String {
    display_label(raw.unwrap_or(""))
}

pub fn payment_label(raw: Option<&str>) -> String {
    match raw.filter(|s| !s.is_empty()) {
        Some(s) => display_label(s),
        None => "Pending".to_string(),
    }
}

pub fn source_label(source: &str) -> &'static str {
    if source == "HOSTAWAY" { "Hostaway" } else { "Local" }
}

/// Single pass over every record, ignoring any filters.
pub fn aggregate(records: &[BookingRecord], policy: &StatsPolicy) -> BookingStats {
    let mut stats = BookingStats {
        total_bookings: records.len(),
        ..Default::default()
    };

    for record in records {
        let status = record.status.as_deref().map(fold);
        match status.as_deref() {
            Some("confirmed") => stats.confirmed_bookings += 1,
            Some("pending") => stats.pending_bookings += 1,
            Some("checked-in") => stats.checked_in_bookings += 1,
            _ => {}
        }

        let total = amount_or_zero(record.total_amount.as_deref());
        stats.total_revenue += total;

        if payment_status_or_pending(record.payment_status.as_deref()) == "paid" {
            stats.paid_revenue += total;
        } else if !(policy.exclude_cancelled_from_pending && status.as_deref() == Some("cancelled")) {
            stats.pending_payments += outstanding_amount(record);
        }
    }

    stats
}
