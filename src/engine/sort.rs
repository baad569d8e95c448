use std::cmp::Ordering;

use crate::model::BookingRecord;

use super::dates::parse_timestamp_ms;
use super::filter::fold;
use super::params::{SortDirection, SortField, SortSpec};
use super::stats::amount_or_zero;

pub type Comparator = fn(&BookingRecord, &BookingRecord) -> Ordering;

/// Ascending comparator per sortable field. Adding a field means adding a row.
const COMPARATORS: &[(SortField, Comparator)] = &[
    (SortField::CheckIn, by_check_in),
    (SortField::CheckOut, by_check_out),
    (SortField::GuestName, by_guest_name),
    (SortField::TotalAmount, by_total_amount),
    (SortField::CreatedAt, by_created_at),
    (SortField::Id, by_id),
];

pub fn comparator(field: SortField) -> Comparator {
    COMPARATORS
        .iter()
        .find(|(f, _)| *f == field)
        .map_or(by_id as Comparator, |(_, cmp)| *cmp)
}

/// Stable in both directions: ties keep their input order.
pub fn sort_view(view: &mut [BookingRecord], order: SortSpec) {
    let cmp = comparator(order.field);
    match order.direction {
        SortDirection::Asc => view.sort_by(cmp),
        SortDirection::Desc => view.sort_by(|a, b| cmp(b, a)),
    }
}

// Unreadable timestamps are `None`, which orders before every real instant.

fn by_check_in(a: &BookingRecord, b: &BookingRecord) -> Ordering {
    parse_timestamp_ms(&a.check_in).cmp(&parse_timestamp_ms(&b.check_in))
}

fn by_check_out(a: &BookingRecord, b: &BookingRecord) -> Ordering {
    parse_timestamp_ms(&a.check_out).cmp(&parse_timestamp_ms(&b.check_out))
}

fn by_guest_name(a: &BookingRecord, b: &BookingRecord) -> Ordering {
    fold(a.guest_name.as_deref().unwrap_or("")).cmp(&fold(b.guest_name.as_deref().unwrap_or("")))
}

fn by_total_amount(a: &BookingRecord, b: &BookingRecord) -> Ordering {
    amount_or_zero(a.total_amount.as_deref()).total_cmp(&amount_or_zero(b.total_amount.as_deref()))
}

/// Missing `created_at` is the epoch.
fn by_created_at(a: &BookingRecord, b: &BookingRecord) -> Ordering {
    let key = |r: &BookingRecord| r.created_at.as_deref().map_or(Some(0), parse_timestamp_ms);
    key(a).cmp(&key(b))
}

fn by_id(a: &BookingRecord, b: &BookingRecord) -> Ordering {
    a.id.cmp(&b.id)
}
