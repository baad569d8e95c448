use std::borrow::Cow;
use std::collections::HashMap;

use chrono::NaiveDate;

use crate::model::{BookingRecord, PropertyRecord};

use super::dates::parse_date;
use super::params::{DateFilter, QueryParams};
use super::stats::payment_status_or_pending;

/// The one case-folding rule every text comparison goes through.
pub(crate) fn fold(s: &str) -> String {
    s.to_lowercase()
}

/// `propertyId` → display name lookup, built once per query.
pub struct PropertyNames<'a> {
    by_id: HashMap<i64, &'a str>,
}

impl<'a> PropertyNames<'a> {
    pub fn new(properties: &'a [PropertyRecord]) -> Self {
        Self {
            by_id: properties.iter().map(|p| (p.id, p.name.as_str())).collect(),
        }
    }

    /// `Unassigned` without an id, `Property #<id>` when the id resolves to nothing.
    pub fn display(&self, property_id: Option<i64>) -> Cow<'a, str> {
        let Some(id) = property_id else {
            return Cow::Borrowed("Unassigned");
        };
        match self.by_id.get(&id) {
            Some(name) if !name.is_empty() => Cow::Borrowed(*name),
            _ => Cow::Owned(format!("Property #{id}")),
        }
    }
}

pub fn property_display_name(property_id: Option<i64>, properties: &[PropertyRecord]) -> String {
    PropertyNames::new(properties).display(property_id).into_owned()
}

/// One filtering step. Text operands are folded when the stage is built.
#[derive(Debug, Clone, PartialEq)]
enum Stage {
    Search(String),
    Status(String),
    Payment(String),
    Property(String),
    Source(String),
    Dates(DateFilter),
    Tab(String),
}

impl Stage {
    fn admits(&self, record: &BookingRecord, names: &PropertyNames<'_>, today: NaiveDate) -> bool {
        match self {
            Stage::Search(needle) => {
                let hit = |field: Option<&str>| field.is_some_and(|v| fold(v).contains(needle.as_str()));
                hit(record.guest_name.as_deref())
                    || hit(record.guest_email.as_deref())
                    || hit(record.booking_reference.as_deref())
                    || fold(&names.display(record.property_id)).contains(needle.as_str())
            }
            Stage::Status(wanted) | Stage::Tab(wanted) => {
                record.status.as_deref().is_some_and(|s| fold(s) == *wanted)
            }
            Stage::Payment(wanted) => payment_status_or_pending(record.payment_status.as_deref()) == *wanted,
            Stage::Property(wanted) => record.property_id.is_some_and(|id| id.to_string() == *wanted),
            Stage::Source(wanted) => record.source == *wanted,
            Stage::Dates(filter) => {
                filter.admits(parse_date(&record.check_in), parse_date(&record.check_out), today)
            }
        }
    }
}

/// The active filters of a query, in evaluation order.
#[derive(Debug, Clone)]
pub struct FilterChain {
    stages: Vec<Stage>,
    today: NaiveDate,
}

impl FilterChain {
    pub fn new(params: &QueryParams, today: NaiveDate) -> Self {
        let mut stages = Vec::new();
        if let Some(s) = &params.search {
            stages.push(Stage::Search(fold(s)));
        }
        if let Some(s) = &params.status {
            stages.push(Stage::Status(fold(s)));
        }
        if let Some(p) = &params.payment_status {
            stages.push(Stage::Payment(fold(p)));
        }
        if let Some(p) = &params.property_id {
            stages.push(Stage::Property(p.trim().to_string()));
        }
        if let Some(s) = &params.source {
            stages.push(Stage::Source(s.clone()));
        }
        if params.dates != DateFilter::All {
            stages.push(Stage::Dates(params.dates));
        }
        if let Some(t) = &params.tab {
            stages.push(Stage::Tab(fold(t)));
        }
        Self { stages, today }
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Logical AND of every stage, short-circuiting in order.
    pub fn admits(&self, record: &BookingRecord, names: &PropertyNames<'_>) -> bool {
        self.stages.iter().all(|stage| stage.admits(record, names, self.today))
    }
}
