use chrono::NaiveDate;

use super::dates::week_end;

/// Which stays to keep relative to today.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateFilter {
    #[default]
    All,
    Today,
    Upcoming,
    Past,
    ThisWeek,
}

impl DateFilter {
    /// Unknown names mean no date filtering.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "today" => DateFilter::Today,
            "upcoming" => DateFilter::Upcoming,
            "past" => DateFilter::Past,
            "this-week" | "this_week" | "week" => DateFilter::ThisWeek,
            _ => DateFilter::All,
        }
    }

    /// Each filter reads only the date it needs; an unreadable one fails that comparison.
    pub fn admits(self, check_in: Option<NaiveDate>, check_out: Option<NaiveDate>, today: NaiveDate) -> bool {
        match self {
            DateFilter::All => true,
            DateFilter::Today => {
                check_in == Some(today)
                    || check_out == Some(today)
                    || matches!((check_in, check_out), (Some(ci), Some(co)) if ci < today && today < co)
            }
            DateFilter::Upcoming => check_in.is_some_and(|ci| ci > today),
            DateFilter::Past => check_out.is_some_and(|co| co < today),
            DateFilter::ThisWeek => check_in
                .is_some_and(|ci| ci >= today && week_end(today).is_some_and(|end| ci < end)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CheckIn,
    CheckOut,
    GuestName,
    TotalAmount,
    CreatedAt,
    Id,
}

impl SortField {
    /// Accepts camelCase and snake_case names. Anything unknown sorts by id.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().replace('_', "").as_str() {
            "checkin" => SortField::CheckIn,
            "checkout" => SortField::CheckOut,
            "guestname" => SortField::GuestName,
            "totalamount" => SortField::TotalAmount,
            "createdat" => SortField::CreatedAt,
            _ => SortField::Id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    /// Newest check-ins first.
    fn default() -> Self {
        Self {
            field: SortField::CheckIn,
            direction: SortDirection::Desc,
        }
    }
}

impl SortSpec {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Column-header click: same field flips direction, a new field starts descending.
    pub fn toggle(self, field: SortField) -> Self {
        if self.field == field {
            Self::new(field, self.direction.flipped())
        } else {
            Self::new(field, SortDirection::Desc)
        }
    }
}

/// Filter, sort and paging parameters. `None` means "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub search: Option<String>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub property_id: Option<String>,
    pub source: Option<String>,
    pub dates: DateFilter,
    pub tab: Option<String>,
    pub sort: SortSpec,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// Empty values and the `all` sentinel disable a filter.
pub fn filter_value(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    if raw.is_empty() || raw.trim().eq_ignore_ascii_case("all") {
        None
    } else {
        Some(raw.to_string())
    }
}

impl QueryParams {
    pub fn with_search(mut self, text: &str) -> Self {
        self.search = filter_value(Some(text));
        self
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = filter_value(Some(status));
        self
    }

    pub fn with_payment_status(mut self, payment_status: &str) -> Self {
        self.payment_status = filter_value(Some(payment_status));
        self
    }

    pub fn with_property(mut self, property_id: &str) -> Self {
        self.property_id = filter_value(Some(property_id));
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = filter_value(Some(source));
        self
    }

    pub fn with_dates(mut self, dates: DateFilter) -> Self {
        self.dates = dates;
        self
    }

    pub fn with_tab(mut self, tab: &str) -> Self {
        self.tab = filter_value(Some(tab));
        self
    }

    pub fn sorted_by(mut self, field: SortField, direction: SortDirection) -> Self {
        self.sort = SortSpec::new(field, direction);
        self
    }

    pub fn paged(mut self, limit: Option<usize>, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    /// True when nothing narrows the record set.
    pub fn is_unfiltered(&self) -> bool {
        self.search.is_none()
            && self.status.is_none()
            && self.payment_status.is_none()
            && self.property_id.is_none()
            && self.source.is_none()
            && self.dates == DateFilter::All
            && self.tab.is_none()
    }
}
