use serde::{Deserialize, Deserializer, Serialize};

/// Unix milliseconds.
pub type Ms = i64;

/// A booking as the backend serves it. Every field except `id` may be missing or malformed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    pub id: i64,
    #[serde(default, deserialize_with = "lenient_id")]
    pub property_id: Option<i64>,
    #[serde(default)]
    pub guest_name: Option<String>,
    #[serde(default)]
    pub guest_email: Option<String>,
    #[serde(default)]
    pub booking_reference: Option<String>,
    /// ISO-8601 date; `check_out > check_in` is assumed, never checked.
    #[serde(default)]
    pub check_in: String,
    #[serde(default)]
    pub check_out: String,
    /// Decimal as text.
    #[serde(default, deserialize_with = "lenient_text")]
    pub total_amount: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub amount_due: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl BookingRecord {
    /// Whole nights between check-in and check-out, rounded up. 0 when either date is unreadable.
    pub fn nights(&self) -> i64 {
        crate::engine::nights_between(&self.check_in, &self.check_out)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

/// Accepts a string, a number, or null for a decimal-as-text field.
fn lenient_text<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(de)? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Accepts an integer, a numeric string, or null. Anything else reads as unassigned.
fn lenient_id<'de, D>(de: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(de)? {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

// ── Query result types ───────────────────────────────────────────

/// Summary figures over the full, unfiltered record set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingStats {
    pub total_bookings: usize,
    pub confirmed_bookings: usize,
    pub pending_bookings: usize,
    pub checked_in_bookings: usize,
    pub total_revenue: f64,
    pub paid_revenue: f64,
    pub pending_payments: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutcome {
    /// Filtered, sorted and paged records.
    pub view: Vec<BookingRecord>,
    /// Records that passed every filter, before paging.
    pub matched: usize,
    pub stats: BookingStats,
}
