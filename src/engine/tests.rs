use super::*;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn ctx(today: NaiveDate) -> QueryContext {
    QueryContext {
        today,
        policy: StatsPolicy::default(),
    }
}

/// The two bookings used throughout the worked scenarios.
fn scenario_records() -> Vec<BookingRecord> {
    vec![
        BookingRecord {
            id: 1,
            status: Some("confirmed".into()),
            total_amount: Some("100".into()),
            payment_status: Some("paid".into()),
            check_in: "2024-01-10".into(),
            check_out: "2024-01-12".into(),
            ..Default::default()
        },
        BookingRecord {
            id: 2,
            status: Some("pending".into()),
            total_amount: Some("50".into()),
            payment_status: Some("pending".into()),
            check_in: "2024-02-01".into(),
            check_out: "2024-02-03".into(),
            ..Default::default()
        },
    ]
}

/// A spread of records: every status, payment state, source, and some bad data.
fn mixed_records() -> Vec<BookingRecord> {
    let statuses = ["pending", "Confirmed", "checked-in", "checked-out", "cancelled", "on-hold"];
    let payments = [Some("paid"), Some("PENDING"), Some("partial"), Some("overdue"), None];
    let amounts = [Some("120.50"), Some("abc"), None, Some("80"), Some("0"), Some("1000")];
    let dates = [
        ("2024-05-10", "2024-05-12"),
        ("2024-05-01", "2024-05-05"),
        ("2024-05-08", "2024-05-11"),
        ("2024-05-14", "2024-05-20"),
        ("2024-06-01", "2024-06-03"),
        ("not-a-date", "2024-05-12"),
        ("2024-05-09", "2024-05-10"),
    ];
    (0..42)
        .map(|i| {
            let (check_in, check_out) = dates[i % dates.len()];
            BookingRecord {
                id: i as i64 + 1,
                property_id: if i % 4 == 0 { None } else { Some((i % 3) as i64 + 1) },
                guest_name: if i % 5 == 0 { None } else { Some(format!("Guest {i}")) },
                guest_email: Some(format!("guest{i}@example.com")),
                booking_reference: Some(format!("REF-{i:04}")),
                check_in: check_in.into(),
                check_out: check_out.into(),
                total_amount: amounts[i % amounts.len()].map(String::from),
                amount_due: if i % 3 == 0 { Some("10".into()) } else { None },
                status: Some(statuses[i % statuses.len()].into()),
                payment_status: payments[i % payments.len()].map(String::from),
                source: if i % 2 == 0 { "LOCAL".into() } else { "HOSTAWAY".into() },
                created_at: if i % 7 == 0 { None } else { Some(format!("2024-04-{:02}T10:00:00Z", i % 28 + 1)) },
            }
        })
        .collect()
}

fn properties() -> Vec<PropertyRecord> {
    vec![
        PropertyRecord { id: 1, name: "Seaside Villa".into() },
        PropertyRecord { id: 2, name: "Mountain Lodge".into() },
    ]
}

fn ids(view: &[BookingRecord]) -> Vec<i64> {
    view.iter().map(|r| r.id).collect()
}

// ── Worked scenarios ─────────────────────────────────────

#[test]
fn scenario_stats() {
    let out = query_bookings_in(&ctx(day(2024, 3, 1)), &scenario_records(), &[], &QueryParams::default());
    assert_eq!(
        out.stats,
        BookingStats {
            total_bookings: 2,
            confirmed_bookings: 1,
            pending_bookings: 1,
            checked_in_bookings: 0,
            total_revenue: 150.0,
            paid_revenue: 100.0,
            pending_payments: 50.0,
        }
    );
}

#[test]
fn scenario_status_filter() {
    let params = QueryParams::default().with_status("confirmed");
    let out = query_bookings_in(&ctx(day(2024, 3, 1)), &scenario_records(), &[], &params);
    assert_eq!(ids(&out.view), vec![1]);
    assert_eq!(out.matched, 1);
    // Stats still describe everything.
    assert_eq!(out.stats.total_bookings, 2);
}

#[test]
fn scenario_sort_by_amount_ascending() {
    let params = QueryParams::default().sorted_by(SortField::TotalAmount, SortDirection::Asc);
    let out = query_bookings_in(&ctx(day(2024, 3, 1)), &scenario_records(), &[], &params);
    assert_eq!(ids(&out.view), vec![2, 1]);
}

#[test]
fn scenario_search_guest_name() {
    let records = vec![
        BookingRecord { id: 1, guest_name: Some("John Doe".into()), ..Default::default() },
        BookingRecord { id: 2, guest_name: Some("Jane Villa".into()), ..Default::default() },
    ];
    let params = QueryParams::default().with_search("villa");
    let out = query_bookings_in(&ctx(day(2024, 3, 1)), &records, &[], &params);
    assert_eq!(ids(&out.view), vec![2]);
}

#[test]
fn scenario_empty_input() {
    let out = query_bookings(&[], &[], &QueryParams::default());
    assert!(out.view.is_empty());
    assert_eq!(out.matched, 0);
    assert_eq!(out.stats, BookingStats::default());
}

#[test]
fn default_sort_is_newest_check_in_first() {
    let out = query_bookings_in(&ctx(day(2024, 3, 1)), &scenario_records(), &[], &QueryParams::default());
    assert_eq!(ids(&out.view), vec![2, 1]);
}

// ── Properties ───────────────────────────────────────────

#[test]
fn unfiltered_query_keeps_every_record() {
    let records = mixed_records();
    let out = query_bookings_in(&ctx(day(2024, 5, 10)), &records, &properties(), &QueryParams::default());
    assert_eq!(out.view.len(), records.len());
    let mut got = ids(&out.view);
    got.sort();
    let mut want = ids(&records);
    want.sort();
    assert_eq!(got, want);
}

#[test]
fn each_single_filter_partitions_the_input() {
    let today = day(2024, 5, 10);
    let records = mixed_records();
    let props = properties();
    let names = PropertyNames::new(&props);

    let cases = vec![
        QueryParams::default().with_search("guest 1"),
        QueryParams::default().with_search("seaside"),
        QueryParams::default().with_status("CONFIRMED"),
        QueryParams::default().with_status("on-hold"),
        QueryParams::default().with_payment_status("pending"),
        QueryParams::default().with_payment_status("paid"),
        QueryParams::default().with_property("2"),
        QueryParams::default().with_source("HOSTAWAY"),
        QueryParams::default().with_dates(DateFilter::Today),
        QueryParams::default().with_dates(DateFilter::Upcoming),
        QueryParams::default().with_dates(DateFilter::Past),
        QueryParams::default().with_dates(DateFilter::ThisWeek),
        QueryParams::default().with_tab("checked-in"),
    ];

    for params in cases {
        let chain = FilterChain::new(&params, today);
        let out = query_bookings_in(&ctx(today), &records, &props, &params);
        let kept: Vec<i64> = ids(&out.view);
        for r in &records {
            assert_eq!(
                kept.contains(&r.id),
                chain.admits(r, &names),
                "record {} under {params:?}",
                r.id
            );
        }
        assert!(!kept.is_empty() || params.dates != DateFilter::All, "{params:?} matched nothing");
    }
}

#[test]
fn combined_filters_are_a_conjunction() {
    let today = day(2024, 5, 10);
    let records = mixed_records();
    let props = properties();
    let a = QueryParams::default().with_source("LOCAL");
    let b = QueryParams::default().with_payment_status("paid");
    let both = QueryParams::default().with_source("LOCAL").with_payment_status("paid");

    let only_a = ids(&query_bookings_in(&ctx(today), &records, &props, &a).view);
    let only_b = ids(&query_bookings_in(&ctx(today), &records, &props, &b).view);
    let mut expected: Vec<i64> = only_a.into_iter().filter(|id| only_b.contains(id)).collect();
    let mut got = ids(&query_bookings_in(&ctx(today), &records, &props, &both).view);
    expected.sort();
    got.sort();
    assert_eq!(got, expected);
}

#[test]
fn resorting_a_sorted_view_is_identity() {
    let today = day(2024, 5, 10);
    let records = mixed_records();
    for field in [
        SortField::CheckIn,
        SortField::CheckOut,
        SortField::GuestName,
        SortField::TotalAmount,
        SortField::CreatedAt,
        SortField::Id,
    ] {
        for direction in [SortDirection::Asc, SortDirection::Desc] {
            let params = QueryParams::default().sorted_by(field, direction);
            let first = query_bookings_in(&ctx(today), &records, &properties(), &params).view;
            let second = query_bookings_in(&ctx(today), &first, &properties(), &params).view;
            assert_eq!(ids(&first), ids(&second), "{field:?} {direction:?}");
        }
    }
}

#[test]
fn sorted_views_are_ordered() {
    let records = mixed_records();
    let params = QueryParams::default().sorted_by(SortField::TotalAmount, SortDirection::Desc);
    let out = query_bookings_in(&ctx(day(2024, 5, 10)), &records, &[], &params);
    let amounts: Vec<f64> = out.view.iter().map(|r| amount_or_zero(r.total_amount.as_deref())).collect();
    assert!(amounts.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn stats_invariants() {
    let out = query_bookings_in(&ctx(day(2024, 5, 10)), &mixed_records(), &[], &QueryParams::default());
    let s = out.stats;
    assert_eq!(s.total_bookings, 42);
    assert!(s.confirmed_bookings + s.pending_bookings <= s.total_bookings);
    assert!(s.total_revenue >= s.paid_revenue);
    assert!(s.paid_revenue >= 0.0);
    assert!(s.total_revenue.is_finite() && s.pending_payments.is_finite());
}

#[test]
fn malformed_record_is_harmless() {
    let records = vec![BookingRecord {
        id: 9,
        total_amount: Some("abc".into()),
        check_in: "not-a-date".into(),
        check_out: "2024-13-40".into(),
        status: Some("confirmed".into()),
        payment_status: Some("paid".into()),
        ..Default::default()
    }];
    let today = day(2024, 5, 10);
    let out = query_bookings_in(&ctx(today), &records, &[], &QueryParams::default());
    assert_eq!(out.stats.total_revenue, 0.0);
    assert_eq!(out.stats.paid_revenue, 0.0);
    assert_eq!(out.view.len(), 1);

    for dates in [DateFilter::Today, DateFilter::Upcoming, DateFilter::Past, DateFilter::ThisWeek] {
        let params = QueryParams::default().with_dates(dates);
        let out = query_bookings_in(&ctx(today), &records, &[], &params);
        assert!(out.view.is_empty(), "{dates:?}");
    }
}

#[test]
fn one_unreadable_date_keeps_the_other_usable() {
    let today = day(2024, 5, 10);
    let records = vec![
        BookingRecord { id: 1, check_in: "2024-05-20".into(), check_out: "garbage".into(), ..Default::default() },
        BookingRecord { id: 2, check_in: "garbage".into(), check_out: "2024-05-01".into(), ..Default::default() },
        BookingRecord { id: 3, check_in: "2024-05-10".into(), check_out: "garbage".into(), ..Default::default() },
    ];
    let run = |dates| {
        let params = QueryParams::default().with_dates(dates).sorted_by(SortField::Id, SortDirection::Asc);
        ids(&query_bookings_in(&ctx(today), &records, &[], &params).view)
    };
    assert_eq!(run(DateFilter::Upcoming), vec![1]);
    assert_eq!(run(DateFilter::Past), vec![2]);
    assert_eq!(run(DateFilter::Today), vec![3]);
    assert_eq!(run(DateFilter::ThisWeek), vec![3]);
}

#[test]
fn date_filters_against_fixed_today() {
    let today = day(2024, 5, 10);
    let records = vec![
        BookingRecord { id: 1, check_in: "2024-05-10".into(), check_out: "2024-05-12".into(), ..Default::default() },
        BookingRecord { id: 2, check_in: "2024-05-08".into(), check_out: "2024-05-11".into(), ..Default::default() },
        BookingRecord { id: 3, check_in: "2024-05-01".into(), check_out: "2024-05-05".into(), ..Default::default() },
        BookingRecord { id: 4, check_in: "2024-05-16".into(), check_out: "2024-05-18".into(), ..Default::default() },
        BookingRecord { id: 5, check_in: "2024-05-17".into(), check_out: "2024-05-19".into(), ..Default::default() },
    ];
    let run = |dates| {
        let params = QueryParams::default().with_dates(dates).sorted_by(SortField::Id, SortDirection::Asc);
        ids(&query_bookings_in(&ctx(today), &records, &[], &params).view)
    };
    assert_eq!(run(DateFilter::Today), vec![1, 2]);
    assert_eq!(run(DateFilter::Upcoming), vec![4, 5]);
    assert_eq!(run(DateFilter::Past), vec![3]);
    assert_eq!(run(DateFilter::ThisWeek), vec![1, 4]);
}

#[test]
fn tab_applies_after_other_filters() {
    let params = QueryParams::default().with_status("pending").with_tab("confirmed");
    let out = query_bookings_in(&ctx(day(2024, 3, 1)), &scenario_records(), &[], &params);
    assert!(out.view.is_empty());
}

#[test]
fn paging_leaves_matched_count_alone() {
    let records = mixed_records();
    let params = QueryParams::default()
        .sorted_by(SortField::Id, SortDirection::Asc)
        .paged(Some(5), 10);
    let out = query_bookings_in(&ctx(day(2024, 5, 10)), &records, &[], &params);
    assert_eq!(ids(&out.view), vec![11, 12, 13, 14, 15]);
    assert_eq!(out.matched, 42);

    let past_end = QueryParams::default().paged(None, 100);
    let out = query_bookings_in(&ctx(day(2024, 5, 10)), &records, &[], &past_end);
    assert!(out.view.is_empty());
    assert_eq!(out.matched, 42);
}

// ── Engine ───────────────────────────────────────────────

fn test_data_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("bookq_test_engine").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_bookings(dir: &Path, records: &[BookingRecord]) {
    std::fs::write(dir.join(BOOKINGS_FILE), serde_json::to_vec(records).unwrap()).unwrap();
}

#[test]
fn engine_queries_loaded_files() {
    let dir = test_data_dir("loaded");
    write_bookings(&dir, &scenario_records());
    std::fs::write(dir.join(PROPERTIES_FILE), r#"[{"id": 1, "name": "Seaside Villa"}]"#).unwrap();

    let engine = Engine::open(dir, StatsPolicy::default()).unwrap();
    let out = engine.query_in(&ctx(day(2024, 3, 1)), &QueryParams::default().with_status("pending"));
    assert_eq!(ids(&out.view), vec![2]);
    assert_eq!(engine.stats().total_revenue, 150.0);
    assert_eq!(engine.properties().len(), 1);
}

#[test]
fn engine_reload_picks_up_changes() {
    let dir = test_data_dir("reload");
    write_bookings(&dir, &scenario_records()[..1]);
    let engine = Engine::open(dir.clone(), StatsPolicy::default()).unwrap();
    assert_eq!(engine.stats().total_bookings, 1);
    assert!(!engine.is_stale());

    write_bookings(&dir, &scenario_records());
    assert!(engine.is_stale());
    assert_eq!(engine.reload().unwrap(), 2);
    assert_eq!(engine.stats().total_bookings, 2);
    assert!(!engine.is_stale());
}

#[test]
fn failed_reload_keeps_previous_snapshot() {
    let dir = test_data_dir("failed_reload");
    write_bookings(&dir, &scenario_records());
    let engine = Engine::open(dir.clone(), StatsPolicy::default()).unwrap();

    std::fs::write(dir.join(BOOKINGS_FILE), "[{ truncated").unwrap();
    assert!(engine.reload().is_err());
    assert_eq!(engine.stats().total_bookings, 2);
}

#[test]
fn old_snapshot_survives_reload() {
    let dir = test_data_dir("held_snapshot");
    write_bookings(&dir, &scenario_records());
    let engine = Engine::open(dir.clone(), StatsPolicy::default()).unwrap();
    let held = engine.snapshot();

    write_bookings(&dir, &[]);
    engine.reload().unwrap();
    assert_eq!(held.bookings.len(), 2);
    assert_eq!(engine.snapshot().bookings.len(), 0);
}

#[test]
fn held_snapshot_answers_queries_after_reload() {
    let dir = test_data_dir("query_held");
    write_bookings(&dir, &scenario_records());
    let engine = Engine::open(dir.clone(), StatsPolicy::default()).unwrap();
    let held = engine.snapshot();

    write_bookings(&dir, &[]);
    engine.reload().unwrap();
    let ctx = ctx(day(2024, 3, 1));
    assert_eq!(engine.query_snapshot(&held, &ctx, &QueryParams::default()).matched, 2);
    assert_eq!(engine.query_in(&ctx, &QueryParams::default()).matched, 0);
}

#[test]
fn engine_policy_reaches_stats() {
    let dir = test_data_dir("policy");
    let records = vec![BookingRecord {
        id: 1,
        status: Some("cancelled".into()),
        total_amount: Some("60".into()),
        ..Default::default()
    }];
    write_bookings(&dir, &records);
    let policy = StatsPolicy {
        exclude_cancelled_from_pending: true,
    };
    let engine = Engine::open(dir, policy).unwrap();
    assert_eq!(engine.stats().pending_payments, 0.0);
    assert_eq!(engine.query(&QueryParams::default()).stats.pending_payments, 0.0);
}
