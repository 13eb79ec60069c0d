use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use growthos_core::{
    analytics::{AnalyticsBackend, RollupQuery, RollupSort, SortDirection},
    date_range::DateRange,
    event::{Event, EventFields},
    funnel::FunnelStepConfig,
};
use growthos_duckdb::DuckDbBackend;

const ORG: &str = "org_1";

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).expect("valid date")
}

fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, d, h, m, 0).single().expect("valid timestamp")
}

fn event(org: &str, event_type: &str, created_at: DateTime<Utc>, fields: EventFields) -> Event {
    Event {
        id: uuid::Uuid::new_v4().to_string(),
        organization_id: org.to_string(),
        event_type: event_type.to_string(),
        fields,
        created_at,
    }
}

fn payment(gross: i64, net: i64) -> EventFields {
    EventFields {
        gross_value_in_cents: Some(gross),
        net_value_in_cents: Some(net),
        ..Default::default()
    }
}

fn from_source(source: Option<&str>) -> EventFields {
    EventFields {
        source: source.map(str::to_string),
        ..Default::default()
    }
}

async fn setup() -> Arc<DuckDbBackend> {
    let db = Arc::new(DuckDbBackend::open_in_memory().expect("db"));
    db.seed_organization(ORG, "Acme").await.expect("seed");
    db
}

async fn insert_all(db: &DuckDbBackend, events: Vec<Event>) {
    for e in events {
        db.insert_event(&e).await.expect("insert");
    }
}

#[tokio::test]
async fn funnel_reports_adjacent_and_total_conversion() {
    let db = setup().await;
    let steps = vec![
        FunnelStepConfig::new("signup", "Signups"),
        FunnelStepConfig::new("edit", "Edits"),
        FunnelStepConfig::new("payment", "Payments"),
    ];
    db.update_funnel_steps(ORG, &steps).await.expect("update");

    let mut events = Vec::new();
    for _ in 0..10 {
        events.push(event(ORG, "signup", at(5, 10, 0), EventFields::default()));
    }
    for _ in 0..4 {
        events.push(event(ORG, "edit", at(5, 11, 0), EventFields::default()));
    }
    events.push(event(ORG, "payment", at(5, 12, 0), payment(10_000, 9_000)));
    insert_all(&db, events).await;

    let backend: Arc<dyn AnalyticsBackend> = db.clone();
    let report = backend
        .get_funnel(ORG, &DateRange::from_days(day(1), day(31)))
        .await
        .expect("funnel")
        .expect("organization exists");

    let values: Vec<i64> = report.steps.iter().map(|s| s.value).collect();
    assert_eq!(values, vec![10, 4, 1]);
    let rates: Vec<&str> = report.rates.iter().map(|r| r.rate.as_str()).collect();
    assert_eq!(rates, vec!["40.0%", "25.0%"]);
    assert_eq!(report.total_conversion.as_deref(), Some("10.0%"));
    assert_eq!(report.revenue, 10_000);
    assert_eq!(report.net_revenue, 9_000);
    assert_eq!(report.average_ticket, 10_000);
    assert_eq!(report.start_date, "2024-03-01");
    assert_eq!(report.end_date, "2024-03-31");
}

#[tokio::test]
async fn funnel_unique_step_counts_distinct_sessions() {
    let db = setup().await;
    let mut steps = growthos_core::funnel::default_funnel_steps();
    steps[0].count_unique = true;
    db.update_funnel_steps(ORG, &steps).await.expect("update");

    let in_session = |sid: &str| EventFields {
        session_id: Some(sid.to_string()),
        ..Default::default()
    };
    insert_all(
        &db,
        vec![
            event(ORG, "signup", at(5, 10, 0), in_session("s_a")),
            event(ORG, "signup", at(5, 10, 1), in_session("s_a")),
            event(ORG, "signup", at(5, 10, 2), in_session("s_b")),
            event(ORG, "payment", at(5, 10, 3), payment(500, 450)),
        ],
    )
    .await;

    let report = db
        .get_funnel(ORG, &DateRange::from_days(day(5), day(5)))
        .await
        .expect("funnel")
        .expect("exists");
    assert_eq!(report.steps[0].value, 2);
    assert_eq!(report.rates[0].rate, "50.0%");
    assert!(report.total_conversion.is_none());
}

#[tokio::test]
async fn funnel_for_unknown_organization_is_none() {
    let db = setup().await;
    let report = db
        .get_funnel("org_missing", &DateRange::from_days(day(1), day(2)))
        .await
        .expect("funnel");
    assert!(report.is_none());
}

#[tokio::test]
async fn single_day_range_includes_last_microsecond_only() {
    let db = setup().await;
    let last_moment = Utc
        .with_ymd_and_hms(2024, 3, 5, 23, 59, 59)
        .single()
        .expect("ts")
        + Duration::microseconds(999_999);
    insert_all(
        &db,
        vec![
            event(ORG, "signup", at(5, 0, 0), EventFields::default()),
            event(ORG, "signup", last_moment, EventFields::default()),
            event(ORG, "signup", at(6, 0, 0), EventFields::default()),
            event(ORG, "signup", at(4, 23, 59), EventFields::default()),
        ],
    )
    .await;

    let report = db
        .get_funnel(ORG, &DateRange::from_days(day(5), day(5)))
        .await
        .expect("funnel")
        .expect("exists");
    assert_eq!(report.steps[0].value, 2);
}

#[tokio::test]
async fn reads_are_scoped_to_one_organization() {
    let db = setup().await;
    db.seed_organization("org_2", "Other").await.expect("seed");
    insert_all(
        &db,
        vec![
            event(ORG, "payment", at(5, 10, 0), payment(1_000, 900)),
            event("org_2", "payment", at(5, 10, 0), payment(99_999, 99_000)),
        ],
    )
    .await;

    let summary = db
        .get_financial(ORG, &DateRange::from_days(day(1), day(31)))
        .await
        .expect("financial");
    assert_eq!(summary.gross_revenue_in_cents, 1_000);
    assert_eq!(summary.total_payments, 1);
}

async fn seed_channels(db: &DuckDbBackend) {
    let mut events = Vec::new();
    for _ in 0..4 {
        events.push(event(ORG, "signup", at(5, 9, 0), from_source(Some("google"))));
    }
    events.push(event(
        ORG,
        "payment",
        at(5, 9, 30),
        EventFields {
            source: Some("google".to_string()),
            ..payment(5_000, 4_500)
        },
    ));
    events.push(event(ORG, "signup", at(5, 10, 0), from_source(None)));
    events.push(event(
        ORG,
        "payment",
        at(5, 10, 30),
        EventFields {
            source: Some("Instagram".to_string()),
            ..payment(20_000, 18_000)
        },
    ));
    events.push(event(ORG, "pageview", at(5, 11, 0), from_source(Some("bing"))));
    insert_all(db, events).await;
}

#[tokio::test]
async fn channel_rollup_groups_null_source_as_direct() {
    let db = setup().await;
    seed_channels(&db).await;

    let page = db
        .get_channels(ORG, &DateRange::from_days(day(1), day(31)), &RollupQuery::default())
        .await
        .expect("channels");

    // pageview-only channels do not appear; default sort is revenue DESC
    let names: Vec<&str> = page.data.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Instagram", "google", "direct"]);
    assert_eq!(page.pagination.total, 3);
    assert_eq!(page.pagination.total_pages, 1);

    let google = &page.data[1];
    assert_eq!(google.signups, 4);
    assert_eq!(google.payments, 1);
    assert_eq!(google.conversion_rate, "25.0%");
    assert_eq!(google.average_ticket, 5_000);

    let instagram = &page.data[0];
    assert_eq!(instagram.conversion_rate, "0%");
}

#[tokio::test]
async fn channel_rollup_sorts_searches_and_paginates() {
    let db = setup().await;
    seed_channels(&db).await;
    let range = DateRange::from_days(day(1), day(31));

    let by_signups = RollupQuery {
        order_by: RollupSort::Signups,
        order_dir: SortDirection::Desc,
        limit: 1,
        ..Default::default()
    };
    let page = db.get_channels(ORG, &range, &by_signups).await.expect("page 1");
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].name, "google");
    assert_eq!(page.pagination.total, 3);
    assert_eq!(page.pagination.total_pages, 3);

    let second = RollupQuery { page: 2, ..by_signups };
    let page = db.get_channels(ORG, &range, &second).await.expect("page 2");
    assert_eq!(page.data[0].name, "direct");

    let search = RollupQuery {
        search: Some("INSTA".to_string()),
        ..Default::default()
    };
    let page = db.get_channels(ORG, &range, &search).await.expect("search");
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].name, "Instagram");
    assert_eq!(page.pagination.total, 1);

    let by_name = RollupQuery {
        order_by: RollupSort::Name,
        order_dir: SortDirection::Asc,
        ..Default::default()
    };
    let page = db.get_channels(ORG, &range, &by_name).await.expect("name");
    let names: Vec<&str> = page.data.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Instagram", "direct", "google"]);
}

#[tokio::test]
async fn landing_page_rollup_groups_null_as_unknown() {
    let db = setup().await;
    let landing = |path: Option<&str>| EventFields {
        landing_page: path.map(str::to_string),
        ..Default::default()
    };
    insert_all(
        &db,
        vec![
            event(ORG, "signup", at(5, 9, 0), landing(Some("/pricing"))),
            event(ORG, "signup", at(5, 9, 0), landing(None)),
            event(
                ORG,
                "payment",
                at(5, 9, 0),
                EventFields {
                    landing_page: Some("/pricing".to_string()),
                    ..payment(3_000, 2_700)
                },
            ),
        ],
    )
    .await;

    let page = db
        .get_landing_pages(ORG, &DateRange::from_days(day(5), day(5)), &RollupQuery::default())
        .await
        .expect("landing pages");
    assert_eq!(page.data[0].name, "/pricing");
    assert_eq!(page.data[0].conversion_rate, "100.0%");
    assert_eq!(page.data[1].name, "unknown");
    assert_eq!(page.data[1].revenue, 0);
}

#[tokio::test]
async fn category_rollup_covers_payments_only() {
    let db = setup().await;
    let in_category = |category: Option<&str>, gross: i64| EventFields {
        category: category.map(str::to_string),
        ..payment(gross, gross)
    };
    insert_all(
        &db,
        vec![
            event(ORG, "payment", at(5, 9, 0), in_category(Some("courses"), 1_000)),
            event(ORG, "payment", at(5, 9, 0), in_category(Some("courses"), 3_000)),
            event(ORG, "payment", at(5, 9, 0), in_category(None, 500)),
            event(ORG, "signup", at(5, 9, 0), in_category(Some("ebooks"), 0)),
        ],
    )
    .await;
    let range = DateRange::from_days(day(5), day(5));

    let page = db
        .get_categories(ORG, &range, &RollupQuery::default())
        .await
        .expect("categories");
    assert_eq!(page.pagination.total, 2);
    assert_eq!(page.data[0].category, "courses");
    assert_eq!(page.data[0].payments, 2);
    assert_eq!(page.data[0].average_ticket, 2_000);
    assert_eq!(page.data[1].category, "uncategorized");

    let bad = RollupQuery {
        order_by: RollupSort::ConversionRate,
        ..Default::default()
    };
    assert!(db.get_categories(ORG, &range, &bad).await.is_err());
}

#[tokio::test]
async fn daily_series_is_zero_filled_and_ascending() {
    let db = setup().await;
    insert_all(
        &db,
        vec![
            event(ORG, "signup", at(1, 8, 0), EventFields::default()),
            event(ORG, "payment", at(3, 8, 0), payment(2_500, 2_000)),
            event(ORG, "payment", at(3, 9, 0), payment(500, 400)),
        ],
    )
    .await;

    let rows = db
        .get_daily(ORG, &DateRange::from_days(day(1), day(4)))
        .await
        .expect("daily");
    let dates: Vec<&str> = rows.iter().map(|r| r.date.as_str()).collect();
    assert_eq!(dates, vec!["2024-03-01", "2024-03-02", "2024-03-03", "2024-03-04"]);
    assert_eq!(rows[0].signups, 1);
    assert_eq!(rows[1].signups, 0);
    assert_eq!(rows[1].revenue, 0);
    assert_eq!(rows[2].payments, 2);
    assert_eq!(rows[2].revenue, 3_000);
    assert_eq!(rows[2].net_revenue, 2_400);
}

#[tokio::test]
async fn financial_summary_with_breakdowns() {
    let db = setup().await;
    let paid = |method: Option<&str>, category: Option<&str>, gross: i64| EventFields {
        payment_method: method.map(str::to_string),
        category: category.map(str::to_string),
        gateway_fee_in_cents: Some(gross / 20),
        discount_in_cents: Some(100),
        ..payment(gross, gross - gross / 20)
    };
    insert_all(
        &db,
        vec![
            event(ORG, "payment", at(5, 9, 0), paid(Some("pix"), Some("courses"), 6_000)),
            event(ORG, "payment", at(5, 9, 0), paid(Some("credit_card"), None, 3_000)),
            event(ORG, "payment", at(5, 9, 0), paid(None, Some("courses"), 1_000)),
            event(ORG, "checkout_abandoned", at(5, 9, 0), payment(7_700, 7_700)),
        ],
    )
    .await;

    let summary = db
        .get_financial(ORG, &DateRange::from_days(day(5), day(5)))
        .await
        .expect("financial");
    assert_eq!(summary.gross_revenue_in_cents, 10_000);
    assert_eq!(summary.net_revenue_in_cents, 9_500);
    assert_eq!(summary.total_gateway_fees_in_cents, 500);
    assert_eq!(summary.total_discounts_in_cents, 300);
    assert_eq!(summary.lost_revenue_in_cents, 7_700);
    assert_eq!(summary.total_payments, 3);
    assert_eq!(summary.average_ticket_in_cents, 3_333);

    let methods: Vec<(&str, &str)> = summary
        .by_payment_method
        .iter()
        .map(|m| (m.method.as_str(), m.percentage.as_str()))
        .collect();
    assert_eq!(
        methods,
        vec![("pix", "60.0%"), ("credit_card", "30.0%"), ("unknown", "10.0%")]
    );
    assert_eq!(summary.by_category[0].category, "courses");
    assert_eq!(summary.by_category[0].revenue, 7_000);
    assert_eq!(summary.by_category[1].category, "uncategorized");
}

#[tokio::test]
async fn financial_summary_on_empty_range_is_all_zero() {
    let db = setup().await;
    let summary = db
        .get_financial(ORG, &DateRange::from_days(day(5), day(5)))
        .await
        .expect("financial");
    assert_eq!(summary.gross_revenue_in_cents, 0);
    assert_eq!(summary.average_ticket_in_cents, 0);
    assert!(summary.by_payment_method.is_empty());
}

#[tokio::test]
async fn recent_events_newest_first_within_window() {
    let db = setup().await;
    let now = Utc::now();
    insert_all(
        &db,
        vec![
            event(ORG, "pageview", now - Duration::minutes(10), EventFields::default()),
            event(ORG, "pageview", now - Duration::minutes(2), EventFields::default()),
            event(ORG, "signup", now - Duration::seconds(5), from_source(Some("google"))),
        ],
    )
    .await;

    let recent = db
        .get_recent_events(ORG, now - Duration::minutes(5), 10)
        .await
        .expect("recent");
    assert_eq!(recent.count, 2);
    let latest = recent.latest_event.expect("latest");
    assert_eq!(latest.event_type, "signup");
    assert_eq!(latest.source.as_deref(), Some("google"));

    let none = db
        .get_recent_events("org_2", now - Duration::minutes(5), 10)
        .await
        .expect("recent");
    assert_eq!(none.count, 0);
    assert!(none.latest_event.is_none());
}

#[tokio::test]
async fn stored_metadata_is_json_text() {
    let db = setup().await;
    let mut metadata = serde_json::Map::new();
    metadata.insert("plan".to_string(), serde_json::json!("pro"));
    let e = event(
        ORG,
        "signup",
        at(5, 9, 0),
        EventFields {
            metadata: Some(metadata),
            ..Default::default()
        },
    );
    db.insert_event(&e).await.expect("insert");

    let stored: String = db
        .conn_for_test()
        .await
        .query_row(
            "SELECT metadata FROM events WHERE id = ?1",
            growthos_duckdb::duckdb::params![e.id],
            |row| row.get(0),
        )
        .expect("row");
    assert_eq!(stored, r#"{"plan":"pro"}"#);
}
