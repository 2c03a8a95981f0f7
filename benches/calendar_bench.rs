//! Benchmarks for the month view
//!
//! Run with: cargo bench

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use goaltracker::calendar::{month_grid, CalendarGrid, CalendarMonth};
use goaltracker::models::{Goal, GoalPriority, GoalStatus, Progress};

fn create_test_goals(count: usize) -> Vec<Goal> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let statuses = [GoalStatus::NotStarted, GoalStatus::InProgress, GoalStatus::Completed];

    (0..count)
        .map(|i| {
            let due = start + Duration::hours(i as i64 * 7);
            Goal {
                id: format!("goal-{}", i),
                user_id: "bench".to_string(),
                title: format!("Goal {}", i),
                description: None,
                due_date: due,
                priority: GoalPriority::Medium,
                status: statuses[i % statuses.len()],
                progress: Progress::clamped((i % 101) as i64),
                created_at: start,
                updated_at: start,
            }
        })
        .collect()
}

fn bench_month_grid(c: &mut Criterion) {
    let months: Vec<CalendarMonth> = (1..=12)
        .filter_map(|m| CalendarMonth::new(2024, m))
        .collect();

    c.bench_function("month_grid_year", |b| {
        b.iter(|| {
            for month in &months {
                black_box(month_grid(black_box(*month)));
            }
        })
    });
}

fn bench_calendar_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("calendar_build");
    let month = CalendarMonth::new(2024, 3).unwrap();
    let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();

    for size in [10, 100, 1000] {
        let goals = create_test_goals(size);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("goals_{}", size), |b| {
            b.iter(|| CalendarGrid::build(black_box(month), black_box(&goals), today))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_month_grid, bench_calendar_build);
criterion_main!(benches);
