//! Owner analytics computed from warehouse rows.
//!
//! One pass over an owner's non-reverted rows produces the whole
//! [`AnalyticsSnapshot`]. Windows are relative to `now`:
//! - current: the last 30 days
//! - previous: the 30 days before that
//!
//! Application counts and response times are windowed by apply date;
//! interview and offer conversions by event time.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::events::{EventRow, OperationKind};
use crate::model::{AnalyticsSnapshot, ApplicationId, MonthlyTrend};

const DAY: i64 = 86_400;
const WINDOW: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    Current,
    Previous,
}

fn window(ts: i64, now: i64) -> Option<Window> {
    if ts >= now - WINDOW {
        Some(Window::Current)
    } else if ts >= now - 2 * WINDOW {
        Some(Window::Previous)
    } else {
        None
    }
}

fn is_application(row: &EventRow) -> bool {
    row.operation == OperationKind::Add
}

fn is_interview(row: &EventRow) -> bool {
    row.operation == OperationKind::EditStatus && row.status.is_interview()
}

fn is_offer(row: &EventRow) -> bool {
    row.operation == OperationKind::EditStatus && row.status.is_offer()
}

fn is_response(row: &EventRow) -> bool {
    row.operation == OperationKind::EditStatus && row.status.is_response()
}

/// `YYYY-MM` of a unix timestamp.
fn month_of(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m").to_string())
        .unwrap_or_default()
}

#[derive(Default)]
struct Pair {
    current: i64,
    previous: i64,
}

impl Pair {
    fn add(&mut self, w: Window, n: i64) {
        match w {
            Window::Current => self.current += n,
            Window::Previous => self.previous += n,
        }
    }

    fn trend(&self) -> i64 {
        self.current - self.previous
    }
}

#[derive(Default)]
struct MonthBucket<'a> {
    applications: i64,
    interviews: HashSet<&'a ApplicationId>,
    offers: HashSet<&'a ApplicationId>,
}

fn mean(values: &[i64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<i64>() as f64 / values.len() as f64)
    }
}

/// Compute the analytics snapshot for one owner's rows.
///
/// Reverted rows are ignored. An empty input yields a zeroed snapshot with
/// absent response times.
pub fn compute(rows: &[EventRow], now: DateTime<Utc>) -> AnalyticsSnapshot {
    let now_secs = now.timestamp();
    let live: Vec<&EventRow> = rows.iter().filter(|r| !r.is_reverted()).collect();

    let mut applications = Pair::default();
    let mut interview_jobs: [HashSet<&ApplicationId>; 2] = Default::default();
    let mut offer_jobs: [HashSet<&ApplicationId>; 2] = Default::default();
    let mut latest_applied: HashMap<&ApplicationId, i64> = HashMap::new();
    let mut months: BTreeMap<String, MonthBucket<'_>> = BTreeMap::new();

    for row in &live {
        if is_application(row) {
            if let Some(w) = window(row.applied_date, now_secs) {
                applications.add(w, 1);
            }
        }

        if let Some(w) = window(row.event_time, now_secs) {
            let slot = match w {
                Window::Current => 0,
                Window::Previous => 1,
            };
            if is_interview(row) {
                interview_jobs[slot].insert(&row.job_id);
            }
            if is_offer(row) {
                offer_jobs[slot].insert(&row.job_id);
            }
        }

        latest_applied
            .entry(&row.job_id)
            .and_modify(|d| *d = (*d).max(row.applied_date))
            .or_insert(row.applied_date);

        if row.applied_date >= now_secs - YEAR {
            let bucket = months.entry(month_of(row.applied_date)).or_default();
            if is_application(row) {
                bucket.applications += 1;
            }
            if is_interview(row) {
                bucket.interviews.insert(&row.job_id);
            }
            if is_offer(row) {
                bucket.offers.insert(&row.job_id);
            }
        }
    }

    // First response strictly after the latest apply date, in whole days.
    let mut response_days: [Vec<i64>; 2] = Default::default();
    for (job, applied) in &latest_applied {
        let Some(w) = window(*applied, now_secs) else {
            continue;
        };
        let first = live
            .iter()
            .filter(|r| &r.job_id == *job && is_response(r) && r.event_time > *applied)
            .map(|r| (r.event_time - applied) / DAY)
            .min();
        if let Some(days) = first {
            match w {
                Window::Current => response_days[0].push(days),
                Window::Previous => response_days[1].push(days),
            }
        }
    }

    let interviews = Pair {
        current: interview_jobs[0].len() as i64,
        previous: interview_jobs[1].len() as i64,
    };
    let offers = Pair {
        current: offer_jobs[0].len() as i64,
        previous: offer_jobs[1].len() as i64,
    };
    let avg_current = mean(&response_days[0]);
    let avg_previous = mean(&response_days[1]);

    AnalyticsSnapshot {
        application_velocity: applications.current,
        application_velocity_trend: applications.trend(),
        resume_effectiveness: interviews.current,
        resume_effectiveness_trend: interviews.trend(),
        interview_effectiveness: offers.current,
        interview_effectiveness_trend: offers.trend(),
        avg_response_time: avg_current,
        avg_response_time_trend: avg_current.zip(avg_previous).map(|(c, p)| c - p),
        monthly_trends: months
            .into_iter()
            .map(|(month, bucket)| MonthlyTrend {
                month,
                applications: bucket.applications,
                interviews: bucket.interviews.len() as i64,
                offers: bucket.offers.len() as i64,
            })
            .collect(),
        last_updated: now_secs,
    }
}
