//! Figures shown on the dashboard, computed from fetched records.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use crate::model::{
    assessor::Assessor,
    notification::Notification,
    store::Record,
    task::{Task, TaskStatus},
    voter::{Voter, VoterStatus},
};

/// `part` as a percentage of `total`, or 0 for an empty total.
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Share of voters who are supporters.
pub fn engagement(voters: &[Record<Voter>]) -> f64 {
    let supporters = voters
        .iter()
        .filter(|v| v.status == VoterStatus::Supporter)
        .count();
    percentage(supporters, voters.len())
}

/// The first instant of the month containing `now`, in `tz`.
fn month_start(now: DateTime<Utc>, tz: FixedOffset) -> Option<DateTime<Utc>> {
    let local = now.with_timezone(&tz).date_naive();
    let first = NaiveDate::from_ymd_opt(local.year(), local.month(), 1)?;
    let midnight = first.and_hms_opt(0, 0, 0)?;
    tz.from_local_datetime(&midnight)
        .single()
        .map(|t| t.with_timezone(&Utc))
}

/// Records created this month as a percentage of those that existed before
/// it. With nothing before it, any new record counts as 100% growth.
/// Records without a creation time are counted as existing before.
pub fn monthly_growth<I>(created: I, now: DateTime<Utc>, tz: FixedOffset) -> f64
where
    I: IntoIterator<Item = Option<DateTime<Utc>>>,
{
    let Some(start) = month_start(now, tz) else {
        return 0.0;
    };
    let (current, prior) = created
        .into_iter()
        .fold((0, 0), |(current, prior), at| match at {
            Some(at) if at >= start => (current + 1, prior),
            _ => (current, prior + 1),
        });
    match (current, prior) {
        (_, 0) if current > 0 => 100.0,
        (_, 0) => 0.0,
        _ => percentage(current, prior),
    }
}

/// Pending tasks scheduled before `now`.
pub fn overdue_count(tasks: &[Record<Task>], now: DateTime<Utc>) -> usize {
    tasks.iter().filter(|t| t.is_overdue(now)).count()
}

fn one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Everything the dashboard shows for one caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub total_voters: usize,
    pub supporters: usize,
    pub growth: f64,
    pub engagement: f64,
    pub pending_tasks: usize,
    pub overdue_tasks: usize,
    pub team_size: usize,
    pub unread_notifications: usize,
    pub birthdays_today: Vec<Record<Voter>>,
}

impl DashboardMetrics {
    /// Aggregate the caller's visible records.
    pub fn compute(
        voters: &[Record<Voter>],
        tasks: &[Record<Task>],
        team: &[Record<Assessor>],
        notifications: &[Record<Notification>],
        now: DateTime<Utc>,
        tz: FixedOffset,
    ) -> Self {
        let today = now.with_timezone(&tz).date_naive();
        Self {
            total_voters: voters.len(),
            supporters: voters
                .iter()
                .filter(|v| v.status == VoterStatus::Supporter)
                .count(),
            growth: one_decimal(monthly_growth(
                voters.iter().map(|v| v.stamps.created_at),
                now,
                tz,
            )),
            engagement: one_decimal(engagement(voters)),
            pending_tasks: tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Pending)
                .count(),
            overdue_tasks: overdue_count(tasks, now),
            team_size: team.len(),
            unread_notifications: notifications.iter().filter(|n| !n.read).count(),
            birthdays_today: voters
                .iter()
                .filter(|v| v.has_birthday_on(today))
                .cloned()
                .collect(),
        }
    }
}
