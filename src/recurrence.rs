use chrono::{Datelike, Duration, NaiveDate};
use chrono_tz::Tz;

use crate::error::{HorizonError, Result};
use crate::model::{RecurrenceRule, RecurrenceType, Task};
use crate::timezone::local_date;

/// Upper bound on rule steps taken while catching an old anchor up to a window.
const MAX_STEPS: usize = 100_000;

/// Reject rules a writer must not persist.
pub fn validate_rule(rule: &RecurrenceRule) -> Result<()> {
    if let Some(weekday) = rule.weekday
        && weekday > 6
    {
        return Err(HorizonError::InvalidRecurrenceRule(format!(
            "fixed weekday must be 0-6 (Sunday-Saturday), got {weekday}"
        )));
    }
    if rule.weekday.is_some() && rule.kind != RecurrenceType::Weekly {
        return Err(HorizonError::InvalidRecurrenceRule(format!(
            "fixed weekday only applies to weekly rules, not {}",
            rule.kind
        )));
    }
    Ok(())
}

/// A recurrence rule pinned to the calendar date it started on.
///
/// The anchor keeps monthly rules on their original day-of-month: a rule that
/// started on the 31st clamps to short months and returns to the 31st afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub rule: RecurrenceRule,
    pub anchor: NaiveDate,
}

impl Schedule {
    /// A weekly rule with a fixed weekday starts on the first matching day on or
    /// after `anchor`.
    pub fn new(rule: RecurrenceRule, anchor: NaiveDate) -> Self {
        let anchor = match (rule.kind, rule.weekday) {
            (RecurrenceType::Weekly, Some(target)) => {
                let current = i64::from(anchor.weekday().num_days_from_sunday());
                let ahead = (i64::from(target % 7) - current).rem_euclid(7);
                anchor
                    .checked_add_signed(Duration::days(ahead))
                    .unwrap_or(anchor)
            }
            _ => anchor,
        };
        Self { rule, anchor }
    }

    /// Anchor a template on its due date (or creation date) as seen in `tz`.
    pub fn for_template(template: &Task, tz: Tz) -> Self {
        let anchor = local_date(template.due_date.unwrap_or(template.created_at), tz);
        Self::new(template.recurrence, anchor)
    }

    /// Next occurrence strictly after `from`, or None once the rule has ended.
    pub fn next_after(&self, from: NaiveDate) -> Option<NaiveDate> {
        step(&self.rule, self.anchor.day(), from)
    }

    /// Every occurrence date falling inside `[start, end]`.
    pub fn occurrences_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        if !self.rule.is_active() || start > end {
            return Vec::new();
        }
        if self.rule.end_date.is_some_and(|until| self.anchor > until) {
            return Vec::new();
        }

        let mut candidate = self.anchor;
        let mut steps = 0;
        while candidate < start {
            let Some(next) = self.next_after(candidate) else {
                return Vec::new();
            };
            candidate = next;
            steps += 1;
            if steps > MAX_STEPS {
                tracing::warn!(anchor = %self.anchor, %start, "recurrence catch-up exceeded step limit");
                return Vec::new();
            }
        }

        let mut dates = Vec::new();
        while candidate <= end {
            dates.push(candidate);
            match self.next_after(candidate) {
                Some(next) => candidate = next,
                None => break,
            }
        }
        dates
    }
}

/// Next occurrence strictly after `from`, using `from`'s own day-of-month as the
/// monthly anchor. Returns None once the rule's end date is passed.
pub fn next_occurrence(rule: &RecurrenceRule, from: NaiveDate) -> Option<NaiveDate> {
    step(rule, from.day(), from)
}

fn step(rule: &RecurrenceRule, anchor_day: u32, from: NaiveDate) -> Option<NaiveDate> {
    let interval = rule.effective_interval();
    let next = match rule.kind {
        RecurrenceType::None => return None,
        RecurrenceType::Daily => from.checked_add_signed(Duration::try_days(interval)?)?,
        RecurrenceType::Weekly => match rule.weekday {
            Some(target) => {
                let current = from.weekday().num_days_from_sunday() as i64;
                let ahead = (i64::from(target % 7) - current).rem_euclid(7);
                let days = if ahead == 0 {
                    interval.checked_mul(7)?
                } else {
                    ahead
                };
                from.checked_add_signed(Duration::try_days(days)?)?
            }
            None => from.checked_add_signed(Duration::try_days(interval.checked_mul(7)?)?)?,
        },
        RecurrenceType::Monthly | RecurrenceType::Custom => add_months(from, interval, anchor_day)?,
    };

    match rule.end_date {
        Some(until) if next > until => None,
        _ => Some(next),
    }
}

/// Same day-of-month `months` later, clamped to the target month's length.
pub fn add_months(from: NaiveDate, months: i64, anchor_day: u32) -> Option<NaiveDate> {
    let index = i64::from(from.year())
        .checked_mul(12)?
        .checked_add(i64::from(from.month0()))?
        .checked_add(months)?;
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = u32::try_from(index.rem_euclid(12)).ok()? + 1;
    let day = anchor_day.clamp(1, days_in_month(year, month)?);
    NaiveDate::from_ymd_opt(year, month, day)
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    u32::try_from(next.signed_duration_since(first).num_days()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
    }

    fn rule(kind: RecurrenceType, interval: i64) -> RecurrenceRule {
        RecurrenceRule {
            kind,
            interval,
            weekday: None,
            end_date: None,
        }
    }

    #[test]
    fn daily_adds_interval_days() {
        let next = next_occurrence(&rule(RecurrenceType::Daily, 3), date("2026-03-30"));
        assert_eq!(next, Some(date("2026-04-02")));
    }

    #[test]
    fn weekly_without_weekday_adds_whole_weeks() {
        let next = next_occurrence(&rule(RecurrenceType::Weekly, 2), date("2026-03-04"));
        assert_eq!(next, Some(date("2026-03-18")));
    }

    #[test]
    fn weekly_fixed_weekday_on_same_day_advances_full_interval() {
        // 2026-03-04 is a Wednesday.
        let mut weekly = rule(RecurrenceType::Weekly, 1);
        weekly.weekday = Some(3);
        assert_eq!(
            next_occurrence(&weekly, date("2026-03-04")),
            Some(date("2026-03-11"))
        );

        weekly.interval = 2;
        assert_eq!(
            next_occurrence(&weekly, date("2026-03-04")),
            Some(date("2026-03-18"))
        );
    }

    #[test]
    fn weekly_fixed_weekday_moves_to_next_matching_day() {
        let mut weekly = rule(RecurrenceType::Weekly, 1);
        weekly.weekday = Some(0);
        // Wednesday -> following Sunday.
        assert_eq!(
            next_occurrence(&weekly, date("2026-03-04")),
            Some(date("2026-03-08"))
        );
    }

    #[test]
    fn monthly_on_the_31st_clamps_into_february() {
        let monthly = rule(RecurrenceType::Monthly, 1);
        assert_eq!(
            next_occurrence(&monthly, date("2026-01-31")),
            Some(date("2026-02-28"))
        );
        assert_eq!(
            next_occurrence(&monthly, date("2028-01-31")),
            Some(date("2028-02-29"))
        );
    }

    #[test]
    fn anchored_monthly_returns_to_original_day_after_short_month() {
        let schedule = Schedule::new(rule(RecurrenceType::Monthly, 1), date("2026-01-31"));
        let dates = schedule.occurrences_between(date("2026-01-01"), date("2026-04-30"));
        assert_eq!(
            dates,
            vec![
                date("2026-01-31"),
                date("2026-02-28"),
                date("2026-03-31"),
                date("2026-04-30"),
            ]
        );
    }

    #[test]
    fn custom_steps_by_interval_months_across_year_end() {
        let custom = rule(RecurrenceType::Custom, 3);
        assert_eq!(
            next_occurrence(&custom, date("2026-11-15")),
            Some(date("2027-02-15"))
        );
    }

    #[test]
    fn end_date_stops_the_rule() {
        let mut daily = rule(RecurrenceType::Daily, 1);
        daily.end_date = Some(date("2026-03-05"));
        assert_eq!(
            next_occurrence(&daily, date("2026-03-04")),
            Some(date("2026-03-05"))
        );
        assert_eq!(next_occurrence(&daily, date("2026-03-05")), None);
    }

    #[test]
    fn non_positive_interval_is_treated_as_one() {
        assert_eq!(
            next_occurrence(&rule(RecurrenceType::Daily, 0), date("2026-03-04")),
            Some(date("2026-03-05"))
        );
        assert_eq!(
            next_occurrence(&rule(RecurrenceType::Monthly, -4), date("2026-03-04")),
            Some(date("2026-04-04"))
        );
    }

    #[test]
    fn none_rule_never_produces_dates() {
        assert_eq!(
            next_occurrence(&rule(RecurrenceType::None, 1), date("2026-03-04")),
            None
        );
        let schedule = Schedule::new(rule(RecurrenceType::None, 1), date("2026-03-04"));
        assert!(
            schedule
                .occurrences_between(date("2026-03-01"), date("2026-03-31"))
                .is_empty()
        );
    }

    #[test]
    fn occurrences_catch_up_from_old_anchor_keeping_cadence() {
        let schedule = Schedule::new(rule(RecurrenceType::Daily, 3), date("2026-01-01"));
        let dates = schedule.occurrences_between(date("2026-01-08"), date("2026-01-14"));
        assert_eq!(
            dates,
            vec![date("2026-01-10"), date("2026-01-13")]
        );
    }

    #[test]
    fn fixed_weekday_schedule_skips_off_weekday_anchor() {
        // Anchored on Monday 2026-03-09, but the rule fires on Wednesdays.
        let mut weekly = rule(RecurrenceType::Weekly, 1);
        weekly.weekday = Some(3);
        let schedule = Schedule::new(weekly, date("2026-03-09"));

        assert_eq!(schedule.anchor, date("2026-03-11"));
        assert_eq!(
            schedule.occurrences_between(date("2026-03-09"), date("2026-03-19")),
            vec![date("2026-03-11"), date("2026-03-18")]
        );
    }

    #[test]
    fn fixed_weekday_schedule_keeps_matching_anchor() {
        let mut weekly = rule(RecurrenceType::Weekly, 2);
        weekly.weekday = Some(3);
        let schedule = Schedule::new(weekly, date("2026-03-04"));

        assert_eq!(
            schedule.occurrences_between(date("2026-03-01"), date("2026-03-31")),
            vec![date("2026-03-04"), date("2026-03-18")]
        );
    }

    #[test]
    fn validate_rejects_out_of_range_weekday() {
        let mut weekly = rule(RecurrenceType::Weekly, 1);
        weekly.weekday = Some(7);
        let err = validate_rule(&weekly).unwrap_err();
        assert!(matches!(err, HorizonError::InvalidRecurrenceRule(_)));

        weekly.weekday = Some(6);
        assert!(validate_rule(&weekly).is_ok());
    }

    #[test]
    fn validate_rejects_weekday_on_non_weekly_rule() {
        let mut daily = rule(RecurrenceType::Daily, 1);
        daily.weekday = Some(2);
        assert!(validate_rule(&daily).is_err());
    }

    fn any_rule() -> impl Strategy<Value = RecurrenceRule> {
        (
            prop::sample::select(vec![
                RecurrenceType::Daily,
                RecurrenceType::Weekly,
                RecurrenceType::Monthly,
                RecurrenceType::Custom,
            ]),
            -3i64..30,
            prop::option::of(0u8..7),
        )
            .prop_map(|(kind, interval, weekday)| RecurrenceRule {
                kind,
                interval,
                weekday: if kind == RecurrenceType::Weekly {
                    weekday
                } else {
                    None
                },
                end_date: None,
            })
    }

    proptest! {
        #[test]
        fn next_occurrence_is_strictly_after_from(
            rule in any_rule(),
            offset in 0i64..40_000,
        ) {
            let from = date("1990-01-01") + Duration::days(offset);
            let next = next_occurrence(&rule, from).unwrap();
            prop_assert!(next > from, "{next} should be after {from}");
        }

        #[test]
        fn anchored_schedule_is_strictly_increasing(
            rule in any_rule(),
            anchor_offset in 0i64..3_000,
        ) {
            let anchor = date("2020-01-01") + Duration::days(anchor_offset);
            let schedule = Schedule::new(rule, anchor);
            let dates = schedule.occurrences_between(anchor, anchor + Duration::days(400));
            prop_assert!(!dates.is_empty());
            prop_assert!(dates.windows(2).all(|pair| pair[0] < pair[1]));
            if let (RecurrenceType::Weekly, Some(target)) = (rule.kind, rule.weekday) {
                prop_assert!(dates
                    .iter()
                    .all(|d| d.weekday().num_days_from_sunday() == u32::from(target)));
            }
        }
    }
}
