//! Repeated organizer runs: every N minutes, or once a day at a fixed time.

use crate::config::{ConfigError, ScheduleConfig};
use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration as StdDuration;

/// When runs are due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Interval(Duration),
    Daily(NaiveTime),
}

impl Schedule {
    pub fn from_config(config: &ScheduleConfig) -> Result<Self, ConfigError> {
        if config.poll_seconds == 0 {
            return Err(ConfigError::Invalid(
                "schedule.poll_seconds must be greater than zero".to_string(),
            ));
        }

        if let Some(raw) = &config.daily_at {
            let at = NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|e| {
                ConfigError::Invalid(format!("schedule.daily_at '{raw}' is not HH:MM: {e}"))
            })?;
            return Ok(Schedule::Daily(at));
        }

        let minutes = i64::try_from(config.interval_minutes).unwrap_or(i64::MAX);
        if minutes == 0 {
            return Err(ConfigError::Invalid(
                "schedule.interval_minutes must be greater than zero".to_string(),
            ));
        }
        Duration::try_minutes(minutes)
            .map(Schedule::Interval)
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "schedule.interval_minutes {minutes} is out of range"
                ))
            })
    }

    /// First due time strictly after `now`.
    pub fn next_after(&self, now: DateTime<Local>) -> DateTime<Local> {
        match *self {
            Schedule::Interval(every) => now + every,
            Schedule::Daily(at) => {
                let today = at_local(now, at, 0);
                if today > now {
                    today
                } else {
                    at_local(now, at, 1)
                }
            }
        }
    }

    /// When the first run happens after the scheduler starts.
    fn first_due(&self, now: DateTime<Local>) -> DateTime<Local> {
        match self {
            Schedule::Interval(_) => now,
            Schedule::Daily(_) => self.next_after(now),
        }
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Schedule::Interval(every) => write!(f, "every {} minutes", every.num_minutes()),
            Schedule::Daily(at) => write!(f, "daily at {}", at.format("%H:%M")),
        }
    }
}

/// `at` on the day `now` falls on, shifted by `days_ahead`.
///
/// Local times skipped by a DST jump resolve to one hour later.
fn at_local(now: DateTime<Local>, at: NaiveTime, days_ahead: i64) -> DateTime<Local> {
    let naive = (now.date_naive() + Duration::days(days_ahead)).and_time(at);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            Local
                .from_local_datetime(&(naive + Duration::hours(1)))
                .earliest()
        })
        .unwrap_or(now + Duration::days(days_ahead.max(1)))
}

/// Drives a job according to a [`Schedule`].
///
/// A failing run is logged and the schedule carries on.
pub struct Scheduler<J> {
    schedule: Schedule,
    poll: StdDuration,
    next_due: Option<DateTime<Local>>,
    job: J,
}

impl<J, E> Scheduler<J>
where
    J: FnMut() -> Result<(), E>,
    E: std::fmt::Display,
{
    pub fn new(schedule: Schedule, poll: StdDuration, job: J) -> Self {
        Self {
            schedule,
            poll,
            next_due: None,
            job,
        }
    }

    pub fn next_due(&self) -> Option<DateTime<Local>> {
        self.next_due
    }

    /// Runs the job if it is due at `now`. Returns whether it ran.
    pub fn run_pending(&mut self, now: DateTime<Local>) -> bool {
        let due = *self
            .next_due
            .get_or_insert_with(|| self.schedule.first_due(now));
        if now < due {
            return false;
        }

        tracing::info!("scheduled organization started");
        match (self.job)() {
            Ok(()) => tracing::info!("scheduled organization completed"),
            Err(err) => tracing::error!(error = %err, "scheduled organization failed"),
        }

        let next = self.schedule.next_after(now);
        tracing::info!(next = %next.format("%Y-%m-%d %H:%M"), "next organization scheduled");
        self.next_due = Some(next);
        true
    }

    /// Polls until `stop` is raised.
    pub fn run_until(&mut self, stop: &AtomicBool) {
        tracing::info!(schedule = %self.schedule, "scheduler started");
        while !stop.load(Ordering::SeqCst) {
            self.run_pending(Local::now());
            self.sleep_unless_stopped(stop);
        }
        tracing::info!("scheduler stopped");
    }

    fn sleep_unless_stopped(&self, stop: &AtomicBool) {
        let slice = StdDuration::from_millis(250).min(self.poll);
        let mut slept = StdDuration::ZERO;
        while slept < self.poll && !stop.load(Ordering::SeqCst) {
            std::thread::sleep(slice);
            slept += slice;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn at(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 20, h, m, 0).unwrap()
    }

    fn config(interval: u64, daily_at: Option<&str>) -> ScheduleConfig {
        ScheduleConfig {
            interval_minutes: interval,
            daily_at: daily_at.map(str::to_string),
            poll_seconds: 60,
        }
    }

    #[test]
    fn test_from_config() {
        assert_eq!(
            Schedule::from_config(&config(60, None)).unwrap(),
            Schedule::Interval(Duration::minutes(60))
        );
        assert_eq!(
            Schedule::from_config(&config(60, Some("10:30"))).unwrap(),
            Schedule::Daily(NaiveTime::from_hms_opt(10, 30, 0).unwrap())
        );
        assert!(Schedule::from_config(&config(0, None)).is_err());
        assert!(Schedule::from_config(&config(60, Some("half past ten"))).is_err());
    }

    #[test]
    fn test_next_after_daily() {
        let schedule = Schedule::Daily(NaiveTime::from_hms_opt(10, 30, 0).unwrap());

        assert_eq!(schedule.next_after(at(9, 0)), at(10, 30));
        assert_eq!(
            schedule.next_after(at(10, 30)),
            Local.with_ymd_and_hms(2024, 5, 21, 10, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_interval_runs_immediately_then_waits() {
        let runs = Cell::new(0);
        let mut scheduler = Scheduler::new(
            Schedule::Interval(Duration::minutes(60)),
            StdDuration::from_secs(60),
            || -> Result<(), String> {
                runs.set(runs.get() + 1);
                Ok(())
            },
        );

        assert!(scheduler.run_pending(at(8, 0)));
        assert_eq!(scheduler.next_due(), Some(at(9, 0)));
        assert!(!scheduler.run_pending(at(8, 59)));
        assert!(scheduler.run_pending(at(9, 0)));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_daily_waits_for_time_of_day() {
        let runs = Cell::new(0);
        let mut scheduler = Scheduler::new(
            Schedule::Daily(NaiveTime::from_hms_opt(10, 30, 0).unwrap()),
            StdDuration::from_secs(60),
            || -> Result<(), String> {
                runs.set(runs.get() + 1);
                Ok(())
            },
        );

        assert!(!scheduler.run_pending(at(9, 0)));
        assert!(!scheduler.run_pending(at(10, 29)));
        assert!(scheduler.run_pending(at(10, 30)));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_failed_run_keeps_schedule() {
        let mut scheduler = Scheduler::new(
            Schedule::Interval(Duration::minutes(5)),
            StdDuration::from_secs(60),
            || -> Result<(), &str> { Err("target directory vanished") },
        );

        assert!(scheduler.run_pending(at(8, 0)));
        assert_eq!(scheduler.next_due(), Some(at(8, 5)));
    }

    #[test]
    fn test_run_until_honours_stop_flag() {
        let stop = AtomicBool::new(false);
        let runs = Cell::new(0);
        let mut scheduler = Scheduler::new(
            Schedule::Interval(Duration::minutes(1)),
            StdDuration::from_secs(3600),
            || -> Result<(), String> {
                runs.set(runs.get() + 1);
                stop.store(true, Ordering::SeqCst);
                Ok(())
            },
        );

        scheduler.run_until(&stop);
        assert_eq!(runs.get(), 1);
    }
}
