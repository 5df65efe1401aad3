//! In-memory `ContribStore` mirroring the Postgres semantics, for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use shared::{Counts, Provider, Window};
use uuid::Uuid;

use super::{ContribStore, ScoreRow, TotalsRecord};

#[derive(Default)]
pub(crate) struct MemStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    daily: HashMap<(Uuid, Provider, NaiveDate), Counts>,
    totals: HashMap<(Uuid, Provider), TotalsRecord>,
}

impl MemStore {
    pub(crate) fn daily_counts(
        &self,
        user_id: Uuid,
        provider: Provider,
        day: NaiveDate,
    ) -> Option<Counts> {
        self.inner
            .lock()
            .unwrap()
            .daily
            .get(&(user_id, provider, day))
            .copied()
    }

    pub(crate) fn daily_rows(&self, user_id: Uuid, provider: Provider) -> usize {
        self.inner
            .lock()
            .unwrap()
            .daily
            .keys()
            .filter(|(user, p, _)| *user == user_id && *p == provider)
            .count()
    }

    pub(crate) fn totals(&self, user_id: Uuid, provider: Provider) -> Option<TotalsRecord> {
        self.inner
            .lock()
            .unwrap()
            .totals
            .get(&(user_id, provider))
            .cloned()
    }

    /// Seeds a totals row directly, bypassing the daily rows.
    pub(crate) fn set_totals(&self, record: TotalsRecord) {
        self.inner
            .lock()
            .unwrap()
            .totals
            .insert((record.user_id, record.provider), record);
    }
}

#[async_trait]
impl ContribStore for MemStore {
    async fn upsert_daily(
        &self,
        user_id: Uuid,
        provider: Provider,
        day: NaiveDate,
        counts: Counts,
    ) -> anyhow::Result<()> {
        self.inner
            .lock()
            .unwrap()
            .daily
            .insert((user_id, provider, day), counts);
        Ok(())
    }

    async fn recompute_totals(
        &self,
        user_id: Uuid,
        provider: Provider,
        now: DateTime<Utc>,
    ) -> anyhow::Result<TotalsRecord> {
        let today = now.date_naive();
        let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);

        let mut inner = self.inner.lock().unwrap();
        let record = {
            let sum_window = |lower: Option<NaiveDate>| -> i64 {
                inner
                    .daily
                    .iter()
                    .filter(|((user, p, day), _)| {
                        *user == user_id
                            && *p == provider
                            && *day < tomorrow
                            && lower.map_or(true, |lower| *day >= lower)
                    })
                    .map(|(_, counts)| counts.total())
                    .sum()
            };

            TotalsRecord {
                user_id,
                provider,
                all_time: sum_window(None),
                last_30d: sum_window(Window::Last30d.lower_bound(today)),
                last_365d: sum_window(Window::Last365d.lower_bound(today)),
            }
        };
        inner.totals.insert((user_id, provider), record.clone());
        Ok(record)
    }

    async fn totals_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<TotalsRecord>> {
        let mut records: Vec<TotalsRecord> = self
            .inner
            .lock()
            .unwrap()
            .totals
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by_key(|record| record.provider.as_str());
        Ok(records)
    }

    async fn combined_page(
        &self,
        window: Window,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<ScoreRow>> {
        let mut by_user: HashMap<Uuid, i64> = HashMap::new();
        for record in self.inner.lock().unwrap().totals.values() {
            *by_user.entry(record.user_id).or_default() += record.window_total(window);
        }
        Ok(paginate(by_user.into_iter().collect(), limit, offset))
    }

    async fn provider_page(
        &self,
        provider: Provider,
        window: Window,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<ScoreRow>> {
        let rows: Vec<(Uuid, i64)> = self
            .inner
            .lock()
            .unwrap()
            .totals
            .values()
            .filter(|record| record.provider == provider)
            .map(|record| (record.user_id, record.window_total(window)))
            .collect();
        Ok(paginate(rows, limit, offset))
    }
}

fn paginate(mut rows: Vec<(Uuid, i64)>, limit: i64, offset: i64) -> Vec<ScoreRow> {
    rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    rows.into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .map(|(user_id, score)| ScoreRow { user_id, score })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn noon(day: NaiveDate) -> DateTime<Utc> {
        shared::day_start_utc(day) + chrono::Duration::hours(12)
    }

    #[tokio::test]
    async fn windowed_sums_match_exact_ranges() {
        let store = MemStore::default();
        let user = Uuid::new_v4();
        let now_day = date(2025, 6, 30);

        // One commit per day for 400 consecutive days ending "today".
        let mut day = now_day;
        for _ in 0..400 {
            store
                .upsert_daily(user, Provider::Github, day, Counts::new(1, 0, 0))
                .await
                .unwrap();
            day = day.pred_opt().unwrap();
        }

        let totals = store
            .recompute_totals(user, Provider::Github, noon(now_day))
            .await
            .unwrap();

        assert_eq!(totals.all_time, 400);
        // [today - 30, tomorrow) spans 31 stored days.
        assert_eq!(totals.last_30d, 31);
        assert_eq!(totals.last_365d, 366);
    }

    #[tokio::test]
    async fn totals_ignore_other_users_and_providers() {
        let store = MemStore::default();
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        let day = date(2025, 1, 5);

        store
            .upsert_daily(user, Provider::Github, day, Counts::new(1, 2, 3))
            .await
            .unwrap();
        store
            .upsert_daily(user, Provider::Gitlab, day, Counts::new(10, 0, 0))
            .await
            .unwrap();
        store
            .upsert_daily(other, Provider::Github, day, Counts::new(100, 0, 0))
            .await
            .unwrap();

        let totals = store
            .recompute_totals(user, Provider::Github, noon(day))
            .await
            .unwrap();
        assert_eq!(totals.all_time, 6);
    }

    #[tokio::test]
    async fn five_increasing_days_sum_across_windows() {
        let store = MemStore::default();
        let user = Uuid::new_v4();

        for (offset, commits) in [1i64, 2, 3, 4, 5].into_iter().enumerate() {
            let day = date(2025, 1, 1) + chrono::Days::new(offset as u64);
            store
                .upsert_daily(user, Provider::Github, day, Counts::new(commits, 0, 0))
                .await
                .unwrap();
        }

        let totals = store
            .recompute_totals(user, Provider::Github, noon(date(2025, 1, 5)))
            .await
            .unwrap();
        assert_eq!(totals.all_time, 15);
        assert_eq!(totals.last_30d, 15);
        assert_eq!(totals.last_365d, 15);
    }
}
