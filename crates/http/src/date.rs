//! Cached value of the `Date` response header.
//!
//! Formatting an IMF-fixdate on every response is wasted work when the value only changes once
//! a second, so one process-wide value is kept in an [`ArcSwap`] and refreshed by a background
//! task started with [`DateService::run_refresh`].

use std::time::Duration;

use arc_swap::ArcSwap;
use bytes::Bytes;
use once_cell::sync::Lazy;

#[derive(Debug)]
pub struct DateService {
    current: ArcSwap<Bytes>,
}

static DATE_SERVICE: Lazy<DateService> = Lazy::new(|| DateService { current: ArcSwap::from_pointee(render()) });

fn render() -> Bytes {
    let mut buf = faf_http_date::get_date_buff_no_key();
    faf_http_date::get_date_no_key(&mut buf);
    Bytes::from_owner(buf)
}

impl DateService {
    /// Returns the process-wide instance.
    pub fn global() -> &'static DateService {
        &DATE_SERVICE
    }

    /// Re-renders the cached value from the current system time.
    pub fn refresh(&self) {
        self.current.store(render().into());
    }

    pub fn with_http_date<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[u8]) -> R,
    {
        let guard = self.current.load();
        let date: &[u8] = &guard;
        f(date)
    }

    /// Refreshes the cached value every `interval`, forever.
    ///
    /// Spawn it on whichever runtime owns the acceptor; an idle process without this task
    /// keeps serving the value rendered at startup.
    pub async fn run_refresh(&'static self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.refresh();
        }
    }
}
