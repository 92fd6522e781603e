use chrono::Duration as ChronoDuration;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flashsale_rust::clock::{Clock, RuntimeClock};
use flashsale_rust::countdown::{CountdownTimer, SaleStatus};

fn recorder() -> (Arc<Mutex<Vec<SaleStatus>>>, impl FnMut(SaleStatus) + Send + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |status| sink.lock().unwrap().push(status))
}

#[tokio::test(start_paused = true)]
async fn test_each_transition_fires_once() {
    let clock = Arc::new(RuntimeClock::new());
    let now = clock.now();
    let (seen, on_change) = recorder();

    let timer = CountdownTimer::spawn(
        now + ChronoDuration::milliseconds(1000),
        now + ChronoDuration::milliseconds(2000),
        clock.clone(),
        Duration::from_millis(1000),
        on_change,
    );
    assert_eq!(timer.status(), SaleStatus::Upcoming);
    assert!(seen.lock().unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(*seen.lock().unwrap(), vec![SaleStatus::Active]);
    assert_eq!(timer.status(), SaleStatus::Active);

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(*seen.lock().unwrap(), vec![SaleStatus::Active, SaleStatus::Ended]);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(seen.lock().unwrap().len(), 2);
    assert!(timer.is_finished());
    assert_eq!(timer.latest().remaining, None);
}

#[tokio::test(start_paused = true)]
async fn test_past_window_reports_ended_immediately() {
    let clock = Arc::new(RuntimeClock::new());
    let now = clock.now();
    let (seen, on_change) = recorder();

    let timer = CountdownTimer::spawn(
        now - ChronoDuration::hours(2),
        now - ChronoDuration::hours(1),
        clock,
        Duration::from_millis(1000),
        on_change,
    );
    assert_eq!(*seen.lock().unwrap(), vec![SaleStatus::Ended]);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert!(timer.is_finished());
}

#[tokio::test(start_paused = true)]
async fn test_dropped_timer_stops_ticking() {
    let clock = Arc::new(RuntimeClock::new());
    let now = clock.now();
    let (seen, on_change) = recorder();

    let timer = CountdownTimer::spawn(
        now + ChronoDuration::milliseconds(1000),
        now + ChronoDuration::milliseconds(2000),
        clock,
        Duration::from_millis(1000),
        on_change,
    );
    let mut updates = timer.subscribe();
    drop(timer);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(seen.lock().unwrap().is_empty());
    assert!(updates.changed().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_see_every_tick() {
    let clock = Arc::new(RuntimeClock::new());
    let now = clock.now();

    let timer = CountdownTimer::spawn(
        now + ChronoDuration::seconds(3),
        now + ChronoDuration::seconds(10),
        clock,
        Duration::from_millis(1000),
        |_| {},
    );
    let mut updates = timer.subscribe();

    updates.changed().await.unwrap();
    let evaluation = *updates.borrow();
    assert_eq!(evaluation.status, SaleStatus::Upcoming);
    assert_eq!(evaluation.remaining.map(|r| r.seconds), Some(2));
    assert_eq!(evaluation.to_string(), "距离开始还有 00:00:02");
}
