use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Run `beat` every `period`, first tick one period from now. The task ends
/// when a beat resolves to false. A zero period is raised to 1ms.
pub fn spawn<F, Fut>(period: Duration, mut beat: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    let period = period.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if !beat().await {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn beats_every_period_until_told_to_stop() {
        let beats = Arc::new(AtomicU32::new(0));
        let counter = beats.clone();
        let handle = spawn(Duration::from_secs(30), move || {
            let counter = counter.clone();
            async move { counter.fetch_add(1, Ordering::SeqCst) < 2 }
        });

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(beats.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(beats.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(beats.load(Ordering::SeqCst), 3);
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_is_raised_instead_of_panicking() {
        let beats = Arc::new(AtomicU32::new(0));
        let counter = beats.clone();
        let handle = spawn(Duration::ZERO, move || {
            let counter = counter.clone();
            async move { counter.fetch_add(1, Ordering::SeqCst) < 4 }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(beats.load(Ordering::SeqCst), 5);
        assert!(handle.is_finished());
    }
}
