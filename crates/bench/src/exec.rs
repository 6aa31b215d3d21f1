//! VU executors: the load shapes iteration bodies run under.
//!
//! A body is an async closure taking the VU index; it is re-invoked in a
//! loop until the executor's clock runs out. Shutdown is graceful:
//! cancellation is observed between iterations, with a hard stop if an
//! iteration overstays.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const GRACEFUL_STOP: Duration = Duration::from_secs(30);

/// One step of a ramping profile: linearly move to `target` VUs over
/// `duration`.
#[derive(Debug, Clone, Copy)]
pub struct Stage {
    pub duration: Duration,
    pub target: usize,
}

/// Fixed pool of `vus` workers, each looping the body until `duration`
/// elapses.
pub async fn constant_vus<F, Fut>(vus: usize, duration: Duration, body: F)
where
    F: Fn(usize) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let cancel = CancellationToken::new();
    let mut workers = JoinSet::new();
    for vu in 0..vus {
        workers.spawn(worker_loop(vu, body.clone(), cancel.clone()));
    }

    tokio::time::sleep(duration).await;
    cancel.cancel();
    drain(workers).await;
}

/// Walks the stages, resizing the worker pool once per second toward each
/// stage's target. All workers are cancelled when the last stage ends.
pub async fn ramping_vus<F, Fut>(stages: &[Stage], body: F)
where
    F: Fn(usize) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut workers = JoinSet::new();
    let mut tokens: Vec<CancellationToken> = Vec::new();
    let mut spawned = 0usize;

    for stage in stages {
        let from = tokens.len();
        let steps = stage.duration.as_secs().max(1);
        for step in 1..=steps {
            let want = interpolate(from, stage.target, step, steps);
            while tokens.len() < want {
                let token = CancellationToken::new();
                workers.spawn(worker_loop(spawned, body.clone(), token.clone()));
                tokens.push(token);
                spawned += 1;
            }
            while tokens.len() > want {
                if let Some(token) = tokens.pop() {
                    token.cancel();
                }
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    for token in tokens {
        token.cancel();
    }
    drain(workers).await;
}

/// Starts `rate` iterations per second for `duration`, independent of how
/// long each takes, on a pool of at most `max_vus` concurrent iterations.
/// Ticks with no free VU are dropped with a warning.
pub async fn constant_arrival_rate<F, Fut>(rate: u32, duration: Duration, max_vus: usize, body: F)
where
    F: Fn(usize) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_vus));
    let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(rate.max(1))));
    let deadline = Instant::now() + duration;
    let mut iterations = JoinSet::new();
    let mut iteration = 0usize;

    while Instant::now() < deadline {
        interval.tick().await;
        match semaphore.clone().try_acquire_owned() {
            Ok(permit) => {
                let body = body.clone();
                let vu = iteration;
                iterations.spawn(async move {
                    body(vu).await;
                    drop(permit);
                });
            }
            Err(_) => tracing::warn!("all {max_vus} VUs busy, dropping iteration"),
        }
        iteration += 1;
    }
    drain(iterations).await;
}

async fn worker_loop<F, Fut>(vu: usize, body: F, cancel: CancellationToken)
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = ()>,
{
    while !cancel.is_cancelled() {
        body(vu).await;
    }
}

async fn drain(mut workers: JoinSet<()>) {
    let all_done = async {
        while workers.join_next().await.is_some() {}
    };
    if tokio::time::timeout(GRACEFUL_STOP, all_done).await.is_err() {
        tracing::warn!("graceful stop expired, aborting remaining iterations");
        workers.abort_all();
        while workers.join_next().await.is_some() {}
    }
}

fn interpolate(from: usize, to: usize, step: u64, steps: u64) -> usize {
    let from = from as f64;
    let to = to as f64;
    (from + (to - from) * step as f64 / steps as f64).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn constant_vus_stops_after_duration() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        constant_vus(3, Duration::from_millis(100), move |_vu| {
            let count = seen.clone();
            async move {
                count.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        let after = count.load(Ordering::Relaxed);
        assert!(after > 0);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::Relaxed), after);
    }

    #[tokio::test(start_paused = true)]
    async fn arrival_rate_is_capped_by_max_vus() {
        let started = Arc::new(AtomicUsize::new(0));
        let seen = started.clone();
        // Each iteration takes 10s, so with 2 VUs only 2 can ever start
        // inside a 1s run at 10/s.
        constant_arrival_rate(10, Duration::from_secs(1), 2, move |_vu| {
            let started = seen.clone();
            async move {
                started.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
        })
        .await;

        assert_eq!(started.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn interpolation_hits_target_on_last_step() {
        assert_eq!(interpolate(0, 10, 10, 10), 10);
        assert_eq!(interpolate(0, 10, 5, 10), 5);
        assert_eq!(interpolate(10, 0, 10, 10), 0);
    }
}
