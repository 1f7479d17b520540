use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use admit_limit::Governor;
use admit_limit::QuotaTier;
use admit_limit::Suppressor;
use hdrhistogram::Histogram;
use http::Request;
use http::Response;
use rand::Rng;
use tokio::sync::Barrier;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tower::BoxError;
use tower::Layer;
use tower::Service;
use tower::ServiceExt;
use tower::service_fn;
use tower_admit::AdmitError;
use tower_admit::GovernorLayer;

async fn mock_read(_req: Request<()>) -> Result<Response<&'static str>, BoxError> {
    // Simulate a storage round trip
    sleep(Duration::from_millis(5)).await;
    Ok(Response::new("document"))
}

#[derive(Default)]
struct RejectionCounter {
    too_fast: usize,
    unknown_client: usize,
    inner: usize,
    other: usize,
}

async fn run_load_test<S>(name: &str, svc: S, clients: usize, total_reqs: usize)
where
    S: Service<Request<()>, Response = Response<&'static str>, Error = BoxError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    let mut hist_elapsed = Histogram::<u64>::new_with_bounds(1, 60_000_000, 3).unwrap();

    let mut tasks = JoinSet::new();
    let mut rejections = RejectionCounter::default();
    let barrier = Arc::new(Barrier::new(total_reqs));

    let start = Instant::now();

    let mut rng = rand::rng();
    for _ in 0..total_reqs {
        let client = rng.random_range(0..clients);
        let ip = format!("10.{}.{}.{}", client >> 16, (client >> 8) & 0xff, client & 0xff);
        let req = Request::builder()
            .header("x-forwarded-for", ip)
            .body(())
            .unwrap();
        let local_svc = svc.clone();
        let bar = barrier.clone();
        tasks.spawn(async move {
            bar.wait().await;
            let req_start = Instant::now();
            let res = local_svc.oneshot(req).await;
            (res, req_start.elapsed())
        });
    }

    let mut success_count = 0;

    while let Some(task) = tasks.join_next().await {
        let (res, elapsed) = task.expect("Task panicked");
        match res {
            Ok(_) => {
                success_count += 1;
                hist_elapsed.record(elapsed.as_micros() as u64).unwrap();
            }
            Err(e) => match e.downcast_ref::<AdmitError>() {
                Some(AdmitError::TooFast { .. }) => rejections.too_fast += 1,
                Some(AdmitError::UnknownClient) => rejections.unknown_client += 1,
                Some(AdmitError::Inner(_)) => rejections.inner += 1,
                None => rejections.other += 1,
            },
        }
    }

    let total_duration = start.elapsed();
    let throughput = total_reqs as f64 / total_duration.as_secs_f64();
    let goodput = success_count as f64 / total_duration.as_secs_f64();

    println!("--- {} ({} clients) ---", name, clients);
    println!("Total Duration:  {:.2?}", total_duration);
    println!("Success/Total:   {}/{}", success_count, total_reqs);
    println!("Total Rate:      {:.2} req/sec", throughput);
    println!("Success Rate:    {:.2} req/sec (Goodput)", goodput);

    if success_count > 0 {
        println!("P50 (Elapsed):   {}µs", hist_elapsed.value_at_quantile(0.5));
        println!(
            "P99 (Elapsed):   {}µs",
            hist_elapsed.value_at_quantile(0.99)
        );
    }

    let total_errors =
        rejections.too_fast + rejections.unknown_client + rejections.inner + rejections.other;
    println!("Errors:          {}", total_errors);
    if total_errors > 0 {
        println!("  └─ TooFast:    {}", rejections.too_fast);
        if rejections.unknown_client > 0 {
            println!("  └─ Unknown:    {}", rejections.unknown_client);
        }
        if rejections.inner + rejections.other > 0 {
            println!("  └─ Inner:      {}", rejections.inner + rejections.other);
        }
    }
    println!();
}

fn tiers() -> Vec<QuotaTier> {
    vec![
        QuotaTier::new(3, Duration::from_secs(1)),
        QuotaTier::new(60, Duration::from_secs(60)),
    ]
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let total_reqs = 50_000;

    for clients in [10, 1_000, 100_000] {
        let governor = Arc::new(Governor::new(tiers()));
        let svc = GovernorLayer::new(governor.clone()).layer(service_fn(mock_read));
        run_load_test("Two Tier Governor", svc, clients, total_reqs).await;
        println!("Tracked clients: {}\n", governor.len());
    }

    // Suppressor throughput over a realistic number of distinct pairs.
    let views: Suppressor = Suppressor::new();
    let start = Instant::now();
    let mut applied = 0;
    let mut rng = rand::rng();
    for _ in 0..total_reqs {
        let document = rng.random_range(0..500).to_string();
        let client = rng.random_range(0..1_000).to_string();
        if views.should_apply(document, client) {
            applied += 1;
        }
    }
    println!("--- Suppressor ---");
    println!("Duration:        {:.2?}", start.elapsed());
    println!("Applied/Total:   {}/{}", applied, total_reqs);
    println!("Tracked pairs:   {}", views.len());

    Ok(())
}
