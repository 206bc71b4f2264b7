//! Runs sub-operations as tokio local tasks and awaits the combined outcome.
//!
//! Every trace event of the latch machinery is printed to stdout.

use std::time::Duration;

use holdfast::{LatchPool, SpawnLocal};
use tokio::task::{self, LocalSet};
use tokio::time;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    LocalSet::new()
        .run_until(async {
            let pool = LatchPool::builder(SpawnLocal).initial_capacity(4).build();

            for round in 0..3_u64 {
                let latch = pool.acquire();

                for worker in 0..4_u64 {
                    let hold = latch.hold();

                    task::spawn_local(async move {
                        time::sleep(Duration::from_millis(worker.saturating_mul(5))).await;

                        if worker == round {
                            hold.fail(format!("worker {worker} gave up in round {round}"));
                        } else {
                            hold.release();
                        }
                    });
                }

                match latch.go_async().await {
                    Some(Ok(())) => println!("round {round}: ok"),
                    Some(Err(errors)) => println!("round {round}: {errors}"),
                    None => unreachable!("the callback was registered by this call"),
                }
            }

            println!(
                "pool holds {} state(s), {} idle",
                pool.len(),
                pool.idle_len()
            );
        })
        .await;
}
