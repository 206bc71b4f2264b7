//! Latches driven by a tokio `LocalSet`, with sub-operations running as local tasks.

use std::cell::Cell;
use std::rc::Rc;

use holdfast::{Latch, LatchPool, SpawnLocal};
use tokio::task::{self, LocalSet};

#[tokio::test(flavor = "current_thread")]
async fn tasks_release_holds() {
    LocalSet::new()
        .run_until(async {
            let pool = LatchPool::new(SpawnLocal);
            let latch = pool.acquire();

            for i in 0..10_u32 {
                let hold = latch.hold();

                task::spawn_local(async move {
                    task::yield_now().await;

                    if i == 7 {
                        hold.fail(format!("task {i} failed"));
                    } else {
                        hold.release();
                    }
                });
            }

            let errors = latch.go_async().await.unwrap().unwrap_err();

            assert_eq!(errors.len(), 1);
            assert_eq!(errors.first().to_string(), "task 7 failed");
            assert_eq!(pool.active_len(), 0);
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn callback_is_not_run_inline() {
    LocalSet::new()
        .run_until(async {
            let latch = Latch::new(SpawnLocal);
            let called = Rc::new(Cell::new(false));

            let completed = latch.go({
                let called = Rc::clone(&called);
                move |outcome| {
                    assert!(outcome.is_ok());
                    called.set(true);
                }
            });

            assert!(completed);
            assert!(!called.get());

            // The callback runs as a local task once this one yields.
            for _ in 0..10 {
                if called.get() {
                    break;
                }

                task::yield_now().await;
            }

            assert!(called.get());
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn sequential_uses_recycle_one_state() {
    LocalSet::new()
        .run_until(async {
            let pool = LatchPool::new(SpawnLocal);

            for _ in 0..100 {
                let latch = pool.acquire();
                let hold = latch.hold();

                task::spawn_local(async move {
                    hold.release();
                });

                assert!(matches!(latch.go_async().await, Some(Ok(()))));
            }

            assert_eq!(pool.len(), 1);
        })
        .await;
}
