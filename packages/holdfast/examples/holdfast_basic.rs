//! Fans out work to several sub-operations and collects their errors in one callback.

use holdfast::{LatchPool, TickQueue};

fn main() {
    let queue = TickQueue::new();
    let pool = LatchPool::new(queue.clone());

    let latch = pool.acquire();

    let uploads = ["a.txt", "b.txt", "c.txt"]
        .into_iter()
        .map(|name| (name, latch.hold()))
        .collect::<Vec<_>>();

    latch.go(|outcome| match outcome {
        Ok(()) => println!("all uploads finished"),
        Err(errors) => {
            println!("{} upload(s) failed:", errors.len());

            for error in &errors {
                println!("  hold {}: {error}", error.slot());
            }
        }
    });

    for (name, hold) in &uploads {
        if *name == "b.txt" {
            hold.fail(format!("{name}: quota exceeded"));
        } else {
            hold.release();
        }
    }

    // Nothing has been printed yet. The callback runs when the host drains its queue.
    let ran = queue.run_until_idle();
    println!("ran {ran} deferred task(s)");
}
