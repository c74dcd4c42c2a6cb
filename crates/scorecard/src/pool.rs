//! Bounded fork/join pool over indexed work units.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

/// Shared cancellation flag. Set it to stop handing out new work units;
/// units already running finish normally.
pub type CancelToken = Arc<AtomicBool>;

pub fn cancel_token() -> CancelToken {
    Arc::new(AtomicBool::new(false))
}

/// Run `work` over every item on at most `workers` scoped threads.
///
/// Results come back in item order. An item is `None` when cancellation was
/// observed before it was started.
pub fn run_indexed<T, R, F>(
    items: &[T],
    workers: usize,
    cancel: Option<&AtomicBool>,
    work: F,
) -> Vec<Option<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let mut results: Vec<Option<R>> = (0..items.len()).map(|_| None).collect();
    if items.is_empty() {
        return results;
    }

    let workers = workers.clamp(1, items.len());
    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<(usize, R)>();

    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let next = &next;
            let work = &work;
            scope.spawn(move || loop {
                if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                    break;
                }
                let index = next.fetch_add(1, Ordering::Relaxed);
                let Some(item) = items.get(index) else {
                    break;
                };
                if tx.send((index, work(item))).is_err() {
                    break;
                }
            });
        }
    });
    drop(tx);

    for (index, result) in rx {
        results[index] = Some(result);
    }
    results
}
