//! `scheduler` coalesces render requests for a single listing view into one
//! delayed render.
//!
//! At most one timer is pending at a time. Requests that arrive while it is
//! pending only widen the range it will deliver; once it fires the host gets
//! the widest range seen since the timer started, and the next request starts
//! a fresh timer.

use std::{
    cmp,
    ops::Range,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use structopt::StructOpt;
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::{self, JoinHandle},
    time::{self, Instant},
};

mod error;

pub use self::error::Error;

// Command line options that are required by the [`Scheduler`].
//
// These should be injected into the global `StructOpt` implementation using the
// `flatten` attribute.
#[derive(Clone, Debug, StructOpt)]
pub struct Opt {
    #[structopt(
        long,
        default_value = "20ms",
        env = "COLORTAG_DEBOUNCE_DELAY",
        parse(try_from_str = parse_duration::parse::parse),
        help = "how long to wait after scrolling before redrawing tags"
    )]
    debounce_delay: Duration,
}

impl Opt {
    pub fn delay(&self) -> Duration {
        self.debounce_delay
    }
}

/// `Scheduler` accepts render requests for one view.
#[derive(Debug, Clone)]
pub struct Scheduler {
    tx: UnboundedSender<Command>,
    quiet: Arc<AtomicUsize>,
}

/// The receiving end of a [`Scheduler`]: yields each range that is due for
/// rendering.
#[derive(Debug)]
pub struct Fired {
    rx: UnboundedReceiver<Range<usize>>,
}

/// `Worker` provides a future that, when awaited, waits for the timer task to
/// exit.
#[derive(Debug)]
pub struct Worker {
    handle: JoinHandle<Result<(), Error>>,
}

/// Suppresses scheduling while alive. See [`Scheduler::quiet`].
#[derive(Debug)]
pub struct Quiet {
    count: Arc<AtomicUsize>,
}

/// Spawns the timer task for a view, and returns the [`Scheduler`] used to
/// request renders, the [`Fired`] stream the host renders from, and the
/// [`Worker`] handle.
///
/// The task exits once every [`Scheduler`] clone has been dropped; a request
/// still pending at that point is discarded.
pub fn new(delay: Duration) -> (Scheduler, Fired, Worker) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (fired_tx, fired_rx) = mpsc::unbounded_channel();

    (
        Scheduler {
            tx,
            quiet: Arc::new(AtomicUsize::new(0)),
        },
        Fired { rx: fired_rx },
        Worker {
            handle: task::spawn(worker(delay, rx, fired_tx)),
        },
    )
}

impl Scheduler {
    /// Asks for `range` to be rendered after the debounce delay.
    ///
    /// Does nothing during a quiet period.
    pub fn request(&self, range: Range<usize>) -> Result<(), Error> {
        if self.is_quiet() {
            log::trace!("quiet; not scheduling a render of {:?}", range);
            return Ok(());
        }

        Ok(self.tx.send(Command::Request(range))?)
    }

    /// Drops the pending request, if any, without rendering it.
    pub fn cancel_pending(&self) -> Result<(), Error> {
        Ok(self.tx.send(Command::CancelPending)?)
    }

    /// Delivers the pending request, if any, without waiting for the timer.
    pub fn fire_now(&self) -> Result<(), Error> {
        Ok(self.tx.send(Command::FireNow)?)
    }

    /// Starts a quiet period that lasts until the returned guard is dropped.
    /// Requests made during a quiet period are discarded rather than queued.
    pub fn quiet(&self) -> Quiet {
        self.quiet.fetch_add(1, Ordering::SeqCst);
        Quiet {
            count: self.quiet.clone(),
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet.load(Ordering::SeqCst) > 0
    }
}

impl Fired {
    /// Waits for the next range to render. Returns `None` once the worker has
    /// exited.
    pub async fn recv(&mut self) -> Option<Range<usize>> {
        self.rx.recv().await
    }
}

impl Worker {
    /// Wait until the timer task is complete.
    ///
    /// All [`Scheduler`] objects related to this [`Worker`] must be dropped
    /// before this will return.
    pub async fn wait(self) -> Result<(), Error> {
        self.handle.await?
    }
}

impl Drop for Quiet {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
enum Command {
    Request(Range<usize>),
    CancelPending,
    FireNow,
}

#[derive(Debug)]
struct Pending {
    deadline: Instant,
    range: Range<usize>,
}

async fn worker(
    delay: Duration,
    mut rx: UnboundedReceiver<Command>,
    fired: UnboundedSender<Range<usize>>,
) -> Result<(), Error> {
    let mut pending: Option<Pending> = None;

    loop {
        let command = match pending.as_ref().map(|pending| pending.deadline) {
            Some(deadline) => tokio::select! {
                command = rx.recv() => command,
                _ = time::sleep_until(deadline) => {
                    if let Some(due) = pending.take() {
                        log::trace!("debounce timer fired for {:?}", &due.range);
                        fired.send(due.range)?;
                    }
                    continue;
                }
            },
            None => rx.recv().await,
        };

        match command {
            Some(Command::Request(range)) => match pending.as_mut() {
                Some(pending) => pending.range = hull(&pending.range, &range),
                None => {
                    pending = Some(Pending {
                        deadline: Instant::now() + delay,
                        range,
                    })
                }
            },
            Some(Command::CancelPending) => {
                if let Some(dropped) = pending.take() {
                    log::trace!("cancelled pending render of {:?}", dropped.range);
                }
            }
            Some(Command::FireNow) => {
                if let Some(due) = pending.take() {
                    fired.send(due.range)?;
                }
            }
            None => break,
        }
    }

    if let Some(dropped) = pending {
        log::debug!("scheduler closed with a render of {:?} pending", dropped.range);
    }

    Ok(())
}

/// The smallest range covering both `a` and `b`.
fn hull(a: &Range<usize>, b: &Range<usize>) -> Range<usize> {
    cmp::min(a.start, b.start)..cmp::max(a.end, b.end)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(20);

    async fn assert_nothing_fires(fired: &mut Fired) {
        assert!(time::timeout(Duration::from_secs(1), fired.recv())
            .await
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_coalesces_requests() {
        let (scheduler, mut fired, worker) = new(DELAY);
        let start = Instant::now();

        scheduler.request(0..5).unwrap();
        scheduler.request(30..40).unwrap();

        assert_eq!(fired.recv().await, Some(0..40));
        assert!(start.elapsed() >= DELAY);
        assert_nothing_fires(&mut fired).await;

        drop(scheduler);
        worker.wait().await.unwrap();
        assert_eq!(fired.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_timer_after_firing() {
        let (scheduler, mut fired, _worker) = new(DELAY);

        scheduler.request(0..5).unwrap();
        assert_eq!(fired.recv().await, Some(0..5));

        scheduler.request(10..12).unwrap();
        assert_eq!(fired.recv().await, Some(10..12));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_pending() {
        let (scheduler, mut fired, _worker) = new(DELAY);

        scheduler.request(0..5).unwrap();
        scheduler.cancel_pending().unwrap();
        assert_nothing_fires(&mut fired).await;

        // Cancelling with nothing pending is harmless.
        scheduler.cancel_pending().unwrap();
        scheduler.request(1..2).unwrap();
        assert_eq!(fired.recv().await, Some(1..2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_now() {
        let (scheduler, mut fired, _worker) = new(Duration::from_secs(60));
        let start = Instant::now();

        scheduler.request(3..9).unwrap();
        scheduler.fire_now().unwrap();

        assert_eq!(fired.recv().await, Some(3..9));
        assert!(start.elapsed() < Duration::from_secs(60));

        scheduler.fire_now().unwrap();
        assert_nothing_fires(&mut fired).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet() {
        let (scheduler, mut fired, _worker) = new(DELAY);

        {
            let _outer = scheduler.quiet();
            {
                let _inner = scheduler.quiet();
                assert!(scheduler.is_quiet());
            }
            assert!(scheduler.is_quiet());

            scheduler.request(0..5).unwrap();
            assert_nothing_fires(&mut fired).await;
        }

        assert!(!scheduler.is_quiet());
        scheduler.request(5..6).unwrap();
        assert_eq!(fired.recv().await, Some(5..6));
    }

    #[test]
    fn test_hull() {
        assert_eq!(hull(&(0..5), &(3..9)), 0..9);
        assert_eq!(hull(&(10..20), &(0..2)), 0..20);
        assert_eq!(hull(&(4..4), &(4..4)), 4..4);
    }
}
