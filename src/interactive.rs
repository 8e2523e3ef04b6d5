use std::num::NonZeroUsize;

use log::info;
use rand::{rngs::StdRng, Rng};
use tokio_util::sync::CancellationToken;

use crate::{
    gradient::Gradienter,
    interrupt::{CtrlC, InterruptSource, Observer},
    samples::SampleSet,
    sgd::Sgd,
    stats::TrainStats,
    Result,
};

/// Runs single-epoch SGD passes until the user interrupts.
///
/// Cancellation is only observed between epochs: once before the epoch's hook
/// and once after it. An epoch that has started always runs all of its batches.
pub struct InteractiveTrainer<R: Rng = StdRng> {
    sgd: Sgd<R>,
}

impl<R: Rng> InteractiveTrainer<R> {
    /// Returns a new `InteractiveTrainer` running epochs with `sgd`.
    pub fn new(sgd: Sgd<R>) -> Self {
        Self { sgd }
    }

    /// Trains until `source` delivers its first interrupt.
    ///
    /// A background observer is armed before the first epoch and torn down before
    /// returning. `samples` is copied once and the copy is reshuffled every epoch.
    ///
    /// # Arguments
    /// * `gradienter` - Computes the gradient of each batch.
    /// * `samples` - The training samples.
    /// * `source` - Where the interrupt comes from, `CtrlC` in production.
    /// * `before_epoch` - Called before every epoch attempt, may take its time.
    ///
    /// # Returns
    /// The counters of the run.
    ///
    /// # Errors
    /// If the observer can't be started or `source` fails to arm.
    ///
    /// # Panics
    /// If called from within an asynchronous execution context, use
    /// `tokio::task::spawn_blocking` there.
    pub fn train<I, O, G, S>(
        &mut self,
        gradienter: &mut G,
        samples: &SampleSet<I, O>,
        source: S,
        before_epoch: Option<&mut dyn FnMut()>,
    ) -> Result<TrainStats>
    where
        I: Clone,
        O: Clone,
        G: Gradienter<I, O> + ?Sized,
        S: InterruptSource,
    {
        let killed = CancellationToken::new();
        let observer = Observer::spawn(source, killed.clone())?;

        info!(
            "interactive training over {} samples, interrupt to stop",
            samples.len()
        );
        let stats = self.run_until_killed(gradienter, samples, &killed, before_epoch);
        drop(observer);

        info!(
            "interactive training stopped after {} epochs, {} steps",
            stats.epochs(),
            stats.batches()
        );
        Ok(stats)
    }

    /// Runs epochs until `killed` is cancelled, without observing any interrupt.
    ///
    /// `killed` is checked before calling `before_epoch` and again right after it
    /// returns; an epoch is only started if both checks pass.
    pub fn run_until_killed<I, O, G>(
        &mut self,
        gradienter: &mut G,
        samples: &SampleSet<I, O>,
        killed: &CancellationToken,
        mut before_epoch: Option<&mut dyn FnMut()>,
    ) -> TrainStats
    where
        I: Clone,
        O: Clone,
        G: Gradienter<I, O> + ?Sized,
    {
        let mut working = samples.clone();
        let mut stats = TrainStats::default();

        while !killed.is_cancelled() {
            if let Some(hook) = before_epoch.as_deref_mut() {
                hook();
            }

            if killed.is_cancelled() {
                break;
            }

            self.sgd.epoch(gradienter, &mut working, &mut stats);
        }

        stats
    }
}

/// Trains the gradienter's model until the user hits Ctrl+C.
///
/// The first Ctrl+C stops training before the next epoch, a second one
/// terminates the process.
pub fn sgd_interactive<I, O, G>(
    gradienter: &mut G,
    samples: &SampleSet<I, O>,
    step_size: f32,
    batch_size: NonZeroUsize,
    before_epoch: Option<&mut dyn FnMut()>,
) -> Result<TrainStats>
where
    I: Clone,
    O: Clone,
    G: Gradienter<I, O> + ?Sized,
{
    InteractiveTrainer::new(Sgd::new(step_size, batch_size)).train(
        gradienter,
        samples,
        CtrlC::new(),
        before_epoch,
    )
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{gradient::Gradient, samples::Batch};

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Event {
        Hook,
        Gradient(usize),
        Apply,
    }

    type Log = Rc<RefCell<Vec<Event>>>;

    /// Records every call and cancels `kill_on` once the `after`-th gradient is computed.
    struct Recorder {
        log: Log,
        kill_on: Option<(CancellationToken, usize)>,
        calls: usize,
    }

    struct Step(Log);

    impl Gradient for Step {
        fn add_to_vars(self, _scale: f32) {
            self.0.borrow_mut().push(Event::Apply);
        }
    }

    impl Gradienter<u8, u8> for Recorder {
        type Gradient = Step;

        fn gradient(&mut self, batch: Batch<'_, u8, u8>) -> Step {
            self.calls += 1;
            if let Some((token, after)) = &self.kill_on {
                if self.calls == *after {
                    token.cancel();
                }
            }

            self.log.borrow_mut().push(Event::Gradient(batch.len()));
            Step(Rc::clone(&self.log))
        }
    }

    fn recorder(log: &Log) -> Recorder {
        Recorder {
            log: Rc::clone(log),
            kill_on: None,
            calls: 0,
        }
    }

    fn trainer() -> InteractiveTrainer {
        InteractiveTrainer::new(Sgd::seeded(0.1, NonZeroUsize::new(3).unwrap(), 0))
    }

    fn samples(n: u8) -> SampleSet<u8, u8> {
        SampleSet::from_pairs((0..n).map(|i| (i, i)))
    }

    #[test]
    fn already_killed_runs_nothing() {
        let log = Log::default();
        let mut g = recorder(&log);
        let killed = CancellationToken::new();
        killed.cancel();

        let hook_log = Rc::clone(&log);
        let mut hook = || hook_log.borrow_mut().push(Event::Hook);
        let stats = trainer().run_until_killed(&mut g, &samples(10), &killed, Some(&mut hook));

        assert_eq!(stats, TrainStats::default());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn kill_during_the_hook_skips_that_epoch() {
        let log = Log::default();
        let mut g = recorder(&log);
        let killed = CancellationToken::new();

        let hook_log = Rc::clone(&log);
        let hook_kill = killed.clone();
        let mut hooks = 0;
        let mut hook = || {
            hook_log.borrow_mut().push(Event::Hook);
            hooks += 1;
            if hooks == 3 {
                hook_kill.cancel();
            }
        };
        let stats = trainer().run_until_killed(&mut g, &samples(10), &killed, Some(&mut hook));

        assert_eq!(stats.epochs(), 2);
        assert_eq!(stats.batches(), 8);

        let log = log.borrow();
        let hooks: Vec<_> = log
            .iter()
            .enumerate()
            .filter(|(_, e)| **e == Event::Hook)
            .map(|(i, _)| i)
            .collect();
        // Each epoch is 4 gradient + 4 apply events, always preceded by its hook.
        assert_eq!(hooks, [0, 9, 18]);
        assert_eq!(log.len(), 19);
    }

    #[test]
    fn kill_mid_epoch_finishes_the_epoch_without_a_hook() {
        let log = Log::default();
        let killed = CancellationToken::new();
        let mut g = Recorder {
            kill_on: Some((killed.clone(), 2)),
            ..recorder(&log)
        };

        let stats = trainer().run_until_killed(&mut g, &samples(10), &killed, None);

        assert_eq!(stats, TrainStats::new(1, 4, 10));
        let sizes: Vec<_> = log
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::Gradient(n) => Some(*n),
                _ => None,
            })
            .collect();
        assert_eq!(sizes, [3, 3, 3, 1]);
    }

    #[test]
    fn empty_samples_still_stop_when_killed() {
        let log = Log::default();
        let mut g = recorder(&log);
        let killed = CancellationToken::new();

        let hook_kill = killed.clone();
        let mut hooks = 0;
        let mut hook = || {
            hooks += 1;
            if hooks == 5 {
                hook_kill.cancel();
            }
        };
        let stats =
            trainer().run_until_killed(&mut g, &SampleSet::empty(), &killed, Some(&mut hook));

        assert_eq!(stats.epochs(), 4);
        assert_eq!(stats.batches(), 0);
        assert!(log.borrow().is_empty());
    }
}
