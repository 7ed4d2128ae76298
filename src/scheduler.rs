// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-tick driver of the monitoring node.
//!
//! Every tick advances a clock by one second. Whenever the clock reaches the
//! configured [`LogRate`] a cycle runs: the temperature register is read,
//! fed into the [`Hysteresis`] and the control register is written if the
//! resulting intent differs from the one written last.

use std::time::Duration;

use tokio::time;

use crate::{
    client::{Reader, Writer},
    config::{LogRate, TargetTemperature},
    control::ControlIntent,
    hysteresis::{Hysteresis, ThermalState},
    CONTROL_REGISTER, TEMPERATURE_REGISTER,
};

/// Duration of a single tick.
pub const TICK: Duration = Duration::from_secs(1);

/// What a single cycle has done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Reading the temperature failed, nothing has been evaluated.
    Skipped,
    /// The intent has already been written before.
    Unchanged(ThermalState),
    /// The intent has been written.
    Written(ControlIntent),
    /// Writing the intent failed and will be retried next cycle.
    WriteFailed(ControlIntent),
}

/// Drives the read-evaluate-write cycle.
#[derive(Debug, Clone)]
pub struct PollScheduler {
    rate: LogRate,
    clock: u64,
    target: TargetTemperature,
    hysteresis: Hysteresis,
    last_written: Option<ControlIntent>,
}

impl PollScheduler {
    /// The first cycle runs on the first tick.
    #[must_use]
    pub fn new(rate: LogRate, target: TargetTemperature) -> Self {
        Self {
            rate,
            clock: rate.seconds() - 1,
            target,
            hysteresis: Hysteresis::new(),
            last_written: None,
        }
    }

    #[must_use]
    pub const fn hysteresis(&self) -> &Hysteresis {
        &self.hysteresis
    }

    #[must_use]
    pub const fn last_written(&self) -> Option<ControlIntent> {
        self.last_written
    }

    /// Advance the clock by one tick and run a cycle when it is due.
    pub async fn tick<C>(&mut self, link: &mut C) -> Option<CycleOutcome>
    where
        C: Reader + Writer + ?Sized,
    {
        self.clock += 1;
        log::debug!("Clock time: {}", self.clock);
        if self.clock < self.rate.seconds() {
            return None;
        }
        log::debug!("Clock has reached logging rate");
        self.clock = 0;
        Some(self.cycle(link).await)
    }

    /// Tick once per second, forever.
    pub async fn run<C>(mut self, link: &mut C)
    where
        C: Reader + Writer + ?Sized,
    {
        loop {
            time::sleep(TICK).await;
            self.tick(link).await;
        }
    }

    async fn cycle<C>(&mut self, link: &mut C) -> CycleOutcome
    where
        C: Reader + Writer + ?Sized,
    {
        let sample = match link.read_holding_registers(TEMPERATURE_REGISTER, 1).await {
            Ok(Ok(words)) => match words.first() {
                Some(word) => *word,
                None => return CycleOutcome::Skipped,
            },
            Ok(Err(exception)) => {
                log::error!("Failed to read register: {exception}");
                return CycleOutcome::Skipped;
            }
            Err(err) => {
                log::error!("Failed to read register: {err}");
                return CycleOutcome::Skipped;
            }
        };
        log::info!("Current CPU temperature of server: [{sample}]");

        let state = self.hysteresis.evaluate(sample, self.target.millidegrees());
        let intent = state.intent();
        if self.last_written == Some(intent) {
            log::debug!("Intent {intent} already written");
            return CycleOutcome::Unchanged(state);
        }

        log::debug!("Requesting {intent}");
        match link
            .write_single_register(CONTROL_REGISTER, intent.register_value())
            .await
        {
            Ok(Ok(())) => {
                log::info!("Write to server complete - {intent} demanded");
                self.last_written = Some(intent);
                CycleOutcome::Written(intent)
            }
            Ok(Err(exception)) => {
                log::error!("Failed to write register: {exception}");
                CycleOutcome::WriteFailed(intent)
            }
            Err(err) => {
                log::error!("Failed to write register: {err}");
                CycleOutcome::WriteFailed(intent)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;

    use crate::{
        client::Client, Error, ExceptionCode, Request, Response, Result, Word,
    };

    use super::*;

    /// Serves queued temperature samples and records writes.
    #[derive(Debug, Default)]
    struct LinkMock {
        samples: VecDeque<Word>,
        writes: Vec<Word>,
        reject_writes: bool,
    }

    impl LinkMock {
        fn with_samples(samples: impl IntoIterator<Item = Word>) -> Self {
            Self {
                samples: samples.into_iter().collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl Client for LinkMock {
        async fn call(&mut self, request: Request) -> Result<Response> {
            match request {
                Request::ReadHoldingRegisters(TEMPERATURE_REGISTER, 1) => {
                    match self.samples.pop_front() {
                        Some(sample) => Ok(Ok(Response::ReadHoldingRegisters(vec![sample]))),
                        None => Err(Error::Timeout(TICK)),
                    }
                }
                Request::WriteSingleRegister(addr, value) if !self.reject_writes => {
                    self.writes.push(value);
                    Ok(Ok(Response::WriteSingleRegister(addr, value)))
                }
                _ => Ok(Err(ExceptionCode::ServerDeviceFailure)),
            }
        }
    }

    impl Reader for LinkMock {}

    impl Writer for LinkMock {}

    const HOT: Word = 55_000;
    const COLD: Word = 45_000;

    fn scheduler(rate: u64) -> PollScheduler {
        PollScheduler::new(
            LogRate::clamped(rate),
            TargetTemperature::from_degrees(50).unwrap(),
        )
    }

    #[tokio::test]
    async fn first_cycle_on_first_tick() {
        let mut link = LinkMock::with_samples([COLD, COLD]);
        let mut scheduler = scheduler(5);

        assert_eq!(
            scheduler.tick(&mut link).await,
            Some(CycleOutcome::Written(ControlIntent::Start))
        );
        for _ in 0..4 {
            assert_eq!(scheduler.tick(&mut link).await, None);
        }
        assert_eq!(
            scheduler.tick(&mut link).await,
            Some(CycleOutcome::Unchanged(ThermalState::Normal))
        );
        assert_eq!(link.writes, vec![1]);
    }

    #[tokio::test]
    async fn writes_only_on_change() {
        let mut link = LinkMock::with_samples([HOT, HOT, HOT, HOT, COLD, COLD, COLD]);
        let mut scheduler = scheduler(LogRate::MIN);
        let mut outcomes = Vec::new();
        while outcomes.len() < 7 {
            if let Some(outcome) = scheduler.tick(&mut link).await {
                outcomes.push(outcome);
            }
        }
        assert_eq!(
            outcomes,
            vec![
                CycleOutcome::Written(ControlIntent::Start),
                CycleOutcome::Unchanged(ThermalState::Normal),
                CycleOutcome::Written(ControlIntent::Stop),
                CycleOutcome::Unchanged(ThermalState::Overload),
                CycleOutcome::Unchanged(ThermalState::Overload),
                CycleOutcome::Unchanged(ThermalState::Overload),
                CycleOutcome::Unchanged(ThermalState::Overload),
            ]
        );
        assert_eq!(link.writes, vec![1, 0]);
        assert_eq!(scheduler.hysteresis().counter(), 1);
    }

    #[tokio::test]
    async fn read_failure_skips_the_cycle() {
        let mut link = LinkMock::default();
        let mut scheduler = scheduler(LogRate::MIN);

        assert_eq!(
            scheduler.tick(&mut link).await,
            Some(CycleOutcome::Skipped)
        );
        assert_eq!(scheduler.hysteresis().counter(), 0);
        // The clock has been reset nevertheless.
        assert_eq!(scheduler.tick(&mut link).await, None);
        assert_eq!(scheduler.tick(&mut link).await, None);
        assert_eq!(
            scheduler.tick(&mut link).await,
            Some(CycleOutcome::Skipped)
        );
        assert!(link.writes.is_empty());
    }

    #[tokio::test]
    async fn failed_writes_are_retried() {
        let mut link = LinkMock {
            reject_writes: true,
            ..LinkMock::with_samples([COLD, COLD])
        };
        let mut scheduler = scheduler(LogRate::MIN);

        assert_eq!(
            scheduler.tick(&mut link).await,
            Some(CycleOutcome::WriteFailed(ControlIntent::Start))
        );
        assert_eq!(scheduler.last_written(), None);

        link.reject_writes = false;
        for _ in 0..2 {
            assert_eq!(scheduler.tick(&mut link).await, None);
        }
        assert_eq!(
            scheduler.tick(&mut link).await,
            Some(CycleOutcome::Written(ControlIntent::Start))
        );
        assert_eq!(scheduler.last_written(), Some(ControlIntent::Start));
    }
}
