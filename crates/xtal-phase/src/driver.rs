use tracing::info;
use xtal_core::{Diagnostics, Mapper, Object, PhaseError};

use crate::algorithms::{dm, era, StepOutcome};
use crate::schedule::{parse_schedule, Algorithm, ScheduleStep};

/// Where a driver is in its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Nothing has run yet.
    Idle,
    /// The step at this index runs next.
    Running {
        /// Index into the plan.
        step: usize,
    },
    /// Every step has run.
    Finished,
}

/// Final object and accumulated diagnostics of a phasing run.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseOutcome {
    /// Object produced by the last step.
    pub object: Object,
    /// Concatenated error traces and final diagnostics.
    pub info: Diagnostics,
}

/// One resolved schedule entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedStep {
    /// Algorithm to run.
    pub algorithm: Algorithm,
    /// Requested iterations (ignored by the Cheshire search).
    pub iterations: usize,
}

/// Runs a parsed schedule against a mapper one step at a time.
pub struct PhaseDriver<'m, M: Mapper + ?Sized> {
    mapper: &'m mut M,
    plan: Vec<PlannedStep>,
    beta: f64,
    state: DriverState,
    object: Option<Object>,
    info: Diagnostics,
}

impl<'m, M: Mapper + ?Sized> PhaseDriver<'m, M> {
    /// Resolves every label of `steps` before anything runs, so an unknown
    /// algorithm leaves the mapper untouched.
    pub fn new(mapper: &'m mut M, steps: &[ScheduleStep], beta: f64) -> Result<Self, PhaseError> {
        let plan = steps
            .iter()
            .map(|step| {
                Ok(PlannedStep {
                    algorithm: Algorithm::from_label(&step.label)?,
                    iterations: step.iterations,
                })
            })
            .collect::<Result<Vec<_>, PhaseError>>()?;
        Ok(Self {
            mapper,
            plan,
            beta,
            state: DriverState::Idle,
            object: None,
            info: Diagnostics::default(),
        })
    }

    /// Current state.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Resolved plan.
    pub fn plan(&self) -> &[PlannedStep] {
        &self.plan
    }

    /// Diagnostics accumulated so far.
    pub fn info(&self) -> &Diagnostics {
        &self.info
    }

    fn absorb(&mut self, outcome: StepOutcome) {
        self.info.emod.extend(outcome.info.emod);
        self.info.econ.extend(outcome.info.econ);
        self.info.extra = outcome.info.extra;
        self.object = Some(outcome.object);
    }

    /// Runs the next planned step and returns the new state.
    pub fn step(&mut self) -> Result<DriverState, PhaseError> {
        let index = match self.state {
            DriverState::Idle => 0,
            DriverState::Running { step } => step,
            DriverState::Finished => return Ok(DriverState::Finished),
        };
        let Some(planned) = self.plan.get(index).copied() else {
            self.state = DriverState::Finished;
            return Ok(self.state);
        };
        info!(
            step = index,
            algorithm = %planned.algorithm,
            iterations = planned.iterations,
            "running schedule step"
        );
        match planned.algorithm {
            Algorithm::Era => {
                let outcome = era(planned.iterations, &mut *self.mapper)?;
                self.absorb(outcome);
            }
            Algorithm::Dm => {
                let outcome = dm(planned.iterations, &mut *self.mapper, self.beta)?;
                self.absorb(outcome);
            }
            Algorithm::Cheshire => {
                let object = match self.object.take() {
                    Some(object) => object,
                    None => self.mapper.object(self.mapper.modes())?,
                };
                let scan = self.mapper.scan_cheshire(&object, None)?;
                info!(best = ?scan.best, "cheshire origin chosen");
                self.info.cheshire_error_map = Some(scan.error_map);
                self.object = Some(scan.object);
            }
        }
        self.state = if index + 1 < self.plan.len() {
            DriverState::Running { step: index + 1 }
        } else {
            DriverState::Finished
        };
        Ok(self.state)
    }

    /// Runs the remaining plan and assembles the final outcome.
    pub fn run(mut self) -> Result<PhaseOutcome, PhaseError> {
        while self.step()? != DriverState::Finished {}
        let object = match self.object.take() {
            Some(object) => object,
            None => self.mapper.object(self.mapper.modes())?,
        };
        let mut diagnostics = self.info;
        diagnostics.unit_cell = Some(self.mapper.unit_cell(self.mapper.modes())?);
        info!(
            iterations = diagnostics.emod.len(),
            last_emod = ?diagnostics.emod.last(),
            "phasing finished"
        );
        Ok(PhaseOutcome {
            object,
            info: diagnostics,
        })
    }
}

/// Parses `schedule` and runs it to completion against `mapper`.
pub fn phase<M: Mapper + ?Sized>(
    mapper: &mut M,
    schedule: &str,
    beta: f64,
) -> Result<PhaseOutcome, PhaseError> {
    let steps = parse_schedule(schedule)?;
    PhaseDriver::new(mapper, &steps, beta)?.run()
}
