use ndarray::Zip;
use tracing::debug;
use xtal_core::{Diagnostics, ErrorInfo, Mapper, Modes, Object, PhaseError};

/// Feedback parameter used when none is configured.
pub const DEFAULT_BETA: f64 = 1.0;

/// Result of running one algorithm step to completion.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// Object derived from the final modes.
    pub object: Object,
    /// Error traces of this step plus the mapper's `finish` output.
    pub info: Diagnostics,
}

fn checked(algorithm: &str, iteration: usize, name: &str, value: f64) -> Result<f64, PhaseError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PhaseError::Projection(
            ErrorInfo::new("diverged", "error metric is not finite")
                .with_context("algorithm", algorithm)
                .with_context("iteration", iteration.to_string())
                .with_context("metric", name),
        ))
    }
}

fn complete<M: Mapper + ?Sized>(
    mapper: &mut M,
    modes: Modes,
    emod: Vec<f64>,
    econ: Vec<f64>,
) -> Result<StepOutcome, PhaseError> {
    let object = mapper.object(&modes)?;
    let extra = mapper.finish(&modes)?;
    mapper.set_modes(modes);
    Ok(StepOutcome {
        object,
        info: Diagnostics {
            emod,
            econ,
            extra,
            ..Diagnostics::default()
        },
    })
}

/// Error-reduction: `x <- Psup(Pmod(x))` for `iterations` rounds.
///
/// The mapper's modes are only replaced once every iteration succeeded.
pub fn era<M: Mapper + ?Sized>(iterations: usize, mapper: &mut M) -> Result<StepOutcome, PhaseError> {
    let mut x = mapper.modes().clone();
    let mut emod = Vec::with_capacity(iterations);
    let mut econ = Vec::with_capacity(iterations);
    for iteration in 0..iterations {
        let pm = mapper.pmod(&x)?;
        let ps = mapper.psup(&pm)?;
        let e_mod = checked("ERA", iteration, "emod", mapper.distance(&pm, &x))?;
        let e_con = checked("ERA", iteration, "econ", mapper.distance(&ps, &pm))?;
        debug!(algorithm = "ERA", iteration, emod = e_mod, econ = e_con, "iteration");
        emod.push(e_mod);
        econ.push(e_con);
        x = ps;
    }
    complete(mapper, x, emod, econ)
}

/// Difference map with feedback `beta` (`gamma = 1 / beta`):
///
/// ```text
/// f_s = (1 + gamma) Psup(x) - gamma x
/// f_m = (1 - gamma) Pmod(x) + gamma x        (f_m = x when beta == 1)
/// x  <- x + beta (Pmod(f_s) - Psup(f_m))
/// ```
///
/// Only `Psup(x)` may refresh an adaptive support; `Psup(f_m)` projects onto
/// the support as it stands after that call.
pub fn dm<M: Mapper + ?Sized>(
    iterations: usize,
    mapper: &mut M,
    beta: f64,
) -> Result<StepOutcome, PhaseError> {
    if !beta.is_finite() || beta == 0.0 {
        return Err(PhaseError::Configuration(
            ErrorInfo::new("invalid-beta", "beta must be finite and non-zero")
                .with_context("beta", beta.to_string()),
        ));
    }
    let gamma = 1.0 / beta;
    let mut x = mapper.modes().clone();
    let mut emod = Vec::with_capacity(iterations);
    let mut econ = Vec::with_capacity(iterations);
    for iteration in 0..iterations {
        let ps = mapper.psup(&x)?;
        let mut f_s = ps.clone();
        Zip::from(&mut f_s)
            .and(&x)
            .for_each(|fs, &xv| *fs = *fs * (1.0 + gamma) - xv * gamma);

        // The support advances at most once per iteration, on Psup(x).
        let ps_fm = if beta == 1.0 {
            ps
        } else {
            let mut f_m = mapper.pmod(&x)?;
            Zip::from(&mut f_m)
                .and(&x)
                .for_each(|fm, &xv| *fm = *fm * (1.0 - gamma) + xv * gamma);
            mapper.psup_current(&f_m)?
        };
        let pm_fs = mapper.pmod(&f_s)?;

        let mut next = x.clone();
        Zip::from(&mut next)
            .and(&pm_fs)
            .and(&ps_fm)
            .for_each(|xn, &a, &b| *xn += (a - b) * beta);

        let e_mod = checked("DM", iteration, "emod", mapper.distance(&pm_fs, &f_s))?;
        let e_con = checked("DM", iteration, "econ", mapper.distance(&next, &x))?;
        debug!(algorithm = "DM", iteration, emod = e_mod, econ = e_con, "iteration");
        emod.push(e_mod);
        econ.push(e_con);
        x = next;
    }
    complete(mapper, x, emod, econ)
}
