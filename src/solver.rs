//! External solver collaborator surface and field measurement.
//!
//! The electromagnetic solver (FDTD time stepping or an FDFD solve) is
//! not implemented here; this module owns the interface the gradient
//! tooling differentiates through: named current sources in, a snapshot
//! of field components out, and a permittivity array that a caller
//! reassigns between gradient evaluations to represent a new design
//! point.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{GradError, Result};
use crate::{Array, Shape};
use tracing::trace;

/// One of the six electromagnetic field components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(missing_docs)]
pub enum FieldComponent {
    Ex,
    Ey,
    Ez,
    Hx,
    Hy,
    Hz,
}

impl FieldComponent {
    /// Component name as used in snapshots and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldComponent::Ex => "Ex",
            FieldComponent::Ey => "Ey",
            FieldComponent::Ez => "Ez",
            FieldComponent::Hx => "Hx",
            FieldComponent::Hy => "Hy",
            FieldComponent::Hz => "Hz",
        }
    }
}

impl fmt::Display for FieldComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fields returned by one forward-simulation call: a mapping from
/// component name to an array over the simulation domain.
///
/// Snapshots are read-only from the gradient tooling's point of view;
/// the solver owns the underlying state.
#[derive(Debug, Clone, Default)]
pub struct FieldSnapshot {
    fields: BTreeMap<FieldComponent, Array>,
}

impl FieldSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one component's field array.
    pub fn insert(&mut self, component: FieldComponent, field: Array) {
        self.fields.insert(component, field);
    }

    /// Look up a component, if the solver produced it.
    pub fn get(&self, component: FieldComponent) -> Option<&Array> {
        self.fields.get(&component)
    }

    /// Look up a component, failing if the solver did not produce it.
    pub fn component(&self, component: FieldComponent) -> Result<&Array> {
        self.fields
            .get(&component)
            .ok_or(GradError::MissingComponent(component))
    }

    /// Iterate over the recorded components in a fixed order.
    pub fn iter(&self) -> impl Iterator<Item = (FieldComponent, &Array)> {
        self.fields.iter().map(|(&c, a)| (c, a))
    }
}

/// Named current/source arrays driving one forward call.
#[derive(Debug, Clone, Default)]
pub struct CurrentSources {
    /// x-directed current density, if driven.
    pub jx: Option<Array>,
    /// y-directed current density, if driven.
    pub jy: Option<Array>,
    /// z-directed current density, if driven.
    pub jz: Option<Array>,
}

impl CurrentSources {
    /// No sources.
    pub fn none() -> Self {
        Self::default()
    }

    /// A single z-directed source.
    pub fn with_jz(jz: Array) -> Self {
        Self { jz: Some(jz), ..Self::default() }
    }

    /// A single x-directed source.
    pub fn with_jx(jx: Array) -> Self {
        Self { jx: Some(jx), ..Self::default() }
    }

    /// A single y-directed source.
    pub fn with_jy(jy: Array) -> Self {
        Self { jy: Some(jy), ..Self::default() }
    }
}

/// The external electromagnetic solver contract.
///
/// A gradient computation treats the solver as a black box: an objective
/// reassigns the permittivity to the candidate design point, resets the
/// fields, runs `forward` over the time steps and reduces the returned
/// snapshots to a scalar. The solver must be deterministic for the
/// finite-difference estimates to mean anything.
pub trait FieldSolver {
    /// Reset internal field state before a fresh simulation run.
    fn initialize_fields(&mut self);

    /// Advance one time step (or compute one frequency-domain solve)
    /// under the given sources, returning the resulting fields.
    fn forward(&mut self, sources: &CurrentSources) -> FieldSnapshot;

    /// The current relative permittivity distribution.
    fn permittivity(&self) -> &Array;

    /// Reassign the permittivity to represent a new design point.
    fn set_permittivity(&mut self, eps_r: Array);
}

/// Time series of probe measurements from a driven solver.
///
/// Runs `solver` for `steps` forward calls with `source(t)` as the
/// drive, and at each step records `Σ field * probe` for every probe.
/// Returns an array of shape `[steps, n_probes]`.
pub fn measure_fields<S, Src>(
    solver: &mut S,
    source: Src,
    steps: usize,
    probes: &[Array],
    component: FieldComponent,
) -> Result<Array>
where
    S: FieldSolver,
    Src: Fn(usize) -> CurrentSources,
{
    solver.initialize_fields();
    let mut measured = vec![0.0; steps * probes.len()];

    for t in 0..steps {
        trace!(step = t, total = steps, "measuring fields");
        let fields = solver.forward(&source(t));
        let field = fields.component(component)?;
        for (p, probe) in probes.iter().enumerate() {
            measured[t * probes.len() + p] = field.dot(probe)?;
        }
    }

    Ok(Array::from_vec(
        measured,
        Shape::new(vec![steps, probes.len()]),
    ))
}
