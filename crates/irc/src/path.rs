//! bookkeeping for the points along an IRC

use std::fmt::Display;

use intco::{DVec, geom::Geom};
use log::info;
use serde::{Deserialize, Serialize};

use crate::{IrcError, config::Config, molsys::MolSys};

/// why following the path stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Completion {
    /// the requested number of points was reached
    MaxSteps,

    /// the energy rose from the previous point, so the path passed a
    /// minimum
    Minimum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Continue,
    Complete(Completion),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrcPoint {
    pub step: usize,
    pub energy: f64,
    pub q: DVec,
    pub geom: Geom,

    /// length of the step that led to this point
    pub step_length: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IrcPath {
    points: Vec<IrcPoint>,
}

impl IrcPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[IrcPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// record the current state of `molsys` as the next point on the path
    pub fn record(
        &mut self,
        molsys: &MolSys,
        energy: f64,
        step_length: f64,
    ) -> Result<&IrcPoint, IrcError> {
        let step = self.points.len();
        info!("IRC point {step}: E = {energy:.10}");
        self.points.push(IrcPoint {
            step,
            energy,
            q: molsys.q_values()?,
            geom: molsys.geom(),
            step_length,
        });
        Ok(&self.points[step])
    }

    /// total length of the path so far
    pub fn arc_length(&self) -> f64 {
        self.points.iter().map(|p| p.step_length).sum()
    }

    /// decide whether to take another step. the starting point does not
    /// count toward `config.max_steps`
    pub fn progress(&self, config: &Config) -> Progress {
        if let [.., prev, last] = self.points.as_slice()
            && last.energy > prev.energy
        {
            info!("energy rose at point {}, stopping", last.step);
            return Progress::Complete(Completion::Minimum);
        }
        if self.points.len() > config.max_steps {
            return Progress::Complete(Completion::MaxSteps);
        }
        Progress::Continue
    }
}

impl Display for IrcPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{:<5}{:>20}{:>12}{:>12}", "Step", "Energy", "dE", "Arc")?;
        let mut arc = 0.0;
        let mut prev = None;
        for p in &self.points {
            arc += p.step_length;
            let de = prev.map_or(0.0, |e| p.energy - e);
            writeln!(
                f,
                "{:<5}{:20.10}{:12.8}{:12.6}",
                p.step, p.energy, de, arc
            )?;
            prev = Some(p.energy);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;

    fn path(energies: &[f64]) -> IrcPath {
        IrcPath {
            points: energies
                .iter()
                .enumerate()
                .map(|(step, &energy)| IrcPoint {
                    step,
                    energy,
                    q: DVec::zeros(1),
                    geom: Geom::new(),
                    step_length: if step == 0 { 0.0 } else { 0.2 },
                })
                .collect(),
        }
    }

    #[test]
    fn progress() {
        let config = Config::default().max_steps(3);
        assert_eq!(path(&[-1.0]).progress(&config), Progress::Continue);
        assert_eq!(
            path(&[-1.0, -1.1, -1.2]).progress(&config),
            Progress::Continue
        );
        assert_eq!(
            path(&[-1.0, -1.1, -1.2, -1.3]).progress(&config),
            Progress::Complete(Completion::MaxSteps)
        );
        assert_eq!(
            path(&[-1.0, -1.1, -1.05]).progress(&config),
            Progress::Complete(Completion::Minimum)
        );
    }

    #[test]
    fn display() {
        let p = path(&[-76.0, -76.01, -76.015]);
        assert!((p.arc_length() - 0.4).abs() < 1e-12);
        assert_snapshot!(p.to_string().trim_end(), @r"
        Step               Energy          dE         Arc
        0          -76.0000000000  0.00000000    0.000000
        1          -76.0100000000 -0.01000000    0.200000
        2          -76.0150000000 -0.00500000    0.400000
        ");
    }
}
