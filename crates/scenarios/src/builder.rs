//! Ad hoc phase lists for runs that none of the named presets cover.

use crate::plan::{ImpairmentSpec, Phase, ScenarioPlan};

/// Appends phases in call order; `build` yields the finished plan.
pub struct ScenarioBuilder {
    name: String,
    description: String,
    phases: Vec<Phase>,
}

impl ScenarioBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            phases: Vec::new(),
        }
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn baseline(mut self, secs: u64) -> Self {
        self.phases.push(Phase::baseline(secs));
        self
    }

    pub fn impairment(mut self, spec: ImpairmentSpec) -> Self {
        self.phases.push(Phase::impairment(spec));
        self
    }

    pub fn recovery(mut self, secs: u64) -> Self {
        self.phases.push(Phase::recovery(secs));
        self
    }

    pub fn build(self) -> ScenarioPlan {
        ScenarioPlan {
            name: self.name,
            description: self.description,
            phases: self.phases,
        }
    }
}
