//! Named scenarios exercised by the runner and the CLI.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// 2x2 on 2 workers with known inputs, expected C and step order
    Textbook,

    /// N=3, W=2: the second worker owns a single row
    UnevenRows,

    /// N=2, W=4: two workers never compute
    IdleWorkers,

    /// Random 8x8 on 4 workers, continuous and stepwise agree
    ModeParity,

    /// 8x8 with one row per worker
    FullGrid,

    /// Stepwise run reset half way, then a fresh run
    ResetMidway,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Textbook,
            ScenarioId::UnevenRows,
            ScenarioId::IdleWorkers,
            ScenarioId::ModeParity,
            ScenarioId::FullGrid,
            ScenarioId::ResetMidway,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Textbook => "textbook",
            ScenarioId::UnevenRows => "uneven_rows",
            ScenarioId::IdleWorkers => "idle_workers",
            ScenarioId::ModeParity => "mode_parity",
            ScenarioId::FullGrid => "full_grid",
            ScenarioId::ResetMidway => "reset_midway",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Textbook => "2x2, 2 workers: C = [[19,22],[43,50]] in 7 steps",
            ScenarioId::UnevenRows => "3x3, 2 workers: rows [0,2) and [2,3)",
            ScenarioId::IdleWorkers => "2x2, 4 workers: workers 2 and 3 stay idle",
            ScenarioId::ModeParity => "8x8, 4 workers: continuous and stepwise give the same C",
            ScenarioId::FullGrid => "8x8, 8 workers: one row each",
            ScenarioId::ResetMidway => "stepwise run reset half way, fresh run still correct",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "textbook" => Ok(ScenarioId::Textbook),
            "uneven_rows" | "uneven" => Ok(ScenarioId::UnevenRows),
            "idle_workers" | "idle" => Ok(ScenarioId::IdleWorkers),
            "mode_parity" | "parity" => Ok(ScenarioId::ModeParity),
            "full_grid" | "fullgrid" => Ok(ScenarioId::FullGrid),
            "reset_midway" | "reset" => Ok(ScenarioId::ResetMidway),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for id in ScenarioId::all() {
            assert_eq!(id.name().parse::<ScenarioId>(), Ok(id));
            assert_eq!(id.to_string(), id.name());
        }
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }
}
