//! Protocol scenarios checked by the scenario runner.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// BUS-001: capacity 2, three riders, one bus
    CapacityOverflow,

    /// BUS-002: a bus arrives at an empty stop
    EmptyStop,

    /// BUS-003: riders between and after back-to-back buses
    SequentialArrivals,

    /// BUS-004: many blocked riders, one bus with room for all
    MassBoarding,

    /// BUS-005: riders give up while waiting
    Abandonment,

    /// BUS-006: both generators running for hours of simulated time
    SteadyState,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::CapacityOverflow,
            ScenarioId::EmptyStop,
            ScenarioId::SequentialArrivals,
            ScenarioId::MassBoarding,
            ScenarioId::Abandonment,
            ScenarioId::SteadyState,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::CapacityOverflow => "capacity_overflow",
            ScenarioId::EmptyStop => "empty_stop",
            ScenarioId::SequentialArrivals => "sequential_arrivals",
            ScenarioId::MassBoarding => "mass_boarding",
            ScenarioId::Abandonment => "abandonment",
            ScenarioId::SteadyState => "steady_state",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::CapacityOverflow => "Capacity 2, 3 riders: two board, one waits for the next bus",
            ScenarioId::EmptyStop => "No riders: the bus departs at once with 0 passengers",
            ScenarioId::SequentialArrivals => "Rider boards the pending bus, late rider waits for a third",
            ScenarioId::MassBoarding => "200 blocked riders all board one bus of capacity 200",
            ScenarioId::Abandonment => "Cancelled riders never board and never hold the bus",
            ScenarioId::SteadyState => "Exponential arrivals for the configured duration, invariants hold",
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
            "capacity_overflow" | "capacityoverflow" | "bus-001" => Ok(ScenarioId::CapacityOverflow),
            "empty_stop" | "emptystop" | "bus-002" => Ok(ScenarioId::EmptyStop),
            "sequential_arrivals" | "sequentialarrivals" | "bus-003" => Ok(ScenarioId::SequentialArrivals),
            "mass_boarding" | "massboarding" | "bus-004" => Ok(ScenarioId::MassBoarding),
            "abandonment" | "bus-005" => Ok(ScenarioId::Abandonment),
            "steady_state" | "steadystate" | "bus-006" => Ok(ScenarioId::SteadyState),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
        }
    }

    #[test]
    fn test_short_codes_parse() {
        assert_eq!("BUS-001".parse::<ScenarioId>(), Ok(ScenarioId::CapacityOverflow));
        assert!("warp_drive".parse::<ScenarioId>().is_err());
    }
}
