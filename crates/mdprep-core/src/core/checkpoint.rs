//! Truncation extents and their checkpoint bindings.
//!
//! An [`Extent`] names how far the pipeline should run. Each extent is bound
//! to exactly one terminal stage: once that stage completes, the snapshot it
//! (or its associated run stage) produced is converted into the final
//! user-facing structure and the engine stops. The mapping is closed and
//! exhaustive; there is no string-based routing anywhere else in the engine.

use tracing::warn;

use super::stage::StageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Extent {
    /// Stop after structure repair, before topology generation.
    Repair,
    /// Stop after energy minimization and its energy report.
    Minimization,
    /// Stop after NVT (thermal) equilibration.
    ThermalEquilibration,
    /// Stop after NPT (pressure) equilibration.
    PressureEquilibration,
    /// Run the full chain, production dynamics and analysis included.
    #[default]
    Production,
}

impl Extent {
    /// Parse a user-supplied extent string. Both the descriptive names and
    /// the short forms of the original workflow are accepted; anything else
    /// (including absence) falls back to full production.
    pub fn parse_lenient(raw: Option<&str>) -> Extent {
        let Some(raw) = raw else {
            return Extent::Production;
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "repair" | "fix" => Extent::Repair,
            "minimization" | "min" => Extent::Minimization,
            "thermal-equilibration" | "nvt" => Extent::ThermalEquilibration,
            "pressure-equilibration" | "npt" => Extent::PressureEquilibration,
            "full-production" | "production" | "free" => Extent::Production,
            other => {
                warn!(
                    extent = other,
                    "Unrecognized pipeline extent; running the full pipeline."
                );
                Extent::Production
            }
        }
    }

    /// The last stage executed for this extent.
    pub const fn terminal_stage(self) -> StageId {
        match self {
            Extent::Repair => StageId::Repair,
            Extent::Minimization => StageId::MinEnergy,
            Extent::ThermalEquilibration => StageId::NvtEnergy,
            Extent::PressureEquilibration => StageId::NptEnergy,
            Extent::Production => StageId::Strip,
        }
    }

    /// The (stage, output port) whose artifact is converted into the final
    /// structure once the terminal stage has completed.
    pub const fn snapshot(self) -> (StageId, &'static str) {
        match self {
            Extent::Repair => (StageId::Repair, "structure"),
            Extent::Minimization => (StageId::Minimize, "structure"),
            Extent::ThermalEquilibration => (StageId::NvtRun, "structure"),
            Extent::PressureEquilibration => (StageId::NptRun, "structure"),
            Extent::Production => (StageId::ProdRun, "structure"),
        }
    }

    pub const fn completion_label(self) -> &'static str {
        match self {
            Extent::Repair => "Structure repair",
            Extent::Minimization => "Minimization",
            Extent::ThermalEquilibration => "NVT equilibration",
            Extent::PressureEquilibration => "NPT equilibration",
            Extent::Production => "Production MD",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognized_extents_parse_to_their_variant() {
        assert_eq!(Extent::parse_lenient(Some("repair")), Extent::Repair);
        assert_eq!(Extent::parse_lenient(Some("fix")), Extent::Repair);
        assert_eq!(Extent::parse_lenient(Some("min")), Extent::Minimization);
        assert_eq!(
            Extent::parse_lenient(Some("thermal-equilibration")),
            Extent::ThermalEquilibration
        );
        assert_eq!(
            Extent::parse_lenient(Some("NPT")),
            Extent::PressureEquilibration
        );
        assert_eq!(
            Extent::parse_lenient(Some("full-production")),
            Extent::Production
        );
    }

    #[test]
    fn absent_or_unrecognized_extent_defaults_to_production() {
        assert_eq!(Extent::parse_lenient(None), Extent::Production);
        assert_eq!(Extent::parse_lenient(Some("")), Extent::Production);
        assert_eq!(Extent::parse_lenient(Some("everything")), Extent::Production);
    }

    #[test]
    fn terminal_stages_appear_in_the_engine_chain() {
        for extent in [
            Extent::Repair,
            Extent::Minimization,
            Extent::ThermalEquilibration,
            Extent::PressureEquilibration,
            Extent::Production,
        ] {
            assert!(StageId::ENGINE_CHAIN.contains(&extent.terminal_stage()));
        }
    }

    #[test]
    fn snapshot_stage_never_runs_after_the_terminal_stage() {
        let position =
            |id: StageId| StageId::ENGINE_CHAIN.iter().position(|s| *s == id).unwrap();
        for extent in [
            Extent::Repair,
            Extent::Minimization,
            Extent::ThermalEquilibration,
            Extent::PressureEquilibration,
            Extent::Production,
        ] {
            let (snapshot_stage, port) = extent.snapshot();
            assert!(position(snapshot_stage) <= position(extent.terminal_stage()));
            assert!(snapshot_stage.outputs().contains(&port));
        }
    }
}
