//! Closed vocabularies the model picks from when classifying a plate.

use serde::{Deserialize, Serialize};

/// Defines a string-valued enum with `ALL`, `as_str`, `Display` and `FromStr`.
macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $value:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $value)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }

            /// Every accepted value, in declaration order.
            pub fn values() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.as_str()).collect()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($value => Ok($name::$variant),)+
                    other => Err(format!(
                        "'{}' is not a valid {}; expected one of: {}",
                        other,
                        stringify!($name),
                        Self::values().join(", ")
                    )),
                }
            }
        }
    };
}

vocabulary! {
    /// How colonies are spread across the plate.
    pub enum SpatialDistributionType {
        Isolated => "isolated",
        Clustered => "clustered",
        Confluent => "confluent",
        CentrallyLocated => "centrally_located",
        Peripheral => "peripheral",
        EvenlyDistributed => "evenly_distributed",
        Radial => "radial",
        SpotInoculated => "spot_inoculated",
        Swarming => "swarming",
        Zonal => "zonal",
        Trailing => "trailing",
        Discontinuous => "discontinuous",
        Punctate => "punctate",
        FilamentousEdge => "filamentous_edge",
        Spreading => "spreading",
        Layered => "layered",
        InhibitionZone => "inhibition_zone",
        Biaxial => "biaxial",
    }
}

vocabulary! {
    /// Dominant pigmentation of the colonies.
    pub enum ColonyColor {
        White => "white",
        OffWhite => "off_white",
        Cream => "cream",
        Yellow => "yellow",
        Golden => "golden",
        Orange => "orange",
        Red => "red",
        Pink => "pink",
        Purple => "purple",
        Green => "green",
        BlueGreen => "blue_green",
        Brown => "brown",
        Black => "black",
        Grey => "grey",
        Translucent => "translucent",
    }
}

vocabulary! {
    /// Most plausible explanation for how the colonies got there.
    pub enum ColonyOriginHypothesis {
        DirectInoculation => "direct_inoculation",
        AirborneContamination => "airborne_contamination",
        MotileSpread => "motile_spread",
        EdgeEffect => "edge_effect",
        ContactTransfer => "contact_transfer",
        LiquidOverspill => "liquid_overspill",
        DropletImpact => "droplet_impact",
        BiofilmFragment => "biofilm_fragment",
        OvernightSwarm => "overnight_swarm",
        AntibioticInhibition => "antibiotic_inhibition",
        MixedInoculum => "mixed_inoculum",
        ResidualMediaEffect => "residual_media_effect",
        CondensationArtifact => "condensation_artifact",
        FungalOvergrowth => "fungal_overgrowth",
        TechnicalError => "technical_error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_round_trip() {
        let d: SpatialDistributionType = "spot_inoculated".parse().unwrap();
        assert_eq!(d, SpatialDistributionType::SpotInoculated);
        assert_eq!(d.to_string(), "spot_inoculated");
    }

    #[test]
    fn unknown_value_lists_choices() {
        let err = "sparkly".parse::<ColonyColor>().unwrap_err();
        assert!(err.contains("ColonyColor"));
        assert!(err.contains("white, off_white"));
    }

    #[test]
    fn serde_uses_wire_values() {
        let json = serde_json::to_string(&ColonyOriginHypothesis::EdgeEffect).unwrap();
        assert_eq!(json, "\"edge_effect\"");
        let back: ColonyOriginHypothesis = serde_json::from_str("\"technical_error\"").unwrap();
        assert_eq!(back, ColonyOriginHypothesis::TechnicalError);
    }

    #[test]
    fn vocabulary_sizes() {
        assert_eq!(SpatialDistributionType::ALL.len(), 18);
        assert_eq!(ColonyOriginHypothesis::ALL.len(), 15);
        assert!(!ColonyColor::ALL.is_empty());
    }
}
