//! The two invocation-wide pins: [`BuildType`] and [`LinkType`]. Both are
//! fixed for the entire invocation (spec.md §3) and feed into artifact
//! naming (spec.md §6) and option validation (spec.md §4.1).

use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum BuildType {
    Debug,
    Optimized,
    Release,
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "debug",
            Self::Optimized => "optimized",
            Self::Release => "release",
        };
        f.write_str(s)
    }
}

impl FromStr for BuildType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(Self::Debug),
            "optimized" => Ok(Self::Optimized),
            "release" => Ok(Self::Release),
            other => Err(format!("unknown build type: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum LinkType {
    Static,
    Dynamic,
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Static => "static",
            Self::Dynamic => "dynamic",
        };
        f.write_str(s)
    }
}

impl FromStr for LinkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "static" => Ok(Self::Static),
            "dynamic" => Ok(Self::Dynamic),
            other => Err(format!("unknown link type: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_type_round_trips_through_display() {
        for bt in [BuildType::Debug, BuildType::Optimized, BuildType::Release] {
            assert_eq!(bt.to_string().parse::<BuildType>().unwrap(), bt);
        }
    }

    #[test]
    fn link_type_round_trips_through_display() {
        for lt in [LinkType::Static, LinkType::Dynamic] {
            assert_eq!(lt.to_string().parse::<LinkType>().unwrap(), lt);
        }
    }
}
