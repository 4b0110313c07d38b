//! The closed command vocabulary and the tip table.

use std::fmt;
use std::str::FromStr;

use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::error::TipError;

/// Parameter and command identifiers understood by the station firmware.
///
/// `Display`/`FromStr` use the wire spelling (`"set_t"`, `"pid_kp"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr, EnumIter)]
pub enum CommandId {
    #[strum(serialize = "en")]
    Enable,
    #[strum(serialize = "runaway_t")]
    TempRunaway,
    #[strum(serialize = "set_min_t")]
    TempSetMin,
    #[strum(serialize = "set_max_t")]
    TempSetMax,
    #[strum(serialize = "meas_t")]
    TempMeasure,
    #[strum(serialize = "set_t")]
    TempSet,
    #[strum(serialize = "meas_uv")]
    TcVoltageMeasure,
    #[strum(serialize = "set_uv")]
    TcVoltageSetpoint,
    #[strum(serialize = "tc_cal_table")]
    CalTcTable,
    #[strum(serialize = "pid_kp")]
    PidKp,
    #[strum(serialize = "pid_ki")]
    PidKi,
    #[strum(serialize = "pid_kd")]
    PidKd,
    #[strum(serialize = "pid_d_tau")]
    PidDerivativeFilterTime,
    #[strum(serialize = "pid_op")]
    PidOutput,
    #[strum(serialize = "sleep_set_t")]
    SleepTemp,
    #[strum(serialize = "sleep_delay")]
    SleepDelay,
    #[strum(serialize = "sleep_state")]
    SleepState,
    #[strum(serialize = "restore")]
    RestoreDefaults,
}

impl CommandId {
    #[inline]
    pub fn wire(self) -> &'static str {
        self.into()
    }

    pub fn all() -> impl Iterator<Item = CommandId> {
        CommandId::iter()
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire())
    }
}

impl AsRef<str> for CommandId {
    fn as_ref(&self) -> &str {
        self.wire()
    }
}

/// Membership of a wire identifier in the command set.
pub fn is_valid(command: &str) -> bool {
    CommandId::from_str(command).is_ok()
}

/// Physical tip channels, in firmware index order.
pub const TIPS: [(&str, u8); 4] = [("T245", 0), ("AM120-1", 1), ("AM120-2", 2), ("C360", 3)];

/// Index of a physical tip channel on the station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TipIndex(u8);

impl TipIndex {
    /// Validates `index` against the tip table.
    pub fn new(index: u8) -> Option<Self> {
        tip_name_of(index).map(|_| TipIndex(index))
    }

    #[inline]
    pub fn get(self) -> u8 {
        self.0
    }

    pub fn name(self) -> &'static str {
        tip_name_of(self.0).unwrap_or("?")
    }
}

impl fmt::Display for TipIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn tip_index_of(name: &str) -> Option<TipIndex> {
    TIPS.iter()
        .find(|(n, _)| *n == name)
        .map(|(_, i)| TipIndex(*i))
}

pub fn tip_name_of(index: u8) -> Option<&'static str> {
    TIPS.iter().find(|(_, i)| *i == index).map(|(n, _)| *n)
}

/// A tip given either by name or by numeric index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipRef<'a> {
    Name(&'a str),
    Index(u8),
}

impl<'a> From<&'a str> for TipRef<'a> {
    fn from(s: &'a str) -> Self {
        TipRef::Name(s)
    }
}

impl From<u8> for TipRef<'_> {
    fn from(i: u8) -> Self {
        TipRef::Index(i)
    }
}

impl TipRef<'_> {
    /// Names win over numbers; a name that is all digits falls back to an index.
    pub fn resolve(self) -> Result<TipIndex, TipError> {
        match self {
            TipRef::Index(i) => TipIndex::new(i).ok_or_else(|| TipError::Unknown(i.to_string())),
            TipRef::Name(name) => tip_index_of(name)
                .or_else(|| name.trim().parse::<u8>().ok().and_then(TipIndex::new))
                .ok_or_else(|| TipError::Unknown(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn string_views_match_the_wire() {
        for id in CommandId::all() {
            let s: &str = id.as_ref();
            assert_eq!(s, id.wire());
            assert_eq!(id.to_string(), s);
        }
    }

    #[test]
    fn wire_names_round_trip_through_the_enum() {
        for cmd in CommandId::all() {
            assert_eq!(CommandId::from_str(cmd.wire()), Ok(cmd));
            assert!(is_valid(&cmd.to_string()));
        }
        assert_eq!(CommandId::all().count(), 18);
    }

    #[rstest]
    #[case("set_t", true)]
    #[case("tc_cal_table", true)]
    #[case("restore", true)]
    #[case("SET_T", false)]
    #[case("set_temp", false)]
    #[case("", false)]
    fn validity_is_exact_membership(#[case] name: &str, #[case] valid: bool) {
        assert_eq!(is_valid(name), valid);
    }

    #[rstest]
    #[case(TipRef::Name("T245"), Some(0))]
    #[case(TipRef::Name("AM120-2"), Some(2))]
    #[case(TipRef::Name("C360"), Some(3))]
    #[case(TipRef::Name("1"), Some(1))]
    #[case(TipRef::Index(3), Some(3))]
    #[case(TipRef::Index(4), None)]
    #[case(TipRef::Name("Unknown"), None)]
    #[case(TipRef::Name("c360"), None)]
    fn tips_resolve_by_name_or_index(#[case] tip: TipRef<'_>, #[case] expected: Option<u8>) {
        assert_eq!(tip.resolve().ok().map(TipIndex::get), expected);
    }

    #[test]
    fn tip_names_and_indices_agree() {
        for (name, index) in TIPS {
            assert_eq!(tip_index_of(name).map(TipIndex::get), Some(index));
            assert_eq!(tip_name_of(index), Some(name));
        }
        assert_eq!(tip_name_of(9), None);
    }
}
