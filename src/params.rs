#![warn(clippy::pedantic)]
//! Operator-entered parameters.
//!
//! Every field is committed on its own, straight from the text the operator typed. Text that does
//! not parse (or is out of range) is replaced by the field's default instead of being rejected,
//! so the form stays usable while someone is halfway through typing a number. Each substitution
//! is recorded so callers and tests can see it happened.

use std::fmt;
use std::str::FromStr;

use tracing::info;

use crate::hologram::HologramParams;
use crate::sweep::SweepRange;

/// Which of the two operator forms is supplying defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    /// live tuning of charge, grooves and centre offset
    #[default]
    Interactive,
    /// hologram settings plus the offset sweep used for data gathering
    Gather,
}

impl Profile {
    /// Value used when the operator's text for `field` cannot be used.
    #[must_use]
    pub fn fallback(self, field: Field) -> i32 {
        match (self, field) {
            (Profile::Interactive, Field::L) => 1,
            (Profile::Interactive, Field::Nx | Field::Ny) => 50,
            (Profile::Gather, Field::L) => 2,
            (Profile::Gather, Field::Nx | Field::Ny) => 100,
            (_, Field::X0 | Field::Y0) => 0,
            (_, Field::XStart | Field::YStart) => -100,
            (_, Field::XStop | Field::YStop) => 100,
            (_, Field::XStep | Field::YStep) => 10,
        }
    }

    /// Value the form shows before the operator types anything. Only the interactive charge
    /// differs from its fallback.
    #[must_use]
    pub fn initial(self, field: Field) -> i32 {
        match (self, field) {
            (Profile::Interactive, Field::L) => 2,
            _ => self.fallback(field),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::Interactive => write!(f, "interactive"),
            Profile::Gather => write!(f, "gather"),
        }
    }
}

impl FromStr for Profile {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "interactive" => Ok(Profile::Interactive),
            "gather" => Ok(Profile::Gather),
            other => Err(format!("unknown profile '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    L,
    Nx,
    Ny,
    X0,
    Y0,
    XStart,
    XStop,
    XStep,
    YStart,
    YStop,
    YStep,
}

impl Field {
    pub const ALL: [Field; 11] = [
        Field::L,
        Field::Nx,
        Field::Ny,
        Field::X0,
        Field::Y0,
        Field::XStart,
        Field::XStop,
        Field::XStep,
        Field::YStart,
        Field::YStop,
        Field::YStep,
    ];

    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Field::L => "l",
            Field::Nx => "nx",
            Field::Ny => "ny",
            Field::X0 => "x0",
            Field::Y0 => "y0",
            Field::XStart => "x_start",
            Field::XStop => "x_stop",
            Field::XStep => "x_step",
            Field::YStart => "y_start",
            Field::YStop => "y_stop",
            Field::YStep => "y_step",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Field::ALL.into_iter().find(|f| f.key() == key)
    }

    /// Upper-case name used on the command socket, e.g. `X_START`.
    #[must_use]
    pub fn command_name(self) -> String {
        self.key().to_ascii_uppercase()
    }

    /// Exact match on [`command_name`](Self::command_name); `nx` is not `NX`.
    #[must_use]
    pub fn from_command_name(name: &str) -> Option<Self> {
        Field::ALL.into_iter().find(|f| f.command_name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }

    // groove counts are only meaningful as non-negative ratios; a zero step never advances
    fn accepts(self, value: i32) -> bool {
        match self {
            Field::Nx | Field::Ny => value >= 0,
            Field::XStep | Field::YStep => value != 0,
            _ => true,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A commit whose text was replaced by the field default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub field: Field,
    pub raw: String,
    pub value: i32,
}

#[derive(Debug, Clone)]
pub struct ParameterStore {
    profile: Profile,
    values: [i32; 11],
    dirty: bool,
    substitutions: Vec<Substitution>,
}

impl ParameterStore {
    /// Starts dirty, so the first refresh renders the initial hologram.
    #[must_use]
    pub fn new(profile: Profile) -> Self {
        ParameterStore {
            profile,
            values: Field::ALL.map(|f| profile.initial(f)),
            dirty: true,
            substitutions: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn profile(&self) -> Profile {
        self.profile
    }

    #[inline]
    #[must_use]
    pub fn get(&self, field: Field) -> i32 {
        self.values[field.index()]
    }

    /// Parse `raw` into `field` and mark the store dirty. Returns the stored value, which is the
    /// profile's fallback if `raw` was unusable. No other field is touched.
    pub fn commit(&mut self, field: Field, raw: &str) -> i32 {
        let value = match raw.trim().parse::<i32>() {
            Ok(v) if field.accepts(v) => v,
            _ => {
                let fallback = self.profile.fallback(field);
                info!(
                    field = field.key(),
                    raw,
                    fallback,
                    "could not use operator input; proceeding with default"
                );
                self.substitutions.push(Substitution {
                    field,
                    raw: raw.to_string(),
                    value: fallback,
                });
                fallback
            }
        };
        self.values[field.index()] = value;
        self.dirty = true;
        value
    }

    pub fn parse_and_store<'a, I>(&mut self, fields: I) -> HologramParams
    where
        I: IntoIterator<Item = (Field, &'a str)>,
    {
        for (field, raw) in fields {
            self.commit(field, raw);
        }
        self.get_current()
    }

    #[must_use]
    pub fn get_current(&self) -> HologramParams {
        HologramParams {
            l: self.get(Field::L),
            nx: self.get(Field::Nx),
            ny: self.get(Field::Ny),
            x0: self.get(Field::X0),
            y0: self.get(Field::Y0),
        }
    }

    #[must_use]
    pub fn x_range(&self) -> SweepRange {
        SweepRange::from_parts(
            self.get(Field::XStart),
            self.get(Field::XStop),
            self.get(Field::XStep),
        )
    }

    #[must_use]
    pub fn y_range(&self) -> SweepRange {
        SweepRange::from_parts(
            self.get(Field::YStart),
            self.get(Field::YStop),
            self.get(Field::YStep),
        )
    }

    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Returns whether a regeneration is due and clears the flag.
    #[inline]
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    #[inline]
    #[must_use]
    pub fn substitutions(&self) -> &[Substitution] {
        &self.substitutions
    }

    pub fn take_substitutions(&mut self) -> Vec<Substitution> {
        std::mem::take(&mut self.substitutions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_defaults() {
        let store = ParameterStore::new(Profile::Gather);
        assert_eq!(
            store.get_current(),
            HologramParams {
                l: 2,
                nx: 100,
                ny: 100,
                x0: 0,
                y0: 0
            }
        );
        assert_eq!(store.x_range(), SweepRange::new(-100, 100, 10).unwrap());
        assert_eq!(store.y_range(), SweepRange::new(-100, 100, 10).unwrap());
    }

    #[test]
    fn interactive_charge_falls_back_to_one() {
        let mut store = ParameterStore::new(Profile::Interactive);
        assert_eq!(store.get(Field::L), 2);
        assert_eq!(store.get(Field::Nx), 50);
        assert_eq!(store.commit(Field::L, "two"), 1);
        assert_eq!(store.get(Field::L), 1);
    }

    #[test]
    fn malformed_text_defaults_only_that_field() {
        let mut store = ParameterStore::new(Profile::Gather);
        store.parse_and_store([
            (Field::L, "-3"),
            (Field::Nx, "70"),
            (Field::Ny, "80"),
            (Field::X0, "12"),
        ]);
        let params = store.parse_and_store([(Field::Nx, "abc")]);
        assert_eq!(
            params,
            HologramParams {
                l: -3,
                nx: 100,
                ny: 80,
                x0: 12,
                y0: 0
            }
        );
        assert_eq!(
            store.substitutions(),
            &[Substitution {
                field: Field::Nx,
                raw: "abc".to_string(),
                value: 100
            }]
        );
        assert_eq!(store.take_substitutions().len(), 1);
        assert!(store.substitutions().is_empty());
    }

    #[test]
    fn out_of_range_values_are_defaulted() {
        let mut store = ParameterStore::new(Profile::Interactive);
        assert_eq!(store.commit(Field::Ny, "-5"), 50);
        assert_eq!(store.commit(Field::XStep, "0"), 10);
        assert_eq!(store.commit(Field::YStep, "-20"), -20);
        assert_eq!(store.substitutions().len(), 2);
    }

    #[test]
    fn surrounding_whitespace_and_signs_parse() {
        let mut store = ParameterStore::new(Profile::Interactive);
        assert_eq!(store.commit(Field::X0, "  -42 "), -42);
        assert_eq!(store.commit(Field::Y0, "+7"), 7);
        assert_eq!(store.commit(Field::Nx, ""), 50);
        assert_eq!(store.commit(Field::Ny, "3.5"), 50);
    }

    #[test]
    fn dirty_flag_tracks_commits() {
        let mut store = ParameterStore::new(Profile::Interactive);
        assert!(store.take_dirty());
        assert!(!store.take_dirty());
        store.commit(Field::L, "2");
        assert!(store.is_dirty());
        assert!(store.take_dirty());
        assert!(!store.is_dirty());
    }

    #[test]
    fn field_keys() {
        assert_eq!(Field::from_key("x_start"), Some(Field::XStart));
        assert_eq!(Field::from_key("z0"), None);
        assert_eq!(Field::from_key("NX"), None);
        for field in Field::ALL {
            assert_eq!(Field::from_key(field.key()), Some(field));
            assert_eq!(Field::from_command_name(&field.command_name()), Some(field));
        }
    }

    #[test]
    fn command_names_are_case_sensitive() {
        assert_eq!(Field::from_command_name("NX"), Some(Field::Nx));
        assert_eq!(Field::from_command_name("Y_STEP"), Some(Field::YStep));
        assert_eq!(Field::from_command_name("nx"), None);
        assert_eq!(Field::from_command_name("X_start"), None);
    }

    #[test]
    fn profile_names() {
        assert_eq!("Gather".parse::<Profile>(), Ok(Profile::Gather));
        assert_eq!(Profile::Interactive.to_string(), "interactive");
        assert!("live".parse::<Profile>().is_err());
    }
}
