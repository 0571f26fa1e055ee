// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deciding how many lanes to split tests into.

use crate::{entity::TestEntityMap, errors::ParallelismParseError};
use serde::Deserialize;
use std::{fmt, num::ParseIntError, str::FromStr};

/// How many lanes to split tests into.
///
/// Textually, this is either `count:N` or `time:M` (minutes). In TOML, a bare positive integer is
/// the same as `count:N`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Parallelism {
    /// A fixed number of lanes, or fewer if there are fewer entities than lanes.
    Count(usize),

    /// As many lanes as needed for each lane to take about this many minutes.
    Time {
        /// The target duration of each lane, in minutes.
        minutes: u64,
    },
}

impl Parallelism {
    /// Computes the number of lanes for the given entities.
    ///
    /// A count-driven strategy may return 0 for an empty set of entities: callers must handle that
    /// case. A time-driven strategy always returns at least 1.
    pub fn calculate(self, entities: &TestEntityMap) -> usize {
        match self {
            Self::Count(count) => count.min(entities.len()),
            Self::Time { minutes } => {
                let lane_ms = minutes.saturating_mul(60_000).max(1);
                let total = entities.total_duration_ms();
                let lanes = total.div_ceil(lane_ms).max(1);
                usize::try_from(lanes).unwrap_or(usize::MAX)
            }
        }
    }
}

impl fmt::Display for Parallelism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(count) => write!(f, "count:{count}"),
            Self::Time { minutes } => write!(f, "time:{minutes}"),
        }
    }
}

impl FromStr for Parallelism {
    type Err = ParallelismParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The input looks like "count:<lanes>" or "time:<minutes>".
        if let Some(input) = s.strip_prefix("count:") {
            let count = parse_positive(input, "count:N", "lane count")?;
            Ok(Self::Count(count))
        } else if let Some(input) = s.strip_prefix("time:") {
            let minutes = parse_positive(input, "time:M", "minutes per lane")?;
            Ok(Self::Time { minutes })
        } else {
            Err(ParallelismParseError::new(
                None,
                format!("parallelism input '{s}' must begin with \"count:\" or \"time:\""),
            ))
        }
    }
}

fn parse_positive<T>(
    input: &str,
    expected_format: &'static str,
    what: &str,
) -> Result<T, ParallelismParseError>
where
    T: FromStr<Err = ParseIntError> + Default + PartialEq,
{
    let value: T = input.parse().map_err(|err| {
        ParallelismParseError::new(
            Some(expected_format),
            format!("failed to parse {what} '{input}' as a positive integer: {err}"),
        )
    })?;
    if value == T::default() {
        return Err(ParallelismParseError::new(
            Some(expected_format),
            format!("{what} must be at least 1"),
        ));
    }
    Ok(value)
}

impl<'de> Deserialize<'de> for Parallelism {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = Parallelism;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(
                    formatter,
                    "a positive integer, or a string of the form \"count:N\" or \"time:M\""
                )
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse().map_err(E::custom)
            }

            // Note that TOML uses i64, not u64.
            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match usize::try_from(v) {
                    Ok(count) if count > 0 => Ok(Parallelism::Count(count)),
                    _ => Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Signed(v),
                        &self,
                    )),
                }
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match usize::try_from(v) {
                    Ok(count) if count > 0 => Ok(Parallelism::Count(count)),
                    _ => Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Unsigned(v),
                        &self,
                    )),
                }
            }
        }

        deserializer.deserialize_any(V)
    }
}
