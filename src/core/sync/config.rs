/*!
 * Synchronization Configuration
 *
 * Runtime configuration for counter strategy selection and reducer limits
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable consulted by [`AccumulatorConfig::from_env`]
pub const STRATEGY_ENV: &str = "ACCUMULATOR_STRATEGY";

/// Strategy type selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterStrategy {
    /// Exclusive lock around every read-modify-write
    Locked,
    /// Hardware atomic add
    Atomic,
    /// Private per-contributor tallies merged once on finish
    Partitioned,
    /// Auto-select (resolves to `Partitioned`)
    Auto,
}

impl CounterStrategy {
    /// Every concrete strategy, in a stable order
    pub const CONCRETE: [CounterStrategy; 3] = [Self::Locked, Self::Atomic, Self::Partitioned];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Locked => "locked",
            Self::Atomic => "atomic",
            Self::Partitioned => "partitioned",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for CounterStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown strategy name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown counter strategy '{0}' (expected locked, atomic, partitioned or auto)")]
pub struct ParseStrategyError(pub String);

impl FromStr for CounterStrategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "locked" | "mutex" => Ok(Self::Locked),
            "atomic" => Ok(Self::Atomic),
            "partitioned" => Ok(Self::Partitioned),
            "auto" | "" => Ok(Self::Auto),
            other => Err(ParseStrategyError(other.to_string())),
        }
    }
}

/// Counter configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulatorConfig {
    /// Preferred strategy
    pub strategy: CounterStrategy,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            strategy: CounterStrategy::Auto,
        }
    }
}

impl AccumulatorConfig {
    pub const fn new(strategy: CounterStrategy) -> Self {
        Self { strategy }
    }

    /// Read the strategy from `ACCUMULATOR_STRATEGY`, falling back to `Auto`
    ///
    /// An unparseable value is logged and ignored.
    pub fn from_env() -> Self {
        let strategy = match std::env::var(STRATEGY_ENV) {
            Ok(raw) => raw.parse::<CounterStrategy>().unwrap_or_else(|e: ParseStrategyError| {
                tracing::warn!(error = %e, "Ignoring {}", STRATEGY_ENV);
                CounterStrategy::Auto
            }),
            Err(_) => CounterStrategy::Auto,
        };
        Self { strategy }
    }

    /// Resolve `Auto` to a concrete strategy
    pub fn select_strategy(&self) -> CounterStrategy {
        match self.strategy {
            // Private tallies need no shared guard at all
            CounterStrategy::Auto => CounterStrategy::Partitioned,
            other => other,
        }
    }
}

/// Fork-join reducer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReducerConfig {
    /// Upper bound for async reductions; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl ReducerConfig {
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_resolves_to_partitioned() {
        assert_eq!(
            AccumulatorConfig::default().select_strategy(),
            CounterStrategy::Partitioned
        );
        assert_eq!(
            AccumulatorConfig::new(CounterStrategy::Locked).select_strategy(),
            CounterStrategy::Locked
        );
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!("Atomic".parse::<CounterStrategy>(), Ok(CounterStrategy::Atomic));
        assert_eq!(" mutex ".parse::<CounterStrategy>(), Ok(CounterStrategy::Locked));
        assert_eq!("".parse::<CounterStrategy>(), Ok(CounterStrategy::Auto));
        assert!("spin".parse::<CounterStrategy>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for strategy in CounterStrategy::CONCRETE {
            assert_eq!(strategy.to_string().parse::<CounterStrategy>(), Ok(strategy));
        }
    }

    #[test]
    fn test_reducer_timeout() {
        assert_eq!(ReducerConfig::default().timeout, None);
        assert_eq!(
            ReducerConfig::with_timeout(Duration::from_millis(5)).timeout,
            Some(Duration::from_millis(5))
        );
    }
}
