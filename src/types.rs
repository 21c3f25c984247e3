use std::str::FromStr;
use serde::Deserialize;

/// What the reactor does once a project fails.
///
/// - `FailFast`: stop scheduling ordinary work anywhere in the reactor
///   (default behaviour).
/// - `FailAtEnd`: exclude the failed project and everything downstream of it,
///   let unrelated projects finish, and report at the end.
/// - `FailNever`: record failures but never block other work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FailureBehaviour {
    #[default]
    FailFast,
    FailAtEnd,
    FailNever,
}

impl FromStr for FailureBehaviour {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "fail-fast" | "ff" => Ok(FailureBehaviour::FailFast),
            "fail-at-end" | "fae" => Ok(FailureBehaviour::FailAtEnd),
            "fail-never" | "fn" => Ok(FailureBehaviour::FailNever),
            other => Err(format!(
                "invalid failure behaviour: {other} (expected \"fail-fast\", \"fail-at-end\" or \"fail-never\")"
            )),
        }
    }
}

/// Where a bound goal execution came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionSource {
    /// Requested directly on the command line (`prefix:goal`).
    Cli,
    /// Bound to a lifecycle phase by a plugin execution.
    Lifecycle,
    /// Synthesised while expanding a forked execution.
    Fork,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_names() {
        assert_eq!("fail-fast".parse(), Ok(FailureBehaviour::FailFast));
        assert_eq!("FAIL_AT_END".parse(), Ok(FailureBehaviour::FailAtEnd));
        assert_eq!("fn".parse(), Ok(FailureBehaviour::FailNever));
        assert!("sometimes".parse::<FailureBehaviour>().is_err());
    }
}
