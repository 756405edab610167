//! Engine tunables (spec §6).

/// Tunable engine behavior, snapshotted by value into each Foundry/Smith.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// If true, a failing step is recorded into a per-run error list and
    /// the run continues; if every step finishes, the run fails with an
    /// aggregated error at the end (S5).
    pub continue_on_error: bool,

    /// If true, each step's output becomes the next step's input. If
    /// false, every step receives the workflow's initial input.
    ///
    /// Defaults to `true` (see SPEC_FULL.md Open Question resolutions).
    pub enable_output_chaining: bool,

    /// Upper bound on concurrent `Smith::forge` calls across all workflows
    /// a given Smith drives. `0` means unbounded.
    pub max_concurrent_workflows: usize,

    /// If true, compensation stops at the first child restore failure.
    pub fail_fast_compensation: bool,

    /// If true, compensation errors surface alongside the original failure
    /// as an aggregate (original first, then compensation errors).
    pub throw_on_compensation_error: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            continue_on_error: false,
            enable_output_chaining: true,
            max_concurrent_workflows: 0,
            fail_fast_compensation: false,
            throw_on_compensation_error: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_enables_output_chaining() {
        assert!(Options::default().enable_output_chaining);
    }

    #[test]
    fn default_is_unbounded_concurrency() {
        assert_eq!(Options::default().max_concurrent_workflows, 0);
    }
}
