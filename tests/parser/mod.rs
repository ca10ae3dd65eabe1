mod tests_invariants;
mod tests_recovery;
mod tests_scenarios;
