mod tests_equivalence;
