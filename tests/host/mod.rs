mod tests_analysis_host;
