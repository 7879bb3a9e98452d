//! CLI command definitions

use clap::Args;
use std::collections::HashSet;

/// Run a test procedure
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Name of the test file, without extension, inside TEST_DIR
    #[arg(short, long)]
    pub test: String,

    /// Comma separated stages to run (default: all)
    #[arg(short, long, value_delimiter = ',')]
    pub stages: Vec<String>,
}

impl RunCommand {
    /// Stage names to run; empty means every stage
    pub fn stage_filter(&self) -> HashSet<String> {
        parse_stages(&self.stages)
    }
}

/// List containers
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Include stopped containers
    #[arg(short, long)]
    pub all: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Trim stage names and drop empty ones
pub fn parse_stages<S: AsRef<str>>(stages: &[S]) -> HashSet<String> {
    stages
        .iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stages_ignores_blanks() {
        let stages = parse_stages(&[" setup", "", "cleanup ", "setup"]);
        assert_eq!(stages.len(), 2);
        assert!(stages.contains("setup"));
        assert!(stages.contains("cleanup"));
    }
}
