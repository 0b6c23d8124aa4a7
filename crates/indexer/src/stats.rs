use codeintel_code_chunker::Domain;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Statistics about one pipeline run (one unit, or many merged)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Number of source units processed
    pub units: usize,

    /// Number of chunks created
    pub chunks: usize,

    /// Units chunked by line windows instead of declarations
    pub fallback_units: usize,

    /// Parse errors that triggered the fallback
    pub parse_errors: Vec<String>,

    /// ModuleImportIndex constructions
    pub import_index_builds: usize,

    /// Chunks left in METADATA_FAILED
    pub metadata_failures: usize,

    /// Individual facets that took their default value
    pub facet_failures: usize,

    /// Syntax nodes visited by the index build and every facet
    pub syntax_nodes_visited: usize,

    /// Chunks that reached EMBEDDED
    pub embedded: usize,

    /// Chunks without a vector, per domain
    pub embedding_failures: BTreeMap<Domain, usize>,

    /// Records a sink refused
    pub sink_failures: usize,

    /// Time taken in milliseconds
    pub time_ms: u64,

    /// Units per language
    pub languages: BTreeMap<String, usize>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_unit(&mut self, language: &str) {
        self.units += 1;
        *self.languages.entry(language.to_string()).or_insert(0) += 1;
    }

    pub fn add_parse_error(&mut self, file_id: &str, error: impl std::fmt::Display) {
        self.parse_errors.push(format!("{file_id}: {error}"));
    }

    pub fn add_embedding_failures(&mut self, domain: Domain, count: usize) {
        *self.embedding_failures.entry(domain).or_insert(0) += count;
    }

    pub fn total_embedding_failures(&self) -> usize {
        self.embedding_failures.values().sum()
    }

    /// Fold another run into this one; elapsed time is the longest of the two
    pub fn merge(&mut self, other: &RunStats) {
        self.units += other.units;
        self.chunks += other.chunks;
        self.fallback_units += other.fallback_units;
        self.parse_errors.extend(other.parse_errors.iter().cloned());
        self.import_index_builds += other.import_index_builds;
        self.metadata_failures += other.metadata_failures;
        self.facet_failures += other.facet_failures;
        self.syntax_nodes_visited += other.syntax_nodes_visited;
        self.embedded += other.embedded;
        for (domain, count) in &other.embedding_failures {
            self.add_embedding_failures(*domain, *count);
        }
        self.sink_failures += other.sink_failures;
        self.time_ms = self.time_ms.max(other.time_ms);
        for (language, count) in &other.languages {
            *self.languages.entry(language.clone()).or_insert(0) += count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn merge_sums_counters() {
        let mut total = RunStats::new();
        let mut a = RunStats::new();
        a.add_unit("python");
        a.chunks = 3;
        a.time_ms = 12;
        a.add_embedding_failures(Domain::Code, 3);
        let mut b = RunStats::new();
        b.add_unit("python");
        b.add_unit("markdown");
        b.chunks = 2;
        b.time_ms = 7;
        b.add_parse_error("notes.py", "too many syntax errors");

        total.merge(&a);
        total.merge(&b);

        assert_eq!(total.units, 3);
        assert_eq!(total.chunks, 5);
        assert_eq!(total.time_ms, 12);
        assert_eq!(total.languages.get("python"), Some(&2));
        assert_eq!(total.total_embedding_failures(), 3);
        assert_eq!(total.parse_errors, vec!["notes.py: too many syntax errors".to_string()]);
    }
}
