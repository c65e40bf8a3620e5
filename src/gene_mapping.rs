//! Accession → gene dictionary from NCBI Datasets gene reports.
//!
//! Input is the JSON-lines output of `datasets summary gene accession ...`,
//! already downloaded. Each line may hold a `reports` array; each report
//! names the queried accession and the gene it belongs to:
//!
//! ```text
//! {"reports": [{"query": ["NM_000014.6"],
//!               "gene": {"symbol": "A2M", "synonyms": ["..."], "chromosomes": ["12"]}}]}
//! ```
//!
//! Mitochondrion-only genes are skipped, since their reports tend to cover
//! the whole mitochondrial genome. Placeholder symbols are replaced by the
//! first synonym when the report has one.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::dictionary::AccessionGeneMap;
use crate::error::TatatError;
use crate::symbols::SymbolPolicy;

#[derive(Debug, Deserialize)]
struct ReportPage {
    #[serde(default)]
    reports: Vec<GeneReport>,
}

/// One entry of a Datasets gene summary.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneReport {
    #[serde(default)]
    pub query: Vec<String>,
    pub gene: Option<GeneSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneSummary {
    pub symbol: Option<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub chromosomes: Vec<String>,
}

impl GeneReport {
    /// `(accession, gene symbol)` this report contributes, if any.
    pub fn mapping(&self, policy: &SymbolPolicy) -> Option<(String, String)> {
        let accession = self.query.first()?;
        let gene = self.gene.as_ref()?;
        if gene.chromosomes.len() == 1 && gene.chromosomes[0] == "MT" {
            return None;
        }

        let symbol = gene.symbol.as_deref()?;
        let symbol = if policy.is_unambiguous(symbol) {
            symbol
        } else {
            gene.synonyms.first().map(String::as_str).unwrap_or(symbol)
        };
        Some((accession.clone(), symbol.to_string()))
    }
}

/// Reads gene reports from a JSON-lines stream into `map`.
///
/// Later reports for the same accession replace earlier ones.
pub fn read_gene_reports<R: BufRead>(
    reader: R,
    source: &str,
    policy: &SymbolPolicy,
    map: &mut AccessionGeneMap,
) -> Result<usize> {
    let mut added = 0;
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", source))?;
        if line.trim().is_empty() {
            continue;
        }

        let page: ReportPage = serde_json::from_str(&line)
            .map_err(|e| TatatError::malformed(source, idx + 1, e.to_string()))?;
        for report in &page.reports {
            if let Some((accession, gene)) = report.mapping(policy) {
                map.insert(accession, gene);
                added += 1;
            }
        }
    }
    Ok(added)
}

/// Builds the final dictionary for a set of searched accessions.
///
/// # Arguments
/// * `reports` - Datasets JSON-lines files
/// * `accessions` - Accessions present in the hit table; others are dropped
/// * `upper` - Upper-case every gene symbol
pub fn build_mapping<P: AsRef<Path>>(
    reports: &[P],
    accessions: &BTreeSet<String>,
    policy: &SymbolPolicy,
    upper: bool,
) -> Result<AccessionGeneMap> {
    let mut map = AccessionGeneMap::new();
    for path in reports {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open gene reports: {}", path.display()))?;
        let added = read_gene_reports(BufReader::new(file), &path.display().to_string(), policy, &mut map)?;
        log::debug!("{} gene reports read from {}", added, path.display());
    }

    map.retain_accessions(|acc| accessions.contains(acc));
    if upper {
        map.upper_case_genes();
    }
    log::info!("Datasets mapping keys count: {} (of {} accessions)", map.len(), accessions.len());
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const REPORTS: &str = r#"{"reports": [{"query": ["NM_1.1"], "gene": {"symbol": "a2m", "chromosomes": ["12"]}}, {"query": ["XM_2.1"], "gene": {"symbol": "LOC105", "synonyms": ["ABC1", "ABC2"]}}]}

{"total_count": 0}
{"reports": [{"query": ["NC_MT.1"], "gene": {"symbol": "COX1", "chromosomes": ["MT"]}}, {"query": ["XM_3.1"], "gene": {"symbol": "CUN7"}}, {"gene": {"symbol": "NOQUERY"}}]}
{"reports": [{"query": ["XM_4.1"], "gene": {"symbol": "TP53", "chromosomes": ["17", "MT"]}}]}
"#;

    fn read(data: &str) -> Result<AccessionGeneMap> {
        let mut map = AccessionGeneMap::new();
        read_gene_reports(Cursor::new(data), "test", &SymbolPolicy::default(), &mut map)?;
        Ok(map)
    }

    #[test]
    fn test_read_gene_reports() {
        let map = read(REPORTS).unwrap();
        assert_eq!(map.len(), 4);
        assert_eq!(map.lookup("NM_1.1"), Some("a2m"));
        assert_eq!(map.lookup("XM_2.1"), Some("ABC1"));
        // no synonym to fall back on
        assert_eq!(map.lookup("XM_3.1"), Some("CUN7"));
        assert_eq!(map.lookup("NC_MT.1"), None);
        assert_eq!(map.lookup("XM_4.1"), Some("TP53"));
    }

    #[test]
    fn test_invalid_json_line() {
        let err = read("{\"reports\": []}\n{oops\n").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TatatError>(),
            Some(TatatError::MalformedRecord { line: 2, .. })
        ));
    }

    #[test]
    fn test_build_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("datasets.jsonl");
        std::fs::write(&path, REPORTS).unwrap();

        let accessions: BTreeSet<String> = ["NM_1.1", "XM_2.1", "XM_9.9"].iter().map(|s| s.to_string()).collect();
        let map = build_mapping(&[&path], &accessions, &SymbolPolicy::default(), true).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.lookup("NM_1.1"), Some("A2M"));

        let out = dir.path().join("mapping.csv");
        map.write_csv(&out).unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "NM_1.1,A2M\nXM_2.1,ABC1\n");
    }
}
