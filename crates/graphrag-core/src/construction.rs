//! # Construction Module
//!
//! Stage 1 of the workflow: turning extracted textual facts into a knowledge
//! graph.
//!
//! - Parse TSV or JSON triplet files
//! - Validate every record before any graph mutation
//! - Deduplicate identical triplets
//! - No semantic inference or entity resolution beyond exact names

use crate::graph::TripletStore;
use crate::primitives::{MAX_NAME_LENGTH, MAX_TRIPLETS};
use crate::{GraphragError, RawTriplet, Triplet};
use serde::{Deserialize, Serialize};

/// Input formats understood by the constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// `head<TAB>relation<TAB>tail` per line.
    Tsv,
    /// JSON array of `{ "head", "relation", "tail" }` objects.
    Json,
}

impl std::str::FromStr for InputFormat {
    type Err = GraphragError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tsv" => Ok(Self::Tsv),
            "json" => Ok(Self::Json),
            other => Err(GraphragError::InvalidConfig(format!(
                "Unknown format: {}. Use: tsv, json",
                other
            ))),
        }
    }
}

/// Outcome of a construction batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionReport {
    /// Records read from the input.
    pub triplets_seen: usize,
    /// Triplets that were new to the store.
    pub triplets_added: usize,
    /// Records that were already present.
    pub duplicates: usize,
    /// Entity count after the batch.
    pub entities: usize,
    /// Relation count after the batch.
    pub relations: usize,
}

/// The Constructor validates raw facts and writes them to a triplet store.
pub struct Constructor;

impl Constructor {
    /// Validate a single name field.
    fn validate_name(field: &str, value: &str) -> Result<(), GraphragError> {
        if value.is_empty() {
            return Err(GraphragError::InvalidTriplet(format!("empty {}", field)));
        }
        if value.len() > MAX_NAME_LENGTH {
            return Err(GraphragError::InvalidTriplet(format!(
                "{} length {} exceeds maximum {} bytes",
                field,
                value.len(),
                MAX_NAME_LENGTH
            )));
        }
        if value.chars().any(char::is_control) {
            return Err(GraphragError::InvalidTriplet(format!(
                "{} contains control characters",
                field
            )));
        }
        Ok(())
    }

    /// Trim and validate a raw triplet.
    ///
    /// A triplet is valid if every field is non-empty after trimming, within
    /// `MAX_NAME_LENGTH` and free of control characters.
    pub fn normalize(raw: &RawTriplet) -> Result<RawTriplet, GraphragError> {
        let triplet = RawTriplet::new(raw.head.trim(), raw.relation.trim(), raw.tail.trim());
        Self::validate_name("head", &triplet.head)?;
        Self::validate_name("relation", &triplet.relation)?;
        Self::validate_name("tail", &triplet.tail)?;
        Ok(triplet)
    }

    /// Parse TSV text. Blank lines and `#` comments are skipped; any other
    /// line must have exactly three tab-separated fields.
    pub fn parse_tsv(text: &str) -> Result<Vec<RawTriplet>, GraphragError> {
        let mut triplets = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let [head, relation, tail] = fields.as_slice() else {
                return Err(GraphragError::InvalidTriplet(format!(
                    "line {}: expected 3 tab-separated fields, found {}",
                    line_no + 1,
                    fields.len()
                )));
            };
            let raw = RawTriplet::new(*head, *relation, *tail);
            let normalized = Self::normalize(&raw).map_err(|e| {
                GraphragError::InvalidTriplet(format!("line {}: {}", line_no + 1, e))
            })?;
            triplets.push(normalized);
        }
        Ok(triplets)
    }

    /// Parse a JSON array of triplet objects.
    pub fn parse_json(data: &[u8]) -> Result<Vec<RawTriplet>, GraphragError> {
        let raws: Vec<RawTriplet> = serde_json::from_slice(data)
            .map_err(|e| GraphragError::DeserializationError(e.to_string()))?;
        raws.iter()
            .enumerate()
            .map(|(idx, raw)| {
                Self::normalize(raw).map_err(|e| {
                    GraphragError::InvalidTriplet(format!("record {}: {}", idx, e))
                })
            })
            .collect()
    }

    /// Parse input bytes in the given format.
    pub fn parse(data: &[u8], format: InputFormat) -> Result<Vec<RawTriplet>, GraphragError> {
        let triplets = match format {
            InputFormat::Tsv => {
                let text = std::str::from_utf8(data).map_err(|e| {
                    GraphragError::InvalidTriplet(format!(
                        "TSV input is not valid UTF-8 at byte {}",
                        e.valid_up_to()
                    ))
                })?;
                Self::parse_tsv(text)?
            }
            InputFormat::Json => Self::parse_json(data)?,
        };
        if triplets.len() > MAX_TRIPLETS {
            return Err(GraphragError::InvalidTriplet(format!(
                "Triplet count {} exceeds maximum {}",
                triplets.len(),
                MAX_TRIPLETS
            )));
        }
        Ok(triplets)
    }

    /// Insert one raw triplet into any store.
    ///
    /// Returns the resolved triplet and whether it was new.
    pub fn ingest_triplet<S: TripletStore>(
        store: &mut S,
        raw: &RawTriplet,
    ) -> Result<(Triplet, bool), GraphragError> {
        let raw = Self::normalize(raw)?;
        let head = store.insert_entity(&raw.head)?;
        let relation = store.insert_relation(&raw.relation)?;
        let tail = store.insert_entity(&raw.tail)?;
        let triplet = Triplet::new(head, relation, tail);
        let added = store.insert_triplet(triplet)?;
        Ok((triplet, added))
    }

    /// Insert a batch of raw triplets.
    ///
    /// The whole batch is validated before the store is touched, so a
    /// malformed record leaves the store unchanged.
    pub fn ingest_batch<S: TripletStore>(
        store: &mut S,
        raws: &[RawTriplet],
    ) -> Result<ConstructionReport, GraphragError> {
        if raws.len() > MAX_TRIPLETS {
            return Err(GraphragError::InvalidTriplet(format!(
                "Triplet count {} exceeds maximum {}",
                raws.len(),
                MAX_TRIPLETS
            )));
        }
        let normalized = raws
            .iter()
            .map(Self::normalize)
            .collect::<Result<Vec<_>, _>>()?;

        let mut report = ConstructionReport {
            triplets_seen: normalized.len(),
            ..ConstructionReport::default()
        };
        for raw in &normalized {
            let (_, added) = Self::ingest_triplet(store, raw)?;
            if added {
                report.triplets_added += 1;
            } else {
                report.duplicates += 1;
            }
        }
        report.entities = store.entity_count()?;
        report.relations = store.relation_count()?;
        Ok(report)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::KnowledgeGraph;

    #[test]
    fn normalize_trims_fields() {
        let raw = RawTriplet::new("  Paris ", "capital_of", "France\n");
        let normalized = Constructor::normalize(&raw).expect("valid");
        assert_eq!(normalized, RawTriplet::new("Paris", "capital_of", "France"));
    }

    #[test]
    fn normalize_rejects_empty_fields() {
        assert!(Constructor::normalize(&RawTriplet::new("", "r", "t")).is_err());
        assert!(Constructor::normalize(&RawTriplet::new("h", "  ", "t")).is_err());
        assert!(Constructor::normalize(&RawTriplet::new("h", "r", "")).is_err());
    }

    #[test]
    fn normalize_rejects_oversized_and_control() {
        let long = "x".repeat(MAX_NAME_LENGTH + 1);
        assert!(Constructor::normalize(&RawTriplet::new(long, "r", "t")).is_err());
        assert!(Constructor::normalize(&RawTriplet::new("h\u{7}", "r", "t")).is_err());
    }

    #[test]
    fn parse_tsv_skips_comments_and_blanks() {
        let text = "# facts\nparis\tcapital_of\tfrance\n\nberlin\tcapital_of\tgermany\n";
        let triplets = Constructor::parse_tsv(text).expect("parse");
        assert_eq!(triplets.len(), 2);
        assert_eq!(triplets[1].head, "berlin");
    }

    #[test]
    fn parse_tsv_reports_line_number() {
        let text = "a\tb\tc\nbroken line\n";
        let err = Constructor::parse_tsv(text).expect_err("must fail");
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn parse_tsv_rejects_invalid_utf8() {
        let err = Constructor::parse(b"caf\xff\tr\tb\n", InputFormat::Tsv).expect_err("must fail");
        assert!(matches!(err, GraphragError::InvalidTriplet(_)));
        assert!(err.to_string().contains("byte 3"));
        assert!(Constructor::parse(b"caf\xff\tr\tb\n", InputFormat::Json).is_err());
    }

    #[test]
    fn parse_json_records() {
        let data = br#"[{"head": "a", "relation": "r", "tail": "b"}]"#;
        let triplets = Constructor::parse(data, InputFormat::Json).expect("parse");
        assert_eq!(triplets, vec![RawTriplet::new("a", "r", "b")]);
    }

    #[test]
    fn ingest_batch_counts_duplicates() {
        let mut graph = KnowledgeGraph::new();
        let raws = vec![
            RawTriplet::new("a", "r", "b"),
            RawTriplet::new("a", "r", "b"),
            RawTriplet::new("b", "r", "c"),
        ];
        let report = Constructor::ingest_batch(&mut graph, &raws).expect("ingest");
        assert_eq!(report.triplets_seen, 3);
        assert_eq!(report.triplets_added, 2);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.entities, 3);
        assert_eq!(report.relations, 1);
    }

    #[test]
    fn invalid_batch_leaves_store_untouched() {
        let mut graph = KnowledgeGraph::new();
        let raws = vec![RawTriplet::new("a", "r", "b"), RawTriplet::new("", "r", "c")];
        assert!(Constructor::ingest_batch(&mut graph, &raws).is_err());
        assert_eq!(graph.triplet_count().expect("count"), 0);
        assert_eq!(graph.entity_count().expect("count"), 0);
    }

    #[test]
    fn input_format_parsing() {
        assert_eq!("tsv".parse::<InputFormat>().ok(), Some(InputFormat::Tsv));
        assert!("csv".parse::<InputFormat>().is_err());
    }
}
