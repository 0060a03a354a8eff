//! Parsing for the dataframe-form matrix-spec column names (spec.md §4.2
//! "Assembly surface", §9 "Dynamic column semantics").
//!
//! Two column shapes: `SRC.SINK` names a coefficient cell; `[table.var]`
//! names a lookup-key dimension used to bucket rows. Parsed once into a
//! structured form (an `Op`-schema) rather than re-parsed per step, per
//! spec.md §9's explicit guidance.

use crate::error::ConfigurationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    /// `SRC.SINK` — a transfer coefficient from pool `src` to pool `sink`.
    Coefficient { src: String, sink: String },
    /// `[table.var]` — a lookup-key dimension, e.g. `[turnover.species]`.
    LookupKey { table: String, var: String },
}

/// Parse one column header into its structured form.
pub fn parse_column(name: &str) -> Result<ColumnKind, ConfigurationError> {
    if let Some(inner) = name.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let (table, var) = inner
            .split_once('.')
            .ok_or_else(|| ConfigurationError::MalformedColumnName(name.to_string()))?;
        if table.is_empty() || var.is_empty() {
            return Err(ConfigurationError::MalformedColumnName(name.to_string()));
        }
        return Ok(ColumnKind::LookupKey { table: table.to_string(), var: var.to_string() });
    }

    let (src, sink) = name
        .split_once('.')
        .ok_or_else(|| ConfigurationError::MalformedColumnName(name.to_string()))?;
    if src.is_empty() || sink.is_empty() {
        return Err(ConfigurationError::MalformedColumnName(name.to_string()));
    }
    Ok(ColumnKind::Coefficient { src: src.to_string(), sink: sink.to_string() })
}

/// Parse an entire header row, preserving column order — assembly
/// consumes the lookup-key columns to bucket rows and the coefficient
/// columns to build triples per bucket.
pub fn parse_schema(headers: &[String]) -> Result<Vec<ColumnKind>, ConfigurationError> {
    headers.iter().map(|h| parse_column(h)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_coefficient_column() {
        let c = parse_column("Merch.StemSnag").unwrap();
        assert_eq!(c, ColumnKind::Coefficient { src: "Merch".into(), sink: "StemSnag".into() });
    }

    #[test]
    fn parses_lookup_key_column() {
        let c = parse_column("[turnover.species]").unwrap();
        assert_eq!(c, ColumnKind::LookupKey { table: "turnover".into(), var: "species".into() });
    }

    #[test]
    fn rejects_malformed_column() {
        assert!(parse_column("NoDot").is_err());
        assert!(parse_column("[NoDot]").is_err());
        assert!(parse_column("[.]").is_err());
    }
}
