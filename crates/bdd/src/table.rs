//! Step datatable helpers

use apicheck_common::{Error, ResolvedString, Result, ScenarioLogger, ValueResolver};

pub const TRANSFORM_HEADINGS: [&str; 3] = ["field", "value", "operation"];
pub const HEADER_HEADINGS: [&str; 2] = ["header key", "header value"];
pub const QUERY_HEADINGS: [&str; 2] = ["param key", "param value"];
pub const ASSERT_HEADINGS: [&str; 2] = ["field", "value"];
pub const ARRAY_HEADINGS: [&str; 1] = ["JSON Path"];

/// Every row must have exactly `columns` cells.
pub fn validate_datatable(rows: &[Vec<String>], columns: usize, headings: &[&str]) -> Result<()> {
    if rows.iter().any(|row| row.len() != columns) {
        return Err(Error::Configuration(format!(
            "Datatable must have {} columns {}",
            columns,
            headings.join(",")
        )));
    }
    Ok(())
}

/// Strip surrounding quotes and expand placeholders in every cell. Each
/// expanded placeholder is written to the scenario log.
pub fn resolve_table(
    resolver: &ValueResolver<'_>,
    logger: &mut ScenarioLogger,
    rows: &[Vec<String>],
) -> Result<Vec<Vec<ResolvedString>>> {
    let mut resolved = Vec::with_capacity(rows.len());
    for row in rows {
        let mut cells = Vec::with_capacity(row.len());
        for cell in row {
            let cell = ResolvedString::resolve(resolver, cell)?;
            if cell.value != cell.expression {
                logger.debug(format!("Resolved {} to {}", cell.expression, cell.value));
            }
            cells.push(cell);
        }
        resolved.push(cells);
    }
    Ok(resolved)
}

/// Resolved values only
pub fn values(rows: &[Vec<ResolvedString>]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().map(|cell| cell.value.clone()).collect())
        .collect()
}

/// Two-column rows as `(key, value)` pairs
pub fn pairs(rows: &[Vec<String>], headings: &[&str; 2]) -> Result<Vec<(String, String)>> {
    validate_datatable(rows, 2, headings)?;
    Ok(rows
        .iter()
        .map(|row| (row[0].clone(), row[1].clone()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use apicheck_common::{ConfigurationManager, PropertyFile};

    fn rows(cells: &[&[&str]]) -> Vec<Vec<String>> {
        cells
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_validate_datatable() {
        let ok = rows(&[&["$.a", "1", "SET"], &["$.b", "", "REMOVE"]]);
        assert!(validate_datatable(&ok, 3, &TRANSFORM_HEADINGS).is_ok());

        let short = rows(&[&["$.a", "1"]]);
        let err = validate_datatable(&short, 3, &TRANSFORM_HEADINGS).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("3 columns field,value,operation"));
    }

    #[test]
    fn test_resolve_table() {
        let config = ConfigurationManager::from_parts(
            "unused",
            PropertyFile::from_pairs([("apiTimeout", "12")]),
        )
        .with_env_lookup(|_| None);
        let resolver = ValueResolver::new(&config);
        let mut logger = ScenarioLogger::new(Some(tracing::Level::DEBUG));

        let resolved = resolve_table(
            &resolver,
            &mut logger,
            &rows(&[&["$.timeout", "\"${Configuration:apiTimeout}\""]]),
        )
        .unwrap();
        assert_eq!(resolved[0][1].value, "12");
        assert_eq!(resolved[0][1].expression, "${Configuration:apiTimeout}");
        assert_eq!(values(&resolved), rows(&[&["$.timeout", "12"]]));

        let logged: Vec<_> = logger.lines().iter().filter(|l| l.contains("Resolved")).collect();
        assert_eq!(logged.len(), 1);
        assert!(logged[0].contains("Resolved ${Configuration:apiTimeout} to 12"));
    }

    #[test]
    fn test_pairs() {
        let table = rows(&[&["X-One", "1"], &["X-Two", "2"]]);
        assert_eq!(
            pairs(&table, &HEADER_HEADINGS).unwrap(),
            vec![("X-One".to_string(), "1".to_string()), ("X-Two".to_string(), "2".to_string())]
        );
        assert!(pairs(&rows(&[&["only"]]), &HEADER_HEADINGS).is_err());
    }
}
