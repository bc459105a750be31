use anyhow::{bail, Result};
use tracing::info;

use crate::model::SolutionModel;
use crate::table::Table;

/// Resolves which of a model's tables to export based on include/exclude
/// filters. Names are those of [`SolutionModel::named_tables`].
pub fn resolve_tables<'m>(
    model: &'m SolutionModel,
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
) -> Result<Vec<(String, &'m Table)>> {
    let available = model.named_tables();

    let check_known = |names: &[String]| -> Result<()> {
        let unknown: Vec<&str> = names
            .iter()
            .filter(|n| !available.iter().any(|(name, _)| name == *n))
            .map(|n| n.as_str())
            .collect();
        if !unknown.is_empty() {
            bail!("Unknown table(s): {}", unknown.join(", "));
        }
        Ok(())
    };

    match (include, exclude) {
        (Some(_), Some(_)) => {
            bail!("Cannot use both --include and --exclude at the same time");
        }
        (Some(include_list), None) => {
            check_known(&include_list)?;
            let tables: Vec<_> = available
                .into_iter()
                .filter(|(name, _)| include_list.contains(name))
                .collect();
            info!(count = tables.len(), "including selected tables");
            Ok(tables)
        }
        (None, Some(exclude_list)) => {
            check_known(&exclude_list)?;
            let tables: Vec<_> = available
                .into_iter()
                .filter(|(name, _)| !exclude_list.contains(name))
                .collect();
            info!(count = tables.len(), "including tables after exclusions");
            Ok(tables)
        }
        (None, None) => {
            info!(count = available.len(), "including all tables");
            Ok(available)
        }
    }
}
