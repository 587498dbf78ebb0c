//! Resolve a user's mount identifier to one catalog path.

use crate::interactive::{Interaction, Prompt};

use super::MountError;
use super::catalog::{MountCatalog, normalize_declared_path, relative};

/// Match `identifier` against the catalog.
///
/// In order: exact match (a leading slash is not significant), then a unique
/// case-sensitive substring of the app-relative path, then a 1-based position
/// in catalog order. Several substring candidates without an exact match is
/// an error; there is no further tie-break.
pub fn match_by_identifier<'c>(
    identifier: &str,
    catalog: &'c MountCatalog,
) -> Result<&'c str, MountError> {
    let wanted = normalize_declared_path(identifier);
    let wanted_relative = relative(&wanted);

    if wanted_relative.is_empty() {
        return Err(MountError::NotFound(identifier.to_string()));
    }

    if let Some(path) = catalog
        .paths()
        .find(|path| *path == wanted || relative(path) == wanted_relative)
    {
        return Ok(path);
    }

    let candidates: Vec<&str> = catalog
        .paths()
        .filter(|path| relative(path).contains(wanted_relative))
        .collect();

    match candidates.as_slice() {
        [only] => {
            tracing::debug!(identifier, mount = %only, "matched mount by substring");
            Ok(*only)
        }
        [] => by_position(identifier, catalog),
        _ => Err(MountError::Ambiguous {
            identifier: identifier.to_string(),
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
        }),
    }
}

fn by_position<'c>(identifier: &str, catalog: &'c MountCatalog) -> Result<&'c str, MountError> {
    identifier
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|index| catalog.paths().nth(index))
        .ok_or_else(|| MountError::NotFound(identifier.to_string()))
}

/// Let the user pick a mount from a numbered list in catalog order.
pub fn choose_interactively<'c>(
    catalog: &'c MountCatalog,
    interaction: Interaction,
    prompt: &dyn Prompt,
) -> Result<&'c str, MountError> {
    if !interaction.interactive {
        return Err(MountError::NonInteractive);
    }

    let index = prompt.choose(
        &catalog.options(),
        "Enter a number to choose a mount to download from:",
    )?;

    catalog
        .paths()
        .nth(index)
        .ok_or_else(|| MountError::NotFound(format!("#{}", index + 1)))
}
