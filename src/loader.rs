use crate::Result;
use crate::error::TplError;
use glob::glob;
use log::debug;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Reads every file matching `pattern` and returns `(partial name, source)` pairs.
///
/// # Errors
/// Fails on an invalid pattern, an unreadable file, or two files sharing a stem.
pub(crate) fn load(pattern: &str) -> Result<Vec<(String, String)>> {
    let paths = glob(pattern)
        .map_err(|e| TplError::Loader(format!("invalid glob pattern '{}': {}", pattern, e)))?;

    let mut partials = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| TplError::Io {
            path: e.path().to_path_buf(),
            source: e.into(),
        })?;
        if !path.is_file() {
            continue;
        }
        let content = fs::read_to_string(&path).map_err(|source| TplError::Io {
            path: path.clone(),
            source,
        })?;
        partials.push((partial_name(&path)?, content));
    }

    check_duplicates(&partials, pattern)?;
    debug!("Loaded {} partials from '{}'", partials.len(), pattern);
    Ok(partials)
}

/// Names embedded `(path, content)` assets after their file stems.
pub(crate) fn load_assets(assets: Vec<(&str, &str)>) -> Result<Vec<(String, String)>> {
    let partials = assets
        .into_iter()
        .map(|(source, content)| Ok((partial_name(Path::new(source))?, content.to_string())))
        .collect::<Result<Vec<_>>>()?;
    check_duplicates(&partials, "embedded assets")?;
    Ok(partials)
}

fn partial_name(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| TplError::Loader(format!("cannot name a partial after '{}'", path.display())))
}

fn check_duplicates(partials: &[(String, String)], origin: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for (name, _) in partials {
        if !seen.insert(name.as_str()) {
            return Err(TplError::Loader(format!(
                "duplicate partial name '{}' in {}",
                name, origin
            )));
        }
    }
    Ok(())
}
