use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;

/// Read declared env files into a map without touching the process
/// environment. Missing files are skipped; within the list, the first file
/// defining a key wins.
pub fn load_env_files(files: &[PathBuf]) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();

    for file in files {
        if !file.exists() {
            continue;
        }
        let iter = dotenvy::from_path_iter(file).map_err(|source| Error::EnvFile {
            path: file.clone(),
            source,
        })?;
        for item in iter {
            let (key, value) = item.map_err(|source| Error::EnvFile {
                path: file.clone(),
                source,
            })?;
            vars.entry(key).or_insert(value);
        }
    }

    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{content}").unwrap();
        path
    }

    #[test]
    fn first_file_wins_for_duplicate_keys() {
        let dir = tempfile::tempdir().unwrap();
        let first = env_file(&dir, "a.env", "REGISTRY=registry.one\nTAG=latest\n");
        let second = env_file(&dir, "b.env", "REGISTRY=registry.two\nEXTRA=1\n");

        let vars = load_env_files(&[first, second]).unwrap();
        assert_eq!(vars["REGISTRY"], "registry.one");
        assert_eq!(vars["TAG"], "latest");
        assert_eq!(vars["EXTRA"], "1");
    }

    #[test]
    fn missing_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let present = env_file(&dir, "a.env", "KEY=value\n");
        let missing = dir.path().join("missing.env");

        let vars = load_env_files(&[missing, present]).unwrap();
        assert_eq!(vars.len(), 1);
        assert_eq!(vars["KEY"], "value");
    }

    #[test]
    fn empty_list_yields_an_empty_map() {
        let vars = load_env_files(&[]).unwrap();
        assert!(vars.is_empty());
    }
}
