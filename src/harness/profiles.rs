//! Locating test profiles on disk.

use std::fs;
use std::path::{Path, PathBuf};

/// Fixture profile for each test kind, in lookup order.
pub const TEST_FILES: [(&str, &str); 5] = [
    ("sine", "Sine.vsp"),
    ("random", "Random.vrp"),
    ("shock", "Shock.vkp"),
    ("transient", "Transient.vtp"),
    ("replay", "FDR.vrp"),
];

fn fixture_for(kind: &str) -> Option<&'static str> {
    TEST_FILES
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(kind))
        .map(|(_, f)| *f)
}

fn extension_of(file: &str) -> Option<String> {
    Path::new(file)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
}

fn sorted_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .filter_map(|e| e.file_name().into_string().ok())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

/// Find a profile for `kind` (`sine`, `random`, `shock`, `transient`, `replay`).
///
/// Lookup order:
/// 1. the fixture file for `kind` in `profiles_dir`
/// 2. any file with the fixture's extension
/// 3. any file with an extension of a known fixture
/// 4. the path of the first fixture, even if it does not exist
pub fn find_test_file(profiles_dir: &Path, kind: &str) -> PathBuf {
    let fixture = fixture_for(kind);

    if let Some(file) = fixture {
        let exact = profiles_dir.join(file);
        if exact.exists() {
            return exact;
        }
    }

    if profiles_dir.is_dir() {
        let entries = sorted_entries(profiles_dir);

        if let Some(ext) = fixture.and_then(extension_of) {
            if let Some(name) = entries.iter().find(|n| n.to_ascii_lowercase().ends_with(&ext)) {
                return profiles_dir.join(name);
            }
        }

        let known: Vec<String> = TEST_FILES.iter().filter_map(|(_, f)| extension_of(f)).collect();
        if let Some(name) = entries.iter().find(|n| {
            let lower = n.to_ascii_lowercase();
            known.iter().any(|ext| lower.ends_with(ext))
        }) {
            return profiles_dir.join(name);
        }
    }

    profiles_dir.join(TEST_FILES[0].1)
}

/// Where to save data for `test_file`: same stem in `data_dir`, last extension
/// letter replaced by `d` (`Sine.vsp` → `Sine.vsd`).
pub fn data_save_path(data_dir: &Path, test_file: &Path) -> PathBuf {
    let stem = test_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match test_file.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.chars().count() >= 3 => {
            format!("{stem}.{}d", ext.chars().take(2).collect::<String>())
        }
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    };
    data_dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn exact_fixture_wins() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Sine.vsp");
        touch(dir.path(), "Another.vsp");
        assert_eq!(find_test_file(dir.path(), "sine"), dir.path().join("Sine.vsp"));
    }

    #[test]
    fn same_extension_fallback() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Custom Shock.VKP");
        assert_eq!(
            find_test_file(dir.path(), "shock"),
            dir.path().join("Custom Shock.VKP")
        );
    }

    #[test]
    fn any_known_extension_fallback() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "Burn-in.vrp");
        assert_eq!(find_test_file(dir.path(), "sine"), dir.path().join("Burn-in.vrp"));
        assert_eq!(find_test_file(dir.path(), "unknown"), dir.path().join("Burn-in.vrp"));
    }

    #[test]
    fn default_when_nothing_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert_eq!(find_test_file(&missing, "random"), missing.join("Sine.vsp"));
    }

    #[test]
    fn data_path_swaps_extension() {
        let data = Path::new("data");
        assert_eq!(data_save_path(data, Path::new("Profiles/Sine.vsp")), data.join("Sine.vsd"));
        assert_eq!(data_save_path(data, Path::new("FDR.vrp")), data.join("FDR.vrd"));
        assert_eq!(data_save_path(data, Path::new("odd.x")), data.join("odd.x"));
    }
}
