use crate::index_monitor::{IndexLifecycle, IndexLifecycleMonitor};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

fn normalize_windows_path(path: &Path) -> PathBuf {
    #[cfg(windows)]
    {
        let raw = path.to_string_lossy();
        if let Some(rest) = raw.strip_prefix(r"\\?\UNC\") {
            return PathBuf::from(format!(r"\\{}", rest));
        }
        if let Some(rest) = raw.strip_prefix(r"\\?\") {
            return PathBuf::from(rest);
        }
    }
    path.to_path_buf()
}

/// The path as users expect to paste it: canonicalized Windows paths lose
/// their `\\?\` prefix.
pub fn normalize_path_for_display(path: &Path) -> String {
    normalize_windows_path(path).to_string_lossy().to_string()
}

/// `path` relative to `base`, or the full display path when it lies outside.
pub fn relative_display_path(path: &Path, base: &Path) -> String {
    let path = normalize_windows_path(path);
    let base = normalize_windows_path(base);
    match path.strip_prefix(&base) {
        Ok(rest) if rest.as_os_str().is_empty() => ".".to_string(),
        Ok(rest) => rest.to_string_lossy().to_string(),
        Err(_) => path.to_string_lossy().to_string(),
    }
}

/// Character positions in `text` to highlight for `query`: a contiguous
/// case-insensitive hit if there is one, else an in-order subsequence.
pub fn find_match_positions(text: &str, query: &str) -> HashSet<usize> {
    let mut out = HashSet::new();
    let text_chars: Vec<char> = text.chars().collect();
    let q_chars: Vec<char> = query.trim().chars().collect();
    if q_chars.is_empty() {
        return out;
    }

    let chars_equal = |a: char, b: char| {
        if a.is_ascii() && b.is_ascii() {
            a.eq_ignore_ascii_case(&b)
        } else {
            a == b
        }
    };

    if q_chars.len() <= text_chars.len() {
        for start in 0..=text_chars.len() - q_chars.len() {
            if q_chars
                .iter()
                .enumerate()
                .all(|(offset, q)| chars_equal(text_chars[start + offset], *q))
            {
                out.extend(start..start + q_chars.len());
                return out;
            }
        }
    }

    let mut qi = 0usize;
    for (i, ch) in text_chars.iter().enumerate() {
        if qi < q_chars.len() && chars_equal(*ch, q_chars[qi]) {
            out.insert(i);
            qi += 1;
        }
    }
    if qi == q_chars.len() {
        out
    } else {
        HashSet::new()
    }
}

/// Splits `text` into runs of (highlighted, segment) for rendering.
pub fn highlight_runs(text: &str, query: &str) -> Vec<(bool, String)> {
    let positions = find_match_positions(text, query);
    let mut runs: Vec<(bool, String)> = Vec::new();
    for (i, ch) in text.chars().enumerate() {
        let hit = positions.contains(&i);
        match runs.last_mut() {
            Some((last_hit, segment)) if *last_hit == hit => segment.push(ch),
            _ => runs.push((hit, ch.to_string())),
        }
    }
    runs
}

pub fn index_status_text(monitor: &IndexLifecycleMonitor) -> String {
    let progress = monitor.progress();
    match monitor.state() {
        IndexLifecycle::Idle => "Index not built".to_string(),
        IndexLifecycle::Building => format!(
            "Indexing {}/{} folders ({} files)",
            progress.indexed_folders, progress.total_folders, progress.total_files
        ),
        IndexLifecycle::Ready => format!(
            "{} files indexed",
            monitor.ready_file_count().unwrap_or_default()
        ),
    }
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_inside_and_outside_base() {
        assert_eq!(
            relative_display_path(Path::new("/home/u/proj/src/main.rs"), Path::new("/home/u/proj")),
            PathBuf::from("src").join("main.rs").to_string_lossy()
        );
        assert_eq!(
            relative_display_path(Path::new("/etc/hosts"), Path::new("/home/u/proj")),
            "/etc/hosts"
        );
        assert_eq!(
            relative_display_path(Path::new("/home/u/proj"), Path::new("/home/u/proj")),
            "."
        );
    }

    #[test]
    fn contiguous_hit_wins_over_subsequence() {
        let positions = find_match_positions("read_me_readme.md", "README");
        let mut sorted: Vec<usize> = positions.into_iter().collect();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![8, 9, 10, 11, 12, 13]);
    }

    #[test]
    fn multibyte_query_only_highlights_matched_chars() {
        let text = "日本語テスト資料.txt";
        let positions = find_match_positions(text, "テスト");
        let highlighted: String = text
            .chars()
            .enumerate()
            .filter_map(|(idx, ch)| positions.contains(&idx).then_some(ch))
            .collect();
        assert_eq!(highlighted, "テスト");
    }

    #[test]
    fn unmatched_query_highlights_nothing() {
        assert!(find_match_positions("main.rs", "zzz").is_empty());
        assert!(find_match_positions("main.rs", "  ").is_empty());
    }

    #[test]
    fn runs_alternate_between_plain_and_highlighted() {
        let runs = highlight_runs("notes.md", "te");
        assert_eq!(
            runs,
            vec![
                (false, "no".to_string()),
                (true, "te".to_string()),
                (false, "s.md".to_string()),
            ]
        );
    }

    #[test]
    fn idle_monitor_reports_unbuilt_index() {
        assert_eq!(
            index_status_text(&IndexLifecycleMonitor::new()),
            "Index not built"
        );
    }

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate_chars("abc", 5), "abc");
        assert_eq!(truncate_chars("abcdefgh", 6), "abc...");
    }

    #[test]
    #[cfg(not(windows))]
    fn normalize_path_for_display_keeps_unix_paths() {
        assert_eq!(
            normalize_path_for_display(Path::new("/home/u/notes.md")),
            "/home/u/notes.md"
        );
    }

    #[test]
    #[cfg(target_os = "windows")]
    fn normalize_path_for_display_strips_extended_prefix_for_drive_path() {
        let raw = PathBuf::from(r"\\?\C:\Users\tester\file.txt");
        assert_eq!(
            normalize_path_for_display(&raw),
            r"C:\Users\tester\file.txt"
        );
    }

    #[test]
    #[cfg(target_os = "windows")]
    fn normalize_path_for_display_converts_unc_extended_prefix() {
        let raw = PathBuf::from(r"\\?\UNC\server\share\folder\file.txt");
        assert_eq!(
            normalize_path_for_display(&raw),
            r"\\server\share\folder\file.txt"
        );
    }
}
