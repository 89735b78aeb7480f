use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use super::substitution::SubstitutionList;

/// Replaces every non-overlapping occurrence of `from` in `haystack`,
/// scanning left to right. Returns the rewritten bytes and the match count.
pub fn replace_literal(haystack: &[u8], from: &[u8], to: &[u8]) -> (Vec<u8>, usize) {
    if from.is_empty() || haystack.len() < from.len() {
        return (haystack.to_vec(), 0);
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut count = 0;
    let mut cursor = 0;
    while cursor + from.len() <= haystack.len() {
        if haystack[cursor..].starts_with(from) {
            out.extend_from_slice(to);
            cursor += from.len();
            count += 1;
        } else {
            out.push(haystack[cursor]);
            cursor += 1;
        }
    }
    out.extend_from_slice(&haystack[cursor..]);
    (out, count)
}

/// Rewrites `path` in place with `substitutions`, returning the number of
/// replacements made.
///
/// The whole file is read, so large scripts are never truncated. The new
/// content is written to a sibling temp file and renamed over the original,
/// keeping the original permissions. Files without a match are left
/// untouched.
pub fn rewrite_file(path: &Path, substitutions: &SubstitutionList) -> io::Result<usize> {
    let original = fs::read(path)?;
    let (rewritten, count) = substitutions.apply(&original);
    if count == 0 {
        return Ok(0);
    }
    let permissions = fs::metadata(path)?.permissions();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(&rewritten)?;
    temp.flush()?;
    fs::set_permissions(temp.path(), permissions)?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_literal_counts_matches() {
        let (out, count) = replace_literal(b"/a/b:/a/b:/a", b"/a/b", b"/x");
        assert_eq!(out, b"/x:/x:/a");
        assert_eq!(count, 2);
    }

    #[test]
    fn replace_literal_does_not_rescan_output() {
        let (out, count) = replace_literal(b"aa", b"a", b"aa");
        assert_eq!(out, b"aaaa");
        assert_eq!(count, 2);
    }

    #[test]
    fn replace_literal_handles_binary_content() {
        let (out, count) = replace_literal(b"\xff\x00/build\x00", b"/build", b"/opt/app");
        assert_eq!(out, b"\xff\x00/opt/app\x00");
        assert_eq!(count, 1);
    }

    #[test]
    fn rewrite_file_reads_large_scripts_whole() {
        let temp = tempfile::tempdir().expect("tempdir");
        let script = temp.path().join("big");
        let mut content = "#".repeat(300_000);
        content.push_str("\n/build/bin/python\n");
        fs::write(&script, &content).expect("write");
        let mut subs = SubstitutionList::new();
        subs.push("/build/bin/python", "/opt/app/bin/python");
        let count = rewrite_file(&script, &subs).expect("rewrite");
        assert_eq!(count, 1);
        let text = fs::read_to_string(&script).expect("read");
        assert!(text.ends_with("\n/opt/app/bin/python\n"));
        assert_eq!(text.len(), content.len() + 2);
    }

    #[cfg(unix)]
    #[test]
    fn rewrite_file_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let temp = tempfile::tempdir().expect("tempdir");
        let script = temp.path().join("run");
        fs::write(&script, "#!/build/bin/python\n").expect("write");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o750)).expect("chmod");
        let mut subs = SubstitutionList::new();
        subs.push("/build", "/opt/app");
        rewrite_file(&script, &subs).expect("rewrite");
        let mode = fs::metadata(&script).expect("meta").permissions().mode() & 0o777;
        assert_eq!(mode, 0o750);
        assert_eq!(
            fs::read_to_string(&script).expect("read"),
            "#!/opt/app/bin/python\n"
        );
    }
}
