// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Input discovery and opening
//
// Log files are either named directly or discovered by matching a shell
// wildcard against the file names of one or more directories, in which case
// only the most recently modified matches are kept. Compressed logs are
// decoded on the fly based on their extension.

use regex::Regex;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Compression applied to a log file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Zstd,
    Lz4,
}

impl Compression {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("gz") => Compression::Gzip,
            Some("zst") => Compression::Zstd,
            Some("lz4") => Compression::Lz4,
            _ => Compression::None,
        }
    }
}

/// Translate a shell wildcard (`*`, `?`, `[...]`, `[!...]`) into an anchored
/// regex over a whole file name.
pub fn wildcard_to_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::with_capacity(pattern.len() * 2 + 2);
    re.push('^');

    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            '[' => match bracket_class(&chars[i + 1..]) {
                Some((class, consumed)) => {
                    re.push_str(&class);
                    i += consumed;
                }
                // unterminated class matches a literal '['
                None => re.push_str("\\["),
            },
            c => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
        i += 1;
    }

    re.push('$');
    Regex::new(&re)
        .map_err(|e| Error::InvalidConfig(format!("bad file pattern '{}': {}", pattern, e)))
}

/// Translate the bracket expression following a `[`. A `]` directly after
/// the opening bracket (or after a negating `!` or `^`) is a class member.
/// Returns the regex class and the number of pattern chars consumed, or
/// `None` when the class is not terminated.
fn bracket_class(rest: &[char]) -> Option<(String, usize)> {
    let negated = matches!(rest.first(), Some('!' | '^'));
    let start = usize::from(negated);
    let close = start + 1 + rest.get(start + 1..)?.iter().position(|&c| c == ']')?;

    let mut class = String::from(if negated { "[^" } else { "[" });
    let mut prev = None;
    for &c in &rest[start..close] {
        match c {
            // regex set operators and nested classes have no wildcard meaning
            '\\' | '[' | ']' | '&' | '~' | '^' => class.push('\\'),
            '-' if prev == Some('-') => class.push('\\'),
            _ => {}
        }
        class.push(c);
        prev = Some(c);
    }
    class.push(']');
    Some((class, close + 1))
}

/// A matching log file and its modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub modified: SystemTime,
}

fn scan_directory(dir: &Path, pattern: &Regex, found: &mut Vec<SourceFile>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Skipping directory {}: {}", dir.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !pattern.is_match(name) {
            continue;
        }

        let path = entry.path();
        let metadata = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }

        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        debug!("Candidate {} modified {:?}", path.display(), modified);
        found.push(SourceFile { path, modified });
    }
}

/// The `max_files` most recently modified files matching `pattern` across
/// `dirs`, ordered oldest first.
pub fn select_recent(dirs: &[PathBuf], pattern: &str, max_files: usize) -> Result<Vec<SourceFile>> {
    let re = wildcard_to_regex(pattern)?;

    let mut found = Vec::new();
    for dir in dirs {
        scan_directory(dir, &re, &mut found);
    }

    // newest first, path as tie breaker for a stable selection
    found.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.path.cmp(&b.path)));
    found.truncate(max_files);
    found.reverse();

    debug!("Selected {} of the files matching '{}'", found.len(), pattern);
    Ok(found)
}

/// Open a log file, decompressing by extension.
pub fn open_source(path: &Path) -> Result<Box<dyn Read>> {
    let open_err = |source: std::io::Error| Error::Open {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(open_err)?;
    let reader: Box<dyn Read> = match Compression::from_path(path) {
        Compression::None => Box::new(file),
        Compression::Gzip => Box::new(flate2::read::MultiGzDecoder::new(BufReader::new(file))),
        Compression::Zstd => Box::new(zstd::stream::read::Decoder::new(file).map_err(open_err)?),
        Compression::Lz4 => Box::new(lz4::Decoder::new(file).map_err(open_err)?),
    };
    Ok(reader)
}
