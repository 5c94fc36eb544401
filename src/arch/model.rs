//! One CPU model family and the files that describe it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A CPU model such as Skylake, keyed by its short code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    /// Short code like `SKL`
    pub shortname: String,

    /// Lower-case long name like `skylake`
    pub longname: String,

    /// Version of the event files
    pub version: String,

    /// Identifiers like `GenuineIntel-6-4E`, sorted
    pub models: Vec<String>,

    /// File kind → URL
    pub files: BTreeMap<String, String>,
}

impl Model {
    pub fn new(
        shortname: &str,
        longname: &str,
        version: &str,
        models: BTreeSet<String>,
        files: BTreeMap<String, String>,
    ) -> Self {
        Self {
            shortname: shortname.to_string(),
            longname: longname.to_lowercase(),
            version: version.to_string(),
            models: models.into_iter().collect(),
            files,
        }
    }

    pub fn has_file(&self, kind: &str) -> bool {
        self.files.contains_key(kind)
    }

    /// Both core and atom event files are present
    pub fn is_hybrid(&self) -> bool {
        self.has_file("atom") && self.has_file("core")
    }

    /// Line for perf's `mapfile.csv`
    ///
    /// Several identifiers are folded into one pattern over their common
    /// prefix: `(a|b)` when the suffixes are longer than one character,
    /// `[ab]` otherwise.
    pub fn mapfile_line(&self) -> String {
        let pattern = match self.models.as_slice() {
            [] => String::new(),
            [single] => single.clone(),
            models => {
                let prefix = common_prefix(models);
                let shortest = models.iter().map(String::len).min().unwrap_or_default();
                let suffixes: Vec<&str> = models.iter().map(|m| &m[prefix.len()..]).collect();

                if shortest - prefix.len() > 1 {
                    format!("{}({})", prefix, suffixes.join("|"))
                } else {
                    format!("{}[{}]", prefix, suffixes.concat())
                }
            }
        };

        format!(
            "{},{},{},core",
            pattern,
            self.version.to_lowercase(),
            self.longname
        )
    }
}

fn common_prefix(items: &[String]) -> &str {
    let Some(first) = items.first() else {
        return "";
    };
    let mut len = first.len();
    for item in &items[1..] {
        len = first
            .bytes()
            .zip(item.bytes())
            .take(len)
            .take_while(|(a, b)| a == b)
            .count();
    }
    &first[..len]
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} / {}", self.shortname, self.longname)?;
        writeln!(f, "\tmodels={:?}", self.models)?;
        writeln!(f, "\tfiles:")?;
        for (kind, url) in &self.files {
            writeln!(f, "\t\t{} = {}", kind, url)?;
        }
        Ok(())
    }
}
