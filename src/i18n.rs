//! gettext-style internationalization: a GNU `.mo` catalog reader and a
//! small translation manager.
//!
//! The manager is owned by the interpreter (not a process-wide
//! singleton) so tests can substitute their own catalogs via
//! `bindtextdomain`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

const MO_MAGIC_LE: u32 = 0x950412de;
const MO_MAGIC_BE: u32 = 0xde120495;
const MO_HEADER_SIZE: usize = 28;

/// Plural-form selector recognized from the catalog header. A handful of
/// common rules is matched textually instead of evaluating the full
/// Plural-Forms expression grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PluralRule {
    NotOne,
    GreaterOne,
    Slavic,
    Polish,
    Czech,
    Arabic,
    None,
}

impl PluralRule {
    fn index(self, n: u64) -> usize {
        match self {
            PluralRule::NotOne => usize::from(n != 1),
            PluralRule::GreaterOne => usize::from(n > 1),
            PluralRule::Slavic => {
                if n % 10 == 1 && n % 100 != 11 {
                    0
                } else if (2..=4).contains(&(n % 10)) && !(10..20).contains(&(n % 100)) {
                    1
                } else {
                    2
                }
            }
            PluralRule::Polish => {
                if n == 1 {
                    0
                } else if (2..=4).contains(&(n % 10)) && !(10..20).contains(&(n % 100)) {
                    1
                } else {
                    2
                }
            }
            PluralRule::Czech => {
                if n == 1 {
                    0
                } else if (2..=4).contains(&n) {
                    1
                } else {
                    2
                }
            }
            PluralRule::Arabic => match n {
                0 => 0,
                1 => 1,
                2 => 2,
                _ if (3..=10).contains(&(n % 100)) => 3,
                _ if n % 100 >= 11 => 4,
                _ => 5,
            },
            PluralRule::None => 0,
        }
    }
}

/// A loaded `.mo` translation catalog.
#[derive(Debug, Default)]
pub struct MoCatalog {
    translations: HashMap<String, String>,
    plural_translations: HashMap<String, Vec<String>>,
    charset: String,
    rule: Option<PluralRule>,
}

impl MoCatalog {
    /// Load a catalog from disk; None for unreadable or malformed files.
    pub fn load(path: &Path) -> Option<Self> {
        let data = std::fs::read(path).ok()?;
        Self::parse(&data)
    }

    /// Parse the standard GNU `.mo` layout, either endianness.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < MO_HEADER_SIZE {
            return None;
        }

        let magic = u32::from_le_bytes(data[0..4].try_into().ok()?);
        let swap = match magic {
            MO_MAGIC_LE => false,
            MO_MAGIC_BE => true,
            _ => return None,
        };

        let read_u32 = |offset: usize| -> Option<u32> {
            let bytes: [u8; 4] = data.get(offset..offset + 4)?.try_into().ok()?;
            Some(if swap {
                u32::from_be_bytes(bytes)
            } else {
                u32::from_le_bytes(bytes)
            })
        };

        let num_strings = read_u32(8)? as usize;
        let originals_offset = read_u32(12)? as usize;
        let translations_offset = read_u32(16)? as usize;

        let read_string = |table: usize, index: usize| -> Option<&[u8]> {
            let desc = table + index * 8;
            let len = read_u32(desc)? as usize;
            let offset = read_u32(desc + 4)? as usize;
            data.get(offset..offset + len)
        };

        let mut catalog = MoCatalog {
            charset: "UTF-8".to_string(),
            ..Default::default()
        };

        for i in 0..num_strings {
            let original = read_string(originals_offset, i)?;
            let translation = read_string(translations_offset, i)?;
            let original = String::from_utf8_lossy(original).into_owned();
            let translation = String::from_utf8_lossy(translation).into_owned();

            if original.is_empty() && i == 0 {
                catalog.parse_header(&translation);
                continue;
            }

            // A NUL inside the msgid marks a singular/plural pair
            if let Some(nul) = original.find('\0') {
                let msgid = original[..nul].to_string();
                let forms: Vec<String> =
                    translation.split('\0').map(|s| s.to_string()).collect();
                catalog.plural_translations.insert(msgid, forms);
            } else {
                catalog.translations.insert(original, translation);
            }
        }

        Some(catalog)
    }

    fn parse_header(&mut self, header: &str) {
        for line in header.lines() {
            let line = line.trim_end_matches('\r');
            if let Some(rest) = line.strip_prefix("Content-Type:") {
                if let Some(pos) = rest.find("charset=") {
                    self.charset = rest[pos + 8..].trim().to_string();
                }
            }
            if let Some(rest) = line.strip_prefix("Plural-Forms:") {
                self.rule = Some(parse_plural_rule(rest.trim()));
            }
        }
    }

    pub fn charset(&self) -> &str {
        &self.charset
    }

    /// Translation for a msgid, None when the catalog has no entry.
    pub fn gettext(&self, msgid: &str) -> Option<&str> {
        self.translations.get(msgid).map(String::as_str)
    }

    /// Plural-aware lookup; falls back to the singular table.
    pub fn ngettext(&self, msgid: &str, n: u64) -> Option<&str> {
        if let Some(forms) = self.plural_translations.get(msgid) {
            let rule = self.rule.unwrap_or(PluralRule::NotOne);
            let idx = rule.index(n).min(forms.len().saturating_sub(1));
            return forms.get(idx).map(String::as_str);
        }
        self.gettext(msgid)
    }
}

fn parse_plural_rule(spec: &str) -> PluralRule {
    let nplurals = spec
        .find("nplurals=")
        .and_then(|pos| {
            spec[pos + 9..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
                .parse::<u32>()
                .ok()
        })
        .unwrap_or(2);

    let expr = match spec.find("plural=") {
        Some(pos) => {
            let rest = &spec[pos + 7..];
            rest.split(';').next().unwrap_or(rest).trim()
        }
        None => return PluralRule::NotOne,
    };

    let squeezed: String = expr.chars().filter(|c| !c.is_whitespace()).collect();

    if squeezed == "0" {
        PluralRule::None
    } else if squeezed == "n!=1" || squeezed == "(n!=1)" {
        PluralRule::NotOne
    } else if squeezed == "n>1" || squeezed == "(n>1)" {
        PluralRule::GreaterOne
    } else if squeezed.contains("n%10==1") && squeezed.contains("n%100!=11") {
        PluralRule::Slavic
    } else if squeezed.contains("n==1") && squeezed.contains("n%10>=2") {
        PluralRule::Polish
    } else if squeezed.contains("n==1") && squeezed.contains("n>=2") && squeezed.contains("n<=4") {
        PluralRule::Czech
    } else if nplurals == 6 {
        PluralRule::Arabic
    } else {
        PluralRule::NotOne
    }
}

/// Translation manager: domain directory bindings plus a catalog cache
/// keyed by domain:locale:category. Failed loads are cached as None.
pub struct I18n {
    domain_directories: HashMap<String, PathBuf>,
    catalogs: HashMap<String, Option<Rc<MoCatalog>>>,
    locale: String,
}

impl I18n {
    pub fn new() -> Self {
        Self {
            domain_directories: HashMap::new(),
            catalogs: HashMap::new(),
            locale: detect_locale(),
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn set_locale(&mut self, locale: &str) {
        if locale != self.locale {
            self.locale = locale.to_string();
            self.catalogs.clear();
        }
    }

    /// Bind a domain to a catalog directory; an empty directory queries
    /// the current binding.
    pub fn bindtextdomain(&mut self, domain: &str, directory: &str) -> String {
        if directory.is_empty() {
            return self.textdomain_directory(domain);
        }
        self.domain_directories
            .insert(domain.to_string(), PathBuf::from(directory));
        let prefix = format!("{}:", domain);
        self.catalogs.retain(|key, _| !key.starts_with(&prefix));
        directory.to_string()
    }

    pub fn textdomain_directory(&self, domain: &str) -> String {
        self.domain_directories
            .get(domain)
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }

    pub fn dcgettext(&mut self, msgid: &str, domain: &str, category: &str) -> String {
        if let Some(catalog) = self.catalog(domain, category) {
            if let Some(translated) = catalog.gettext(msgid) {
                return translated.to_string();
            }
        }
        msgid.to_string()
    }

    pub fn dcngettext(
        &mut self,
        msgid: &str,
        msgid_plural: &str,
        n: u64,
        domain: &str,
        category: &str,
    ) -> String {
        if let Some(catalog) = self.catalog(domain, category) {
            if let Some(translated) = catalog.ngettext(msgid, n) {
                return translated.to_string();
            }
        }
        if n == 1 {
            msgid.to_string()
        } else {
            msgid_plural.to_string()
        }
    }

    fn catalog(&mut self, domain: &str, category: &str) -> Option<Rc<MoCatalog>> {
        let key = format!("{}:{}:{}", domain, self.locale, category);
        if let Some(cached) = self.catalogs.get(&key) {
            return cached.clone();
        }

        let loaded = self.try_load(domain, category).map(Rc::new);
        self.catalogs.insert(key, loaded.clone());
        loaded
    }

    fn try_load(&self, domain: &str, category: &str) -> Option<MoCatalog> {
        let base = self.domain_directories.get(domain)?;

        // Full locale, then without encoding, then language only
        let mut candidates = vec![self.locale.clone()];
        if let Some(pos) = self.locale.find('.') {
            candidates.push(self.locale[..pos].to_string());
        }
        if let Some(pos) = self.locale.find('_') {
            candidates.push(self.locale[..pos].to_string());
        }

        for locale in candidates {
            let path = base
                .join(&locale)
                .join(category)
                .join(format!("{}.mo", domain));
            if let Some(catalog) = MoCatalog::load(&path) {
                return Some(catalog);
            }
        }
        None
    }
}

impl Default for I18n {
    fn default() -> Self {
        Self::new()
    }
}

fn detect_locale() -> String {
    for var in ["LANGUAGE", "LC_ALL", "LC_MESSAGES", "LANG"] {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                return value;
            }
        }
    }
    "C".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal little-endian .mo image in memory.
    fn build_mo(entries: &[(&str, &str)]) -> Vec<u8> {
        let n = entries.len() as u32;
        let originals_offset = 28u32;
        let translations_offset = originals_offset + n * 8;
        let mut strings_offset = translations_offset + n * 8;

        let mut header = Vec::new();
        header.extend_from_slice(&MO_MAGIC_LE.to_le_bytes());
        header.extend_from_slice(&0u32.to_le_bytes()); // revision
        header.extend_from_slice(&n.to_le_bytes());
        header.extend_from_slice(&originals_offset.to_le_bytes());
        header.extend_from_slice(&translations_offset.to_le_bytes());
        header.extend_from_slice(&0u32.to_le_bytes()); // hash size
        header.extend_from_slice(&0u32.to_le_bytes()); // hash offset

        let mut descriptors = Vec::new();
        let mut strings = Vec::new();
        for (msgid, _) in entries {
            descriptors.extend_from_slice(&(msgid.len() as u32).to_le_bytes());
            descriptors.extend_from_slice(&strings_offset.to_le_bytes());
            strings.extend_from_slice(msgid.as_bytes());
            strings.push(0);
            strings_offset += msgid.len() as u32 + 1;
        }
        for (_, msgstr) in entries {
            descriptors.extend_from_slice(&(msgstr.len() as u32).to_le_bytes());
            descriptors.extend_from_slice(&strings_offset.to_le_bytes());
            strings.extend_from_slice(msgstr.as_bytes());
            strings.push(0);
            strings_offset += msgstr.len() as u32 + 1;
        }

        let mut out = header;
        out.extend_from_slice(&descriptors);
        out.extend_from_slice(&strings);
        out
    }

    #[test]
    fn test_parse_simple_catalog() {
        let data = build_mo(&[
            ("", "Content-Type: text/plain; charset=UTF-8\n"),
            ("hello", "hallo"),
        ]);
        let catalog = MoCatalog::parse(&data).unwrap();
        assert_eq!(catalog.gettext("hello"), Some("hallo"));
        assert_eq!(catalog.gettext("missing"), None);
        assert_eq!(catalog.charset(), "UTF-8");
    }

    #[test]
    fn test_plural_forms() {
        let data = build_mo(&[
            (
                "",
                "Plural-Forms: nplurals=2; plural=n != 1;\n",
            ),
            ("one file\0many files", "eine Datei\0viele Dateien"),
        ]);
        let catalog = MoCatalog::parse(&data).unwrap();
        assert_eq!(catalog.ngettext("one file", 1), Some("eine Datei"));
        assert_eq!(catalog.ngettext("one file", 3), Some("viele Dateien"));
    }

    #[test]
    fn test_bad_magic_rejected() {
        assert!(MoCatalog::parse(&[0u8; 64]).is_none());
    }

    #[test]
    fn test_plural_rule_recognition() {
        assert_eq!(parse_plural_rule("nplurals=1; plural=0;"), PluralRule::None);
        assert_eq!(
            parse_plural_rule("nplurals=2; plural=n > 1;"),
            PluralRule::GreaterOne
        );
        assert_eq!(
            parse_plural_rule(
                "nplurals=3; plural=n%10==1 && n%100!=11 ? 0 : n%10>=2 && n%10<=4 && (n%100<10 || n%100>=20) ? 1 : 2;"
            ),
            PluralRule::Slavic
        );
    }

    #[test]
    fn test_untranslated_falls_through() {
        let mut i18n = I18n::new();
        assert_eq!(i18n.dcgettext("raw", "nodomain", "LC_MESSAGES"), "raw");
        assert_eq!(
            i18n.dcngettext("one", "many", 2, "nodomain", "LC_MESSAGES"),
            "many"
        );
    }

    #[test]
    fn test_bindtextdomain_query() {
        let mut i18n = I18n::new();
        assert_eq!(i18n.bindtextdomain("app", "/tmp/locale"), "/tmp/locale");
        assert_eq!(i18n.bindtextdomain("app", ""), "/tmp/locale");
    }
}
