// i18n.rs — runtime string tables for the desktop surface
//
// Strings live in assets/i18n.json: { "<lang>": { "key": "value" } }.
// - Load order: file next to the exe, then ./assets, then the copy compiled
//   into the binary.
// - Lookup: tr("key") / tr_with("key", &[("name", ...)]) with {name} placeholders.
//   Missing keys fall back to English, then to the key itself.
//
// Language selection: --lang <code>, then TURNTABLE_LANG, then "en".

use once_cell::sync::OnceCell;
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::RwLock,
};

pub const FALLBACK_LANG: &str = "en";
pub const LANG_ENV: &str = "TURNTABLE_LANG";

const BUNDLED: &str = include_str!("../assets/i18n.json");

type Table = HashMap<String, HashMap<String, String>>;

#[derive(Debug, Clone)]
struct I18n {
    lang: String,
    map: HashMap<String, String>,
    fallback_map: HashMap<String, String>,
}

static I18N: OnceCell<RwLock<I18n>> = OnceCell::new();

fn find_table_file() -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let p = dir.join("assets").join("i18n.json");
            if p.exists() {
                return Some(p);
            }
        }
    }

    let p = PathBuf::from("assets").join("i18n.json");
    p.exists().then_some(p)
}

fn load_table() -> Table {
    if let Some(p) = find_table_file() {
        match std::fs::read_to_string(&p).map(|t| serde_json::from_str::<Table>(&t)) {
            Ok(Ok(table)) => return table,
            Ok(Err(e)) => log::warn!("ignoring malformed {}: {e}", p.display()),
            Err(e) => log::warn!("cannot read {}: {e}", p.display()),
        }
    }
    bundled_table().unwrap_or_else(|e| {
        log::error!("bundled string table is malformed: {e}");
        Table::default()
    })
}

fn bundled_table() -> serde_json::Result<Table> {
    serde_json::from_str(BUNDLED)
}

/// Safe to call again; later calls switch the active language.
pub fn init(lang: impl Into<String>) {
    let lang = lang.into();
    let mut table = load_table();
    let fallback_map = table.get(FALLBACK_LANG).cloned().unwrap_or_default();
    let map = table.remove(&lang).unwrap_or_else(|| {
        log::debug!("no strings for {lang:?}, using {FALLBACK_LANG}");
        fallback_map.clone()
    });

    let i = I18n {
        lang,
        map,
        fallback_map,
    };

    if let Some(lock) = I18N.get() {
        if let Ok(mut w) = lock.write() {
            *w = i;
        }
    } else {
        let _ = I18N.set(RwLock::new(i));
    }
}

pub fn current_lang() -> String {
    I18N.get()
        .and_then(|l| l.read().ok().map(|i| i.lang.clone()))
        .unwrap_or_else(|| FALLBACK_LANG.to_string())
}

pub fn tr(key: &str) -> String {
    let Some(i) = I18N.get().and_then(|l| l.read().ok()) else {
        return key.to_string();
    };

    i.map
        .get(key)
        .or_else(|| i.fallback_map.get(key))
        .cloned()
        .unwrap_or_else(|| key.to_string())
}

/// `{name}` placeholders not provided are kept as-is.
pub fn tr_with(key: &str, args: &[(&str, String)]) -> String {
    let mut s = tr(key);
    for (k, v) in args {
        s = s.replace(&format!("{{{k}}}"), v);
    }
    s
}

/// CLI value if given, else TURNTABLE_LANG, else English.
pub fn resolve_lang(cli: Option<&str>) -> String {
    if let Some(v) = cli.filter(|v| !v.trim().is_empty()) {
        return v.to_string();
    }

    if let Ok(v) = std::env::var(LANG_ENV) {
        if !v.trim().is_empty() {
            return v;
        }
    }

    FALLBACK_LANG.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_table_has_every_english_key_translated() {
        let table = bundled_table().expect("bundled i18n table is valid JSON");
        let en = &table[FALLBACK_LANG];
        for (lang, map) in &table {
            for key in en.keys() {
                assert!(map.contains_key(key), "{lang} is missing {key}");
            }
        }
    }

    #[test]
    fn lookup_and_placeholders() {
        init("en");
        assert_eq!(tr("no.such.key"), "no.such.key");
        assert_eq!(
            tr_with("status.angle", &[("deg", "135".into()), ("step", "10".into()), ("total", "24".into())]),
            "Angle: 135° (10/24)"
        );
    }

    #[test]
    fn cli_language_wins() {
        assert_eq!(resolve_lang(Some("zh-Hans")), "zh-Hans");
    }
}
