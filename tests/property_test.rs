//! Property tests for the store and the variable resolver.
//!
//! - `compact` is idempotent and only touches key lines
//! - a written key reads back as its trimmed value, or is refused untouched
//! - expansion always terminates, with a value or an error

mod common;

use common::TestEnv;
use inistore::{Error, Scope, VariableResolver};
use proptest::prelude::*;

fn name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_]{0,7}"
}

/// Key names, including ones that would read back as a comment or header.
fn any_key() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => name(),
        1 => ("[#;\\[/ ]{1,3}", name()).prop_map(|(lead, n)| format!("{}{}", lead, n)),
    ]
}

fn value() -> impl Strategy<Value = String> {
    "[ A-Za-z0-9_.,:=-]{0,16}"
}

/// One line of a sectioned file: header, comment, blank, raw or padded key.
fn file_line() -> impl Strategy<Value = String> {
    prop_oneof![
        name().prop_map(|n| format!("[{}]", n)),
        value().prop_map(|v| format!("; {}", v)),
        Just(String::new()),
        "[A-Za-z0-9,]{1,12}",
        (name(), value(), " {0,2}", " {0,2}")
            .prop_map(|(k, v, pad1, pad2)| format!("{}{}={}{}", pad1, k, pad2, v)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn compact_is_idempotent(lines in prop::collection::vec(file_line(), 0..20)) {
        let env = TestEnv::new();
        let content: String = lines.iter().map(|l| format!("{}\n", l)).collect();
        let path = env.write("p.ini", &content);
        let store = env.store();

        store.compact(&path).unwrap();
        let once = env.read(&path);
        prop_assert!(!store.compact(&path).unwrap());
        prop_assert_eq!(env.read(&path), once.clone());
        prop_assert_eq!(once.lines().count(), lines.len());
    }

    #[test]
    fn written_key_reads_back(
        prefix in prop::collection::vec(file_line(), 0..10),
        section in name(),
        key in any_key(),
        val in prop_oneof![value(), Just("]".to_string())],
    ) {
        let env = TestEnv::new();
        let content: String = prefix.iter().map(|l| format!("{}\n", l)).collect();
        let path = env.write("p.ini", &content);
        let store = env.store();
        let sections_before = store.section_names(&path).unwrap();

        match store.write_key(&path, &section, &key, &val) {
            Ok(()) => {
                let read = store.read_key(&path, &section, &key).unwrap();
                prop_assert_eq!(read.as_deref(), Some(val.trim()));
            }
            Err(Error::InvalidInput(_)) => {
                prop_assert_eq!(env.read(&path), content);
                prop_assert_eq!(store.section_names(&path).unwrap(), sections_before);
            }
            Err(e) => prop_assert!(false, "unexpected error: {}", e),
        }
    }

    #[test]
    fn expansion_terminates(
        defs in prop::collection::vec((0usize..6, prop::collection::vec(0usize..6, 0..3)), 0..6),
        start in 0usize..6,
    ) {
        let names = ["A", "B", "C", "D", "E", "F"];
        let mut vars = VariableResolver::new();
        for (var, refs) in &defs {
            let raw: String = refs.iter().map(|r| format!("x%{}%", names[*r])).collect();
            let _ = vars.set_value(Scope::Local, names[*var], &raw);
        }

        match vars.expand(&format!("%{}%", names[start])) {
            Ok(out) => prop_assert!(!out.contains('%')),
            Err(Error::CircularReference(_)) => {}
            Err(e) => prop_assert!(false, "unexpected error: {}", e),
        }
    }
}
