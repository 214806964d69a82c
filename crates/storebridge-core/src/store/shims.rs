//! Compatibility shims run against the freshly assembled facade object `S`.

/// A named snippet executed once per build, after assembly.
#[derive(Debug, Clone, Copy)]
pub struct Shim {
    pub name: &'static str,
    pub source: &'static str,
}

pub const SHIMS: &[Shim] = &[
    Shim {
        name: "chat-find",
        source: r#"if (S.Chat && typeof S.Chat._find !== 'function') {
    S.Chat._find = function (id) {
        const found = typeof this.get === 'function' ? this.get(id) : undefined;
        return Promise.resolve(found || { id });
    };
}
if (S.Chat && typeof S.Chat.findImpl !== 'function') {
    S.Chat.findImpl = S.Chat._find;
}"#,
    },
    Shim {
        name: "group-metadata-find",
        source: r#"if (S.GroupMetadata && typeof S.GroupMetadata.find !== 'function'
    && typeof S.GroupMetadata.get === 'function') {
    S.GroupMetadata.find = function (id) { return Promise.resolve(this.get(id)); };
}"#,
    },
];

/// All shims as one script body.
pub fn script() -> String {
    SHIMS
        .iter()
        .map(|s| format!("/* shim: {} */\n{}", s.name, s.source))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_contains_every_shim_once() {
        let script = script();
        for shim in SHIMS {
            assert_eq!(script.matches(&format!("/* shim: {} */", shim.name)).count(), 1);
        }
        assert!(script.contains("S.Chat._find"));
    }
}
