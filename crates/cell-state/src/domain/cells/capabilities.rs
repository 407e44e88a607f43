//! Capability declarations and their aggregation across the cell tree.

use std::collections::BTreeSet;

use api_types::Capabilities;
use error_stack::Report;

use super::types::{CellStateError, Result};

/// Parse local capability declarations of the form `name=value` or
/// `name=value1;value2;...`.
///
/// Only the first `=` separates the name; a later declaration for the same
/// name replaces the earlier one.
pub fn parse_capability_declarations<S: AsRef<str>>(declarations: &[S]) -> Result<Capabilities> {
    let mut capabilities = Capabilities::new();
    for declaration in declarations {
        let declaration = declaration.as_ref();
        let Some((name, value)) = declaration.split_once('=') else {
            return Err(Report::new(CellStateError::InvalidCapability {
                declaration: declaration.to_string(),
            }));
        };
        let values = value.split(';').map(str::to_string).collect();
        capabilities.insert(name.to_string(), values);
    }
    Ok(capabilities)
}

/// Collect capability values pushed by a remote cell into sets
pub fn coerce_capabilities<I, V>(capabilities: I) -> Capabilities
where
    I: IntoIterator<Item = (String, V)>,
    V: IntoIterator<Item = String>,
{
    capabilities
        .into_iter()
        .map(|(name, values)| (name, values.into_iter().collect::<BTreeSet<_>>()))
        .collect()
}

/// Union every capability of `source` into `target`
pub fn merge_capabilities(target: &mut Capabilities, source: &Capabilities) {
    for (name, values) in source {
        target
            .entry(name.clone())
            .or_default()
            .extend(values.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn parse_single_and_multi_valued_declarations() {
        let capabilities = parse_capability_declarations(&[
            "hypervisor=xenserver;kvm",
            "os=linux",
            "region=us=east",
        ])
        .expect("should parse declarations");

        assert_eq!(capabilities.get("hypervisor"), Some(&set(&["kvm", "xenserver"])));
        assert_eq!(capabilities.get("os"), Some(&set(&["linux"])));
        assert_eq!(capabilities.get("region"), Some(&set(&["us=east"])));
    }

    #[test]
    fn parse_rejects_declaration_without_separator() {
        let result = parse_capability_declarations(&["os=linux", "hypervisor"]);

        let report = result.expect_err("should reject missing separator");
        assert!(matches!(
            report.current_context(),
            CellStateError::InvalidCapability { declaration } if declaration == "hypervisor"
        ));
    }

    #[test]
    fn parse_empty_declarations() {
        let capabilities =
            parse_capability_declarations::<&str>(&[]).expect("should parse nothing");
        assert!(capabilities.is_empty());
    }

    #[test]
    fn coerce_deduplicates_values() {
        let capabilities = coerce_capabilities(vec![(
            "x".to_string(),
            vec!["a".to_string(), "b".to_string(), "a".to_string()],
        )]);

        assert_eq!(capabilities.get("x"), Some(&set(&["a", "b"])));
    }

    #[test]
    fn merge_unions_values_and_adds_missing_names() {
        let mut target = Capabilities::from([("x".to_string(), set(&["a"]))]);
        let source = Capabilities::from([
            ("x".to_string(), set(&["b"])),
            ("y".to_string(), set(&["c"])),
        ]);

        merge_capabilities(&mut target, &source);

        assert_eq!(target.get("x"), Some(&set(&["a", "b"])));
        assert_eq!(target.get("y"), Some(&set(&["c"])));
    }
}
