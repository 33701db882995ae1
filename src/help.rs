//! Help listings generated from the registry
//!
//! `--help-attributes`, `--help-plugins` and `--help-types` print
//! tables over everything the registry knows; `-h <plugin>` shows one
//! provider in detail.

use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::types::ValueKind;

const ALL_KINDS: &[ValueKind] = &[
    ValueKind::Text,
    ValueKind::Path,
    ValueKind::Number,
    ValueKind::Size,
    ValueKind::Time,
    ValueKind::Duration,
    ValueKind::Mode,
    ValueKind::FileType,
    ValueKind::Boolean,
    ValueKind::List,
];

pub fn print_attributes(registry: &Registry) {
    println!("{:<24} {:<10} Description", "Attribute", "Type");
    for (attribute, meta) in registry.iter_attributes() {
        let help = registry
            .provider_of(&attribute)
            .and_then(|p| {
                p.attributes()
                    .iter()
                    .find(|info| info.name == attribute.name)
            })
            .map(|info| info.help)
            .unwrap_or("");
        println!(
            "{:<24} {:<10} {}",
            attribute.to_string(),
            meta.kind.name(),
            first_sentence(help)
        );
    }
}

pub fn print_plugins(registry: &Registry) {
    println!("{:<12} Description", "Plugin");
    for provider in registry.providers() {
        println!("{:<12} {}", provider.name(), provider.description());
    }
}

pub fn print_types() {
    println!("{:<10} Operators", "Type");
    for kind in ALL_KINDS {
        let operators: Vec<&str> = kind.operators().iter().map(|op| op.token()).collect();
        println!("{:<10} {}", kind.name(), operators.join(" "));
    }
}

pub fn print_plugin(registry: &Registry, name: &str) -> Result<()> {
    let provider = registry
        .provider(name)
        .ok_or_else(|| Error::Usage(format!("plugin {name:?} not found")))?;

    println!("{} - {}", provider.name(), provider.description());
    println!();
    println!("{:<12} {:<10} Description", "Attribute", "Type");
    for info in provider.attributes() {
        println!("{:<12} {:<10} {}", info.name, info.kind.name(), info.help);
    }
    Ok(())
}

pub fn print_full(registry: &Registry) {
    print_plugins(registry);
    println!();
    print_types();
    println!();
    print_attributes(registry);
}

fn first_sentence(text: &str) -> &str {
    match text.find(". ") {
        Some(pos) => &text[..pos + 1],
        None => text,
    }
}
