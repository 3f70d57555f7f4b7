//! Generator listing and information command.

#![allow(clippy::print_literal)] // Table headers use literal strings intentionally

use clap::Args;
use sonant_core::{UgenCategory, UgenDescriptor, UgenRegistry};

#[derive(Args)]
pub struct ListArgs {
    /// Category to list, or a generator id to describe
    #[arg(value_name = "CATEGORY|ID")]
    filter: Option<String>,
}

fn rates(descriptor: &UgenDescriptor) -> String {
    descriptor
        .spec
        .rates
        .iter()
        .map(|r| r.name())
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_category(registry: &UgenRegistry, category: UgenCategory) {
    let descriptors = registry.in_category(category);
    if descriptors.is_empty() {
        return;
    }
    println!("{} - {}", category.name(), category.description());
    for d in descriptors {
        println!("  {:16}  {:16}  {}", d.id(), d.name, d.description);
    }
    println!();
}

fn print_details(descriptor: &UgenDescriptor) {
    let title = format!("{} ({})", descriptor.name, descriptor.id());
    println!("{title}");
    println!("{}", "=".repeat(title.len()));
    println!();
    println!("{}", descriptor.description);
    println!();
    println!("Category: {}", descriptor.category.name());
    println!(
        "Rates:    {} (default {})",
        rates(descriptor),
        descriptor.spec.default_rate
    );
    println!();
    println!("Inputs:");
    println!();
    println!("  {:12}  {:10}  {}", "Name", "Default", "Channels");
    println!("  {:12}  {:10}  {}", "----", "-------", "--------");
    for input in descriptor.spec.inputs {
        let default = input
            .default
            .map_or_else(|| "required".to_string(), |d| d.to_string());
        println!("  {:12}  {:10}  {}", input.name, default, input.max_channels);
    }
}

pub fn run(args: ListArgs) -> anyhow::Result<()> {
    let registry = sonant_ugens::registry();

    let Some(filter) = args.filter else {
        println!("Available generators ({}):", registry.len());
        println!();
        for category in UgenCategory::ALL {
            print_category(&registry, category);
        }
        println!("Use 'sonant list <ID>' for a generator's inputs.");
        return Ok(());
    };

    if let Some(category) = UgenCategory::parse(&filter) {
        print_category(&registry, category);
        return Ok(());
    }

    let descriptor = registry
        .all()
        .into_iter()
        .find(|d| d.id().eq_ignore_ascii_case(filter.trim()))
        .ok_or_else(|| anyhow::anyhow!("Unknown category or generator: {filter}"))?;
    print_details(descriptor);
    Ok(())
}
