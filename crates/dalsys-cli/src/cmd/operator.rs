use super::drone::class_label;
use super::{commit_valid, open, parse_class};
use crate::output::{count_line, print_json, print_table, yes_no};
use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use dalsys_core::{LicenseClass, Operator, OperatorFilter, OperatorStore};
use std::path::Path;

/// Editable operator fields. Omitted flags leave the field unset on add and
/// unchanged on update.
#[derive(Args)]
pub struct OperatorFields {
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    family_name: Option<String>,
    /// Date of birth (YYYY-MM-DD)
    #[arg(long)]
    dob: Option<NaiveDate>,
    #[arg(long, value_parser = parse_class)]
    license: Option<LicenseClass>,
    /// Set the rescue endorsement (true/false)
    #[arg(long)]
    rescue: Option<bool>,
    /// Number of completed rescue operations
    #[arg(long)]
    operations: Option<u32>,
}

impl OperatorFields {
    fn apply(self, base: Operator) -> Operator {
        Operator {
            first_name: self.first_name.or(base.first_name),
            family_name: self.family_name.or(base.family_name),
            date_of_birth: self.dob.or(base.date_of_birth),
            drone_license: self.license.or(base.drone_license),
            rescue_endorsement: self.rescue.unwrap_or(base.rescue_endorsement),
            operations: self.operations.unwrap_or(base.operations),
            ..base
        }
    }
}

#[derive(Subcommand)]
pub enum OperatorSubcommand {
    /// List operators by family name
    List {
        #[arg(long, value_parser = parse_class)]
        class: Option<LicenseClass>,
        /// Only operators with a rescue endorsement
        #[arg(long)]
        rescue: bool,
    },
    /// Add a new operator
    Add {
        #[command(flatten)]
        fields: OperatorFields,
    },
    /// Update the details of an operator
    Update {
        id: u64,
        #[command(flatten)]
        fields: OperatorFields,
    },
    /// Remove an operator
    Remove { id: u64 },
    /// Show a single operator
    Show { id: u64 },
}

pub fn run(root: &Path, subcmd: OperatorSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        OperatorSubcommand::List { class, rescue } => {
            let filter = OperatorFilter {
                license: class,
                rescue_endorsement: rescue.then_some(true),
            };
            list(root, &filter, json)
        }
        OperatorSubcommand::Add { fields } => add(root, fields.apply(Operator::default()), json),
        OperatorSubcommand::Update { id, fields } => update(root, id, fields, json),
        OperatorSubcommand::Remove { id } => remove(root, id, json),
        OperatorSubcommand::Show { id } => show(root, id, json),
    }
}

fn list(root: &Path, filter: &OperatorFilter, json: bool) -> anyhow::Result<()> {
    let mut db = open(root)?;
    let operators = OperatorStore::new(db.as_mut()).list_all(filter)?;

    if json {
        return print_json(&operators);
    }

    if !operators.is_empty() {
        let rows: Vec<Vec<String>> = operators
            .iter()
            .map(|o| {
                vec![
                    o.id.map(|id| id.to_string()).unwrap_or_default(),
                    o.full_name(),
                    o.drone_license.map(class_label).unwrap_or_default(),
                    yes_no(o.rescue_endorsement),
                    o.operations.to_string(),
                    o.drone
                        .map(|id| format!("{id:04}"))
                        .unwrap_or_else(|| "<none>".to_string()),
                ]
            })
            .collect();
        print_table(
            &["ID", "Name", "Class", "Rescue", "Operations", "Drone"],
            &rows,
        );
        println!();
    }
    println!("{}", count_line(operators.len(), "operator"));
    Ok(())
}

fn add(root: &Path, candidate: Operator, json: bool) -> anyhow::Result<()> {
    let mut db = open(root)?;
    let mut store = OperatorStore::new(db.as_mut());
    let mut action = store.validate_add(candidate);
    let operator = commit_valid(&mut action, &mut store, json)?;

    if json {
        print_json(&operator)?;
    } else {
        println!(
            "Added operator {} with ID {}",
            operator.full_name(),
            operator.id.unwrap_or_default()
        );
    }
    Ok(())
}

fn update(root: &Path, id: u64, fields: OperatorFields, json: bool) -> anyhow::Result<()> {
    let mut db = open(root)?;
    let mut store = OperatorStore::new(db.as_mut());
    let candidate = fields.apply(store.get(id)?);
    let mut action = store.validate_update(candidate)?;
    let operator = commit_valid(&mut action, &mut store, json)?;

    if json {
        print_json(&operator)?;
    } else {
        println!("Updated operator {}", operator.full_name());
    }
    Ok(())
}

fn remove(root: &Path, id: u64, json: bool) -> anyhow::Result<()> {
    let mut db = open(root)?;
    OperatorStore::new(db.as_mut())
        .remove(id)
        .with_context(|| format!("failed to remove operator {id}"))?;

    if json {
        print_json(&serde_json::json!({ "id": id, "removed": true }))?;
    } else {
        println!("Operator removed");
    }
    Ok(())
}

fn show(root: &Path, id: u64, json: bool) -> anyhow::Result<()> {
    let mut db = open(root)?;
    let operator = OperatorStore::new(db.as_mut()).get(id)?;

    if json {
        return print_json(&operator);
    }
    println!("ID:         {id}");
    println!("Name:       {}", operator.full_name());
    println!(
        "Born:       {}",
        operator
            .date_of_birth
            .map(|d| d.to_string())
            .unwrap_or_default()
    );
    println!(
        "License:    {}",
        operator.drone_license.map(class_label).unwrap_or_default()
    );
    println!("Rescue:     {}", yes_no(operator.rescue_endorsement));
    println!("Operations: {}", operator.operations);
    println!(
        "Drone:      {}",
        operator
            .drone
            .map(|d| format!("{d:04}"))
            .unwrap_or_else(|| "<none>".to_string())
    );
    Ok(())
}
