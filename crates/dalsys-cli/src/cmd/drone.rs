use super::{commit_valid, open, parse_class};
use crate::output::{count_line, print_json, print_table, yes_no};
use anyhow::Context;
use clap::Subcommand;
use dalsys_core::{
    Drone, DroneFilter, DroneStore, LicenseClass, Mission, OperatorFilter, OperatorRef,
    OperatorStore,
};
use std::collections::HashMap;
use std::path::Path;

#[derive(Subcommand)]
pub enum DroneSubcommand {
    /// List drones, optionally filtered by class and rescue capability
    List {
        #[arg(long, value_parser = parse_class)]
        class: Option<LicenseClass>,
        /// Only rescue-capable drones
        #[arg(long)]
        rescue: bool,
    },
    /// Add a new drone
    Add {
        name: Option<String>,
        #[arg(long, value_parser = parse_class)]
        class: Option<LicenseClass>,
        /// Drone is rescue capable
        #[arg(long)]
        rescue: bool,
    },
    /// Update the details of a drone
    Update {
        id: u64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_parser = parse_class)]
        class: Option<LicenseClass>,
        /// Set rescue capability (true/false)
        #[arg(long)]
        rescue: Option<bool>,
    },
    /// Remove a drone
    Remove { id: u64 },
    /// Show a single drone
    Show { id: u64 },
    /// Allocate a drone to an operator (operator id or "First Family")
    Allocate {
        id: u64,
        #[arg(required = true)]
        operator: Vec<String>,
        /// Allocate for a rescue mission
        #[arg(long)]
        rescue_mission: bool,
    },
    /// Remove the operator from a drone
    Unallocate { id: u64 },
}

pub fn run(root: &Path, subcmd: DroneSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        DroneSubcommand::List { class, rescue } => {
            let filter = DroneFilter {
                class_type: class,
                rescue: rescue.then_some(true),
            };
            list(root, &filter, json)
        }
        DroneSubcommand::Add {
            name,
            class,
            rescue,
        } => {
            let candidate = Drone {
                name,
                class_type: class,
                rescue,
                ..Drone::default()
            };
            add(root, candidate, json)
        }
        DroneSubcommand::Update {
            id,
            name,
            class,
            rescue,
        } => update(root, id, name, class, rescue, json),
        DroneSubcommand::Remove { id } => remove(root, id, json),
        DroneSubcommand::Show { id } => show(root, id, json),
        DroneSubcommand::Allocate {
            id,
            operator,
            rescue_mission,
        } => {
            let mission = if rescue_mission {
                Mission::Rescue
            } else {
                Mission::Standard
            };
            allocate(root, id, &operator.join(" "), mission, json)
        }
        DroneSubcommand::Unallocate { id } => unallocate(root, id, json),
    }
}

fn list(root: &Path, filter: &DroneFilter, json: bool) -> anyhow::Result<()> {
    let mut db = open(root)?;
    let drones = DroneStore::new(db.as_mut()).list_all(filter)?;

    if json {
        return print_json(&drones);
    }

    let names: HashMap<u64, String> = OperatorStore::new(db.as_mut())
        .list_all(&OperatorFilter::default())?
        .into_iter()
        .filter_map(|o| o.id.map(|id| (id, o.full_name())))
        .collect();

    if !drones.is_empty() {
        let rows: Vec<Vec<String>> = drones
            .iter()
            .map(|d| {
                vec![
                    d.id.map(|id| format!("{id:04}")).unwrap_or_default(),
                    d.name.clone().unwrap_or_default(),
                    d.class_type.map(class_label).unwrap_or_default(),
                    yes_no(d.rescue),
                    d.operator
                        .map(|id| names.get(&id).cloned().unwrap_or_else(|| id.to_string()))
                        .unwrap_or_else(|| "<none>".to_string()),
                ]
            })
            .collect();
        print_table(&["ID", "Name", "Class", "Rescue", "Operator"], &rows);
        println!();
    }
    println!("{}", count_line(drones.len(), "drone"));
    Ok(())
}

fn add(root: &Path, candidate: Drone, json: bool) -> anyhow::Result<()> {
    let mut db = open(root)?;
    let mut store = DroneStore::new(db.as_mut());
    let mut action = store.validate_add(candidate);
    let drone = commit_valid(&mut action, &mut store, json)?;

    if json {
        print_json(&drone)?;
    } else {
        let id = drone.id.unwrap_or_default();
        if drone.rescue {
            println!("Added rescue drone with ID {id:04}");
        } else {
            println!("Added drone with ID {id:04}");
        }
    }
    Ok(())
}

fn update(
    root: &Path,
    id: u64,
    name: Option<String>,
    class: Option<LicenseClass>,
    rescue: Option<bool>,
    json: bool,
) -> anyhow::Result<()> {
    let mut db = open(root)?;
    let mut store = DroneStore::new(db.as_mut());
    let mut candidate = store.get(id)?;
    if let Some(n) = name {
        candidate = candidate.with_name(n);
    }
    if let Some(c) = class {
        candidate = candidate.with_class(c);
    }
    if let Some(r) = rescue {
        candidate = candidate.with_rescue(r);
    }

    let mut action = store.validate_update(candidate)?;
    let drone = commit_valid(&mut action, &mut store, json)?;

    if json {
        print_json(&drone)?;
    } else {
        println!("Updated drone {id:04}");
    }
    Ok(())
}

fn remove(root: &Path, id: u64, json: bool) -> anyhow::Result<()> {
    let mut db = open(root)?;
    DroneStore::new(db.as_mut())
        .remove(id)
        .with_context(|| format!("failed to remove drone {id:04}"))?;

    if json {
        print_json(&serde_json::json!({ "id": id, "removed": true }))?;
    } else {
        println!("Drone removed");
    }
    Ok(())
}

fn show(root: &Path, id: u64, json: bool) -> anyhow::Result<()> {
    let mut db = open(root)?;
    let drone = DroneStore::new(db.as_mut()).get(id)?;

    if json {
        return print_json(&drone);
    }
    let operator = match drone.operator {
        Some(op) => OperatorStore::new(db.as_mut()).get(op)?.full_name(),
        None => "<none>".to_string(),
    };
    println!("ID:       {id:04}");
    println!("Name:     {}", drone.name.unwrap_or_default());
    println!(
        "Class:    {}",
        drone.class_type.map(class_label).unwrap_or_default()
    );
    println!("Rescue:   {}", yes_no(drone.rescue));
    println!("Operator: {operator}");
    Ok(())
}

fn allocate(
    root: &Path,
    id: u64,
    operator: &str,
    mission: Mission,
    json: bool,
) -> anyhow::Result<()> {
    let reference = OperatorRef::parse(operator)
        .with_context(|| format!("operator '{operator}' must be an id or 'First Family'"))?;
    let mut db = open(root)?;
    let mut store = DroneStore::new(db.as_mut());
    let mut action = store.validate_allocate(id, &reference, mission)?;
    let drone = commit_valid(&mut action, &mut store, json)?;

    if json {
        print_json(&drone)?;
    } else {
        println!("Drone allocated to {operator}");
    }
    Ok(())
}

fn unallocate(root: &Path, id: u64, json: bool) -> anyhow::Result<()> {
    let mut db = open(root)?;
    let mut store = DroneStore::new(db.as_mut());
    let mut action = store.validate_unallocate(id)?;
    let drone = commit_valid(&mut action, &mut store, json)?;

    if json {
        print_json(&drone)?;
    } else {
        println!("Drone {id:04} unallocated");
    }
    Ok(())
}

pub(crate) fn class_label(class: LicenseClass) -> String {
    match class {
        LicenseClass::One => "One",
        LicenseClass::Two => "Two",
    }
    .to_string()
}
