//! Drone records, their store, and the allocation of operators to drones.
//!
//! Allocation is the only way a drone's `operator` becomes set. Both sides of
//! the link (the drone's `operator` and the operator's `drone`) are written
//! in one persistence batch, so they never disagree after a commit.

use serde::{Deserialize, Serialize};

use crate::action::{ActionOp, Committer, PendingAction};
use crate::error::{DalsysError, Result};
use crate::operator::{self, Operator, OperatorRef};
use crate::persistence::{Fields, Persistence, Row, Table, Value, Write};
use crate::types::{LicenseClass, Mission};

pub const NAME_REQUIRED: &str = "Name is required";
pub const CLASS_REQUIRED: &str = "Class is required";
pub const RESCUE_ENDORSEMENT_REQUIRED: &str =
    "Operator must hold a rescue endorsement to fly a rescue mission";
pub const NOT_RESCUE_CAPABLE: &str = "Drone is not rescue capable";

// ---------------------------------------------------------------------------
// Drone
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Drone {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub class_type: Option<LicenseClass>,
    pub rescue: bool,
    pub operator: Option<u64>,
}

impl Drone {
    pub fn new(name: impl Into<String>, class_type: LicenseClass) -> Self {
        Self {
            name: Some(name.into()),
            class_type: Some(class_type),
            ..Self::default()
        }
    }

    pub fn with_name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    pub fn with_class(self, class_type: LicenseClass) -> Self {
        Self {
            class_type: Some(class_type),
            ..self
        }
    }

    pub fn with_rescue(self, rescue: bool) -> Self {
        Self { rescue, ..self }
    }

    fn to_fields(&self) -> Fields {
        let mut f = Fields::new();
        f.insert("name".into(), Value::from(self.name.as_deref()));
        f.insert("class_type".into(), Value::from(self.class_type));
        f.insert("rescue".into(), Value::from(self.rescue));
        f
    }

    fn from_fields(id: u64, fields: &Fields) -> Result<Self> {
        let row = Row::new(Table::Drones, id, fields);
        Ok(Self {
            id: Some(id),
            name: row.text("name")?,
            class_type: row.class("class_type")?,
            rescue: row.flag("rescue")?,
            operator: row.id("operator_id")?,
        })
    }
}

pub fn check_drone(candidate: &Drone, action: &mut PendingAction<Drone>) {
    if candidate.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
        action.add_message(NAME_REQUIRED);
    }
    if candidate.class_type.is_none() {
        action.add_message(CLASS_REQUIRED);
    }
}

fn class_message(license: Option<LicenseClass>, class: LicenseClass) -> Option<String> {
    match license {
        Some(l) if l.permits(class) => None,
        Some(l) => Some(format!(
            "A class {l} license does not permit operating a class {class} drone"
        )),
        None => Some(format!(
            "Operator must hold a class {class} license to operate this drone"
        )),
    }
}

// ---------------------------------------------------------------------------
// DroneFilter
// ---------------------------------------------------------------------------

/// Conjunction of optional predicates for `list_all`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DroneFilter {
    pub class_type: Option<LicenseClass>,
    pub rescue: Option<bool>,
}

impl DroneFilter {
    pub fn matches(&self, drone: &Drone) -> bool {
        self.class_type.map_or(true, |c| drone.class_type == Some(c))
            && self.rescue.map_or(true, |r| drone.rescue == r)
    }
}

// ---------------------------------------------------------------------------
// Shared reads/writes (also used by the operator store)
// ---------------------------------------------------------------------------

pub(crate) fn load<P: Persistence + ?Sized>(db: &P, id: u64) -> Result<Drone> {
    let fields = db
        .fetch_by_id(Table::Drones, id)?
        .ok_or_else(|| Table::Drones.not_found(id))?;
    Drone::from_fields(id, &fields)
}

pub(crate) fn link_write(drone_id: u64, operator: Option<u64>) -> Write {
    let mut fields = Fields::new();
    fields.insert("operator_id".into(), Value::from(operator.map(|id| id as i64)));
    Write::Update {
        table: Table::Drones,
        id: drone_id,
        fields,
    }
}

fn label(id: u64) -> String {
    format!("{id:04}")
}

/// Both sides of an allocation must be free, or already linked to each other.
fn check_link(drone: &Drone, operator: &Operator) -> Result<()> {
    let drone_id = drone.id.ok_or(DalsysError::MissingId)?;
    let operator_id = operator.id.ok_or(DalsysError::MissingId)?;

    if let Some(current) = drone.operator.filter(|&o| o != operator_id) {
        tracing::warn!(drone = drone_id, current, requested = operator_id, "drone already allocated");
        return Err(DalsysError::AllocationConflict(format!(
            "drone {} is already allocated to operator {current}; unallocate it first",
            label(drone_id)
        )));
    }
    if let Some(held) = operator.drone.filter(|&d| d != drone_id) {
        tracing::warn!(drone = drone_id, operator = operator_id, held, "operator already allocated");
        return Err(DalsysError::AllocationConflict(format!(
            "{} is already allocated to drone {}",
            operator.full_name(),
            label(held)
        )));
    }
    Ok(())
}

/// License class and, for rescue missions, endorsement and capability.
fn eligibility(drone: &Drone, operator: &Operator, mission: Mission) -> Vec<String> {
    let mut messages = Vec::new();
    match drone.class_type {
        Some(class) => messages.extend(class_message(operator.drone_license, class)),
        None => messages.push(CLASS_REQUIRED.to_string()),
    }
    if mission.is_rescue() {
        if !operator.rescue_endorsement {
            messages.push(RESCUE_ENDORSEMENT_REQUIRED.to_string());
        }
        if !drone.rescue {
            messages.push(NOT_RESCUE_CAPABLE.to_string());
        }
    }
    messages
}

// ---------------------------------------------------------------------------
// DroneStore
// ---------------------------------------------------------------------------

pub struct DroneStore<'a, P: Persistence + ?Sized> {
    db: &'a mut P,
}

impl<'a, P: Persistence + ?Sized> DroneStore<'a, P> {
    pub fn new(db: &'a mut P) -> Self {
        Self { db }
    }

    /// Validate a new drone. The store assigns the id and new drones start
    /// unallocated whatever the candidate says.
    pub fn validate_add(&self, candidate: Drone) -> PendingAction<Drone> {
        let candidate = Drone {
            id: None,
            operator: None,
            ..candidate
        };
        let mut action = PendingAction::new(candidate.clone(), ActionOp::Create);
        check_drone(&candidate, &mut action);
        tracing::debug!(messages = action.messages().len(), "validated new drone");
        action
    }

    /// Validate changes to a stored drone. The allocation is taken from
    /// storage; if an operator holds the drone, its license must still
    /// permit the new class.
    pub fn validate_update(&self, candidate: Drone) -> Result<PendingAction<Drone>> {
        let id = candidate.id.ok_or(DalsysError::MissingId)?;
        let stored = load(&*self.db, id)?;
        let candidate = Drone {
            operator: stored.operator,
            ..candidate
        };

        let mut action = PendingAction::new(candidate.clone(), ActionOp::Update);
        check_drone(&candidate, &mut action);
        if let (Some(operator_id), Some(class)) = (candidate.operator, candidate.class_type) {
            let holder = operator::load(&*self.db, operator_id)?;
            if let Some(message) = class_message(holder.drone_license, class) {
                action.add_message(message);
            }
        }
        tracing::debug!(id, messages = action.messages().len(), "validated drone update");
        Ok(action)
    }

    /// Validate assigning an operator to drone `drone_id`.
    ///
    /// Unknown drone or operator fails with `NotFound`. A drone already held
    /// by someone else, or an operator already holding another drone, fails
    /// with `AllocationConflict`: the existing link must be removed first.
    /// License class and rescue eligibility are reported as messages.
    pub fn validate_allocate(
        &self,
        drone_id: u64,
        reference: &OperatorRef,
        mission: Mission,
    ) -> Result<PendingAction<Drone>> {
        let drone = load(&*self.db, drone_id)?;
        let operator = operator::resolve(&*self.db, reference)?;
        let operator_id = operator.id.ok_or(DalsysError::MissingId)?;

        check_link(&drone, &operator)?;

        let candidate = Drone {
            operator: Some(operator_id),
            ..drone.clone()
        };
        let mut action = PendingAction::new(
            candidate,
            ActionOp::Allocate {
                operator_id,
                mission,
            },
        );
        for message in eligibility(&drone, &operator, mission) {
            action.add_message(message);
        }
        tracing::debug!(
            drone = drone_id,
            operator = operator_id,
            %mission,
            messages = action.messages().len(),
            "validated allocation"
        );
        Ok(action)
    }

    /// Validate removing the operator from drone `drone_id`. Fails with
    /// `NotAllocated` if the drone has no operator.
    pub fn validate_unallocate(&self, drone_id: u64) -> Result<PendingAction<Drone>> {
        let drone = load(&*self.db, drone_id)?;
        let operator_id = drone.operator.ok_or(DalsysError::NotAllocated(drone_id))?;
        let candidate = Drone {
            operator: None,
            ..drone
        };
        Ok(PendingAction::new(
            candidate,
            ActionOp::Unallocate { operator_id },
        ))
    }

    pub fn get(&self, id: u64) -> Result<Drone> {
        load(&*self.db, id)
    }

    /// Snapshot of all drones matching `filter`, ordered by id.
    pub fn list_all(&self, filter: &DroneFilter) -> Result<Vec<Drone>> {
        self.db
            .fetch_all(Table::Drones, "id")?
            .iter()
            .map(|(id, fields)| Drone::from_fields(*id, fields))
            .filter(|d| d.as_ref().map_or(true, |d| filter.matches(d)))
            .collect()
    }

    /// Delete a drone, clearing its operator's link in the same batch.
    pub fn remove(&mut self, id: u64) -> Result<()> {
        let stored = load(&*self.db, id)?;
        let mut writes = Vec::new();
        if let Some(operator_id) = stored.operator {
            writes.push(operator::link_write(operator_id, None));
        }
        writes.push(Write::Delete {
            table: Table::Drones,
            id,
        });
        self.db.write_batch(&writes)?;
        tracing::info!(id, "drone removed");
        Ok(())
    }
}

impl<P: Persistence + ?Sized> Committer<Drone> for DroneStore<'_, P> {
    fn apply(&mut self, op: &ActionOp, candidate: &Drone) -> Result<Drone> {
        match *op {
            ActionOp::Create => {
                let mut fields = candidate.to_fields();
                fields.insert("operator_id".into(), Value::Null);
                let id = self.db.insert_record(Table::Drones, &fields)?;
                load(&*self.db, id)
            }
            ActionOp::Update => {
                let id = candidate.id.ok_or(DalsysError::MissingId)?;
                self.db
                    .update_record(Table::Drones, id, &candidate.to_fields())?;
                load(&*self.db, id)
            }
            ActionOp::Allocate {
                operator_id,
                mission,
            } => {
                let id = candidate.id.ok_or(DalsysError::MissingId)?;
                // Either side may have changed since validation.
                let current = load(&*self.db, id)?;
                let holder = operator::load(&*self.db, operator_id)?;
                check_link(&current, &holder)?;
                if let Some(message) = eligibility(&current, &holder, mission).into_iter().next() {
                    return Err(DalsysError::AllocationConflict(message));
                }
                self.db.write_batch(&[
                    link_write(id, Some(operator_id)),
                    operator::link_write(operator_id, Some(id)),
                ])?;
                load(&*self.db, id)
            }
            ActionOp::Unallocate { operator_id } => {
                let id = candidate.id.ok_or(DalsysError::MissingId)?;
                match load(&*self.db, id)?.operator {
                    Some(current) if current == operator_id => {}
                    Some(current) => {
                        return Err(DalsysError::AllocationConflict(format!(
                            "drone {} is now allocated to operator {current}, not {operator_id}",
                            label(id)
                        )));
                    }
                    None => return Err(DalsysError::NotAllocated(id)),
                }
                self.db.write_batch(&[
                    link_write(id, None),
                    operator::link_write(operator_id, None),
                ])?;
                load(&*self.db, id)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::OperatorStore;
    use crate::persistence::{MemoryPersistence, SqlitePersistence};
    use chrono::NaiveDate;

    fn add_drone<P: Persistence + ?Sized>(db: &mut P, drone: Drone) -> u64 {
        let mut store = DroneStore::new(db);
        let mut action = store.validate_add(drone);
        assert!(action.is_valid(), "{:?}", action.messages());
        action.commit(&mut store).unwrap().id.unwrap()
    }

    fn add_operator<P: Persistence + ?Sized>(
        db: &mut P,
        first: &str,
        license: LicenseClass,
        rescue: bool,
    ) -> u64 {
        let candidate = Operator::new(first, "Pilot")
            .with_date_of_birth(NaiveDate::from_ymd_opt(1980, 1, 1).unwrap())
            .with_license(license)
            .with_operations(if rescue { 10 } else { 0 })
            .with_rescue_endorsement(rescue);
        let mut store = OperatorStore::new(db);
        let mut action = store.validate_add(candidate);
        assert!(action.is_valid(), "{:?}", action.messages());
        action.commit(&mut store).unwrap().id.unwrap()
    }

    fn allocate<P: Persistence + ?Sized>(
        db: &mut P,
        drone: u64,
        operator: u64,
        mission: Mission,
    ) -> Result<PendingAction<Drone>> {
        DroneStore::new(db).validate_allocate(drone, &OperatorRef::Id(operator), mission)
    }

    #[test]
    fn add_requires_name_and_class() {
        let mut db = MemoryPersistence::new();
        let store = DroneStore::new(&mut db);
        let action = store.validate_add(Drone::default());
        assert_eq!(action.messages(), [NAME_REQUIRED, CLASS_REQUIRED]);
        assert!(!action.candidate().rescue);
    }

    #[test]
    fn add_assigns_sequential_ids() {
        let mut db = MemoryPersistence::new();
        let a = add_drone(&mut db, Drone::new("Kestrel", LicenseClass::One));
        let b = add_drone(&mut db, Drone::new("Osprey", LicenseClass::Two));
        assert_eq!((a, b), (1, 2));
    }

    #[test]
    fn class_two_license_flies_class_one_drone() {
        let mut db = MemoryPersistence::new();
        let drone = add_drone(&mut db, Drone::new("Kestrel", LicenseClass::One));
        let op = add_operator(&mut db, "Jo", LicenseClass::Two, false);

        let mut action = allocate(&mut db, drone, op, Mission::Standard).unwrap();
        assert!(action.is_valid());
        let mut store = DroneStore::new(&mut db);
        let allocated = action.commit(&mut store).unwrap();
        assert_eq!(allocated.operator, Some(op));

        let holder = OperatorStore::new(&mut db).get(op).unwrap();
        assert_eq!(holder.drone, Some(drone));
    }

    #[test]
    fn class_one_license_cannot_fly_class_two_drone() {
        let mut db = MemoryPersistence::new();
        let drone = add_drone(&mut db, Drone::new("Osprey", LicenseClass::Two));
        let op = add_operator(&mut db, "Jo", LicenseClass::One, false);

        let action = allocate(&mut db, drone, op, Mission::Standard).unwrap();
        assert!(!action.is_valid());
        assert_eq!(
            action.messages(),
            ["A class one license does not permit operating a class two drone"]
        );
    }

    #[test]
    fn allocated_drone_conflicts_with_second_operator() {
        let mut db = MemoryPersistence::new();
        let drone = add_drone(&mut db, Drone::new("Osprey", LicenseClass::One));
        let first = add_operator(&mut db, "Jo", LicenseClass::Two, false);
        let second = add_operator(&mut db, "Sam", LicenseClass::Two, false);

        let mut action = allocate(&mut db, drone, first, Mission::Standard).unwrap();
        action.commit(&mut DroneStore::new(&mut db)).unwrap();

        let err = allocate(&mut db, drone, second, Mission::Standard).unwrap_err();
        assert!(matches!(err, DalsysError::AllocationConflict(_)));
        let after = DroneStore::new(&mut db).get(drone).unwrap();
        assert_eq!(after.operator, Some(first));
    }

    #[test]
    fn operator_holds_at_most_one_drone() {
        let mut db = MemoryPersistence::new();
        let a = add_drone(&mut db, Drone::new("A", LicenseClass::One));
        let b = add_drone(&mut db, Drone::new("B", LicenseClass::One));
        let op = add_operator(&mut db, "Jo", LicenseClass::Two, false);

        let mut action = allocate(&mut db, a, op, Mission::Standard).unwrap();
        action.commit(&mut DroneStore::new(&mut db)).unwrap();

        assert!(matches!(
            allocate(&mut db, b, op, Mission::Standard),
            Err(DalsysError::AllocationConflict(_))
        ));
    }

    #[test]
    fn stale_allocation_fails_at_commit() {
        let mut db = MemoryPersistence::new();
        let drone = add_drone(&mut db, Drone::new("Osprey", LicenseClass::One));
        let first = add_operator(&mut db, "Jo", LicenseClass::Two, false);
        let second = add_operator(&mut db, "Sam", LicenseClass::Two, false);

        let mut late = allocate(&mut db, drone, second, Mission::Standard).unwrap();
        let mut early = allocate(&mut db, drone, first, Mission::Standard).unwrap();
        early.commit(&mut DroneStore::new(&mut db)).unwrap();

        let err = late.commit(&mut DroneStore::new(&mut db)).unwrap_err();
        assert!(matches!(err, DalsysError::AllocationConflict(_)));
        assert!(!late.is_committed());
        let holder = OperatorStore::new(&mut db).get(second).unwrap();
        assert_eq!(holder.drone, None);
    }

    #[test]
    fn pending_allocations_cannot_share_an_operator() {
        let mut db = MemoryPersistence::new();
        let a = add_drone(&mut db, Drone::new("A", LicenseClass::One));
        let b = add_drone(&mut db, Drone::new("B", LicenseClass::One));
        let op = add_operator(&mut db, "Jo", LicenseClass::Two, false);

        let mut first = allocate(&mut db, a, op, Mission::Standard).unwrap();
        let mut second = allocate(&mut db, b, op, Mission::Standard).unwrap();
        first.commit(&mut DroneStore::new(&mut db)).unwrap();

        let err = second.commit(&mut DroneStore::new(&mut db)).unwrap_err();
        assert!(matches!(err, DalsysError::AllocationConflict(_)));
        assert!(!second.is_committed());

        let holders: Vec<u64> = DroneStore::new(&mut db)
            .list_all(&DroneFilter::default())
            .unwrap()
            .into_iter()
            .filter(|d| d.operator == Some(op))
            .filter_map(|d| d.id)
            .collect();
        assert_eq!(holders, [a]);
        assert_eq!(OperatorStore::new(&mut db).get(op).unwrap().drone, Some(a));
    }

    #[test]
    fn license_downgrade_before_commit_blocks_allocation() {
        let mut db = MemoryPersistence::new();
        let drone = add_drone(&mut db, Drone::new("Osprey", LicenseClass::Two));
        let op = add_operator(&mut db, "Jo", LicenseClass::Two, false);

        let mut pending = allocate(&mut db, drone, op, Mission::Standard).unwrap();
        assert!(pending.is_valid());

        let mut operators = OperatorStore::new(&mut db);
        let downgraded = operators.get(op).unwrap().with_license(LicenseClass::One);
        let mut update = operators.validate_update(downgraded).unwrap();
        assert!(update.is_valid());
        update.commit(&mut operators).unwrap();

        let err = pending.commit(&mut DroneStore::new(&mut db)).unwrap_err();
        assert!(matches!(err, DalsysError::AllocationConflict(_)));
        assert_eq!(DroneStore::new(&mut db).get(drone).unwrap().operator, None);
        assert_eq!(OperatorStore::new(&mut db).get(op).unwrap().drone, None);
    }

    #[test]
    fn stale_unallocation_fails_at_commit() {
        let mut db = MemoryPersistence::new();
        let a = add_drone(&mut db, Drone::new("A", LicenseClass::One));
        let b = add_drone(&mut db, Drone::new("B", LicenseClass::One));
        let op = add_operator(&mut db, "Jo", LicenseClass::Two, false);
        let mut action = allocate(&mut db, a, op, Mission::Standard).unwrap();
        action.commit(&mut DroneStore::new(&mut db)).unwrap();

        let mut stale = DroneStore::new(&mut db).validate_unallocate(a).unwrap();

        let mut store = DroneStore::new(&mut db);
        let mut release = store.validate_unallocate(a).unwrap();
        release.commit(&mut store).unwrap();
        let mut moved = allocate(&mut db, b, op, Mission::Standard).unwrap();
        moved.commit(&mut DroneStore::new(&mut db)).unwrap();

        let err = stale.commit(&mut DroneStore::new(&mut db)).unwrap_err();
        assert!(matches!(err, DalsysError::NotAllocated(id) if id == a));
        assert_eq!(DroneStore::new(&mut db).get(b).unwrap().operator, Some(op));
        assert_eq!(OperatorStore::new(&mut db).get(op).unwrap().drone, Some(b));
    }

    #[test]
    fn rescue_mission_needs_endorsement_and_capable_drone() {
        let mut db = MemoryPersistence::new();
        let plain = add_drone(&mut db, Drone::new("Plain", LicenseClass::One));
        let rescue = add_drone(
            &mut db,
            Drone::new("Medic", LicenseClass::One).with_rescue(true),
        );
        let novice = add_operator(&mut db, "Jo", LicenseClass::Two, false);
        let veteran = add_operator(&mut db, "Sam", LicenseClass::Two, true);

        let action = allocate(&mut db, plain, novice, Mission::Rescue).unwrap();
        assert_eq!(
            action.messages(),
            [RESCUE_ENDORSEMENT_REQUIRED, NOT_RESCUE_CAPABLE]
        );
        assert!(allocate(&mut db, plain, novice, Mission::Standard)
            .unwrap()
            .is_valid());
        assert!(allocate(&mut db, rescue, veteran, Mission::Rescue)
            .unwrap()
            .is_valid());
    }

    #[test]
    fn allocate_by_name() {
        let mut db = MemoryPersistence::new();
        let drone = add_drone(&mut db, Drone::new("Kestrel", LicenseClass::One));
        let op = add_operator(&mut db, "Jo", LicenseClass::One, false);

        let reference = OperatorRef::parse("Jo Pilot").unwrap();
        let action = DroneStore::new(&mut db)
            .validate_allocate(drone, &reference, Mission::Standard)
            .unwrap();
        assert_eq!(action.candidate().operator, Some(op));
    }

    #[test]
    fn allocate_unknown_records_is_not_found() {
        let mut db = MemoryPersistence::new();
        let drone = add_drone(&mut db, Drone::new("Kestrel", LicenseClass::One));
        assert!(matches!(
            allocate(&mut db, drone, 5, Mission::Standard),
            Err(DalsysError::NotFound { entity: "operator", id: 5 })
        ));
        assert!(matches!(
            allocate(&mut db, 8, 1, Mission::Standard),
            Err(DalsysError::NotFound { entity: "drone", id: 8 })
        ));
    }

    #[test]
    fn unallocate_clears_both_sides() {
        let mut db = MemoryPersistence::new();
        let drone = add_drone(&mut db, Drone::new("Kestrel", LicenseClass::One));
        let op = add_operator(&mut db, "Jo", LicenseClass::One, false);
        let mut action = allocate(&mut db, drone, op, Mission::Standard).unwrap();
        action.commit(&mut DroneStore::new(&mut db)).unwrap();

        let mut store = DroneStore::new(&mut db);
        let mut release = store.validate_unallocate(drone).unwrap();
        let released = release.commit(&mut store).unwrap();
        assert_eq!(released.operator, None);
        assert!(matches!(
            store.validate_unallocate(drone),
            Err(DalsysError::NotAllocated(id)) if id == drone
        ));
        assert_eq!(OperatorStore::new(&mut db).get(op).unwrap().drone, None);
    }

    #[test]
    fn update_cannot_change_allocation_or_break_class_rule() {
        let mut db = MemoryPersistence::new();
        let drone = add_drone(&mut db, Drone::new("Kestrel", LicenseClass::One));
        let op = add_operator(&mut db, "Jo", LicenseClass::One, false);
        let mut action = allocate(&mut db, drone, op, Mission::Standard).unwrap();
        action.commit(&mut DroneStore::new(&mut db)).unwrap();

        let mut store = DroneStore::new(&mut db);
        let stored = store.get(drone).unwrap();

        let upgraded = store
            .validate_update(stored.clone().with_class(LicenseClass::Two))
            .unwrap();
        assert_eq!(upgraded.messages().len(), 1);

        let detached = Drone {
            operator: None,
            ..stored.with_name("Kestrel II")
        };
        let mut rename = store.validate_update(detached).unwrap();
        assert!(rename.is_valid());
        let saved = rename.commit(&mut store).unwrap();
        assert_eq!(saved.name.as_deref(), Some("Kestrel II"));
        assert_eq!(saved.operator, Some(op));
    }

    #[test]
    fn list_all_filters_by_class_and_rescue() {
        let mut db = MemoryPersistence::new();
        add_drone(&mut db, Drone::new("A", LicenseClass::One));
        add_drone(&mut db, Drone::new("B", LicenseClass::Two).with_rescue(true));
        add_drone(&mut db, Drone::new("C", LicenseClass::One).with_rescue(true));

        let store = DroneStore::new(&mut db);
        let names = |filter: DroneFilter| -> Vec<String> {
            store
                .list_all(&filter)
                .unwrap()
                .into_iter()
                .filter_map(|d| d.name)
                .collect()
        };
        assert_eq!(names(DroneFilter::default()), ["A", "B", "C"]);
        assert_eq!(
            names(DroneFilter {
                rescue: Some(true),
                ..DroneFilter::default()
            }),
            ["B", "C"]
        );
        assert_eq!(
            names(DroneFilter {
                class_type: Some(LicenseClass::One),
                rescue: Some(true),
            }),
            ["C"]
        );
    }

    #[test]
    fn list_all_is_a_snapshot() {
        let mut db = MemoryPersistence::new();
        add_drone(&mut db, Drone::new("A", LicenseClass::One));
        let snapshot = DroneStore::new(&mut db)
            .list_all(&DroneFilter::default())
            .unwrap();
        add_drone(&mut db, Drone::new("B", LicenseClass::One));
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn remove_allocated_drone_frees_operator() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut db = SqlitePersistence::open(&dir.path().join("dalsys.db")).unwrap();
        let drone = add_drone(&mut db, Drone::new("Kestrel", LicenseClass::One));
        let op = add_operator(&mut db, "Jo", LicenseClass::One, false);
        let mut action = allocate(&mut db, drone, op, Mission::Standard).unwrap();
        action.commit(&mut DroneStore::new(&mut db)).unwrap();

        DroneStore::new(&mut db).remove(drone).unwrap();
        assert!(matches!(
            DroneStore::new(&mut db).get(drone),
            Err(DalsysError::NotFound { entity: "drone", .. })
        ));
        assert_eq!(OperatorStore::new(&mut db).get(op).unwrap().drone, None);
    }

    #[test]
    fn remove_allocated_operator_frees_drone() {
        let mut db = SqlitePersistence::open_in_memory().unwrap();
        let drone = add_drone(&mut db, Drone::new("Kestrel", LicenseClass::One));
        let op = add_operator(&mut db, "Jo", LicenseClass::One, false);
        let mut action = allocate(&mut db, drone, op, Mission::Standard).unwrap();
        action.commit(&mut DroneStore::new(&mut db)).unwrap();

        OperatorStore::new(&mut db).remove(op).unwrap();
        assert_eq!(DroneStore::new(&mut db).get(drone).unwrap().operator, None);
    }
}
